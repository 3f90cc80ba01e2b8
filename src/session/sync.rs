//! Debounced, change-gated synchronization of the tab set
//!
//! `PersistenceSync` is a pure state machine: it never touches the store
//! itself. The owner reports every mutation through [`PersistenceSync::observe`],
//! asks for due writes with [`PersistenceSync::take_due`], performs the save
//! however it likes and reports the result with
//! [`PersistenceSync::complete_write`].
//!
//! At most one write is in flight at a time. The single pending slot always
//! holds the latest snapshot, so a burst of mutations collapses into one save.

use super::{ContentHash, StoreError, TabSet, UserId};
use std::time::Duration;
use tokio::time::Instant;
use worktab_config::Config;

/// Per-session lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    /// No user signed in; nothing is written.
    Idle,
    /// Stored state is being fetched; mutations are observed, never written.
    Loading,
    /// Changes are debounced and written.
    Syncing,
}

/// Debounce and retry timing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncTiming {
    pub debounce: Duration,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl SyncTiming {
    pub fn from_config(config: &Config) -> Self {
        Self {
            debounce: config.persist_debounce(),
            initial_backoff: config.retry_initial_backoff(),
            max_backoff: config.retry_max_backoff(),
        }
    }

    /// Delay before retry number `attempt` (1-based), doubling up to the cap.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32
            .checked_shl(attempt.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

impl Default for SyncTiming {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// A snapshot waiting to be written
#[derive(Debug, Clone, PartialEq)]
pub struct PendingWrite {
    pub user: UserId,
    pub snapshot: TabSet,
    pub hash: ContentHash,
    pub due_at: Instant,
    /// Failed attempts so far
    pub attempt: u32,
    /// Session the snapshot was taken in
    pub generation: u64,
}

/// Identifies one sign-in; a load result is only applied to the session
/// that requested it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadTicket {
    pub user: UserId,
    generation: u64,
}

/// What [`PersistenceSync::observe`] did with a snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    NoSession,
    Loading,
    /// Matches what the store holds (or is about to hold)
    Unchanged,
    /// Reverted to the stored content; the pending write was dropped
    Reverted,
    Scheduled { due_at: Instant },
}

/// Result of reporting a finished save
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    Saved,
    /// The failed snapshot was re-armed
    RetryScheduled { due_at: Instant, attempt: u32 },
    /// The save failed but a newer snapshot is already pending
    Superseded,
    /// The write belonged to a session that has since ended
    Stale,
}

#[derive(Debug)]
pub struct PersistenceSync {
    timing: SyncTiming,
    phase: SyncPhase,
    user: Option<UserId>,
    /// Hash of the content the store is known to hold
    last_saved_hash: Option<ContentHash>,
    pending: Option<PendingWrite>,
    /// Hash of the write currently being saved
    in_flight: Option<ContentHash>,
    /// Bumped whenever a session starts or ends
    generation: u64,
}

impl PersistenceSync {
    pub fn new(timing: SyncTiming) -> Self {
        Self {
            timing,
            phase: SyncPhase::Idle,
            user: None,
            last_saved_hash: None,
            pending: None,
            in_flight: None,
            generation: 0,
        }
    }

    /// Start a session for `user`. Writes are held until [`Self::finish_load`].
    pub fn begin_load(&mut self, user: UserId) -> LoadTicket {
        log::info!("Loading stored tabs for user {}", user);
        self.generation += 1;
        self.phase = SyncPhase::Loading;
        self.user = Some(user.clone());
        self.last_saved_hash = None;
        self.pending = None;
        self.in_flight = None;
        LoadTicket {
            user,
            generation: self.generation,
        }
    }

    /// True while the load started with `ticket` is still the one awaited.
    pub fn is_current_load(&self, ticket: &LoadTicket) -> bool {
        self.phase == SyncPhase::Loading
            && ticket.generation == self.generation
            && self.user.as_ref() == Some(&ticket.user)
    }

    /// Finish the initial load. `baseline` is the hash of what the store is
    /// taken to hold: the restored snapshot, or the current in-memory one
    /// when nothing was restored.
    pub fn finish_load(&mut self, baseline: ContentHash) {
        if self.phase != SyncPhase::Loading {
            log::warn!("finish_load called in phase {:?}; ignoring", self.phase);
            return;
        }
        log::debug!("Initial load complete, baseline {}", baseline);
        self.last_saved_hash = Some(baseline);
        self.phase = SyncPhase::Syncing;
    }

    /// Record the current state after a mutation.
    pub fn observe(&mut self, snapshot: &TabSet, now: Instant) -> Observation {
        let user = match (self.phase, &self.user) {
            (SyncPhase::Idle, _) | (_, None) => return Observation::NoSession,
            (SyncPhase::Loading, _) => return Observation::Loading,
            (SyncPhase::Syncing, Some(user)) => user.clone(),
        };

        let hash = snapshot.content_hash();

        // Compare against what the store will hold once the in-flight save lands
        let target = self.in_flight.as_ref().or(self.last_saved_hash.as_ref());
        if target == Some(&hash) {
            return match self.pending.take() {
                Some(_) => {
                    log::debug!("Tab set reverted to stored content, dropping pending write");
                    Observation::Reverted
                }
                None => Observation::Unchanged,
            };
        }

        // Same content as the pending write: keep its deadline
        if let Some(pending) = self.pending.as_ref().filter(|p| p.hash == hash) {
            return Observation::Scheduled {
                due_at: pending.due_at,
            };
        }

        let due_at = now + self.timing.debounce;
        log::debug!("Tab set changed ({}), write due in {:?}", hash, self.timing.debounce);
        self.pending = Some(PendingWrite {
            user,
            snapshot: snapshot.clone(),
            hash,
            due_at,
            attempt: 0,
            generation: self.generation,
        });
        Observation::Scheduled { due_at }
    }

    /// Take the pending write if it is due and nothing is in flight.
    pub fn take_due(&mut self, now: Instant) -> Option<PendingWrite> {
        if self.phase != SyncPhase::Syncing || self.in_flight.is_some() {
            return None;
        }
        if self.pending.as_ref()?.due_at > now {
            return None;
        }
        self.take_in_flight()
    }

    /// Take the pending write regardless of its due instant.
    pub fn take_pending(&mut self) -> Option<PendingWrite> {
        if self.phase != SyncPhase::Syncing || self.in_flight.is_some() {
            return None;
        }
        self.take_in_flight()
    }

    fn take_in_flight(&mut self) -> Option<PendingWrite> {
        let write = self.pending.take()?;
        self.in_flight = Some(write.hash.clone());
        Some(write)
    }

    /// When the host should next call [`Self::take_due`].
    pub fn next_due(&self) -> Option<Instant> {
        if self.phase != SyncPhase::Syncing || self.in_flight.is_some() {
            return None;
        }
        self.pending.as_ref().map(|p| p.due_at)
    }

    /// Report the result of saving `write`.
    ///
    /// The saved hash only moves on success. A failure re-arms the failed
    /// snapshot with exponential backoff unless a newer change is pending.
    pub fn complete_write(
        &mut self,
        write: PendingWrite,
        result: Result<(), StoreError>,
        now: Instant,
    ) -> WriteOutcome {
        if write.generation != self.generation
            || self.user.as_ref() != Some(&write.user)
            || self.phase != SyncPhase::Syncing
        {
            match result {
                Ok(()) => log::debug!("Save for user {} finished after session ended", write.user),
                Err(e) => log::warn!(
                    "Save for user {} failed after session ended: {}",
                    write.user,
                    e
                ),
            }
            return WriteOutcome::Stale;
        }

        if self.in_flight.as_ref() == Some(&write.hash) {
            self.in_flight = None;
        }

        match result {
            Ok(()) => {
                log::info!("Saved tab set {} for user {}", write.hash, write.user);
                self.last_saved_hash = Some(write.hash);
                WriteOutcome::Saved
            }
            Err(e) => {
                log::error!(
                    "Failed to save tab set for user {} (attempt {}): {}",
                    write.user,
                    write.attempt + 1,
                    e
                );
                if self.pending.is_some() {
                    return WriteOutcome::Superseded;
                }
                let attempt = write.attempt + 1;
                let due_at = now + self.timing.backoff(attempt);
                self.pending = Some(PendingWrite {
                    due_at,
                    attempt,
                    ..write
                });
                WriteOutcome::RetryScheduled { due_at, attempt }
            }
        }
    }

    /// End the session and hand back the unsaved pending write, if any.
    pub fn end_session(&mut self) -> Option<PendingWrite> {
        if let Some(user) = &self.user {
            log::info!("Ending tab sync session for user {}", user);
        }
        let pending = self.pending.take();
        self.generation += 1;
        self.phase = SyncPhase::Idle;
        self.user = None;
        self.last_saved_hash = None;
        self.in_flight = None;
        pending
    }

    pub fn phase(&self) -> SyncPhase {
        self.phase
    }

    pub fn user(&self) -> Option<&UserId> {
        self.user.as_ref()
    }

    pub fn last_saved_hash(&self) -> Option<&ContentHash> {
        self.last_saved_hash.as_ref()
    }

    pub fn pending(&self) -> Option<&PendingWrite> {
        self.pending.as_ref()
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn timing(&self) -> SyncTiming {
        self.timing
    }
}
