//! The workspace tab session: one owned object through which every tab
//! mutation flows.
//!
//! `TabSession` ties the registry, the closed-tab history, the unsaved
//! changes guard and persistence sync together and drives the routing,
//! auth and scratch-storage collaborators. Each mutation is reported to
//! `PersistenceSync`; saves themselves are run by the host loop (see
//! [`TabSession::spawn_save`]) or inline through the `flush_*` helpers.

use crate::services::{AuthProvider, EphemeralTabStorage, Navigator};
use crate::session::{
    LoadTicket, Observation, PendingWrite, PersistenceSync, StoreError, SyncTiming, TabSet,
    TabStore, UserId, WriteOutcome,
};
use crate::shortcuts::{ShortcutDispatcher, TabAction};
use crate::tab::{LastClosedStack, TabId, TabRegistry, WorkspaceTab};
use crate::unsaved_guard::{AffectedTab, GuardDecision, GuardedAction, UnsavedChangesGuard};
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio::time::Instant;
use worktab_config::Config;
use worktab_keybindings::{KeyInput, Platform};

/// A finished background save: the write and what the store said
pub type SaveResult = (PendingWrite, Result<(), StoreError>);

/// External services the session drives
pub struct Collaborators {
    pub navigator: Box<dyn Navigator>,
    pub auth: Box<dyn AuthProvider>,
    pub scratch: Box<dyn EphemeralTabStorage>,
}

/// Result of a user-facing action
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    Done,
    /// Nothing to do (protected tab, unknown id, empty history)
    Ignored,
    /// Unsaved changes would be lost; waiting for confirm or cancel
    NeedsConfirmation(Vec<AffectedTab>),
}

impl ActionOutcome {
    fn from_option<T>(value: Option<T>) -> Self {
        if value.is_some() {
            Self::Done
        } else {
            Self::Ignored
        }
    }
}

pub struct TabSession<S: TabStore> {
    registry: TabRegistry,
    closed: LastClosedStack,
    guard: UnsavedChangesGuard,
    sync: PersistenceSync,
    shortcuts: ShortcutDispatcher,
    store: Arc<S>,
    navigator: Box<dyn Navigator>,
    auth: Box<dyn AuthProvider>,
    scratch: Box<dyn EphemeralTabStorage>,
    post_logout_route: String,
}

impl<S: TabStore> TabSession<S> {
    pub fn new(config: &Config, store: Arc<S>, collaborators: Collaborators) -> Self {
        Self::with_shortcuts(
            config,
            store,
            collaborators,
            ShortcutDispatcher::from_config(config),
        )
    }

    pub fn with_shortcuts(
        config: &Config,
        store: Arc<S>,
        collaborators: Collaborators,
        shortcuts: ShortcutDispatcher,
    ) -> Self {
        Self {
            registry: TabRegistry::new(config.dashboard_route.clone()),
            closed: LastClosedStack::new(config.closed_tab_history),
            guard: UnsavedChangesGuard::new(),
            sync: PersistenceSync::new(SyncTiming::from_config(config)),
            shortcuts,
            store,
            navigator: collaborators.navigator,
            auth: collaborators.auth,
            scratch: collaborators.scratch,
            post_logout_route: config.post_logout_route.clone(),
        }
    }

    // ------------------------------------------------------------------
    // Tab operations
    // ------------------------------------------------------------------

    /// Open a tab (or focus the already open one) and navigate to it.
    pub fn open_or_focus(&mut self, tab: WorkspaceTab) -> TabId {
        let id = self.registry.open_or_focus(tab);
        self.navigate_to_active();
        self.observe();
        id
    }

    /// Close a tab, asking for confirmation first if it has unsaved changes.
    ///
    /// The dashboard, pinned tabs and unknown ids are ignored.
    pub fn close_tab(&mut self, id: &TabId) -> ActionOutcome {
        match self.registry.get_tab(id) {
            None => return ActionOutcome::Ignored,
            Some(tab) if tab.is_dashboard() || tab.is_pinned => return ActionOutcome::Ignored,
            Some(_) => {}
        }

        match self
            .guard
            .request(GuardedAction::CloseTab(id.clone()), &self.registry)
        {
            GuardDecision::Proceed(_) => self.perform_close(id),
            GuardDecision::ConfirmationRequired(affected) => {
                ActionOutcome::NeedsConfirmation(affected)
            }
        }
    }

    fn perform_close(&mut self, id: &TabId) -> ActionOutcome {
        let was_active = self.registry.active_tab_id() == Some(id);
        let Some(tab) = self.registry.close_tab(id) else {
            return ActionOutcome::Ignored;
        };
        self.closed.push(tab);
        if was_active {
            self.navigate_to_active();
        }
        self.observe();
        ActionOutcome::Done
    }

    pub fn focus_tab(&mut self, id: &TabId) -> bool {
        if !self.registry.focus_tab(id) {
            return false;
        }
        self.navigate_to_active();
        self.observe();
        true
    }

    pub fn pin_tab(&mut self, id: &TabId) -> bool {
        let changed = self.registry.pin_tab(id);
        self.observe();
        changed
    }

    pub fn unpin_tab(&mut self, id: &TabId) -> bool {
        let changed = self.registry.unpin_tab(id);
        self.observe();
        changed
    }

    pub fn toggle_pin(&mut self, id: &TabId) -> Option<bool> {
        let pinned = self.registry.toggle_pin(id);
        self.observe();
        pinned
    }

    /// Set or clear a tab's unsaved-changes flag.
    pub fn mark_dirty(&mut self, id: &TabId, dirty: bool) -> bool {
        let found = self.registry.mark_dirty(id, dirty);
        self.observe();
        found
    }

    pub fn reorder(&mut self, new_order: &[TabId]) -> bool {
        let changed = self.registry.reorder(new_order);
        self.observe();
        changed
    }

    /// Bring back the most recently closed tab.
    pub fn reopen_last_closed(&mut self) -> Option<TabId> {
        let tab = self.closed.pop()?;
        let id = self.registry.reopen(tab);
        self.navigate_to_active();
        self.observe();
        Some(id)
    }

    pub fn next_tab(&mut self) -> Option<TabId> {
        let id = self.registry.next_tab()?;
        self.navigate_to_active();
        self.observe();
        Some(id)
    }

    pub fn prev_tab(&mut self) -> Option<TabId> {
        let id = self.registry.prev_tab()?;
        self.navigate_to_active();
        self.observe();
        Some(id)
    }

    /// Focus the tab at a 1-based position.
    pub fn switch_to_ordinal(&mut self, ordinal: usize) -> Option<TabId> {
        let id = self.registry.switch_to_index(ordinal)?;
        self.navigate_to_active();
        self.observe();
        Some(id)
    }

    /// Run the shortcut bound to `input`, if any.
    pub fn handle_key(&mut self, input: &KeyInput) -> Option<(TabAction, ActionOutcome)> {
        let action = self.shortcuts.resolve(input)?;
        log::debug!("Shortcut resolved to {:?}", action);

        let outcome = match action {
            TabAction::CloseActiveTab => match self.registry.active_tab_id().cloned() {
                Some(id) => self.close_tab(&id),
                None => ActionOutcome::Ignored,
            },
            TabAction::ReopenClosedTab => ActionOutcome::from_option(self.reopen_last_closed()),
            TabAction::NextTab => ActionOutcome::from_option(self.next_tab()),
            TabAction::PrevTab => ActionOutcome::from_option(self.prev_tab()),
            TabAction::SwitchToTab(n) => ActionOutcome::from_option(self.switch_to_ordinal(n)),
        };
        Some((action, outcome))
    }

    // ------------------------------------------------------------------
    // Confirmation and logout
    // ------------------------------------------------------------------

    /// Log out, asking for confirmation first if unsaved changes would be lost.
    pub async fn request_logout(&mut self) -> ActionOutcome {
        match self.guard.request(GuardedAction::Logout, &self.registry) {
            GuardDecision::Proceed(_) => {
                self.logout().await;
                ActionOutcome::Done
            }
            GuardDecision::ConfirmationRequired(affected) => {
                ActionOutcome::NeedsConfirmation(affected)
            }
        }
    }

    /// Run the action waiting for confirmation, discarding unsaved changes.
    pub async fn confirm_pending(&mut self) -> ActionOutcome {
        match self.guard.confirm() {
            // The closed stack drops the unsaved flag; a tab that became
            // protected meanwhile keeps it
            Some(GuardedAction::CloseTab(id)) => self.perform_close(&id),
            Some(GuardedAction::Logout) => {
                self.logout().await;
                ActionOutcome::Done
            }
            None => ActionOutcome::Ignored,
        }
    }

    /// Drop the action waiting for confirmation. Returns false if none was.
    pub fn cancel_pending(&mut self) -> bool {
        self.guard.cancel().is_some()
    }

    /// Unconditional logout.
    ///
    /// The pending write, if any, is flushed with the pre-logout state; the
    /// dashboard-only state left behind is never persisted.
    pub async fn logout(&mut self) {
        let pending = self.sync.end_session();
        self.guard.cancel();

        self.scratch.clear();
        self.registry.close_all_except(&TabId::dashboard());
        self.closed.clear();

        if let Some(write) = pending {
            match self.store.save(&write.user, &write.snapshot).await {
                Ok(()) => log::info!("Flushed tab set for user {} on logout", write.user),
                Err(e) => log::error!(
                    "Failed to flush tab set for user {} on logout: {}",
                    write.user,
                    e
                ),
            }
        }

        self.auth.sign_out();
        self.navigator.navigate(&self.post_logout_route);
    }

    // ------------------------------------------------------------------
    // Sign-in
    // ------------------------------------------------------------------

    /// Start a session for the signed-in user. Mutations made before
    /// [`Self::complete_sign_in`] are never written.
    ///
    /// Load `ticket.user`'s tab set and hand the result back together with
    /// the ticket.
    pub fn begin_sign_in(&mut self) -> Option<LoadTicket> {
        if self.sync.user().is_some() {
            log::warn!("Sign-in requested while a session is active; ignoring");
            return None;
        }
        let Some(user) = self.auth.current_user_id() else {
            log::warn!("Sign-in requested but no user is authenticated");
            return None;
        };
        Some(self.sync.begin_load(user))
    }

    /// Apply the result of loading the stored tab set.
    ///
    /// Returns true if stored tabs were restored. Load errors and empty or
    /// missing sets leave the in-memory tabs as they are. A result for a
    /// sign-in that has since been ended or replaced is dropped.
    pub fn complete_sign_in(
        &mut self,
        ticket: &LoadTicket,
        loaded: Result<Option<TabSet>, StoreError>,
    ) -> bool {
        if !self.sync.is_current_load(ticket) {
            log::warn!(
                "Dropping stored tabs of user {} loaded for an earlier sign-in",
                ticket.user
            );
            return false;
        }
        let restored = match loaded {
            Ok(Some(set)) if !set.is_empty() => self.registry.restore(set),
            Ok(_) => {
                log::info!("No stored tabs; starting with the current tabs");
                false
            }
            Err(e) => {
                log::warn!("Failed to load stored tabs, continuing in memory: {}", e);
                false
            }
        };
        if restored {
            self.navigate_to_active();
        }
        self.sync
            .finish_load(self.registry.snapshot().content_hash());
        restored
    }

    /// Load and restore the signed-in user's tabs.
    pub async fn sign_in(&mut self) -> Option<UserId> {
        let ticket = self.begin_sign_in()?;
        let loaded = self.store.load(&ticket.user).await;
        self.complete_sign_in(&ticket, loaded);
        Some(ticket.user)
    }

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    /// When the next debounced write becomes due.
    pub fn next_flush_at(&self) -> Option<Instant> {
        self.sync.next_due()
    }

    pub fn take_due_write(&mut self, now: Instant) -> Option<PendingWrite> {
        self.sync.take_due(now)
    }

    /// Run `write` against the store as a background task.
    pub fn spawn_save(&self, write: PendingWrite, tasks: &mut JoinSet<SaveResult>) {
        let store = Arc::clone(&self.store);
        tasks.spawn(async move {
            let result = store.save(&write.user, &write.snapshot).await;
            (write, result)
        });
    }

    pub fn complete_write(
        &mut self,
        write: PendingWrite,
        result: Result<(), StoreError>,
        now: Instant,
    ) -> WriteOutcome {
        self.sync.complete_write(write, result, now)
    }

    /// Save the pending write inline if it is due.
    pub async fn flush_due(&mut self) -> Option<WriteOutcome> {
        let write = self.sync.take_due(Instant::now())?;
        Some(self.save_inline(write).await)
    }

    /// Save the pending write inline, due or not.
    pub async fn flush_now(&mut self) -> Option<WriteOutcome> {
        let write = self.sync.take_pending()?;
        Some(self.save_inline(write).await)
    }

    async fn save_inline(&mut self, write: PendingWrite) -> WriteOutcome {
        let result = self.store.save(&write.user, &write.snapshot).await;
        self.sync.complete_write(write, result, Instant::now())
    }

    fn observe(&mut self) -> Observation {
        let snapshot = self.registry.snapshot();
        self.sync.observe(&snapshot, Instant::now())
    }

    fn navigate_to_active(&mut self) {
        if let Some(route) = self.registry.active_tab().map(|t| t.route.clone()) {
            self.navigator.navigate(&route);
        }
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn registry(&self) -> &TabRegistry {
        &self.registry
    }

    pub fn tabs(&self) -> &[WorkspaceTab] {
        self.registry.tabs()
    }

    pub fn active_tab(&self) -> Option<&WorkspaceTab> {
        self.registry.active_tab()
    }

    pub fn closed_tabs(&self) -> &LastClosedStack {
        &self.closed
    }

    pub fn guard(&self) -> &UnsavedChangesGuard {
        &self.guard
    }

    pub fn sync(&self) -> &PersistenceSync {
        &self.sync
    }

    pub fn user(&self) -> Option<&UserId> {
        self.sync.user()
    }

    pub fn platform(&self) -> Platform {
        self.shortcuts.platform()
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }
}
