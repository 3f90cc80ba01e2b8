//! Confirmation gate for destructive actions on tabs with unsaved changes.
//!
//! Closing a dirty tab or logging out with dirty tabs open moves the guard
//! into `PendingConfirmation`. Nothing destructive happens until the user
//! confirms (the original action runs, discarding the changes) or cancels.

use crate::tab::{TabId, TabRegistry, WorkspaceTab};

/// An action that may discard unsaved changes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardedAction {
    CloseTab(TabId),
    Logout,
}

/// A tab whose unsaved changes an action would discard
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AffectedTab {
    pub id: TabId,
    pub title: String,
    pub route: String,
}

impl From<&WorkspaceTab> for AffectedTab {
    fn from(tab: &WorkspaceTab) -> Self {
        Self {
            id: tab.id.clone(),
            title: tab.title.clone(),
            route: tab.route.clone(),
        }
    }
}

/// What the caller should do with a requested action
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// Nothing would be lost; run the action now
    Proceed(GuardedAction),
    /// Ask the user first
    ConfirmationRequired(Vec<AffectedTab>),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum GuardState {
    #[default]
    Idle,
    PendingConfirmation {
        action: GuardedAction,
        affected: Vec<AffectedTab>,
    },
}

#[derive(Debug, Default)]
pub struct UnsavedChangesGuard {
    state: GuardState,
}

impl UnsavedChangesGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dirty, non-pinned tabs `action` would discard.
    ///
    /// Close affects only its target. Logout affects every tab except the
    /// dashboard; pinned tabs are closed on logout too but are not listed.
    pub fn affected_by(action: &GuardedAction, registry: &TabRegistry) -> Vec<AffectedTab> {
        registry
            .dirty_tabs()
            .filter(|tab| !tab.is_pinned)
            .filter(|tab| match action {
                GuardedAction::CloseTab(id) => &tab.id == id,
                GuardedAction::Logout => !tab.is_dashboard(),
            })
            .map(AffectedTab::from)
            .collect()
    }

    /// Gate `action`. A request made while another is pending replaces it.
    pub fn request(&mut self, action: GuardedAction, registry: &TabRegistry) -> GuardDecision {
        if let GuardState::PendingConfirmation { action: previous, .. } = &self.state {
            log::debug!("Replacing pending confirmation for {:?}", previous);
        }

        let affected = Self::affected_by(&action, registry);
        if affected.is_empty() {
            self.state = GuardState::Idle;
            return GuardDecision::Proceed(action);
        }

        log::info!(
            "{:?} would discard unsaved changes in {} tab(s); awaiting confirmation",
            action,
            affected.len()
        );
        self.state = GuardState::PendingConfirmation {
            action,
            affected: affected.clone(),
        };
        GuardDecision::ConfirmationRequired(affected)
    }

    /// Accept the pending action. Returns it so the caller can run it.
    pub fn confirm(&mut self) -> Option<GuardedAction> {
        match std::mem::take(&mut self.state) {
            GuardState::PendingConfirmation { action, .. } => {
                log::info!("Confirmed {:?}, discarding unsaved changes", action);
                Some(action)
            }
            GuardState::Idle => None,
        }
    }

    /// Abort the pending action without side effects.
    pub fn cancel(&mut self) -> Option<GuardedAction> {
        match std::mem::take(&mut self.state) {
            GuardState::PendingConfirmation { action, .. } => {
                log::info!("Cancelled {:?}", action);
                Some(action)
            }
            GuardState::Idle => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.state, GuardState::PendingConfirmation { .. })
    }

    pub fn state(&self) -> &GuardState {
        &self.state
    }

    pub fn pending_action(&self) -> Option<&GuardedAction> {
        match &self.state {
            GuardState::PendingConfirmation { action, .. } => Some(action),
            GuardState::Idle => None,
        }
    }

    pub fn affected_tabs(&self) -> &[AffectedTab] {
        match &self.state {
            GuardState::PendingConfirmation { affected, .. } => affected,
            GuardState::Idle => &[],
        }
    }
}
