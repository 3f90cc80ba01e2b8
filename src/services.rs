//! Collaborators the tab session drives but does not own: routing,
//! authentication and per-tab scratch storage.
//!
//! The `Local*`/`History*`/`Scratch*` implementations are cheap cloneable
//! handles around shared state, so a host (or a test) can keep one clone
//! to inspect what the session did with the other.

use crate::session::UserId;
use crate::tab::TabId;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Routing layer
pub trait Navigator {
    fn navigate(&mut self, route: &str);
}

/// Authentication/session provider
pub trait AuthProvider {
    fn current_user_id(&self) -> Option<UserId>;
    fn sign_out(&mut self);
}

/// Large per-tab UI state that lives only for the login session
pub trait EphemeralTabStorage {
    fn clear(&mut self);
}

/// Records every navigation
#[derive(Debug, Clone, Default)]
pub struct HistoryNavigator {
    history: Arc<Mutex<Vec<String>>>,
}

impl HistoryNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn history(&self) -> Vec<String> {
        self.history.lock().clone()
    }

    pub fn current(&self) -> Option<String> {
        self.history.lock().last().cloned()
    }
}

impl Navigator for HistoryNavigator {
    fn navigate(&mut self, route: &str) {
        log::debug!("Navigating to {}", route);
        self.history.lock().push(route.to_string());
    }
}

#[derive(Debug, Default)]
struct AuthState {
    user: Option<UserId>,
    sign_outs: usize,
}

/// Single-user in-process auth
#[derive(Debug, Clone, Default)]
pub struct LocalAuth {
    state: Arc<Mutex<AuthState>>,
}

impl LocalAuth {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signed_in(user: UserId) -> Self {
        let auth = Self::new();
        auth.sign_in(user);
        auth
    }

    pub fn sign_in(&self, user: UserId) {
        log::info!("User {} signed in", user);
        self.state.lock().user = Some(user);
    }

    pub fn sign_out_count(&self) -> usize {
        self.state.lock().sign_outs
    }
}

impl AuthProvider for LocalAuth {
    fn current_user_id(&self) -> Option<UserId> {
        self.state.lock().user.clone()
    }

    fn sign_out(&mut self) {
        let mut state = self.state.lock();
        if let Some(user) = state.user.take() {
            log::info!("User {} signed out", user);
        }
        state.sign_outs += 1;
    }
}

/// Per-tab scratch values (draft form contents and the like)
#[derive(Debug, Clone, Default)]
pub struct ScratchStorage {
    entries: Arc<Mutex<HashMap<TabId, String>>>,
}

impl ScratchStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, tab: TabId, value: impl Into<String>) {
        self.entries.lock().insert(tab, value.into());
    }

    pub fn get(&self, tab: &TabId) -> Option<String> {
        self.entries.lock().get(tab).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl EphemeralTabStorage for ScratchStorage {
    fn clear(&mut self) {
        let mut entries = self.entries.lock();
        log::debug!("Clearing {} scratch entries", entries.len());
        entries.clear();
    }
}
