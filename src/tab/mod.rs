//! Workspace tab model
//!
//! This module provides the in-memory tab infrastructure:
//! - `WorkspaceTab`: a single open work item (route, display metadata, flags)
//! - `TabRegistry`: the ordered collection of open tabs and all its mutations
//! - `LastClosedStack`: bounded history backing "reopen last closed tab"
//! - `TabId`: opaque identifier, stable for a tab's lifetime

mod closed;
mod manager;

pub use closed::LastClosedStack;
pub use manager::TabRegistry;

use crate::session::PersistedTab;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Reserved id of the dashboard tab, which always exists.
pub const DASHBOARD_TAB_ID: &str = "dashboard";

/// Unique identifier for a workspace tab
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TabId(String);

impl TabId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh random id for a newly opened tab.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn dashboard() -> Self {
        Self(DASHBOARD_TAB_ID.to_string())
    }

    pub fn is_dashboard(&self) -> bool {
        self.0 == DASHBOARD_TAB_ID
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TabId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for TabId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A single open work item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceTab {
    pub id: TabId,
    /// Navigable location
    pub route: String,
    pub title: String,
    pub subtitle: Option<String>,
    pub icon_name: Option<String>,
    /// Coarse business-area classification (e.g. "employees", "payroll")
    pub module_code: String,
    /// Record being viewed or edited, if any
    pub context_id: Option<String>,
    pub context_type: Option<String>,
    /// Pinned tabs are exempt from close and keyboard close
    pub is_pinned: bool,
    /// Set by the tab's content, cleared on save or discard. Never persisted.
    pub has_unsaved_changes: bool,
    /// Updated whenever the tab becomes active; picks the successor on close.
    pub last_active_at: DateTime<Utc>,
}

impl WorkspaceTab {
    /// Create a tab with a freshly generated id.
    pub fn new(
        route: impl Into<String>,
        title: impl Into<String>,
        module_code: impl Into<String>,
    ) -> Self {
        Self {
            id: TabId::generate(),
            route: route.into(),
            title: title.into(),
            subtitle: None,
            icon_name: None,
            module_code: module_code.into(),
            context_id: None,
            context_type: None,
            is_pinned: false,
            has_unsaved_changes: false,
            last_active_at: DateTime::<Utc>::UNIX_EPOCH,
        }
    }

    /// The reserved dashboard tab.
    pub fn dashboard(route: impl Into<String>) -> Self {
        Self::new(route, "Dashboard", "dashboard").with_id(TabId::dashboard())
    }

    pub fn with_id(mut self, id: impl Into<TabId>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_subtitle(mut self, subtitle: impl Into<String>) -> Self {
        self.subtitle = Some(subtitle.into());
        self
    }

    pub fn with_icon(mut self, icon_name: impl Into<String>) -> Self {
        self.icon_name = Some(icon_name.into());
        self
    }

    pub fn with_context(
        mut self,
        context_id: impl Into<String>,
        context_type: impl Into<String>,
    ) -> Self {
        self.context_id = Some(context_id.into());
        self.context_type = Some(context_type.into());
        self
    }

    pub fn pinned(mut self) -> Self {
        self.is_pinned = true;
        self
    }

    pub fn is_dashboard(&self) -> bool {
        self.id.is_dashboard()
    }

    /// Strip the runtime-only fields for storage.
    pub fn to_persisted(&self) -> PersistedTab {
        PersistedTab {
            id: self.id.clone(),
            route: self.route.clone(),
            title: self.title.clone(),
            subtitle: self.subtitle.clone(),
            module_code: self.module_code.clone(),
            context_id: self.context_id.clone(),
            context_type: self.context_type.clone(),
            is_pinned: self.is_pinned,
            icon_name: self.icon_name.clone(),
        }
    }

    /// Rebuild a clean tab from its stored form.
    pub fn from_persisted(tab: PersistedTab) -> Self {
        Self {
            id: tab.id,
            route: tab.route,
            title: tab.title,
            subtitle: tab.subtitle,
            icon_name: tab.icon_name,
            module_code: tab.module_code,
            context_id: tab.context_id,
            context_type: tab.context_type,
            is_pinned: tab.is_pinned,
            has_unsaved_changes: false,
            last_active_at: DateTime::<Utc>::UNIX_EPOCH,
        }
    }
}
