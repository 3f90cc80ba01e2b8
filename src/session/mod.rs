//! Tab set persistence
//!
//! Saves the open-tab set per user so it survives logout and follows the
//! user across devices. Only the persisted form of a tab is stored: unsaved
//! change flags and activity timestamps stay in memory.

pub mod storage;
pub mod sync;

pub use storage::{FileTabStore, MemoryTabStore, StoreError, TabStore};
pub use sync::{LoadTicket, Observation, PendingWrite, PersistenceSync, SyncPhase, SyncTiming, WriteOutcome};

use crate::tab::TabId;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Identifier of the signed-in user owning a tab set
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Stored form of a tab
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedTab {
    pub id: TabId,
    pub route: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    pub module_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_type: Option<String>,
    #[serde(default)]
    pub is_pinned: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_name: Option<String>,
}

/// The unit of persistence: ordered tabs plus the active tab
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabSet {
    #[serde(default)]
    pub tabs: Vec<PersistedTab>,
    #[serde(default)]
    pub active_tab_id: Option<TabId>,
}

impl TabSet {
    pub fn is_empty(&self) -> bool {
        self.tabs.is_empty()
    }

    /// SHA-256 over the JSON encoding.
    ///
    /// Field order is fixed by the struct definitions, so equal sets always
    /// hash equally.
    pub fn content_hash(&self) -> ContentHash {
        let mut hasher = Sha256::new();
        if let Err(e) = serde_json::to_writer(&mut hasher, self) {
            log::error!("Failed to encode tab set for hashing: {}", e);
        }
        ContentHash(format!("{:x}", hasher.finalize()))
    }
}

/// Hex digest identifying the serialized content of a [`TabSet`]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentHash(String);

impl ContentHash {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short form is enough to tell writes apart in logs
        f.write_str(self.0.get(..12).unwrap_or(&self.0))
    }
}
