// Library exports for testing and embedding in a host UI.
//
// A host owns one `TabSession`, feeds it user actions and key presses, and
// drives persistence from its own event loop (see `shell` for the reference
// loop built on a tokio current-thread runtime).

/// Application version (root crate version, for use by sub-crates).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod cli;
pub mod debug;
pub mod services;
pub mod session;
pub mod shell;
pub mod shortcuts;
pub mod tab;
pub mod tab_session;
pub mod unsaved_guard;

pub use session::{FileTabStore, MemoryTabStore, PersistedTab, TabSet, TabStore, UserId};
pub use tab::{DASHBOARD_TAB_ID, TabId, TabRegistry, WorkspaceTab};
pub use tab_session::{ActionOutcome, Collaborators, TabSession};
