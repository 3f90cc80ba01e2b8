//! Configuration system for worktab.
//!
//! This crate provides configuration loading, saving, and default values
//! for the workspace tab session manager. It includes:
//!
//! - Persistence timing (debounce, retry backoff)
//! - Closed-tab history size and reserved routes
//! - Keyboard shortcut bindings
//! - Log level and storage directory overrides

pub mod config;
pub mod defaults;
pub mod error;
mod types;

pub use config::Config;
pub use error::ConfigError;
pub use types::{KeyBinding, LogLevel};
