//! Default value functions for configuration.
//!
//! Each function is used as a `#[serde(default = "crate::defaults::...")]`
//! attribute on a `Config` field so partially written config files still load.

use crate::types::KeyBinding;

/// Quiet period before the open-tab set is written to the store.
pub fn persist_debounce_ms() -> u64 {
    2000
}

pub fn retry_initial_backoff_ms() -> u64 {
    1000
}

pub fn retry_max_backoff_ms() -> u64 {
    60_000
}

/// Number of closed tabs remembered for "reopen last closed tab".
pub fn closed_tab_history() -> usize {
    10
}

pub fn dashboard_route() -> String {
    "/dashboard".to_string()
}

pub fn post_logout_route() -> String {
    "/login".to_string()
}

/// Default keyboard shortcuts.
///
/// `CmdOrCtrl` resolves to Cmd on macOS and Ctrl everywhere else, so one
/// table serves every platform.
pub fn keybindings() -> Vec<KeyBinding> {
    let mut bindings = vec![
        KeyBinding::new("CmdOrCtrl+W", "close_tab"),
        KeyBinding::new("CmdOrCtrl+Shift+T", "reopen_closed_tab"),
        KeyBinding::new("CmdOrCtrl+Tab", "next_tab"),
        KeyBinding::new("CmdOrCtrl+Shift+Tab", "prev_tab"),
    ];
    for n in 1..=9 {
        bindings.push(KeyBinding::new(
            format!("CmdOrCtrl+{n}"),
            format!("switch_to_tab_{n}"),
        ));
    }
    bindings
}
