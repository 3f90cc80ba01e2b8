//! Keyboard shortcut dispatch
//!
//! Resolves key presses to [`TabAction`]s through the configurable
//! keybinding registry. Executing the action is up to the session.

use worktab_config::Config;
use worktab_keybindings::{KeyInput, KeybindingRegistry, Platform};

/// Tab operations reachable from the keyboard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabAction {
    CloseActiveTab,
    ReopenClosedTab,
    NextTab,
    PrevTab,
    /// 1-based position in the tab bar
    SwitchToTab(usize),
}

impl TabAction {
    /// Parse a config action name (`close_tab`, `switch_to_tab_3`, ...).
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "close_tab" => Some(Self::CloseActiveTab),
            "reopen_closed_tab" => Some(Self::ReopenClosedTab),
            "next_tab" => Some(Self::NextTab),
            "prev_tab" => Some(Self::PrevTab),
            _ => name
                .strip_prefix("switch_to_tab_")
                .and_then(|n| n.parse::<usize>().ok())
                .filter(|n| (1..=9).contains(n))
                .map(Self::SwitchToTab),
        }
    }

    pub fn name(&self) -> String {
        match self {
            Self::CloseActiveTab => "close_tab".to_string(),
            Self::ReopenClosedTab => "reopen_closed_tab".to_string(),
            Self::NextTab => "next_tab".to_string(),
            Self::PrevTab => "prev_tab".to_string(),
            Self::SwitchToTab(n) => format!("switch_to_tab_{n}"),
        }
    }
}

/// Maps key presses to tab actions
#[derive(Debug)]
pub struct ShortcutDispatcher {
    registry: KeybindingRegistry,
}

impl ShortcutDispatcher {
    pub fn new(registry: KeybindingRegistry) -> Self {
        Self { registry }
    }

    /// Build from the config's keybindings for the current platform.
    pub fn from_config(config: &Config) -> Self {
        Self::for_platform(config, Platform::current())
    }

    pub fn for_platform(config: &Config, platform: Platform) -> Self {
        Self::new(KeybindingRegistry::from_config_for(
            &config.keybindings,
            platform,
        ))
    }

    /// The tab action bound to `input`, if any.
    pub fn resolve(&self, input: &KeyInput) -> Option<TabAction> {
        let name = self.registry.lookup(input)?;
        let action = TabAction::from_name(name);
        if action.is_none() {
            log::debug!("Keybinding action '{}' is not a tab action", name);
        }
        action
    }

    pub fn platform(&self) -> Platform {
        self.registry.platform()
    }

    pub fn binding_count(&self) -> usize {
        self.registry.len()
    }
}
