//! Keybinding system for worktab.
//!
//! Runtime-configurable keyboard shortcuts that map key combinations to tab
//! action names. Bindings come from the `keybindings` list in config.yaml.
//!
//! Features:
//! - Configurable key combinations (CmdOrCtrl+W, Ctrl+Shift+Tab, etc.)
//! - Platform-aware `CmdOrCtrl` (Cmd on macOS, Ctrl elsewhere)

mod matcher;
pub mod parser;
pub mod platform;

pub use matcher::{KeyInput, KeybindingMatcher};
pub use parser::{KeyCombo, ParseError, parse_key_combo};
pub use platform::Platform;

use worktab_config::KeyBinding;

/// Shortcut table for one platform, mapping key presses to action names.
#[derive(Debug)]
pub struct KeybindingRegistry {
    /// Config order; the first binding for a key press wins
    bindings: Vec<(KeyCombo, String)>,
    platform: Platform,
}

impl Default for KeybindingRegistry {
    fn default() -> Self {
        Self::new(Platform::current())
    }
}

impl KeybindingRegistry {
    pub fn new(platform: Platform) -> Self {
        Self {
            bindings: Vec::new(),
            platform,
        }
    }

    /// Build a registry for the current platform.
    pub fn from_config(keybindings: &[KeyBinding]) -> Self {
        Self::from_config_for(keybindings, Platform::current())
    }

    /// Build a registry for an explicit platform.
    ///
    /// Unparseable entries are logged and skipped. Two entries that resolve
    /// to the same key press on this platform (`CmdOrCtrl+W` and `Ctrl+W`
    /// off macOS) keep the first.
    pub fn from_config_for(keybindings: &[KeyBinding], platform: Platform) -> Self {
        let mut registry = Self::new(platform);
        for binding in keybindings {
            if let Err(e) = registry.add(&binding.key, &binding.action) {
                log::warn!(
                    "Skipping keybinding '{}' -> {}: {}",
                    binding.key,
                    binding.action,
                    e
                );
            }
        }
        log::info!(
            "Keybinding registry ready: {} of {} bindings ({:?})",
            registry.len(),
            keybindings.len(),
            platform
        );
        registry
    }

    /// Parse and register one binding. Returns false if its key press is
    /// already taken.
    pub fn add(&mut self, key: &str, action: &str) -> Result<bool, ParseError> {
        let combo = parse_key_combo(key)?;
        let press = KeyInput::from_combo(&combo, self.platform);
        if let Some(existing) = self.lookup(&press) {
            log::warn!(
                "Keybinding '{}' -> {} shadowed by earlier binding for {}",
                key,
                action,
                existing
            );
            return Ok(false);
        }
        log::debug!("Registered keybinding {} -> {}", combo, action);
        self.bindings.push((combo, action.to_string()));
        Ok(true)
    }

    /// Action bound to a key press, if any.
    pub fn lookup(&self, input: &KeyInput) -> Option<&str> {
        let matcher = KeybindingMatcher::from_input(input);
        self.bindings
            .iter()
            .find(|(combo, _)| matcher.matches(combo, self.platform))
            .map(|(_, action)| action.as_str())
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_registry_is_empty() {
        let registry = KeybindingRegistry::new(Platform::Other);
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn unparseable_binding_is_skipped() {
        let bindings = vec![
            KeyBinding::new("NotAKey", "reopen_closed_tab"),
            KeyBinding::new("Ctrl+W", "close_tab"),
        ];
        let registry = KeybindingRegistry::from_config_for(&bindings, Platform::Other);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn same_key_press_keeps_the_first_binding() {
        let bindings = vec![
            KeyBinding::new("CmdOrCtrl+W", "close_tab"),
            KeyBinding::new("ctrl+w", "next_tab"),
        ];
        let other = KeybindingRegistry::from_config_for(&bindings, Platform::Other);
        assert_eq!(other.len(), 1);

        // On macOS CmdOrCtrl is Cmd, so Ctrl+W is a different press
        let mac = KeybindingRegistry::from_config_for(&bindings, Platform::MacOs);
        assert_eq!(mac.len(), 2);
    }

    #[test]
    fn add_reports_parse_errors() {
        let mut registry = KeybindingRegistry::new(Platform::Other);
        assert!(registry.add("Ctrl+", "close_tab").is_err());
        assert_eq!(registry.add("Ctrl+W", "close_tab"), Ok(true));
        assert_eq!(registry.add("Ctrl+W", "next_tab"), Ok(false));
    }
}
