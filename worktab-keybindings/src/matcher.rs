//! Key event matching.
//!
//! Both sides are reduced to a winit `ModifiersState` plus a normalized key,
//! with `CmdOrCtrl` resolved for the registry's platform.

use crate::parser::{KeyCombo, Modifiers, ParsedKey};
use crate::platform::Platform;
use winit::keyboard::{Key, ModifiersState, NamedKey, SmolStr};

/// Modifiers that take part in shortcut matching
const SHORTCUT_MODIFIERS: ModifiersState = ModifiersState::CONTROL
    .union(ModifiersState::ALT)
    .union(ModifiersState::SHIFT)
    .union(ModifiersState::SUPER);

/// A key press as delivered by the host's event loop.
///
/// Built from winit's public key model so hosts can forward
/// `KeyEvent::logical_key` and the current `ModifiersState` directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyInput {
    pub key: Key,
    pub modifiers: ModifiersState,
}

impl KeyInput {
    pub fn new(key: Key, modifiers: ModifiersState) -> Self {
        Self { key, modifiers }
    }

    /// A character key press, e.g. `KeyInput::character("w", ModifiersState::CONTROL)`.
    pub fn character(ch: &str, modifiers: ModifiersState) -> Self {
        Self::new(Key::Character(SmolStr::new(ch)), modifiers)
    }

    pub fn named(key: NamedKey, modifiers: ModifiersState) -> Self {
        Self::new(Key::Named(key), modifiers)
    }

    /// The key press that triggers `combo` on `platform`.
    ///
    /// Lets scripted hosts describe key presses as binding strings.
    pub fn from_combo(combo: &KeyCombo, platform: Platform) -> Self {
        let key = match &combo.key {
            ParsedKey::Character(c) => Key::Character(SmolStr::new(c.to_string())),
            ParsedKey::Named(named) => Key::Named(*named),
        };
        Self::new(key, combo.modifiers.resolve(platform))
    }
}

impl Modifiers {
    /// The exact modifier state this combo requires on `platform`.
    pub fn resolve(&self, platform: Platform) -> ModifiersState {
        let mut state = ModifiersState::empty();
        state.set(ModifiersState::CONTROL, self.ctrl);
        state.set(ModifiersState::ALT, self.alt);
        state.set(ModifiersState::SHIFT, self.shift);
        state.set(ModifiersState::SUPER, self.super_key);
        if self.cmd_or_ctrl {
            state.insert(platform.primary_modifier());
        }
        state
    }
}

/// A key press normalized for comparison against [`KeyCombo`]s.
#[derive(Debug)]
pub struct KeybindingMatcher {
    modifiers: ModifiersState,
    key: Option<ParsedKey>,
}

impl KeybindingMatcher {
    pub fn from_input(input: &KeyInput) -> Self {
        let key = match &input.key {
            // Shift+t arrives as "T" or "t" depending on the platform
            Key::Character(c) => c
                .chars()
                .next()
                .map(|ch| ParsedKey::Character(ch.to_ascii_uppercase())),
            Key::Named(named) => Some(ParsedKey::Named(*named)),
            _ => None,
        };

        Self {
            modifiers: input.modifiers.intersection(SHORTCUT_MODIFIERS),
            key,
        }
    }

    /// True if the key is the combo's key and the modifiers match exactly.
    pub fn matches(&self, combo: &KeyCombo, platform: Platform) -> bool {
        self.key.as_ref() == Some(&combo.key) && self.modifiers == combo.modifiers.resolve(platform)
    }
}
