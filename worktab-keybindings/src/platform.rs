//! Platform conventions: the primary shortcut modifier and key names.

use winit::keyboard::{ModifiersState, NamedKey};

/// Which modifier convention the host follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    /// Command (Super) is the primary shortcut modifier.
    MacOs,
    /// Control is the primary shortcut modifier (Windows, Linux, BSD).
    Other,
}

impl Platform {
    /// The platform this binary was compiled for.
    pub fn current() -> Self {
        if cfg!(target_os = "macos") {
            Platform::MacOs
        } else {
            Platform::Other
        }
    }

    /// What `CmdOrCtrl` stands for here.
    pub fn primary_modifier(self) -> ModifiersState {
        match self {
            Platform::MacOs => ModifiersState::SUPER,
            Platform::Other => ModifiersState::CONTROL,
        }
    }
}

const NAMED_KEYS: &[(&[&str], NamedKey)] = &[
    (&["tab"], NamedKey::Tab),
    (&["enter", "return"], NamedKey::Enter),
    (&["escape", "esc"], NamedKey::Escape),
    (&["space"], NamedKey::Space),
    (&["backspace"], NamedKey::Backspace),
    (&["delete", "del"], NamedKey::Delete),
    (&["home"], NamedKey::Home),
    (&["end"], NamedKey::End),
    (&["pageup", "pgup"], NamedKey::PageUp),
    (&["pagedown", "pgdn"], NamedKey::PageDown),
    (&["up", "arrowup"], NamedKey::ArrowUp),
    (&["down", "arrowdown"], NamedKey::ArrowDown),
    (&["left", "arrowleft"], NamedKey::ArrowLeft),
    (&["right", "arrowright"], NamedKey::ArrowRight),
];

const FUNCTION_KEYS: [NamedKey; 12] = [
    NamedKey::F1,
    NamedKey::F2,
    NamedKey::F3,
    NamedKey::F4,
    NamedKey::F5,
    NamedKey::F6,
    NamedKey::F7,
    NamedKey::F8,
    NamedKey::F9,
    NamedKey::F10,
    NamedKey::F11,
    NamedKey::F12,
];

/// Look up a named key (case-insensitive), e.g. `"Tab"`, `"Esc"`, `"F5"`.
pub fn parse_named_key(s: &str) -> Option<NamedKey> {
    let lower = s.to_ascii_lowercase();

    if let Some(n) = lower.strip_prefix('f').and_then(|n| n.parse::<usize>().ok()) {
        return n.checked_sub(1).and_then(|i| FUNCTION_KEYS.get(i)).copied();
    }

    NAMED_KEYS
        .iter()
        .find(|(aliases, _)| aliases.contains(&lower.as_str()))
        .map(|(_, key)| *key)
}
