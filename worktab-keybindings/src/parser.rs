//! Shortcut string parser.
//!
//! Turns strings such as `"CmdOrCtrl+Shift+T"` into a [`KeyCombo`]. The last
//! `+`-separated token is the key; every token before it must be a modifier.

use crate::platform::parse_named_key;
use std::fmt;
use winit::keyboard::NamedKey;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("empty shortcut")]
    Empty,
    #[error("shortcut '{0}' has no key after its modifiers")]
    MissingKey(String),
    #[error("'{token}' in '{combo}' is not a modifier")]
    NotAModifier { combo: String, token: String },
    #[error("unknown key '{0}'")]
    UnknownKey(String),
}

/// Modifiers requested by a shortcut.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Modifiers {
    pub ctrl: bool,
    pub alt: bool,
    pub shift: bool,
    pub super_key: bool,
    /// Cmd on macOS, Ctrl elsewhere; resolved at match time
    pub cmd_or_ctrl: bool,
}

impl Modifiers {
    /// Set the flag named by `token`. Returns false if it names no modifier.
    fn apply(&mut self, token: &str) -> bool {
        let flag = match token.to_ascii_lowercase().as_str() {
            "cmdorctrl" | "commandorcontrol" => &mut self.cmd_or_ctrl,
            "ctrl" | "control" => &mut self.ctrl,
            "alt" | "option" => &mut self.alt,
            "shift" => &mut self.shift,
            "super" | "cmd" | "command" | "meta" | "win" => &mut self.super_key,
            _ => return false,
        };
        *flag = true;
        true
    }

    fn names(&self) -> impl Iterator<Item = &'static str> {
        [
            (self.cmd_or_ctrl, "CmdOrCtrl"),
            (self.ctrl, "Ctrl"),
            (self.alt, "Alt"),
            (self.shift, "Shift"),
            (self.super_key, "Super"),
        ]
        .into_iter()
        .filter_map(|(on, name)| on.then_some(name))
    }
}

/// Modifiers plus the key they apply to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyCombo {
    pub modifiers: Modifiers,
    pub key: ParsedKey,
}

impl fmt::Display for KeyCombo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for name in self.modifiers.names() {
            write!(f, "{name}+")?;
        }
        match &self.key {
            ParsedKey::Character(c) => write!(f, "{c}"),
            ParsedKey::Named(n) => write!(f, "{n:?}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ParsedKey {
    /// Printable key, stored uppercased (`W`, `T`, `1`)
    Character(char),
    /// Non-printable key (`Tab`, `Escape`, `F1`)
    Named(NamedKey),
}

impl ParsedKey {
    fn parse(token: &str) -> Result<Self, ParseError> {
        if let Some(named) = parse_named_key(token) {
            return Ok(Self::Named(named));
        }
        let mut chars = token.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Ok(Self::Character(c.to_ascii_uppercase())),
            _ => Err(ParseError::UnknownKey(token.to_string())),
        }
    }
}

/// Parse a shortcut string.
///
/// Modifier names are case-insensitive and accept the usual aliases
/// (`Control`, `Option`, `Cmd`, `Meta`, `Win`). Keys are single characters
/// or the named keys understood by [`parse_named_key`].
pub fn parse_key_combo(s: &str) -> Result<KeyCombo, ParseError> {
    let tokens: Vec<&str> = s.split('+').map(str::trim).collect();
    let Some((key, modifier_tokens)) = tokens.split_last() else {
        return Err(ParseError::Empty);
    };
    if tokens.iter().all(|t| t.is_empty()) {
        return Err(ParseError::Empty);
    }

    let mut modifiers = Modifiers::default();
    for token in modifier_tokens {
        if !modifiers.apply(token) {
            return Err(ParseError::NotAModifier {
                combo: s.to_string(),
                token: token.to_string(),
            });
        }
    }

    // "Ctrl+Shift" parses the last modifier as the key otherwise
    if key.is_empty() || Modifiers::default().apply(key) {
        return Err(ParseError::MissingKey(s.to_string()));
    }

    Ok(KeyCombo {
        modifiers,
        key: ParsedKey::parse(key)?,
    })
}
