//! Keyboard chords such as `ctrl+shift+d`, `esc` or `t`.
//!
//! Chords are written in profiles and passed to engines, which translate them
//! into platform input events.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::AutomationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Modifier {
    Ctrl,
    Alt,
    Shift,
    Win,
}

impl Modifier {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "ctrl" | "control" => Some(Modifier::Ctrl),
            "alt" | "menu" => Some(Modifier::Alt),
            "shift" => Some(Modifier::Shift),
            "win" | "super" | "cmd" => Some(Modifier::Win),
            _ => None,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            Modifier::Ctrl => "ctrl",
            Modifier::Alt => "alt",
            Modifier::Shift => "shift",
            Modifier::Win => "win",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    /// A printable character, stored lowercase.
    Char(char),
    Enter,
    Escape,
    Tab,
    Space,
    Backspace,
    Delete,
    Home,
    End,
    PageUp,
    PageDown,
    Up,
    Down,
    Left,
    Right,
    F(u8),
}

impl Key {
    fn parse(s: &str) -> Option<Self> {
        let key = match s {
            "enter" | "return" => Key::Enter,
            "esc" | "escape" => Key::Escape,
            "tab" => Key::Tab,
            "space" => Key::Space,
            "backspace" | "bs" => Key::Backspace,
            "delete" | "del" => Key::Delete,
            "home" => Key::Home,
            "end" => Key::End,
            "pageup" | "pgup" | "page_up" => Key::PageUp,
            "pagedown" | "pgdn" | "page_down" => Key::PageDown,
            "up" => Key::Up,
            "down" => Key::Down,
            "left" => Key::Left,
            "right" => Key::Right,
            _ => {
                if let Some(n) = s.strip_prefix('f').and_then(|n| n.parse::<u8>().ok()) {
                    if (1..=12).contains(&n) {
                        return Some(Key::F(n));
                    }
                    return None;
                }
                let mut chars = s.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) if c.is_ascii_alphanumeric() => Key::Char(c),
                    _ => return None,
                }
            }
        };
        Some(key)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Char(c) => write!(f, "{c}"),
            Key::F(n) => write!(f, "f{n}"),
            Key::Enter => f.write_str("enter"),
            Key::Escape => f.write_str("esc"),
            Key::Tab => f.write_str("tab"),
            Key::Space => f.write_str("space"),
            Key::Backspace => f.write_str("backspace"),
            Key::Delete => f.write_str("delete"),
            Key::Home => f.write_str("home"),
            Key::End => f.write_str("end"),
            Key::PageUp => f.write_str("pageup"),
            Key::PageDown => f.write_str("pagedown"),
            Key::Up => f.write_str("up"),
            Key::Down => f.write_str("down"),
            Key::Left => f.write_str("left"),
            Key::Right => f.write_str("right"),
        }
    }
}

/// A main key plus the modifiers held while it is pressed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct KeyChord {
    modifiers: Vec<Modifier>,
    key: Key,
}

impl KeyChord {
    pub fn new(modifiers: impl IntoIterator<Item = Modifier>, key: Key) -> Self {
        let mut modifiers: Vec<Modifier> = modifiers.into_iter().collect();
        modifiers.sort();
        modifiers.dedup();
        Self { modifiers, key }
    }

    pub fn key(key: Key) -> Self {
        Self::new([], key)
    }

    pub fn modifiers(&self) -> &[Modifier] {
        &self.modifiers
    }

    pub fn main_key(&self) -> Key {
        self.key
    }

    pub fn has(&self, modifier: Modifier) -> bool {
        self.modifiers.contains(&modifier)
    }

    pub fn is_plain(&self, key: Key) -> bool {
        self.modifiers.is_empty() && self.key == key
    }
}

impl FromStr for KeyChord {
    type Err = AutomationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_lowercase();
        if lowered.is_empty() {
            return Err(AutomationError::InvalidArgument(
                "empty key chord".to_string(),
            ));
        }

        let mut modifiers = Vec::new();
        let mut key = None;
        for part in lowered.split('+').map(str::trim) {
            if let Some(m) = Modifier::parse(part) {
                modifiers.push(m);
                continue;
            }
            if key.is_some() {
                return Err(AutomationError::InvalidArgument(format!(
                    "key chord '{s}' names more than one main key"
                )));
            }
            key = Some(Key::parse(part).ok_or_else(|| {
                AutomationError::InvalidArgument(format!("unknown key '{part}' in chord '{s}'"))
            })?);
        }

        let key = key.ok_or_else(|| {
            AutomationError::InvalidArgument(format!("key chord '{s}' has no main key"))
        })?;
        Ok(KeyChord::new(modifiers, key))
    }
}

impl TryFrom<String> for KeyChord {
    type Error = AutomationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<KeyChord> for String {
    fn from(chord: KeyChord) -> Self {
        chord.to_string()
    }
}

impl From<Key> for KeyChord {
    fn from(key: Key) -> Self {
        KeyChord::key(key)
    }
}

impl fmt::Display for KeyChord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for m in &self.modifiers {
            write!(f, "{}+", m.as_str())?;
        }
        write!(f, "{}", self.key)
    }
}
