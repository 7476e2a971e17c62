use std::{collections::HashMap, fmt, str::FromStr};

use serde::Deserialize;
use winit::{
    event::{ElementState, MouseButton},
    keyboard::{self, ModifiersState, NamedKey},
};

use crate::{
    cmd::Cmd,
    math::{vec2, Vec2f},
};

/// The mouse button that draws and picks palette colors.
pub const PRIMARY_BUTTON: MouseButton = MouseButton::Left;

/// Identifies a key independently of keyboard layout state.
///
/// Characters are stored lower-cased, so `C` and `c` name the same key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Named(NamedKey),
    Char(char),
}

impl Key {
    /// Converts a winit logical key, returning `None` for dead and unidentified keys.
    pub fn from_logical(key: &keyboard::Key) -> Option<Self> {
        match key {
            keyboard::Key::Named(named) => Some(Key::Named(*named)),
            keyboard::Key::Character(s) => Self::from_char_str(s),
            _ => None,
        }
    }

    fn from_char_str(s: &str) -> Option<Self> {
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Some(Key::Char(lowercase(c))),
            _ => None,
        }
    }
}

fn lowercase(c: char) -> char {
    let mut lower = c.to_lowercase();
    match (lower.next(), lower.next()) {
        (Some(l), None) => l,
        _ => c,
    }
}

const NAMED_KEYS: &[(&str, NamedKey)] = &[
    ("ArrowUp", NamedKey::ArrowUp),
    ("Up", NamedKey::ArrowUp),
    ("ArrowDown", NamedKey::ArrowDown),
    ("Down", NamedKey::ArrowDown),
    ("ArrowLeft", NamedKey::ArrowLeft),
    ("Left", NamedKey::ArrowLeft),
    ("ArrowRight", NamedKey::ArrowRight),
    ("Right", NamedKey::ArrowRight),
    ("Escape", NamedKey::Escape),
    ("Space", NamedKey::Space),
    ("Enter", NamedKey::Enter),
    ("Tab", NamedKey::Tab),
    ("Backspace", NamedKey::Backspace),
    ("Delete", NamedKey::Delete),
    ("Home", NamedKey::Home),
    ("End", NamedKey::End),
    ("PageUp", NamedKey::PageUp),
    ("PageDown", NamedKey::PageDown),
];

#[derive(Debug)]
pub struct UnknownKey(String);

impl fmt::Display for UnknownKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown key name '{}'", self.0)
    }
}

impl std::error::Error for UnknownKey {}

impl FromStr for Key {
    type Err = UnknownKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(key) = Self::from_char_str(s) {
            return Ok(key);
        }
        NAMED_KEYS
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(s))
            .map(|&(_, named)| Key::Named(named))
            .ok_or_else(|| UnknownKey(s.to_string()))
    }
}

/// Maps keys to the brush commands they trigger.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct Bindings(HashMap<Key, Cmd>);

impl Bindings {
    pub fn get(&self, key: Key) -> Option<Cmd> {
        self.0.get(&key).copied()
    }
}

impl Default for Bindings {
    /// Arrow keys adjust size and opacity, `C` clears the canvas.
    fn default() -> Self {
        Self(HashMap::from([
            (Key::Named(NamedKey::ArrowUp), Cmd::Grow),
            (Key::Named(NamedKey::ArrowDown), Cmd::Shrink),
            (Key::Named(NamedKey::ArrowLeft), Cmd::Fade),
            (Key::Named(NamedKey::ArrowRight), Cmd::Intensify),
            (Key::Char('c'), Cmd::Clear),
        ]))
    }
}

/// Tracks the host's pointer state between events.
///
/// winit only reports changes, so the last known position, primary button state and modifiers
/// are kept here for the handlers that need to query them.
#[derive(Debug, Clone, Copy)]
pub struct Pointer {
    pub position: Vec2f,
    pub primary_down: bool,
    pub modifiers: ModifiersState,
}

impl Default for Pointer {
    fn default() -> Self {
        Self {
            position: vec2(0.0, 0.0),
            primary_down: false,
            modifiers: ModifiersState::empty(),
        }
    }
}

impl Pointer {
    pub fn update_button(&mut self, button: MouseButton, state: ElementState) {
        if button == PRIMARY_BUTTON {
            self.primary_down = state.is_pressed();
        }
    }
}
