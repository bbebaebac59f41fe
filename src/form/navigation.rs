use std::fmt;
use std::str::FromStr;

use crate::errors::{FormError, Result};
use crate::form::registry::FieldRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

/// Computes the next field to focus. Order is registration order and wraps
/// at both ends.
pub struct NavigationController;

impl NavigationController {
    /// `current = None` starts from the edge: the first field going forward,
    /// the last going backward.
    pub fn next(
        registry: &FieldRegistry,
        current: Option<&str>,
        direction: Direction,
    ) -> Result<String> {
        let len = registry.len();
        if len == 0 {
            return Err(FormError::EmptyForm);
        }

        let target = match (current, direction) {
            (None, Direction::Forward) => 0,
            (None, Direction::Backward) => len - 1,
            (Some(name), Direction::Forward) => (registry.position(name)? + 1) % len,
            (Some(name), Direction::Backward) => (registry.position(name)? + len - 1) % len,
        };

        registry
            .name_at(target)
            .map(str::to_string)
            .ok_or(FormError::EmptyForm)
    }

    pub fn first(registry: &FieldRegistry) -> Result<String> {
        Self::next(registry, None, Direction::Forward)
    }
}

/// Keys the form reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormKey {
    Tab,
    Enter,
    Up,
    Down,
    Escape,
    F(u8),
    Char(char),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeyModifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
}

impl KeyModifiers {
    pub const NONE: KeyModifiers = KeyModifiers {
        shift: false,
        ctrl: false,
        alt: false,
    };

    pub const SHIFT: KeyModifiers = KeyModifiers {
        shift: true,
        ctrl: false,
        alt: false,
    };

    pub const CTRL: KeyModifiers = KeyModifiers {
        shift: false,
        ctrl: true,
        alt: false,
    };
}

/// What a key press asks the form to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyCommand {
    Navigate(Direction),
    EnterQuery,
    ExecuteQuery,
    CancelQuery,
    ListValues,
    Save,
    ClearForm,
    Ignored,
}

/// Terminal-style key map: Tab/Enter/Down move forward, Shift+Tab/Up move
/// back, F7/F8 enter and execute a query, F9 lists values, F10 or Ctrl+S
/// saves, Shift+F7 clears the form and Esc cancels a query.
pub fn key_command(key: FormKey, modifiers: KeyModifiers) -> KeyCommand {
    match (key, modifiers.shift, modifiers.ctrl) {
        (FormKey::Tab, true, _) | (FormKey::Up, _, _) => KeyCommand::Navigate(Direction::Backward),
        (FormKey::Tab, false, _) | (FormKey::Enter, _, _) | (FormKey::Down, _, _) => {
            KeyCommand::Navigate(Direction::Forward)
        }
        (FormKey::F(7), true, _) => KeyCommand::ClearForm,
        (FormKey::F(7), false, _) => KeyCommand::EnterQuery,
        (FormKey::F(8), _, _) => KeyCommand::ExecuteQuery,
        (FormKey::F(9), _, _) => KeyCommand::ListValues,
        (FormKey::F(10), _, _) => KeyCommand::Save,
        (FormKey::Char(c), _, true) if c.eq_ignore_ascii_case(&'s') => KeyCommand::Save,
        (FormKey::Escape, _, _) => KeyCommand::CancelQuery,
        _ => KeyCommand::Ignored,
    }
}

impl fmt::Display for FormKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormKey::Tab => f.write_str("tab"),
            FormKey::Enter => f.write_str("enter"),
            FormKey::Up => f.write_str("up"),
            FormKey::Down => f.write_str("down"),
            FormKey::Escape => f.write_str("esc"),
            FormKey::F(n) => write!(f, "f{}", n),
            FormKey::Char(c) => write!(f, "{}", c),
        }
    }
}

/// Parses key chords such as `tab`, `shift+tab`, `f8` or `ctrl+s`.
pub fn parse_key_chord(input: &str) -> std::result::Result<(FormKey, KeyModifiers), String> {
    let mut modifiers = KeyModifiers::NONE;
    let mut key = None;
    for part in input.split('+').map(|part| part.trim().to_ascii_lowercase()) {
        match part.as_str() {
            "shift" => modifiers.shift = true,
            "ctrl" | "control" => modifiers.ctrl = true,
            "alt" => modifiers.alt = true,
            other => key = Some(FormKey::from_str(other)?),
        }
    }
    key.map(|key| (key, modifiers))
        .ok_or_else(|| format!("no key in `{}`", input))
}

impl FromStr for FormKey {
    type Err = String;

    fn from_str(input: &str) -> std::result::Result<Self, Self::Err> {
        let lower = input.trim().to_ascii_lowercase();
        match lower.as_str() {
            "tab" => Ok(FormKey::Tab),
            "enter" | "return" => Ok(FormKey::Enter),
            "up" => Ok(FormKey::Up),
            "down" => Ok(FormKey::Down),
            "esc" | "escape" => Ok(FormKey::Escape),
            _ => {
                if let Some(number) = lower.strip_prefix('f').and_then(|n| n.parse::<u8>().ok()) {
                    return Ok(FormKey::F(number));
                }
                let mut chars = lower.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Ok(FormKey::Char(c)),
                    _ => Err(format!("unknown key `{}`", input.trim())),
                }
            }
        }
    }
}
