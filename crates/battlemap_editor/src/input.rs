//! Keyboard shortcuts
//!
//! [`InputController`] owns the key map and its attachment state. The host
//! forwards key presses while attached; nothing is read from global state.

use crate::tools::Modifiers;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::warn;

/// Editor commands reachable from the keyboard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Undo,
    Redo,
    RotateClockwise,
    RotateCounterClockwise,
    MirrorHorizontal,
    MirrorVertical,
    NudgeUp,
    NudgeDown,
    NudgeLeft,
    NudgeRight,
    Delete,
    Duplicate,
    Cancel,
    ToggleSnap,
    FinishPolyline,
}

impl Action {
    pub const ALL: [Action; 15] = [
        Action::Undo,
        Action::Redo,
        Action::RotateClockwise,
        Action::RotateCounterClockwise,
        Action::MirrorHorizontal,
        Action::MirrorVertical,
        Action::NudgeUp,
        Action::NudgeDown,
        Action::NudgeLeft,
        Action::NudgeRight,
        Action::Delete,
        Action::Duplicate,
        Action::Cancel,
        Action::ToggleSnap,
        Action::FinishPolyline,
    ];

    /// Name used for this action in the config file
    pub fn name(self) -> &'static str {
        match self {
            Action::Undo => "undo",
            Action::Redo => "redo",
            Action::RotateClockwise => "rotate_cw",
            Action::RotateCounterClockwise => "rotate_ccw",
            Action::MirrorHorizontal => "mirror_horizontal",
            Action::MirrorVertical => "mirror_vertical",
            Action::NudgeUp => "nudge_up",
            Action::NudgeDown => "nudge_down",
            Action::NudgeLeft => "nudge_left",
            Action::NudgeRight => "nudge_right",
            Action::Delete => "delete",
            Action::Duplicate => "duplicate",
            Action::Cancel => "cancel",
            Action::ToggleSnap => "toggle_snap",
            Action::FinishPolyline => "finish_polyline",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.name() == name)
    }

    fn default_combos(self) -> &'static [&'static str] {
        match self {
            Action::Undo => &["Ctrl+Z"],
            Action::Redo => &["Ctrl+Y", "Ctrl+Shift+Z"],
            Action::RotateClockwise => &["R"],
            Action::RotateCounterClockwise => &["Shift+R"],
            Action::MirrorHorizontal => &["H"],
            Action::MirrorVertical => &["V"],
            Action::NudgeUp => &["ArrowUp"],
            Action::NudgeDown => &["ArrowDown"],
            Action::NudgeLeft => &["ArrowLeft"],
            Action::NudgeRight => &["ArrowRight"],
            Action::Delete => &["Delete", "Backspace"],
            Action::Duplicate => &["Ctrl+D"],
            Action::Cancel => &["Escape"],
            Action::ToggleSnap => &["G"],
            Action::FinishPolyline => &["Enter"],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyComboError {
    #[error("Empty key combination")]
    Empty,
    #[error("Unknown modifier '{0}'")]
    UnknownModifier(String),
}

/// A key plus exact modifier state, e.g. `Ctrl+Shift+Z`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyCombo {
    key: String,
    ctrl: bool,
    shift: bool,
    alt: bool,
}

impl KeyCombo {
    pub fn new(key: &str, modifiers: Modifiers) -> Self {
        Self {
            key: normalize_key(key),
            ctrl: modifiers.ctrl,
            shift: modifiers.shift,
            alt: modifiers.alt,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

/// Single characters compare case-insensitively as their uppercase form;
/// named keys compare as lowercase
fn normalize_key(key: &str) -> String {
    let key = key.trim();
    let mut chars = key.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => c.to_ascii_uppercase().to_string(),
        _ => match key.to_ascii_lowercase().as_str() {
            "esc" => "escape".to_string(),
            "del" => "delete".to_string(),
            "return" => "enter".to_string(),
            "up" => "arrowup".to_string(),
            "down" => "arrowdown".to_string(),
            "left" => "arrowleft".to_string(),
            "right" => "arrowright".to_string(),
            other => other.to_string(),
        },
    }
}

impl FromStr for KeyCombo {
    type Err = KeyComboError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('+').map(str::trim).collect();
        let Some((key, modifiers)) = parts.split_last() else {
            return Err(KeyComboError::Empty);
        };
        if key.is_empty() {
            return Err(KeyComboError::Empty);
        }
        let mut mods = Modifiers::default();
        for m in modifiers {
            match m.to_ascii_lowercase().as_str() {
                "ctrl" | "control" | "cmd" | "meta" => mods.ctrl = true,
                "shift" => mods.shift = true,
                "alt" | "option" => mods.alt = true,
                _ => return Err(KeyComboError::UnknownModifier(m.to_string())),
            }
        }
        Ok(Self::new(key, mods))
    }
}

impl fmt::Display for KeyCombo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ctrl {
            f.write_str("Ctrl+")?;
        }
        if self.shift {
            f.write_str("Shift+")?;
        }
        if self.alt {
            f.write_str("Alt+")?;
        }
        f.write_str(&self.key)
    }
}

/// A key press forwarded by the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyEvent {
    pub key: String,
    pub modifiers: Modifiers,
    /// Typed into a text field; never treated as a shortcut
    pub in_text_input: bool,
}

impl KeyEvent {
    pub fn new(key: impl Into<String>, modifiers: Modifiers) -> Self {
        Self {
            key: key.into(),
            modifiers,
            in_text_input: false,
        }
    }
}

/// Maps key presses to actions while attached
#[derive(Debug, Clone)]
pub struct InputController {
    bindings: HashMap<KeyCombo, Action>,
    attached: bool,
}

impl Default for InputController {
    fn default() -> Self {
        Self::new(&HashMap::new())
    }
}

impl InputController {
    /// Default bindings with `overrides` (action name -> comma separated
    /// combos) applied on top. An override replaces every default combo of
    /// its action; invalid entries are logged and skipped.
    pub fn new(overrides: &HashMap<String, String>) -> Self {
        let mut bindings = HashMap::new();
        for action in Action::ALL {
            for combo in action.default_combos() {
                if let Ok(combo) = combo.parse() {
                    bindings.insert(combo, action);
                }
            }
        }

        let mut names: Vec<&String> = overrides.keys().collect();
        names.sort();
        for name in names {
            let Some(action) = Action::from_name(name) else {
                warn!(action = %name, "Ignoring keybinding for unknown action");
                continue;
            };
            let parsed: Result<Vec<KeyCombo>, _> = overrides[name]
                .split(',')
                .filter(|s| !s.trim().is_empty())
                .map(str::parse)
                .collect();
            match parsed {
                Ok(combos) => {
                    bindings.retain(|_, a| *a != action);
                    for combo in combos {
                        bindings.insert(combo, action);
                    }
                }
                Err(err) => warn!(action = %name, "Ignoring keybinding: {err}"),
            }
        }

        Self {
            bindings,
            attached: false,
        }
    }

    /// Start receiving key presses
    pub fn attach(&mut self) {
        self.attached = true;
    }

    /// Stop receiving key presses; later events are ignored
    pub fn detach(&mut self) {
        self.attached = false;
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    /// Combos bound to `action`, sorted for display
    pub fn combos_for(&self, action: Action) -> Vec<String> {
        let mut combos: Vec<String> = self
            .bindings
            .iter()
            .filter(|(_, a)| **a == action)
            .map(|(c, _)| c.to_string())
            .collect();
        combos.sort();
        combos
    }

    pub fn handle_key(&self, event: &KeyEvent) -> Option<Action> {
        if !self.attached || event.in_text_input {
            return None;
        }
        self.bindings
            .get(&KeyCombo::new(&event.key, event.modifiers))
            .copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctrl() -> Modifiers {
        Modifiers {
            ctrl: true,
            ..Default::default()
        }
    }

    fn attached(overrides: &[(&str, &str)]) -> InputController {
        let map = overrides
            .iter()
            .map(|(a, c)| (a.to_string(), c.to_string()))
            .collect();
        let mut input = InputController::new(&map);
        input.attach();
        input
    }

    #[test]
    fn test_default_bindings() {
        let input = attached(&[]);
        let shift = Modifiers {
            shift: true,
            ..Default::default()
        };
        let ctrl_shift = Modifiers { shift: true, ..ctrl() };

        assert_eq!(input.handle_key(&KeyEvent::new("z", ctrl())), Some(Action::Undo));
        assert_eq!(input.handle_key(&KeyEvent::new("Z", ctrl_shift)), Some(Action::Redo));
        assert_eq!(input.handle_key(&KeyEvent::new("y", ctrl())), Some(Action::Redo));
        assert_eq!(input.handle_key(&KeyEvent::new("r", Modifiers::default())), Some(Action::RotateClockwise));
        assert_eq!(input.handle_key(&KeyEvent::new("R", shift)), Some(Action::RotateCounterClockwise));
        assert_eq!(input.handle_key(&KeyEvent::new("Escape", Modifiers::default())), Some(Action::Cancel));
        assert_eq!(input.handle_key(&KeyEvent::new("z", Modifiers::default())), None);
    }

    #[test]
    fn test_detached_and_text_input_ignored() {
        let mut input = attached(&[]);
        let mut typing = KeyEvent::new("h", Modifiers::default());
        typing.in_text_input = true;
        assert_eq!(input.handle_key(&typing), None);

        input.detach();
        assert_eq!(input.handle_key(&KeyEvent::new("h", Modifiers::default())), None);
    }

    #[test]
    fn test_override_replaces_defaults() {
        let input = attached(&[("undo", "Ctrl+U"), ("redo", "Ctrl+Alt+R, F5")]);
        assert_eq!(input.handle_key(&KeyEvent::new("z", ctrl())), None);
        assert_eq!(input.handle_key(&KeyEvent::new("u", ctrl())), Some(Action::Undo));
        assert_eq!(input.handle_key(&KeyEvent::new("f5", Modifiers::default())), Some(Action::Redo));
        assert_eq!(input.combos_for(Action::Redo), vec!["Ctrl+Alt+R", "f5"]);
    }

    #[test]
    fn test_bad_overrides_keep_defaults() {
        let input = attached(&[("undo", "Hyper+Z"), ("launch", "L")]);
        assert_eq!(input.handle_key(&KeyEvent::new("z", ctrl())), Some(Action::Undo));
        assert_eq!(input.handle_key(&KeyEvent::new("l", Modifiers::default())), None);
    }

    #[test]
    fn test_parse_combo() {
        let combo: KeyCombo = "ctrl + shift + z".parse().unwrap();
        assert_eq!(combo.to_string(), "Ctrl+Shift+Z");
        assert_eq!("Esc".parse::<KeyCombo>().unwrap().key(), "escape");
        assert_eq!("".parse::<KeyCombo>(), Err(KeyComboError::Empty));
    }
}
