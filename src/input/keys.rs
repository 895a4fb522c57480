//! Keyboard shortcut bindings
//!
//! Keys are identified by their DOM-style `key` value (`ArrowUp`, `w`,
//! `" "`). Letter bindings accept either case.

use tokio::time::Instant;

use crate::command::{Axis, Command};

use super::event::{InputEvent, InputSource};

/// What a bound key does when pressed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyBinding {
    /// Tap the axis: HIGH now, LOW shortly after
    Impulse(Axis),
    Toggle(Command),
}

/// Look up the binding for a key-down
pub fn binding_for(key: &str) -> Option<KeyBinding> {
    let binding = match key {
        "ArrowUp" | "w" | "W" => KeyBinding::Impulse(Axis::Up),
        "ArrowDown" | "s" | "S" => KeyBinding::Impulse(Axis::Down),
        "ArrowLeft" | "a" | "A" => KeyBinding::Impulse(Axis::Left),
        "ArrowRight" | "d" | "D" => KeyBinding::Impulse(Axis::Right),
        " " => KeyBinding::Toggle(Command::PausePlay),
        "m" | "M" => KeyBinding::Toggle(Command::Mute),
        "r" | "R" => KeyBinding::Toggle(Command::Restart),
        _ => return None,
    };
    Some(binding)
}

/// Translate a key-down into an input event. Unbound keys yield `None`.
pub fn key_down(key: &str, at: Instant) -> Option<InputEvent> {
    let source = InputSource::Keyboard;
    binding_for(key).map(|binding| match binding {
        KeyBinding::Impulse(axis) => InputEvent::Press { source, axis, at },
        KeyBinding::Toggle(command) => InputEvent::Toggle { source, command, at },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arrow_and_wasd() {
        assert_eq!(binding_for("ArrowUp"), Some(KeyBinding::Impulse(Axis::Up)));
        assert_eq!(binding_for("W"), Some(KeyBinding::Impulse(Axis::Up)));
        assert_eq!(binding_for("s"), Some(KeyBinding::Impulse(Axis::Down)));
        assert_eq!(binding_for("a"), Some(KeyBinding::Impulse(Axis::Left)));
        assert_eq!(binding_for("ArrowRight"), Some(KeyBinding::Impulse(Axis::Right)));
    }

    #[test]
    fn test_toggle_keys() {
        assert_eq!(binding_for(" "), Some(KeyBinding::Toggle(Command::PausePlay)));
        assert_eq!(binding_for("M"), Some(KeyBinding::Toggle(Command::Mute)));
        assert_eq!(binding_for("r"), Some(KeyBinding::Toggle(Command::Restart)));
    }

    #[test]
    fn test_unbound_keys() {
        assert_eq!(binding_for("x"), None);
        assert_eq!(binding_for("Enter"), None);
        assert!(key_down("q", Instant::now()).is_none());
    }

    #[test]
    fn test_key_down_is_keyboard_sourced() {
        let event = key_down("d", Instant::now()).unwrap();
        assert!(matches!(
            event,
            InputEvent::Press {
                source: InputSource::Keyboard,
                axis: Axis::Right,
                ..
            }
        ));
    }
}
