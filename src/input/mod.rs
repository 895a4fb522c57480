//! Input module: raw gestures, key bindings and adapters
//!
//! Translates pointer, touch, keyboard and voice input into vocabulary
//! commands for the connection manager.

mod adapter;
mod event;
mod keys;

pub use adapter::{Action, InputAdapter};
pub use event::{Gesture, InputEvent, InputSource};
pub use keys::key_down;
