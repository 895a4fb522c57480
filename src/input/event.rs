//! Normalized input events
//!
//! Front-ends report raw gestures (pointer, touch, key, transcript). They
//! are reduced here to four event kinds carrying only the source, the
//! axis or command, and the time they were observed.

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::command::{Axis, Command};

/// Where an input event came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputSource {
    Pointer,
    Touch,
    Keyboard,
    /// Click on an on-screen toggle button
    Button,
    Voice,
}

/// Raw gesture on a directional control
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gesture {
    PointerDown,
    PointerUp,
    /// Pointer dragged off the control, treated as a release
    PointerLeave,
    TouchStart,
    TouchEnd,
    TouchCancel,
}

impl Gesture {
    pub fn source(self) -> InputSource {
        match self {
            Gesture::PointerDown | Gesture::PointerUp | Gesture::PointerLeave => {
                InputSource::Pointer
            }
            Gesture::TouchStart | Gesture::TouchEnd | Gesture::TouchCancel => InputSource::Touch,
        }
    }

    pub fn is_press(self) -> bool {
        matches!(self, Gesture::PointerDown | Gesture::TouchStart)
    }
}

/// An input event ready for the adapters
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    /// Press on an axis. Keyboard presses are impulses.
    Press {
        source: InputSource,
        axis: Axis,
        at: Instant,
    },
    Release {
        source: InputSource,
        axis: Axis,
        at: Instant,
    },
    /// A stateless toggle was triggered
    Toggle {
        source: InputSource,
        command: Command,
        at: Instant,
    },
    /// A finalized recognizer transcript
    VoiceResult { transcript: String, at: Instant },
}

impl InputEvent {
    pub fn from_gesture(gesture: Gesture, axis: Axis, at: Instant) -> Self {
        let source = gesture.source();
        if gesture.is_press() {
            InputEvent::Press { source, axis, at }
        } else {
            InputEvent::Release { source, axis, at }
        }
    }

    pub fn source(&self) -> InputSource {
        match self {
            InputEvent::Press { source, .. }
            | InputEvent::Release { source, .. }
            | InputEvent::Toggle { source, .. } => *source,
            InputEvent::VoiceResult { .. } => InputSource::Voice,
        }
    }
}
