//! Input adapters: events in, command actions out
//!
//! Three interaction patterns share the vocabulary:
//! - press/release pairs for pointer and touch on the directional axes
//! - impulses for keyboard activation of an axis (HIGH now, LOW after a
//!   fixed delay, never cancelled)
//! - one-shot toggles
//!
//! Voice results are echoed as diagnostics and, when they map to a command,
//! pass through the debouncer. Presses are never deduplicated.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, warn};

use crate::command::{Command, VOICE_PREFIX};
use crate::debounce::Debouncer;
use crate::voice;

use super::event::{InputEvent, InputSource};

/// What the controller should do for a translated event, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Send the command now
    Send(Command),
    /// Send the command once `due` is reached
    SendAt { due: Instant, command: Command },
    /// Best-effort diagnostic frame
    Diagnostic(String),
}

pub struct InputAdapter {
    impulse_delay: Duration,
    debouncer: Debouncer,
}

impl InputAdapter {
    pub fn new(impulse_delay: Duration, debounce_window: Duration) -> Self {
        Self {
            impulse_delay,
            debouncer: Debouncer::new(debounce_window),
        }
    }

    pub fn translate(&mut self, event: InputEvent) -> Vec<Action> {
        match event {
            InputEvent::Press {
                source: InputSource::Keyboard,
                axis,
                at,
            } => vec![
                Action::Send(axis.high()),
                Action::SendAt {
                    due: at + self.impulse_delay,
                    command: axis.low(),
                },
            ],
            InputEvent::Press { axis, .. } => vec![Action::Send(axis.high())],

            // Keyboard impulses release themselves
            InputEvent::Release {
                source: InputSource::Keyboard,
                ..
            } => Vec::new(),
            InputEvent::Release { axis, .. } => vec![Action::Send(axis.low())],

            InputEvent::Toggle { command, .. } if command.is_toggle() => {
                vec![Action::Send(command)]
            }
            InputEvent::Toggle { command, source, .. } => {
                warn!(%command, ?source, "ignoring toggle event for a directional command");
                Vec::new()
            }

            InputEvent::VoiceResult { transcript, at } => {
                self.translate_transcript(&transcript, at)
            }
        }
    }

    fn translate_transcript(&mut self, transcript: &str, at: Instant) -> Vec<Action> {
        let transcript = transcript.trim();
        if transcript.is_empty() {
            return Vec::new();
        }

        let mut actions = vec![Action::Diagnostic(format!("{VOICE_PREFIX}{transcript}"))];
        match voice::normalize(transcript) {
            Some(command) if self.debouncer.should_emit(command, at) => {
                actions.push(Action::Send(command));
            }
            Some(_) => {}
            None => debug!(transcript, "transcript did not map to a command"),
        }
        actions
    }
}
