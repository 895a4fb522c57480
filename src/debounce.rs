//! Duplicate suppression for voice-derived commands
//!
//! Continuous recognition tends to re-fire the same phrase on trailing
//! silence. The debouncer drops a command identical to the last emitted one
//! unless the window has fully elapsed.

use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::command::Command;

/// Emit/suppress decision over the last emitted voice command
#[derive(Debug)]
pub struct Debouncer {
    window: Duration,
    last: Option<(Command, Instant)>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self { window, last: None }
    }

    /// Decide whether `command` observed at `now` should be emitted.
    ///
    /// Emits when the command differs from the last emitted one, or when
    /// strictly more than the window has passed since that emission. The
    /// remembered command only changes on emit.
    pub fn should_emit(&mut self, command: Command, now: Instant) -> bool {
        let emit = match self.last {
            Some((last, at)) if last == command => now.saturating_duration_since(at) > self.window,
            _ => true,
        };

        if emit {
            self.last = Some((command, now));
        } else {
            debug!(%command, "suppressed repeated voice command");
        }

        emit
    }
}
