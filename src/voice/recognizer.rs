//! Speech recognizer capability and the keep-listening policy around it
//!
//! The recognition engine itself is external. This module only tracks
//! whether the user asked to keep listening (the mic toggle) separately from
//! whether the recognizer is currently running, and decides when an ended
//! recognizer should be started again.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Errors from the voice capability
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VoiceError {
    #[error("speech recognition is not supported on this host")]
    Unsupported,
}

/// A start/stop-able recognizer yielding finalized transcripts
pub trait Recognizer: Send {
    fn start(&mut self) -> Result<(), VoiceError>;
    fn stop(&mut self);
}

/// Recognizer running in a subscribed front-end.
///
/// Start and stop are announced to front-ends through the listening status
/// event; transcripts come back as `voice` IPC requests.
#[derive(Debug, Default)]
pub struct RemoteRecognizer;

impl Recognizer for RemoteRecognizer {
    fn start(&mut self) -> Result<(), VoiceError> {
        debug!("remote recognizer start requested");
        Ok(())
    }

    fn stop(&mut self) {
        debug!("remote recognizer stop requested");
    }
}

/// Mic toggle state layered over an optional recognizer
pub struct VoiceControl {
    recognizer: Option<Box<dyn Recognizer>>,
    /// User intent, survives recognizer ends
    keep_listening: bool,
    /// Recognizer is running and producing results
    listening: bool,
    restart_delay: Duration,
}

impl VoiceControl {
    pub fn new(recognizer: Option<Box<dyn Recognizer>>, restart_delay: Duration) -> Self {
        Self {
            recognizer,
            keep_listening: false,
            listening: false,
            restart_delay,
        }
    }

    pub fn is_supported(&self) -> bool {
        self.recognizer.is_some()
    }

    pub fn is_listening(&self) -> bool {
        self.listening
    }

    /// Apply a mic toggle request. Returns the resulting listening state.
    pub fn set_listening(&mut self, enabled: bool) -> Result<bool, VoiceError> {
        let recognizer = self.recognizer.as_mut().ok_or(VoiceError::Unsupported)?;

        if enabled {
            self.keep_listening = true;
            if !self.listening {
                recognizer.start()?;
                self.listening = true;
                info!("voice recognition started");
            }
        } else {
            self.keep_listening = false;
            if self.listening {
                recognizer.stop();
                self.listening = false;
                info!("voice recognition stopped");
            }
        }

        Ok(self.listening)
    }

    /// The recognizer ended on its own. Returns when to restart it, if the
    /// user still wants to listen.
    pub fn on_ended(&mut self, now: Instant) -> Option<Instant> {
        self.listening = false;
        if self.keep_listening && self.recognizer.is_some() {
            debug!(
                delay_ms = self.restart_delay.as_millis() as u64,
                "scheduling recognizer restart"
            );
            Some(now + self.restart_delay)
        } else {
            None
        }
    }

    /// Restart deadline reached. Returns true if the recognizer is running
    /// afterwards.
    pub fn restart(&mut self) -> bool {
        if !self.keep_listening || self.listening {
            return self.listening;
        }
        let Some(recognizer) = self.recognizer.as_mut() else {
            return false;
        };

        match recognizer.start() {
            Ok(()) => {
                self.listening = true;
                info!("voice recognition restarted");
            }
            Err(e) => {
                warn!(?e, "failed to restart recognizer");
            }
        }
        self.listening
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    #[derive(Default, Clone)]
    struct CountingRecognizer {
        calls: Arc<Mutex<Vec<&'static str>>>,
    }

    impl Recognizer for CountingRecognizer {
        fn start(&mut self) -> Result<(), VoiceError> {
            self.calls.lock().unwrap().push("start");
            Ok(())
        }

        fn stop(&mut self) {
            self.calls.lock().unwrap().push("stop");
        }
    }

    fn control() -> (VoiceControl, Arc<Mutex<Vec<&'static str>>>) {
        let recognizer = CountingRecognizer::default();
        let calls = Arc::clone(&recognizer.calls);
        (
            VoiceControl::new(Some(Box::new(recognizer)), Duration::from_millis(300)),
            calls,
        )
    }

    #[test]
    fn test_unsupported_without_recognizer() {
        let mut voice = VoiceControl::new(None, Duration::from_millis(300));
        assert!(!voice.is_supported());
        assert_eq!(voice.set_listening(true), Err(VoiceError::Unsupported));
        assert!(!voice.is_listening());
    }

    #[test]
    fn test_toggle_starts_and_stops() {
        let (mut voice, calls) = control();

        assert_eq!(voice.set_listening(true), Ok(true));
        assert!(voice.keep_listening);
        // Already running, no second start
        assert_eq!(voice.set_listening(true), Ok(true));
        assert_eq!(voice.set_listening(false), Ok(false));
        assert!(!voice.keep_listening);

        assert_eq!(*calls.lock().unwrap(), vec!["start", "stop"]);
    }

    #[test]
    fn test_end_with_keep_listening_schedules_restart() {
        let (mut voice, calls) = control();
        let now = Instant::now();

        voice.set_listening(true).unwrap();
        assert_eq!(voice.on_ended(now), Some(now + Duration::from_millis(300)));
        assert!(!voice.is_listening());

        assert!(voice.restart());
        assert_eq!(*calls.lock().unwrap(), vec!["start", "start"]);
    }

    #[test]
    fn test_end_after_stop_does_not_restart() {
        let (mut voice, _calls) = control();

        voice.set_listening(true).unwrap();
        voice.set_listening(false).unwrap();
        assert_eq!(voice.on_ended(Instant::now()), None);
    }

    #[test]
    fn test_restart_rechecks_intent() {
        let (mut voice, calls) = control();

        voice.set_listening(true).unwrap();
        assert!(voice.on_ended(Instant::now()).is_some());
        voice.set_listening(false).unwrap();

        assert!(!voice.restart());
        // stop is skipped because the recognizer had already ended
        assert_eq!(*calls.lock().unwrap(), vec!["start"]);
    }
}
