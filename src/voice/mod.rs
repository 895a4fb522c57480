//! Voice input: transcript normalization and the recognizer capability
//!
//! Transcripts are produced by an external recognizer. Each one is echoed to
//! the console as a diagnostic frame and may additionally map to a single
//! command.

mod normalize;
mod recognizer;

pub use normalize::normalize;
pub use recognizer::{Recognizer, RemoteRecognizer, VoiceControl, VoiceError};
