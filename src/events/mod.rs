//! Status events for display front-ends
//!
//! Every connection-state change, inbound frame and transmitted or dropped
//! command is published as a `StatusEvent`. Subscribed front-ends receive
//! them over IPC; with nobody subscribed they are written to the log.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::info;

use crate::connection::ConnectionState;

/// Events reported to the status observer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StatusEvent {
    /// Connection lifecycle moved to a new state
    ConnectionChanged { state: ConnectionState },

    /// Opaque text received from the console
    Inbound { text: String },

    /// A frame was handed to the transport
    Transmitted { frame: String },

    /// A command was dropped because the connection is not open
    Dropped { command: String },

    /// Transport fault or close, always followed by a reconnect
    TransportFault { message: String },

    /// A finalized transcript was recognized
    Recognized { transcript: String },

    /// Recognizer started or stopped
    ListeningChanged { listening: bool },

    /// Voice capability is absent on this host
    VoiceUnsupported,
}

impl std::fmt::Display for StatusEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StatusEvent::ConnectionChanged { state } => write!(f, "WS {}", state),
            StatusEvent::Inbound { text } => write!(f, "RX: {}", text),
            StatusEvent::Transmitted { frame } => write!(f, "TX: {}", frame),
            StatusEvent::Dropped { command } => write!(f, "WS not open, cannot send: {}", command),
            StatusEvent::TransportFault { message } => write!(f, "WebSocket error: {}", message),
            StatusEvent::Recognized { transcript } => write!(f, "Recognized: {}", transcript),
            StatusEvent::ListeningChanged { listening: true } => write!(f, "Listening"),
            StatusEvent::ListeningChanged { listening: false } => write!(f, "Stopped"),
            StatusEvent::VoiceUnsupported => write!(f, "SpeechRecognition not supported"),
        }
    }
}

/// Publishes status events to subscribed displays
#[derive(Debug, Clone)]
pub struct StatusReporter {
    tx: broadcast::Sender<StatusEvent>,
}

impl StatusReporter {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StatusEvent> {
        self.tx.subscribe()
    }

    /// Publish an event, falling back to plain log output when no display
    /// is subscribed
    pub fn publish(&self, event: StatusEvent) {
        if let Err(broadcast::error::SendError(event)) = self.tx.send(event) {
            info!(target: "status", "{}", event);
        }
    }
}
