//! IPC message protocol definitions
//!
//! All messages are JSON-encoded, prefixed with a 4-byte little-endian length.

use serde::{Deserialize, Serialize};

use crate::command::{Axis, Command};
use crate::connection::ConnectionState;
use crate::controller::Dispatch;
use crate::events::StatusEvent;

/// Requests from a front-end to the client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Pointer or touch gesture on a directional control
    Gesture {
        axis: Axis,
        gesture: crate::input::Gesture,
    },

    /// Key-down with its DOM-style key value
    Key { key: String },

    /// Click on a toggle button
    Click { command: Command },

    /// Finalized transcript from the recognizer
    Voice { transcript: String },

    /// Mic toggle
    Listen { enabled: bool },

    /// The recognizer stopped on its own
    RecognizerEnded,

    /// Request current client status
    GetStatus,

    /// Ping to check connectivity
    Ping,

    /// Subscribe to status notifications
    Subscribe,
}

/// Responses from the client to a front-end
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Commands sent immediately for an input request
    Dispatched { results: Vec<Dispatch> },

    /// Listening state after a mic toggle
    Listening { listening: bool },

    /// Current client status
    Status(ClientStatus),

    /// Request accepted, nothing to report
    Ok,

    /// Pong response to ping
    Pong,

    /// Subscription confirmed
    Subscribed,

    /// Push notification for subscribed clients
    Notification { event: StatusEvent },

    /// Error response
    Error { code: String, message: String },
}

impl Response {
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Response::Error {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

/// Full client status snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientStatus {
    /// Client version
    pub version: String,

    /// Connection lifecycle state
    pub connection: ConnectionState,

    /// Console endpoint
    pub endpoint: String,

    /// Whether a recognizer is available
    pub voice_supported: bool,

    /// Whether the recognizer is running
    pub listening: bool,

    /// Whether a reconnect is scheduled
    pub reconnect_pending: bool,

    /// Impulse releases and restarts not yet fired
    pub deferred: usize,
}

impl Default for ClientStatus {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            connection: ConnectionState::default(),
            endpoint: String::new(),
            voice_supported: false,
            listening: false,
            reconnect_pending: false,
            deferred: 0,
        }
    }
}
