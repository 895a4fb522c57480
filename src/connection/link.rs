//! WebSocket link to the console
//!
//! Each connection attempt runs in its own task. The task reports back to
//! the controller through `LinkEvent`s tagged with the attempt's session
//! number, so events from a superseded attempt can be told apart.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};
use url::Url;

/// Identifies one connection attempt
pub type SessionId = u64;

/// Faults that take the connection down
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("handshake failed: {0}")]
    Handshake(String),

    #[error("handshake timed out after {0:?}")]
    Timeout(Duration),

    #[error("transport fault: {0}")]
    Fault(String),

    #[error("connection closed ({})", .reason.as_deref().unwrap_or("no reason given"))]
    Closed { reason: Option<String> },
}

/// Reports from a link task
#[derive(Debug)]
pub enum LinkEvent {
    /// Handshake succeeded; frames pushed into `outbound` are transmitted
    Opened {
        session: SessionId,
        outbound: mpsc::UnboundedSender<String>,
    },
    /// Text frame from the console
    Message { session: SessionId, text: String },
    /// Handshake failure, transport error or close. Always the last event
    /// of a session.
    Lost {
        session: SessionId,
        error: TransportError,
    },
}

impl LinkEvent {
    pub fn session(&self) -> SessionId {
        match self {
            LinkEvent::Opened { session, .. }
            | LinkEvent::Message { session, .. }
            | LinkEvent::Lost { session, .. } => *session,
        }
    }
}

/// Starts connection attempts
pub trait Connector {
    /// Begin connecting to `endpoint`. The outcome arrives as `LinkEvent`s
    /// carrying `session`.
    fn open(&mut self, endpoint: &Url, session: SessionId);
}

/// Connector backed by tokio-tungstenite
pub struct WsConnector {
    events: mpsc::UnboundedSender<LinkEvent>,
    connect_timeout: Duration,
    task: Option<JoinHandle<()>>,
}

impl WsConnector {
    pub fn new(events: mpsc::UnboundedSender<LinkEvent>, connect_timeout: Duration) -> Self {
        Self {
            events,
            connect_timeout,
            task: None,
        }
    }
}

impl Connector for WsConnector {
    fn open(&mut self, endpoint: &Url, session: SessionId) {
        // Only one link may be live
        if let Some(task) = self.task.take() {
            task.abort();
        }

        let endpoint = endpoint.clone();
        let events = self.events.clone();
        let connect_timeout = self.connect_timeout;
        self.task = Some(tokio::spawn(async move {
            let error = run_link(&endpoint, session, &events, connect_timeout).await;
            let _ = events.send(LinkEvent::Lost { session, error });
        }));
    }
}

impl Drop for WsConnector {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Drive one connection until it goes down, returning why
async fn run_link(
    endpoint: &Url,
    session: SessionId,
    events: &mpsc::UnboundedSender<LinkEvent>,
    connect_timeout: Duration,
) -> TransportError {
    info!(%endpoint, session, "trying WebSocket");

    let stream = match timeout(connect_timeout, connect_async(endpoint.as_str())).await {
        Ok(Ok((stream, _response))) => stream,
        Ok(Err(e)) => return TransportError::Handshake(e.to_string()),
        Err(_) => return TransportError::Timeout(connect_timeout),
    };

    let (mut sink, mut source) = stream.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<String>();

    if events
        .send(LinkEvent::Opened {
            session,
            outbound: outbound_tx,
        })
        .is_err()
    {
        let _ = sink.close().await;
        return TransportError::Closed {
            reason: Some("controller gone".to_string()),
        };
    }

    loop {
        tokio::select! {
            outgoing = outbound_rx.recv() => match outgoing {
                Some(frame) => {
                    debug!(session, %frame, "WS TX");
                    if let Err(e) = sink.send(Message::Text(frame)).await {
                        return TransportError::Fault(e.to_string());
                    }
                }
                None => {
                    // Controller dropped the link
                    let _ = sink.close().await;
                    return TransportError::Closed { reason: Some("closed locally".to_string()) };
                }
            },

            incoming = source.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    debug!(session, %text, "WS RX");
                    if events.send(LinkEvent::Message { session, text }).is_err() {
                        let _ = sink.close().await;
                        return TransportError::Closed {
                            reason: Some("controller gone".to_string()),
                        };
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    let reason = frame
                        .map(|f| f.reason.to_string())
                        .filter(|r| !r.is_empty());
                    return TransportError::Closed { reason };
                }
                Some(Ok(other)) => {
                    debug!(session, ?other, "ignoring non-text frame");
                }
                Some(Err(e)) => {
                    warn!(session, ?e, "WS error");
                    return TransportError::Fault(e.to_string());
                }
                None => return TransportError::Closed { reason: None },
            },
        }
    }
}
