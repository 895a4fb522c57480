//! Connection lifecycle state machine
//!
//! Disconnected -> Connecting on start and whenever the reconnect deadline
//! passes, Connecting -> Connected on handshake, and any fault or close ->
//! Disconnected with exactly one reconnect scheduled. There is no terminal
//! state and no backoff growth.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use url::Url;

use crate::command::{Command, BOOTSTRAP_TOKEN};
use crate::events::{StatusEvent, StatusReporter};

use super::link::{Connector, LinkEvent, SessionId, TransportError};

/// Lifecycle state of the single logical connection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "Disconnected"),
            ConnectionState::Connecting => write!(f, "Connecting"),
            ConnectionState::Connected => write!(f, "Connected"),
        }
    }
}

/// Owns the connection, its reconnect timer and the send gate
pub struct ConnectionManager<C> {
    endpoint: Url,
    reconnect_delay: Duration,
    connector: C,
    status: StatusReporter,
    state: ConnectionState,
    state_entered_at: Instant,
    /// Current attempt; link events for other sessions are stale
    session: SessionId,
    /// Present only while Connected
    link: Option<mpsc::UnboundedSender<String>>,
    /// At most one outstanding reconnect
    pending_reconnect: Option<Instant>,
}

impl<C: Connector> ConnectionManager<C> {
    pub fn new(
        endpoint: Url,
        reconnect_delay: Duration,
        connector: C,
        status: StatusReporter,
    ) -> Self {
        Self {
            endpoint,
            reconnect_delay,
            connector,
            status,
            state: ConnectionState::Disconnected,
            state_entered_at: Instant::now(),
            session: 0,
            link: None,
            pending_reconnect: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Deadline of the scheduled reconnect, if any
    pub fn pending_reconnect(&self) -> Option<Instant> {
        self.pending_reconnect
    }

    /// Begin a connection attempt if currently disconnected. A pending
    /// reconnect stays scheduled until the handshake succeeds.
    pub fn start(&mut self, now: Instant) {
        if self.state == ConnectionState::Disconnected {
            self.connect(now);
        }
    }

    /// Fire the reconnect timer if it is due
    pub fn poll(&mut self, now: Instant) {
        match self.pending_reconnect {
            Some(due) if due <= now => {
                self.pending_reconnect = None;
                if self.state == ConnectionState::Disconnected {
                    self.connect(now);
                }
            }
            _ => {}
        }
    }

    pub fn handle_link(&mut self, event: LinkEvent, now: Instant) {
        if event.session() != self.session {
            debug!(
                session = event.session(),
                current = self.session,
                "ignoring event from stale session"
            );
            return;
        }

        match event {
            LinkEvent::Opened { outbound, .. } => self.on_opened(outbound, now),
            LinkEvent::Message { text, .. } => {
                self.status.publish(StatusEvent::Inbound { text });
            }
            LinkEvent::Lost { error, .. } => self.on_lost(error, now),
        }
    }

    /// Transmit a command. Returns true iff it was handed to an open
    /// connection; otherwise the command is dropped and reported.
    pub fn send(&mut self, command: Command) -> bool {
        if self.state != ConnectionState::Connected {
            warn!(%command, state = %self.state, "WS not open, dropping command");
            self.status.publish(StatusEvent::Dropped {
                command: command.token().to_string(),
            });
            return false;
        }
        self.transmit(command.token())
    }

    /// Best-effort diagnostic frame; failures are swallowed
    pub fn send_diagnostic(&mut self, frame: String) {
        match &self.link {
            Some(link) if self.state == ConnectionState::Connected => {
                if link.send(frame).is_err() {
                    debug!("diagnostic frame lost with the link");
                }
            }
            _ => debug!(%frame, "not connected, diagnostic frame skipped"),
        }
    }

    fn connect(&mut self, now: Instant) {
        self.session += 1;
        self.transition_to(ConnectionState::Connecting, now);
        self.connector.open(&self.endpoint, self.session);
    }

    fn on_opened(&mut self, outbound: mpsc::UnboundedSender<String>, now: Instant) {
        if let Some(due) = self.pending_reconnect.take() {
            debug!(?due, "cancelled pending reconnect");
        }
        self.link = Some(outbound);
        self.transition_to(ConnectionState::Connected, now);
        self.transmit(BOOTSTRAP_TOKEN);
    }

    fn on_lost(&mut self, error: TransportError, now: Instant) {
        warn!(%error, session = self.session, "WebSocket closed");
        self.status.publish(StatusEvent::TransportFault {
            message: error.to_string(),
        });

        self.link = None;
        if self.state != ConnectionState::Disconnected {
            self.transition_to(ConnectionState::Disconnected, now);
        }
        self.schedule_reconnect(now);
    }

    fn schedule_reconnect(&mut self, now: Instant) {
        if self.pending_reconnect.is_some() {
            debug!("reconnect already scheduled");
            return;
        }
        let due = now + self.reconnect_delay;
        info!(
            delay_ms = self.reconnect_delay.as_millis() as u64,
            "reconnect scheduled"
        );
        self.pending_reconnect = Some(due);
    }

    fn transmit(&mut self, frame: &str) -> bool {
        let Some(link) = &self.link else {
            return false;
        };
        if link.send(frame.to_string()).is_err() {
            // The link task is gone; its Lost event is on the way
            warn!(frame, "link closed, frame not sent");
            return false;
        }
        self.status.publish(StatusEvent::Transmitted {
            frame: frame.to_string(),
        });
        true
    }

    fn transition_to(&mut self, new_state: ConnectionState, now: Instant) {
        let old_state = self.state;
        let duration_ms = now.saturating_duration_since(self.state_entered_at).as_millis() as u64;

        info!(
            from = %old_state,
            to = %new_state,
            duration_ms,
            session = self.session,
            "connection state transition"
        );

        self.state = new_state;
        self.state_entered_at = now;
        self.status
            .publish(StatusEvent::ConnectionChanged { state: new_state });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use tokio::sync::broadcast;

    use super::*;

    const RECONNECT: Duration = Duration::from_millis(1500);

    /// Records connection attempts instead of opening sockets
    #[derive(Default, Clone)]
    struct RecordingConnector {
        attempts: Arc<Mutex<Vec<SessionId>>>,
    }

    impl Connector for RecordingConnector {
        fn open(&mut self, _endpoint: &Url, session: SessionId) {
            self.attempts.lock().unwrap().push(session);
        }
    }

    struct Harness {
        manager: ConnectionManager<RecordingConnector>,
        attempts: Arc<Mutex<Vec<SessionId>>>,
        status: broadcast::Receiver<StatusEvent>,
    }

    impl Harness {
        fn new() -> Self {
            let connector = RecordingConnector::default();
            let attempts = Arc::clone(&connector.attempts);
            let reporter = StatusReporter::new(64);
            let status = reporter.subscribe();
            let endpoint = Url::parse("ws://console.local/ws").unwrap();
            Self {
                manager: ConnectionManager::new(endpoint, RECONNECT, connector, reporter),
                attempts,
                status,
            }
        }

        fn attempts(&self) -> Vec<SessionId> {
            self.attempts.lock().unwrap().clone()
        }

        /// Open the current session and return the receiving end of its link
        fn open(&mut self, now: Instant) -> mpsc::UnboundedReceiver<String> {
            let (tx, rx) = mpsc::unbounded_channel();
            let session = self.manager.session;
            self.manager.handle_link(
                LinkEvent::Opened {
                    session,
                    outbound: tx,
                },
                now,
            );
            rx
        }

        fn lose(&mut self, now: Instant) {
            let session = self.manager.session;
            self.manager.handle_link(
                LinkEvent::Lost {
                    session,
                    error: TransportError::Closed { reason: None },
                },
                now,
            );
        }

        fn states(&mut self) -> Vec<ConnectionState> {
            let mut states = Vec::new();
            while let Ok(event) = self.status.try_recv() {
                if let StatusEvent::ConnectionChanged { state } = event {
                    states.push(state);
                }
            }
            states
        }
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<String>) -> Vec<String> {
        let mut frames = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            frames.push(frame);
        }
        frames
    }

    #[test]
    fn test_initial_state() {
        let h = Harness::new();
        assert_eq!(h.manager.state(), ConnectionState::Disconnected);
        assert!(h.attempts().is_empty());
    }

    #[test]
    fn test_start_connects() {
        let mut h = Harness::new();
        h.manager.start(Instant::now());
        assert_eq!(h.manager.state(), ConnectionState::Connecting);
        assert_eq!(h.attempts(), vec![1]);
    }

    #[test]
    fn test_open_sends_bootstrap() {
        let mut h = Harness::new();
        let t0 = Instant::now();
        h.manager.start(t0);
        let mut link = h.open(t0);

        assert_eq!(h.manager.state(), ConnectionState::Connected);
        assert_eq!(drain(&mut link), vec!["states".to_string()]);
        assert_eq!(
            h.states(),
            vec![ConnectionState::Connecting, ConnectionState::Connected]
        );
    }

    #[test]
    fn test_send_while_connected_transmits_token() {
        let mut h = Harness::new();
        let t0 = Instant::now();
        h.manager.start(t0);
        let mut link = h.open(t0);
        drain(&mut link);

        for command in Command::ALL {
            assert!(h.manager.send(command));
        }
        let expected: Vec<String> = Command::ALL.iter().map(|c| c.token().to_string()).collect();
        assert_eq!(drain(&mut link), expected);
    }

    #[test]
    fn test_send_while_not_connected_drops() {
        let mut h = Harness::new();
        for command in Command::ALL {
            assert!(!h.manager.send(command));
        }

        h.manager.start(Instant::now());
        assert!(!h.manager.send(Command::Mute));

        let dropped = std::iter::from_fn(|| h.status.try_recv().ok())
            .filter(|e| matches!(e, StatusEvent::Dropped { .. }))
            .count();
        assert_eq!(dropped, 12);
    }

    #[test]
    fn test_diagnostic_send_is_silent_when_disconnected() {
        let mut h = Harness::new();
        h.manager.send_diagnostic("VOICE:hello".to_string());
        assert!(h.status.try_recv().is_err());
    }

    #[test]
    fn test_lost_schedules_single_reconnect() {
        let mut h = Harness::new();
        let t0 = Instant::now();
        h.manager.start(t0);
        h.lose(t0);

        assert_eq!(h.manager.state(), ConnectionState::Disconnected);
        assert_eq!(h.manager.pending_reconnect(), Some(t0 + RECONNECT));

        // A second fault for the same session does not add another timer
        h.lose(t0 + Duration::from_millis(100));
        assert_eq!(h.manager.pending_reconnect(), Some(t0 + RECONNECT));
    }

    #[test]
    fn test_reconnect_fires_after_delay() {
        let mut h = Harness::new();
        let t0 = Instant::now();
        h.manager.start(t0);
        h.lose(t0);

        h.manager.poll(t0 + Duration::from_millis(1499));
        assert_eq!(h.manager.state(), ConnectionState::Disconnected);
        assert_eq!(h.attempts(), vec![1]);

        h.manager.poll(t0 + RECONNECT);
        assert_eq!(h.manager.state(), ConnectionState::Connecting);
        assert_eq!(h.attempts(), vec![1, 2]);
        assert_eq!(h.manager.pending_reconnect(), None);

        // Polling again does not reconnect twice
        h.manager.poll(t0 + RECONNECT * 2);
        assert_eq!(h.attempts(), vec![1, 2]);
    }

    #[test]
    fn test_open_cancels_pending_reconnect() {
        let mut h = Harness::new();
        let t0 = Instant::now();
        h.manager.start(t0);
        h.lose(t0);
        assert!(h.manager.pending_reconnect().is_some());

        // Explicit start while the timer is still pending
        h.manager.start(t0 + Duration::from_millis(200));
        assert_eq!(h.attempts(), vec![1, 2]);
        assert_eq!(h.manager.pending_reconnect(), Some(t0 + RECONNECT));

        let _link = h.open(t0 + Duration::from_millis(300));
        assert_eq!(h.manager.pending_reconnect(), None);

        h.manager.poll(t0 + RECONNECT * 10);
        assert_eq!(h.attempts(), vec![1, 2]);
        assert_eq!(h.manager.state(), ConnectionState::Connected);
    }

    #[test]
    fn test_stale_session_events_ignored() {
        let mut h = Harness::new();
        let t0 = Instant::now();
        h.manager.start(t0);
        h.lose(t0);
        h.manager.poll(t0 + RECONNECT);

        let (tx, mut rx) = mpsc::unbounded_channel();
        h.manager.handle_link(
            LinkEvent::Opened {
                session: 1,
                outbound: tx,
            },
            t0 + RECONNECT,
        );
        assert_eq!(h.manager.state(), ConnectionState::Connecting);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_remote_close_scenario() {
        let mut h = Harness::new();
        let t0 = Instant::now();
        h.manager.start(t0);
        let mut first = h.open(t0);
        assert_eq!(drain(&mut first), vec!["states".to_string()]);
        h.states();

        // Remote close
        let t1 = t0 + Duration::from_secs(5);
        h.lose(t1);
        drop(first);
        assert_eq!(h.states(), vec![ConnectionState::Disconnected]);

        // Nothing before the delay elapses
        h.manager.poll(t1 + Duration::from_millis(1000));
        assert!(h.states().is_empty());

        // Exactly one attempt after 1500 ms, without a bootstrap
        h.manager.poll(t1 + RECONNECT);
        assert_eq!(h.states(), vec![ConnectionState::Connecting]);
        assert_eq!(h.attempts(), vec![1, 2]);
        assert!(!h.manager.send(Command::UpHigh));

        // Bootstrap is sent again only once Connected
        let mut second = h.open(t1 + RECONNECT + Duration::from_millis(20));
        assert_eq!(drain(&mut second), vec!["states".to_string()]);
    }

    #[test]
    fn test_inbound_text_reported() {
        let mut h = Harness::new();
        let t0 = Instant::now();
        h.manager.start(t0);
        let _link = h.open(t0);
        h.states();

        h.manager.handle_link(
            LinkEvent::Message {
                session: 1,
                text: "paused".to_string(),
            },
            t0,
        );
        let inbound = std::iter::from_fn(|| h.status.try_recv().ok())
            .find(|e| matches!(e, StatusEvent::Inbound { .. }));
        assert_eq!(
            inbound,
            Some(StatusEvent::Inbound {
                text: "paused".to_string()
            })
        );
    }

    #[test]
    fn test_state_serialization() {
        let json = serde_json::to_string(&ConnectionState::Connecting).unwrap();
        assert_eq!(json, r#""connecting""#);
    }
}
