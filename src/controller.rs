//! The controller actor
//!
//! One task owns every piece of mutable client state: the connection
//! manager, the input adapters and debouncer, the voice toggle and the queue
//! of deferred impulse releases and recognizer restarts. Front-end requests,
//! link events and timer deadlines are all handled on that task, in arrival
//! order.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};
use url::Url;

use crate::command::Command;
use crate::config::Config;
use crate::connection::{ConnectionManager, Connector, LinkEvent};
use crate::events::{StatusEvent, StatusReporter};
use crate::input::{Action, InputAdapter, InputEvent};
use crate::ipc::ClientStatus;
use crate::timers::{TimerId, TimerQueue};
use crate::voice::{Recognizer, VoiceControl, VoiceError};

/// Outcome of one immediate send
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dispatch {
    pub command: Command,
    pub transmitted: bool,
}

/// Requests handled by the controller task
#[derive(Debug)]
pub enum Control {
    Input {
        event: InputEvent,
        reply: oneshot::Sender<Vec<Dispatch>>,
    },
    Listen {
        enabled: bool,
        reply: oneshot::Sender<Result<bool, VoiceError>>,
    },
    RecognizerEnded,
    Status {
        reply: oneshot::Sender<ClientStatus>,
    },
}

/// Work deferred to a deadline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Deferred {
    /// Impulse release
    Send(Command),
    RestartRecognizer,
}

/// Cloneable handle for talking to the controller task
#[derive(Debug, Clone)]
pub struct ControllerHandle {
    tx: mpsc::Sender<Control>,
}

impl ControllerHandle {
    pub fn new(tx: mpsc::Sender<Control>) -> Self {
        Self { tx }
    }

    pub async fn input(&self, event: InputEvent) -> Result<Vec<Dispatch>> {
        let (reply, rx) = oneshot::channel();
        self.request(Control::Input { event, reply }).await?;
        rx.await.context("controller dropped input reply")
    }

    pub async fn listen(&self, enabled: bool) -> Result<Result<bool, VoiceError>> {
        let (reply, rx) = oneshot::channel();
        self.request(Control::Listen { enabled, reply }).await?;
        rx.await.context("controller dropped listen reply")
    }

    pub async fn recognizer_ended(&self) -> Result<()> {
        self.request(Control::RecognizerEnded).await
    }

    pub async fn status(&self) -> Result<ClientStatus> {
        let (reply, rx) = oneshot::channel();
        self.request(Control::Status { reply }).await?;
        rx.await.context("controller dropped status reply")
    }

    async fn request(&self, control: Control) -> Result<()> {
        self.tx
            .send(control)
            .await
            .map_err(|_| anyhow::anyhow!("controller is not running"))
    }
}

pub struct Controller<C> {
    connection: ConnectionManager<C>,
    adapter: InputAdapter,
    voice: VoiceControl,
    timers: TimerQueue<Deferred>,
    /// Scheduled recognizer restart, if any
    pending_restart: Option<TimerId>,
    status: StatusReporter,
}

impl<C: Connector> Controller<C> {
    pub fn new(
        config: &Config,
        endpoint: Url,
        connector: C,
        recognizer: Option<Box<dyn Recognizer>>,
        status: StatusReporter,
    ) -> Self {
        Self {
            connection: ConnectionManager::new(
                endpoint,
                config.reconnect_delay,
                connector,
                status.clone(),
            ),
            adapter: InputAdapter::new(config.impulse_delay, config.debounce_window),
            voice: VoiceControl::new(recognizer, config.voice_restart_delay),
            timers: TimerQueue::new(),
            pending_restart: None,
            status,
        }
    }

    /// Report capabilities and open the first connection
    pub fn start(&mut self, now: Instant) {
        if !self.voice.is_supported() {
            warn!("speech recognition not supported, voice input disabled");
            self.status.publish(StatusEvent::VoiceUnsupported);
        }
        self.connection.start(now);
    }

    pub fn handle_input(&mut self, event: InputEvent, now: Instant) -> Vec<Dispatch> {
        debug!(source = ?event.source(), "input event");
        // Accepted regardless of the local listening flag
        if let InputEvent::VoiceResult { transcript, .. } = &event {
            info!(%transcript, listening = self.voice.is_listening(), "recognized");
            self.status.publish(StatusEvent::Recognized {
                transcript: transcript.clone(),
            });
        }

        let mut dispatched = Vec::new();
        for action in self.adapter.translate(event) {
            match action {
                Action::Send(command) => {
                    let transmitted = self.connection.send(command);
                    dispatched.push(Dispatch {
                        command,
                        transmitted,
                    });
                }
                Action::SendAt { due, command } => {
                    debug!(
                        %command,
                        delay_ms = due.saturating_duration_since(now).as_millis() as u64,
                        "impulse release scheduled"
                    );
                    self.timers.schedule(due, Deferred::Send(command));
                }
                Action::Diagnostic(frame) => self.connection.send_diagnostic(frame),
            }
        }
        dispatched
    }

    pub fn handle_link(&mut self, event: LinkEvent, now: Instant) {
        self.connection.handle_link(event, now);
    }

    pub fn set_listening(&mut self, enabled: bool) -> Result<bool, VoiceError> {
        let was_listening = self.voice.is_listening();
        let listening = self.voice.set_listening(enabled)?;
        self.cancel_restart();
        if listening != was_listening {
            self.status
                .publish(StatusEvent::ListeningChanged { listening });
        }
        Ok(listening)
    }

    /// The recognizer stopped on its own
    pub fn recognizer_ended(&mut self, now: Instant) {
        let was_listening = self.voice.is_listening();
        self.cancel_restart();
        if let Some(due) = self.voice.on_ended(now) {
            self.pending_restart = Some(self.timers.schedule(due, Deferred::RestartRecognizer));
        }
        if was_listening {
            self.status
                .publish(StatusEvent::ListeningChanged { listening: false });
        }
    }

    /// Run everything due at or before `now`
    pub fn fire_due(&mut self, now: Instant) {
        self.connection.poll(now);

        for deferred in self.timers.drain_due(now) {
            match deferred {
                Deferred::Send(command) => {
                    self.connection.send(command);
                }
                Deferred::RestartRecognizer => {
                    self.pending_restart = None;
                    if !self.voice.is_listening() && self.voice.restart() {
                        self.status
                            .publish(StatusEvent::ListeningChanged { listening: true });
                    }
                }
            }
        }
    }

    fn cancel_restart(&mut self) {
        if let Some(id) = self.pending_restart.take() {
            if self.timers.cancel(id).is_some() {
                debug!("recognizer restart cancelled");
            }
        }
    }

    /// Earliest pending reconnect or deferred send
    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.connection.pending_reconnect(), self.timers.next_deadline()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    pub fn status(&self) -> ClientStatus {
        ClientStatus {
            connection: self.connection.state(),
            endpoint: self.connection.endpoint().to_string(),
            voice_supported: self.voice.is_supported(),
            listening: self.voice.is_listening(),
            reconnect_pending: self.connection.pending_reconnect().is_some(),
            deferred: self.timers.len(),
            ..ClientStatus::default()
        }
    }

    fn handle_control(&mut self, control: Control, now: Instant) {
        match control {
            Control::Input { event, reply } => {
                let _ = reply.send(self.handle_input(event, now));
            }
            Control::Listen { enabled, reply } => {
                let _ = reply.send(self.set_listening(enabled));
            }
            Control::RecognizerEnded => self.recognizer_ended(now),
            Control::Status { reply } => {
                let _ = reply.send(self.status());
            }
        }
    }

    /// Run the controller until every control handle is dropped
    pub async fn run(
        mut self,
        mut controls: mpsc::Receiver<Control>,
        mut links: mpsc::UnboundedReceiver<LinkEvent>,
    ) {
        info!(endpoint = %self.connection.endpoint(), "controller started");
        self.start(Instant::now());

        loop {
            let deadline = self.next_deadline();

            tokio::select! {
                control = controls.recv() => match control {
                    Some(control) => self.handle_control(control, Instant::now()),
                    None => break,
                },

                Some(event) = links.recv() => self.handle_link(event, Instant::now()),

                _ = wait_until(deadline) => self.fire_due(Instant::now()),
            }
        }

        info!("controller stopped");
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
