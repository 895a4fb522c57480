//! Unix domain socket server for IPC
//!
//! Front-ends send input and voice requests and get immediate responses.
//! Subscribed clients additionally receive every status event as a pushed
//! notification frame.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::controller::ControllerHandle;
use crate::events::StatusReporter;
use crate::input::{self, InputEvent, InputSource};
use crate::voice::VoiceError;

use super::protocol::{Request, Response};

const MAX_FRAME_LEN: usize = 1024 * 1024;

/// IPC Server handling front-end connections
pub struct Server {
    socket_path: PathBuf,
    listener: UnixListener,
    controller: ControllerHandle,
    status: StatusReporter,
    shutdown_tx: broadcast::Sender<()>,
}

impl Server {
    /// Create a new IPC server
    pub fn new(
        socket_path: &Path,
        controller: ControllerHandle,
        status: StatusReporter,
    ) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent).context("failed to create socket directory")?;
        }

        // Remove stale socket if it exists
        if socket_path.exists() {
            std::fs::remove_file(socket_path).context("failed to remove stale socket")?;
        }

        let listener = UnixListener::bind(socket_path).context("failed to bind Unix socket")?;

        // Set socket permissions to owner-only (0600)
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(socket_path, std::fs::Permissions::from_mode(0o600))?;
        }

        let (shutdown_tx, _) = broadcast::channel(1);

        info!(?socket_path, "IPC server listening");

        Ok(Self {
            socket_path: socket_path.to_owned(),
            listener,
            controller,
            status,
            shutdown_tx,
        })
    }

    /// Run the server, accepting connections
    pub async fn run(&self) -> Result<()> {
        loop {
            match self.listener.accept().await {
                Ok((stream, _addr)) => {
                    debug!("client connected");
                    let controller = self.controller.clone();
                    let status = self.status.clone();
                    let mut shutdown_rx = self.shutdown_tx.subscribe();

                    tokio::spawn(async move {
                        tokio::select! {
                            result = Self::handle_client(stream, controller, status) => {
                                if let Err(e) = result {
                                    warn!(?e, "client handler error");
                                }
                            }
                            _ = shutdown_rx.recv() => {
                                debug!("client handler shutting down");
                            }
                        }
                    });
                }
                Err(e) => {
                    error!(?e, "accept error");
                }
            }
        }
    }

    /// Handle a single client connection
    async fn handle_client(
        stream: UnixStream,
        controller: ControllerHandle,
        status: StatusReporter,
    ) -> Result<()> {
        let (mut reader, writer) = stream.into_split();

        // Responses and notifications share one writer
        let (frame_tx, frame_rx) = mpsc::channel::<Response>(64);
        let writer_task = tokio::spawn(Self::write_frames(writer, frame_rx));
        let mut forwarder: Option<JoinHandle<()>> = None;

        let result = async {
            while let Some(request) = Self::read_request(&mut reader).await? {
                debug!(?request, "received request");

                if matches!(request, Request::Subscribe) && forwarder.is_none() {
                    forwarder = Some(Self::forward_status(status.subscribe(), frame_tx.clone()));
                    debug!("client subscribed to notifications");
                }

                let response = Self::process_request(request, &controller).await;
                if frame_tx.send(response).await.is_err() {
                    break;
                }
            }
            Ok::<_, anyhow::Error>(())
        }
        .await;

        if let Some(forwarder) = forwarder {
            forwarder.abort();
        }
        drop(frame_tx);
        writer_task.await.context("writer task panicked")??;
        result
    }

    /// Read one length-prefixed request; `None` on clean disconnect
    async fn read_request(reader: &mut OwnedReadHalf) -> Result<Option<Request>> {
        let mut len_buf = [0u8; 4];
        match reader.read_exact(&mut len_buf).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                debug!("client disconnected");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        }

        let len = u32::from_le_bytes(len_buf) as usize;
        if len > MAX_FRAME_LEN {
            warn!(len, "message too large, disconnecting");
            return Ok(None);
        }

        let mut msg_buf = vec![0u8; len];
        reader.read_exact(&mut msg_buf).await?;

        let request = serde_json::from_slice(&msg_buf).context("failed to parse request")?;
        Ok(Some(request))
    }

    async fn write_frames(
        mut writer: OwnedWriteHalf,
        mut frames: mpsc::Receiver<Response>,
    ) -> Result<()> {
        while let Some(response) = frames.recv().await {
            Self::send_message(&mut writer, &response).await?;
        }
        Ok(())
    }

    /// Send a length-prefixed JSON message
    async fn send_message<T: serde::Serialize>(writer: &mut OwnedWriteHalf, msg: &T) -> Result<()> {
        let msg_bytes = serde_json::to_vec(msg)?;
        let msg_len = (msg_bytes.len() as u32).to_le_bytes();

        writer.write_all(&msg_len).await?;
        writer.write_all(&msg_bytes).await?;

        Ok(())
    }

    /// Push status events to a subscribed client
    fn forward_status(
        mut events: broadcast::Receiver<crate::events::StatusEvent>,
        frames: mpsc::Sender<Response>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        if frames.send(Response::Notification { event }).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "status subscriber lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    /// Process a request and return a response
    async fn process_request(request: Request, controller: &ControllerHandle) -> Response {
        let now = Instant::now();
        let result = match request {
            Request::Ping => return Response::Pong,
            Request::Subscribe => return Response::Subscribed,

            Request::Gesture { axis, gesture } => {
                Self::dispatch(controller, InputEvent::from_gesture(gesture, axis, now)).await
            }
            Request::Key { key } => match input::key_down(&key, now) {
                Some(event) => Self::dispatch(controller, event).await,
                None => Ok(Response::Dispatched { results: Vec::new() }),
            },
            Request::Click { command } => {
                let event = InputEvent::Toggle {
                    source: InputSource::Button,
                    command,
                    at: now,
                };
                Self::dispatch(controller, event).await
            }
            Request::Voice { transcript } => {
                Self::dispatch(controller, InputEvent::VoiceResult { transcript, at: now }).await
            }

            Request::Listen { enabled } => {
                controller.listen(enabled).await.map(|result| match result {
                    Ok(listening) => Response::Listening { listening },
                    Err(e @ VoiceError::Unsupported) => {
                        Response::error("unsupported", e.to_string())
                    }
                })
            }
            Request::RecognizerEnded => controller.recognizer_ended().await.map(|()| Response::Ok),
            Request::GetStatus => controller.status().await.map(Response::Status),
        };

        result.unwrap_or_else(|e| {
            error!(?e, "controller request failed");
            Response::error("internal", e.to_string())
        })
    }

    async fn dispatch(controller: &ControllerHandle, event: InputEvent) -> Result<Response> {
        let results = controller.input(event).await?;
        Ok(Response::Dispatched { results })
    }

    /// Gracefully shutdown the server
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());

        // Remove socket file
        if self.socket_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.socket_path) {
                warn!(?e, "failed to remove socket file");
            }
        }

        info!("IPC server shutdown complete");
    }
}
