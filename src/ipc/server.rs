//! Unix domain socket server for IPC
//!
//! Provides request-response communication and push notifications of
//! indicator events to subscribed clients.

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::events::IndicatorEvent;
use crate::service::{ServiceHandle, ServiceStopped};

use super::protocol::{DaemonStatus, Notification, Request, Response};

const MAX_MESSAGE_LEN: usize = 1024 * 1024;

/// IPC Server handling client connections
pub struct Server {
    socket_path: PathBuf,
    listener: Option<UnixListener>,
    service: ServiceHandle,
    start_time: Instant,
    shutdown_tx: broadcast::Sender<()>,
}

impl Server {
    /// Create a new IPC server bound to `socket_path`
    pub fn new(socket_path: &Path, service: ServiceHandle) -> Result<Self> {
        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent).context("failed to create socket directory")?;
        }

        // Remove stale socket if it exists
        if socket_path.exists() {
            std::fs::remove_file(socket_path).context("failed to remove stale socket")?;
        }

        let listener = UnixListener::bind(socket_path).context("failed to bind Unix socket")?;

        // Owner-only access
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(socket_path, std::fs::Permissions::from_mode(0o600))?;
        }

        let (shutdown_tx, _) = broadcast::channel(1);

        info!(?socket_path, "IPC server listening");

        Ok(Self {
            socket_path: socket_path.to_owned(),
            listener: Some(listener),
            service,
            start_time: Instant::now(),
            shutdown_tx,
        })
    }

    /// Run the server, accepting connections
    pub async fn run(&self) -> Result<()> {
        let listener = self.listener.as_ref().context("server not initialized")?;

        loop {
            match listener.accept().await {
                Ok((stream, _addr)) => {
                    debug!("client connected");
                    let service = self.service.clone();
                    let start_time = self.start_time;
                    let mut shutdown_rx = self.shutdown_tx.subscribe();

                    tokio::spawn(async move {
                        tokio::select! {
                            result = handle_client(stream, service, start_time) => {
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

    /// Gracefully shutdown the server
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());

        if self.socket_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.socket_path) {
                warn!(?e, "failed to remove socket file");
            }
        }

        info!("IPC server shutdown complete");
    }
}

/// Handle a single client connection
async fn handle_client(
    mut stream: UnixStream,
    service: ServiceHandle,
    start_time: Instant,
) -> Result<()> {
    loop {
        let Some(request) = read_message::<_, Request>(&mut stream).await? else {
            debug!("client disconnected");
            return Ok(());
        };
        debug!(?request, "received request");

        if request == Request::Subscribe {
            // Subscribe before confirming so no event slips in between
            let events = service.subscribe();
            send_message(&mut stream, &Response::Subscribed).await?;
            debug!("client subscribed to notifications");
            return push_notifications(&mut stream, events).await;
        }

        let response = process_request(request, &service, start_time).await;
        send_message(&mut stream, &response).await?;
    }
}

/// Forward indicator events until the client goes away
async fn push_notifications<W>(
    stream: &mut W,
    mut events: broadcast::Receiver<IndicatorEvent>,
) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    loop {
        let notification = match events.recv().await {
            Ok(event) => Notification::Indicator { event },
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "subscriber lagged");
                Notification::Lagged { skipped }
            }
            Err(broadcast::error::RecvError::Closed) => return Ok(()),
        };
        if let Err(e) = send_message(stream, &notification).await {
            debug!(?e, "subscriber disconnected");
            return Ok(());
        }
    }
}

/// Process a request and return a response
async fn process_request(
    request: Request,
    service: &ServiceHandle,
    start_time: Instant,
) -> Response {
    let result = match request {
        Request::Ping => Ok(Response::Pong),

        Request::GetStatus => Ok(Response::Status(DaemonStatus {
            uptime_secs: start_time.elapsed().as_secs(),
            engine: service.status().await,
            ..DaemonStatus::default()
        })),

        Request::SetActive { key, active } => {
            if service.report_activity(key, active) {
                Ok(Response::Ok)
            } else {
                Err(ServiceStopped)
            }
        }

        Request::Command { text } => service.command(text).await.map(Response::command_result),

        Request::Hotkey { action } => service.hotkey(action).await.map(Response::command_result),

        Request::UpsertEntity { entity } => service
            .upsert_entity(entity)
            .await
            .map(|handle| Response::EntityStored { handle }),

        Request::RemoveEntity { key } => service
            .remove_entity(key)
            .await
            .map(|removed| Response::EntityRemoved { removed }),

        Request::SetViewer { position } => {
            service.set_viewer(position).await.map(|()| Response::Ok)
        }

        // Handled by the connection loop
        Request::Subscribe => Ok(Response::Subscribed),
    };

    result.unwrap_or_else(|e| Response::error("service_stopped", e.to_string()))
}

/// Read one length-prefixed JSON message; `None` on clean EOF
async fn read_message<R, T>(stream: &mut R) -> Result<Option<T>>
where
    R: AsyncRead + Unpin,
    T: serde::de::DeserializeOwned,
{
    let mut len_buf = [0u8; 4];
    match stream.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_le_bytes(len_buf) as usize;
    if len > MAX_MESSAGE_LEN {
        anyhow::bail!("message too large: {len} bytes");
    }

    let mut msg_buf = vec![0u8; len];
    stream.read_exact(&mut msg_buf).await?;

    let msg = serde_json::from_slice(&msg_buf).context("failed to parse message")?;
    Ok(Some(msg))
}

/// Send a length-prefixed JSON message
async fn send_message<W, T>(stream: &mut W, msg: &T) -> Result<()>
where
    W: AsyncWrite + Unpin,
    T: serde::Serialize,
{
    let msg_bytes = serde_json::to_vec(msg)?;
    let msg_len = (msg_bytes.len() as u32).to_le_bytes();

    stream.write_all(&msg_len).await?;
    stream.write_all(&msg_bytes).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Timing;
    use crate::indicator::ModePolicy;
    use crate::presence::ParticipantKey;
    use crate::roster::{EntityInfo, Team};
    use crate::service::EngineService;
    use crate::settings::{IndicatorSettings, SettingsStore};

    fn frame(json: &str) -> Vec<u8> {
        let mut bytes = (json.len() as u32).to_le_bytes().to_vec();
        bytes.extend_from_slice(json.as_bytes());
        bytes
    }

    #[test]
    fn test_read_message_framing() {
        let mut mock = tokio_test::io::Builder::new()
            .read(&frame(r#"{"type":"ping"}"#))
            .build();
        let request: Option<Request> = tokio_test::block_on(read_message(&mut mock)).unwrap();
        assert_eq!(request, Some(Request::Ping));
    }

    #[test]
    fn test_read_message_eof() {
        let mut mock = tokio_test::io::Builder::new().build();
        let request: Option<Request> = tokio_test::block_on(read_message(&mut mock)).unwrap();
        assert!(request.is_none());
    }

    #[test]
    fn test_read_message_rejects_oversized() {
        let len = ((MAX_MESSAGE_LEN + 1) as u32).to_le_bytes();
        let mut mock = tokio_test::io::Builder::new().read(&len).build();
        let result: Result<Option<Request>> = tokio_test::block_on(read_message(&mut mock));
        assert!(result.is_err());
    }

    #[test]
    fn test_send_message_framing() {
        let mut mock = tokio_test::io::Builder::new()
            .write(&frame(r#"{"type":"pong"}"#)[..4])
            .write(br#"{"type":"pong"}"#)
            .build();
        tokio_test::block_on(send_message(&mut mock, &Response::Pong)).unwrap();
    }

    async fn call(stream: &mut UnixStream, request: &Request) -> Response {
        send_message(stream, request).await.unwrap();
        read_message(stream).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn test_socket_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let socket = dir.path().join("daemon.sock");

        let (service, handle) = EngineService::new(
            &Timing::default(),
            ModePolicy::new(false),
            SettingsStore::in_memory(IndicatorSettings::default()),
        );
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let service_task = tokio::spawn(service.run(shutdown_rx));

        let server = std::sync::Arc::new(Server::new(&socket, handle).unwrap());
        let runner = std::sync::Arc::clone(&server);
        tokio::spawn(async move { runner.run().await });

        let mut client = UnixStream::connect(&socket).await.unwrap();
        assert_eq!(call(&mut client, &Request::Ping).await, Response::Pong);

        let entity = EntityInfo {
            key: ParticipantKey(3),
            name: "Lemieux".into(),
            number: 66,
            team: Team::Blue,
            body: None,
        };
        let response = call(&mut client, &Request::UpsertEntity { entity }).await;
        assert!(matches!(response, Response::EntityStored { .. }));

        let response = call(
            &mut client,
            &Request::Command {
                text: "/voice size 2".into(),
            },
        )
        .await;
        assert_eq!(
            response,
            Response::CommandResult {
                handled: true,
                lines: vec!["Indicator size set to: 2.0".into()],
                settings_changed: true,
            }
        );

        match call(&mut client, &Request::GetStatus).await {
            Response::Status(status) => {
                assert_eq!(status.engine.size, 2.0);
                assert_eq!(status.engine.entities, 1);
                assert!(!status.engine.image_available);
            }
            other => panic!("unexpected response {other:?}"),
        }

        let mut subscriber = UnixStream::connect(&socket).await.unwrap();
        assert_eq!(
            call(&mut subscriber, &Request::Subscribe).await,
            Response::Subscribed
        );
        let response = call(
            &mut client,
            &Request::Command {
                text: "/voice mode off".into(),
            },
        )
        .await;
        assert!(matches!(response, Response::CommandResult { handled: true, .. }));

        let notification: Notification = read_message(&mut subscriber).await.unwrap().unwrap();
        assert!(matches!(
            notification,
            Notification::Indicator {
                event: IndicatorEvent::SettingsChanged { .. }
            }
        ));

        shutdown_tx.send(()).unwrap();
        service_task.await.unwrap();
        server.shutdown().await;
        assert!(!socket.exists());
    }
}
