//! WebSocket Game Server
//!
//! Async WebSocket server for multiplayer connections.
//! Handles admission, then routes each client's events into the shared lobby.

use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use futures_util::stream::Stream;
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, instrument, warn};

use crate::network::lobby::{rejection_message, Lobby};
use crate::network::protocol::{ClientMessage, ErrorCode, ServerMessage, INVALID_USERNAME};
use crate::network::registry::AdmissionError;
use crate::network::session::SessionConfig;

/// Port used when neither `BIND_ADDR` nor `PORT` is set.
pub const DEFAULT_PORT: u16 = 3000;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address.
    pub bind_addr: SocketAddr,
    /// Maximum concurrent connections, admitted or not.
    pub max_connections: usize,
    /// How long a new connection may take to send its auth frame.
    pub auth_timeout: Duration,
    /// Outbound mailbox capacity per client.
    pub outbound_buffer: usize,
    /// Rules applied to every session.
    pub session: SessionConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            max_connections: 1000,
            auth_timeout: Duration::from_secs(10),
            outbound_buffer: 64,
            session: SessionConfig::default(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// An environment variable held an unparseable value.
    #[error("invalid value for {key}: {value:?}")]
    Invalid {
        /// Variable name.
        key: &'static str,
        /// Offending value.
        value: String,
    },
}

impl ServerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create config from any key lookup. Unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(addr) = parse_var::<SocketAddr, _>(&lookup, "BIND_ADDR")? {
            config.bind_addr = addr;
        } else if let Some(port) = parse_var::<u16, _>(&lookup, "PORT")? {
            config.bind_addr.set_port(port);
        }
        if let Some(max) = parse_var(&lookup, "MAX_CONNECTIONS")? {
            config.max_connections = max;
        }
        if let Some(secs) = parse_var(&lookup, "AUTH_TIMEOUT_SECS")? {
            config.auth_timeout = Duration::from_secs(secs);
        }
        if let Some(buffer) = parse_var::<usize, _>(&lookup, "OUTBOUND_BUFFER")? {
            config.outbound_buffer = buffer.max(1);
        }
        if let Some(flag) = parse_flag(&lookup, "ENFORCE_TURNS")? {
            config.session.enforce_turns = flag;
        }
        if let Some(flag) = parse_flag(&lookup, "REJECT_OCCUPIED_CELLS")? {
            config.session.reject_occupied_cells = flag;
        }

        Ok(config)
    }
}

fn parse_var<T, F>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { key, value }),
    }
}

fn parse_flag<F>(lookup: &F, key: &'static str) -> Result<Option<bool>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key).as_deref().map(str::trim) {
        None => Ok(None),
        Some("true") | Some("1") => Ok(Some(true)),
        Some("false") | Some("0") => Ok(Some(false)),
        Some(other) => Err(ConfigError::Invalid {
            key,
            value: other.to_string(),
        }),
    }
}

/// Game server errors.
#[derive(Debug, thiserror::Error)]
pub enum GameServerError {
    /// Failed to bind to address.
    #[error("Failed to bind: {0}")]
    BindFailed(#[from] std::io::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Outbound message could not be encoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// The game server.
pub struct GameServer {
    /// Server configuration.
    config: ServerConfig,
    /// Shared lobby state.
    lobby: Arc<RwLock<Lobby>>,
    /// Open sockets, admitted or not.
    active_connections: Arc<AtomicUsize>,
    /// Shutdown signal.
    shutdown_tx: broadcast::Sender<()>,
}

impl GameServer {
    /// Create a new game server.
    pub fn new(config: ServerConfig) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            lobby: Arc::new(RwLock::new(Lobby::new(config.session))),
            config,
            active_connections: Arc::new(AtomicUsize::new(0)),
            shutdown_tx,
        }
    }

    /// Bind the configured address and run the server.
    #[instrument(skip(self))]
    pub async fn run(&self) -> Result<(), GameServerError> {
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        self.serve(listener).await
    }

    /// Accept connections on an already bound listener until shutdown.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), GameServerError> {
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        info!("Game server listening on {}", listener.local_addr()?);

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            let active = self.active_connections.load(Ordering::SeqCst);
                            if active >= self.config.max_connections {
                                warn!("Connection limit reached, rejecting {}", addr);
                                continue;
                            }

                            debug!("New connection from {}", addr);
                            self.handle_connection(stream, addr);
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        Ok(())
    }

    /// Spawn the task owning one connection.
    fn handle_connection(&self, stream: TcpStream, addr: SocketAddr) {
        let lobby = self.lobby.clone();
        let config = self.config.clone();
        let shutdown_rx = self.shutdown_tx.subscribe();
        let active = self.active_connections.clone();
        active.fetch_add(1, Ordering::SeqCst);

        tokio::spawn(async move {
            if let Err(e) = Self::run_connection(stream, addr, &lobby, &config, shutdown_rx).await {
                debug!("Connection {} ended with error: {}", addr, e);
            }
            active.fetch_sub(1, Ordering::SeqCst);
        });
    }

    /// Admission, then the read loop, then cleanup.
    async fn run_connection(
        stream: TcpStream,
        addr: SocketAddr,
        lobby: &Arc<RwLock<Lobby>>,
        config: &ServerConfig,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> Result<(), GameServerError> {
        let ws_stream = accept_async(stream).await?;
        let (mut ws_sender, mut ws_receiver) = ws_stream.split();
        let (msg_tx, mut msg_rx) = mpsc::channel::<ServerMessage>(config.outbound_buffer);

        // Admission runs before any event handler
        let requested = match timeout(config.auth_timeout, read_handshake(&mut ws_receiver)).await {
            Ok(Ok(username)) => Ok(username),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(AdmissionError::NoHandshake),
        };
        let admitted = match requested {
            Ok(username) => lobby.write().await.admit(username, msg_tx.clone()),
            Err(e) => Err(e),
        };
        let username = match admitted {
            Ok(name) => name,
            Err(e) => {
                info!("Rejected connection from {}: {}", addr, e);
                ws_sender.send(Message::Text(rejection_message().to_json()?)).await?;
                ws_sender
                    .send(Message::Close(Some(CloseFrame {
                        code: CloseCode::Policy,
                        reason: INVALID_USERNAME.into(),
                    })))
                    .await?;
                return Ok(());
            }
        };

        // Spawn message sender task
        let sender_task = tokio::spawn(async move {
            while let Some(msg) = msg_rx.recv().await {
                let text = match msg.to_json() {
                    Ok(t) => t,
                    Err(e) => {
                        error!("Failed to serialize message: {}", e);
                        continue;
                    }
                };
                if ws_sender.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
            let _ = ws_sender.close().await;
        });

        // Handle incoming messages
        loop {
            tokio::select! {
                frame = ws_receiver.next() => {
                    let parsed = match frame {
                        Some(Ok(Message::Text(text))) => ClientMessage::from_json(&text),
                        Some(Ok(Message::Binary(data))) => ClientMessage::from_bytes(&data),
                        Some(Ok(Message::Close(_))) | None => {
                            debug!("Client {} ({}) disconnected", username, addr);
                            break;
                        }
                        Some(Err(e)) => {
                            warn!("WebSocket error for {}: {}", addr, e);
                            break;
                        }
                        Some(Ok(_)) => continue,
                    };

                    match parsed {
                        Ok(msg) => lobby.write().await.handle(&username, msg),
                        Err(e) => {
                            debug!("Invalid message from {}: {}", username, e);
                            let _ = msg_tx
                                .send(ServerMessage::error(ErrorCode::InvalidInput, "Invalid message format"))
                                .await;
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    let _ = msg_tx.send(ServerMessage::Shutdown {
                        reason: "Server shutting down".to_string(),
                    }).await;
                    break;
                }
            }
        }

        // Cleanup: the lobby holds the other mailbox handle, so after both are
        // gone the sender task drains what is queued and exits.
        lobby.write().await.disconnect(&username);
        drop(msg_tx);
        if timeout(Duration::from_secs(1), sender_task).await.is_err() {
            debug!("Sender task for {} did not drain in time", username);
        }

        info!("Client {} ({}) cleaned up", username, addr);
        Ok(())
    }

    /// Shutdown the server.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Get admitted client count.
    pub async fn connection_count(&self) -> usize {
        self.lobby.read().await.client_count()
    }

    /// Get running session count.
    pub async fn session_count(&self) -> usize {
        self.lobby.read().await.session_count()
    }

    /// Get open hosted game count.
    pub async fn host_count(&self) -> usize {
        self.lobby.read().await.host_count()
    }
}

/// Wait for the first data frame and extract the requested username.
async fn read_handshake<S, E>(receiver: &mut S) -> Result<Option<String>, AdmissionError>
where
    S: Stream<Item = Result<Message, E>> + Unpin,
{
    while let Some(frame) = receiver.next().await {
        let parsed = match frame {
            Ok(Message::Text(text)) => ClientMessage::from_json(&text),
            Ok(Message::Binary(data)) => ClientMessage::from_bytes(&data),
            Ok(Message::Close(_)) | Err(_) => return Err(AdmissionError::NoHandshake),
            Ok(_) => continue,
        };
        return match parsed {
            Ok(ClientMessage::Auth(auth)) => Ok(auth.username),
            _ => Err(AdmissionError::NoHandshake),
        };
    }
    Err(AdmissionError::NoHandshake)
}
