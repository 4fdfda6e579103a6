//! Lobby
//!
//! Single owner of all shared server state: connected identities, open
//! hosted games, running sessions, and each client's outbound mailbox.
//! The server keeps one `Lobby` behind one lock, so every operation here
//! runs to completion before the next begins.

use std::collections::BTreeMap;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, warn};

use crate::network::protocol::{
    ClientMessage, ConnectError, ErrorCode, HostList, MoveRequest, PlayerLeft, ServerMessage,
};
use crate::network::registry::{AdmissionError, HostRegistry, IdentityRegistry, Username};
use crate::network::session::{GameSession, SessionConfig, SessionError, SessionId};

/// Lobby errors. Each maps to a wire [`ErrorCode`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LobbyError {
    /// Join target is not hosting.
    #[error("no open game hosted by {0}")]
    HostNotFound(Username),

    /// Player tried to join their own game.
    #[error("cannot join your own game")]
    CannotJoinSelf,

    /// Player is already in a session.
    #[error("already in a match")]
    AlreadyInMatch,

    /// Move rejected by the session.
    #[error(transparent)]
    Session(#[from] SessionError),
}

impl LobbyError {
    /// Wire code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            LobbyError::HostNotFound(_) | LobbyError::CannotJoinSelf => ErrorCode::HostNotFound,
            LobbyError::AlreadyInMatch => ErrorCode::AlreadyInMatch,
            LobbyError::Session(SessionError::NotYourTurn) => ErrorCode::NotYourTurn,
            LobbyError::Session(SessionError::CellOccupied { .. }) => ErrorCode::CellOccupied,
            LobbyError::Session(SessionError::OutOfBounds { .. }) => ErrorCode::InvalidInput,
            LobbyError::Session(_) => ErrorCode::InternalError,
        }
    }
}

/// All shared server state.
pub struct Lobby {
    /// Rules applied to new sessions.
    config: SessionConfig,
    /// Connected usernames.
    identities: IdentityRegistry,
    /// Open hosted games.
    hosts: HostRegistry,
    /// Outbound mailbox per admitted client.
    clients: BTreeMap<Username, mpsc::Sender<ServerMessage>>,
    /// Running sessions.
    sessions: BTreeMap<SessionId, GameSession>,
    /// Player to session mapping.
    player_sessions: BTreeMap<Username, SessionId>,
}

impl Lobby {
    /// Create an empty lobby.
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            identities: IdentityRegistry::new(),
            hosts: HostRegistry::new(),
            clients: BTreeMap::new(),
            sessions: BTreeMap::new(),
            player_sessions: BTreeMap::new(),
        }
    }

    // =========================================================================
    // CONNECTION LIFECYCLE
    // =========================================================================

    /// Admit a connection under `username` and register its mailbox.
    ///
    /// On success the client privately receives the current host list.
    pub fn admit(
        &mut self,
        username: Option<String>,
        sender: mpsc::Sender<ServerMessage>,
    ) -> Result<Username, AdmissionError> {
        let name = Username::new(username.ok_or(AdmissionError::Missing)?);
        self.identities.admit(&name)?;
        self.clients.insert(name.clone(), sender);

        let hosts = self.host_list();
        self.send_to(&name, hosts);
        info!("Player {} admitted ({} online)", name, self.identities.len());
        Ok(name)
    }

    /// Tear down everything a connection owned.
    pub fn disconnect(&mut self, name: &Username) {
        self.identities.remove(name);
        self.clients.remove(name);

        if self.hosts.remove_host(name) {
            self.broadcast_hosts();
        }

        if let Some(session_id) = self.player_sessions.get(name).copied() {
            if let Some(session) = self.end_session(&session_id) {
                if let Some(opponent) = session.opponent_of(name) {
                    self.send_to(
                        opponent,
                        ServerMessage::AnotherLeaveGame(PlayerLeft { username: name.clone() }),
                    );
                }
                info!(
                    "Session {} abandoned by {}",
                    hex::encode(&session_id[..4]),
                    name
                );
            }
        }

        info!("Player {} disconnected ({} online)", name, self.identities.len());
    }

    // =========================================================================
    // EVENT DISPATCH
    // =========================================================================

    /// Route one inbound event from an admitted client.
    ///
    /// Failures are reported to the sender as an `error` event.
    pub fn handle(&mut self, from: &Username, msg: ClientMessage) {
        let result = match msg {
            ClientMessage::Auth(_) => {
                debug!("Ignoring repeated auth from {}", from);
                Ok(())
            }
            ClientMessage::HostGame(req) => self.host_game(from, req.tags),
            ClientMessage::StopHost {} => {
                self.stop_host(from);
                Ok(())
            }
            ClientMessage::JoinGame(req) => self.join_game(from, &req.host_name).map(|_| ()),
            ClientMessage::Move(req) => self.play_move(from, req),
            ClientMessage::ListHosts(req) => {
                self.list_hosts(from, &req.tags);
                Ok(())
            }
        };

        if let Err(e) = result {
            debug!("Request from {} rejected: {}", from, e);
            self.send_to(from, ServerMessage::error(e.code(), e.to_string()));
        }
    }

    /// Advertise an open game for `host`.
    pub fn host_game(&mut self, host: &Username, tags: Vec<String>) -> Result<(), LobbyError> {
        if self.player_sessions.contains_key(host) {
            return Err(LobbyError::AlreadyInMatch);
        }
        self.hosts.add_host(host.clone(), tags);
        self.broadcast_hosts();
        debug!("{} is hosting ({} open games)", host, self.hosts.len());
        Ok(())
    }

    /// Withdraw `host`'s open game. Always rebroadcasts the list.
    pub fn stop_host(&mut self, host: &Username) {
        self.hosts.remove_host(host);
        self.broadcast_hosts();
    }

    /// Consume `host_name`'s open game and start a session with `joiner`.
    pub fn join_game(&mut self, joiner: &Username, host_name: &Username) -> Result<SessionId, LobbyError> {
        if joiner == host_name {
            return Err(LobbyError::CannotJoinSelf);
        }
        if self.player_sessions.contains_key(joiner) {
            return Err(LobbyError::AlreadyInMatch);
        }
        if self.hosts.find_host(host_name).is_none() {
            return Err(LobbyError::HostNotFound(host_name.clone()));
        }

        self.hosts.remove_host(host_name);
        self.hosts.remove_host(joiner);
        self.broadcast_hosts();

        let id = uuid::Uuid::new_v4().into_bytes();
        let session = GameSession::start(
            id,
            host_name.clone(),
            joiner.clone(),
            self.config,
            &mut rand::thread_rng(),
        );
        let snapshot = ServerMessage::GameUpdate(session.snapshot());

        self.player_sessions.insert(host_name.clone(), id);
        self.player_sessions.insert(joiner.clone(), id);
        self.sessions.insert(id, session);

        self.send_to(joiner, snapshot.clone());
        self.send_to(host_name, snapshot);

        info!(
            "Session {} started: {} (x) vs {} (o)",
            hex::encode(&id[..4]),
            host_name,
            joiner
        );
        Ok(id)
    }

    /// Apply a move from `mover`. Players outside a session are ignored.
    pub fn play_move(&mut self, mover: &Username, req: MoveRequest) -> Result<(), LobbyError> {
        let Some(session_id) = self.player_sessions.get(mover).copied() else {
            debug!("Move from {} outside a session ignored", mover);
            return Ok(());
        };
        let Some(session) = self.sessions.get_mut(&session_id) else {
            warn!("Player {} mapped to missing session", mover);
            self.player_sessions.remove(mover);
            return Ok(());
        };

        if let Some(seat) = session.seat_of(mover) {
            if seat.mark() != req.value {
                debug!("{} sent mark {} but plays {}", mover, req.value, seat.mark());
            }
        }

        let outcome = session.apply_move(mover, req.x, req.y)?;
        let snapshot = ServerMessage::GameUpdate(session.snapshot());
        let result = session.result(outcome);
        let [host, joined] = session.players().map(Username::clone);

        self.send_to(&joined, snapshot.clone());
        self.send_to(&host, snapshot);

        if let Some(result) = result {
            info!(
                "Session {} finished: winner={:?} draw={}",
                hex::encode(&session_id[..4]),
                result.winner.as_ref().map(Username::as_str),
                result.is_draw
            );
            let win = ServerMessage::Win(result);
            self.send_to(&joined, win.clone());
            self.send_to(&host, win);
            self.end_session(&session_id);
        }
        Ok(())
    }

    /// Privately send `to` the hosts matching every tag in `filter`.
    pub fn list_hosts(&self, to: &Username, filter: &[String]) {
        let hosts = self.hosts.matching(filter);
        self.send_to(to, ServerMessage::UpdateHosts(HostList { hosts }));
    }

    // =========================================================================
    // MESSAGING
    // =========================================================================

    /// Send the full host list to every admitted client.
    pub fn broadcast_hosts(&self) {
        self.broadcast(self.host_list());
    }

    /// Send a message to every admitted client.
    pub fn broadcast(&self, message: ServerMessage) {
        for name in self.clients.keys() {
            self.send_to(name, message.clone());
        }
    }

    /// Queue a message for one client. Full or closed mailboxes drop it.
    pub fn send_to(&self, name: &Username, message: ServerMessage) {
        let Some(sender) = self.clients.get(name) else {
            return;
        };
        match sender.try_send(message) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => warn!("Outbound queue full for {}, dropping message", name),
            Err(TrySendError::Closed(_)) => debug!("Outbound queue closed for {}", name),
        }
    }

    fn host_list(&self) -> ServerMessage {
        ServerMessage::UpdateHosts(HostList {
            hosts: self.hosts.list_hosts(),
        })
    }

    /// Remove a session and unmap both players.
    fn end_session(&mut self, id: &SessionId) -> Option<GameSession> {
        let session = self.sessions.remove(id)?;
        for player in session.players() {
            if self.player_sessions.get(player) == Some(id) {
                self.player_sessions.remove(player);
            }
        }
        Some(session)
    }

    // =========================================================================
    // INSPECTION
    // =========================================================================

    /// Admitted client count.
    pub fn client_count(&self) -> usize {
        self.identities.len()
    }

    /// Open game count.
    pub fn host_count(&self) -> usize {
        self.hosts.len()
    }

    /// Running session count.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Session a player is in.
    pub fn session_of(&self, name: &Username) -> Option<&GameSession> {
        self.player_sessions
            .get(name)
            .and_then(|id| self.sessions.get(id))
    }

    /// Whether a name is currently admitted.
    pub fn is_connected(&self, name: &Username) -> bool {
        self.identities.contains(name)
    }
}

/// The admission rejection frame.
pub fn rejection_message() -> ServerMessage {
    ServerMessage::ConnectError(ConnectError::invalid_username())
}
