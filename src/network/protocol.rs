//! Protocol Messages
//!
//! Wire format for client-server communication over WebSocket.
//! Every frame is a JSON envelope `{"event": <name>, "data": <payload>}`;
//! event names are the space-separated ones the browser client emits.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::game::board::{Board, Mark};
use crate::network::registry::Username;

/// Message sent with a rejected admission.
pub const INVALID_USERNAME: &str = "invalid username";

// =============================================================================
// CLIENT -> SERVER MESSAGES
// =============================================================================

/// Messages sent from client to server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientMessage {
    /// Admission handshake. Must be the first frame.
    #[serde(rename = "auth")]
    Auth(AuthRequest),

    /// Advertise an open game.
    #[serde(rename = "host game")]
    HostGame(HostGameRequest),

    /// Withdraw the open game.
    #[serde(rename = "stop host")]
    StopHost {},

    /// Take a host's open game and start a session.
    #[serde(rename = "join game")]
    JoinGame(JoinGameRequest),

    /// Place a mark.
    #[serde(rename = "move")]
    Move(MoveRequest),

    /// Ask for the host list filtered by tags.
    #[serde(rename = "list hosts")]
    ListHosts(ListHostsRequest),
}

/// Admission handshake payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthRequest {
    /// Requested username.
    #[serde(default)]
    pub username: Option<String>,
}

/// Host request payload.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HostGameRequest {
    /// Free-text labels for discovery.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub tags: Vec<String>,
}

/// Join request payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinGameRequest {
    /// Username of the host to join.
    pub host_name: Username,
}

/// Move payload. `x` is the column, `y` the row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveRequest {
    /// Column index.
    pub x: usize,
    /// Row index.
    pub y: usize,
    /// Mark the client believes it plays.
    pub value: Mark,
}

/// Filtered host list request payload.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ListHostsRequest {
    /// Every returned host must carry all of these.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub tags: Vec<String>,
}

// =============================================================================
// SERVER -> CLIENT MESSAGES
// =============================================================================

/// Messages sent from server to client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerMessage {
    /// Full list of open games.
    #[serde(rename = "update hosts")]
    UpdateHosts(HostList),

    /// Board snapshot for a running session.
    #[serde(rename = "game update")]
    GameUpdate(GameSnapshot),

    /// Session result.
    #[serde(rename = "win")]
    Win(GameResult),

    /// The opponent disconnected mid-session.
    #[serde(rename = "another leave game")]
    AnotherLeaveGame(PlayerLeft),

    /// Admission refused.
    #[serde(rename = "connect_error")]
    ConnectError(ConnectError),

    /// A request could not be honored.
    #[serde(rename = "error")]
    Error(ServerError),

    /// Server is shutting down.
    #[serde(rename = "shutdown")]
    Shutdown {
        /// Why.
        reason: String,
    },
}

/// Host list payload.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HostList {
    /// Open games in announcement order.
    pub hosts: Vec<HostInfo>,
}

/// One open game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostInfo {
    /// Hosting player.
    pub host_name: Username,
    /// Discovery labels.
    pub tags: Vec<String>,
}

/// Board snapshot payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSnapshot {
    /// Cells, row-major.
    pub moves: Board,
    /// Player holding `x`.
    pub host_player: Username,
    /// Player holding `o`.
    pub joined_player: Username,
    /// Player the client should keep from moving.
    pub blocked_user: Username,
    /// Player who placed the latest mark.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_mover: Option<Username>,
}

/// Result payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameResult {
    /// Winning player, `null` on a draw.
    pub winner: Option<Username>,
    /// Whether the board filled without a winner.
    pub is_draw: bool,
}

/// Opponent-left payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerLeft {
    /// Who left.
    pub username: Username,
}

/// Admission failure payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectError {
    /// Always [`INVALID_USERNAME`].
    pub message: String,
}

impl ConnectError {
    /// The fixed invalid-username error.
    pub fn invalid_username() -> Self {
        Self {
            message: INVALID_USERNAME.to_string(),
        }
    }
}

/// Server error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerError {
    /// Error code.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
}

/// Error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Frame could not be parsed, or a move was off the board.
    InvalidInput,
    /// Join target is not hosting.
    HostNotFound,
    /// Player is already in a session.
    AlreadyInMatch,
    /// Move from the blocked player (turn enforcement on).
    NotYourTurn,
    /// Move onto a taken cell (occupied-cell check on).
    CellOccupied,
    /// Internal error.
    InternalError,
}

// =============================================================================
// SERIALIZATION HELPERS
// =============================================================================

impl ClientMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        Self::from_value(serde_json::from_str(s)?)
    }

    /// Deserialize from a binary frame carrying UTF-8 JSON.
    pub fn from_bytes(data: &[u8]) -> Result<Self, serde_json::Error> {
        Self::from_value(serde_json::from_slice(data)?)
    }

    /// Events without a payload arrive with `data` missing or `null`.
    fn from_value(mut envelope: Value) -> Result<Self, serde_json::Error> {
        if let Value::Object(fields) = &mut envelope {
            let data = fields.entry("data").or_insert(Value::Null);
            if data.is_null() {
                *data = Value::Object(serde_json::Map::new());
            }
        }
        serde_json::from_value(envelope)
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

impl ServerMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    /// Shorthand for an error frame.
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        ServerMessage::Error(ServerError {
            code,
            message: message.into(),
        })
    }
}
