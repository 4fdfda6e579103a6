//! Network Layer
//!
//! WebSocket server, wire protocol and lobby state.
//! All game rules live in `game/`; this layer only routes events to them.

pub mod lobby;
pub mod protocol;
pub mod registry;
pub mod session;
pub mod server;

pub use lobby::{Lobby, LobbyError};
pub use protocol::{
    ClientMessage, ServerMessage, ErrorCode, GameSnapshot, GameResult, HostInfo,
};
pub use registry::{AdmissionError, HostRegistry, IdentityRegistry, Username};
pub use session::{GameSession, Seat, SessionConfig, SessionError, SessionId};
pub use server::{ConfigError, GameServer, ServerConfig, GameServerError};
