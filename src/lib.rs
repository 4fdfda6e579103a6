//! # Tic-Tac-Toe Server
//!
//! Multiplayer tic-tac-toe over WebSocket: admission by username,
//! a lobby of hosted games, and authoritative move relay between two players.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   TIC-TAC-TOE SERVER                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  game/           - Rules (pure, no I/O)                      │
//! │  ├── board.rs    - 3x3 grid and marks                        │
//! │  └── rules.rs    - Win and draw evaluation                   │
//! │                                                              │
//! │  network/        - Networking                                │
//! │  ├── server.rs   - WebSocket server and config               │
//! │  ├── protocol.rs - Message types                             │
//! │  ├── registry.rs - Connected names and hosted games          │
//! │  ├── session.rs  - One running two-player game               │
//! │  └── lobby.rs    - Single owner of all shared state          │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Concurrency
//!
//! Every connection task mutates state through one `RwLock<Lobby>`, so
//! registry and session updates are applied one event at a time.
//! Outbound frames go through a bounded per-client mailbox and never
//! block the lobby.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod game;
pub mod network;

// Re-export commonly used types
pub use game::board::{Board, Mark, BOARD_SIZE};
pub use game::rules::{evaluate, Outcome};
pub use network::lobby::Lobby;
pub use network::registry::Username;
pub use network::server::{GameServer, ServerConfig};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
