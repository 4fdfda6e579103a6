//! Game Session
//!
//! One match between a host and the player who joined them. Owns the board,
//! the advisory turn state, and the rules switches. Sessions do no I/O; the
//! lobby turns their outputs into messages for the two peers.

use rand::Rng;

use crate::game::board::{Board, Mark};
use crate::game::rules::{outcome, Outcome};
use crate::network::protocol::{GameResult, GameSnapshot};
use crate::network::registry::Username;

/// Unique session identifier.
pub type SessionId = [u8; 16];

/// Which side of a session a player sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Seat {
    /// The player who advertised the game. Plays `x`.
    Host,
    /// The player who joined. Plays `o`.
    Joined,
}

impl Seat {
    /// The mark this seat places.
    pub fn mark(self) -> Mark {
        match self {
            Seat::Host => Mark::X,
            Seat::Joined => Mark::O,
        }
    }

    /// The seat owning a mark.
    pub fn for_mark(mark: Mark) -> Self {
        match mark {
            Mark::X => Seat::Host,
            Mark::O => Seat::Joined,
        }
    }

    /// The other seat.
    pub fn other(self) -> Self {
        match self {
            Seat::Host => Seat::Joined,
            Seat::Joined => Seat::Host,
        }
    }

    /// Uniform coin flip between the two seats.
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        if rng.gen_bool(0.5) {
            Seat::Host
        } else {
            Seat::Joined
        }
    }
}

/// Rule switches applied to every session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionConfig {
    /// Reject moves from the blocked player instead of trusting the client.
    pub enforce_turns: bool,
    /// Reject moves onto occupied cells instead of overwriting.
    pub reject_occupied_cells: bool,
}

/// Session errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// Mover is not one of the two players.
    #[error("player not in session")]
    PlayerNotFound,

    /// Coordinates outside the board.
    #[error("cell ({x}, {y}) is off the board")]
    OutOfBounds {
        /// Column.
        x: usize,
        /// Row.
        y: usize,
    },

    /// Mover is currently blocked.
    #[error("not your turn")]
    NotYourTurn,

    /// Target cell already holds a mark.
    #[error("cell ({x}, {y}) is already occupied")]
    CellOccupied {
        /// Column.
        x: usize,
        /// Row.
        y: usize,
    },

    /// Session already reached a result.
    #[error("session is over")]
    Finished,
}

/// A running match.
#[derive(Debug, Clone)]
pub struct GameSession {
    /// Unique session identifier.
    pub id: SessionId,
    /// Rule switches.
    pub config: SessionConfig,
    board: Board,
    host: Username,
    joined: Username,
    blocked: Seat,
    last_mover: Option<Seat>,
    finished: bool,
}

impl GameSession {
    /// Create a session with an explicit initially blocked seat.
    pub fn new(
        id: SessionId,
        host: Username,
        joined: Username,
        initially_blocked: Seat,
        config: SessionConfig,
    ) -> Self {
        Self {
            id,
            config,
            board: Board::new(),
            host,
            joined,
            blocked: initially_blocked,
            last_mover: None,
            finished: false,
        }
    }

    /// Create a session, flipping a coin for who starts blocked.
    pub fn start<R: Rng + ?Sized>(
        id: SessionId,
        host: Username,
        joined: Username,
        config: SessionConfig,
        rng: &mut R,
    ) -> Self {
        Self::new(id, host, joined, Seat::random(rng), config)
    }

    /// Which seat a player occupies.
    pub fn seat_of(&self, player: &Username) -> Option<Seat> {
        if player == &self.host {
            Some(Seat::Host)
        } else if player == &self.joined {
            Some(Seat::Joined)
        } else {
            None
        }
    }

    /// The player sitting on a seat.
    pub fn player(&self, seat: Seat) -> &Username {
        match seat {
            Seat::Host => &self.host,
            Seat::Joined => &self.joined,
        }
    }

    /// The other player, if `player` is in this session.
    pub fn opponent_of(&self, player: &Username) -> Option<&Username> {
        self.seat_of(player).map(|seat| self.player(seat.other()))
    }

    /// Both players, host first.
    pub fn players(&self) -> [&Username; 2] {
        [&self.host, &self.joined]
    }

    /// Current board.
    pub fn board(&self) -> &Board {
        &self.board
    }

    /// Currently blocked seat.
    pub fn blocked(&self) -> Seat {
        self.blocked
    }

    /// Whether a result has been reached.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Place the mover's mark at column `x`, row `y`.
    ///
    /// The cell always receives the mover's seat mark. After the move the
    /// mover becomes the blocked player. Rejected moves change nothing.
    pub fn apply_move(&mut self, mover: &Username, x: usize, y: usize) -> Result<Outcome, SessionError> {
        if self.finished {
            return Err(SessionError::Finished);
        }
        let seat = self.seat_of(mover).ok_or(SessionError::PlayerNotFound)?;

        if !Board::in_bounds(y, x) {
            return Err(SessionError::OutOfBounds { x, y });
        }
        if self.config.enforce_turns && seat == self.blocked {
            return Err(SessionError::NotYourTurn);
        }
        if self.config.reject_occupied_cells && self.board.is_occupied(y, x) {
            return Err(SessionError::CellOccupied { x, y });
        }

        self.board.set(y, x, seat.mark());
        self.last_mover = Some(seat);
        self.blocked = seat;

        let result = outcome(&self.board);
        if result.is_terminal() {
            self.finished = true;
        }
        Ok(result)
    }

    /// Board snapshot for both peers.
    pub fn snapshot(&self) -> GameSnapshot {
        GameSnapshot {
            moves: self.board,
            host_player: self.host.clone(),
            joined_player: self.joined.clone(),
            blocked_user: self.player(self.blocked).clone(),
            last_mover: self.last_mover.map(|seat| self.player(seat).clone()),
        }
    }

    /// Result payload for a terminal outcome. `None` while still in progress.
    pub fn result(&self, outcome: Outcome) -> Option<GameResult> {
        match outcome {
            Outcome::InProgress => None,
            Outcome::Won(mark) => Some(GameResult {
                winner: Some(self.player(Seat::for_mark(mark)).clone()),
                is_draw: false,
            }),
            Outcome::Draw => Some(GameResult {
                winner: None,
                is_draw: true,
            }),
        }
    }
}
