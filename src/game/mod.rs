//! Game Logic Module
//!
//! Board representation and pure win/draw rules. No I/O, no shared state.
//!
//! ## Module Structure
//!
//! - `board`: 3x3 grid and marks
//! - `rules`: Win/draw evaluation

pub mod board;
pub mod rules;

// Re-export key types
pub use board::{Board, Mark, BOARD_SIZE};
pub use rules::{evaluate, is_draw, is_winner, outcome, Outcome};
