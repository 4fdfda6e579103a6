//! Board Definitions
//!
//! The 3x3 grid a match is played on, and the two marks that fill it.
//! Cells are addressed row-major: `cells[row][column]`.

use std::fmt;
use serde::{Serialize, Deserialize};

/// Board side length.
pub const BOARD_SIZE: usize = 3;

// =============================================================================
// MARK
// =============================================================================

/// A mark placed in a cell.
///
/// The host of a session always plays `X`, the joined player `O`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mark {
    /// Host's mark.
    X,
    /// Joined player's mark.
    O,
}

impl fmt::Display for Mark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mark::X => write!(f, "x"),
            Mark::O => write!(f, "o"),
        }
    }
}

// =============================================================================
// BOARD
// =============================================================================

/// Row-major grid of cells. Serializes as a nested array of `"x"`, `"o"` or `null`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Board {
    cells: [[Option<Mark>; BOARD_SIZE]; BOARD_SIZE],
}

impl Board {
    /// Create an empty board.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a board from explicit rows.
    pub const fn from_rows(cells: [[Option<Mark>; BOARD_SIZE]; BOARD_SIZE]) -> Self {
        Self { cells }
    }

    /// Whether `(row, column)` lies on the board.
    #[inline]
    pub fn in_bounds(row: usize, column: usize) -> bool {
        row < BOARD_SIZE && column < BOARD_SIZE
    }

    /// Get the mark at a cell. Out-of-range coordinates read as empty.
    pub fn get(&self, row: usize, column: usize) -> Option<Mark> {
        self.cells
            .get(row)
            .and_then(|r| r.get(column))
            .copied()
            .flatten()
    }

    /// Place a mark, overwriting whatever was there.
    ///
    /// Returns the previous content, or `None` for out-of-range coordinates
    /// (in which case nothing is written).
    pub fn set(&mut self, row: usize, column: usize, mark: Mark) -> Option<Option<Mark>> {
        let cell = self.cells.get_mut(row)?.get_mut(column)?;
        Some(cell.replace(mark))
    }

    /// Whether a cell holds a mark.
    pub fn is_occupied(&self, row: usize, column: usize) -> bool {
        self.get(row, column).is_some()
    }

    /// Whether every cell holds a mark.
    pub fn is_full(&self) -> bool {
        self.cells.iter().all(|row| row.iter().all(Option::is_some))
    }

    /// Number of occupied cells.
    pub fn occupied_count(&self) -> usize {
        self.cells.iter().flatten().filter(|c| c.is_some()).count()
    }

    /// Borrow the rows.
    pub fn rows(&self) -> &[[Option<Mark>; BOARD_SIZE]; BOARD_SIZE] {
        &self.cells
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_board_is_empty() {
        let board = Board::new();
        assert_eq!(board.occupied_count(), 0);
        assert!(!board.is_full());
        for row in 0..BOARD_SIZE {
            for column in 0..BOARD_SIZE {
                assert_eq!(board.get(row, column), None);
            }
        }
    }

    #[test]
    fn test_set_returns_previous() {
        let mut board = Board::new();
        assert_eq!(board.set(1, 2, Mark::X), Some(None));
        assert_eq!(board.set(1, 2, Mark::O), Some(Some(Mark::X)));
        assert_eq!(board.get(1, 2), Some(Mark::O));
    }

    #[test]
    fn test_out_of_range_is_ignored() {
        let mut board = Board::new();
        assert_eq!(board.set(3, 0, Mark::X), None);
        assert_eq!(board.set(0, 7, Mark::X), None);
        assert_eq!(board.get(9, 9), None);
        assert_eq!(board, Board::new());
    }

    #[test]
    fn test_serializes_as_nested_array() {
        let mut board = Board::new();
        board.set(0, 0, Mark::X);
        board.set(2, 1, Mark::O);

        let json = serde_json::to_string(&board).unwrap();
        assert_eq!(json, r#"[["x",null,null],[null,null,null],[null,"o",null]]"#);

        let parsed: Board = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, board);
    }
}
