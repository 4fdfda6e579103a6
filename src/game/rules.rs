//! Win/Draw Evaluation
//!
//! Pure functions deciding whether a board is won, drawn, or still open.
//! They never mutate the board and must be run after a move is applied.

use crate::game::board::{Board, Mark, BOARD_SIZE};

/// Result of evaluating a board.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// No line completed and empty cells remain.
    InProgress,
    /// The mark completed a row, column or diagonal.
    Won(Mark),
    /// Board full, nobody won.
    Draw,
}

impl Outcome {
    /// Whether the match is over.
    pub fn is_terminal(self) -> bool {
        !matches!(self, Outcome::InProgress)
    }
}

/// Check whether `mark` fills a row, column, diagonal or anti-diagonal.
pub fn is_winner(board: &Board, mark: Mark) -> bool {
    let rows = board.rows();
    let filled = |cell: &Option<Mark>| *cell == Some(mark);

    let any_row = rows.iter().any(|row| row.iter().all(filled));
    let any_column = (0..BOARD_SIZE).any(|column| rows.iter().all(|row| filled(&row[column])));
    let diagonal = (0..BOARD_SIZE).all(|i| filled(&rows[i][i]));
    let anti_diagonal = (0..BOARD_SIZE).all(|i| filled(&rows[i][BOARD_SIZE - 1 - i]));

    any_row || any_column || diagonal || anti_diagonal
}

/// Return the first of `mark_a`, `mark_b` that has completed a line.
pub fn evaluate(board: &Board, mark_a: Mark, mark_b: Mark) -> Option<Mark> {
    if is_winner(board, mark_a) {
        Some(mark_a)
    } else if is_winner(board, mark_b) {
        Some(mark_b)
    } else {
        None
    }
}

/// A draw holds iff nobody has won and every cell is occupied.
pub fn is_draw(board: &Board) -> bool {
    evaluate(board, Mark::X, Mark::O).is_none() && board.is_full()
}

/// Classify the board.
pub fn outcome(board: &Board) -> Outcome {
    match evaluate(board, Mark::X, Mark::O) {
        Some(mark) => Outcome::Won(mark),
        None if board.is_full() => Outcome::Draw,
        None => Outcome::InProgress,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const X: Option<Mark> = Some(Mark::X);
    const O: Option<Mark> = Some(Mark::O);
    const E: Option<Mark> = None;

    /// Every winning line as (row, column) triples.
    const LINES: [[(usize, usize); 3]; 8] = [
        [(0, 0), (0, 1), (0, 2)],
        [(1, 0), (1, 1), (1, 2)],
        [(2, 0), (2, 1), (2, 2)],
        [(0, 0), (1, 0), (2, 0)],
        [(0, 1), (1, 1), (2, 1)],
        [(0, 2), (1, 2), (2, 2)],
        [(0, 0), (1, 1), (2, 2)],
        [(0, 2), (1, 1), (2, 0)],
    ];

    fn has_uniform_line(board: &Board, mark: Mark) -> bool {
        LINES
            .iter()
            .any(|line| line.iter().all(|&(r, c)| board.get(r, c) == Some(mark)))
    }

    fn cell_strategy() -> impl Strategy<Value = Option<Mark>> {
        prop_oneof![Just(None), Just(Some(Mark::X)), Just(Some(Mark::O))]
    }

    fn board_strategy() -> impl Strategy<Value = Board> {
        proptest::array::uniform3(proptest::array::uniform3(cell_strategy()))
            .prop_map(Board::from_rows)
    }

    #[test]
    fn test_row_win() {
        let board = Board::from_rows([[X, X, X], [O, O, E], [E, E, E]]);
        assert_eq!(evaluate(&board, Mark::X, Mark::O), Some(Mark::X));
        assert!(!is_draw(&board));
        assert_eq!(outcome(&board), Outcome::Won(Mark::X));
    }

    #[test]
    fn test_column_win() {
        let board = Board::from_rows([[X, O, E], [X, O, E], [E, O, X]]);
        assert_eq!(evaluate(&board, Mark::X, Mark::O), Some(Mark::O));
    }

    #[test]
    fn test_diagonal_win() {
        let board = Board::from_rows([[X, O, E], [O, X, E], [E, E, X]]);
        assert!(is_winner(&board, Mark::X));
        assert!(!is_winner(&board, Mark::O));
    }

    #[test]
    fn test_anti_diagonal_win() {
        let board = Board::from_rows([[X, X, O], [E, O, E], [O, E, X]]);
        assert!(is_winner(&board, Mark::O));
        assert_eq!(outcome(&board), Outcome::Won(Mark::O));
    }

    #[test]
    fn test_full_board_without_line_is_draw() {
        let board = Board::from_rows([[X, O, X], [O, X, O], [O, X, O]]);
        assert_eq!(evaluate(&board, Mark::X, Mark::O), None);
        assert!(is_draw(&board));
        assert_eq!(outcome(&board), Outcome::Draw);
    }

    #[test]
    fn test_full_board_with_line_is_not_draw() {
        let board = Board::from_rows([[X, X, X], [O, O, X], [X, O, O]]);
        assert!(board.is_full());
        assert!(!is_draw(&board));
        assert_eq!(outcome(&board), Outcome::Won(Mark::X));
    }

    #[test]
    fn test_empty_board_in_progress() {
        let board = Board::new();
        assert_eq!(outcome(&board), Outcome::InProgress);
        assert!(!outcome(&board).is_terminal());
    }

    #[test]
    fn test_evaluate_respects_argument_order() {
        // Not reachable in play, but evaluate must check mark_a first.
        let board = Board::from_rows([[X, X, X], [O, O, O], [E, E, E]]);
        assert_eq!(evaluate(&board, Mark::O, Mark::X), Some(Mark::O));
        assert_eq!(evaluate(&board, Mark::X, Mark::O), Some(Mark::X));
    }

    proptest! {
        #[test]
        fn prop_winner_iff_uniform_line(board in board_strategy()) {
            for mark in [Mark::X, Mark::O] {
                prop_assert_eq!(is_winner(&board, mark), has_uniform_line(&board, mark));
            }
        }

        #[test]
        fn prop_draw_iff_full_and_no_winner(board in board_strategy()) {
            let any_line = has_uniform_line(&board, Mark::X) || has_uniform_line(&board, Mark::O);
            prop_assert_eq!(is_draw(&board), board.is_full() && !any_line);
        }
    }
}
