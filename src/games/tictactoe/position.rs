//! Board positions and their `row,col` wire form.

use super::types::Board;
use serde::{Deserialize, Serialize};
use tracing::instrument;

/// A cell on the tic-tac-toe board.
///
/// Rows and columns are 0-based; the wire form is `row,col`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::EnumIter)]
pub enum Position {
    /// Top-left (0,0)
    TopLeft,
    /// Top-center (0,1)
    TopCenter,
    /// Top-right (0,2)
    TopRight,
    /// Middle-left (1,0)
    MiddleLeft,
    /// Center (1,1)
    Center,
    /// Middle-right (1,2)
    MiddleRight,
    /// Bottom-left (2,0)
    BottomLeft,
    /// Bottom-center (2,1)
    BottomCenter,
    /// Bottom-right (2,2)
    BottomRight,
}

impl Position {
    /// Get label for this position (for logs).
    pub fn label(&self) -> &'static str {
        match self {
            Position::TopLeft => "Top-left",
            Position::TopCenter => "Top-center",
            Position::TopRight => "Top-right",
            Position::MiddleLeft => "Middle-left",
            Position::Center => "Center",
            Position::MiddleRight => "Middle-right",
            Position::BottomLeft => "Bottom-left",
            Position::BottomCenter => "Bottom-center",
            Position::BottomRight => "Bottom-right",
        }
    }

    /// Converts position to board index (0-8, row-major).
    pub fn to_index(self) -> usize {
        match self {
            Position::TopLeft => 0,
            Position::TopCenter => 1,
            Position::TopRight => 2,
            Position::MiddleLeft => 3,
            Position::Center => 4,
            Position::MiddleRight => 5,
            Position::BottomLeft => 6,
            Position::BottomCenter => 7,
            Position::BottomRight => 8,
        }
    }

    /// Creates position from board index.
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Creates position from 0-based row and column.
    ///
    /// Returns `None` when either coordinate is outside `[0,3)`.
    pub fn from_row_col(row: usize, col: usize) -> Option<Self> {
        if row < 3 && col < 3 {
            Self::from_index(row * 3 + col)
        } else {
            None
        }
    }

    /// 0-based row.
    pub fn row(self) -> usize {
        self.to_index() / 3
    }

    /// 0-based column.
    pub fn col(self) -> usize {
        self.to_index() % 3
    }

    /// Parses a `row,col` payload of single ASCII digits.
    ///
    /// Malformed text and out-of-range coordinates both yield `None`.
    #[instrument]
    pub fn parse_coordinates(payload: &str) -> Option<Self> {
        fn digit(text: &str) -> Option<usize> {
            match text.as_bytes() {
                [d @ b'0'..=b'9'] => Some(usize::from(d - b'0')),
                _ => None,
            }
        }

        let (row, col) = payload.split_once(',')?;
        Self::from_row_col(digit(row)?, digit(col)?)
    }

    /// All 9 positions.
    pub const ALL: [Position; 9] = [
        Position::TopLeft,
        Position::TopCenter,
        Position::TopRight,
        Position::MiddleLeft,
        Position::Center,
        Position::MiddleRight,
        Position::BottomLeft,
        Position::BottomCenter,
        Position::BottomRight,
    ];

    /// Filters positions by board state - returns only empty squares.
    #[instrument(skip(board))]
    pub fn valid_moves(board: &Board) -> Vec<Position> {
        <Position as strum::IntoEnumIterator>::iter()
            .filter(|pos| board.is_empty(*pos))
            .collect()
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{},{}", self.row(), self.col())
    }
}
