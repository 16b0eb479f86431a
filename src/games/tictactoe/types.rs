//! Core domain types for tic-tac-toe.

use super::position::Position;
use serde::{Deserialize, Serialize};

/// Seat held by a participant for the lifetime of a match.
///
/// `First` always opens a game and is announced on the wire as `X`,
/// `Second` as `O`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display)]
pub enum Role {
    /// First connected participant (moves first).
    #[display("X")]
    First,
    /// Second connected participant.
    #[display("O")]
    Second,
}

impl Role {
    /// Returns the opposing role.
    pub fn opponent(self) -> Self {
        match self {
            Role::First => Role::Second,
            Role::Second => Role::First,
        }
    }

    /// Slot of this role in two-element per-role arrays.
    pub fn index(self) -> usize {
        match self {
            Role::First => 0,
            Role::Second => 1,
        }
    }

    /// Parses the wire letter (`X` or `O`).
    pub fn from_letter(letter: &str) -> Option<Self> {
        match letter {
            "X" => Some(Role::First),
            "O" => Some(Role::Second),
            _ => None,
        }
    }
}

/// A square on the tic-tac-toe board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Square {
    /// Empty square.
    #[default]
    Empty,
    /// Square occupied by a role.
    Occupied(Role),
}

/// 3x3 tic-tac-toe board.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Board {
    /// Squares in row-major order (0-8).
    squares: [Square; 9],
}

impl Board {
    /// Creates a new empty board.
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets the square at the given position.
    pub fn get(&self, pos: Position) -> Square {
        self.squares[pos.to_index()]
    }

    /// Sets the square at the given position.
    pub fn set(&mut self, pos: Position, square: Square) {
        self.squares[pos.to_index()] = square;
    }

    /// Checks if a square is empty.
    pub fn is_empty(&self, pos: Position) -> bool {
        self.get(pos) == Square::Empty
    }

    /// Returns all squares as a slice.
    pub fn squares(&self) -> &[Square; 9] {
        &self.squares
    }

    /// Clears every square.
    pub fn clear(&mut self) {
        self.squares = [Square::Empty; 9];
    }

    /// Number of occupied squares.
    pub fn occupied(&self) -> usize {
        self.squares.iter().filter(|s| **s != Square::Empty).count()
    }

    /// Formats the board as a human-readable string.
    pub fn display(&self) -> String {
        let mut result = String::new();
        for (idx, square) in self.squares.iter().enumerate() {
            let symbol = match square {
                Square::Empty => '.',
                Square::Occupied(Role::First) => 'X',
                Square::Occupied(Role::Second) => 'O',
            };
            result.push(symbol);
            match idx % 3 {
                2 if idx < 8 => result.push('\n'),
                2 => {}
                _ => result.push('|'),
            }
        }
        result
    }
}
