//! Result of one finished game within a match.

use super::{Board, Role, rules};
use serde::{Deserialize, Serialize};

/// Outcome of a finished game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    /// Role completed a line.
    Winner(Role),
    /// Board filled with no line.
    Draw,
}

impl Outcome {
    /// Evaluates the board after `mover` placed a mark.
    ///
    /// A line held by the mover wins even when the same move fills
    /// the last empty square.
    pub fn after_move(board: &Board, mover: Role) -> Option<Self> {
        if rules::has_line(board, mover) {
            Some(Outcome::Winner(mover))
        } else if rules::is_full(board) {
            Some(Outcome::Draw)
        } else {
            None
        }
    }

    /// Returns the winner if there is one.
    pub fn winner(&self) -> Option<Role> {
        match self {
            Outcome::Winner(role) => Some(*role),
            Outcome::Draw => None,
        }
    }

    /// Returns true if the game was a draw.
    pub fn is_draw(&self) -> bool {
        matches!(self, Outcome::Draw)
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Winner(role) => write!(f, "{} wins", role),
            Outcome::Draw => write!(f, "Draw"),
        }
    }
}
