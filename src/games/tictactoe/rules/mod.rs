//! Game rules for tic-tac-toe.
//!
//! Pure functions evaluating a board. The referee decides what a
//! result means for the match.

pub mod draw;
pub mod win;

pub use draw::{is_draw, is_full};
pub use win::{check_winner, has_line};
