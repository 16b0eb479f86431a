mod phases;
mod position;
pub mod rules;
mod types;

pub use phases::Outcome;
pub use position::Position;
pub use types::{Board, Role, Square};
