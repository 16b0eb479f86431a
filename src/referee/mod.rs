//! Turn, outcome, and rematch refereeing for one match.

mod coordinator;
mod state;

pub use coordinator::{ConnectionHandle, Coordinator};
pub use state::{Dispatch, Match, Phase, RestartBallot};
