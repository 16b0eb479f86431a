//! Strictly Referee - two-player tic-tac-toe over a line protocol
//!
//! The server pairs two connections into a match, refereeing turns,
//! wins, draws, and the rematch handshake until a player leaves.
//!
//! # Architecture
//!
//! - **Games**: board model and win/draw rules
//! - **Protocol**: newline-delimited text frames
//! - **Referee**: per-match state machine behind one lock
//! - **Session**: pairing loop and connection lifecycle
//!
//! # Example
//!
//! ```no_run
//! use strictly_referee::{ServerConfig, SessionListener};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let listener = SessionListener::bind(ServerConfig::default()).await?;
//! listener.run().await;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Private module declarations
mod config;
mod error;
mod games;
mod protocol;
mod referee;
mod session;

// Crate-level exports - Configuration
pub use config::{ConfigError, RestartVotePolicy, ServerConfig};

// Crate-level exports - Errors
pub use error::SessionError;

// Crate-level exports - Game types (tic-tac-toe)
pub use games::tictactoe::{Board, Outcome, Position, Role, Square, rules};

// Crate-level exports - Wire protocol
pub use protocol::{
    ClientFrame, FrameError, MATCH_STARTED_NOTICE, RESTARTED_NOTICE, Rejection, ServerFrame,
};

// Crate-level exports - Refereeing
pub use referee::{ConnectionHandle, Coordinator, Dispatch, Match, Phase, RestartBallot};

// Crate-level exports - Sessions
pub use session::{Seat, SessionListener, play_match};
