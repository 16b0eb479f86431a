//! Line-delimited text frames exchanged with players.
//!
//! Every frame is one line: a command keyword, optionally followed by
//! `:` and a payload.

use crate::games::tictactoe::{Position, Role};
use derive_more::{Display, Error};
use std::str::FromStr;
use tracing::instrument;

/// Notice sent when both players have joined.
pub const MATCH_STARTED_NOTICE: &str = "Both players connected.";

/// Notice sent when both players agreed to a rematch.
pub const RESTARTED_NOTICE: &str = "Game restarted.";

/// Command received from a player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientFrame {
    /// `MOVE:row,col`. `None` when the payload is malformed or out of range.
    Move(Option<Position>),
    /// `RESTART_REQUEST`
    RestartRequest,
    /// `RESTART_DECLINE`
    RestartDecline,
    /// Anything else; ignored.
    Unknown(String),
}

impl ClientFrame {
    /// Parses one inbound line. Never fails: unrecognised input is `Unknown`.
    #[instrument]
    pub fn parse(line: &str) -> Self {
        let line = line.trim_end_matches(['\r', '\n']);
        if let Some(payload) = line.strip_prefix("MOVE:") {
            return ClientFrame::Move(Position::parse_coordinates(payload));
        }
        match line {
            "RESTART_REQUEST" => ClientFrame::RestartRequest,
            "RESTART_DECLINE" => ClientFrame::RestartDecline,
            other => ClientFrame::Unknown(other.to_string()),
        }
    }
}

impl std::fmt::Display for ClientFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientFrame::Move(Some(pos)) => write!(f, "MOVE:{}", pos),
            ClientFrame::Move(None) => write!(f, "MOVE:"),
            ClientFrame::RestartRequest => write!(f, "RESTART_REQUEST"),
            ClientFrame::RestartDecline => write!(f, "RESTART_DECLINE"),
            ClientFrame::Unknown(text) => write!(f, "{}", text),
        }
    }
}

/// Frame sent to a player. `Display` yields the wire text without newline.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum ServerFrame {
    /// Role assignment on connect.
    #[display("ASSIGN:{_0}")]
    Assign(Role),
    /// Recipient may move.
    #[display("YOUR_TURN")]
    YourTurn,
    /// Recipient's move was accepted.
    #[display("VALID_MOVE:{_0}")]
    ValidMove(Position),
    /// Opponent's move was accepted.
    #[display("OPPONENT_MOVED:{_0}")]
    OpponentMoved(Position),
    /// Informational or rejection notice.
    #[display("MESSAGE:{_0}")]
    Message(String),
    /// Recipient won.
    #[display("VICTORY")]
    Victory,
    /// Recipient lost.
    #[display("DEFEAT")]
    Defeat,
    /// Board full with no line.
    #[display("DRAW")]
    Draw,
    /// Rematch decision requested.
    #[display("GAME_OVER")]
    GameOver,
    /// Session is ending without rematch.
    #[display("GAME_TERMINATED")]
    GameTerminated,
    /// Opponent left.
    #[display("OPPONENT_DISCONNECTED")]
    OpponentDisconnected,
}

impl ServerFrame {
    /// Builds a `MESSAGE` frame from any displayable notice.
    pub fn message(text: impl std::fmt::Display) -> Self {
        ServerFrame::Message(text.to_string())
    }
}

impl FromStr for ServerFrame {
    type Err = FrameError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim_end_matches(['\r', '\n']);
        let (keyword, payload) = match line.split_once(':') {
            Some((keyword, payload)) => (keyword, Some(payload)),
            None => (line, None),
        };

        let position = |payload: Option<&str>| {
            payload
                .and_then(Position::parse_coordinates)
                .ok_or_else(|| FrameError::new(format!("Bad coordinates in frame: {}", line)))
        };

        match (keyword, payload) {
            ("ASSIGN", Some(letter)) => Role::from_letter(letter)
                .map(ServerFrame::Assign)
                .ok_or_else(|| FrameError::new(format!("Unknown role letter: {}", letter))),
            ("YOUR_TURN", None) => Ok(ServerFrame::YourTurn),
            ("VALID_MOVE", payload) => position(payload).map(ServerFrame::ValidMove),
            ("OPPONENT_MOVED", payload) => position(payload).map(ServerFrame::OpponentMoved),
            ("MESSAGE", Some(text)) => Ok(ServerFrame::Message(text.to_string())),
            ("VICTORY", None) => Ok(ServerFrame::Victory),
            ("DEFEAT", None) => Ok(ServerFrame::Defeat),
            ("DRAW", None) => Ok(ServerFrame::Draw),
            ("GAME_OVER", None) => Ok(ServerFrame::GameOver),
            ("GAME_TERMINATED", None) => Ok(ServerFrame::GameTerminated),
            ("OPPONENT_DISCONNECTED", None) => Ok(ServerFrame::OpponentDisconnected),
            _ => Err(FrameError::new(format!("Unrecognised frame: {}", line))),
        }
    }
}

/// Protocol-level rejection reported to the offending sender only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Rejection {
    /// Move from the role that is not on turn.
    #[display("Not your turn.")]
    WrongTurn,
    /// Malformed, out-of-range, or occupied target cell.
    #[display("Invalid cell.")]
    InvalidCell,
}

impl From<Rejection> for ServerFrame {
    fn from(rejection: Rejection) -> Self {
        ServerFrame::message(rejection)
    }
}

/// Frame that could not be parsed.
#[derive(Debug, Clone, Display, Error)]
#[display("Frame error: {} at {}:{}", message, file, line)]
pub struct FrameError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl FrameError {
    /// Creates a new frame error with caller location tracking.
    #[track_caller]
    pub fn new(message: impl Into<String>) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message: message.into(),
            line: loc.line(),
            file: loc.file(),
        }
    }
}
