//! Match state machine.
//!
//! [`Match`] is pure: every operation mutates the aggregate and returns the
//! frames to deliver, addressed by role, in the order they must be sent.
//! The coordinator owns the lock and the connections.

use crate::config::RestartVotePolicy;
use crate::games::tictactoe::{Board, Outcome, Position, Role, Square};
use crate::protocol::{MATCH_STARTED_NOTICE, RESTARTED_NOTICE, Rejection, ServerFrame};
use tracing::{debug, info, instrument, warn};

/// Current protocol phase of a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// A game is running and `turn` may move.
    Playing {
        /// Role allowed to move next.
        turn: Role,
    },
    /// A game ended; waiting for rematch votes.
    AwaitingRestart,
    /// No further moves or votes are processed.
    Terminated,
}

/// A frame addressed to one role.
#[derive(Debug, Clone, PartialEq, Eq, derive_new::new)]
pub struct Dispatch {
    /// Recipient.
    pub to: Role,
    /// Frame to deliver.
    pub frame: ServerFrame,
}

/// Rematch votes cast since the last game ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestartBallot {
    policy: RestartVotePolicy,
    voters: [bool; 2],
    frames: usize,
}

impl RestartBallot {
    /// Creates an empty ballot.
    pub fn new(policy: RestartVotePolicy) -> Self {
        Self {
            policy,
            voters: [false; 2],
            frames: 0,
        }
    }

    /// Records a vote. Returns false when the vote did not count.
    pub fn cast(&mut self, role: Role) -> bool {
        match self.policy {
            RestartVotePolicy::PerRole => {
                let seen = &mut self.voters[role.index()];
                let counted = !*seen;
                *seen = true;
                counted
            }
            RestartVotePolicy::PerFrame => {
                self.voters[role.index()] = true;
                self.frames += 1;
                true
            }
        }
    }

    /// Number of counted votes, capped at 2.
    pub fn count(&self) -> usize {
        let count = match self.policy {
            RestartVotePolicy::PerRole => self.voters.iter().filter(|v| **v).count(),
            RestartVotePolicy::PerFrame => self.frames,
        };
        count.min(2)
    }

    /// Enough votes to restart.
    pub fn is_carried(&self) -> bool {
        self.count() >= 2
    }

    /// Discards all votes.
    pub fn clear(&mut self) {
        self.voters = [false; 2];
        self.frames = 0;
    }
}

/// State of one match between two roles.
#[derive(Debug, Clone)]
pub struct Match {
    board: Board,
    phase: Phase,
    ballot: RestartBallot,
    terminating: bool,
    last_outcome: Option<Outcome>,
    games_finished: u32,
}

impl Match {
    /// Creates a fresh match: empty board, `First` to move.
    #[instrument]
    pub fn new(policy: RestartVotePolicy) -> Self {
        Self {
            board: Board::new(),
            phase: Phase::Playing { turn: Role::First },
            ballot: RestartBallot::new(policy),
            terminating: false,
            last_outcome: None,
            games_finished: 0,
        }
    }

    /// Returns the board.
    pub fn board(&self) -> &Board {
        &self.board
    }

    /// Returns the phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Role allowed to move, if a game is running.
    pub fn current_turn(&self) -> Option<Role> {
        match self.phase {
            Phase::Playing { turn } => Some(turn),
            _ => None,
        }
    }

    /// Counted rematch votes (0..=2).
    pub fn restart_votes(&self) -> usize {
        self.ballot.count()
    }

    /// True once a decline or disconnect has started teardown.
    pub fn is_terminating(&self) -> bool {
        self.terminating
    }

    /// True in the absorbing `Terminated` phase.
    pub fn is_terminated(&self) -> bool {
        self.phase == Phase::Terminated
    }

    /// Outcome of the most recently finished game.
    pub fn last_outcome(&self) -> Option<Outcome> {
        self.last_outcome
    }

    /// Games finished in this match so far.
    pub fn games_finished(&self) -> u32 {
        self.games_finished
    }

    /// Frames announcing the start of the match.
    pub fn opening(&self) -> Vec<Dispatch> {
        let mut out = broadcast(ServerFrame::message(MATCH_STARTED_NOTICE));
        if let Some(turn) = self.current_turn() {
            out.push(Dispatch::new(turn, ServerFrame::YourTurn));
        }
        out
    }

    /// Applies a move request from `role`.
    ///
    /// `target` is `None` when the payload was malformed or out of range.
    #[instrument(skip(self), fields(phase = ?self.phase))]
    pub fn submit_move(&mut self, role: Role, target: Option<Position>) -> Vec<Dispatch> {
        let Phase::Playing { turn } = self.phase else {
            debug!("Move dropped outside of play");
            return Vec::new();
        };

        if role != turn {
            warn!(expected = %turn, "Move out of turn");
            return vec![Dispatch::new(role, Rejection::WrongTurn.into())];
        }

        let Some(pos) = target.filter(|pos| self.board.is_empty(*pos)) else {
            warn!("Move to invalid cell");
            return vec![Dispatch::new(role, Rejection::InvalidCell.into())];
        };

        self.board.set(pos, Square::Occupied(role));
        info!(position = pos.label(), "Move applied");

        let opponent = role.opponent();
        let mut out = vec![
            Dispatch::new(role, ServerFrame::ValidMove(pos)),
            Dispatch::new(opponent, ServerFrame::OpponentMoved(pos)),
        ];

        match Outcome::after_move(&self.board, role) {
            Some(outcome) => {
                match outcome {
                    Outcome::Winner(winner) => {
                        out.push(Dispatch::new(winner, ServerFrame::Victory));
                        out.push(Dispatch::new(winner.opponent(), ServerFrame::Defeat));
                    }
                    Outcome::Draw => out.extend(broadcast(ServerFrame::Draw)),
                }
                out.extend(self.finish_game(outcome));
            }
            None => {
                self.phase = Phase::Playing { turn: opponent };
                out.push(Dispatch::new(opponent, ServerFrame::YourTurn));
            }
        }

        out
    }

    fn finish_game(&mut self, outcome: Outcome) -> Vec<Dispatch> {
        info!(%outcome, board = %self.board.display(), "Game finished");
        self.last_outcome = Some(outcome);
        self.games_finished += 1;
        self.ballot.clear();
        self.phase = Phase::AwaitingRestart;
        broadcast(ServerFrame::GameOver)
    }

    /// Records a rematch vote from `role`.
    #[instrument(skip(self), fields(phase = ?self.phase))]
    pub fn request_restart(&mut self, role: Role) -> Vec<Dispatch> {
        if self.phase != Phase::AwaitingRestart {
            debug!("Restart request ignored outside of game over");
            return Vec::new();
        }

        if !self.ballot.cast(role) {
            debug!("Duplicate restart vote ignored");
            return Vec::new();
        }

        info!(votes = self.ballot.count(), "Restart vote recorded");
        if !self.ballot.is_carried() {
            return Vec::new();
        }

        self.board.clear();
        self.ballot.clear();
        self.phase = Phase::Playing { turn: Role::First };
        info!("Game restarted");

        let mut out = broadcast(ServerFrame::message(RESTARTED_NOTICE));
        out.push(Dispatch::new(Role::First, ServerFrame::YourTurn));
        out
    }

    /// Ends the match at `role`'s request.
    #[instrument(skip(self), fields(phase = ?self.phase))]
    pub fn decline_restart(&mut self, role: Role) -> Vec<Dispatch> {
        if self.phase != Phase::AwaitingRestart {
            debug!("Restart decline ignored outside of game over");
            return Vec::new();
        }

        info!("Rematch declined, terminating match");
        self.terminating = true;
        self.phase = Phase::Terminated;
        vec![
            Dispatch::new(role, ServerFrame::GameTerminated),
            Dispatch::new(role.opponent(), ServerFrame::OpponentDisconnected),
        ]
    }

    /// Handles loss of `role`'s connection.
    ///
    /// Notifies the survivor once; later calls, or calls after a decline,
    /// produce nothing.
    #[instrument(skip(self), fields(phase = ?self.phase))]
    pub fn peer_disconnected(&mut self, role: Role) -> Vec<Dispatch> {
        if self.terminating {
            debug!("Disconnect during termination, not notifying");
            return Vec::new();
        }

        info!("Peer disconnected, terminating match");
        self.terminating = true;
        self.phase = Phase::Terminated;
        vec![Dispatch::new(role.opponent(), ServerFrame::OpponentDisconnected)]
    }
}

fn broadcast(frame: ServerFrame) -> Vec<Dispatch> {
    vec![
        Dispatch::new(Role::First, frame.clone()),
        Dispatch::new(Role::Second, frame),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(row: usize, col: usize) -> Option<Position> {
        Position::from_row_col(row, col)
    }

    fn frames_for(out: &[Dispatch], role: Role) -> Vec<ServerFrame> {
        out.iter()
            .filter(|d| d.to == role)
            .map(|d| d.frame.clone())
            .collect()
    }

    fn play(m: &mut Match, moves: &[(Role, usize, usize)]) -> Vec<Dispatch> {
        let mut last = Vec::new();
        for &(role, row, col) in moves {
            last = m.submit_move(role, at(row, col));
        }
        last
    }

    fn won_match() -> Match {
        let mut m = Match::new(RestartVotePolicy::PerRole);
        play(
            &mut m,
            &[
                (Role::First, 0, 0),
                (Role::Second, 1, 1),
                (Role::First, 0, 1),
                (Role::Second, 2, 2),
                (Role::First, 0, 2),
            ],
        );
        m
    }

    #[test]
    fn test_opening_frames() {
        let m = Match::new(RestartVotePolicy::PerRole);
        let out = m.opening();
        assert_eq!(
            frames_for(&out, Role::First),
            vec![ServerFrame::message(MATCH_STARTED_NOTICE), ServerFrame::YourTurn]
        );
        assert_eq!(
            frames_for(&out, Role::Second),
            vec![ServerFrame::message(MATCH_STARTED_NOTICE)]
        );
    }

    #[test]
    fn test_valid_move_notifies_both_and_passes_turn() {
        let mut m = Match::new(RestartVotePolicy::PerRole);
        let out = m.submit_move(Role::First, at(1, 1));
        assert_eq!(
            out,
            vec![
                Dispatch::new(Role::First, ServerFrame::ValidMove(Position::Center)),
                Dispatch::new(Role::Second, ServerFrame::OpponentMoved(Position::Center)),
                Dispatch::new(Role::Second, ServerFrame::YourTurn),
            ]
        );
        assert_eq!(m.current_turn(), Some(Role::Second));
    }

    #[test]
    fn test_turns_alternate_and_cells_never_overwritten() {
        let mut m = Match::new(RestartVotePolicy::PerRole);
        let moves = [(0, 0), (1, 1), (2, 2), (0, 2), (2, 0), (1, 0)];
        let mut expected = Role::First;
        for (row, col) in moves {
            assert_eq!(m.current_turn(), Some(expected));
            let before = m.board().occupied();
            m.submit_move(expected, at(row, col));
            assert_eq!(m.board().occupied(), before + 1);
            // Replaying the same cell by the next role is always rejected.
            let next = expected.opponent();
            let out = m.submit_move(next, at(row, col));
            assert_eq!(out, vec![Dispatch::new(next, Rejection::InvalidCell.into())]);
            expected = next;
        }
    }

    #[test]
    fn test_wrong_turn_rejected_without_mutation() {
        let mut m = Match::new(RestartVotePolicy::PerRole);
        let out = m.submit_move(Role::Second, at(0, 0));
        assert_eq!(out, vec![Dispatch::new(Role::Second, Rejection::WrongTurn.into())]);
        assert_eq!(m.board(), &Board::new());
        assert_eq!(m.current_turn(), Some(Role::First));
    }

    #[test]
    fn test_wrong_turn_checked_before_cell() {
        let mut m = Match::new(RestartVotePolicy::PerRole);
        let out = m.submit_move(Role::Second, None);
        assert_eq!(out, vec![Dispatch::new(Role::Second, Rejection::WrongTurn.into())]);
    }

    #[test]
    fn test_invalid_cell_rejected_without_mutation() {
        let mut m = Match::new(RestartVotePolicy::PerRole);
        let out = m.submit_move(Role::First, None);
        assert_eq!(out, vec![Dispatch::new(Role::First, Rejection::InvalidCell.into())]);
        assert_eq!(m.board().occupied(), 0);
        assert_eq!(m.current_turn(), Some(Role::First));
    }

    #[test]
    fn test_top_row_victory() {
        let mut m = Match::new(RestartVotePolicy::PerRole);
        let out = play(
            &mut m,
            &[
                (Role::First, 0, 0),
                (Role::Second, 1, 1),
                (Role::First, 0, 1),
                (Role::Second, 2, 2),
                (Role::First, 0, 2),
            ],
        );
        assert_eq!(
            frames_for(&out, Role::First),
            vec![
                ServerFrame::ValidMove(Position::TopRight),
                ServerFrame::Victory,
                ServerFrame::GameOver,
            ]
        );
        assert_eq!(
            frames_for(&out, Role::Second),
            vec![
                ServerFrame::OpponentMoved(Position::TopRight),
                ServerFrame::Defeat,
                ServerFrame::GameOver,
            ]
        );
        assert_eq!(m.phase(), Phase::AwaitingRestart);
        assert_eq!(m.last_outcome(), Some(Outcome::Winner(Role::First)));
        assert_eq!(m.current_turn(), None);
    }

    #[test]
    fn test_draw_reported_once() {
        let mut m = Match::new(RestartVotePolicy::PerRole);
        let out = play(
            &mut m,
            &[
                (Role::First, 0, 0),
                (Role::Second, 0, 1),
                (Role::First, 0, 2),
                (Role::Second, 1, 1),
                (Role::First, 1, 0),
                (Role::Second, 1, 2),
                (Role::First, 2, 1),
                (Role::Second, 2, 0),
                (Role::First, 2, 2),
            ],
        );
        assert_eq!(
            out.iter().filter(|d| d.frame == ServerFrame::Draw).count(),
            2,
            "one DRAW per role"
        );
        assert!(!out.iter().any(|d| d.frame == ServerFrame::Victory));
        assert_eq!(m.last_outcome(), Some(Outcome::Draw));

        // Further moves are dropped, so no second DRAW can follow.
        assert!(m.submit_move(Role::Second, at(0, 0)).is_empty());
    }

    #[test]
    fn test_win_on_last_cell_beats_draw() {
        let mut m = Match::new(RestartVotePolicy::PerRole);
        let out = play(
            &mut m,
            &[
                (Role::First, 0, 0),
                (Role::Second, 0, 1),
                (Role::First, 0, 2),
                (Role::Second, 1, 0),
                (Role::First, 1, 1),
                (Role::Second, 1, 2),
                (Role::First, 2, 1),
                (Role::Second, 2, 0),
                (Role::First, 2, 2),
            ],
        );
        assert!(m.board().squares().iter().all(|s| *s != Square::Empty));
        assert!(out.contains(&Dispatch::new(Role::First, ServerFrame::Victory)));
        assert!(!out.iter().any(|d| d.frame == ServerFrame::Draw));
    }

    #[test]
    fn test_moves_dropped_while_awaiting_restart() {
        let mut m = won_match();
        let board = m.board().clone();
        assert!(m.submit_move(Role::Second, at(2, 0)).is_empty());
        assert_eq!(m.board(), &board);
    }

    #[test]
    fn test_mutual_restart() {
        let mut m = won_match();
        assert!(m.request_restart(Role::Second).is_empty());
        assert_eq!(m.restart_votes(), 1);

        let out = m.request_restart(Role::First);
        assert_eq!(
            frames_for(&out, Role::First),
            vec![ServerFrame::message(RESTARTED_NOTICE), ServerFrame::YourTurn]
        );
        assert_eq!(
            frames_for(&out, Role::Second),
            vec![ServerFrame::message(RESTARTED_NOTICE)]
        );
        assert_eq!(m.board(), &Board::new());
        assert_eq!(m.phase(), Phase::Playing { turn: Role::First });
        assert_eq!(m.restart_votes(), 0);
        assert_eq!(m.games_finished(), 1);
    }

    #[test]
    fn test_duplicate_vote_per_role_does_not_restart() {
        let mut m = won_match();
        m.request_restart(Role::First);
        assert!(m.request_restart(Role::First).is_empty());
        assert_eq!(m.restart_votes(), 1);
        assert_eq!(m.phase(), Phase::AwaitingRestart);
    }

    #[test]
    fn test_per_frame_policy_counts_duplicates() {
        let mut m = Match::new(RestartVotePolicy::PerFrame);
        play(
            &mut m,
            &[
                (Role::First, 0, 0),
                (Role::Second, 1, 1),
                (Role::First, 0, 1),
                (Role::Second, 2, 2),
                (Role::First, 0, 2),
            ],
        );
        m.request_restart(Role::First);
        let out = m.request_restart(Role::First);
        assert!(out.contains(&Dispatch::new(Role::First, ServerFrame::YourTurn)));
        assert_eq!(m.phase(), Phase::Playing { turn: Role::First });
    }

    #[test]
    fn test_restart_vote_ignored_during_play() {
        let mut m = Match::new(RestartVotePolicy::PerRole);
        assert!(m.request_restart(Role::First).is_empty());
        assert!(m.decline_restart(Role::Second).is_empty());
        assert_eq!(m.restart_votes(), 0);
        assert_eq!(m.phase(), Phase::Playing { turn: Role::First });
    }

    #[test]
    fn test_decline_terminates_regardless_of_other_vote() {
        let mut m = won_match();
        m.request_restart(Role::First);
        let out = m.decline_restart(Role::Second);
        assert_eq!(
            out,
            vec![
                Dispatch::new(Role::Second, ServerFrame::GameTerminated),
                Dispatch::new(Role::First, ServerFrame::OpponentDisconnected),
            ]
        );
        assert!(m.is_terminated());

        // Terminated is absorbing.
        assert!(m.request_restart(Role::Second).is_empty());
        assert!(m.submit_move(Role::First, at(2, 0)).is_empty());
        assert!(m.is_terminated());
    }

    #[test]
    fn test_disconnect_after_decline_is_silent() {
        let mut m = won_match();
        m.decline_restart(Role::First);
        assert!(m.peer_disconnected(Role::First).is_empty());
        assert!(m.peer_disconnected(Role::Second).is_empty());
    }

    #[test]
    fn test_disconnect_mid_game_notifies_once() {
        let mut m = Match::new(RestartVotePolicy::PerRole);
        m.submit_move(Role::First, at(0, 0));
        let out = m.peer_disconnected(Role::First);
        assert_eq!(
            out,
            vec![Dispatch::new(Role::Second, ServerFrame::OpponentDisconnected)]
        );
        assert!(m.peer_disconnected(Role::Second).is_empty());
        assert!(m.submit_move(Role::Second, at(1, 1)).is_empty());
    }

    #[test]
    fn test_ballot_caps_at_two() {
        let mut ballot = RestartBallot::new(RestartVotePolicy::PerFrame);
        for _ in 0..5 {
            ballot.cast(Role::Second);
        }
        assert_eq!(ballot.count(), 2);
        ballot.clear();
        assert_eq!(ballot.count(), 0);
    }
}
