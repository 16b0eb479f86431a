//! Match coordinator shared by both connection readers.

use super::state::{Dispatch, Match};
use crate::config::RestartVotePolicy;
use crate::error::SessionError;
use crate::games::tictactoe::{Position, Role};
use crate::protocol::{ClientFrame, ServerFrame};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::{mpsc, watch};
use tracing::{debug, instrument};

/// Outbound side of one peer's connection, tagged with its role.
///
/// Frames are queued in order and written by the connection's writer task.
#[derive(Debug, Clone, derive_new::new)]
pub struct ConnectionHandle {
    role: Role,
    outbound: mpsc::UnboundedSender<ServerFrame>,
}

impl ConnectionHandle {
    /// Role of the peer behind this handle.
    pub fn role(&self) -> Role {
        self.role
    }

    /// Queues a frame. Returns false if the writer has already gone away.
    pub fn send(&self, frame: ServerFrame) -> bool {
        match self.outbound.send(frame) {
            Ok(()) => true,
            Err(err) => {
                debug!(role = %self.role, frame = %err.0, "Writer gone, frame dropped");
                false
            }
        }
    }
}

/// Serialises every operation on one [`Match`] and routes the resulting frames.
///
/// Frames are queued while the match lock is held, so each connection sees
/// them in the order the state machine produced them.
#[derive(Debug)]
pub struct Coordinator {
    state: Mutex<Match>,
    peers: [ConnectionHandle; 2],
    shutdown: watch::Sender<bool>,
}

impl Coordinator {
    /// Creates a coordinator for a freshly paired match.
    pub fn new(
        policy: RestartVotePolicy,
        first: ConnectionHandle,
        second: ConnectionHandle,
    ) -> Result<Self, SessionError> {
        if first.role() != Role::First || second.role() != Role::Second {
            return Err(SessionError::new(format!(
                "Handles paired with roles {} and {}",
                first.role(),
                second.role()
            )));
        }

        let (shutdown, _) = watch::channel(false);
        Ok(Self {
            state: Mutex::new(Match::new(policy)),
            peers: [first, second],
            shutdown,
        })
    }

    /// Receiver that flips to `true` once the match is terminated.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.shutdown.subscribe()
    }

    /// Announces the match and the opening turn.
    #[instrument(skip(self))]
    pub fn open(&self) {
        self.apply(|state| state.opening());
    }

    /// Routes a parsed frame from `role` to the matching operation.
    #[instrument(skip(self))]
    pub fn handle_frame(&self, role: Role, frame: ClientFrame) {
        match frame {
            ClientFrame::Move(target) => self.submit_move(role, target),
            ClientFrame::RestartRequest => self.request_restart(role),
            ClientFrame::RestartDecline => self.decline_restart(role),
            ClientFrame::Unknown(text) => debug!(%text, "Ignoring unknown command"),
        }
    }

    /// See [`Match::submit_move`].
    pub fn submit_move(&self, role: Role, target: Option<Position>) {
        self.apply(|state| state.submit_move(role, target));
    }

    /// See [`Match::request_restart`].
    pub fn request_restart(&self, role: Role) {
        self.apply(|state| state.request_restart(role));
    }

    /// See [`Match::decline_restart`].
    pub fn decline_restart(&self, role: Role) {
        self.apply(|state| state.decline_restart(role));
    }

    /// See [`Match::peer_disconnected`].
    pub fn peer_disconnected(&self, role: Role) {
        self.apply(|state| state.peer_disconnected(role));
    }

    /// Copy of the current match state.
    pub fn snapshot(&self) -> Match {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, Match> {
        // A panic inside an operation leaves the match usable for teardown.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn apply(&self, op: impl FnOnce(&mut Match) -> Vec<Dispatch>) {
        let mut state = self.lock();
        for Dispatch { to, frame } in op(&mut state) {
            self.peers[to.index()].send(frame);
        }
        if state.is_terminated() {
            self.shutdown.send_replace(true);
        }
    }
}
