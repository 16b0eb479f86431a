//! Pairing loop and per-match connection lifecycle.
//!
//! The listener accepts two connections, seats them as `First` and `Second`
//! in arrival order, and hosts the match until both readers have finished.
//! A match only needs two byte streams, so it runs the same over TCP or
//! in-memory pipes.

use crate::config::{RestartVotePolicy, ServerConfig};
use crate::error::SessionError;
use crate::games::tictactoe::Role;
use crate::protocol::{ClientFrame, ServerFrame};
use crate::referee::{ConnectionHandle, Coordinator};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{
    AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, ReadHalf, WriteHalf,
};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};
use tracing::{Instrument, debug, error, info, info_span, instrument, warn};

/// Pause after a failed accept before trying again.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// One seated connection: its read half plus a writer task fed by a queue.
#[derive(Debug)]
pub struct Seat<S> {
    role: Role,
    reader: ReadHalf<S>,
    handle: ConnectionHandle,
    writer: JoinHandle<()>,
}

impl<S> Seat<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    /// Splits the stream, starts its writer, and sends the role assignment.
    #[instrument(skip(stream))]
    pub fn open(stream: S, role: Role) -> Self {
        let (reader, writer) = tokio::io::split(stream);
        let (outbound, frames) = mpsc::unbounded_channel();
        let writer =
            tokio::spawn(write_frames(writer, frames).instrument(info_span!("writer", %role)));

        let handle = ConnectionHandle::new(role, outbound);
        handle.send(ServerFrame::Assign(role));
        info!("Player seated");

        Self {
            role,
            reader,
            handle,
            writer,
        }
    }

    /// Role of this seat.
    pub fn role(&self) -> Role {
        self.role
    }
}

/// Drains queued frames onto the connection, then shuts the write side down.
async fn write_frames<S>(mut writer: WriteHalf<S>, mut frames: mpsc::UnboundedReceiver<ServerFrame>)
where
    S: AsyncWrite,
{
    while let Some(frame) = frames.recv().await {
        let line = format!("{}\n", frame);
        if let Err(err) = writer.write_all(line.as_bytes()).await {
            warn!(error = %err, %frame, "Write failed, dropping remaining frames");
            return;
        }
        if let Err(err) = writer.flush().await {
            warn!(error = %err, "Flush failed, dropping remaining frames");
            return;
        }
        debug!(%frame, "Frame sent");
    }

    if let Err(err) = writer.shutdown().await {
        debug!(error = %err, "Shutdown of write side failed");
    }
}

/// Reads frames for `role` until the peer leaves or the match terminates.
async fn read_frames<R>(reader: R, role: Role, coordinator: Arc<Coordinator>)
where
    R: AsyncRead + Unpin,
{
    let mut terminated = coordinator.subscribe();
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        tokio::select! {
            _ = terminated.wait_for(|done| *done) => {
                debug!("Match terminated, reader stopping");
                break;
            }
            read = reader.read_until(b'\n', &mut buf) => match read {
                Ok(0) => {
                    info!("Connection closed by peer");
                    coordinator.peer_disconnected(role);
                    break;
                }
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf);
                    coordinator.handle_frame(role, ClientFrame::parse(&line));
                }
                Err(err) => {
                    warn!(error = %err, "Read failed");
                    coordinator.peer_disconnected(role);
                    break;
                }
            }
        }
    }
}

/// Awaits a reader task; a reader that died abnormally counts as a disconnect.
async fn supervise(
    task: JoinHandle<()>,
    role: Role,
    coordinator: &Coordinator,
) -> Result<(), JoinError> {
    let result = task.await;
    if let Err(err) = &result {
        error!(%role, error = %err, "Reader task failed");
        coordinator.peer_disconnected(role);
    }
    result
}

/// Hosts one match between two seats until both readers have exited.
///
/// Both connections are closed on every return path: once the coordinator
/// and the seats' handles are dropped, each writer drains its queue and
/// shuts down, and the read halves are dropped with their tasks.
#[instrument(skip(first, second))]
pub async fn play_match<S>(
    match_id: u64,
    first: Seat<S>,
    second: Seat<S>,
    policy: RestartVotePolicy,
) -> Result<(), SessionError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let Seat {
        reader: first_reader,
        handle: first_handle,
        writer: first_writer,
        ..
    } = first;
    let Seat {
        reader: second_reader,
        handle: second_handle,
        writer: second_writer,
        ..
    } = second;

    let coordinator = Arc::new(Coordinator::new(policy, first_handle, second_handle)?);
    info!(%policy, "Match started");
    coordinator.open();

    let span = tracing::Span::current();
    let first_task = tokio::spawn(
        read_frames(first_reader, Role::First, Arc::clone(&coordinator))
            .instrument(info_span!(parent: &span, "reader", role = %Role::First)),
    );
    let second_task = tokio::spawn(
        read_frames(second_reader, Role::Second, Arc::clone(&coordinator))
            .instrument(info_span!(parent: &span, "reader", role = %Role::Second)),
    );

    let (first_read, second_read) = tokio::join!(
        supervise(first_task, Role::First, &coordinator),
        supervise(second_task, Role::Second, &coordinator),
    );

    let summary = coordinator.snapshot();
    drop(coordinator);

    let (first_write, second_write) = tokio::join!(first_writer, second_writer);
    info!(
        games = summary.games_finished(),
        last_outcome = ?summary.last_outcome(),
        "Match closed"
    );

    first_read?;
    second_read?;
    first_write?;
    second_write?;
    Ok(())
}

/// Accepts connections and hosts an unbounded sequence of matches.
#[derive(Debug)]
pub struct SessionListener {
    listener: TcpListener,
    config: ServerConfig,
    next_match_id: u64,
}

impl SessionListener {
    /// Binds the listening socket described by `config`.
    #[instrument(skip(config), fields(addr = %config.bind_addr()))]
    pub async fn bind(config: ServerConfig) -> Result<Self, SessionError> {
        let listener = TcpListener::bind(config.bind_addr()).await?;
        info!(addr = %listener.local_addr()?, "Listening for players");
        Ok(Self {
            listener,
            config,
            next_match_id: 1,
        })
    }

    /// Address actually bound (useful with port 0).
    pub fn local_addr(&self) -> Result<SocketAddr, SessionError> {
        Ok(self.listener.local_addr()?)
    }

    /// Pairs and hosts matches forever.
    ///
    /// Failures inside a match are logged and the loop moves on to the
    /// next pair.
    pub async fn run(mut self) {
        loop {
            let match_id = self.next_match_id;
            self.next_match_id += 1;

            let (first, second) = self.pair(match_id).await;
            let policy = *self.config.restart_votes();
            let game = async move {
                if let Err(err) = play_match(match_id, first, second, policy).await {
                    error!(match_id, error = %err, "Match ended with error");
                }
            };

            if *self.config.concurrent_matches() {
                tokio::spawn(game);
            } else {
                game.await;
                info!("Waiting for the next pair of players");
            }
        }
    }

    /// Seats the next two connections in arrival order.
    #[instrument(skip(self))]
    async fn pair(&self, match_id: u64) -> (Seat<TcpStream>, Seat<TcpStream>) {
        let first = Seat::open(self.accept().await, Role::First);
        let second = Seat::open(self.accept().await, Role::Second);
        (first, second)
    }

    async fn accept(&self) -> TcpStream {
        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    if let Err(err) = stream.set_nodelay(true) {
                        debug!(%peer, error = %err, "Could not disable Nagle");
                    }
                    info!(%peer, "Connection accepted");
                    return stream;
                }
                Err(err) => {
                    warn!(error = %err, "Accept failed, retrying");
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                }
            }
        }
    }
}
