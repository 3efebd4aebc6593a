//! Tokio TCP transport for the authority.
//!
//! One event loop owns the [`Authority`]. Each connection gets a reader
//! task that forwards complete lines to the loop and a writer task that
//! drains a bounded queue onto the socket. Neither task touches the
//! authority directly.
//!
//! The loop never waits on a writer. A peer whose queue is full is
//! dropped and treated as disconnected.

use std::future::Future;
use std::net::SocketAddr;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::AbortHandle;

use skirmish_core::components::{PerTeam, Team};
use skirmish_core::config::MatchConfig;

use crate::error::Result;
use crate::lobby::{Authority, LobbyPhase, Outbound, Seat};
use crate::protocol::{self, Message};
use crate::ServerConfig;

/// Something a connection task reports to the event loop.
#[derive(Debug)]
enum Event {
    Line(Seat, String),
    Closed(Seat),
}

/// A seated peer's writer queue and reader task.
#[derive(Debug)]
struct Connection {
    seat: Seat,
    tx: mpsc::Sender<String>,
    reader: AbortHandle,
}

type Connections = PerTeam<Option<Connection>>;

/// Read newline-delimited frames until the stream ends.
///
/// Blank lines are skipped and lines that are not UTF-8 are logged and
/// dropped. `forward` returns `false` to stop reading.
pub(crate) async fn read_frames<R, F>(read: R, mut forward: F)
where
    R: AsyncRead + Unpin,
    F: FnMut(String) -> bool,
{
    let mut reader = BufReader::new(read);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => match std::str::from_utf8(&buf) {
                Ok(text) if text.trim().is_empty() => {}
                Ok(text) => {
                    if !forward(text.trim_end().to_string()) {
                        break;
                    }
                }
                Err(e) => tracing::warn!(error = %e, "Dropping non-UTF-8 frame"),
            },
            Err(e) => {
                tracing::debug!(error = %e, "Read failed");
                break;
            }
        }
    }
}

/// Write queued lines, each followed by a newline, until the queue closes
/// or the socket fails.
pub(crate) async fn write_frames<W>(mut write: W, mut queue: mpsc::Receiver<String>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(line) = queue.recv().await {
        let frame = format!("{line}\n");
        if let Err(e) = write.write_all(frame.as_bytes()).await {
            tracing::debug!(error = %e, "Write failed");
            break;
        }
    }
    let _ = write.shutdown().await;
}

/// The authority's TCP front end.
#[derive(Debug)]
pub struct AuthorityServer {
    listener: TcpListener,
    authority: Authority,
    queue_depth: usize,
}

impl AuthorityServer {
    /// Bind the listener. `config.host_team` overrides the match config's.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Io`](crate::NetError::Io) if binding fails.
    pub async fn bind(config: &ServerConfig, mut match_config: MatchConfig) -> Result<Self> {
        match_config.host_team = config.host_team;
        let listener = TcpListener::bind(config.bind).await?;
        tracing::info!(addr = %listener.local_addr()?, host_team = %config.host_team, "Authority listening");
        Ok(Self {
            listener,
            authority: Authority::new(match_config),
            queue_depth: config.queue_depth.max(1),
        })
    }

    /// Bound address.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Io`](crate::NetError::Io) if the socket has no
    /// local address.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Serve until `shutdown` resolves or the match ends.
    ///
    /// # Errors
    ///
    /// Currently infallible once bound; accept errors are logged.
    pub async fn run<S>(mut self, shutdown: S) -> Result<()>
    where
        S: Future<Output = ()>,
    {
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let mut conns: Connections = PerTeam::default();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                () = &mut shutdown => {
                    tracing::info!("Shutting down");
                    break;
                }
                accepted = self.listener.accept() => {
                    let (stream, addr) = match accepted {
                        Ok(pair) => pair,
                        Err(e) => {
                            tracing::warn!(error = %e, "Accept failed");
                            continue;
                        }
                    };
                    let (seat, out) = match self.authority.connect() {
                        Ok(seated) => seated,
                        Err(e) => {
                            tracing::warn!(%addr, error = %e, "Connection refused");
                            continue;
                        }
                    };
                    tracing::info!(%addr, team = %seat.team, seat = seat.id, "Peer connected");
                    let _ = stream.set_nodelay(true);
                    let (read, write) = stream.into_split();
                    let (tx, rx) = mpsc::channel(self.queue_depth);
                    tokio::spawn(write_frames(write, rx));
                    let events = events_tx.clone();
                    let reader = tokio::spawn(async move {
                        read_frames(read, |line| events.send(Event::Line(seat, line)).is_ok()).await;
                        let _ = events.send(Event::Closed(seat));
                    });
                    *conns.get_mut(seat.team) = Some(Connection {
                        seat,
                        tx,
                        reader: reader.abort_handle(),
                    });
                    deliver(&mut self.authority, &mut conns, out);
                }
                Some(event) = events_rx.recv() => {
                    let out = match event {
                        Event::Line(seat, _) if !self.authority.is_seated(seat) => Vec::new(),
                        Event::Line(seat, line) => match protocol::decode_line(&line) {
                            Ok(message) => self.authority.handle(seat.team, message),
                            Err(e) => {
                                tracing::warn!(team = %seat.team, error = %e, "Malformed message");
                                Vec::new()
                            }
                        },
                        Event::Closed(seat) => {
                            if conns.get(seat.team).as_ref().is_some_and(|c| c.seat == seat) {
                                *conns.get_mut(seat.team) = None;
                            }
                            self.authority.disconnect(seat)
                        }
                    };
                    deliver(&mut self.authority, &mut conns, out);
                }
            }
            if self.authority.phase() == LobbyPhase::Ended && conns.a.is_none() && conns.b.is_none() {
                tracing::info!("Both peers gone, match closed");
                break;
            }
        }
        Ok(())
    }
}

/// Send `out`, dropping every peer whose queue overflows and sending the
/// resulting disconnect notices in turn.
fn deliver(authority: &mut Authority, conns: &mut Connections, mut out: Vec<Outbound>) {
    while !out.is_empty() {
        let stalled = dispatch(conns, out);
        out = Vec::new();
        for team in stalled {
            if let Some(conn) = conns.get_mut(team).take() {
                tracing::warn!(%team, seat = conn.seat.id, "Outbound queue full, dropping peer");
                conn.reader.abort();
                out.extend(authority.disconnect(conn.seat));
            }
        }
    }
}

/// Queue each message without waiting. Returns the teams whose queue was
/// full.
fn dispatch(conns: &Connections, out: Vec<Outbound>) -> Vec<Team> {
    let mut stalled = Vec::new();
    for item in out {
        let (targets, message): (Vec<Team>, Message) = match item {
            Outbound::To(team, message) => (vec![team], message),
            Outbound::Broadcast(message) => (Team::ALL.to_vec(), message),
        };
        let line = match protocol::encode_line(&message) {
            Ok(line) => line,
            Err(e) => {
                tracing::error!(error = %e, message = message.type_name(), "Encode failed");
                continue;
            }
        };
        for team in targets {
            let Some(conn) = conns.get(team) else {
                continue;
            };
            match conn.tx.try_send(line.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    if !stalled.contains(&team) {
                        stalled.push(team);
                    }
                }
                Err(TrySendError::Closed(_)) => {
                    tracing::debug!(%team, "Writer gone, message dropped");
                }
            }
        }
        tracing::debug!(message = message.type_name(), "Sent");
    }
    stalled
}

#[cfg(test)]
mod tests {
    use super::*;
    use skirmish_core::config::MatchConfig;

    fn idle_reader() -> AbortHandle {
        tokio::spawn(std::future::pending::<()>()).abort_handle()
    }

    fn seated(lobby: &mut Authority, depth: usize) -> (Connection, mpsc::Receiver<String>) {
        let (seat, _) = lobby.connect().unwrap();
        let (tx, rx) = mpsc::channel(depth);
        let conn = Connection {
            seat,
            tx,
            reader: idle_reader(),
        };
        (conn, rx)
    }

    #[tokio::test]
    async fn test_full_queue_drops_only_that_peer() {
        let mut lobby = Authority::new(MatchConfig::default());
        let (a, mut rx_a) = seated(&mut lobby, 8);
        let (b, rx_b) = seated(&mut lobby, 1);
        b.tx.try_send("backlog".into()).unwrap();
        let mut conns = PerTeam::new(Some(a), Some(b));

        deliver(&mut lobby, &mut conns, vec![Outbound::Broadcast(Message::CancelTurn)]);

        assert!(conns.b.is_none());
        assert!(conns.a.is_some());
        assert_eq!(lobby.phase(), LobbyPhase::Ended);
        let first = protocol::decode_line(&rx_a.recv().await.unwrap()).unwrap();
        assert_eq!(first, Message::CancelTurn);
        let second = protocol::decode_line(&rx_a.recv().await.unwrap()).unwrap();
        assert_eq!(second, Message::Disconnect { team: Team::B });
        drop(rx_b);
    }

    #[tokio::test]
    async fn test_dispatch_does_not_wait_on_a_full_queue() {
        let mut lobby = Authority::new(MatchConfig::default());
        let (a, _rx_a) = seated(&mut lobby, 1);
        a.tx.try_send("backlog".into()).unwrap();
        let conns = PerTeam::new(Some(a), None);
        let stalled = dispatch(&conns, vec![Outbound::To(Team::A, Message::CancelTurn)]);
        assert_eq!(stalled, vec![Team::A]);
    }
}
