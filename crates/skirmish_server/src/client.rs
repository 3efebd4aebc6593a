//! Peer-side connection.
//!
//! A reader task decodes incoming lines into an unbounded inbox and a
//! writer task drains a bounded outbox. The game loop polls the inbox with
//! [`PeerConnection::try_recv`] once per frame and never blocks on the
//! socket.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::sync::mpsc::{self, error::TryRecvError, error::TrySendError};

use crate::error::{NetError, Result};
use crate::network::{read_frames, write_frames};
use crate::protocol::{self, Message};

/// Connection to the authority.
#[derive(Debug)]
pub struct PeerConnection {
    outbox: mpsc::Sender<String>,
    inbox: mpsc::UnboundedReceiver<Message>,
    connected: Arc<AtomicBool>,
}

impl PeerConnection {
    /// Connect and start the reader and writer tasks.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Io`] if the connection fails.
    pub async fn connect<A: ToSocketAddrs>(addr: A, queue_depth: usize) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        tracing::info!(peer = %stream.peer_addr()?, "Connected to authority");

        let (read, write) = stream.into_split();
        let (outbox, outbox_rx) = mpsc::channel(queue_depth.max(1));
        let (inbox_tx, inbox) = mpsc::unbounded_channel();
        let connected = Arc::new(AtomicBool::new(true));

        tokio::spawn(write_frames(write, outbox_rx));
        let flag = Arc::clone(&connected);
        tokio::spawn(async move {
            read_frames(read, |line| match protocol::decode_line(&line) {
                Ok(message) => inbox_tx.send(message).is_ok(),
                Err(e) => {
                    tracing::warn!(error = %e, "Malformed message from authority");
                    true
                }
            })
            .await;
            flag.store(false, Ordering::Release);
            tracing::info!("Authority connection closed");
        });

        Ok(Self {
            outbox,
            inbox,
            connected,
        })
    }

    /// Whether the reader still sees an open socket.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Queue a message, waiting for room.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::ConnectionClosed`] once the writer has stopped.
    pub async fn send(&self, message: &Message) -> Result<()> {
        let line = protocol::encode_line(message)?;
        self.outbox
            .send(line)
            .await
            .map_err(|_| NetError::ConnectionClosed)
    }

    /// Queue a message without waiting, for callers outside the runtime.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::ConnectionClosed`] once the writer has stopped
    /// and [`NetError::Refused`] when the outbox is full.
    pub fn try_send(&self, message: &Message) -> Result<()> {
        let line = protocol::encode_line(message)?;
        self.outbox.try_send(line).map_err(|e| match e {
            TrySendError::Closed(_) => NetError::ConnectionClosed,
            TrySendError::Full(_) => NetError::Refused("outbox full".into()),
        })
    }

    /// Next received message, if one is waiting.
    pub fn try_recv(&mut self) -> Option<Message> {
        match self.inbox.try_recv() {
            Ok(message) => Some(message),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    /// All messages received so far.
    pub fn drain(&mut self) -> Vec<Message> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }

    /// Wait for the next message. `None` once the connection is closed and
    /// the inbox is empty.
    pub async fn recv(&mut self) -> Option<Message> {
        self.inbox.recv().await
    }
}
