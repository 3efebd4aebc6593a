//! Error types for the lockstep network layer.

use thiserror::Error;

use skirmish_core::error::GameError;

/// Result type alias using [`NetError`].
pub type Result<T> = std::result::Result<T, NetError>;

/// Network and protocol errors.
#[derive(Debug, Error)]
pub enum NetError {
    /// Socket I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A line was not a valid protocol message.
    #[error("Malformed message: {0}")]
    Decode(#[from] serde_json::Error),

    /// The other side closed the connection.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Both seats are taken or the match is over.
    #[error("Connection refused: {0}")]
    Refused(String),

    /// A message arrived in a phase that cannot accept it.
    #[error("Unexpected message '{message}' in phase {phase}")]
    UnexpectedMessage {
        /// Message type tag.
        message: &'static str,
        /// Current phase name.
        phase: String,
    },

    /// Bad server configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Simulation error.
    #[error(transparent)]
    Game(#[from] GameError),
}
