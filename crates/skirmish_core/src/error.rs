//! Error types for the skirmish simulation.

use thiserror::Error;

use crate::components::UnitId;

/// Result type alias using [`GameError`].
pub type Result<T> = std::result::Result<T, GameError>;

/// Top-level error type for all simulation errors.
///
/// Invalid intents (out-of-range attacks, blocked moves, unaffordable
/// recruits) are never reported through this type; they degrade to no-ops
/// inside the tick pipeline.
#[derive(Debug, Error)]
pub enum GameError {
    /// Coordinate outside the map.
    #[error("Coordinate ({x}, {y}) is outside the map")]
    OutOfBounds {
        /// Column.
        x: i32,
        /// Row.
        y: i32,
    },

    /// Invalid unit identifier.
    #[error("Unit not found: {0}")]
    UnitNotFound(UnitId),

    /// Snapshot (JSON) could not be parsed.
    #[error("Failed to parse snapshot: {0}")]
    SnapshotParse(String),

    /// Unknown terrain tag in a map row.
    #[error("Unknown terrain tag '{tag}' at ({x}, {y})")]
    UnknownTerrain {
        /// The offending character.
        tag: char,
        /// Column.
        x: i32,
        /// Row.
        y: i32,
    },

    /// Balance data file parsing error.
    #[error("Failed to parse balance data: {0}")]
    BalanceParse(String),

    /// Replay could not be written, read or decoded.
    #[error("Replay error: {0}")]
    Replay(String),

    /// Invalid game state.
    #[error("Invalid game state: {0}")]
    InvalidState(String),

    /// Desync detected between two simulations.
    #[error("Desync detected at tick {tick}: local checksum {local}, remote checksum {remote}")]
    DesyncDetected {
        /// Tick where the checksums diverged.
        tick: u64,
        /// Local state checksum.
        local: String,
        /// Remote (or recorded) state checksum.
        remote: String,
    },
}
