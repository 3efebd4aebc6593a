//! Match configuration shared by both peers.
//!
//! The authority sends a [`MatchConfig`] in its `start` message. Each peer
//! builds its initial [`GameState`] from it, so the config alone must
//! determine the starting state exactly.

use serde::{Deserialize, Serialize};

use crate::balance::BalanceTable;
use crate::components::Team;
use crate::error::{GameError, Result};
use crate::map::Map;
use crate::map_generation::MapGenConfig;
use crate::snapshot::StateSnapshot;
use crate::state::GameState;

/// Where the starting map comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MapSource {
    /// Generate a map from a seed.
    Random {
        /// Width in cells.
        width: i32,
        /// Height in cells.
        height: i32,
        /// Generation seed.
        seed: u64,
    },
    /// Start from a full state snapshot.
    Snapshot(Box<StateSnapshot>),
}

impl Default for MapSource {
    fn default() -> Self {
        let gen = MapGenConfig::default();
        Self::Random {
            width: gen.width,
            height: gen.height,
            seed: gen.seed,
        }
    }
}

/// Everything needed to start a match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchConfig {
    /// Starting map.
    #[serde(default)]
    pub map: MapSource,
    /// Team given to the first peer that connects.
    #[serde(default = "default_host_team")]
    pub host_team: Team,
    /// Unit roster and base parameters.
    #[serde(default)]
    pub balance: BalanceTable,
    /// Seed for local tie-breaking and AI spawning.
    #[serde(default)]
    pub seed: u64,
}

const fn default_host_team() -> Team {
    Team::A
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            map: MapSource::default(),
            host_team: default_host_team(),
            balance: BalanceTable::default(),
            seed: 0,
        }
    }
}

impl MatchConfig {
    /// Generated map of the given size.
    #[must_use]
    pub fn random(width: i32, height: i32, seed: u64) -> Self {
        Self {
            map: MapSource::Random { width, height, seed },
            host_team: Team::A,
            balance: BalanceTable::default(),
            seed,
        }
    }

    /// Build the starting state.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::InvalidState`] for non-positive or oversized
    /// map sizes and maps without room for a base, and snapshot errors for bad
    /// snapshots.
    pub fn initial_state(&self) -> Result<GameState> {
        match &self.map {
            MapSource::Random { width, height, seed } => {
                if *width <= 0 || *height <= 0 {
                    return Err(GameError::InvalidState(format!(
                        "map size must be positive, got {width}x{height}"
                    )));
                }
                if *width > Map::MAX_SIDE || *height > Map::MAX_SIDE {
                    return Err(GameError::InvalidState(format!(
                        "map size {width}x{height} exceeds {max}x{max}",
                        max = Map::MAX_SIDE
                    )));
                }
                let gen = MapGenConfig {
                    width: *width,
                    height: *height,
                    seed: *seed,
                };
                GameState::generated(gen, &self.balance)
            }
            MapSource::Snapshot(snapshot) => snapshot.restore(),
        }
    }

    /// Encode as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::InvalidState`] if encoding fails.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| GameError::InvalidState(e.to_string()))
    }

    /// Decode from JSON.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::SnapshotParse`] on malformed input.
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| GameError::SnapshotParse(e.to_string()))
    }
}
