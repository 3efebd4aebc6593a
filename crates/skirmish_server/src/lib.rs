//! # Skirmish Lockstep Server
//!
//! Lockstep synchronization for two-peer matches.
//!
//! The authority relays turns and never simulates. Each peer runs its own
//! [`TickEngine`](skirmish_core::simulation::TickEngine) and applies both
//! teams' orders once the authority releases them.
//!
//! - [`protocol`] - Newline-delimited JSON messages
//! - [`lobby`] - Authority state machine (seats, turn relay, checksums)
//! - [`network`] - Tokio TCP transport for the authority
//! - [`client`] - Peer-side connection with a non-blocking inbox
//! - [`peer`] - Peer state machine driving the local engine

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

use std::net::SocketAddr;

use skirmish_core::components::Team;

pub mod client;
pub mod error;
pub mod lobby;
pub mod network;
pub mod peer;
pub mod protocol;

pub use error::{NetError, Result};

/// Default listen port.
pub const DEFAULT_PORT: u16 = 5000;

/// Server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address to listen on.
    pub bind: SocketAddr,
    /// Team given to the first peer.
    pub host_team: Team,
    /// Outbound messages buffered per connection.
    pub queue_depth: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            host_team: Team::A,
            queue_depth: 64,
        }
    }
}

impl ServerConfig {
    /// Defaults overridden by `SKIRMISH_BIND` and `SKIRMISH_HOST_TEAM`.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Config`] for an unparsable address or a team
    /// other than `A` or `B`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(bind) = lookup("SKIRMISH_BIND") {
            config.bind = bind
                .parse()
                .map_err(|e| NetError::Config(format!("SKIRMISH_BIND={bind}: {e}")))?;
        }
        if let Some(team) = lookup("SKIRMISH_HOST_TEAM") {
            config.host_team = match team.trim() {
                "A" | "a" => Team::A,
                "B" | "b" => Team::B,
                other => {
                    return Err(NetError::Config(format!(
                        "SKIRMISH_HOST_TEAM must be A or B, got {other}"
                    )))
                }
            };
        }
        Ok(config)
    }
}
