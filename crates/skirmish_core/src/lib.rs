//! # Skirmish Core
//!
//! Deterministic simulation core for a two-team hex skirmish.
//!
//! This crate contains **only** deterministic logic:
//! - No rendering
//! - No network IO
//! - No system randomness (tie-breaks use a seeded generator or none)
//! - No floating-point math (hex lines use fixed-point)
//!
//! This separation enables:
//! - Lockstep multiplayer (identical resolution on both peers)
//! - Headless servers and AI-versus-AI runs
//! - Turn logs that replay bit for bit
//! - Determinism testing
//!
//! ## Crate Structure
//!
//! - [`hex`] - Offset/cube coordinates, distance, neighbours, lines
//! - [`map`] / [`map_generation`] - Terrain grid and seeded generation
//! - [`state`] / [`entities`] - Game state and unit storage
//! - [`visibility`] - Fog of war and explored memory
//! - [`decision`] - Scripted AI, human and lockstep intent sources
//! - [`combat`] / [`movement`] / [`spawn`] - Tick resolution phases
//! - [`simulation`] - The tick engine
//! - [`snapshot`] / [`replay`] - JSON snapshots and turn logs

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod action;
pub mod balance;
pub mod combat;
pub mod components;
pub mod config;
pub mod decision;
pub mod entities;
pub mod error;
pub mod hex;
pub mod map;
pub mod map_generation;
pub mod math;
pub mod movement;
pub mod pathfinding;
pub mod replay;
pub mod simulation;
pub mod snapshot;
pub mod spawn;
pub mod state;
pub mod tiebreak;
pub mod unit_kind;
pub mod visibility;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::action::{Action, Recruit, Target, TeamOrders, UnitCommand};
    pub use crate::balance::{BalanceTable, UnitStats};
    pub use crate::components::{Base, PerTeam, Team, Unit, UnitId};
    pub use crate::config::{MapSource, MatchConfig};
    pub use crate::decision::{DecisionSource, PlayerTurn, QueuedIntents, ScriptedPolicy, UnitPolicy};
    pub use crate::error::{GameError, Result};
    pub use crate::hex::Coord;
    pub use crate::map::{Map, Terrain};
    pub use crate::simulation::{EnginePhase, SharedEngine, SpawnMode, StepOutcome, TickEngine};
    pub use crate::snapshot::StateSnapshot;
    pub use crate::state::{GameState, MatchOutcome};
    pub use crate::tiebreak::TieBreak;
    pub use crate::unit_kind::UnitKind;
}
