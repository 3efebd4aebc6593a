//! Entity records: teams, units and bases.
//!
//! Components are plain data. All behavior lives in the resolver modules
//! that the [`TickEngine`](crate::simulation::TickEngine) runs each tick.

use serde::{Deserialize, Serialize};

use crate::balance::UnitStats;
use crate::hex::Coord;
use crate::unit_kind::UnitKind;

/// Stable unit identifier.
///
/// Assigned once at creation from a monotonically increasing counter and
/// never reused, so both peers of a lockstep match agree on it.
pub type UnitId = u32;

/// One of the two factions.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum Team {
    /// Team A (top-left base on generated maps).
    A,
    /// Team B (bottom-right base on generated maps).
    B,
}

impl Team {
    /// Both teams in resolution order.
    pub const ALL: [Self; 2] = [Self::A, Self::B];

    /// The opposing team.
    #[must_use]
    pub const fn opponent(self) -> Self {
        match self {
            Self::A => Self::B,
            Self::B => Self::A,
        }
    }

    /// Index into per-team arrays.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::A => 0,
            Self::B => 1,
        }
    }

    /// Single-letter tag used on the wire.
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
        }
    }
}

impl std::fmt::Display for Team {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

/// A value held once per team.
///
/// Serializes as `{"A": .., "B": ..}`, the shape used by snapshots and the
/// wire protocol.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerTeam<T> {
    /// Team A's value.
    #[serde(rename = "A")]
    pub a: T,
    /// Team B's value.
    #[serde(rename = "B")]
    pub b: T,
}

impl<T> PerTeam<T> {
    /// Build from two values.
    pub const fn new(a: T, b: T) -> Self {
        Self { a, b }
    }

    /// Borrow one team's value.
    pub const fn get(&self, team: Team) -> &T {
        match team {
            Team::A => &self.a,
            Team::B => &self.b,
        }
    }

    /// Mutably borrow one team's value.
    pub fn get_mut(&mut self, team: Team) -> &mut T {
        match team {
            Team::A => &mut self.a,
            Team::B => &mut self.b,
        }
    }
}

/// A mobile combat unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    /// Stable identifier.
    pub id: UnitId,
    /// Owning team.
    pub team: Team,
    /// Unit kind.
    pub kind: UnitKind,
    /// Current cell.
    pub pos: Coord,
    /// Attack value.
    pub atk: i32,
    /// Attack range in hex steps.
    pub rng: i32,
    /// Maximum hex steps per tick.
    pub spd: i32,
    /// Remaining hit points.
    pub hp: i32,
    /// Flat damage reduction.
    pub armor: i32,
    /// Vision radius in hex steps.
    pub vision: i32,
}

impl Unit {
    /// Create a unit from balance stats.
    #[must_use]
    pub const fn from_stats(id: UnitId, team: Team, kind: UnitKind, pos: Coord, stats: UnitStats) -> Self {
        Self {
            id,
            team,
            kind,
            pos,
            atk: stats.atk,
            rng: stats.rng,
            spd: stats.spd,
            hp: stats.hp,
            armor: stats.armor,
            vision: stats.vision,
        }
    }

    /// Hit points at or below zero.
    #[must_use]
    pub const fn is_dead(&self) -> bool {
        self.hp <= 0
    }
}

/// A team's production base. Exactly one per team.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Base {
    /// Owning team.
    pub team: Team,
    /// Cell occupied by the base.
    pub pos: Coord,
    /// Remaining hit points.
    pub hp: i32,
    /// Build points granted each tick.
    pub build_points_per_turn: i32,
    /// Extra build points granted each tick.
    pub build_point_bonus: i32,
    /// Ticks remaining until the next cooldown-driven spawn.
    pub spawn_cooldown: i32,
}

impl Base {
    /// Create a base with full budget and no cooldown.
    #[must_use]
    pub const fn new(team: Team, pos: Coord, hp: i32, build_points_per_turn: i32) -> Self {
        Self {
            team,
            pos,
            hp,
            build_points_per_turn,
            build_point_bonus: 0,
            spawn_cooldown: 0,
        }
    }

    /// Budget available for one tick.
    #[must_use]
    pub const fn budget(&self) -> i32 {
        self.build_points_per_turn + self.build_point_bonus
    }

    /// Hit points above zero.
    #[must_use]
    pub const fn is_alive(&self) -> bool {
        self.hp > 0
    }
}
