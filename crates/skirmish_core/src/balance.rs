//! Data-driven balance table.
//!
//! Unit stats, recruit costs and base parameters. The built-in default is
//! the standard roster; a table can also be loaded from RON so both peers
//! of a match can agree on a custom balance through the start config.
//!
//! # Example RON
//!
//! ```ron
//! BalanceTable(
//!     base_hp: 500,
//!     build_points_per_turn: 6,
//!     units: {
//!         Scout: (cost: 2, stats: (hp: 35, atk: 7, armor: 2, rng: 2, spd: 3, vision: 5)),
//!     },
//! )
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{GameError, Result};
use crate::unit_kind::UnitKind;

/// Default base hit points.
pub const BASE_HP: i32 = 500;

/// Default build points granted to each base per tick.
pub const BASE_BUILD_POINTS: i32 = 6;

/// Combat and movement stats of one unit kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitStats {
    /// Starting hit points.
    pub hp: i32,
    /// Attack value.
    pub atk: i32,
    /// Flat damage reduction.
    pub armor: i32,
    /// Attack range in hex steps.
    pub rng: i32,
    /// Hex steps per tick.
    pub spd: i32,
    /// Vision radius.
    pub vision: i32,
}

/// Cost and stats of one unit kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitEntry {
    /// Build-point cost.
    pub cost: i32,
    /// Stats of a freshly spawned unit.
    pub stats: UnitStats,
}

/// Complete balance configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceTable {
    /// Starting hit points of each base.
    #[serde(default = "default_base_hp")]
    pub base_hp: i32,
    /// Build points granted per tick.
    #[serde(default = "default_build_points")]
    pub build_points_per_turn: i32,
    /// Per-kind entries. Kinds missing here cannot be recruited.
    pub units: BTreeMap<UnitKind, UnitEntry>,
}

const fn default_base_hp() -> i32 {
    BASE_HP
}

const fn default_build_points() -> i32 {
    BASE_BUILD_POINTS
}

impl Default for BalanceTable {
    fn default() -> Self {
        let mut units = BTreeMap::new();
        units.insert(
            UnitKind::Scout,
            UnitEntry {
                cost: 2,
                stats: UnitStats { hp: 35, atk: 7, armor: 2, rng: 2, spd: 3, vision: 5 },
            },
        );
        units.insert(
            UnitKind::Infantry,
            UnitEntry {
                cost: 3,
                stats: UnitStats { hp: 80, atk: 15, armor: 5, rng: 1, spd: 1, vision: 3 },
            },
        );
        units.insert(
            UnitKind::Archer,
            UnitEntry {
                cost: 3,
                stats: UnitStats { hp: 55, atk: 11, armor: 1, rng: 3, spd: 2, vision: 4 },
            },
        );
        Self {
            base_hp: BASE_HP,
            build_points_per_turn: BASE_BUILD_POINTS,
            units,
        }
    }
}

impl BalanceTable {
    /// The older three-kind roster (Infantry / Archer / Cavalry).
    #[must_use]
    pub fn classic() -> Self {
        let mut units = BTreeMap::new();
        units.insert(
            UnitKind::Infantry,
            UnitEntry {
                cost: 3,
                stats: UnitStats { hp: 60, atk: 12, armor: 4, rng: 1, spd: 1, vision: 6 },
            },
        );
        units.insert(
            UnitKind::Archer,
            UnitEntry {
                cost: 3,
                stats: UnitStats { hp: 45, atk: 9, armor: 2, rng: 3, spd: 1, vision: 8 },
            },
        );
        units.insert(
            UnitKind::Cavalry,
            UnitEntry {
                cost: 3,
                stats: UnitStats { hp: 50, atk: 14, armor: 3, rng: 1, spd: 2, vision: 7 },
            },
        );
        Self {
            base_hp: BASE_HP,
            build_points_per_turn: BASE_BUILD_POINTS,
            units,
        }
    }

    /// Parse a table from RON text.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::BalanceParse`] on malformed input or when an
    /// entry has a non-positive cost.
    pub fn from_ron(text: &str) -> Result<Self> {
        let table: Self =
            ron::from_str(text).map_err(|e| GameError::BalanceParse(e.to_string()))?;
        if let Some((kind, _)) = table.units.iter().find(|(_, e)| e.cost <= 0) {
            return Err(GameError::BalanceParse(format!(
                "{kind} must have a positive cost"
            )));
        }
        Ok(table)
    }

    /// Recruit cost of a kind, `None` if it is not in the roster.
    #[must_use]
    pub fn cost(&self, kind: UnitKind) -> Option<i32> {
        self.units.get(&kind).map(|e| e.cost)
    }

    /// Spawn stats of a kind. Kinds outside the roster fall back to the
    /// generic stats used when loading incomplete snapshots.
    #[must_use]
    pub fn stats(&self, kind: UnitKind) -> UnitStats {
        self.units
            .get(&kind)
            .map_or(FALLBACK_STATS, |e| e.stats)
    }

    /// Cheapest recruit cost, `None` for an empty roster.
    #[must_use]
    pub fn min_cost(&self) -> Option<i32> {
        self.units.values().map(|e| e.cost).min()
    }
}

/// Stats assumed for snapshot units with missing fields.
pub const FALLBACK_STATS: UnitStats = UnitStats {
    hp: 50,
    atk: 10,
    armor: 0,
    rng: 1,
    spd: 1,
    vision: 6,
};
