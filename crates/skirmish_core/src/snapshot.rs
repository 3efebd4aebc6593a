//! JSON state snapshots.
//!
//! Format:
//!
//! ```json
//! {
//!   "tick": 12,
//!   "map": {"width": 40, "height": 20, "grid": [[".", "#", "~"], ...]},
//!   "bases": [{"team": "A", "x": 1, "y": 1, "hp": 500,
//!              "build_points_per_turn": 6, "build_point_bonus": 0}, ...],
//!   "units": [{"id": 1, "team": "A", "kind": "Scout", "x": 2, "y": 2,
//!              "atk": 7, "rng": 2, "spd": 3, "hp": 35, "armor": 2, "vision": 5}, ...],
//!   "known_enemy_base": {"A": [38, 18], "B": null},
//!   "explored": {"A": [[0, 0], ...], "B": [...]}
//! }
//! ```
//!
//! Missing fields fall back to defaults so hand-written and older
//! snapshots still load. The same encoding, serialized without whitespace,
//! is the canonical byte form hashed by [`GameState::checksum`].

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::balance::{BASE_BUILD_POINTS, BASE_HP, FALLBACK_STATS};
use crate::components::{Base, PerTeam, Team, Unit, UnitId};
use crate::entities::EntityStore;
use crate::error::{GameError, Result};
use crate::hex::Coord;
use crate::map::Map;
use crate::state::GameState;
use crate::unit_kind::UnitKind;

/// Width of maps in snapshots that omit it.
const DEFAULT_WIDTH: i32 = 40;
/// Height of maps in snapshots that omit it.
const DEFAULT_HEIGHT: i32 = 20;

/// Serializable mirror of [`GameState`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSnapshot {
    /// Completed ticks.
    #[serde(default)]
    pub tick: u64,
    /// Terrain.
    #[serde(default)]
    pub map: MapSnapshot,
    /// Bases, team A first.
    #[serde(default)]
    pub bases: Vec<BaseSnapshot>,
    /// Units in storage order.
    #[serde(default)]
    pub units: Vec<UnitSnapshot>,
    /// Enemy base sightings per team.
    #[serde(default)]
    pub known_enemy_base: PerTeam<Option<[i32; 2]>>,
    /// Explored cells per team, sorted.
    #[serde(default)]
    pub explored: PerTeam<Vec<[i32; 2]>>,
}

/// Map section of a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapSnapshot {
    /// Width in cells.
    #[serde(default = "default_width")]
    pub width: i32,
    /// Height in cells.
    #[serde(default = "default_height")]
    pub height: i32,
    /// Rows of single-character terrain tags. Empty means all plain.
    #[serde(default)]
    pub grid: Vec<Vec<char>>,
}

impl Default for MapSnapshot {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            grid: Vec::new(),
        }
    }
}

const fn default_width() -> i32 {
    DEFAULT_WIDTH
}

const fn default_height() -> i32 {
    DEFAULT_HEIGHT
}

/// One base.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseSnapshot {
    /// Owner.
    pub team: Team,
    /// Column, defaulted per team when missing.
    #[serde(default)]
    pub x: Option<i32>,
    /// Row, defaulted per team when missing.
    #[serde(default)]
    pub y: Option<i32>,
    /// Hit points.
    #[serde(default = "default_base_hp")]
    pub hp: i32,
    /// Build points per tick.
    #[serde(default = "default_build_points")]
    pub build_points_per_turn: i32,
    /// Extra build points per tick.
    #[serde(default)]
    pub build_point_bonus: i32,
    /// Cooldown counter of the cooldown spawn variant.
    #[serde(default)]
    pub spawn_cooldown: i32,
}

const fn default_base_hp() -> i32 {
    BASE_HP
}

const fn default_build_points() -> i32 {
    BASE_BUILD_POINTS
}

/// One unit. Stats missing from hand-written snapshots use generic values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitSnapshot {
    /// Stable id. Units without one get fresh ids on load.
    #[serde(default)]
    pub id: Option<UnitId>,
    /// Owner.
    #[serde(default = "default_team")]
    pub team: Team,
    /// Kind.
    #[serde(default = "default_kind")]
    pub kind: UnitKind,
    /// Column.
    #[serde(default)]
    pub x: i32,
    /// Row.
    #[serde(default)]
    pub y: i32,
    /// Attack.
    #[serde(default = "fallback_atk")]
    pub atk: i32,
    /// Range.
    #[serde(default = "fallback_rng")]
    pub rng: i32,
    /// Speed.
    #[serde(default = "fallback_spd")]
    pub spd: i32,
    /// Hit points.
    #[serde(default = "fallback_hp")]
    pub hp: i32,
    /// Armor.
    #[serde(default = "fallback_armor")]
    pub armor: i32,
    /// Vision radius.
    #[serde(default = "fallback_vision")]
    pub vision: i32,
}

const fn default_team() -> Team {
    Team::A
}

const fn default_kind() -> UnitKind {
    UnitKind::Infantry
}

const fn fallback_atk() -> i32 {
    FALLBACK_STATS.atk
}

const fn fallback_rng() -> i32 {
    FALLBACK_STATS.rng
}

const fn fallback_spd() -> i32 {
    FALLBACK_STATS.spd
}

const fn fallback_hp() -> i32 {
    FALLBACK_STATS.hp
}

const fn fallback_armor() -> i32 {
    FALLBACK_STATS.armor
}

const fn fallback_vision() -> i32 {
    FALLBACK_STATS.vision
}

const fn cell(c: Coord) -> [i32; 2] {
    [c.x, c.y]
}

const fn coord(c: [i32; 2]) -> Coord {
    Coord::new(c[0], c[1])
}

impl StateSnapshot {
    /// Capture a state.
    #[must_use]
    pub fn capture(state: &GameState) -> Self {
        let grid = state
            .map
            .rows()
            .into_iter()
            .map(|row| row.chars().collect())
            .collect();
        let bases = Team::ALL
            .into_iter()
            .map(|t| {
                let b = state.base(t);
                BaseSnapshot {
                    team: b.team,
                    x: Some(b.pos.x),
                    y: Some(b.pos.y),
                    hp: b.hp,
                    build_points_per_turn: b.build_points_per_turn,
                    build_point_bonus: b.build_point_bonus,
                    spawn_cooldown: b.spawn_cooldown,
                }
            })
            .collect();
        let units = state
            .units
            .iter()
            .map(|u| UnitSnapshot {
                id: Some(u.id),
                team: u.team,
                kind: u.kind,
                x: u.pos.x,
                y: u.pos.y,
                atk: u.atk,
                rng: u.rng,
                spd: u.spd,
                hp: u.hp,
                armor: u.armor,
                vision: u.vision,
            })
            .collect();
        let explored = |t: Team| -> Vec<[i32; 2]> {
            state.explored.get(t).iter().copied().map(cell).collect()
        };

        Self {
            tick: state.tick,
            map: MapSnapshot {
                width: state.map.width(),
                height: state.map.height(),
                grid,
            },
            bases,
            units,
            known_enemy_base: PerTeam::new(
                state.known_enemy_base.a.map(cell),
                state.known_enemy_base.b.map(cell),
            ),
            explored: PerTeam::new(explored(Team::A), explored(Team::B)),
        }
    }

    /// Rebuild a state.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::SnapshotParse`] for inconsistent dimensions,
    /// misplaced bases or units, and duplicate or exhausted unit ids, and
    /// [`GameError::UnknownTerrain`] for bad cell tags.
    pub fn restore(&self) -> Result<GameState> {
        let MapSnapshot { width, height, ref grid } = self.map;
        if width <= 0 || height <= 0 {
            return Err(GameError::SnapshotParse(format!(
                "map dimensions must be positive, got {width}x{height}"
            )));
        }
        if width > Map::MAX_SIDE || height > Map::MAX_SIDE {
            return Err(GameError::SnapshotParse(format!(
                "map dimensions {width}x{height} exceed {max}x{max}",
                max = Map::MAX_SIDE
            )));
        }
        let map = if grid.is_empty() {
            Map::new(width, height)
        } else {
            let rows: Vec<String> = grid.iter().map(|r| r.iter().collect()).collect();
            let map = Map::from_rows(&rows)?;
            if map.width() != width || map.height() != height {
                return Err(GameError::SnapshotParse(format!(
                    "grid is {}x{}, header says {width}x{height}",
                    map.width(),
                    map.height()
                )));
            }
            map
        };

        let default_pos = |team: Team| match team {
            Team::A => Coord::new(1, 1),
            Team::B => Coord::new(width - 2, height - 2),
        };
        let base = |team: Team| -> Base {
            let fallback = default_pos(team);
            self.bases.iter().find(|b| b.team == team).map_or_else(
                || Base::new(team, fallback, BASE_HP, BASE_BUILD_POINTS),
                |b| Base {
                    team,
                    pos: Coord::new(b.x.unwrap_or(fallback.x), b.y.unwrap_or(fallback.y)),
                    hp: b.hp,
                    build_points_per_turn: b.build_points_per_turn,
                    build_point_bonus: b.build_point_bonus,
                    spawn_cooldown: b.spawn_cooldown,
                },
            )
        };

        let mut state = GameState::new(map, base(Team::A), base(Team::B));
        state.tick = self.tick;
        self.validate_placement(&state)?;

        let mut units = EntityStore::new();
        for u in self.units.iter().filter(|u| u.id.is_some()) {
            units.insert(Self::unit(u, u.id.unwrap_or_default()));
        }
        for u in self.units.iter().filter(|u| u.id.is_none()) {
            let id = units.allocate_id();
            units.insert(Self::unit(u, id));
        }
        state.units = units;

        state.known_enemy_base = PerTeam::new(
            self.known_enemy_base.a.map(coord),
            self.known_enemy_base.b.map(coord),
        );
        state.explored = PerTeam::new(
            self.explored.a.iter().copied().map(coord).collect::<BTreeSet<_>>(),
            self.explored.b.iter().copied().map(coord).collect::<BTreeSet<_>>(),
        );
        Ok(state)
    }

    /// Reject bases off the map and units that would break the
    /// one-unit-per-cell invariant or the id allocator.
    fn validate_placement(&self, state: &GameState) -> Result<()> {
        let reject = |msg: String| Err(GameError::SnapshotParse(msg));
        let (a, b) = (state.base(Team::A).pos, state.base(Team::B).pos);
        for (team, pos) in [(Team::A, a), (Team::B, b)] {
            if !state.map.in_bounds(pos) {
                return reject(format!("base {team} at {pos} is outside the map"));
            }
        }
        if a == b {
            return reject(format!("both bases stand on {a}"));
        }

        let mut ids = BTreeSet::new();
        let mut cells = BTreeSet::new();
        for u in &self.units {
            let pos = Coord::new(u.x, u.y);
            if !state.map.in_bounds(pos) {
                return reject(format!("unit at {pos} is outside the map"));
            }
            if !state.map.can_walk(pos) {
                return reject(format!("unit at {pos} stands on impassable terrain"));
            }
            if state.is_base_cell(pos) {
                return reject(format!("unit at {pos} stands on a base"));
            }
            if !cells.insert(pos) {
                return reject(format!("two units stand on {pos}"));
            }
            if let Some(id) = u.id {
                if id.checked_add(1).is_none() {
                    return reject(format!("unit id {id} leaves no room for new ids"));
                }
                if !ids.insert(id) {
                    return reject(format!("unit id {id} is used twice"));
                }
            }
        }
        Ok(())
    }

    const fn unit(u: &UnitSnapshot, id: UnitId) -> Unit {
        Unit {
            id,
            team: u.team,
            kind: u.kind,
            pos: Coord::new(u.x, u.y),
            atk: u.atk,
            rng: u.rng,
            spd: u.spd,
            hp: u.hp,
            armor: u.armor,
            vision: u.vision,
        }
    }
}

/// Serialize a state to pretty JSON.
///
/// # Errors
///
/// Returns [`GameError::SnapshotParse`] if encoding fails.
pub fn to_json(state: &GameState) -> Result<String> {
    serde_json::to_string_pretty(&StateSnapshot::capture(state))
        .map_err(|e| GameError::SnapshotParse(e.to_string()))
}

/// Parse a state from JSON.
///
/// # Errors
///
/// Returns [`GameError::SnapshotParse`] on malformed JSON, otherwise
/// whatever [`StateSnapshot::restore`] reports.
pub fn from_json(text: &str) -> Result<GameState> {
    let snapshot: StateSnapshot =
        serde_json::from_str(text).map_err(|e| GameError::SnapshotParse(e.to_string()))?;
    snapshot.restore()
}

/// Compact JSON bytes of the snapshot, the input of the state checksum.
#[must_use]
pub fn canonical_bytes(state: &GameState) -> Vec<u8> {
    // Plain data with string keys; encoding cannot fail.
    serde_json::to_vec(&StateSnapshot::capture(state)).unwrap_or_default()
}
