//! Authoritative game state.
//!
//! [`GameState`] is owned by the [`TickEngine`](crate::simulation::TickEngine)
//! and only mutated from inside a tick. Readers get clones or snapshots.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::action::Target;
use crate::balance::BalanceTable;
use crate::components::{Base, PerTeam, Team, Unit, UnitId};
use crate::entities::EntityStore;
use crate::error::{GameError, Result};
use crate::hex::Coord;
use crate::map::Map;
use crate::map_generation::{self, MapGenConfig};
use crate::unit_kind::UnitKind;

/// Result of a finished or running match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchOutcome {
    /// Both bases stand.
    Undecided,
    /// Only this team's base stands.
    Winner(Team),
    /// Both bases fell on the same tick.
    Draw,
}

/// Complete simulation state of one match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameState {
    /// Terrain.
    pub map: Map,
    /// One base per team.
    pub bases: PerTeam<Base>,
    /// Live units and their occupancy index.
    pub units: EntityStore,
    /// Last known enemy base position per team. Never cleared once set.
    pub known_enemy_base: PerTeam<Option<Coord>>,
    /// Fog-of-war memory per team. Only ever grows.
    pub explored: PerTeam<BTreeSet<Coord>>,
    /// Cells visible this tick. Derived every tick, never persisted.
    #[serde(skip)]
    pub visible: PerTeam<BTreeSet<Coord>>,
    /// Completed ticks.
    pub tick: u64,
}

impl GameState {
    /// Create a state with no units.
    #[must_use]
    pub fn new(map: Map, base_a: Base, base_b: Base) -> Self {
        Self {
            map,
            bases: PerTeam::new(base_a, base_b),
            units: EntityStore::new(),
            known_enemy_base: PerTeam::default(),
            explored: PerTeam::default(),
            visible: PerTeam::default(),
            tick: 0,
        }
    }

    /// Generate a map and place both bases on it.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::InvalidState`] if the generated map has no
    /// open cell for a base.
    pub fn generated(config: MapGenConfig, balance: &BalanceTable) -> Result<Self> {
        let map = map_generation::generate(config);
        Self::with_placed_bases(map, balance)
    }

    /// Place both bases on an existing map using the standard corners.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::InvalidState`] if the map has no plain cell.
    pub fn with_placed_bases(map: Map, balance: &BalanceTable) -> Result<Self> {
        let (a, b) = map_generation::place_bases(&map)
            .ok_or_else(|| GameError::InvalidState("no open cell for a base".to_string()))?;
        let base_a = Base::new(Team::A, a, balance.base_hp, balance.build_points_per_turn);
        let base_b = Base::new(Team::B, b, balance.base_hp, balance.build_points_per_turn);
        Ok(Self::new(map, base_a, base_b))
    }

    /// A team's base.
    #[must_use]
    pub const fn base(&self, team: Team) -> &Base {
        self.bases.get(team)
    }

    /// A team's base, mutably.
    pub fn base_mut(&mut self, team: Team) -> &mut Base {
        self.bases.get_mut(team)
    }

    /// Team whose base stands on `pos`.
    #[must_use]
    pub fn base_at(&self, pos: Coord) -> Option<Team> {
        Team::ALL.into_iter().find(|t| self.base(*t).pos == pos)
    }

    /// Base cells are always treated as occupied.
    #[must_use]
    pub fn is_base_cell(&self, pos: Coord) -> bool {
        self.base_at(pos).is_some()
    }

    /// Walkable, on the map, and neither a unit nor a base stands there.
    #[must_use]
    pub fn is_free(&self, pos: Coord) -> bool {
        self.map.can_walk(pos) && !self.units.is_occupied(pos) && !self.is_base_cell(pos)
    }

    /// Whether `team` knows it may walk onto `pos`: plain, not a base, and
    /// either visible now or explored before.
    #[must_use]
    pub fn is_known_walkable(&self, team: Team, pos: Coord) -> bool {
        self.map.can_walk(pos)
            && !self.is_base_cell(pos)
            && (self.visible.get(team).contains(&pos) || self.explored.get(team).contains(&pos))
    }

    /// Spawn a unit of `kind` with balance stats. Does not validate the cell.
    pub fn spawn_unit(
        &mut self,
        team: Team,
        kind: UnitKind,
        pos: Coord,
        balance: &BalanceTable,
    ) -> UnitId {
        let id = self.units.allocate_id();
        let unit = Unit::from_stats(id, team, kind, pos, balance.stats(kind));
        tracing::trace!(unit_id = id, %team, %kind, %pos, "Spawned unit");
        self.units.insert(unit)
    }

    /// Position of an attack target if it is still alive.
    #[must_use]
    pub fn target_pos(&self, target: Target) -> Option<Coord> {
        match target {
            Target::Unit(id) => self.units.get(id).filter(|u| !u.is_dead()).map(|u| u.pos),
            Target::Base(team) => {
                let base = self.base(team);
                base.is_alive().then_some(base.pos)
            }
        }
    }

    /// Team owning an attack target.
    #[must_use]
    pub fn target_team(&self, target: Target) -> Option<Team> {
        match target {
            Target::Unit(id) => self.units.get(id).map(|u| u.team),
            Target::Base(team) => Some(team),
        }
    }

    /// Damage `attacker` deals to `target` in one hit: `max(0, atk - armor)`.
    /// Bases have no armor; missing targets take nothing.
    #[must_use]
    pub fn damage_value(&self, attacker: &Unit, target: Target) -> i32 {
        let armor = match target {
            Target::Unit(id) => match self.units.get(id) {
                Some(u) => u.armor,
                None => return 0,
            },
            Target::Base(_) => 0,
        };
        (attacker.atk - armor).max(0)
    }

    /// Remember where the enemy base of `team` was seen.
    pub fn record_enemy_base(&mut self, team: Team, pos: Coord) {
        let known = self.known_enemy_base.get_mut(team);
        if known.is_none() {
            tracing::debug!(tick = self.tick, %team, %pos, "Enemy base discovered");
        }
        *known = Some(pos);
    }

    /// Merge cells into a team's fog-of-war memory.
    pub fn record_explored<I>(&mut self, team: Team, cells: I)
    where
        I: IntoIterator<Item = Coord>,
    {
        self.explored.get_mut(team).extend(cells);
    }

    /// Cells a team sees this tick.
    #[must_use]
    pub const fn visible(&self, team: Team) -> &BTreeSet<Coord> {
        self.visible.get(team)
    }

    /// Both bases still stand.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.bases.a.is_alive() && self.bases.b.is_alive()
    }

    /// Current match outcome.
    #[must_use]
    pub const fn winner(&self) -> MatchOutcome {
        match (self.bases.a.is_alive(), self.bases.b.is_alive()) {
            (true, true) => MatchOutcome::Undecided,
            (true, false) => MatchOutcome::Winner(Team::A),
            (false, true) => MatchOutcome::Winner(Team::B),
            (false, false) => MatchOutcome::Draw,
        }
    }

    /// Checksum of the canonical snapshot: lowercase hex blake3.
    ///
    /// Equal across processes for equal states; used to detect desyncs.
    #[must_use]
    pub fn checksum(&self) -> String {
        let bytes = crate::snapshot::canonical_bytes(self);
        blake3::hash(&bytes).to_hex().to_string()
    }

    /// Encode to bincode for replays.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::InvalidState`] if encoding fails.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| GameError::InvalidState(e.to_string()))
    }

    /// Decode from bincode. Visible sets start empty.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::InvalidState`] on malformed bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes).map_err(|e| GameError::InvalidState(e.to_string()))
    }
}
