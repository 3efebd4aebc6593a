//! Unit storage with an occupancy index.
//!
//! Units are kept in insertion order. Game semantics never depend on that
//! order, but deterministic iteration, snapshots and checksums do, so it
//! must be stable.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::components::{Team, Unit, UnitId};
use crate::hex::Coord;

/// Owns every live [`Unit`] and the set of cells they occupy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityStore {
    units: Vec<Unit>,
    occupied: BTreeSet<Coord>,
    next_id: UnitId,
}

impl Default for EntityStore {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityStore {
    /// Create an empty store. Ids start at 1.
    #[must_use]
    pub fn new() -> Self {
        Self {
            units: Vec::new(),
            occupied: BTreeSet::new(),
            next_id: 1,
        }
    }

    /// Reserve the next stable id. The allocator saturates at
    /// `UnitId::MAX`.
    pub fn allocate_id(&mut self) -> UnitId {
        let id = self.next_id;
        self.next_id = self.next_id.saturating_add(1);
        id
    }

    /// The id the next allocation will return.
    #[must_use]
    pub const fn next_id(&self) -> UnitId {
        self.next_id
    }

    /// Insert a unit and mark its cell occupied.
    ///
    /// Ids of units loaded from snapshots are honored; the allocator is
    /// bumped past them so ids are never reused.
    pub fn insert(&mut self, unit: Unit) -> UnitId {
        let id = unit.id;
        if id >= self.next_id {
            self.next_id = id.saturating_add(1);
        }
        self.occupied.insert(unit.pos);
        self.units.push(unit);
        id
    }

    /// Remove a unit by id.
    pub fn remove(&mut self, id: UnitId) -> Option<Unit> {
        let index = self.units.iter().position(|u| u.id == id)?;
        let unit = self.units.remove(index);
        self.rebuild_occupancy();
        Some(unit)
    }

    /// Remove every unit with hit points at or below zero.
    /// Returns the removed ids in storage order.
    pub fn remove_dead(&mut self) -> Vec<UnitId> {
        let dead: Vec<UnitId> = self
            .units
            .iter()
            .filter(|u| u.is_dead())
            .map(|u| u.id)
            .collect();
        if !dead.is_empty() {
            self.units.retain(|u| !u.is_dead());
            self.rebuild_occupancy();
        }
        dead
    }

    /// Get a unit by id.
    #[must_use]
    pub fn get(&self, id: UnitId) -> Option<&Unit> {
        self.units.iter().find(|u| u.id == id)
    }

    /// Get a mutable unit by id.
    pub fn get_mut(&mut self, id: UnitId) -> Option<&mut Unit> {
        self.units.iter_mut().find(|u| u.id == id)
    }

    /// The unit standing on a cell, if any.
    #[must_use]
    pub fn at(&self, pos: Coord) -> Option<&Unit> {
        self.units.iter().find(|u| u.pos == pos)
    }

    /// Check if a unit exists.
    #[must_use]
    pub fn contains(&self, id: UnitId) -> bool {
        self.get(id).is_some()
    }

    /// Number of live units.
    #[must_use]
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Check if the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Iterate units in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Unit> {
        self.units.iter()
    }

    /// Iterate units mutably in insertion order.
    ///
    /// Callers that move units must call [`rebuild_occupancy`](Self::rebuild_occupancy).
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Unit> {
        self.units.iter_mut()
    }

    /// Units of one team in insertion order.
    pub fn of_team(&self, team: Team) -> impl Iterator<Item = &Unit> {
        self.units.iter().filter(move |u| u.team == team)
    }

    /// Cells held by live units.
    #[must_use]
    pub const fn occupied(&self) -> &BTreeSet<Coord> {
        &self.occupied
    }

    /// Whether a live unit stands on `pos`.
    #[must_use]
    pub fn is_occupied(&self, pos: Coord) -> bool {
        self.occupied.contains(&pos)
    }

    /// Recompute the occupancy index from unit positions.
    pub fn rebuild_occupancy(&mut self) {
        self.occupied = self.units.iter().map(|u| u.pos).collect();
    }
}
