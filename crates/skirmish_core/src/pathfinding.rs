//! Path previews over known terrain.
//!
//! A breadth-first search on the hex grid restricted to cells the team
//! knows to be walkable and that no unit currently holds. Neighbours are
//! expanded in the fixed [`hex::neighbors`] order, so the same state always
//! yields the same path on every peer.

use std::collections::{BTreeMap, VecDeque};

use crate::components::{Team, Unit};
use crate::hex::{self, Coord};
use crate::state::GameState;

/// Shortest known path from `start` to `goal` for `team`, including both
/// endpoints. `None` when the goal is unknown, blocked or unreachable.
#[must_use]
pub fn find_path(state: &GameState, team: Team, start: Coord, goal: Coord) -> Option<Vec<Coord>> {
    if !state.is_known_walkable(team, goal) {
        return None;
    }
    if start == goal {
        return Some(vec![start]);
    }

    let mut came_from: BTreeMap<Coord, Coord> = BTreeMap::new();
    let mut open = VecDeque::from([start]);

    while let Some(current) = open.pop_front() {
        if current == goal {
            return Some(reconstruct_path(&came_from, start, goal));
        }
        for next in hex::neighbors(current) {
            if next == start || came_from.contains_key(&next) {
                continue;
            }
            if !state.is_known_walkable(team, next) || state.units.is_occupied(next) {
                continue;
            }
            came_from.insert(next, current);
            open.push_back(next);
        }
    }

    tracing::trace!(%team, %start, %goal, "No known path");
    None
}

/// Walk `came_from` back from the goal.
fn reconstruct_path(came_from: &BTreeMap<Coord, Coord>, start: Coord, goal: Coord) -> Vec<Coord> {
    let mut path = vec![goal];
    let mut current = goal;
    while current != start {
        match came_from.get(&current) {
            Some(&prev) => {
                path.push(prev);
                current = prev;
            }
            None => break,
        }
    }
    path.reverse();
    path
}

/// Cell sequence for a `move_path` intent from `unit` to `target`, or
/// empty if there is none.
#[must_use]
pub fn preview_path(state: &GameState, unit: &Unit, target: Coord) -> Vec<Coord> {
    find_path(state, unit.team, unit.pos, target).unwrap_or_default()
}
