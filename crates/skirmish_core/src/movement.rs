//! Simultaneous movement arbitration.
//!
//! Movement runs in micro-steps. In step `k` every mover with speed above
//! `k` proposes one neighbouring cell; contested cells go to a single
//! winner picked by [`priority`]; winners move at once and free their old
//! cell so later micro-steps see current occupancy. Base cells are never
//! entered.
//!
//! # Determinism
//!
//! Conflict winners depend only on unit stats and stable ids, never on the
//! order intents were listed in. Candidate neighbour order comes from the
//! [`TieBreak`]; with [`TieBreak::Deterministic`] the whole phase is a pure
//! function of state and intents.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet};

use crate::action::Action;
use crate::components::{Unit, UnitId};
use crate::hex::{self, Coord};
use crate::state::GameState;
use crate::tiebreak::TieBreak;

/// A completed move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    /// Moving unit.
    pub unit_id: UnitId,
    /// Cell left.
    pub from: Coord,
    /// Cell entered.
    pub to: Coord,
}

/// Sort key for contested cells; the smallest key wins.
///
/// Faster first, then healthier, then stronger, then lower id.
#[must_use]
pub fn priority(unit: &Unit) -> (Reverse<i32>, Reverse<i32>, Reverse<i32>, UnitId) {
    (Reverse(unit.spd), Reverse(unit.hp), Reverse(unit.atk), unit.id)
}

/// Cells blocked for this phase: every unit and both bases.
fn blocked_cells(state: &GameState) -> BTreeSet<Coord> {
    let mut blocked = state.units.occupied().clone();
    blocked.insert(state.bases.a.pos);
    blocked.insert(state.bases.b.pos);
    blocked
}

/// The cell `unit` wants to enter this micro-step, if any.
fn propose(
    state: &GameState,
    unit: &Unit,
    action: &Action,
    blocked: &BTreeSet<Coord>,
    tiebreak: &mut TieBreak,
) -> Option<Coord> {
    let open = |c: &Coord| state.is_known_walkable(unit.team, *c) && !blocked.contains(c);

    match action {
        Action::MovePath(path) => {
            let index = path.iter().position(|c| *c == unit.pos)?;
            path.get(index + 1).copied().filter(open)
        }
        Action::Wander => {
            let mut around = hex::neighbors(unit.pos);
            tiebreak.order(&mut around);
            around.into_iter().find(open)
        }
        Action::MoveTowards(dest) => {
            if unit.pos == *dest {
                return None;
            }
            let mut around = hex::neighbors(unit.pos);
            tiebreak.order(&mut around);
            around
                .into_iter()
                .filter(open)
                .min_by_key(|c| hex::distance(*c, *dest))
        }
        Action::Idle | Action::Attack(_) => None,
    }
}

/// Resolve every movement intent of one tick.
///
/// Returns the moves made, in the order they were applied.
pub fn resolve(
    state: &mut GameState,
    actions: &[(UnitId, Action)],
    tiebreak: &mut TieBreak,
) -> Vec<Step> {
    let movers: Vec<(UnitId, &Action)> = actions
        .iter()
        .filter(|(id, action)| action.is_movement() && state.units.contains(*id))
        .map(|(id, action)| (*id, action))
        .collect();
    let Some(max_speed) = movers
        .iter()
        .filter_map(|(id, _)| state.units.get(*id).map(|u| u.spd))
        .max()
    else {
        return Vec::new();
    };

    let mut blocked = blocked_cells(state);
    let mut steps = Vec::new();

    for micro in 0..max_speed {
        let mut contested: BTreeMap<Coord, Vec<UnitId>> = BTreeMap::new();
        for (id, action) in &movers {
            let Some(unit) = state.units.get(*id) else {
                continue;
            };
            if unit.spd <= micro {
                continue;
            }
            if let Some(dest) = propose(state, unit, action, &blocked, tiebreak) {
                contested.entry(dest).or_default().push(*id);
            }
        }
        if contested.is_empty() {
            break;
        }

        for (dest, claimants) in contested {
            let winner = claimants
                .iter()
                .filter_map(|id| state.units.get(*id))
                .min_by_key(|u| priority(u))
                .map(|u| u.id);
            let Some(winner) = winner else {
                continue;
            };
            if let Some(unit) = state.units.get_mut(winner) {
                let from = unit.pos;
                unit.pos = dest;
                blocked.remove(&from);
                blocked.insert(dest);
                steps.push(Step { unit_id: winner, from, to: dest });
            }
        }
    }

    state.units.rebuild_occupancy();
    tracing::trace!(tick = state.tick, moves = steps.len(), "Movement resolved");
    steps
}
