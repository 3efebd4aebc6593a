//! Per-team visibility and fog-of-war memory.
//!
//! A cell is visible to a team when some observer (a live unit or the
//! team's base) is within its vision radius and the straight hex line
//! between them passes no mountain. The target cell itself never blocks,
//! so a mountain face is visible but what lies behind it is not.

use std::collections::BTreeSet;

use crate::components::Team;
use crate::hex::{self, Coord};
use crate::map::Map;
use crate::state::GameState;

/// Vision radius of a base.
pub const BASE_VISION: i32 = 3;

/// Line-of-sight test between two cells.
///
/// Only cells strictly between `from` and `to` are checked. Off-map cells
/// on the line count as blocking.
#[must_use]
pub fn has_line_of_sight(map: &Map, from: Coord, to: Coord) -> bool {
    let line = hex::line(from, to);
    let interior = line.len().saturating_sub(1);
    !line
        .iter()
        .take(interior)
        .skip(1)
        .any(|c| map.blocks_sight(*c))
}

/// Cells visible from one observer.
fn observe(map: &Map, from: Coord, radius: i32, out: &mut BTreeSet<Coord>) {
    for cell in hex::cells_within(from, radius, map.width(), map.height()) {
        if has_line_of_sight(map, from, cell) {
            out.insert(cell);
        }
    }
}

/// Compute the set of cells `team` sees in `state`.
#[must_use]
pub fn compute(state: &GameState, team: Team) -> BTreeSet<Coord> {
    let mut visible = BTreeSet::new();
    let base = state.base(team);
    if base.is_alive() {
        observe(&state.map, base.pos, BASE_VISION, &mut visible);
    }
    for unit in state.units.of_team(team).filter(|u| !u.is_dead()) {
        observe(&state.map, unit.pos, unit.vision, &mut visible);
    }
    visible
}

/// Recompute both teams' visible sets, merge them into explored memory and
/// record enemy bases that came into view.
pub fn update(state: &mut GameState) {
    for team in Team::ALL {
        let visible = compute(state, team);
        let enemy_base = state.base(team.opponent()).pos;
        if visible.contains(&enemy_base) {
            state.record_enemy_base(team, enemy_base);
        }
        state.record_explored(team, visible.iter().copied());
        *state.visible.get_mut(team) = visible;
    }
    tracing::trace!(
        tick = state.tick,
        visible_a = state.visible.a.len(),
        visible_b = state.visible.b.len(),
        "Visibility updated"
    );
}
