//! Test fixtures and helpers.
//!
//! Pre-built maps, states and engines for consistent testing.

use skirmish_core::balance::BalanceTable;
use skirmish_core::components::{Base, Team, UnitId};
use skirmish_core::config::MatchConfig;
use skirmish_core::hex::Coord;
use skirmish_core::map::Map;
use skirmish_core::simulation::TickEngine;
use skirmish_core::state::GameState;
use skirmish_core::unit_kind::UnitKind;

/// Hit points given to fixture bases.
pub const FIXTURE_BASE_HP: i32 = 500;

/// Build points given to fixture bases.
pub const FIXTURE_BUILD_POINTS: i32 = 6;

/// An all-plain map with bases in opposite corners at (1,1) and
/// (w-2,h-2).
///
/// # Panics
///
/// Panics if either dimension is below 3.
#[must_use]
pub fn open_state(width: i32, height: i32) -> GameState {
    assert!(width >= 3 && height >= 3, "fixture maps need room for two bases");
    GameState::new(
        Map::new(width, height),
        Base::new(Team::A, Coord::new(1, 1), FIXTURE_BASE_HP, FIXTURE_BUILD_POINTS),
        Base::new(
            Team::B,
            Coord::new(width - 2, height - 2),
            FIXTURE_BASE_HP,
            FIXTURE_BUILD_POINTS,
        ),
    )
}

/// A state parsed from terrain rows, bases at (0,0) and (w-1,h-1).
///
/// # Panics
///
/// Panics on malformed rows.
#[must_use]
pub fn state_from_rows(rows: &[&str]) -> GameState {
    let map = Map::from_rows(rows).unwrap_or_else(|e| panic!("bad fixture rows: {e}"));
    let (w, h) = (map.width(), map.height());
    GameState::new(
        map,
        Base::new(Team::A, Coord::new(0, 0), FIXTURE_BASE_HP, FIXTURE_BUILD_POINTS),
        Base::new(Team::B, Coord::new(w - 1, h - 1), FIXTURE_BASE_HP, FIXTURE_BUILD_POINTS),
    )
}

/// Mark every cell explored for both teams.
pub fn reveal_all(state: &mut GameState) {
    let all: Vec<Coord> = state.map.coords().collect();
    for team in Team::ALL {
        state.record_explored(team, all.iter().copied());
    }
}

/// Place a unit with default balance stats.
pub fn spawn(state: &mut GameState, team: Team, kind: UnitKind, x: i32, y: i32) -> UnitId {
    state.spawn_unit(team, kind, Coord::new(x, y), &BalanceTable::default())
}

/// Two lines of three infantry facing each other across an open map.
#[must_use]
pub fn skirmish_lines() -> GameState {
    let mut state = open_state(14, 8);
    for y in 2..5 {
        spawn(&mut state, Team::A, UnitKind::Infantry, 5, y);
        spawn(&mut state, Team::B, UnitKind::Infantry, 8, y);
    }
    state
}

/// Seeded engine over an open map.
#[must_use]
pub fn seeded_engine(width: i32, height: i32, seed: u64) -> TickEngine {
    TickEngine::new(open_state(width, height), BalanceTable::default(), seed)
}

/// Seeded engine over a generated map.
///
/// # Panics
///
/// Panics if the generated map has no room for bases.
#[must_use]
pub fn generated_engine(width: i32, height: i32, seed: u64) -> TickEngine {
    TickEngine::from_config(&MatchConfig::random(width, height, seed))
        .unwrap_or_else(|e| panic!("generated fixture failed: {e}"))
}
