//! Base production.
//!
//! Every tick each base has `build_points_per_turn + build_point_bonus`
//! points to spend. A [`SpawnStrategy`] turns the budget into a list of
//! kinds and each kind is placed on the first free cell next to the base.
//! Spawns without a free cell are dropped, not queued.
//!
//! Human and lockstep teams do not use a strategy: they spend the same
//! budget on explicit [`Recruit`] requests via [`spawn_recruits`].

use crate::action::Recruit;
use crate::balance::BalanceTable;
use crate::components::{Team, UnitId};
use crate::hex::{self, Coord};
use crate::state::GameState;
use crate::tiebreak::TieBreak;
use crate::unit_kind::UnitKind;

/// Cooldown range after a successful cooldown spawn.
const COOLDOWN_RANGE: (i32, i32) = (2, 4);

/// Maps a budget to the unit kinds a base should produce.
pub trait SpawnStrategy: Send {
    /// Choose kinds whose summed cost does not exceed `budget`.
    fn choose_units(
        &mut self,
        budget: i32,
        team: Team,
        state: &GameState,
        balance: &BalanceTable,
        tiebreak: &mut TieBreak,
    ) -> Vec<UnitKind>;
}

/// Picks random affordable kinds until nothing more fits.
///
/// With [`TieBreak::Deterministic`] it always takes the first affordable
/// kind in roster order.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomSpawnStrategy;

impl SpawnStrategy for RandomSpawnStrategy {
    fn choose_units(
        &mut self,
        mut budget: i32,
        _team: Team,
        _state: &GameState,
        balance: &BalanceTable,
        tiebreak: &mut TieBreak,
    ) -> Vec<UnitKind> {
        let mut kinds = Vec::new();
        loop {
            let affordable: Vec<(UnitKind, i32)> = balance
                .units
                .iter()
                .filter(|(_, e)| e.cost > 0 && e.cost <= budget)
                .map(|(k, e)| (*k, e.cost))
                .collect();
            let Some(&(kind, cost)) = tiebreak.choose(&affordable) else {
                break;
            };
            kinds.push(kind);
            budget -= cost;
        }
        kinds
    }
}

/// Produces one fixed kind as often as the budget allows.
#[derive(Debug, Clone, Copy)]
pub struct SingleKindStrategy(pub UnitKind);

impl SpawnStrategy for SingleKindStrategy {
    fn choose_units(
        &mut self,
        budget: i32,
        _team: Team,
        _state: &GameState,
        balance: &BalanceTable,
        _tiebreak: &mut TieBreak,
    ) -> Vec<UnitKind> {
        match balance.cost(self.0) {
            Some(cost) if cost > 0 => vec![self.0; (budget / cost).max(0) as usize],
            _ => Vec::new(),
        }
    }
}

/// In-bounds cells around a base in placement order.
fn spawn_cells(state: &GameState, team: Team, tiebreak: &mut TieBreak) -> Vec<Coord> {
    let mut cells: Vec<Coord> = hex::neighbors(state.base(team).pos)
        .into_iter()
        .filter(|c| state.map.in_bounds(*c))
        .collect();
    tiebreak.order(&mut cells);
    cells
}

/// Place `kinds` around a team's base. Returns the new unit ids.
pub fn place_units(
    state: &mut GameState,
    team: Team,
    kinds: &[UnitKind],
    balance: &BalanceTable,
    tiebreak: &mut TieBreak,
) -> Vec<UnitId> {
    let cells = spawn_cells(state, team, tiebreak);
    let mut spawned = Vec::new();
    for kind in kinds {
        let Some(cell) = cells.iter().copied().find(|c| state.is_free(*c)) else {
            tracing::trace!(tick = state.tick, %team, %kind, "No free spawn cell");
            continue;
        };
        spawned.push(state.spawn_unit(team, *kind, cell, balance));
    }
    spawned
}

/// Spend one tick of a base's budget through `strategy`.
pub fn spawn_from_base(
    state: &mut GameState,
    team: Team,
    strategy: &mut dyn SpawnStrategy,
    balance: &BalanceTable,
    tiebreak: &mut TieBreak,
) -> Vec<UnitId> {
    if !state.base(team).is_alive() {
        return Vec::new();
    }
    let budget = state.base(team).budget();
    let kinds = strategy.choose_units(budget, team, state, balance, tiebreak);
    place_units(state, team, &kinds, balance, tiebreak)
}

/// Cooldown variant: count down, then spawn one random recruitable kind.
///
/// After a spawn the cooldown resets to a random value in 2..=4. If no
/// cell was free the cooldown is set to 1, so the next call only counts
/// down and the retry happens on the call after that.
pub fn spawn_with_cooldown(
    state: &mut GameState,
    team: Team,
    balance: &BalanceTable,
    tiebreak: &mut TieBreak,
) -> Option<UnitId> {
    if !state.base(team).is_alive() {
        return None;
    }
    let base = state.base_mut(team);
    if base.spawn_cooldown > 0 {
        base.spawn_cooldown -= 1;
        return None;
    }

    let roster: Vec<UnitKind> = balance.units.keys().copied().collect();
    let kind = tiebreak.choose(&roster).copied()?;
    let spawned = place_units(state, team, &[kind], balance, tiebreak);
    let cooldown = if spawned.is_empty() {
        1
    } else {
        tiebreak.pick_in(COOLDOWN_RANGE.0, COOLDOWN_RANGE.1)
    };
    state.base_mut(team).spawn_cooldown = cooldown;
    spawned.first().copied()
}

/// Whether a recruit request is placeable right now.
///
/// The cell must be known to the team, walkable, not a base and free.
#[must_use]
pub fn can_place_recruit(state: &GameState, team: Team, pos: Coord) -> bool {
    state.is_known_walkable(team, pos) && !state.units.is_occupied(pos)
}

/// Spawn explicitly requested recruits for a team, in request order,
/// within this tick's budget. Invalid or unaffordable requests are
/// skipped.
pub fn spawn_recruits(
    state: &mut GameState,
    team: Team,
    recruits: &[Recruit],
    balance: &BalanceTable,
) -> Vec<UnitId> {
    if !state.base(team).is_alive() {
        return Vec::new();
    }
    let mut budget = state.base(team).budget();
    let mut spawned = Vec::new();
    for recruit in recruits {
        let Some(cost) = balance.cost(recruit.kind) else {
            continue;
        };
        if cost > budget || !can_place_recruit(state, team, recruit.pos) {
            tracing::debug!(
                tick = state.tick,
                %team,
                kind = %recruit.kind,
                pos = %recruit.pos,
                "Recruit rejected"
            );
            continue;
        }
        budget -= cost;
        spawned.push(state.spawn_unit(team, recruit.kind, recruit.pos, balance));
    }
    spawned
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::Base;
    use crate::map::Map;

    fn state(rows: &[&str], base_a: Coord) -> GameState {
        let map = Map::from_rows(rows).unwrap();
        let (w, h) = (map.width(), map.height());
        GameState::new(
            map,
            Base::new(Team::A, base_a, 500, 6),
            Base::new(Team::B, Coord::new(w - 1, h - 1), 500, 6),
        )
    }

    #[test]
    fn test_random_strategy_respects_budget() {
        let balance = BalanceTable::default();
        let s = state(&["....."], Coord::new(0, 0));
        for seed in 0..20 {
            let mut tb = TieBreak::seeded(seed);
            let kinds = RandomSpawnStrategy.choose_units(6, Team::A, &s, &balance, &mut tb);
            let total: i32 = kinds.iter().filter_map(|k| balance.cost(*k)).sum();
            assert!(total <= 6);
            assert!(6 - total < balance.min_cost().unwrap());
        }
    }

    #[test]
    fn test_deterministic_strategy_takes_first_affordable() {
        let balance = BalanceTable::default();
        let s = state(&["....."], Coord::new(0, 0));
        let kinds = RandomSpawnStrategy.choose_units(
            6,
            Team::A,
            &s,
            &balance,
            &mut TieBreak::Deterministic,
        );
        assert_eq!(kinds, vec![UnitKind::Scout; 3]);
    }

    #[test]
    fn test_spawn_places_next_to_base() {
        let balance = BalanceTable::default();
        let mut s = state(&[".....", ".....", "....."], Coord::new(2, 1));
        let ids = spawn_from_base(
            &mut s,
            Team::A,
            &mut SingleKindStrategy(UnitKind::Infantry),
            &balance,
            &mut TieBreak::Deterministic,
        );
        assert_eq!(ids.len(), 2);
        for id in ids {
            let unit = s.units.get(id).unwrap();
            assert!(unit.pos.is_adjacent(Coord::new(2, 1)));
        }
        assert_eq!(s.units.occupied().len(), 2);
    }

    #[test]
    fn test_spawn_dropped_without_free_cell() {
        let balance = BalanceTable::default();
        let mut s = state(&["~~~", "~.~", "~~~"], Coord::new(1, 1));
        let ids = spawn_from_base(
            &mut s,
            Team::A,
            &mut RandomSpawnStrategy,
            &balance,
            &mut TieBreak::seeded(3),
        );
        assert!(ids.is_empty());
        assert!(s.units.is_empty());
    }

    #[test]
    fn test_cooldown_variant() {
        let balance = BalanceTable::classic();
        let mut s = state(&[".....", ".....", "....."], Coord::new(2, 1));
        let mut tb = TieBreak::Deterministic;

        assert!(spawn_with_cooldown(&mut s, Team::A, &balance, &mut tb).is_some());
        assert_eq!(s.base(Team::A).spawn_cooldown, 2);
        assert!(spawn_with_cooldown(&mut s, Team::A, &balance, &mut tb).is_none());
        assert!(spawn_with_cooldown(&mut s, Team::A, &balance, &mut tb).is_none());
        assert!(spawn_with_cooldown(&mut s, Team::A, &balance, &mut tb).is_some());
        assert_eq!(s.units.len(), 2);
    }

    #[test]
    fn test_cooldown_retries_when_blocked() {
        let balance = BalanceTable::classic();
        let mut s = state(&["~~~", "~.~", "~~~"], Coord::new(1, 1));
        let mut tb = TieBreak::Deterministic;
        assert!(spawn_with_cooldown(&mut s, Team::A, &balance, &mut tb).is_none());
        assert_eq!(s.base(Team::A).spawn_cooldown, 1);
    }

    #[test]
    fn test_blocked_cooldown_skips_one_call() {
        let balance = BalanceTable::classic();
        let mut s = state(&["~~~", "~.~", "~~~"], Coord::new(1, 1));
        let mut tb = TieBreak::Deterministic;
        assert!(spawn_with_cooldown(&mut s, Team::A, &balance, &mut tb).is_none());

        assert!(s.map.set_terrain(Coord::new(0, 1), crate::map::Terrain::Plain));
        assert!(spawn_with_cooldown(&mut s, Team::A, &balance, &mut tb).is_none());
        assert_eq!(s.base(Team::A).spawn_cooldown, 0);
        assert!(spawn_with_cooldown(&mut s, Team::A, &balance, &mut tb).is_some());
        assert_eq!(s.units.len(), 1);
    }

    #[test]
    fn test_recruits_checked_against_budget_and_cells() {
        let balance = BalanceTable::default();
        let mut s = state(&["......", "..#...", "......"], Coord::new(0, 0));
        let all: Vec<Coord> = s.map.coords().collect();
        s.record_explored(Team::A, all);

        let recruits = vec![
            Recruit { kind: UnitKind::Infantry, pos: Coord::new(1, 0) },
            Recruit { kind: UnitKind::Infantry, pos: Coord::new(1, 0) },
            Recruit { kind: UnitKind::Archer, pos: Coord::new(2, 1) },
            Recruit { kind: UnitKind::Archer, pos: Coord::new(0, 0) },
            Recruit { kind: UnitKind::Cavalry, pos: Coord::new(3, 0) },
            Recruit { kind: UnitKind::Archer, pos: Coord::new(3, 2) },
            Recruit { kind: UnitKind::Scout, pos: Coord::new(4, 2) },
        ];
        let ids = spawn_recruits(&mut s, Team::A, &recruits, &balance);
        // Infantry (3) + Archer (3) exhaust the budget of 6.
        assert_eq!(ids.len(), 2);
        assert_eq!(s.units.at(Coord::new(1, 0)).unwrap().kind, UnitKind::Infantry);
        assert_eq!(s.units.at(Coord::new(3, 2)).unwrap().kind, UnitKind::Archer);
        assert!(s.units.at(Coord::new(4, 2)).is_none());
    }

    #[test]
    fn test_recruits_need_knowledge() {
        let balance = BalanceTable::default();
        let mut s = state(&["......"], Coord::new(0, 0));
        let recruits = vec![Recruit { kind: UnitKind::Scout, pos: Coord::new(2, 0) }];
        assert!(spawn_recruits(&mut s, Team::A, &recruits, &balance).is_empty());
    }
}
