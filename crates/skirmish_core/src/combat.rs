//! Simultaneous combat resolution.
//!
//! All attack intents of a tick are evaluated against the same pre-combat
//! state. Damage is summed per target and applied once, so two units that
//! attack each other both hit regardless of the order they are listed in.
//! Units killed here are removed before movement runs.

use std::collections::BTreeMap;

use crate::action::{Action, Target};
use crate::components::UnitId;
use crate::hex;
use crate::state::GameState;

/// What one combat phase did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CombatReport {
    /// Total damage applied per target.
    pub damage: BTreeMap<Target, i32>,
    /// Units removed because their hit points reached zero.
    pub killed: Vec<UnitId>,
}

impl CombatReport {
    /// Nothing happened.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.damage.is_empty() && self.killed.is_empty()
    }
}

/// Damage every valid attack intent would deal, summed per target.
///
/// An intent is valid when the attacker is alive, the target is alive and
/// on the other team, and the target lies within the attacker's range.
/// Everything else is dropped silently.
#[must_use]
pub fn aggregate(state: &GameState, actions: &[(UnitId, Action)]) -> BTreeMap<Target, i32> {
    let mut totals = BTreeMap::new();
    for (id, action) in actions {
        let Action::Attack(target) = action else {
            continue;
        };
        let Some(attacker) = state.units.get(*id).filter(|u| !u.is_dead()) else {
            continue;
        };
        if state.target_team(*target) == Some(attacker.team) {
            continue;
        }
        let Some(target_pos) = state.target_pos(*target) else {
            continue;
        };
        if hex::distance(attacker.pos, target_pos) > attacker.rng {
            continue;
        }
        *totals.entry(*target).or_insert(0) += state.damage_value(attacker, *target);
    }
    totals
}

/// Resolve every attack intent of one tick.
pub fn resolve(state: &mut GameState, actions: &[(UnitId, Action)]) -> CombatReport {
    let damage = aggregate(state, actions);

    for (target, amount) in &damage {
        match *target {
            Target::Unit(id) => {
                if let Some(unit) = state.units.get_mut(id) {
                    unit.hp -= amount;
                }
            }
            Target::Base(team) => state.base_mut(team).hp -= amount,
        }
    }

    let killed = state.units.remove_dead();
    for id in &killed {
        tracing::debug!(tick = state.tick, unit_id = id, "Unit destroyed");
    }
    for team in crate::components::Team::ALL {
        let base = state.base(team);
        if !base.is_alive() && damage.contains_key(&Target::Base(team)) {
            tracing::info!(tick = state.tick, %team, hp = base.hp, "Base destroyed");
        }
    }

    CombatReport { damage, killed }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::balance::{BalanceTable, UnitStats};
    use crate::components::{Base, Team, Unit};
    use crate::hex::Coord;
    use crate::map::Map;

    fn empty_state() -> GameState {
        GameState::new(
            Map::new(10, 10),
            Base::new(Team::A, Coord::new(0, 0), 500, 6),
            Base::new(Team::B, Coord::new(9, 9), 500, 6),
        )
    }

    fn add(state: &mut GameState, team: Team, pos: Coord, stats: UnitStats) -> UnitId {
        let id = state.units.allocate_id();
        state
            .units
            .insert(Unit::from_stats(id, team, crate::unit_kind::UnitKind::Infantry, pos, stats))
    }

    const INFANTRY: UnitStats = UnitStats { hp: 80, atk: 15, armor: 0, rng: 1, spd: 1, vision: 3 };

    #[test]
    fn test_mutual_attack_is_simultaneous() {
        let mut state = empty_state();
        let armored = UnitStats { armor: 5, ..INFANTRY };
        let a = add(&mut state, Team::A, Coord::new(4, 4), armored);
        let b = add(&mut state, Team::B, Coord::new(5, 4), armored);

        let actions = vec![
            (a, Action::Attack(Target::Unit(b))),
            (b, Action::Attack(Target::Unit(a))),
        ];
        let report = resolve(&mut state, &actions);
        assert_eq!(state.units.get(a).unwrap().hp, 70);
        assert_eq!(state.units.get(b).unwrap().hp, 70);
        assert!(report.killed.is_empty());
    }

    #[test]
    fn test_damage_sums_before_applying() {
        let mut state = empty_state();
        let target = add(&mut state, Team::B, Coord::new(4, 4), UnitStats { hp: 20, ..INFANTRY });
        let a1 = add(&mut state, Team::A, Coord::new(3, 4), INFANTRY);
        let a2 = add(&mut state, Team::A, Coord::new(5, 4), INFANTRY);

        // Each attack alone leaves the target alive.
        let actions = vec![
            (a1, Action::Attack(Target::Unit(target))),
            (a2, Action::Attack(Target::Unit(target))),
        ];
        let report = resolve(&mut state, &actions);
        assert_eq!(report.damage.get(&Target::Unit(target)), Some(&30));
        assert_eq!(report.killed, vec![target]);
        assert!(!state.units.contains(target));
        assert!(!state.units.is_occupied(Coord::new(4, 4)));
    }

    #[test]
    fn test_out_of_range_and_missing_targets_dropped() {
        let mut state = empty_state();
        let a = add(&mut state, Team::A, Coord::new(1, 1), INFANTRY);
        let b = add(&mut state, Team::B, Coord::new(6, 6), INFANTRY);
        let actions = vec![
            (a, Action::Attack(Target::Unit(b))),
            (a, Action::Attack(Target::Unit(999))),
            (a, Action::Attack(Target::Base(Team::B))),
            (777, Action::Attack(Target::Unit(b))),
        ];
        let report = resolve(&mut state, &actions);
        assert!(report.is_empty());
        assert_eq!(state.units.get(b).unwrap().hp, 80);
        assert_eq!(state.base(Team::B).hp, 500);
    }

    #[test]
    fn test_base_takes_unarmored_damage() {
        let mut state = empty_state();
        let a = add(&mut state, Team::A, Coord::new(8, 9), UnitStats { atk: 40, ..INFANTRY });
        resolve(&mut state, &[(a, Action::Attack(Target::Base(Team::B)))]);
        assert_eq!(state.base(Team::B).hp, 460);
    }

    #[test]
    fn test_friendly_fire_dropped() {
        let mut state = empty_state();
        let a = add(&mut state, Team::A, Coord::new(4, 4), INFANTRY);
        let b = add(&mut state, Team::A, Coord::new(5, 4), INFANTRY);
        resolve(&mut state, &[(a, Action::Attack(Target::Unit(b)))]);
        assert_eq!(state.units.get(b).unwrap().hp, 80);
    }

    #[test]
    fn test_empty_actions_change_nothing() {
        let mut state = empty_state();
        add(&mut state, Team::A, Coord::new(4, 4), INFANTRY);
        let before = state.clone();
        let report = resolve(&mut state, &[]);
        assert!(report.is_empty());
        assert_eq!(state, before);
    }

    #[test]
    fn test_balance_damage_floor() {
        let balance = BalanceTable::default();
        let mut state = empty_state();
        let scout = state.spawn_unit(Team::A, crate::unit_kind::UnitKind::Scout, Coord::new(4, 4), &balance);
        let tank = add(&mut state, Team::B, Coord::new(5, 4), UnitStats { armor: 30, ..INFANTRY });
        resolve(&mut state, &[(scout, Action::Attack(Target::Unit(tank)))]);
        assert_eq!(state.units.get(tank).unwrap().hp, 80);
    }
}
