//! Decision sources: where per-unit actions come from.
//!
//! Each tick the engine asks one [`DecisionSource`] per team for an
//! [`Action`] for every live unit. Sources only read the state; the one
//! permitted side effect, noting a sighted enemy base, goes through
//! [`Intel`] and is merged by the engine after all decisions are made.
//!
//! Three sources exist:
//! - [`ScriptedPolicy`]: AI behaviours dispatched by unit kind
//! - [`PlayerTurn`]: intents queued by a local human during planning
//! - [`QueuedIntents`]: the merged intents of a lockstep turn

use std::collections::{BTreeMap, BTreeSet};

use crate::action::{Action, Recruit, Target, TeamOrders, UnitCommand};
use crate::balance::BalanceTable;
use crate::components::{Team, Unit, UnitId};
use crate::hex::{self, Coord};
use crate::spawn;
use crate::state::GameState;
use crate::unit_kind::UnitKind;

/// Discovery bookkeeping collected while deciding.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Intel {
    sightings: Vec<(Team, Coord)>,
}

impl Intel {
    /// Note that `team` has seen the enemy base at `pos`.
    pub fn record_enemy_base(&mut self, team: Team, pos: Coord) {
        self.sightings.push((team, pos));
    }

    /// Recorded sightings in order.
    #[must_use]
    pub fn sightings(&self) -> &[(Team, Coord)] {
        &self.sightings
    }

    /// Merge the sightings into the state.
    pub fn apply(self, state: &mut GameState) {
        for (team, pos) in self.sightings {
            state.record_enemy_base(team, pos);
        }
    }
}

/// Produces one action per unit per tick.
pub trait DecisionSource: Send {
    /// Decide what `unit` does this tick.
    fn decide(&mut self, unit: &Unit, state: &GameState, intel: &mut Intel) -> Action;

    /// Forget per-unit memory of units that no longer exist.
    fn retain_units(&mut self, _alive: &BTreeSet<UnitId>) {}
}

/// Scripted behaviour for one unit kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitPolicy {
    /// Find the enemy base, then go for it.
    Scout,
    /// Engage the nearest enemy anywhere on the map.
    Skirmisher,
    /// Fight what is in sight, otherwise push to the enemy base or explore.
    Explorer,
}

/// AI decision source with an explicit kind-to-behaviour table.
#[derive(Debug, Clone)]
pub struct ScriptedPolicy {
    table: BTreeMap<UnitKind, UnitPolicy>,
    fallback: UnitPolicy,
    goals: BTreeMap<UnitId, Coord>,
}

impl Default for ScriptedPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedPolicy {
    /// Scouts scout, everything else skirmishes.
    #[must_use]
    pub fn new() -> Self {
        let mut table = BTreeMap::new();
        table.insert(UnitKind::Scout, UnitPolicy::Scout);
        table.insert(UnitKind::Infantry, UnitPolicy::Skirmisher);
        table.insert(UnitKind::Archer, UnitPolicy::Skirmisher);
        Self {
            table,
            fallback: UnitPolicy::Skirmisher,
            goals: BTreeMap::new(),
        }
    }

    /// Every kind uses the same behaviour.
    #[must_use]
    pub fn uniform(policy: UnitPolicy) -> Self {
        Self {
            table: BTreeMap::new(),
            fallback: policy,
            goals: BTreeMap::new(),
        }
    }

    /// Override the behaviour of one kind.
    #[must_use]
    pub fn with(mut self, kind: UnitKind, policy: UnitPolicy) -> Self {
        self.table.insert(kind, policy);
        self
    }

    /// Behaviour used for `kind`.
    #[must_use]
    pub fn policy_for(&self, kind: UnitKind) -> UnitPolicy {
        self.table.get(&kind).copied().unwrap_or(self.fallback)
    }

    fn scout(unit: &Unit, state: &GameState, intel: &mut Intel) -> Action {
        let enemy = unit.team.opponent();
        let enemy_base = state.base(enemy).pos;
        let mut known = *state.known_enemy_base.get(unit.team);
        if hex::distance(unit.pos, enemy_base) <= unit.vision {
            intel.record_enemy_base(unit.team, enemy_base);
            known = Some(enemy_base);
        }
        match known {
            Some(pos) if hex::distance(unit.pos, pos) <= unit.rng => {
                Action::Attack(Target::Base(enemy))
            }
            Some(pos) => Action::MoveTowards(pos),
            None => Action::MoveTowards(farthest_walkable(state, unit.team).unwrap_or(unit.pos)),
        }
    }

    fn skirmisher(unit: &Unit, state: &GameState) -> Action {
        match nearest_enemy(unit, state, i32::MAX) {
            Some((target, d)) if d <= unit.rng => Action::Attack(target),
            Some((target, _)) => state
                .target_pos(target)
                .map_or(Action::Wander, Action::MoveTowards),
            None => Action::Wander,
        }
    }

    fn explorer(&mut self, unit: &Unit, state: &GameState, intel: &mut Intel) -> Action {
        let enemy = unit.team.opponent();
        let enemy_base = state.base(enemy);
        let mut known = *state.known_enemy_base.get(unit.team);
        if enemy_base.is_alive() && hex::distance(unit.pos, enemy_base.pos) <= unit.vision {
            intel.record_enemy_base(unit.team, enemy_base.pos);
            known = Some(enemy_base.pos);
        }

        if let Some((target, d)) = nearest_enemy(unit, state, unit.vision) {
            if d <= unit.rng {
                return Action::Attack(target);
            }
        }
        if let Some(pos) = known {
            return Action::MoveTowards(pos);
        }

        let goal = match self.goals.get(&unit.id) {
            Some(goal) if *goal != unit.pos => *goal,
            _ => {
                let goal = farthest_walkable(state, unit.team).unwrap_or(unit.pos);
                self.goals.insert(unit.id, goal);
                goal
            }
        };
        Action::MoveTowards(goal)
    }
}

impl DecisionSource for ScriptedPolicy {
    fn decide(&mut self, unit: &Unit, state: &GameState, intel: &mut Intel) -> Action {
        match self.policy_for(unit.kind) {
            UnitPolicy::Scout => Self::scout(unit, state, intel),
            UnitPolicy::Skirmisher => Self::skirmisher(unit, state),
            UnitPolicy::Explorer => self.explorer(unit, state, intel),
        }
    }

    fn retain_units(&mut self, alive: &BTreeSet<UnitId>) {
        self.goals.retain(|id, _| alive.contains(id));
    }
}

/// Nearest living enemy unit or base within `max_distance`.
///
/// Units are checked in storage order before the base; the first of
/// several equally near targets wins.
fn nearest_enemy(unit: &Unit, state: &GameState, max_distance: i32) -> Option<(Target, i32)> {
    let enemy = unit.team.opponent();
    let units = state
        .units
        .of_team(enemy)
        .filter(|e| !e.is_dead())
        .map(|e| (Target::Unit(e.id), e.pos));
    let base = state.base(enemy);
    let base = base.is_alive().then_some((Target::Base(enemy), base.pos));

    let mut best: Option<(Target, i32)> = None;
    for (target, pos) in units.chain(base) {
        let d = hex::distance(unit.pos, pos);
        if d <= max_distance && best.map_or(true, |(_, bd)| d < bd) {
            best = Some((target, d));
        }
    }
    best
}

/// Walkable cell farthest from a team's own base, first in row-major
/// order among equals.
fn farthest_walkable(state: &GameState, team: Team) -> Option<Coord> {
    let home = state.base(team).pos;
    let mut best: Option<(Coord, i32)> = None;
    for c in state.map.coords().filter(|c| state.map.can_walk(*c)) {
        let d = hex::distance(home, c);
        if best.map_or(true, |(_, bd)| d > bd) {
            best = Some((c, d));
        }
    }
    best.map(|(c, _)| c)
}

/// Fixed per-unit intents; units without one stay idle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueuedIntents {
    team: Option<Team>,
    actions: BTreeMap<UnitId, Action>,
}

impl QueuedIntents {
    /// Intents of one team's lockstep orders. Commands naming units of
    /// the other team are ignored when deciding.
    #[must_use]
    pub fn from_orders(team: Team, orders: &TeamOrders) -> Self {
        Self {
            team: Some(team),
            actions: orders
                .commands
                .iter()
                .map(|c| (c.unit_id, c.action.clone()))
                .collect(),
        }
    }

    /// Queue an action.
    pub fn set(&mut self, unit_id: UnitId, action: Action) {
        self.actions.insert(unit_id, action);
    }

    /// Number of queued intents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// No intents queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

impl DecisionSource for QueuedIntents {
    fn decide(&mut self, unit: &Unit, _state: &GameState, _intel: &mut Intel) -> Action {
        if self.team.is_some_and(|t| t != unit.team) {
            return Action::Idle;
        }
        self.actions.get(&unit.id).cloned().unwrap_or_default()
    }
}

/// A local human's planning buffer for one turn.
///
/// Recruits are validated when queued so an accepted turn never carries
/// an unaffordable or misplaced request; two recruits never share a cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerTurn {
    team: Team,
    points: i32,
    recruits: Vec<Recruit>,
    reserved: BTreeSet<Coord>,
    actions: BTreeMap<UnitId, Action>,
}

impl PlayerTurn {
    /// Empty turn with no points.
    #[must_use]
    pub const fn new(team: Team) -> Self {
        Self {
            team,
            points: 0,
            recruits: Vec::new(),
            reserved: BTreeSet::new(),
            actions: BTreeMap::new(),
        }
    }

    /// Begin planning: refill points from the team's base budget and drop
    /// everything queued.
    pub fn start(&mut self, state: &GameState) {
        self.clear();
        self.points = state.base(self.team).budget();
    }

    /// Planning team.
    #[must_use]
    pub const fn team(&self) -> Team {
        self.team
    }

    /// Points left this turn.
    #[must_use]
    pub const fn points(&self) -> i32 {
        self.points
    }

    /// Recruits in queue order.
    #[must_use]
    pub fn recruits(&self) -> &[Recruit] {
        &self.recruits
    }

    /// Queued unit actions.
    #[must_use]
    pub const fn actions(&self) -> &BTreeMap<UnitId, Action> {
        &self.actions
    }

    /// Enough points remain for `kind`.
    #[must_use]
    pub fn can_recruit(&self, kind: UnitKind, balance: &BalanceTable) -> bool {
        balance.cost(kind).is_some_and(|c| c <= self.points)
    }

    /// Queue a recruit. Returns `false` without changes when the kind is
    /// unaffordable or the cell is unknown, blocked, taken or reserved.
    pub fn queue_recruit(
        &mut self,
        state: &GameState,
        kind: UnitKind,
        pos: Coord,
        balance: &BalanceTable,
    ) -> bool {
        let Some(cost) = balance.cost(kind) else {
            return false;
        };
        if cost > self.points
            || self.reserved.contains(&pos)
            || !spawn::can_place_recruit(state, self.team, pos)
        {
            return false;
        }
        self.points -= cost;
        self.reserved.insert(pos);
        self.recruits.push(Recruit { kind, pos });
        true
    }

    /// Remove the most recent recruit and refund it.
    pub fn undo_last_recruit(&mut self, balance: &BalanceTable) -> Option<Recruit> {
        let last = self.recruits.pop()?;
        self.points += balance.cost(last.kind).unwrap_or(0);
        self.reserved.remove(&last.pos);
        Some(last)
    }

    /// Set (or replace) a unit's action for this turn.
    pub fn set_unit_action(&mut self, unit_id: UnitId, action: Action) {
        self.actions.insert(unit_id, action);
    }

    /// Drop all recruits and actions. Points are left untouched.
    pub fn clear(&mut self) {
        self.recruits.clear();
        self.reserved.clear();
        self.actions.clear();
    }

    /// Package this turn for the wire. Actions for units that no longer
    /// exist are left out.
    #[must_use]
    pub fn to_orders(&self, state: &GameState) -> TeamOrders {
        let commands = self
            .actions
            .iter()
            .filter_map(|(id, action)| {
                let unit = state.units.get(*id)?;
                Some(UnitCommand {
                    unit_id: *id,
                    unit_pos: unit.pos,
                    action: action.clone(),
                })
            })
            .collect();
        TeamOrders {
            recruits: self.recruits.clone(),
            commands,
        }
    }
}

impl DecisionSource for PlayerTurn {
    fn decide(&mut self, unit: &Unit, _state: &GameState, _intel: &mut Intel) -> Action {
        if unit.team != self.team {
            return Action::Idle;
        }
        self.actions.get(&unit.id).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::Base;
    use crate::map::Map;

    fn open_state(w: i32, h: i32) -> GameState {
        let mut state = GameState::new(
            Map::new(w, h),
            Base::new(Team::A, Coord::new(0, 0), 500, 6),
            Base::new(Team::B, Coord::new(w - 1, h - 1), 500, 6),
        );
        let all: Vec<Coord> = state.map.coords().collect();
        state.record_explored(Team::A, all.iter().copied());
        state.record_explored(Team::B, all);
        state
    }

    #[test]
    fn test_scout_explores_then_attacks_base() {
        let balance = BalanceTable::default();
        let mut state = open_state(12, 8);
        let id = state.spawn_unit(Team::A, UnitKind::Scout, Coord::new(1, 1), &balance);
        let mut policy = ScriptedPolicy::new();

        let mut intel = Intel::default();
        let unit = state.units.get(id).unwrap().clone();
        let action = policy.decide(&unit, &state, &mut intel);
        assert_eq!(action, Action::MoveTowards(Coord::new(11, 7)));
        assert!(intel.sightings().is_empty());

        state.units.get_mut(id).unwrap().pos = Coord::new(10, 7);
        let unit = state.units.get(id).unwrap().clone();
        let action = policy.decide(&unit, &state, &mut intel);
        assert_eq!(action, Action::Attack(Target::Base(Team::B)));
        assert_eq!(intel.sightings(), &[(Team::A, Coord::new(11, 7))]);
        intel.apply(&mut state);
        assert_eq!(*state.known_enemy_base.get(Team::A), Some(Coord::new(11, 7)));
    }

    #[test]
    fn test_skirmisher_picks_nearest() {
        let balance = BalanceTable::default();
        let mut state = open_state(12, 8);
        let me = state.spawn_unit(Team::A, UnitKind::Infantry, Coord::new(4, 4), &balance);
        let near = state.spawn_unit(Team::B, UnitKind::Infantry, Coord::new(5, 4), &balance);
        state.spawn_unit(Team::B, UnitKind::Infantry, Coord::new(8, 4), &balance);

        let mut policy = ScriptedPolicy::new();
        let unit = state.units.get(me).unwrap().clone();
        let action = policy.decide(&unit, &state, &mut Intel::default());
        assert_eq!(action, Action::Attack(Target::Unit(near)));

        state.units.remove(near);
        let action = policy.decide(&unit, &state, &mut Intel::default());
        assert_eq!(action, Action::MoveTowards(Coord::new(8, 4)));
    }

    #[test]
    fn test_explorer_keeps_goal() {
        let balance = BalanceTable::default();
        let mut state = open_state(12, 8);
        let id = state.spawn_unit(Team::A, UnitKind::Infantry, Coord::new(1, 1), &balance);
        let mut policy = ScriptedPolicy::uniform(UnitPolicy::Explorer);
        let unit = state.units.get(id).unwrap().clone();
        let first = policy.decide(&unit, &state, &mut Intel::default());
        let second = policy.decide(&unit, &state, &mut Intel::default());
        assert_eq!(first, second);
        assert!(matches!(first, Action::MoveTowards(_)));

        policy.retain_units(&BTreeSet::new());
        assert!(policy.goals.is_empty());
    }

    #[test]
    fn test_policy_table_dispatch() {
        let policy = ScriptedPolicy::new().with(UnitKind::Archer, UnitPolicy::Explorer);
        assert_eq!(policy.policy_for(UnitKind::Scout), UnitPolicy::Scout);
        assert_eq!(policy.policy_for(UnitKind::Archer), UnitPolicy::Explorer);
        assert_eq!(policy.policy_for(UnitKind::Cavalry), UnitPolicy::Skirmisher);
    }

    #[test]
    fn test_player_turn_recruit_and_undo() {
        let balance = BalanceTable::default();
        let state = open_state(8, 6);
        let mut turn = PlayerTurn::new(Team::A);
        turn.start(&state);
        assert_eq!(turn.points(), 6);

        assert!(turn.queue_recruit(&state, UnitKind::Infantry, Coord::new(1, 0), &balance));
        assert!(!turn.queue_recruit(&state, UnitKind::Scout, Coord::new(1, 0), &balance));
        assert!(!turn.queue_recruit(&state, UnitKind::Scout, Coord::new(0, 0), &balance));
        assert!(turn.queue_recruit(&state, UnitKind::Archer, Coord::new(1, 1), &balance));
        assert_eq!(turn.points(), 0);
        assert!(!turn.can_recruit(UnitKind::Scout, &balance));

        let undone = turn.undo_last_recruit(&balance).unwrap();
        assert_eq!(undone.kind, UnitKind::Archer);
        assert_eq!(turn.points(), 3);
        assert!(turn.queue_recruit(&state, UnitKind::Scout, Coord::new(1, 1), &balance));
        assert_eq!(turn.recruits().len(), 2);
    }

    #[test]
    fn test_player_turn_orders() {
        let balance = BalanceTable::default();
        let mut state = open_state(8, 6);
        let id = state.spawn_unit(Team::A, UnitKind::Infantry, Coord::new(2, 2), &balance);
        let mut turn = PlayerTurn::new(Team::A);
        turn.start(&state);
        turn.set_unit_action(id, Action::Wander);
        turn.set_unit_action(99, Action::Wander);

        let orders = turn.to_orders(&state);
        assert_eq!(orders.commands.len(), 1);
        assert_eq!(orders.commands[0].unit_pos, Coord::new(2, 2));

        let unit = state.units.get(id).unwrap().clone();
        assert_eq!(turn.decide(&unit, &state, &mut Intel::default()), Action::Wander);
        turn.clear();
        assert_eq!(turn.decide(&unit, &state, &mut Intel::default()), Action::Idle);
    }

    #[test]
    fn test_queued_intents_ignore_foreign_units() {
        let balance = BalanceTable::default();
        let mut state = open_state(8, 6);
        let b = state.spawn_unit(Team::B, UnitKind::Infantry, Coord::new(4, 4), &balance);
        let orders = TeamOrders {
            recruits: Vec::new(),
            commands: vec![UnitCommand {
                unit_id: b,
                unit_pos: Coord::new(4, 4),
                action: Action::Wander,
            }],
        };
        let mut intents = QueuedIntents::from_orders(Team::A, &orders);
        let unit = state.units.get(b).unwrap().clone();
        assert_eq!(intents.decide(&unit, &state, &mut Intel::default()), Action::Idle);
    }
}
