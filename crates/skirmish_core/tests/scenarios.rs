//! End-to-end tick scenarios.

use skirmish_core::action::{Action, Target, TeamOrders, UnitCommand};
use skirmish_core::balance::BalanceTable;
use skirmish_core::combat;
use skirmish_core::components::{PerTeam, Team};
use skirmish_core::hex::Coord;
use skirmish_core::movement;
use skirmish_core::simulation::{SpawnMode, TickEngine};
use skirmish_core::snapshot;
use skirmish_core::state::MatchOutcome;
use skirmish_core::tiebreak::TieBreak;
use skirmish_core::unit_kind::UnitKind;
use skirmish_core::visibility;
use skirmish_test_utils::fixtures::{
    generated_engine, open_state, reveal_all, spawn, state_from_rows,
};

#[test]
fn simultaneous_infantry_exchange() {
    let mut state = open_state(8, 5);
    let a = spawn(&mut state, Team::A, UnitKind::Infantry, 3, 2);
    let b = spawn(&mut state, Team::B, UnitKind::Infantry, 4, 2);

    combat::resolve(
        &mut state,
        &[
            (a, Action::Attack(Target::Unit(b))),
            (b, Action::Attack(Target::Unit(a))),
        ],
    );

    assert_eq!(state.units.get(a).unwrap().hp, 70);
    assert_eq!(state.units.get(b).unwrap().hp, 70);
}

#[test]
fn contested_cell_goes_to_lower_id_in_any_order() {
    let run = |swap: bool| {
        let mut state = open_state(6, 4);
        reveal_all(&mut state);
        let first = spawn(&mut state, Team::A, UnitKind::Infantry, 1, 2);
        let second = spawn(&mut state, Team::A, UnitKind::Infantry, 3, 2);
        let mut actions = vec![
            (first, Action::MoveTowards(Coord::new(2, 2))),
            (second, Action::MoveTowards(Coord::new(2, 2))),
        ];
        if swap {
            actions.reverse();
        }
        movement::resolve(&mut state, &actions, &mut TieBreak::Deterministic);
        (first, state.units.at(Coord::new(2, 2)).map(|u| u.id), state)
    };

    let (first, winner, state) = run(false);
    let (_, swapped_winner, _) = run(true);
    assert_eq!(winner, Some(first));
    assert_eq!(swapped_winner, Some(first));
    assert_eq!(state.units.len(), 2);
    assert!(state.units.at(Coord::new(3, 2)).is_some());
}

#[test]
fn mountain_hides_what_lies_behind() {
    let mut state = state_from_rows(&[
        "............",
        "............",
        "...#........",
        "............",
        "............",
    ]);
    let balance = BalanceTable::default();
    let id = state.spawn_unit(Team::A, UnitKind::Scout, Coord::new(2, 2), &balance);
    state.units.get_mut(id).unwrap().vision = 5;

    let visible = visibility::compute(&state, Team::A);
    assert!(visible.contains(&Coord::new(3, 2)));
    assert!(!visible.contains(&Coord::new(4, 2)));
    assert!(!visible.contains(&Coord::new(5, 2)));
    assert!(visible.contains(&Coord::new(2, 4)));
}

#[test]
fn left_edge_sees_two_rows_down_on_open_ground() {
    let mut state = open_state(8, 8);
    state.base_mut(Team::A).hp = 0;
    let id = spawn(&mut state, Team::A, UnitKind::Scout, 0, 0);
    state.units.get_mut(id).unwrap().vision = 5;

    assert_eq!(
        skirmish_core::hex::line(Coord::new(0, 0), Coord::new(0, 2)),
        vec![Coord::new(0, 0), Coord::new(0, 1), Coord::new(0, 2)]
    );
    let visible = visibility::compute(&state, Team::A);
    assert!(visible.contains(&Coord::new(0, 1)));
    assert!(visible.contains(&Coord::new(0, 2)));
}

#[test]
fn known_enemy_base_survives_losing_sight() {
    let mut state = open_state(12, 6);
    let scout = spawn(&mut state, Team::A, UnitKind::Scout, 8, 4);
    visibility::update(&mut state);
    assert_eq!(state.known_enemy_base.a, Some(state.base(Team::B).pos));

    state.units.remove(scout);
    visibility::update(&mut state);
    assert!(!state.visible.a.contains(&state.base(Team::B).pos));
    assert_eq!(state.known_enemy_base.a, Some(state.base(Team::B).pos));
}

#[test]
fn base_destruction_ends_match() {
    let mut state = open_state(8, 5);
    state.base_mut(Team::B).hp = 10;
    let archer = spawn(&mut state, Team::A, UnitKind::Archer, 5, 3);
    let mut engine = TickEngine::deterministic(state, BalanceTable::default());

    let mut orders = PerTeam::<TeamOrders>::default();
    orders.a.commands.push(UnitCommand {
        unit_id: archer,
        unit_pos: Coord::new(5, 3),
        action: Action::Attack(Target::Base(Team::B)),
    });

    let outcome = engine.apply_turn(&orders);
    assert!(outcome.progressed);
    assert!(!outcome.running);
    assert_eq!(engine.state().winner(), MatchOutcome::Winner(Team::A));
    assert!(engine.state().base(Team::B).hp <= 0);
    assert!(!engine.step().progressed);
}

#[test]
fn ai_match_runs_and_snapshots_round_trip() {
    let mut engine = generated_engine(30, 16, 2024);
    for _ in 0..120 {
        if !engine.step().running {
            break;
        }
    }
    let text = snapshot::to_json(engine.state()).unwrap();
    let restored = snapshot::from_json(&text).unwrap();
    assert_eq!(restored.checksum(), engine.checksum());
    assert!(!engine.state().explored.a.is_empty());
}

#[test]
fn cooldown_mode_spawns_one_at_a_time() {
    let mut engine = TickEngine::new(open_state(10, 6), BalanceTable::classic(), 8)
        .with_spawn_mode(SpawnMode::Cooldown);
    engine.step();
    assert_eq!(engine.state().units.of_team(Team::A).count(), 1);
    assert_eq!(engine.state().units.of_team(Team::B).count(), 1);
}
