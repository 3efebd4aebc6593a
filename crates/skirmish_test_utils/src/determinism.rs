//! Determinism testing utilities.
//!
//! Provides a harness for verifying that the tick engine produces
//! identical states given identical inputs.
//!
//! # Testing Strategy
//!
//! Lockstep peers only exchange intents, so every peer must resolve a turn
//! to the same state. Sources of non-determinism include:
//!
//! - **Floating-point math**: hex lines are interpolated with
//!   [`skirmish_core::math::Fixed`], never floats.
//!
//! - **HashMap iteration order**: state collections are `Vec` or
//!   `BTreeMap`/`BTreeSet`.
//!
//! - **System randomness**: local play draws from a seeded generator;
//!   lockstep turns draw from nothing.
//!
//! # Test Levels
//!
//! 1. **Unit tests**: individual phases (combat, movement, spawning)
//! 2. **Property tests**: random maps and orders still resolve identically
//! 3. **Integration tests**: full matches are reproducible
//! 4. **Parallel tests**: engines on separate threads all agree

use std::thread;

use skirmish_core::simulation::TickEngine;

/// Result of a determinism test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical results.
    pub is_deterministic: bool,
    /// Final checksum of each run.
    pub checksums: Vec<String>,
    /// Number of ticks simulated.
    pub ticks: u64,
}

impl DeterminismResult {
    /// Distinct checksums (one for a deterministic engine).
    #[must_use]
    pub fn unique_checksums(&self) -> Vec<String> {
        let mut unique = self.checksums.clone();
        unique.sort_unstable();
        unique.dedup();
        unique
    }

    /// Assert that every run agreed, with a detailed message.
    ///
    /// # Panics
    ///
    /// Panics if the runs produced different checksums.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic {
            panic!(
                "Engine is non-deterministic!\n\
                 Runs: {}\n\
                 Ticks: {}\n\
                 Unique checksums: {} (expected 1)\n\
                 All checksums: {:?}",
                self.checksums.len(),
                self.ticks,
                self.unique_checksums().len(),
                self.checksums
            );
        }
    }
}

/// Run a setup several times, step each result, and compare checksums.
///
/// # Example
///
/// ```
/// use skirmish_test_utils::determinism::verify_determinism;
/// use skirmish_test_utils::fixtures::seeded_engine;
///
/// let result = verify_determinism(
///     3,
///     20,
///     || seeded_engine(12, 8, 9),
///     |engine| {
///         engine.step();
///     },
///     |engine| engine.checksum(),
/// );
/// result.assert_deterministic();
/// ```
pub fn verify_determinism<S, Setup, Step, Checksum>(
    runs: usize,
    ticks: u64,
    setup: Setup,
    step: Step,
    checksum: Checksum,
) -> DeterminismResult
where
    Setup: Fn() -> S,
    Step: Fn(&mut S),
    Checksum: Fn(&S) -> String,
{
    let mut checksums = Vec::with_capacity(runs);

    for _ in 0..runs {
        let mut state = setup();
        for _ in 0..ticks {
            step(&mut state);
        }
        checksums.push(checksum(&state));
    }

    let is_deterministic = checksums.windows(2).all(|w| w[0] == w[1]);

    DeterminismResult {
        is_deterministic,
        checksums,
        ticks,
    }
}

/// Run an engine setup twice with [`TickEngine::step`] and compare.
pub fn verify_engine_determinism<F>(setup_fn: F, num_ticks: u64) -> bool
where
    F: Fn() -> TickEngine,
{
    verify_determinism(
        2,
        num_ticks,
        setup_fn,
        |engine| {
            engine.step();
        },
        TickEngine::checksum,
    )
    .is_deterministic
}

/// Run `num_engines` engines on scoped threads and collect final
/// checksums.
///
/// # Panics
///
/// Panics if a worker thread panics.
pub fn run_parallel_engines<F>(setup_fn: F, num_engines: usize, num_ticks: u64) -> DeterminismResult
where
    F: Fn() -> TickEngine + Sync,
{
    let checksums: Vec<String> = thread::scope(|s| {
        let handles: Vec<_> = (0..num_engines)
            .map(|_| {
                s.spawn(|| {
                    let mut engine = setup_fn();
                    for _ in 0..num_ticks {
                        engine.step();
                    }
                    engine.checksum()
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|h| h.join().unwrap_or_else(|_| panic!("engine thread panicked")))
            .collect()
    });

    DeterminismResult {
        is_deterministic: checksums.windows(2).all(|w| w[0] == w[1]),
        checksums,
        ticks: num_ticks,
    }
}

/// Step two engines from the same setup in lockstep, finding the first
/// tick whose checksums differ.
///
/// Returns `None` if they agree for all `num_ticks`.
pub fn find_first_divergence<F>(setup_fn: F, num_ticks: u64) -> Option<u64>
where
    F: Fn() -> TickEngine,
{
    let mut first = setup_fn();
    let mut second = setup_fn();

    if first.checksum() != second.checksum() {
        return Some(0);
    }

    for tick in 1..=num_ticks {
        first.step();
        second.step();
        if first.checksum() != second.checksum() {
            tracing::warn!(tick, "Engines diverged");
            return Some(tick);
        }
    }

    None
}

/// Verify that a bincode round trip after `num_ticks` preserves the
/// checksum.
pub fn verify_serialization_determinism<F>(setup_fn: F, num_ticks: u64) -> bool
where
    F: Fn() -> TickEngine,
{
    let mut engine = setup_fn();
    for _ in 0..num_ticks {
        engine.step();
    }

    let before = engine.checksum();
    let Ok(bytes) = engine.state().to_bytes() else {
        return false;
    };
    let Ok(restored) = skirmish_core::state::GameState::from_bytes(&bytes) else {
        return false;
    };

    before == restored.checksum()
}

/// Proptest strategies for determinism testing.
///
/// These strategies generate random but reproducible maps and lockstep
/// orders for property-based testing.
pub mod strategies {
    use proptest::prelude::*;
    use skirmish_core::action::{Action, Recruit, Target, TeamOrders, UnitCommand};
    use skirmish_core::components::{PerTeam, Team};
    use skirmish_core::hex::Coord;
    use skirmish_core::unit_kind::UnitKind;

    /// A cell inside a `width` x `height` map.
    pub fn arb_coord(width: i32, height: i32) -> impl Strategy<Value = Coord> {
        (0..width, 0..height).prop_map(|(x, y)| Coord::new(x, y))
    }

    /// Any team.
    pub fn arb_team() -> impl Strategy<Value = Team> {
        prop_oneof![Just(Team::A), Just(Team::B)]
    }

    /// Any unit kind.
    pub fn arb_unit_kind() -> impl Strategy<Value = UnitKind> {
        prop_oneof![
            Just(UnitKind::Scout),
            Just(UnitKind::Infantry),
            Just(UnitKind::Archer),
            Just(UnitKind::Cavalry),
        ]
    }

    /// Terrain rows with mostly plain cells.
    pub fn arb_map_rows(width: usize, height: usize) -> impl Strategy<Value = Vec<String>> {
        let cell = prop_oneof![6 => Just('.'), 1 => Just('#'), 1 => Just('~')];
        proptest::collection::vec(proptest::collection::vec(cell, width), height)
            .prop_map(|rows| rows.into_iter().map(|r| r.into_iter().collect()).collect())
    }

    /// Any action over a map of the given size, with unit ids below
    /// `max_id`.
    pub fn arb_action(width: i32, height: i32, max_id: u32) -> impl Strategy<Value = Action> {
        prop_oneof![
            Just(Action::Idle),
            Just(Action::Wander),
            arb_coord(width, height).prop_map(Action::MoveTowards),
            proptest::collection::vec(arb_coord(width, height), 0..6).prop_map(Action::MovePath),
            (1..max_id.max(2)).prop_map(|id| Action::Attack(Target::Unit(id))),
            arb_team().prop_map(|t| Action::Attack(Target::Base(t))),
        ]
    }

    /// One team's orders for a turn.
    pub fn arb_team_orders(width: i32, height: i32, max_id: u32) -> impl Strategy<Value = TeamOrders> {
        let recruit = (arb_unit_kind(), arb_coord(width, height))
            .prop_map(|(kind, pos)| Recruit { kind, pos });
        let command = (1..max_id.max(2), arb_coord(width, height), arb_action(width, height, max_id))
            .prop_map(|(unit_id, unit_pos, action)| UnitCommand {
                unit_id,
                unit_pos,
                action,
            });
        (
            proptest::collection::vec(recruit, 0..4),
            proptest::collection::vec(command, 0..8),
        )
            .prop_map(|(recruits, commands)| TeamOrders { recruits, commands })
    }

    /// Both teams' orders for a sequence of turns.
    pub fn arb_turns(
        width: i32,
        height: i32,
        max_turns: usize,
    ) -> impl Strategy<Value = Vec<PerTeam<TeamOrders>>> {
        let turn = (arb_team_orders(width, height, 24), arb_team_orders(width, height, 24))
            .prop_map(|(a, b)| PerTeam::new(a, b));
        proptest::collection::vec(turn, 1..max_turns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{generated_engine, seeded_engine, skirmish_lines};
    use proptest::prelude::*;
    use skirmish_core::balance::BalanceTable;
    use skirmish_core::map::Map;
    use skirmish_core::simulation::TickEngine;
    use skirmish_core::state::GameState;

    // =========================================================================
    // Basic determinism tests
    // =========================================================================

    #[test]
    fn test_verify_determinism_simple() {
        let result = verify_determinism(3, 100, || 0u64, |n| *n += 1, |n| n.to_string());
        assert!(result.is_deterministic);
        assert_eq!(result.checksums, vec!["100", "100", "100"]);
    }

    #[test]
    fn test_unique_checksums_reported() {
        let result = DeterminismResult {
            is_deterministic: false,
            checksums: vec!["abc123".into(), "def456".into(), "abc123".into()],
            ticks: 1,
        };
        assert_eq!(result.unique_checksums().len(), 2);
    }

    #[test]
    #[should_panic(expected = "non-deterministic")]
    fn test_assert_deterministic_panics() {
        DeterminismResult {
            is_deterministic: false,
            checksums: vec!["abc123".into(), "def456".into()],
            ticks: 1,
        }
        .assert_deterministic();
    }

    #[test]
    fn test_seeded_engine_determinism() {
        assert!(verify_engine_determinism(|| seeded_engine(16, 10, 42), 60));
    }

    #[test]
    fn test_generated_map_determinism() {
        assert!(verify_engine_determinism(|| generated_engine(30, 16, 7), 40));
    }

    #[test]
    fn test_battle_has_no_divergence() {
        let divergence = find_first_divergence(
            || TickEngine::new(skirmish_lines(), BalanceTable::default(), 3),
            50,
        );
        assert!(divergence.is_none(), "Expected no divergence");
    }

    #[test]
    fn test_serialization_preserves_checksum() {
        assert!(verify_serialization_determinism(|| seeded_engine(16, 10, 11), 25));
    }

    #[test]
    fn test_parallel_engines_agree() {
        let result = run_parallel_engines(|| generated_engine(24, 14, 99), 4, 30);
        result.assert_deterministic();
        assert_eq!(result.checksums.len(), 4);
    }

    // =========================================================================
    // Property-based tests using proptest
    // =========================================================================

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        /// Any seed replays identically.
        #[test]
        fn prop_seeded_matches_are_reproducible(seed in any::<u64>()) {
            prop_assert!(verify_engine_determinism(|| seeded_engine(12, 8, seed), 25));
        }

        /// Lockstep turns on random terrain resolve identically regardless
        /// of the local seed.
        #[test]
        fn prop_lockstep_turns_ignore_seed(
            rows in strategies::arb_map_rows(10, 7),
            turns in strategies::arb_turns(10, 7, 8),
            seed_a in any::<u64>(),
            seed_b in any::<u64>(),
        ) {
            let setup = |seed: u64| {
                let map = Map::from_rows(&rows).unwrap();
                let state = GameState::with_placed_bases(map, &BalanceTable::default());
                state.map(|s| TickEngine::new(s, BalanceTable::default(), seed))
            };
            if let (Some(mut a), Some(mut b)) = (setup(seed_a).ok(), setup(seed_b).ok()) {
                for turn in &turns {
                    a.apply_turn(turn);
                    b.apply_turn(turn);
                    prop_assert_eq!(a.checksum(), b.checksum());
                }
            }
        }
    }
}
