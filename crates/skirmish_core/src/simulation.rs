//! Core simulation loop.
//!
//! [`TickEngine`] owns the authoritative [`GameState`] and advances it one
//! discrete tick at a time. Every mutation of the state happens inside
//! [`TickEngine::step`] or [`TickEngine::apply_turn`].
//!
//! # Determinism
//!
//! - No floating-point math on the simulation path
//! - No system randomness; local tie-breaks use a seeded generator and
//!   lockstep turns use none at all
//! - Units are processed in stable insertion order
//! - Same state and same intents always produce the same next state
//!
//! # Example
//!
//! ```
//! use skirmish_core::config::MatchConfig;
//! use skirmish_core::simulation::TickEngine;
//!
//! let config = MatchConfig::random(24, 14, 7);
//! let mut engine = TickEngine::from_config(&config).unwrap();
//!
//! let outcome = engine.step();
//! assert!(outcome.progressed);
//! assert_eq!(engine.tick(), 1);
//! ```

use std::collections::BTreeSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::action::{Action, Recruit, TeamOrders};
use crate::balance::BalanceTable;
use crate::combat;
use crate::components::{PerTeam, Team, UnitId};
use crate::config::MatchConfig;
use crate::decision::{DecisionSource, Intel, PlayerTurn, QueuedIntents, ScriptedPolicy};
use crate::error::Result;
use crate::hex::Coord;
use crate::movement;
use crate::pathfinding;
use crate::spawn::{self, RandomSpawnStrategy, SpawnStrategy};
use crate::state::GameState;
use crate::tiebreak::TieBreak;
use crate::unit_kind::UnitKind;
use crate::visibility;

/// Ticks per second of the background tick thread.
pub const TICK_RATE: u32 = 5;

/// Interval between ticks of the background tick thread.
pub const TICK_INTERVAL: Duration = Duration::from_millis(1000 / TICK_RATE as u64);

/// Where the engine is in its tick cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnginePhase {
    /// No tick has run yet.
    Idle,
    /// Waiting for a human to signal readiness.
    AwaitingIntents,
    /// Combat, movement and spawning are running.
    Resolving,
    /// The last tick completed.
    Advanced,
}

/// How AI-controlled bases produce units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpawnMode {
    /// Spend the per-tick budget through the spawn strategy.
    #[default]
    Budget,
    /// One random unit whenever the base cooldown runs out.
    Cooldown,
}

/// Result of one call to [`TickEngine::step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepOutcome {
    /// The tick counter advanced.
    pub progressed: bool,
    /// Both bases are still alive.
    pub running: bool,
}

/// The locally controlled team in human-in-the-loop play.
#[derive(Debug, Clone)]
struct HumanSeat {
    ready: bool,
    turn: PlayerTurn,
}

/// Who decides for each team during one tick.
enum Deciders<'a> {
    /// Scripted policies, or the human seat for its team.
    Local,
    /// Lockstep intents for both teams.
    Lockstep(&'a mut PerTeam<QueuedIntents>),
}

/// Which recruits each team spawns this tick.
enum Production<'a> {
    /// AI teams use the strategy; the human team spawns its queue.
    Local,
    /// Both teams spawn exactly these recruits.
    Lockstep(&'a PerTeam<TeamOrders>),
}

/// The deterministic tick engine.
///
/// # Tick order
///
/// 1. **Occupancy** rebuilt from unit positions
/// 2. **Visibility** recomputed for both teams, explored memory merged
/// 3. **Gate** closed while a human has not signalled readiness
/// 4. **Intents** gathered, one action per live unit
/// 5. **Combat** resolved simultaneously, dead units removed
/// 6. **Movement** arbitrated in micro-steps
/// 7. **Spawning** at both bases
/// 8. **Tick** counter advanced
pub struct TickEngine {
    state: GameState,
    balance: BalanceTable,
    phase: EnginePhase,
    tiebreak: TieBreak,
    policies: PerTeam<Box<dyn DecisionSource>>,
    spawn_strategy: Box<dyn SpawnStrategy>,
    spawn_mode: SpawnMode,
    human: Option<HumanSeat>,
}

impl fmt::Debug for TickEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TickEngine")
            .field("tick", &self.state.tick)
            .field("phase", &self.phase)
            .field("spawn_mode", &self.spawn_mode)
            .field("human", &self.human.as_ref().map(|h| h.turn.team()))
            .finish_non_exhaustive()
    }
}

impl TickEngine {
    /// Create an engine for local play with seeded tie-breaking.
    #[must_use]
    pub fn new(state: GameState, balance: BalanceTable, seed: u64) -> Self {
        Self {
            state,
            balance,
            phase: EnginePhase::Idle,
            tiebreak: TieBreak::seeded(seed),
            policies: PerTeam::new(Box::new(ScriptedPolicy::new()), Box::new(ScriptedPolicy::new())),
            spawn_strategy: Box::new(RandomSpawnStrategy),
            spawn_mode: SpawnMode::Budget,
            human: None,
        }
    }

    /// Create an engine whose every tie-break is seed-free.
    #[must_use]
    pub fn deterministic(state: GameState, balance: BalanceTable) -> Self {
        Self {
            tiebreak: TieBreak::Deterministic,
            ..Self::new(state, balance, 0)
        }
    }

    /// Create an engine from a match config.
    ///
    /// # Errors
    ///
    /// Returns whatever [`MatchConfig::initial_state`] reports.
    pub fn from_config(config: &MatchConfig) -> Result<Self> {
        let state = config.initial_state()?;
        Ok(Self::new(state, config.balance.clone(), config.seed))
    }

    /// Replace one team's decision source.
    #[must_use]
    pub fn with_policy(mut self, team: Team, policy: Box<dyn DecisionSource>) -> Self {
        *self.policies.get_mut(team) = policy;
        self
    }

    /// Replace the AI spawn strategy.
    #[must_use]
    pub fn with_spawn_strategy(mut self, strategy: Box<dyn SpawnStrategy>) -> Self {
        self.spawn_strategy = strategy;
        self
    }

    /// Select how AI bases produce units.
    #[must_use]
    pub fn with_spawn_mode(mut self, mode: SpawnMode) -> Self {
        self.spawn_mode = mode;
        self
    }

    /// Replace the tie-break source.
    #[must_use]
    pub fn with_tiebreak(mut self, tiebreak: TieBreak) -> Self {
        self.tiebreak = tiebreak;
        self
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> &GameState {
        &self.state
    }

    /// Balance table in use.
    #[must_use]
    pub const fn balance(&self) -> &BalanceTable {
        &self.balance
    }

    /// Completed ticks.
    #[must_use]
    pub const fn tick(&self) -> u64 {
        self.state.tick
    }

    /// Current phase.
    #[must_use]
    pub const fn phase(&self) -> EnginePhase {
        self.phase
    }

    /// Cells `team` saw during the last tick.
    #[must_use]
    pub const fn visible_cells(&self, team: Team) -> &BTreeSet<Coord> {
        self.state.visible(team)
    }

    /// Checksum of the current state.
    #[must_use]
    pub fn checksum(&self) -> String {
        self.state.checksum()
    }

    /// Refresh occupancy and visibility without advancing.
    ///
    /// Planning UIs call this before the first tick so the human team
    /// knows the cells around its base.
    pub fn refresh_visibility(&mut self) {
        self.state.units.rebuild_occupancy();
        visibility::update(&mut self.state);
    }

    // --- Human-in-the-loop -------------------------------------------------

    /// Put `team` under local human control, or return both teams to the
    /// scripted policies with `None`.
    pub fn set_human_team(&mut self, team: Option<Team>) {
        self.human = team.map(|team| {
            let mut turn = PlayerTurn::new(team);
            turn.start(&self.state);
            HumanSeat { ready: false, turn }
        });
        if self.human.is_some() {
            self.phase = EnginePhase::AwaitingIntents;
        }
        tracing::info!(team = ?team, "Human team set");
    }

    /// The human team, if any.
    #[must_use]
    pub fn human_team(&self) -> Option<Team> {
        self.human.as_ref().map(|h| h.turn.team())
    }

    /// Open the gate for the next tick.
    pub fn signal_ready(&mut self) {
        if let Some(seat) = &mut self.human {
            seat.ready = true;
        }
    }

    /// The human's planning buffer.
    #[must_use]
    pub fn player_turn(&self) -> Option<&PlayerTurn> {
        self.human.as_ref().map(|h| &h.turn)
    }

    /// Queue a recruit for the human team.
    pub fn queue_recruit(&mut self, kind: UnitKind, pos: Coord) -> bool {
        match &mut self.human {
            Some(seat) => seat.turn.queue_recruit(&self.state, kind, pos, &self.balance),
            None => false,
        }
    }

    /// Undo the human team's last recruit.
    pub fn undo_last_recruit(&mut self) -> Option<Recruit> {
        let seat = self.human.as_mut()?;
        seat.turn.undo_last_recruit(&self.balance)
    }

    /// Set an action for one of the human team's units.
    pub fn set_unit_action(&mut self, unit_id: UnitId, action: Action) -> bool {
        let Some(seat) = &mut self.human else {
            return false;
        };
        match self.state.units.get(unit_id) {
            Some(unit) if unit.team == seat.turn.team() => {
                seat.turn.set_unit_action(unit_id, action);
                true
            }
            _ => false,
        }
    }

    /// Known path for a unit, for `move_path` previews. Empty if none.
    #[must_use]
    pub fn preview_path(&self, unit_id: UnitId, target: Coord) -> Vec<Coord> {
        self.state
            .units
            .get(unit_id)
            .map(|unit| pathfinding::preview_path(&self.state, unit, target))
            .unwrap_or_default()
    }

    // --- Ticking -----------------------------------------------------------

    /// Advance one tick.
    ///
    /// With a human team that has not signalled readiness the tick does
    /// not advance and queued intents are kept. Once a base has fallen the
    /// engine no longer advances.
    pub fn step(&mut self) -> StepOutcome {
        if !self.state.is_running() {
            return self.outcome(false);
        }

        // 1-2. Occupancy and visibility
        self.refresh_visibility();

        // 3. Gate
        if self.human.as_ref().is_some_and(|h| !h.ready) {
            self.phase = EnginePhase::AwaitingIntents;
            return self.outcome(false);
        }

        // 4. Intents
        let actions = self.gather(Deciders::Local);

        // 5-7. Combat, movement, spawning
        let mut tiebreak = std::mem::replace(&mut self.tiebreak, TieBreak::Deterministic);
        self.resolve(&actions, &mut tiebreak, Production::Local);
        self.tiebreak = tiebreak;

        // 8. Advance
        self.finish_tick();
        self.restart_planning();
        self.outcome(true)
    }

    /// Advance one lockstep tick with both teams' decoded orders.
    ///
    /// Runs the same pipeline as [`step`](Self::step) but takes every
    /// intent and recruit from `orders` and breaks every tie in fixed
    /// order, so peers holding equal states stay equal.
    pub fn apply_turn(&mut self, orders: &PerTeam<TeamOrders>) -> StepOutcome {
        if !self.state.is_running() {
            return self.outcome(false);
        }

        self.refresh_visibility();

        let mut intents = PerTeam::new(
            QueuedIntents::from_orders(Team::A, &orders.a),
            QueuedIntents::from_orders(Team::B, &orders.b),
        );
        let actions = self.gather(Deciders::Lockstep(&mut intents));

        self.resolve(&actions, &mut TieBreak::Deterministic, Production::Lockstep(orders));

        self.finish_tick();
        self.restart_planning();
        self.outcome(true)
    }

    /// Close the gate and hand the human a fresh planning buffer.
    fn restart_planning(&mut self) {
        if let Some(seat) = &mut self.human {
            seat.ready = false;
            seat.turn.start(&self.state);
            self.phase = EnginePhase::AwaitingIntents;
        }
    }

    fn outcome(&self, progressed: bool) -> StepOutcome {
        StepOutcome {
            progressed,
            running: self.state.is_running(),
        }
    }

    /// One action per live unit, in storage order.
    fn gather(&mut self, mut deciders: Deciders<'_>) -> Vec<(UnitId, Action)> {
        self.phase = EnginePhase::Resolving;
        let mut intel = Intel::default();
        let mut actions = Vec::with_capacity(self.state.units.len());

        for unit in self.state.units.iter() {
            let source: &mut dyn DecisionSource = match &mut deciders {
                Deciders::Lockstep(intents) => intents.get_mut(unit.team),
                Deciders::Local => match &mut self.human {
                    Some(seat) if seat.turn.team() == unit.team => &mut seat.turn,
                    _ => &mut **self.policies.get_mut(unit.team),
                },
            };
            let action = source.decide(unit, &self.state, &mut intel);
            tracing::trace!(
                tick = self.state.tick,
                unit_id = unit.id,
                action = action.kind_name(),
                "Intent"
            );
            actions.push((unit.id, action));
        }

        intel.apply(&mut self.state);
        actions
    }

    fn resolve(
        &mut self,
        actions: &[(UnitId, Action)],
        tiebreak: &mut TieBreak,
        production: Production<'_>,
    ) {
        let report = combat::resolve(&mut self.state, actions);
        if !report.is_empty() {
            tracing::debug!(
                tick = self.state.tick,
                targets = report.damage.len(),
                killed = report.killed.len(),
                "Combat resolved"
            );
        }

        movement::resolve(&mut self.state, actions, tiebreak);

        match production {
            Production::Lockstep(orders) => {
                for team in Team::ALL {
                    spawn::spawn_recruits(&mut self.state, team, &orders.get(team).recruits, &self.balance);
                }
            }
            Production::Local => {
                let human = self.human.as_ref().map(|h| (h.turn.team(), h.turn.recruits().to_vec()));
                for team in Team::ALL {
                    match &human {
                        Some((human_team, recruits)) if *human_team == team => {
                            spawn::spawn_recruits(&mut self.state, team, recruits, &self.balance);
                        }
                        _ => self.spawn_ai(team, tiebreak),
                    }
                }
            }
        }
    }

    fn spawn_ai(&mut self, team: Team, tiebreak: &mut TieBreak) {
        match self.spawn_mode {
            SpawnMode::Budget => {
                spawn::spawn_from_base(
                    &mut self.state,
                    team,
                    self.spawn_strategy.as_mut(),
                    &self.balance,
                    tiebreak,
                );
            }
            SpawnMode::Cooldown => {
                spawn::spawn_with_cooldown(&mut self.state, team, &self.balance, tiebreak);
            }
        }
    }

    fn finish_tick(&mut self) {
        self.state.units.rebuild_occupancy();
        self.state.tick += 1;
        self.phase = EnginePhase::Advanced;

        #[cfg(feature = "debug-validation")]
        self.validate();

        let alive: BTreeSet<UnitId> = self.state.units.iter().map(|u| u.id).collect();
        self.policies.a.retain_units(&alive);
        self.policies.b.retain_units(&alive);

        if tracing::enabled!(tracing::Level::DEBUG) {
            tracing::debug!(
                tick = self.state.tick,
                units = self.state.units.len(),
                checksum = %self.state.checksum(),
                "Tick complete"
            );
        }
        if !self.state.is_running() {
            tracing::info!(tick = self.state.tick, outcome = ?self.state.winner(), "Match over");
        }
    }

    /// Panics if a unit stands off the map, on an impassable cell or on
    /// another unit's cell.
    #[cfg(feature = "debug-validation")]
    fn validate(&self) {
        let mut seen = BTreeSet::new();
        for unit in self.state.units.iter() {
            assert!(
                self.state.map.can_walk(unit.pos),
                "unit {} on unwalkable cell {}",
                unit.id,
                unit.pos
            );
            assert!(seen.insert(unit.pos), "two units share cell {}", unit.pos);
        }
    }
}

/// Lock-guarded engine shared between the tick thread and readers.
///
/// Readers take consistent snapshots between ticks; only the tick thread
/// should call [`step`](Self::step).
#[derive(Debug, Clone)]
pub struct SharedEngine {
    inner: Arc<Mutex<TickEngine>>,
}

impl SharedEngine {
    /// Wrap an engine.
    #[must_use]
    pub fn new(engine: TickEngine) -> Self {
        Self {
            inner: Arc::new(Mutex::new(engine)),
        }
    }

    /// Lock the engine. A poisoned lock is recovered; the engine never
    /// holds a partially applied tick across a panic boundary.
    pub fn lock(&self) -> MutexGuard<'_, TickEngine> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Advance one tick under the lock.
    pub fn step(&self) -> StepOutcome {
        self.lock().step()
    }

    /// Copy of the current state.
    #[must_use]
    pub fn snapshot(&self) -> GameState {
        self.lock().state().clone()
    }

    /// Copy of a team's visible cells.
    #[must_use]
    pub fn visible_cells(&self, team: Team) -> BTreeSet<Coord> {
        self.lock().visible_cells(team).clone()
    }

    /// Run a closure with exclusive access.
    pub fn with<R>(&self, f: impl FnOnce(&mut TickEngine) -> R) -> R {
        f(&mut self.lock())
    }
}

/// Spawn the tick thread.
///
/// The thread steps the engine every `interval` until `running` is
/// cleared, the match ends, or `max_ticks` ticks have completed. It
/// returns the final tick count.
pub fn run_tick_thread(
    engine: SharedEngine,
    running: Arc<AtomicBool>,
    max_ticks: Option<u64>,
    interval: Duration,
) -> JoinHandle<u64> {
    thread::spawn(move || {
        while running.load(Ordering::Acquire) {
            let outcome = engine.step();
            let tick = engine.lock().tick();
            if !outcome.running || max_ticks.is_some_and(|max| tick >= max) {
                break;
            }
            if !interval.is_zero() {
                thread::sleep(interval);
            }
        }
        running.store(false, Ordering::Release);
        engine.lock().tick()
    })
}
