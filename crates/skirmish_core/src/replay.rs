//! Turn logs for replaying and auditing lockstep matches.
//!
//! A [`TurnLog`] stores the starting state and every turn's decoded orders
//! together with the checksum the recording peer reached afterwards.
//! Lockstep resolution is seed-free, so re-applying the orders to the
//! starting state must reproduce every checksum.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::action::TeamOrders;
use crate::balance::BalanceTable;
use crate::components::PerTeam;
use crate::error::{GameError, Result};
use crate::simulation::TickEngine;
use crate::state::GameState;

/// Turn log format version.
pub const REPLAY_VERSION: u32 = 1;

/// One applied turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnRecord {
    /// Tick the orders were applied at.
    pub tick: u64,
    /// State checksum after the turn.
    pub checksum: String,
    /// Both teams' orders.
    pub orders: PerTeam<TeamOrders>,
}

/// A recorded lockstep match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnLog {
    /// Format version.
    pub version: u32,
    /// Balance used for the match.
    pub balance: BalanceTable,
    /// Starting state as bincode.
    pub initial_state: Vec<u8>,
    /// Turns in application order.
    pub turns: Vec<TurnRecord>,
}

impl TurnLog {
    /// Start a log from the state before the first turn.
    ///
    /// # Errors
    ///
    /// Returns an error if the state cannot be encoded.
    pub fn new(initial: &GameState, balance: &BalanceTable) -> Result<Self> {
        Ok(Self {
            version: REPLAY_VERSION,
            balance: balance.clone(),
            initial_state: initial.to_bytes()?,
            turns: Vec::new(),
        })
    }

    /// Record a turn. `tick` is the tick the orders were applied at and
    /// `checksum` the state checksum afterwards.
    pub fn record(&mut self, tick: u64, checksum: impl Into<String>, orders: PerTeam<TeamOrders>) {
        self.turns.push(TurnRecord {
            tick,
            checksum: checksum.into(),
            orders,
        });
    }

    /// Recorded turns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// No turns recorded yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Decode the starting state.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::Replay`] on malformed bytes.
    pub fn initial_state(&self) -> Result<GameState> {
        GameState::from_bytes(&self.initial_state)
            .map_err(|e| GameError::Replay(format!("Bad initial state: {e}")))
    }

    /// Save to a file.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::Replay`] if encoding or writing fails.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let bytes = bincode::serialize(self)
            .map_err(|e| GameError::Replay(format!("Failed to serialize turn log: {e}")))?;
        std::fs::write(path.as_ref(), bytes)
            .map_err(|e| GameError::Replay(format!("Failed to write turn log: {e}")))?;
        tracing::debug!(path = %path.as_ref().display(), turns = self.turns.len(), "Turn log saved");
        Ok(())
    }

    /// Load from a file.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::Replay`] if reading or decoding fails or the
    /// version does not match.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let bytes = std::fs::read(path.as_ref())
            .map_err(|e| GameError::Replay(format!("Failed to read turn log: {e}")))?;
        let log: Self = bincode::deserialize(&bytes)
            .map_err(|e| GameError::Replay(format!("Failed to deserialize turn log: {e}")))?;

        if log.version != REPLAY_VERSION {
            return Err(GameError::Replay(format!(
                "Turn log version mismatch: expected {REPLAY_VERSION}, got {}",
                log.version
            )));
        }
        Ok(log)
    }
}

/// Re-applies a [`TurnLog`] turn by turn.
#[derive(Debug)]
pub struct ReplayPlayer {
    log: TurnLog,
    engine: TickEngine,
    next_turn: usize,
}

impl ReplayPlayer {
    /// Restore the starting state.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::Replay`] if the starting state cannot be
    /// decoded.
    pub fn new(log: TurnLog) -> Result<Self> {
        let state = log.initial_state()?;
        let engine = TickEngine::deterministic(state, log.balance.clone());
        Ok(Self {
            log,
            engine,
            next_turn: 0,
        })
    }

    /// Apply the next turn and return its record, or `None` at the end.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::DesyncDetected`] when the checksum after the
    /// turn differs from the recorded one.
    pub fn advance(&mut self) -> Result<Option<&TurnRecord>> {
        let Some(record) = self.log.turns.get(self.next_turn) else {
            return Ok(None);
        };
        self.engine.apply_turn(&record.orders);
        self.next_turn += 1;

        let local = self.engine.checksum();
        if local != record.checksum {
            tracing::error!(tick = record.tick, %local, remote = %record.checksum, "Replay diverged");
            return Err(GameError::DesyncDetected {
                tick: record.tick,
                local,
                remote: record.checksum.clone(),
            });
        }
        Ok(Some(record))
    }

    /// Replay every remaining turn and check each checksum.
    ///
    /// # Errors
    ///
    /// Returns the first [`GameError::DesyncDetected`].
    pub fn verify(&mut self) -> Result<()> {
        while self.advance()?.is_some() {}
        Ok(())
    }

    /// Turns applied so far.
    #[must_use]
    pub const fn turns_applied(&self) -> usize {
        self.next_turn
    }

    /// Every turn has been applied.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.next_turn >= self.log.turns.len()
    }

    /// The engine at the current position.
    #[must_use]
    pub const fn engine(&self) -> &TickEngine {
        &self.engine
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{Action, Recruit, UnitCommand};
    use crate::components::{Base, Team};
    use crate::hex::Coord;
    use crate::map::Map;
    use crate::unit_kind::UnitKind;

    fn start() -> GameState {
        GameState::new(
            Map::new(12, 8),
            Base::new(Team::A, Coord::new(1, 1), 500, 6),
            Base::new(Team::B, Coord::new(10, 6), 500, 6),
        )
    }

    fn turn(tick: u64) -> PerTeam<TeamOrders> {
        let mut orders = PerTeam::<TeamOrders>::default();
        if tick == 0 {
            orders.a.recruits.push(Recruit { kind: UnitKind::Scout, pos: Coord::new(2, 1) });
            orders.b.recruits.push(Recruit { kind: UnitKind::Infantry, pos: Coord::new(9, 6) });
        } else {
            orders.a.commands.push(UnitCommand {
                unit_id: 1,
                unit_pos: Coord::new(2, 1),
                action: Action::MoveTowards(Coord::new(9, 5)),
            });
        }
        orders
    }

    fn record_match(turns: u64) -> TurnLog {
        let balance = BalanceTable::default();
        let mut engine = TickEngine::deterministic(start(), balance.clone());
        let mut log = TurnLog::new(engine.state(), &balance).unwrap();
        for t in 0..turns {
            let orders = turn(t);
            let tick = engine.tick();
            engine.apply_turn(&orders);
            log.record(tick, engine.checksum(), orders);
        }
        log
    }

    #[test]
    fn test_replay_verifies() {
        let log = record_match(6);
        assert_eq!(log.len(), 6);
        let mut player = ReplayPlayer::new(log).unwrap();
        player.verify().unwrap();
        assert!(player.is_finished());
        assert_eq!(player.turns_applied(), 6);
        assert_eq!(player.engine().tick(), 6);
    }

    #[test]
    fn test_tampered_checksum_reports_desync() {
        let mut log = record_match(4);
        log.turns[2].checksum = "def456".to_string();
        let mut player = ReplayPlayer::new(log).unwrap();
        match player.verify() {
            Err(GameError::DesyncDetected { tick, remote, .. }) => {
                assert_eq!(tick, 2);
                assert_eq!(remote, "def456");
            }
            other => panic!("expected desync, got {other:?}"),
        }
        assert_eq!(player.turns_applied(), 3);
    }

    #[test]
    fn test_save_load() {
        let log = record_match(3);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("match.turns");
        log.save(&path).unwrap();
        let loaded = TurnLog::load(&path).unwrap();
        assert_eq!(loaded, log);
        assert_eq!(loaded.initial_state().unwrap(), start());
    }

    #[test]
    fn test_version_mismatch_rejected() {
        let mut log = record_match(1);
        log.version = REPLAY_VERSION + 1;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("future.turns");
        log.save(&path).unwrap();
        assert!(matches!(TurnLog::load(&path), Err(GameError::Replay(_))));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            TurnLog::load(dir.path().join("absent")),
            Err(GameError::Replay(_))
        ));
    }
}
