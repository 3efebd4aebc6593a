//! Peer state machine.
//!
//! [`LockstepPeer`] owns the local engine and turns authority messages
//! into engine calls. It does no I/O: the caller feeds it messages from a
//! [`PeerConnection`](crate::client::PeerConnection) and sends back what
//! [`commit`](LockstepPeer::commit) and [`cancel`](LockstepPeer::cancel)
//! return.

use std::fmt;

use skirmish_core::action::{Action, Recruit};
use skirmish_core::components::{Team, UnitId};
use skirmish_core::hex::Coord;
use skirmish_core::replay::TurnLog;
use skirmish_core::simulation::TickEngine;
use skirmish_core::state::MatchOutcome;
use skirmish_core::tiebreak::TieBreak;
use skirmish_core::unit_kind::UnitKind;

use crate::error::{NetError, Result};
use crate::protocol::{self, Message};

/// Where the peer is in the match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerPhase {
    /// Connected, no seat yet.
    Connecting,
    /// Seated, waiting for `start`.
    Assigned(Team),
    /// Building this turn's orders.
    PlanningTurn,
    /// Orders committed, waiting for `turn_data`.
    WaitingForServer,
    /// Checksums diverged.
    Desynced,
    /// The opponent left.
    Disconnected,
    /// A base has fallen.
    Finished,
}

impl fmt::Display for PeerPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connecting => write!(f, "connecting"),
            Self::Assigned(team) => write!(f, "assigned({team})"),
            Self::PlanningTurn => write!(f, "planning_turn"),
            Self::WaitingForServer => write!(f, "waiting_for_server"),
            Self::Desynced => write!(f, "desynced"),
            Self::Disconnected => write!(f, "disconnected"),
            Self::Finished => write!(f, "finished"),
        }
    }
}

/// What a handled message changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerEvent {
    /// Seat assigned.
    Assigned(Team),
    /// Engine built, planning the first turn.
    Started,
    /// A turn was applied.
    TurnApplied {
        /// Tick the turn was applied at.
        tick: u64,
        /// Checksum after the turn.
        checksum: String,
    },
    /// A base fell during the applied turn.
    MatchOver(MatchOutcome),
    /// The authority reported diverging checksums.
    Desynced,
    /// A team left the match.
    OpponentLeft(Team),
}

/// Client side of a lockstep match.
#[derive(Debug)]
pub struct LockstepPeer {
    phase: PeerPhase,
    team: Option<Team>,
    engine: Option<TickEngine>,
    log: Option<TurnLog>,
}

impl Default for LockstepPeer {
    fn default() -> Self {
        Self::new()
    }
}

impl LockstepPeer {
    /// A peer that has not been seated.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            phase: PeerPhase::Connecting,
            team: None,
            engine: None,
            log: None,
        }
    }

    /// Current phase.
    #[must_use]
    pub const fn phase(&self) -> PeerPhase {
        self.phase
    }

    /// Assigned team.
    #[must_use]
    pub const fn team(&self) -> Option<Team> {
        self.team
    }

    /// Local engine, once the match has started.
    #[must_use]
    pub const fn engine(&self) -> Option<&TickEngine> {
        self.engine.as_ref()
    }

    /// Turns applied so far, for replays.
    #[must_use]
    pub const fn turn_log(&self) -> Option<&TurnLog> {
        self.log.as_ref()
    }

    /// Hand over the turn log.
    pub fn take_turn_log(&mut self) -> Option<TurnLog> {
        self.log.take()
    }

    /// Handle a message from the authority.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::UnexpectedMessage`] for messages the current
    /// phase cannot accept and [`NetError::Game`] if the starting state
    /// cannot be built.
    pub fn handle(&mut self, message: Message) -> Result<PeerEvent> {
        match (self.phase, message) {
            (PeerPhase::Connecting, Message::Assign { team }) => {
                self.team = Some(team);
                self.phase = PeerPhase::Assigned(team);
                tracing::info!(%team, "Assigned");
                Ok(PeerEvent::Assigned(team))
            }
            (PeerPhase::Assigned(team), Message::Start { config }) => {
                let mut engine = TickEngine::from_config(&config)?.with_tiebreak(TieBreak::Deterministic);
                engine.set_human_team(Some(team));
                engine.refresh_visibility();
                self.log = Some(TurnLog::new(engine.state(), engine.balance())?);
                self.engine = Some(engine);
                self.phase = PeerPhase::PlanningTurn;
                tracing::info!(%team, "Match started");
                Ok(PeerEvent::Started)
            }
            (PeerPhase::PlanningTurn | PeerPhase::WaitingForServer, Message::TurnData { actions, .. }) => {
                let engine = self.engine_mut()?;
                let orders = protocol::decode_turn(&actions, engine.state());
                let tick = engine.tick();
                engine.apply_turn(&orders);
                let checksum = engine.checksum();
                let running = engine.state().is_running();
                let outcome = engine.state().winner();
                engine.refresh_visibility();

                if let Some(log) = &mut self.log {
                    log.record(tick, checksum.clone(), orders);
                }
                tracing::debug!(tick, %checksum, "Turn applied");

                if running {
                    self.phase = PeerPhase::PlanningTurn;
                    Ok(PeerEvent::TurnApplied { tick, checksum })
                } else {
                    self.phase = PeerPhase::Finished;
                    tracing::info!(?outcome, "Match over");
                    Ok(PeerEvent::MatchOver(outcome))
                }
            }
            (_, Message::Desync { checksums }) => {
                self.phase = PeerPhase::Desynced;
                tracing::error!(a = ?checksums.a, b = ?checksums.b, "Desync reported by authority");
                Ok(PeerEvent::Desynced)
            }
            (_, Message::Disconnect { team }) => {
                self.phase = PeerPhase::Disconnected;
                tracing::warn!(%team, "Opponent disconnected");
                Ok(PeerEvent::OpponentLeft(team))
            }
            (phase, other) => Err(NetError::UnexpectedMessage {
                message: other.type_name(),
                phase: phase.to_string(),
            }),
        }
    }

    /// Queue a recruit while planning.
    pub fn queue_recruit(&mut self, kind: UnitKind, pos: Coord) -> bool {
        self.planning_engine()
            .is_some_and(|engine| engine.queue_recruit(kind, pos))
    }

    /// Undo the last queued recruit while planning.
    pub fn undo_last_recruit(&mut self) -> Option<Recruit> {
        self.planning_engine()?.undo_last_recruit()
    }

    /// Set an own unit's action while planning.
    pub fn set_unit_action(&mut self, unit_id: UnitId, action: Action) -> bool {
        self.planning_engine()
            .is_some_and(|engine| engine.set_unit_action(unit_id, action))
    }

    /// Known path preview for an own unit.
    #[must_use]
    pub fn preview_path(&self, unit_id: UnitId, target: Coord) -> Vec<Coord> {
        self.engine
            .as_ref()
            .map(|engine| engine.preview_path(unit_id, target))
            .unwrap_or_default()
    }

    /// Commit the planned turn. The returned `actions` message carries
    /// the checksum of the state the turn will be applied to.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::UnexpectedMessage`] outside planning.
    pub fn commit(&mut self) -> Result<Message> {
        if self.phase != PeerPhase::PlanningTurn {
            return Err(NetError::UnexpectedMessage {
                message: "actions",
                phase: self.phase.to_string(),
            });
        }
        let engine = self.engine_mut()?;
        let data = engine
            .player_turn()
            .map(|turn| protocol::encode_orders(&turn.to_orders(engine.state()), engine.state()))
            .unwrap_or_default();
        let checksum = engine.checksum();
        tracing::debug!(entries = data.len(), %checksum, "Turn committed");
        self.phase = PeerPhase::WaitingForServer;
        Ok(Message::Actions {
            data,
            checksum: Some(checksum),
        })
    }

    /// Withdraw a committed turn and go back to planning. The local plan
    /// is kept. `None` unless a turn is waiting.
    pub fn cancel(&mut self) -> Option<Message> {
        if self.phase != PeerPhase::WaitingForServer {
            return None;
        }
        self.phase = PeerPhase::PlanningTurn;
        tracing::debug!("Turn cancelled");
        Some(Message::CancelTurn)
    }

    fn planning_engine(&mut self) -> Option<&mut TickEngine> {
        if self.phase == PeerPhase::PlanningTurn {
            self.engine.as_mut()
        } else {
            None
        }
    }

    fn engine_mut(&mut self) -> Result<&mut TickEngine> {
        let phase = self.phase.to_string();
        self.engine.as_mut().ok_or(NetError::UnexpectedMessage {
            message: "turn_data",
            phase,
        })
    }
}
