//! Match authority.
//!
//! [`Authority`] is the relay's state machine with no I/O of its own: the
//! transport feeds it connections, messages and disconnects, and sends
//! whatever [`Outbound`] messages it returns.
//!
//! The authority never simulates. It assigns seats, starts the match,
//! holds each team's committed turn until both are in, compares the
//! checksums and releases the merged turn.

use std::time::{SystemTime, UNIX_EPOCH};

use skirmish_core::components::{PerTeam, Team};
use skirmish_core::config::MatchConfig;

use crate::error::{NetError, Result};
use crate::protocol::{Message, WireEntry};

/// A message to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// To one team.
    To(Team, Message),
    /// To every connected team.
    Broadcast(Message),
}

/// Authority lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LobbyPhase {
    /// Fewer than two peers connected.
    Waiting,
    /// Both peers connected, turns are being relayed.
    Running,
    /// Checksums diverged; no further turns are released.
    Desynced,
    /// A peer left.
    Ended,
}

/// An occupied seat.
///
/// `id` is unique per connection, so a late close from a previous
/// occupant of the same team is told apart from the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Seat {
    /// Team assigned to the connection.
    pub team: Team,
    /// Connection id.
    pub id: u64,
}

/// A committed, not yet released turn.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Committed {
    entries: Vec<WireEntry>,
    checksum: Option<String>,
}

/// The relay state machine.
#[derive(Debug)]
pub struct Authority {
    config: MatchConfig,
    phase: LobbyPhase,
    connected: PerTeam<Option<u64>>,
    next_seat_id: u64,
    committed: PerTeam<Option<Committed>>,
    turns_released: u64,
}

impl Authority {
    /// New lobby for `config`; the first peer gets `config.host_team`.
    #[must_use]
    pub fn new(config: MatchConfig) -> Self {
        Self {
            config,
            phase: LobbyPhase::Waiting,
            connected: PerTeam::default(),
            next_seat_id: 0,
            committed: PerTeam::default(),
            turns_released: 0,
        }
    }

    /// Current phase.
    #[must_use]
    pub const fn phase(&self) -> LobbyPhase {
        self.phase
    }

    /// Turns released so far.
    #[must_use]
    pub const fn turns_released(&self) -> u64 {
        self.turns_released
    }

    /// Whether `seat` is still the current occupant of its team.
    #[must_use]
    pub fn is_seated(&self, seat: Seat) -> bool {
        *self.connected.get(seat.team) == Some(seat.id)
    }

    /// Whether `team` has a committed turn waiting.
    #[must_use]
    pub fn has_committed(&self, team: Team) -> bool {
        self.committed.get(team).is_some()
    }

    /// Seat a new peer.
    ///
    /// The first peer gets the host team, the second the other team, and
    /// the second connection also starts the match.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Refused`] once both seats are taken or the
    /// match is over.
    pub fn connect(&mut self) -> Result<(Seat, Vec<Outbound>)> {
        if self.phase != LobbyPhase::Waiting {
            return Err(NetError::Refused(format!("match is {:?}", self.phase)));
        }
        let host = self.config.host_team;
        let team = [host, host.opponent()]
            .into_iter()
            .find(|t| self.connected.get(*t).is_none())
            .ok_or_else(|| NetError::Refused("both seats are taken".into()))?;

        let seat = Seat {
            team,
            id: self.next_seat_id,
        };
        self.next_seat_id += 1;
        *self.connected.get_mut(team) = Some(seat.id);
        tracing::info!(%team, seat = seat.id, "Peer assigned");

        let mut out = vec![Outbound::To(team, Message::Assign { team })];
        if self.connected.a.is_some() && self.connected.b.is_some() {
            self.phase = LobbyPhase::Running;
            tracing::info!("Both peers present, starting match");
            out.push(Outbound::Broadcast(Message::Start {
                config: Box::new(self.config.clone()),
            }));
        }
        Ok((seat, out))
    }

    /// Handle a message from `team`.
    pub fn handle(&mut self, team: Team, message: Message) -> Vec<Outbound> {
        match message {
            Message::Actions { data, checksum } => self.commit(team, data, checksum),
            Message::CancelTurn => {
                if self.committed.get_mut(team).take().is_some() {
                    tracing::info!(%team, "Turn cancelled");
                }
                Vec::new()
            }
            other => {
                tracing::warn!(%team, message = other.type_name(), "Ignoring peer message");
                Vec::new()
            }
        }
    }

    /// A peer's connection closed. Closes from a connection that no
    /// longer holds its seat are ignored.
    pub fn disconnect(&mut self, seat: Seat) -> Vec<Outbound> {
        if !self.is_seated(seat) {
            tracing::debug!(team = %seat.team, seat = seat.id, "Stale disconnect ignored");
            return Vec::new();
        }
        let team = seat.team;
        *self.connected.get_mut(team) = None;
        *self.committed.get_mut(team) = None;
        match self.phase {
            LobbyPhase::Waiting => {
                tracing::info!(%team, "Peer left before start");
                return Vec::new();
            }
            LobbyPhase::Ended => {
                tracing::info!(%team, "Peer left after match end");
                return Vec::new();
            }
            LobbyPhase::Running | LobbyPhase::Desynced => {}
        }
        self.phase = LobbyPhase::Ended;
        tracing::error!(%team, "Peer disconnected, match over");
        vec![Outbound::Broadcast(Message::Disconnect { team })]
    }

    fn commit(&mut self, team: Team, entries: Vec<WireEntry>, checksum: Option<String>) -> Vec<Outbound> {
        if self.phase != LobbyPhase::Running {
            tracing::warn!(%team, phase = ?self.phase, "Turn outside a running match ignored");
            return Vec::new();
        }
        *self.committed.get_mut(team) = Some(Committed { entries, checksum });
        tracing::debug!(%team, "Turn committed");

        if self.committed.a.is_none() || self.committed.b.is_none() {
            return Vec::new();
        }
        let (Some(a), Some(b)) = (self.committed.a.take(), self.committed.b.take()) else {
            return Vec::new();
        };

        match (&a.checksum, &b.checksum) {
            (Some(ca), Some(cb)) if ca != cb => {
                self.phase = LobbyPhase::Desynced;
                tracing::error!(turn = self.turns_released, a = %ca, b = %cb, "Desync detected");
                return vec![Outbound::Broadcast(Message::Desync {
                    checksums: PerTeam::new(Some(ca.clone()), Some(cb.clone())),
                })];
            }
            (Some(checksum), Some(_)) => {
                tracing::debug!(turn = self.turns_released, %checksum, "Checksums match");
            }
            _ => {
                tracing::warn!(
                    turn = self.turns_released,
                    a = ?a.checksum,
                    b = ?b.checksum,
                    "Missing checksum, accepting turn"
                );
            }
        }

        self.turns_released += 1;
        tracing::info!(turn = self.turns_released, "Releasing turn");
        vec![Outbound::Broadcast(Message::TurnData {
            actions: PerTeam::new(a.entries, b.entries),
            timestamp: now_millis(),
        })]
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;
    use skirmish_core::unit_kind::UnitKind;

    fn actions(checksum: Option<&str>) -> Message {
        Message::Actions {
            data: vec![WireEntry::Recruit { unit_type: UnitKind::Scout, pos: [2, 1] }],
            checksum: checksum.map(str::to_string),
        }
    }

    fn running() -> Authority {
        running_with_seats().0
    }

    fn running_with_seats() -> (Authority, Seat, Seat) {
        let mut lobby = Authority::new(MatchConfig::default());
        let (a, _) = lobby.connect().unwrap();
        let (b, _) = lobby.connect().unwrap();
        (lobby, a, b)
    }

    #[test]
    fn test_seats_and_start() {
        let mut lobby = Authority::new(MatchConfig {
            host_team: Team::B,
            ..MatchConfig::default()
        });
        let (first, out) = lobby.connect().unwrap();
        assert_eq!(first.team, Team::B);
        assert_eq!(out, vec![Outbound::To(Team::B, Message::Assign { team: Team::B })]);

        let (second, out) = lobby.connect().unwrap();
        assert_eq!(second.team, Team::A);
        assert_ne!(second.id, first.id);
        assert_eq!(out.len(), 2);
        assert!(matches!(&out[1], Outbound::Broadcast(Message::Start { .. })));
        assert_eq!(lobby.phase(), LobbyPhase::Running);

        assert!(matches!(lobby.connect(), Err(NetError::Refused(_))));
    }

    #[test]
    fn test_turn_released_when_both_commit() {
        let mut lobby = running();
        assert!(lobby.handle(Team::A, actions(Some("abc123"))).is_empty());
        assert!(lobby.has_committed(Team::A));
        let out = lobby.handle(Team::B, actions(Some("abc123")));
        assert_eq!(out.len(), 1);
        let Outbound::Broadcast(Message::TurnData { actions, timestamp }) = &out[0] else {
            panic!("expected turn_data, got {out:?}");
        };
        assert_eq!(actions.a.len(), 1);
        assert_eq!(actions.b.len(), 1);
        assert!(*timestamp > 0);
        assert_eq!(lobby.turns_released(), 1);
        assert!(!lobby.has_committed(Team::A));
    }

    #[test]
    fn test_mismatched_checksums_broadcast_desync() {
        let mut lobby = running();
        lobby.handle(Team::A, actions(Some("abc123")));
        let out = lobby.handle(Team::B, actions(Some("def456")));
        assert_eq!(
            out,
            vec![Outbound::Broadcast(Message::Desync {
                checksums: PerTeam::new(Some("abc123".into()), Some("def456".into())),
            })]
        );
        assert_eq!(lobby.phase(), LobbyPhase::Desynced);
        assert_eq!(lobby.turns_released(), 0);

        lobby.handle(Team::A, actions(Some("abc123")));
        assert!(lobby.handle(Team::B, actions(Some("abc123"))).is_empty());
    }

    #[test]
    fn test_missing_checksum_accepted() {
        let mut lobby = running();
        lobby.handle(Team::A, actions(None));
        let out = lobby.handle(Team::B, actions(Some("def456")));
        assert!(matches!(&out[0], Outbound::Broadcast(Message::TurnData { .. })));
    }

    #[test]
    fn test_cancel_withdraws_turn() {
        let mut lobby = running();
        lobby.handle(Team::A, actions(Some("abc123")));
        lobby.handle(Team::A, Message::CancelTurn);
        assert!(!lobby.has_committed(Team::A));
        assert!(lobby.handle(Team::B, actions(Some("abc123"))).is_empty());

        let recommit = Message::Actions { data: vec![], checksum: Some("abc123".into()) };
        let out = lobby.handle(Team::A, recommit);
        let Outbound::Broadcast(Message::TurnData { actions, .. }) = &out[0] else {
            panic!("expected turn_data");
        };
        assert!(actions.a.is_empty());
    }

    #[test]
    fn test_disconnect_is_broadcast_and_final() {
        let (mut lobby, a, b) = running_with_seats();
        let out = lobby.disconnect(a);
        assert_eq!(out, vec![Outbound::Broadcast(Message::Disconnect { team: Team::A })]);
        assert_eq!(lobby.phase(), LobbyPhase::Ended);
        assert!(lobby.disconnect(a).is_empty());
        assert!(lobby.disconnect(b).is_empty());
        assert!(!lobby.is_seated(b));
        assert!(lobby.connect().is_err());
        assert!(lobby.handle(Team::B, actions(None)).is_empty());
    }

    #[test]
    fn test_leaving_before_start_frees_seat() {
        let mut lobby = Authority::new(MatchConfig::default());
        let (seat, _) = lobby.connect().unwrap();
        assert!(lobby.disconnect(seat).is_empty());
        let (again, _) = lobby.connect().unwrap();
        assert_eq!(again.team, seat.team);
    }

    #[test]
    fn test_stale_close_keeps_new_occupant() {
        let mut lobby = Authority::new(MatchConfig::default());
        let (old, _) = lobby.connect().unwrap();
        assert!(lobby.disconnect(old).is_empty());
        let (new, _) = lobby.connect().unwrap();
        assert_eq!(new.team, old.team);

        assert!(lobby.disconnect(old).is_empty());
        assert!(lobby.is_seated(new));
        assert!(!lobby.is_seated(old));

        let (other, out) = lobby.connect().unwrap();
        assert_eq!(other.team, old.team.opponent());
        assert!(matches!(out.last(), Some(Outbound::Broadcast(Message::Start { .. }))));
        assert_eq!(lobby.phase(), LobbyPhase::Running);
    }
}
