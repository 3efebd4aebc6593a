//! Wire protocol.
//!
//! Newline-delimited UTF-8 JSON, one [`Message`] per line, tagged by a
//! `type` field. Turn payloads are lists of [`WireEntry`] values, each
//! either a recruit request or a command for one of the sender's units.
//!
//! Commands name units by stable id (`unit_id`) and by position
//! (`unit_pos`). Peers that only send positions are still understood:
//! decoding falls back to the unit standing on `unit_pos`.

use serde::{Deserialize, Serialize};

use skirmish_core::action::{Action, Recruit, Target, TeamOrders, UnitCommand};
use skirmish_core::components::{PerTeam, Team, UnitId};
use skirmish_core::config::MatchConfig;
use skirmish_core::hex::Coord;
use skirmish_core::state::GameState;
use skirmish_core::unit_kind::UnitKind;

use crate::error::Result;

/// A cell on the wire: `[x, y]`.
pub type WireCell = [i32; 2];

const fn cell(c: Coord) -> WireCell {
    [c.x, c.y]
}

const fn coord(c: WireCell) -> Coord {
    Coord::new(c[0], c[1])
}

/// One protocol message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    /// Authority to peer: your team.
    Assign {
        /// Assigned team.
        team: Team,
    },
    /// Authority to both: the match begins.
    Start {
        /// Shared starting configuration.
        config: Box<MatchConfig>,
    },
    /// Peer to authority: my committed turn.
    Actions {
        /// Recruits and commands.
        data: Vec<WireEntry>,
        /// Checksum of the sender's state before the turn.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        checksum: Option<String>,
    },
    /// Peer to authority: withdraw my committed turn.
    CancelTurn,
    /// Authority to both: both teams' payloads for this turn.
    TurnData {
        /// Entries per team.
        actions: PerTeam<Vec<WireEntry>>,
        /// Unix epoch milliseconds.
        timestamp: u64,
    },
    /// Authority to both: the peers' checksums differ.
    Desync {
        /// Checksum reported by each team.
        checksums: PerTeam<Option<String>>,
    },
    /// Authority to the remaining peer: a team left.
    Disconnect {
        /// Team that disconnected.
        team: Team,
    },
}

impl Message {
    /// The `type` tag.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Assign { .. } => "assign",
            Self::Start { .. } => "start",
            Self::Actions { .. } => "actions",
            Self::CancelTurn => "cancel_turn",
            Self::TurnData { .. } => "turn_data",
            Self::Desync { .. } => "desync",
            Self::Disconnect { .. } => "disconnect",
        }
    }
}

/// Encode a message as one line, without the trailing newline.
///
/// # Errors
///
/// Returns [`NetError::Decode`](crate::error::NetError::Decode) if
/// serialization fails.
pub fn encode_line(message: &Message) -> Result<String> {
    Ok(serde_json::to_string(message)?)
}

/// Decode one line.
///
/// # Errors
///
/// Returns [`NetError::Decode`](crate::error::NetError::Decode) for
/// malformed JSON or unknown message types.
pub fn decode_line(line: &str) -> Result<Message> {
    Ok(serde_json::from_str(line.trim())?)
}

/// Action kind tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// Do nothing.
    Idle,
    /// Attack `target_id` or whatever stands on `target_pos`.
    Attack,
    /// Step towards `target_pos`.
    MoveTowards,
    /// Follow `target_path`.
    MovePath,
    /// Step to the first free neighbour.
    Wander,
}

/// An action on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireAction {
    /// Kind tag.
    pub kind: ActionKind,
    /// Target cell for moves and attacks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_pos: Option<WireCell>,
    /// Cell sequence for `move_path`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_path: Option<Vec<WireCell>>,
    /// Stable id of an attacked unit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_id: Option<UnitId>,
}

impl WireAction {
    const fn bare(kind: ActionKind) -> Self {
        Self {
            kind,
            target_pos: None,
            target_path: None,
            target_id: None,
        }
    }
}

/// One entry of a turn payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WireEntry {
    /// Recruit a unit on a cell.
    Recruit {
        /// Kind to recruit.
        unit_type: UnitKind,
        /// Cell to place it on.
        pos: WireCell,
    },
    /// Command one of the sender's units.
    Command {
        /// Stable id of the unit.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        unit_id: Option<UnitId>,
        /// Position of the unit when the turn was committed.
        unit_pos: WireCell,
        /// The action.
        action: WireAction,
    },
}

fn encode_action(action: &Action, state: &GameState) -> WireAction {
    match action {
        Action::Idle => WireAction::bare(ActionKind::Idle),
        Action::Wander => WireAction::bare(ActionKind::Wander),
        Action::MoveTowards(dest) => WireAction {
            target_pos: Some(cell(*dest)),
            ..WireAction::bare(ActionKind::MoveTowards)
        },
        Action::MovePath(path) => WireAction {
            target_path: Some(path.iter().copied().map(cell).collect()),
            ..WireAction::bare(ActionKind::MovePath)
        },
        Action::Attack(target) => WireAction {
            target_pos: state.target_pos(*target).map(cell),
            target_id: match target {
                Target::Unit(id) => Some(*id),
                Target::Base(_) => None,
            },
            ..WireAction::bare(ActionKind::Attack)
        },
    }
}

/// Encode one team's orders. Recruits come first, idle commands are left
/// out.
#[must_use]
pub fn encode_orders(orders: &TeamOrders, state: &GameState) -> Vec<WireEntry> {
    let recruits = orders.recruits.iter().map(|r| WireEntry::Recruit {
        unit_type: r.kind,
        pos: cell(r.pos),
    });
    let commands = orders
        .commands
        .iter()
        .filter(|c| c.action != Action::Idle)
        .map(|c| WireEntry::Command {
            unit_id: Some(c.unit_id),
            unit_pos: cell(c.unit_pos),
            action: encode_action(&c.action, state),
        });
    recruits.chain(commands).collect()
}

fn decode_action(action: &WireAction, state: &GameState) -> Action {
    match action.kind {
        ActionKind::Idle => Action::Idle,
        ActionKind::Wander => Action::Wander,
        ActionKind::MoveTowards => action
            .target_pos
            .map_or(Action::Idle, |c| Action::MoveTowards(coord(c))),
        ActionKind::MovePath => action.target_path.as_ref().map_or(Action::Idle, |path| {
            Action::MovePath(path.iter().copied().map(coord).collect())
        }),
        ActionKind::Attack => {
            if let Some(id) = action.target_id.filter(|id| state.units.contains(*id)) {
                return Action::Attack(Target::Unit(id));
            }
            let Some(pos) = action.target_pos.map(coord) else {
                return Action::Idle;
            };
            if let Some(unit) = state.units.at(pos) {
                Action::Attack(Target::Unit(unit.id))
            } else if let Some(team) = state.base_at(pos) {
                Action::Attack(Target::Base(team))
            } else {
                Action::Idle
            }
        }
    }
}

/// Decode one team's entries against the state both peers share before
/// the turn.
///
/// Commands for units that do not exist or belong to the other team are
/// dropped.
#[must_use]
pub fn decode_orders(team: Team, entries: &[WireEntry], state: &GameState) -> TeamOrders {
    let mut orders = TeamOrders::default();
    for entry in entries {
        match entry {
            WireEntry::Recruit { unit_type, pos } => orders.recruits.push(Recruit {
                kind: *unit_type,
                pos: coord(*pos),
            }),
            WireEntry::Command {
                unit_id,
                unit_pos,
                action,
            } => {
                let unit = unit_id
                    .and_then(|id| state.units.get(id))
                    .or_else(|| state.units.at(coord(*unit_pos)))
                    .filter(|u| u.team == team);
                let Some(unit) = unit else {
                    tracing::debug!(%team, ?unit_id, ?unit_pos, "Command for unknown unit dropped");
                    continue;
                };
                orders.commands.push(UnitCommand {
                    unit_id: unit.id,
                    unit_pos: unit.pos,
                    action: decode_action(action, state),
                });
            }
        }
    }
    orders
}

/// Decode both teams' entries of a `turn_data` message.
#[must_use]
pub fn decode_turn(actions: &PerTeam<Vec<WireEntry>>, state: &GameState) -> PerTeam<TeamOrders> {
    PerTeam::new(
        decode_orders(Team::A, &actions.a, state),
        decode_orders(Team::B, &actions.b, state),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use skirmish_core::balance::BalanceTable;
    use skirmish_core::components::Base;
    use skirmish_core::map::Map;

    fn state() -> GameState {
        let mut state = GameState::new(
            Map::new(10, 6),
            Base::new(Team::A, Coord::new(1, 1), 500, 6),
            Base::new(Team::B, Coord::new(8, 4), 500, 6),
        );
        let balance = BalanceTable::default();
        state.spawn_unit(Team::A, UnitKind::Infantry, Coord::new(3, 4), &balance);
        state.spawn_unit(Team::B, UnitKind::Archer, Coord::new(5, 4), &balance);
        state
    }

    #[test]
    fn test_message_shapes() {
        let line = encode_line(&Message::Assign { team: Team::B }).unwrap();
        assert_eq!(line, r#"{"type":"assign","team":"B"}"#);
        assert_eq!(encode_line(&Message::CancelTurn).unwrap(), r#"{"type":"cancel_turn"}"#);

        let desync = Message::Desync {
            checksums: PerTeam::new(Some("abc123".into()), Some("def456".into())),
        };
        assert_eq!(
            encode_line(&desync).unwrap(),
            r#"{"type":"desync","checksums":{"A":"abc123","B":"def456"}}"#
        );
    }

    #[test]
    fn test_actions_without_checksum() {
        let msg = decode_line(r#"{"type":"actions","data":[]}"#).unwrap();
        assert_eq!(msg, Message::Actions { data: vec![], checksum: None });
        let line = encode_line(&msg).unwrap();
        assert!(!line.contains("checksum"));
    }

    #[test]
    fn test_position_only_command_decodes() {
        let s = state();
        let msg = decode_line(
            r#"{"type":"actions","data":[
                {"kind":"recruit","unit_type":"Scout","pos":[2,1]},
                {"kind":"command","unit_pos":[3,4],"action":{"kind":"move_towards","target_pos":[6,2]}},
                {"kind":"command","unit_pos":[3,4],"action":{"kind":"attack","target_pos":[5,4]}},
                {"kind":"command","unit_pos":[5,4],"action":{"kind":"wander"}}
            ],"checksum":"abc123"}"#,
        )
        .unwrap();
        let Message::Actions { data, checksum } = msg else {
            panic!("expected actions");
        };
        assert_eq!(checksum.as_deref(), Some("abc123"));

        let orders = decode_orders(Team::A, &data, &s);
        assert_eq!(orders.recruits, vec![Recruit { kind: UnitKind::Scout, pos: Coord::new(2, 1) }]);
        // The wander command names a team B unit and is dropped.
        assert_eq!(orders.commands.len(), 2);
        assert_eq!(orders.commands[0].unit_id, 1);
        assert_eq!(orders.commands[0].action, Action::MoveTowards(Coord::new(6, 2)));
        assert_eq!(orders.commands[1].action, Action::Attack(Target::Unit(2)));
    }

    #[test]
    fn test_orders_encode_with_ids() {
        let s = state();
        let orders = TeamOrders {
            recruits: vec![Recruit { kind: UnitKind::Archer, pos: Coord::new(2, 2) }],
            commands: vec![
                UnitCommand {
                    unit_id: 1,
                    unit_pos: Coord::new(3, 4),
                    action: Action::Attack(Target::Base(Team::B)),
                },
                UnitCommand { unit_id: 1, unit_pos: Coord::new(3, 4), action: Action::Idle },
            ],
        };
        let entries = encode_orders(&orders, &s);
        assert_eq!(entries.len(), 2);
        let WireEntry::Command { unit_id, action, .. } = &entries[1] else {
            panic!("expected command");
        };
        assert_eq!(*unit_id, Some(1));
        assert_eq!(action.target_pos, Some([8, 4]));
        assert_eq!(action.target_id, None);

        let decoded = decode_orders(Team::A, &entries, &s);
        assert_eq!(decoded.recruits, orders.recruits);
        assert_eq!(decoded.commands[0].action, Action::Attack(Target::Base(Team::B)));
    }

    #[test]
    fn test_move_path_round_trip() {
        let s = state();
        let path = vec![Coord::new(3, 4), Coord::new(4, 4), Coord::new(4, 3)];
        let orders = TeamOrders {
            recruits: vec![],
            commands: vec![UnitCommand {
                unit_id: 1,
                unit_pos: Coord::new(3, 4),
                action: Action::MovePath(path.clone()),
            }],
        };
        let line = encode_line(&Message::Actions {
            data: encode_orders(&orders, &s),
            checksum: Some(s.checksum()),
        })
        .unwrap();
        assert!(line.contains(r#""target_path":[[3,4],[4,4],[4,3]]"#));
        let Message::Actions { data, .. } = decode_line(&line).unwrap() else {
            panic!("expected actions");
        };
        assert_eq!(decode_orders(Team::A, &data, &s), orders);
    }

    #[test]
    fn test_attack_on_empty_cell_is_idle() {
        let s = state();
        let entries = vec![WireEntry::Command {
            unit_id: Some(1),
            unit_pos: [3, 4],
            action: WireAction {
                target_pos: Some([0, 5]),
                ..WireAction::bare(ActionKind::Attack)
            },
        }];
        let orders = decode_orders(Team::A, &entries, &s);
        assert_eq!(orders.commands[0].action, Action::Idle);
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(decode_line("not json").is_err());
        assert!(decode_line(r#"{"type":"launch_missiles"}"#).is_err());
    }
}
