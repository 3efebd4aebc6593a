//! Per-unit intents and the lockstep order format.

use serde::{Deserialize, Serialize};

use crate::components::{Team, UnitId};
use crate::hex::Coord;
use crate::unit_kind::UnitKind;

/// Something that can be attacked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Target {
    /// A unit, by stable id.
    Unit(UnitId),
    /// A team's base.
    Base(Team),
}

/// A unit's chosen behavior for one tick.
///
/// Produced once per unit per tick by the active decision source and
/// consumed exactly once by the combat or movement resolver.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Action {
    /// Do nothing.
    #[default]
    Idle,
    /// Attack a target if it is alive and within range.
    Attack(Target),
    /// Step greedily towards a cell.
    MoveTowards(Coord),
    /// Follow a precomputed cell sequence that includes the current cell.
    MovePath(Vec<Coord>),
    /// Step to the first free neighbor.
    Wander,
}

impl Action {
    /// Movement intents are handled by the movement arbiter.
    #[must_use]
    pub const fn is_movement(&self) -> bool {
        matches!(self, Self::MoveTowards(_) | Self::MovePath(_) | Self::Wander)
    }

    /// Short kind name used in logs and on the wire.
    #[must_use]
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Attack(_) => "attack",
            Self::MoveTowards(_) => "move_towards",
            Self::MovePath(_) => "move_path",
            Self::Wander => "wander",
        }
    }
}

/// Request to recruit a unit on a specific cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recruit {
    /// Kind to recruit.
    pub kind: UnitKind,
    /// Cell to place it on.
    pub pos: Coord,
}

/// A command for one of the team's own units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitCommand {
    /// Stable id of the commanded unit.
    pub unit_id: UnitId,
    /// Position of the unit when the command was issued.
    pub unit_pos: Coord,
    /// The intent.
    pub action: Action,
}

/// One team's orders for a single lockstep turn.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamOrders {
    /// Recruits, in the order they were queued.
    pub recruits: Vec<Recruit>,
    /// Unit commands. Units without a command stay idle.
    pub commands: Vec<UnitCommand>,
}

impl TeamOrders {
    /// No recruits and no commands.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.recruits.is_empty() && self.commands.is_empty()
    }
}
