//! Unit kinds.
//!
//! The balance roster is Scout / Infantry / Archer. Cavalry belongs to the
//! older non-balance roster and is kept so snapshots from that variant
//! still load.

use serde::{Deserialize, Serialize};

/// Enumerated unit kind.
///
/// The discriminant order is stable and is used for deterministic iteration
/// over per-kind tables.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum UnitKind {
    /// Fast, long-sighted, fragile.
    Scout,
    /// Slow melee line unit.
    Infantry,
    /// Ranged unit.
    Archer,
    /// Fast melee unit (non-balance roster).
    Cavalry,
}

impl UnitKind {
    /// Kinds recruitable under the balance roster.
    pub const RECRUITABLE: [Self; 3] = [Self::Scout, Self::Infantry, Self::Archer];

    /// Name used in snapshots and on the wire.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Scout => "Scout",
            Self::Infantry => "Infantry",
            Self::Archer => "Archer",
            Self::Cavalry => "Cavalry",
        }
    }

    /// Parse a kind by its wire name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "Scout" => Some(Self::Scout),
            "Infantry" => Some(Self::Infantry),
            "Archer" => Some(Self::Archer),
            "Cavalry" => Some(Self::Cavalry),
            _ => None,
        }
    }
}

impl std::fmt::Display for UnitKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
