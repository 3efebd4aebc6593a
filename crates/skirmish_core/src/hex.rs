//! Offset-row hex grid geometry.
//!
//! Cells are addressed by `(x, y)` in an "odd-r" layout: odd rows are
//! shoved half a cell to the right, so the diagonal neighbor offsets depend
//! on row parity. Exact distance and straight-line tracing convert to cube
//! coordinates (`x + y + z = 0`) first.
//!
//! # Determinism
//!
//! [`line`] interpolates with fixed-point arithmetic and a fixed rounding
//! rule, so every peer traces the identical cell sequence. Visibility and
//! path previews both depend on that.

use serde::{Deserialize, Serialize};

use crate::math::{lerp_int, round_to_int, CubeFixed, Fixed};

/// A cell coordinate in offset-row layout.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct Coord {
    /// Column.
    pub x: i32,
    /// Row.
    pub y: i32,
}

impl Coord {
    /// Create a coordinate.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Convert to cube coordinates.
    #[must_use]
    pub const fn to_cube(self) -> Cube {
        let q = self.x - (self.y - (self.y & 1)) / 2;
        let r = self.y;
        Cube {
            x: q,
            y: -q - r,
            z: r,
        }
    }

    /// Hex-step distance to another cell.
    #[must_use]
    pub fn distance(self, other: Self) -> i32 {
        distance(self, other)
    }

    /// The six adjacent cells (may lie outside any map).
    #[must_use]
    pub fn neighbors(self) -> [Self; 6] {
        neighbors(self)
    }

    /// Whether `other` is one of the six adjacent cells.
    #[must_use]
    pub fn is_adjacent(self, other: Self) -> bool {
        distance(self, other) == 1
    }
}

impl From<(i32, i32)> for Coord {
    fn from((x, y): (i32, i32)) -> Self {
        Self::new(x, y)
    }
}

impl std::fmt::Display for Coord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Cube coordinate with the invariant `x + y + z == 0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cube {
    /// Cube x axis (equals the axial column).
    pub x: i32,
    /// Cube y axis.
    pub y: i32,
    /// Cube z axis (equals the row).
    pub z: i32,
}

impl Cube {
    /// Convert back to offset-row layout.
    #[must_use]
    pub const fn to_offset(self) -> Coord {
        let r = self.z;
        Coord {
            x: self.x + (r - (r & 1)) / 2,
            y: r,
        }
    }

    /// Max of absolute axis deltas.
    #[must_use]
    pub fn distance(self, other: Self) -> i32 {
        (self.x - other.x)
            .abs()
            .max((self.y - other.y).abs())
            .max((self.z - other.z).abs())
    }
}

/// Minimum hex-step count between two offset-row cells.
#[must_use]
pub fn distance(a: Coord, b: Coord) -> i32 {
    a.to_cube().distance(b.to_cube())
}

/// The six adjacent cells in a fixed order.
///
/// Even and odd rows use different diagonal offsets. The order is part of
/// the deterministic tie-break contract of movement and spawning.
#[must_use]
pub fn neighbors(cell: Coord) -> [Coord; 6] {
    let Coord { x, y } = cell;
    if y & 1 == 0 {
        [
            Coord::new(x + 1, y),
            Coord::new(x - 1, y),
            Coord::new(x, y + 1),
            Coord::new(x, y - 1),
            Coord::new(x - 1, y + 1),
            Coord::new(x - 1, y - 1),
        ]
    } else {
        [
            Coord::new(x + 1, y),
            Coord::new(x - 1, y),
            Coord::new(x, y + 1),
            Coord::new(x, y - 1),
            Coord::new(x + 1, y + 1),
            Coord::new(x + 1, y - 1),
        ]
    }
}

/// Round a fractional cube coordinate to the nearest cell.
///
/// The axis with the largest rounding error is recomputed from the other
/// two so the zero-sum invariant holds.
#[must_use]
pub fn cube_round(p: CubeFixed) -> Cube {
    let mut rx = round_to_int(p.x);
    let mut ry = round_to_int(p.y);
    let mut rz = round_to_int(p.z);

    let dx = (Fixed::from_num(rx) - p.x).abs();
    let dy = (Fixed::from_num(ry) - p.y).abs();
    let dz = (Fixed::from_num(rz) - p.z).abs();

    if dx > dy && dx > dz {
        rx = -ry - rz;
    } else if dy > dz {
        ry = -rx - rz;
    } else {
        rz = -rx - ry;
    }

    Cube {
        x: rx,
        y: ry,
        z: rz,
    }
}

/// Straight hex line from `a` to `b`, both inclusive.
///
/// Returns `distance(a, b) + 1` cells; consecutive cells are adjacent.
#[must_use]
pub fn line(a: Coord, b: Coord) -> Vec<Coord> {
    let ca = a.to_cube();
    let cb = b.to_cube();
    let n = ca.distance(cb);
    if n == 0 {
        return vec![a];
    }

    (0..=n)
        .map(|i| {
            let p = CubeFixed {
                x: lerp_int(ca.x, cb.x, i, n),
                y: lerp_int(ca.y, cb.y, i, n),
                z: lerp_int(ca.z, cb.z, i, n),
            };
            cube_round(p).to_offset()
        })
        .collect()
}

/// All cells within `radius` steps of `center` that lie in a
/// `width` x `height` map, in row-major order.
///
/// Scans only the bounding box; a single step never changes the column by
/// more than one, so the box `[x-r, x+r] x [y-r, y+r]` is exhaustive.
#[must_use]
pub fn cells_within(center: Coord, radius: i32, width: i32, height: i32) -> Vec<Coord> {
    if radius < 0 {
        return Vec::new();
    }
    let y0 = (center.y - radius).max(0);
    let y1 = (center.y + radius).min(height - 1);
    let x0 = (center.x - radius).max(0);
    let x1 = (center.x + radius).min(width - 1);

    let mut out = Vec::new();
    for y in y0..=y1 {
        for x in x0..=x1 {
            let c = Coord::new(x, y);
            if distance(center, c) <= radius {
                out.push(c);
            }
        }
    }
    out
}
