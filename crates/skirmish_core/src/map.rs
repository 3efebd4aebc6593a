//! Terrain storage and walkability queries.

use serde::{Deserialize, Serialize};

use crate::error::{GameError, Result};
use crate::hex::Coord;

/// Terrain tag of a single cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Terrain {
    /// Open ground; walkable and transparent.
    #[default]
    Plain,
    /// Blocks movement and line of sight.
    Mountain,
    /// Blocks movement, does not block sight.
    River,
}

impl Terrain {
    /// Single-character tag used by snapshots and map files.
    #[must_use]
    pub const fn tag(self) -> char {
        match self {
            Self::Plain => '.',
            Self::Mountain => '#',
            Self::River => '~',
        }
    }

    /// Parse a single-character tag.
    #[must_use]
    pub const fn from_tag(tag: char) -> Option<Self> {
        match tag {
            '.' => Some(Self::Plain),
            '#' => Some(Self::Mountain),
            '~' => Some(Self::River),
            _ => None,
        }
    }

    /// Units may stand on this terrain.
    #[must_use]
    pub const fn is_walkable(self) -> bool {
        matches!(self, Self::Plain)
    }

    /// This terrain blocks line of sight.
    #[must_use]
    pub const fn blocks_sight(self) -> bool {
        matches!(self, Self::Mountain)
    }
}

/// Rectangular terrain map stored in row-major order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Map {
    width: i32,
    height: i32,
    cells: Vec<Terrain>,
}

impl Map {
    /// Largest accepted width or height for maps built from configs and
    /// snapshots.
    pub const MAX_SIDE: i32 = 512;

    /// Create an all-plain map.
    ///
    /// # Panics
    ///
    /// Panics if `width` or `height` is not positive.
    #[must_use]
    pub fn new(width: i32, height: i32) -> Self {
        assert!(width > 0, "Map width must be positive");
        assert!(height > 0, "Map height must be positive");
        Self {
            width,
            height,
            cells: vec![Terrain::Plain; (width as usize) * (height as usize)],
        }
    }

    /// Parse a map from rows of terrain tags. Every row must have the same
    /// non-zero length.
    ///
    /// # Errors
    ///
    /// Returns an error on ragged rows or unknown tags.
    pub fn from_rows<S: AsRef<str>>(rows: &[S]) -> Result<Self> {
        let height = rows.len();
        let width = rows.first().map_or(0, |r| r.as_ref().chars().count());
        if width == 0 || height == 0 {
            return Err(GameError::SnapshotParse("map grid is empty".into()));
        }

        let mut cells = Vec::with_capacity(width * height);
        for (y, row) in rows.iter().enumerate() {
            let row = row.as_ref();
            if row.chars().count() != width {
                return Err(GameError::SnapshotParse(format!(
                    "map row {y} has {} cells, expected {width}",
                    row.chars().count()
                )));
            }
            for (x, tag) in row.chars().enumerate() {
                let terrain = Terrain::from_tag(tag).ok_or(GameError::UnknownTerrain {
                    tag,
                    x: x as i32,
                    y: y as i32,
                })?;
                cells.push(terrain);
            }
        }

        Ok(Self {
            width: width as i32,
            height: height as i32,
            cells,
        })
    }

    /// Render the map as rows of terrain tags.
    #[must_use]
    pub fn rows(&self) -> Vec<String> {
        self.cells
            .chunks(self.width as usize)
            .map(|row| row.iter().map(|t| t.tag()).collect())
            .collect()
    }

    /// Map width in cells.
    #[must_use]
    pub const fn width(&self) -> i32 {
        self.width
    }

    /// Map height in cells.
    #[must_use]
    pub const fn height(&self) -> i32 {
        self.height
    }

    #[inline]
    fn index(&self, c: Coord) -> usize {
        (c.y as usize) * (self.width as usize) + (c.x as usize)
    }

    /// Check if a coordinate lies on the map.
    #[must_use]
    pub const fn in_bounds(&self, c: Coord) -> bool {
        c.x >= 0 && c.x < self.width && c.y >= 0 && c.y < self.height
    }

    /// Terrain at a coordinate, or `None` off the map.
    #[must_use]
    pub fn terrain(&self, c: Coord) -> Option<Terrain> {
        self.in_bounds(c).then(|| self.cells[self.index(c)])
    }

    /// Overwrite the terrain of a cell. Returns `false` off the map.
    pub fn set_terrain(&mut self, c: Coord, terrain: Terrain) -> bool {
        if self.in_bounds(c) {
            let i = self.index(c);
            self.cells[i] = terrain;
            true
        } else {
            false
        }
    }

    /// Walkable and on the map.
    #[must_use]
    pub fn can_walk(&self, c: Coord) -> bool {
        self.terrain(c).is_some_and(Terrain::is_walkable)
    }

    /// Blocks line of sight. Off-map cells block too.
    #[must_use]
    pub fn blocks_sight(&self, c: Coord) -> bool {
        self.terrain(c).map_or(true, Terrain::blocks_sight)
    }

    /// Reset every cell in the square `[c-r, c+r]` to plain.
    pub fn clear_radius(&mut self, center: Coord, radius: i32) {
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                self.set_terrain(Coord::new(center.x + dx, center.y + dy), Terrain::Plain);
            }
        }
    }

    /// Iterate all coordinates in row-major order.
    pub fn coords(&self) -> impl Iterator<Item = Coord> + '_ {
        (0..self.height).flat_map(move |y| (0..self.width).map(move |x| Coord::new(x, y)))
    }
}
