//! Procedural map generation.
//!
//! Generates point-symmetric two-player maps:
//! - Smoothed-noise mountain ranges
//! - A meandering river separating the two base diagonals
//! - Cleared base corners and bridges across the river
//!
//! Generation is seeded and uses integer noise only, so both peers of a
//! networked match derive the same map from the shared start config.

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use crate::hex::Coord;
use crate::map::{Map, Terrain};

/// Noise values lie in `0..=NOISE_SCALE`.
const NOISE_SCALE: i32 = 1000;

/// Smoothed noise above this is always a mountain.
const MOUNTAIN_THRESHOLD: i32 = 650;

/// Smoothed noise above this is a mountain with 40% chance.
const FOOTHILL_THRESHOLD: i32 = 550;

/// Distance of each base corner from the map edge.
const BASE_MARGIN: i32 = 3;

/// Map generation parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapGenConfig {
    /// Map width in cells.
    pub width: i32,
    /// Map height in cells.
    pub height: i32,
    /// Random seed for deterministic generation.
    pub seed: u64,
}

impl Default for MapGenConfig {
    fn default() -> Self {
        Self {
            width: 40,
            height: 20,
            seed: 12345,
        }
    }
}

impl MapGenConfig {
    /// Set the random seed.
    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// Generate a map.
///
/// # Panics
///
/// Panics if `width` or `height` is not positive.
#[must_use]
pub fn generate(config: MapGenConfig) -> Map {
    let MapGenConfig { width, height, seed } = config;
    let mut map = Map::new(width, height);
    let mut rng = Pcg32::seed_from_u64(seed);
    let half_h = height / 2;

    let noise = smoothed_noise(width, height, &mut rng);
    for y in 0..half_h {
        for x in 0..width {
            let v = noise[(y * width + x) as usize];
            let mountain = v > MOUNTAIN_THRESHOLD
                || (v > FOOTHILL_THRESHOLD && rng.gen_ratio(2, 5));
            let terrain = if mountain { Terrain::Mountain } else { Terrain::Plain };
            map.set_terrain(Coord::new(x, y), terrain);
        }
    }

    carve_river(&mut map, &mut rng);
    mirror(&mut map);

    map.clear_radius(Coord::new(BASE_MARGIN, BASE_MARGIN), 3);
    map.clear_radius(
        Coord::new(width - 1 - BASE_MARGIN, height - 1 - BASE_MARGIN),
        3,
    );
    let centre = Coord::new(width / 2, height / 2);
    map.clear_radius(centre, 1);
    map.clear_radius(Coord::new(width - 1 - centre.x, height - 1 - centre.y), 1);

    let river_cells: Vec<Coord> = map
        .coords()
        .filter(|c| c.y < half_h && map.terrain(*c) == Some(Terrain::River))
        .collect();
    if let Some(&bridge) = river_cells.choose(&mut rng) {
        map.clear_radius(bridge, 1);
        map.clear_radius(Coord::new(width - 1 - bridge.x, height - 1 - bridge.y), 1);
    }

    tracing::debug!(width, height, seed, "Generated map");
    map
}

/// Uniform integer noise smoothed by four box-blur passes.
fn smoothed_noise(width: i32, height: i32, rng: &mut Pcg32) -> Vec<i32> {
    let len = (width * height) as usize;
    let mut noise: Vec<i32> = (0..len).map(|_| rng.gen_range(0..=NOISE_SCALE)).collect();

    for _ in 0..4 {
        let mut next = vec![0; len];
        for y in 0..height {
            for x in 0..width {
                let at = |x: i32, y: i32| noise[(y * width + x) as usize];
                let mut sum = at(x, y);
                let mut count = 1;
                if x > 0 {
                    sum += at(x - 1, y);
                    count += 1;
                }
                if x + 1 < width {
                    sum += at(x + 1, y);
                    count += 1;
                }
                if y > 0 {
                    sum += at(x, y - 1);
                    count += 1;
                }
                if y + 1 < height {
                    sum += at(x, y + 1);
                    count += 1;
                }
                next[(y * width + x) as usize] = sum / count;
            }
        }
        noise = next;
    }
    noise
}

/// Walk a river from the top or right edge towards the centre, staying in
/// the top half.
fn carve_river(map: &mut Map, rng: &mut Pcg32) {
    let width = map.width();
    let height = map.height();
    let half_h = height / 2;
    if half_h == 0 {
        return;
    }

    let mut starts: Vec<Coord> = (width / 2 + 2..width - 2).map(|x| Coord::new(x, 0)).collect();
    starts.extend((0..half_h - 2).map(|y| Coord::new(width - 1, y)));
    let Some(&start) = starts.choose(rng) else {
        return;
    };

    let target = Coord::new(width / 2, half_h - 1);
    let mut cur = start;
    map.set_terrain(cur, Terrain::River);

    for _ in 0..1000 {
        if cur == target {
            break;
        }
        let dx = (target.x - cur.x).signum();
        let dy = (target.y - cur.y).signum();

        let mut moves = Vec::with_capacity(2);
        if dx != 0 {
            moves.push((dx, 0));
        }
        if dy != 0 {
            moves.push((0, dy));
        }
        let Some(&(mut mx, mut my)) = moves.choose(rng) else {
            break;
        };
        if rng.gen_ratio(3, 10) {
            if dx != 0 {
                (mx, my) = (dx, 0);
            }
            if dy != 0 && rng.gen_ratio(1, 2) {
                (mx, my) = (0, dy);
            }
        }

        cur = Coord::new(
            (cur.x + mx).clamp(0, width - 1),
            (cur.y + my).clamp(0, half_h - 1),
        );
        map.set_terrain(cur, Terrain::River);

        if rng.gen_ratio(1, 5) {
            for (wx, wy) in [(1, 0), (-1, 0), (0, 1), (0, -1)] {
                let w = Coord::new(cur.x + wx, cur.y + wy);
                if w.y < half_h {
                    map.set_terrain(w, Terrain::River);
                }
            }
        }
    }
}

/// Copy the top half onto the bottom half with point symmetry
/// `(x, y) -> (w-1-x, h-1-y)`.
fn mirror(map: &mut Map) {
    let width = map.width();
    let height = map.height();
    let half_h = height / 2;

    for y in 0..half_h {
        for x in 0..width {
            if let Some(t) = map.terrain(Coord::new(x, y)) {
                map.set_terrain(Coord::new(width - 1 - x, height - 1 - y), t);
            }
        }
    }
    if height % 2 == 1 {
        let mid = half_h;
        for x in 0..width / 2 {
            if let Some(t) = map.terrain(Coord::new(x, mid)) {
                map.set_terrain(Coord::new(width - 1 - x, mid), t);
            }
        }
    }
}

/// Nearest plain cell to `preferred`: a 5x5 window first, then a
/// row-major scan of the whole map.
#[must_use]
pub fn find_open(map: &Map, preferred: Coord) -> Option<Coord> {
    for dx in -2..=2 {
        for dy in -2..=2 {
            let c = Coord::new(preferred.x + dx, preferred.y + dy);
            if map.terrain(c) == Some(Terrain::Plain) {
                return Some(c);
            }
        }
    }
    map.coords().find(|c| map.terrain(*c) == Some(Terrain::Plain))
}

/// Base positions for team A (near the top-left) and team B (near the
/// bottom-right).
#[must_use]
pub fn place_bases(map: &Map) -> Option<(Coord, Coord)> {
    let a = find_open(map, Coord::new(1, 1))?;
    let b = find_open(map, Coord::new(map.width() - 2, map.height() - 2))?;
    Some((a, b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_is_deterministic() {
        let config = MapGenConfig::default().with_seed(7);
        assert_eq!(generate(config), generate(config));
    }

    #[test]
    fn test_different_seeds_differ() {
        let a = generate(MapGenConfig::default().with_seed(1));
        let b = generate(MapGenConfig::default().with_seed(2));
        assert_ne!(a, b);
    }

    #[test]
    fn test_point_symmetry() {
        let map = generate(MapGenConfig::default().with_seed(99));
        let (w, h) = (map.width(), map.height());
        // Clearings are applied symmetrically, so the whole map mirrors.
        for c in map.coords() {
            let m = Coord::new(w - 1 - c.x, h - 1 - c.y);
            assert_eq!(map.terrain(c), map.terrain(m), "{c} vs {m}");
        }
    }

    #[test]
    fn test_base_corners_are_clear() {
        let map = generate(MapGenConfig::default().with_seed(3));
        for dy in -3..=3 {
            for dx in -3..=3 {
                let c = Coord::new(BASE_MARGIN + dx, BASE_MARGIN + dy);
                assert!(map.can_walk(c), "{c} should be plain");
            }
        }
    }

    #[test]
    fn test_place_bases() {
        let map = generate(MapGenConfig::default().with_seed(5));
        let (a, b) = place_bases(&map).unwrap();
        assert!(map.can_walk(a));
        assert!(map.can_walk(b));
        assert!(a.x <= 3 && a.y <= 3);
        assert!(b.x >= map.width() - 4 && b.y >= map.height() - 4);
    }

    #[test]
    fn test_find_open_on_blocked_map() {
        let map = Map::from_rows(&["###", "###", "##."]).unwrap();
        assert_eq!(find_open(&map, Coord::new(0, 0)), Some(Coord::new(2, 2)));
        let full = Map::from_rows(&["##"]).unwrap();
        assert_eq!(find_open(&full, Coord::new(0, 0)), None);
    }
}
