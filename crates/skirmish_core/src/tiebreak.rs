//! Tie-breaking between equally good choices.
//!
//! Local play shuffles candidates with a seeded RNG so units do not all
//! favour the same direction. Lockstep play must produce identical results
//! on both peers without sharing RNG state, so it keeps the fixed candidate
//! order instead.

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

/// How ties between equally good candidates are broken.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TieBreak {
    /// Shuffle candidates with a seeded generator.
    Seeded(Pcg32),
    /// Keep candidates in their fixed order.
    Deterministic,
}

impl TieBreak {
    /// Seeded tie-breaking.
    #[must_use]
    pub fn seeded(seed: u64) -> Self {
        Self::Seeded(Pcg32::seed_from_u64(seed))
    }

    /// Whether results are independent of RNG state.
    #[must_use]
    pub const fn is_deterministic(&self) -> bool {
        matches!(self, Self::Deterministic)
    }

    /// Reorder candidates in place. A no-op in deterministic mode.
    pub fn order<T>(&mut self, candidates: &mut [T]) {
        if let Self::Seeded(rng) = self {
            candidates.shuffle(rng);
        }
    }

    /// Pick a value in `low..=high`. Deterministic mode always picks `low`.
    pub fn pick_in(&mut self, low: i32, high: i32) -> i32 {
        match self {
            Self::Seeded(rng) if high > low => rng.gen_range(low..=high),
            _ => low,
        }
    }

    /// Pick an element. Deterministic mode picks the first.
    pub fn choose<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        match self {
            Self::Seeded(rng) => items.choose(rng),
            Self::Deterministic => items.first(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deterministic_keeps_order() {
        let mut tb = TieBreak::Deterministic;
        let mut items = [1, 2, 3, 4];
        tb.order(&mut items);
        assert_eq!(items, [1, 2, 3, 4]);
        assert_eq!(tb.choose(&items), Some(&1));
        assert_eq!(tb.pick_in(2, 4), 2);
    }

    #[test]
    fn test_seeded_is_reproducible() {
        let mut a = TieBreak::seeded(42);
        let mut b = TieBreak::seeded(42);
        let mut xs: Vec<u32> = (0..16).collect();
        let mut ys = xs.clone();
        a.order(&mut xs);
        b.order(&mut ys);
        assert_eq!(xs, ys);
        assert_eq!(a.pick_in(2, 4), b.pick_in(2, 4));
    }

    #[test]
    fn test_pick_in_bounds() {
        let mut tb = TieBreak::seeded(1);
        for _ in 0..100 {
            let v = tb.pick_in(2, 4);
            assert!((2..=4).contains(&v));
        }
    }
}
