//! Fixed-point math utilities for deterministic hex interpolation.
//!
//! Line tracing interpolates in cube space. Floating-point operations can
//! round differently on different CPUs, so both peers of a lockstep match
//! use fixed-point arithmetic instead.

use fixed::types::I32F32;

/// Fixed-point number type for all simulation math.
///
/// Uses 32 bits for integer part and 32 bits for fractional part.
pub type Fixed = I32F32;

/// Fractional cube coordinate produced by interpolation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CubeFixed {
    /// Cube x axis.
    pub x: Fixed,
    /// Cube y axis.
    pub y: Fixed,
    /// Cube z axis.
    pub z: Fixed,
}

/// Interpolate `from + (to - from) * step / steps` with a single rounding.
///
/// `steps` must be positive.
#[must_use]
pub fn lerp_int(from: i32, to: i32, step: i32, steps: i32) -> Fixed {
    debug_assert!(steps > 0, "lerp over zero steps");
    let delta = i64::from(to - from) * i64::from(step);
    Fixed::from_num(from) + Fixed::from_num(delta) / Fixed::from_num(steps)
}

/// Round a fixed-point value to the nearest integer, ties to even.
///
/// Half-way points occur on every line with an even number of steps, so
/// the tie rule decides which of two cells a line passes through.
#[must_use]
pub fn round_to_int(value: Fixed) -> i32 {
    value.round_ties_even().to_num::<i32>()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lerp_endpoints() {
        assert_eq!(lerp_int(3, 9, 0, 4), Fixed::from_num(3));
        assert_eq!(lerp_int(3, 9, 4, 4), Fixed::from_num(9));
    }

    #[test]
    fn test_lerp_midpoint() {
        assert_eq!(lerp_int(0, 1, 1, 2), Fixed::from_num(0.5));
        assert_eq!(lerp_int(-4, 4, 1, 2), Fixed::ZERO);
    }

    #[test]
    fn test_fixed_determinism() {
        // Same operations must produce identical results
        let a = lerp_int(0, 7, 1, 3);
        let b = lerp_int(0, 7, 1, 3);
        assert_eq!(a, b);
        assert_eq!(a.to_bits(), b.to_bits());
    }

    #[test]
    fn test_round_to_int() {
        assert_eq!(round_to_int(Fixed::from_num(2.4)), 2);
        assert_eq!(round_to_int(Fixed::from_num(2.6)), 3);
        assert_eq!(round_to_int(Fixed::from_num(-0.4)), 0);
    }

    #[test]
    fn test_round_ties_to_even() {
        assert_eq!(round_to_int(Fixed::from_num(0.5)), 0);
        assert_eq!(round_to_int(Fixed::from_num(-0.5)), 0);
        assert_eq!(round_to_int(Fixed::from_num(1.5)), 2);
        assert_eq!(round_to_int(Fixed::from_num(2.5)), 2);
        assert_eq!(round_to_int(Fixed::from_num(-2.5)), -2);
    }
}
