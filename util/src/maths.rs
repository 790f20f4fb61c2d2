//! Utility maths functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use num_traits::Float;

/// Map a value from one range into another.
pub fn lin_map<T>(source_range: (T, T), target_range: (T, T), value: T) -> T
where 
    T: Float 
{
    target_range.0 
        + ((value - source_range.0) 
        * (target_range.1 - target_range.0) 
        / (source_range.1 - source_range.0))
}

/// Clamp a value into the closed range `[min, max]`.
pub fn clamp<T>(value: &T, min: &T, max: &T) -> T 
where
    T: Float
{
    let mut ret = *value;

    if ret > *max {
        ret = *max
    }
    if ret < *min {
        ret = *min
    }

    ret
}

/// Limit the change from `prev` to `value` to at most `max_delta` in either direction.
pub fn rate_limit<T>(prev: T, value: T, max_delta: T) -> T
where
    T: Float
{
    clamp(&value, &(prev - max_delta.abs()), &(prev + max_delta.abs()))
}

/// Calculates the least nonnegative remainder of `lhs (mod rhs)`.
/// 
/// This function is taken from the std library as num is missing it.
///
/// In particular, the return value `r` satisfies `0.0 <= r < rhs.abs()` in
/// most cases. However, due to a floating point round-off error it can
/// result in `r == rhs.abs()` if `self` is much smaller than `rhs.abs()` in
/// magnitude and `self < 0.0`.
pub fn rem_euclid<T>(lhs: T, rhs: T) -> T
where
    T: Float
{
    let r = lhs % rhs;
    if r < T::zero() { r + rhs.abs() } else { r }
}

/// Wrap an angle into the range `[-pi, pi)`.
pub fn wrap_pi<T>(angle: T) -> T
where
    T: Float
{
    let pi_t = T::from(std::f64::consts::PI).unwrap();
    let tau_t = T::from(std::f64::consts::TAU).unwrap();

    rem_euclid(angle + pi_t, tau_t) - pi_t
}

/// Get the signed shortest angular distance to travel from `from` to `to`.
///
/// Positive results are anticlockwise rotations.
pub fn get_ang_dist<T>(from: T, to: T) -> T
where
    T: Float
{
    wrap_pi(to - from)
}

#[cfg(test)]
mod test {
    use super::*;
    use std::f64::consts::{PI, TAU};

    const EPS: f64 = 1e-12;

    #[test]
    fn test_wrap_pi() {
        assert!((wrap_pi(0f64)).abs() < EPS);
        assert!((wrap_pi(TAU + 1f64) - 1f64).abs() < EPS);
        assert!((wrap_pi(-TAU - 1f64) + 1f64).abs() < EPS);
        assert!((wrap_pi(PI) + PI).abs() < EPS);
        assert!((wrap_pi(1.5 * PI) + 0.5 * PI).abs() < EPS);
    }

    #[test]
    fn test_get_ang_dist() {
        assert!((get_ang_dist(1f64, 2f64) - 1f64).abs() < EPS);
        assert!((get_ang_dist(2f64, 1f64) + 1f64).abs() < EPS);
        assert!((get_ang_dist(0f64, TAU)).abs() < EPS);
        assert!((get_ang_dist(TAU - 0.1, 0.1) - 0.2).abs() < EPS);
        assert!((get_ang_dist(0.1, TAU - 0.1) + 0.2).abs() < EPS);
    }

    #[test]
    fn test_clamp_and_rate_limit() {
        assert_eq!(clamp(&2.0, &-1.0, &1.0), 1.0);
        assert_eq!(clamp(&-2.0, &-1.0, &1.0), -1.0);
        assert_eq!(clamp(&0.5, &-1.0, &1.0), 0.5);

        assert_eq!(rate_limit(0.0, 1.0, 0.2), 0.2);
        assert_eq!(rate_limit(0.0, -1.0, 0.2), -0.2);
        assert_eq!(rate_limit(0.5, 0.6, 0.2), 0.6);
    }

    #[test]
    fn test_lin_map() {
        assert_eq!(lin_map((0.0, 2.0), (0.0, 1.0), 1.0), 0.5);
        assert_eq!(lin_map((0.0, 1.0), (10.0, 20.0), 0.25), 12.5);
    }
}
