//! Utility maths functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use num_traits::Float;

/// Linearly interpolate between `(x0, t0)` and `(x1, t1)` at `t`.
///
/// If `t0` and `t1` are (almost) equal `x0` is returned.
pub fn lerp<T>(x0: T, t0: T, x1: T, t1: T, t: T) -> T
where
    T: Float,
{
    if (t1 - t0).abs() <= T::epsilon() {
        return x0;
    }

    let r = (t - t0) / (t1 - t0);
    x0 + r * (x1 - x0)
}

/// Spherical linear interpolation between two angles.
///
/// The interpolation takes the shortest way around the circle and the
/// result is normalised into [-pi, pi).
pub fn slerp<T>(a0: T, t0: T, a1: T, t1: T, t: T) -> T
where
    T: Float,
{
    if (t1 - t0).abs() <= T::epsilon() {
        return normalize_angle(a0);
    }

    let a0_n = normalize_angle(a0);
    let a1_n = normalize_angle(a1);
    let pi_t: T = T::from(std::f64::consts::PI).unwrap();
    let tau_t: T = T::from(std::f64::consts::TAU).unwrap();

    let mut d = a1_n - a0_n;
    if d > pi_t {
        d = d - tau_t;
    } else if d < -pi_t {
        d = d + tau_t;
    }

    let r = (t - t0) / (t1 - t0);
    normalize_angle(a0_n + d * r)
}

/// Clamp a value into `[min, max]`.
pub fn clamp<T>(value: T, min: T, max: T) -> T
where
    T: Float,
{
    let mut ret = value;

    if ret > max {
        ret = max
    }
    if ret < min {
        ret = min
    }

    ret
}

/// Normalise an angle into the range [-pi, pi).
pub fn normalize_angle<T>(angle: T) -> T
where
    T: Float,
{
    let pi_t: T = T::from(std::f64::consts::PI).unwrap();
    let tau_t: T = T::from(std::f64::consts::TAU).unwrap();

    let mut a = rem_euclid(angle + pi_t, tau_t);
    // Round-off in rem_euclid can return exactly tau
    if a >= tau_t {
        a = a - tau_t;
    }

    a - pi_t
}

/// Calculates the least nonnegative remainder of `lhs (mod rhs)`.
///
/// This function is taken from the std library as num is missing it.
pub fn rem_euclid<T>(lhs: T, rhs: T) -> T
where
    T: Float,
{
    let r = lhs % rhs;
    if r < T::zero() {
        r + rhs.abs()
    } else {
        r
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::{FRAC_PI_2, PI};

    #[test]
    fn test_normalize_angle() {
        assert_relative_eq!(normalize_angle(0f64), 0f64, epsilon = 1e-12);
        assert_relative_eq!(normalize_angle(FRAC_PI_2), FRAC_PI_2, epsilon = 1e-12);
        assert_relative_eq!(normalize_angle(3.0 * FRAC_PI_2), -FRAC_PI_2, epsilon = 1e-12);
        assert_relative_eq!(normalize_angle(-3.0 * FRAC_PI_2), FRAC_PI_2, epsilon = 1e-12);
        assert_relative_eq!(normalize_angle(PI), -PI, epsilon = 1e-12);
        assert_relative_eq!(normalize_angle(5.0 * PI + 0.25), -PI + 0.25, epsilon = 1e-12);
    }

    #[test]
    fn test_lerp() {
        assert_eq!(lerp(0f64, 0.0, 10.0, 1.0, 0.25), 2.5);
        assert_eq!(lerp(4f64, 2.0, 8.0, 4.0, 4.0), 8.0);

        // Degenerate interval returns the first value
        assert_eq!(lerp(3f64, 1.0, 9.0, 1.0, 5.0), 3.0);
    }

    #[test]
    fn test_slerp_wraps() {
        // Interpolating across the +-pi boundary goes the short way round
        let a = slerp(PI - 0.1, 0.0, -PI + 0.1, 1.0, 0.5);
        assert_relative_eq!(a.abs(), PI, epsilon = 1e-12);

        assert_relative_eq!(slerp(0.0, 0.0, FRAC_PI_2, 1.0, 0.5), FRAC_PI_2 / 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_clamp() {
        assert_eq!(clamp(5f64, -1.0, 1.0), 1.0);
        assert_eq!(clamp(-5f64, -1.0, 1.0), -1.0);
        assert_eq!(clamp(0.5f64, -1.0, 1.0), 0.5);
    }
}
