//! Angle and timing helpers.

use core::f64::consts::{PI, TAU};
use std::time::Duration;

/// Lower bound on the velocity controller's update period.
pub const MIN_UPDATE_PERIOD: Duration = Duration::from_millis(5);

/// Wrap an angle into `(-π, π]`. Non-finite input is returned unchanged.
#[inline]
pub fn normalize_angle(rad: f64) -> f64 {
    if !rad.is_finite() {
        return rad;
    }
    let r = rad.rem_euclid(TAU);
    if r > PI { r - TAU } else { r }
}

#[inline]
pub fn degrees_to_radians(deg: f64) -> f64 {
    deg * PI / 180.0
}

#[inline]
pub fn radians_to_degrees(rad: f64) -> f64 {
    rad * 180.0 / PI
}

/// Clamp a requested controller period to [`MIN_UPDATE_PERIOD`].
#[inline]
pub fn clamp_update_period(d: Duration) -> Duration {
    d.max(MIN_UPDATE_PERIOD)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_keeps_half_open_range() {
        assert_eq!(normalize_angle(PI), PI);
        assert!((normalize_angle(-PI) - PI).abs() < 1e-12);
        assert!((normalize_angle(3.0 * PI / 2.0) + PI / 2.0).abs() < 1e-12);
        assert!((normalize_angle(-3.0 * PI / 2.0) - PI / 2.0).abs() < 1e-12);
        assert_eq!(normalize_angle(0.0), 0.0);
    }

    #[test]
    fn degree_round_trip_is_pure() {
        assert!((degrees_to_radians(180.0) - PI).abs() < 1e-12);
        assert!((radians_to_degrees(PI / 2.0) - 90.0).abs() < 1e-12);
    }

    #[test]
    fn period_floor_is_five_ms() {
        assert_eq!(clamp_update_period(Duration::from_millis(1)), MIN_UPDATE_PERIOD);
        assert_eq!(
            clamp_update_period(Duration::from_millis(40)),
            Duration::from_millis(40)
        );
    }
}
