//! Dead-reckoning pose estimate from wheel pulse deltas.
//!
//! Units: centimetres for position, radians internally for heading. Degree
//! variants of the getters/setters exist for the command surface.

use std::sync::Arc;

use crate::config::DriveGeometry;
use crate::encoder::{EncoderPair, WheelSide, pulses_to_distance};
use crate::util::{degrees_to_radians, normalize_angle, radians_to_degrees};

/// Forward travel at or below this magnitude is treated as in-place rotation.
pub const TRANSLATION_EPSILON_CM: f64 = 0.001;

/// Planar pose. `heading` is always in `(-π, π]`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Pose {
    pub x: f64,
    pub y: f64,
    pub heading: f64,
}

impl Pose {
    pub fn heading_degrees(&self) -> f64 {
        radians_to_degrees(self.heading)
    }

    /// Euclidean distance from `(0, 0)`.
    pub fn distance_from_origin(&self) -> f64 {
        self.x.hypot(self.y)
    }
}

/// Displacement produced by one integration step.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Motion {
    pub left_cm: f64,
    pub right_cm: f64,
    pub forward_cm: f64,
    pub heading_delta: f64,
}

#[derive(Debug)]
pub struct OdometryIntegrator {
    encoders: Arc<EncoderPair>,
    geometry: DriveGeometry,
    pose: Pose,
    last_left: i64,
    last_right: i64,
}

impl OdometryIntegrator {
    /// Start at the origin with the counters' current values as baseline.
    pub fn new(encoders: Arc<EncoderPair>, geometry: DriveGeometry) -> Self {
        let (last_left, last_right) = encoders.read_both();
        Self {
            encoders,
            geometry,
            pose: Pose::default(),
            last_left,
            last_right,
        }
    }

    pub fn pose(&self) -> Pose {
        self.pose
    }

    pub fn geometry(&self) -> DriveGeometry {
        self.geometry
    }

    pub fn heading_degrees(&self) -> f64 {
        self.pose.heading_degrees()
    }

    pub fn distance_from_origin(&self) -> f64 {
        self.pose.distance_from_origin()
    }

    /// Travel represented by a wheel's current counter value.
    pub fn wheel_distance(&self, side: WheelSide) -> f64 {
        pulses_to_distance(
            self.encoders.read(side),
            self.encoders.pulses_per_revolution(side),
            self.geometry.wheel_circumference_cm(),
        )
    }

    /// Travel per pulse for `side` with its current pulses-per-revolution.
    pub fn distance_per_pulse(&self, side: WheelSide) -> f64 {
        self.geometry
            .cm_per_pulse(self.encoders.pulses_per_revolution(side))
    }

    /// Overwrite the pose. Heading is given in degrees and wrapped.
    pub fn set_pose(&mut self, x: f64, y: f64, heading_deg: f64) {
        self.pose = Pose {
            x,
            y,
            heading: normalize_angle(degrees_to_radians(heading_deg)),
        };
        tracing::debug!(x, y, heading_deg, "pose set");
    }

    /// Set the pose and take the counters' current values as the new
    /// baseline, so motion before this call is not integrated.
    pub fn init(&mut self, x: f64, y: f64, heading_deg: f64) {
        self.set_pose(x, y, heading_deg);
        let (l, r) = self.encoders.read_both();
        self.last_left = l;
        self.last_right = r;
    }

    /// Zero the pose, the stored snapshots and both pulse counters.
    pub fn reset_pose(&mut self) {
        self.encoders.reset_both();
        self.pose = Pose::default();
        self.last_left = 0;
        self.last_right = 0;
        tracing::debug!("pose reset");
    }

    /// Read both counters and integrate the motion since the last call.
    pub fn update(&mut self) -> Motion {
        let (l, r) = self.encoders.read_both();
        let motion = self.integrate(l.wrapping_sub(self.last_left), r.wrapping_sub(self.last_right));
        self.last_left = l;
        self.last_right = r;
        motion
    }

    /// Integrate explicit pulse deltas without touching the snapshots.
    pub fn integrate(&mut self, left_pulses: i64, right_pulses: i64) -> Motion {
        let circumference = self.geometry.wheel_circumference_cm();
        let left_cm = pulses_to_distance(
            left_pulses,
            self.encoders.pulses_per_revolution(WheelSide::Left),
            circumference,
        );
        let right_cm = pulses_to_distance(
            right_pulses,
            self.encoders.pulses_per_revolution(WheelSide::Right),
            circumference,
        );
        let forward_cm = (left_cm + right_cm) / 2.0;
        let heading_delta = (right_cm - left_cm) / self.geometry.wheel_base_cm;

        let prev = self.pose.heading;
        if forward_cm.abs() > TRANSLATION_EPSILON_CM {
            let mid = normalize_angle(prev + heading_delta / 2.0);
            self.pose.x += forward_cm * mid.cos();
            self.pose.y += forward_cm * mid.sin();
        }
        self.pose.heading = normalize_angle(prev + heading_delta);

        Motion {
            left_cm,
            right_cm,
            forward_cm,
            heading_delta,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::EncoderConfig;
    use amr_traits::ChannelLevels;
    use core::f64::consts::PI;

    const FWD: ChannelLevels = ChannelLevels { a: true, b: false };

    fn setup() -> (Arc<EncoderPair>, OdometryIntegrator) {
        let enc = EncoderPair::new(EncoderConfig::default(), EncoderConfig::default());
        let odo = OdometryIntegrator::new(Arc::clone(&enc), DriveGeometry::default());
        (enc, odo)
    }

    fn pulse(enc: &Arc<EncoderPair>, side: WheelSide, n: usize) {
        let d = enc.decoder(side).expect("claim");
        for _ in 0..n {
            d.on_edge(FWD);
        }
    }

    #[test]
    fn one_revolution_on_one_wheel() {
        let (enc, mut odo) = setup();
        pulse(&enc, WheelSide::Left, 3418);
        let m = odo.update();
        assert!((m.left_cm - 48.695).abs() < 1e-2);
        assert_eq!(m.right_cm, 0.0);
        let expected = -m.left_cm / 63.5;
        assert!((m.heading_delta - expected).abs() < 1e-12);
        assert!((odo.pose().heading - expected).abs() < 1e-12);
    }

    #[test]
    fn equal_deltas_move_straight() {
        let (enc, mut odo) = setup();
        odo.set_pose(0.0, 0.0, 90.0);
        pulse(&enc, WheelSide::Left, 100);
        pulse(&enc, WheelSide::Right, 100);
        let m = odo.update();
        assert_eq!(m.heading_delta, 0.0);
        let p = odo.pose();
        assert!(p.x.abs() < 1e-9);
        assert!((p.y - m.forward_cm).abs() < 1e-9);
        assert!((p.heading - PI / 2.0).abs() < 1e-12);
    }

    #[test]
    fn update_without_new_pulses_is_idempotent() {
        let (enc, mut odo) = setup();
        pulse(&enc, WheelSide::Right, 250);
        odo.update();
        let before = odo.pose();
        odo.update();
        assert_eq!(odo.pose(), before);
    }

    #[test]
    fn in_place_rotation_keeps_position() {
        let (_enc, mut odo) = setup();
        odo.integrate(-500, 500);
        let p = odo.pose();
        assert_eq!((p.x, p.y), (0.0, 0.0));
        assert!(p.heading > 0.0);
    }

    #[test]
    fn reset_zeroes_pose_and_counters() {
        let (enc, mut odo) = setup();
        pulse(&enc, WheelSide::Left, 40);
        odo.update();
        odo.reset_pose();
        assert_eq!(odo.pose(), Pose::default());
        assert_eq!(enc.read_both(), (0, 0));
        assert_eq!(odo.update(), Motion::default());
    }

    #[test]
    fn init_discards_prior_motion() {
        let (enc, mut odo) = setup();
        pulse(&enc, WheelSide::Left, 300);
        odo.init(10.0, -5.0, 0.0);
        odo.update();
        assert_eq!(odo.pose(), Pose { x: 10.0, y: -5.0, heading: 0.0 });
    }

    #[test]
    fn set_pose_wraps_heading() {
        let (_enc, mut odo) = setup();
        odo.set_pose(1.0, 2.0, 270.0);
        assert!((odo.heading_degrees() + 90.0).abs() < 1e-9);
        assert!((odo.distance_from_origin() - 5f64.sqrt()).abs() < 1e-12);
    }
}
