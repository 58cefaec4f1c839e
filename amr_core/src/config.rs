//! Runtime configuration types for the drive core.
//!
//! These are the plain structs the controller, integrator and loop consume.
//! The TOML-deserialized schema lives in `amr_config`; see `conversions`.

use std::time::Duration;

/// Proportional/integral/derivative gains for one wheel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PidGains {
    pub kp: f32,
    pub ki: f32,
    pub kd: f32,
}

impl PidGains {
    pub const fn new(kp: f32, ki: f32, kd: f32) -> Self {
        Self { kp, ki, kd }
    }
}

impl Default for PidGains {
    fn default() -> Self {
        Self::new(0.08, 0.02, 0.002)
    }
}

/// Velocity loop configuration shared by both wheels, plus per-wheel gains
/// and output compensation.
#[derive(Debug, Clone)]
pub struct VelocityCfg {
    pub left_gains: PidGains,
    pub right_gains: PidGains,
    /// Anti-windup bound on the integral accumulator (pulse-seconds / s).
    pub integral_clamp: f32,
    /// Minimum time between executed ticks. Floored at 5 ms.
    pub update_period: Duration,
    /// Time to slew the applied setpoint from 0 to a target. Zero disables
    /// the ramp.
    pub ramp: Duration,
    /// Scalar applied to the left PID output before clamping.
    pub left_compensation: f32,
    /// Scalar applied to the right PID output before clamping.
    pub right_compensation: f32,
}

impl Default for VelocityCfg {
    fn default() -> Self {
        Self {
            left_gains: PidGains::default(),
            right_gains: PidGains::default(),
            integral_clamp: 500.0,
            update_period: Duration::from_millis(50),
            ramp: Duration::from_millis(600),
            left_compensation: 1.0,
            right_compensation: 1.0,
        }
    }
}

/// Actuator range and deadband.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActuatorCfg {
    /// Symmetric command limit (`-max..=max`).
    pub max_command: i32,
    /// Non-zero commands smaller than this are raised to it so the motor
    /// overcomes static friction. 0 disables the floor.
    pub min_command: i32,
}

impl Default for ActuatorCfg {
    fn default() -> Self {
        Self {
            max_command: 255,
            min_command: 80,
        }
    }
}

/// Wheel and chassis dimensions, in centimetres.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriveGeometry {
    pub wheel_diameter_cm: f64,
    /// Centre-to-centre distance between the two wheels.
    pub wheel_base_cm: f64,
}

impl Default for DriveGeometry {
    fn default() -> Self {
        Self {
            wheel_diameter_cm: 15.5,
            wheel_base_cm: 63.5,
        }
    }
}

impl DriveGeometry {
    #[inline]
    pub fn wheel_circumference_cm(&self) -> f64 {
        core::f64::consts::PI * self.wheel_diameter_cm
    }

    /// Travel of one wheel per decoded pulse.
    pub fn cm_per_pulse(&self, pulses_per_revolution: u32) -> f64 {
        self.wheel_circumference_cm() / f64::from(pulses_per_revolution.max(1))
    }

    /// Heading change per pulse when only one wheel moves.
    pub fn degrees_per_pulse_single(&self, pulses_per_revolution: u32) -> f64 {
        (self.cm_per_pulse(pulses_per_revolution) / self.wheel_base_cm).to_degrees()
    }

    /// Heading change per pair of opposite pulses (one wheel forward, one back).
    pub fn degrees_per_pulse_pair(&self, pulses_per_revolution: u32) -> f64 {
        2.0 * self.degrees_per_pulse_single(pulses_per_revolution)
    }
}

/// Periodic driver cadence.
#[derive(Debug, Clone)]
pub struct LoopCfg {
    /// Main loop period; the velocity controller still enforces its own
    /// `update_period` on top of this.
    pub tick: Duration,
    /// How long the edge watcher blocks for one edge before re-checking
    /// for shutdown.
    pub edge_poll: Duration,
}

impl Default for LoopCfg {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(20),
            edge_poll: Duration::from_millis(50),
        }
    }
}

/// Everything the drive loop needs besides its hardware.
#[derive(Debug, Clone, Default)]
pub struct DriveCfg {
    pub velocity: VelocityCfg,
    pub actuator: ActuatorCfg,
    pub geometry: DriveGeometry,
    pub cadence: LoopCfg,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn geometry_diagnostics_match_firmware_defaults() {
        let g = DriveGeometry::default();
        let cm = g.cm_per_pulse(3418);
        assert!((cm - 0.014_247).abs() < 1e-5, "{cm}");
        let single = g.degrees_per_pulse_single(3418);
        assert!((g.degrees_per_pulse_pair(3418) - 2.0 * single).abs() < 1e-12);
        assert!((single - 0.012_855).abs() < 1e-5, "{single}");
    }
}
