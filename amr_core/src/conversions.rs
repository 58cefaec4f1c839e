//! `From` implementations bridging `amr_config` types to `amr_core` types.

use std::time::Duration;

use crate::config::{ActuatorCfg, DriveCfg, DriveGeometry, LoopCfg, PidGains, VelocityCfg};
use crate::encoder::EncoderConfig;

impl From<amr_config::Gains> for PidGains {
    fn from(g: amr_config::Gains) -> Self {
        Self::new(g.kp, g.ki, g.kd)
    }
}

impl From<&amr_config::Config> for VelocityCfg {
    fn from(c: &amr_config::Config) -> Self {
        Self {
            left_gains: c.velocity.left_gains().into(),
            right_gains: c.velocity.right_gains().into(),
            integral_clamp: c.velocity.integral_clamp,
            update_period: Duration::from_millis(c.velocity.update_period_ms),
            ramp: Duration::from_millis(c.velocity.ramp_ms),
            left_compensation: c.actuator.left_compensation,
            right_compensation: c.actuator.right_compensation,
        }
    }
}

impl From<&amr_config::ActuatorCfg> for ActuatorCfg {
    fn from(c: &amr_config::ActuatorCfg) -> Self {
        Self {
            max_command: c.max_command,
            min_command: c.min_command,
        }
    }
}

impl From<&amr_config::Geometry> for DriveGeometry {
    fn from(c: &amr_config::Geometry) -> Self {
        Self {
            wheel_diameter_cm: c.wheel_diameter_cm,
            wheel_base_cm: c.wheel_base_cm,
        }
    }
}

impl From<&amr_config::Config> for LoopCfg {
    fn from(c: &amr_config::Config) -> Self {
        Self {
            tick: Duration::from_millis(c.runner.tick_ms),
            edge_poll: Duration::from_millis(c.hardware.edge_poll_ms),
        }
    }
}

impl From<&amr_config::Config> for DriveCfg {
    fn from(c: &amr_config::Config) -> Self {
        Self {
            velocity: c.into(),
            actuator: (&c.actuator).into(),
            geometry: (&c.geometry).into(),
            cadence: c.into(),
        }
    }
}

/// `(left, right)` encoder settings from the `[encoder]` section.
pub fn encoder_configs(c: &amr_config::EncoderCfg) -> (EncoderConfig, EncoderConfig) {
    (
        EncoderConfig::new(c.left_ppr(), c.left_inverted),
        EncoderConfig::new(c.right_ppr(), c.right_inverted),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOML: &str = r#"
[pins]
encoder_left_a = 17
encoder_left_b = 27
encoder_right_a = 22
encoder_right_b = 23
motor_left_forward = 12
motor_left_reverse = 13
motor_right_forward = 18
motor_right_reverse = 19

[encoder]
left_pulses_per_revolution = 3400

[velocity]
ramp_ms = 0

[actuator]
right_compensation = 0.85
"#;

    #[test]
    fn config_maps_into_runtime_types() {
        let cfg = amr_config::load_toml(TOML).expect("parse");
        let drive = DriveCfg::from(&cfg);
        assert_eq!(drive.velocity.ramp, Duration::ZERO);
        assert_eq!(drive.velocity.update_period, Duration::from_millis(50));
        assert_eq!(drive.velocity.right_compensation, 0.85);
        assert_eq!(drive.cadence.tick, Duration::from_millis(20));
        assert_eq!(drive.actuator.min_command, 80);

        let (l, r) = encoder_configs(&cfg.encoder);
        assert_eq!(l.pulses_per_revolution(), 3400);
        assert_eq!(r.pulses_per_revolution(), 3418);
        assert!(r.inverted);
    }
}
