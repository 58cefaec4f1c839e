use amr_config::load_toml;
use rstest::rstest;

const PINS: &str = r#"
[pins]
encoder_left_a = 17
encoder_left_b = 27
encoder_right_a = 22
encoder_right_b = 23
motor_left_forward = 12
motor_left_reverse = 13
motor_right_forward = 18
motor_right_reverse = 19
"#;

fn with_pins(extra: &str) -> String {
    format!("{PINS}\n{extra}")
}

#[rstest]
fn pins_only_uses_firmware_defaults() {
    let cfg = load_toml(PINS).expect("parse TOML");
    cfg.validate().expect("defaults are valid");
    assert_eq!(cfg.encoder.pulses_per_revolution, 3418);
    assert!(!cfg.encoder.left_inverted);
    assert!(cfg.encoder.right_inverted);
    assert_eq!(cfg.geometry.wheel_diameter_cm, 15.5);
    assert_eq!(cfg.geometry.wheel_base_cm, 63.5);
    assert_eq!(cfg.velocity.update_period_ms, 50);
    assert_eq!(cfg.velocity.ramp_ms, 600);
    assert_eq!(cfg.actuator.max_command, 255);
    assert_eq!(cfg.actuator.min_command, 80);
    assert_eq!(cfg.runner.tick_ms, 20);
}

#[rstest]
fn per_wheel_overrides_fall_back_to_shared_values() {
    let cfg = load_toml(&with_pins(
        r#"
[encoder]
pulses_per_revolution = 3400
right_pulses_per_revolution = 3390

[velocity.gains]
kp = 0.1
ki = 0.0
kd = 0.0

[velocity.right]
kp = 0.2
ki = 0.01
kd = 0.0
"#,
    ))
    .expect("parse TOML");
    cfg.validate().expect("valid");
    assert_eq!(cfg.encoder.left_ppr(), 3400);
    assert_eq!(cfg.encoder.right_ppr(), 3390);
    assert_eq!(cfg.velocity.left_gains().kp, 0.1);
    assert_eq!(cfg.velocity.right_gains().kp, 0.2);
}

#[rstest]
#[case("[encoder]\npulses_per_revolution = 0", "encoder.pulses_per_revolution must be > 0")]
#[case("[encoder]\nleft_pulses_per_revolution = -5", "encoder.left_pulses_per_revolution must be > 0")]
#[case("[geometry]\nwheel_base_cm = 0.0", "geometry.wheel_base_cm must be > 0")]
#[case("[velocity]\nupdate_period_ms = 2", "velocity.update_period_ms must be >= 5")]
#[case("[velocity]\nintegral_clamp = -1.0", "velocity.integral_clamp must be >= 0")]
#[case("[velocity.left]\nkp = -0.1\nki = 0.0\nkd = 0.0", "velocity.left.kp must be")]
#[case("[actuator]\nmin_command = 300", "actuator.min_command must be in [0, max_command]")]
#[case("[actuator]\nright_compensation = 0.0", "actuator.right_compensation must be in")]
#[case("[runner]\ntick_ms = 0", "runner.tick_ms must be >= 1")]
#[case("[hardware]\nedge_poll_ms = 0", "hardware.edge_poll_ms must be >= 1")]
#[case("[logging]\nrotation = \"weekly\"", "logging.rotation must be one of")]
fn rejects_invalid_values(#[case] section: &str, #[case] needle: &str) {
    let cfg = load_toml(&with_pins(section)).expect("parse TOML");
    let err = cfg.validate().expect_err("should reject");
    assert!(format!("{err}").contains(needle), "{err}");
}

#[rstest]
fn rejects_duplicate_pins() {
    let toml = PINS.replace("motor_right_reverse = 19", "motor_right_reverse = 17");
    let cfg = load_toml(&toml).expect("parse TOML");
    let err = cfg.validate().expect_err("duplicate pin");
    assert!(format!("{err}").contains("pin 17 is assigned twice"));
}

#[rstest]
fn missing_pins_section_fails_to_parse() {
    assert!(load_toml("[encoder]\npulses_per_revolution = 3418").is_err());
}
