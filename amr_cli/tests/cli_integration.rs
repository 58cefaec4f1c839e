use assert_cmd::prelude::*;
use predicates::prelude::*;
use rstest::rstest;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::process::Command;
use tempfile::tempdir;

// Minimal valid config; pins are unused by the sim backend but must be present.
fn write_valid_config(dir: &tempfile::TempDir) -> PathBuf {
    let toml = r#"
[pins]
encoder_left_a = 17
encoder_left_b = 27
encoder_right_a = 22
encoder_right_b = 23
motor_left_forward = 12
motor_left_reverse = 13
motor_right_forward = 18
motor_right_reverse = 19

[velocity]
ramp_ms = 0

[velocity.gains]
kp = 0.05
ki = 0.5
kd = 0.0
"#;
    let path = dir.path().join("cfg.toml");
    fs::write(&path, toml).unwrap();
    path
}

#[rstest]
#[case(&["--help"], 0, "Usage:", "stdout")]
#[case(&["run", "--left-pps", "800", "--duration-ms", "300"], 0, "run complete", "stdout")]
#[case(&["self-check"], 0, "self-check complete", "stdout")]
#[case(&["health"], 0, "healthy: backend=sim", "stdout")]
#[case(&["run"], 2, "required", "stderr")]
fn cli_table_cases(
    #[case] args: &[&str],
    #[case] exit_code: i32,
    #[case] needle: &str,
    #[case] stream: &str,
) {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    let mut cmd = Command::cargo_bin("amr").unwrap();

    // Always include a valid config to avoid relying on default path
    cmd.arg("--config").arg(&cfg);
    for a in args {
        cmd.arg(a);
    }

    let assert = cmd.assert().code(exit_code);
    match stream {
        "stdout" => {
            assert.stdout(predicate::str::contains(needle));
        }
        "stderr" => {
            assert.stderr(predicate::str::contains(needle));
        }
        other => panic!("unknown stream: {other}"),
    }
}

#[rstest]
fn cli_reports_bad_calibration_header() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    let bad_csv = dir.path().join("calib.csv");
    let mut f = fs::File::create(&bad_csv).unwrap();
    writeln!(f, "pulses,turns").unwrap();
    writeln!(f, "3418,1.0").unwrap();
    writeln!(f, "6836,2.0").unwrap();

    let mut cmd = Command::cargo_bin("amr").unwrap();
    cmd.arg("--config")
        .arg(&cfg)
        .arg("--calibration")
        .arg(&bad_csv)
        .arg("health");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Invalid headers"));
}

#[rstest]
fn cli_applies_calibrated_ppr() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    let csv = dir.path().join("calib.csv");
    fs::write(&csv, "pulses,revolutions\n3400,1.0\n6800,2.0\n10200,3.0\n").unwrap();

    let mut cmd = Command::cargo_bin("amr").unwrap();
    cmd.arg("--config")
        .arg(&cfg)
        .arg("--calibration")
        .arg(&csv)
        .arg("health");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("ppr=3400/3400"));
}

#[rstest]
#[case("wheel_diameter_cm = 0.0", "geometry.wheel_diameter_cm")]
#[case("wheel_base_cm = -1.0", "geometry.wheel_base_cm")]
fn cli_rejects_invalid_geometry(#[case] line: &str, #[case] needle: &str) {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);
    let mut text = fs::read_to_string(&cfg).unwrap();
    text.push_str(&format!("\n[geometry]\n{line}\n"));
    fs::write(&cfg, text).unwrap();

    let mut cmd = Command::cargo_bin("amr").unwrap();
    cmd.arg("--config").arg(&cfg).arg("health");
    cmd.assert()
        .code(1)
        .stderr(predicate::str::contains("Configuration is invalid"))
        .stderr(predicate::str::contains(needle));
}

#[rstest]
fn cli_missing_config_fails() {
    let dir = tempdir().unwrap();
    let mut cmd = Command::cargo_bin("amr").unwrap();
    cmd.arg("--config")
        .arg(dir.path().join("nope.toml"))
        .arg("health");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("read config"));
}
