#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema and encoder calibration parsing for the drive stack.
//!
//! - `Config` and its sections are deserialized from TOML and validated.
//! - The calibration CSV loader enforces headers and fits pulses per
//!   revolution through the origin, with one outlier-rejecting refit.
use serde::Deserialize;

/// Calibration CSV schema.
///
/// Expected headers:
/// pulses,revolutions
///
/// Example:
/// pulses,revolutions
/// 3420,1.0
/// 6831,2.0
#[derive(Debug, Deserialize, Clone, Copy)]
pub struct CalibrationRow {
    pub pulses: i64,
    pub revolutions: f64,
}

/// BCM pin numbers. Motor pins drive the two PWM inputs of a BTS7960-style
/// H-bridge; a positive command drives `*_forward`.
#[derive(Debug, Deserialize)]
pub struct Pins {
    pub encoder_left_a: u8,
    pub encoder_left_b: u8,
    pub encoder_right_a: u8,
    pub encoder_right_b: u8,
    pub motor_left_forward: u8,
    pub motor_left_reverse: u8,
    pub motor_right_forward: u8,
    pub motor_right_reverse: u8,
}

impl Pins {
    pub fn all(&self) -> [u8; 8] {
        [
            self.encoder_left_a,
            self.encoder_left_b,
            self.encoder_right_a,
            self.encoder_right_b,
            self.motor_left_forward,
            self.motor_left_reverse,
            self.motor_right_forward,
            self.motor_right_reverse,
        ]
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct EncoderCfg {
    pub pulses_per_revolution: i64,
    /// Optional per-wheel override of `pulses_per_revolution`.
    pub left_pulses_per_revolution: Option<i64>,
    pub right_pulses_per_revolution: Option<i64>,
    pub left_inverted: bool,
    pub right_inverted: bool,
}

impl Default for EncoderCfg {
    fn default() -> Self {
        Self {
            pulses_per_revolution: 3418,
            left_pulses_per_revolution: None,
            right_pulses_per_revolution: None,
            left_inverted: false,
            right_inverted: true,
        }
    }
}

impl EncoderCfg {
    pub fn left_ppr(&self) -> i64 {
        self.left_pulses_per_revolution
            .unwrap_or(self.pulses_per_revolution)
    }

    pub fn right_ppr(&self) -> i64 {
        self.right_pulses_per_revolution
            .unwrap_or(self.pulses_per_revolution)
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Geometry {
    pub wheel_diameter_cm: f64,
    pub wheel_base_cm: f64,
}

impl Default for Geometry {
    fn default() -> Self {
        Self {
            wheel_diameter_cm: 15.5,
            wheel_base_cm: 63.5,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
pub struct Gains {
    pub kp: f32,
    pub ki: f32,
    pub kd: f32,
}

impl Default for Gains {
    fn default() -> Self {
        Self {
            kp: 0.08,
            ki: 0.02,
            kd: 0.002,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct VelocityCfg {
    /// Gains applied to both wheels unless overridden.
    pub gains: Gains,
    pub left: Option<Gains>,
    pub right: Option<Gains>,
    pub integral_clamp: f32,
    /// Minimum time between PID steps (floored at 5 ms at runtime).
    pub update_period_ms: u64,
    /// Soft-start/soft-stop ramp; 0 disables.
    pub ramp_ms: u64,
}

impl Default for VelocityCfg {
    fn default() -> Self {
        Self {
            gains: Gains::default(),
            left: None,
            right: None,
            integral_clamp: 500.0,
            update_period_ms: 50,
            ramp_ms: 600,
        }
    }
}

impl VelocityCfg {
    pub fn left_gains(&self) -> Gains {
        self.left.unwrap_or(self.gains)
    }

    pub fn right_gains(&self) -> Gains {
        self.right.unwrap_or(self.gains)
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ActuatorCfg {
    pub max_command: i32,
    /// Non-zero commands below this magnitude are raised to it. 0 disables.
    pub min_command: i32,
    pub left_compensation: f32,
    pub right_compensation: f32,
}

impl Default for ActuatorCfg {
    fn default() -> Self {
        Self {
            max_command: 255,
            min_command: 80,
            left_compensation: 1.0,
            right_compensation: 1.0,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RunnerCfg {
    /// Main loop cadence.
    pub tick_ms: u64,
}

impl Default for RunnerCfg {
    fn default() -> Self {
        Self { tick_ms: 20 }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Hardware {
    /// Max time one encoder wait blocks before re-checking for shutdown.
    pub edge_poll_ms: u64,
    /// Software PWM frequency for the motor driver inputs.
    pub pwm_frequency_hz: f64,
}

impl Default for Hardware {
    fn default() -> Self {
        Self {
            edge_poll_ms: 50,
            pwm_frequency_hz: 1000.0,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Config {
    pub pins: Pins,
    #[serde(default)]
    pub encoder: EncoderCfg,
    #[serde(default)]
    pub geometry: Geometry,
    #[serde(default)]
    pub velocity: VelocityCfg,
    #[serde(default)]
    pub actuator: ActuatorCfg,
    #[serde(default)]
    pub runner: RunnerCfg,
    #[serde(default)]
    pub hardware: Hardware,
    #[serde(default)]
    pub logging: Logging,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

/// Measured pulses per revolution from a calibration run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EncoderCalibration {
    pub pulses_per_revolution: u32,
    /// RMS residual of the accepted fit, in pulses.
    pub residual_rms: f64,
    /// Rows that survived outlier rejection.
    pub rows_used: usize,
}

// Least-squares slope of pulses = k * revolutions through the origin.
fn fit_through_origin(pts: &[(f64, f64)]) -> Option<f64> {
    let sxx: f64 = pts.iter().map(|(r, _)| r * r).sum();
    let sxy: f64 = pts.iter().map(|(r, p)| r * p).sum();
    if !sxx.is_finite() || sxx == 0.0 {
        return None;
    }
    let k = sxy / sxx;
    k.is_finite().then_some(k)
}

fn rms_residual(pts: &[(f64, f64)], k: f64) -> f64 {
    if pts.is_empty() {
        return 0.0;
    }
    let sumsq: f64 = pts
        .iter()
        .map(|(r, p)| {
            let e = p - k * r;
            e * e
        })
        .sum();
    (sumsq / pts.len() as f64).sqrt()
}

impl EncoderCalibration {
    /// Fit `pulses = ppr * revolutions`, drop rows whose residual exceeds
    /// twice the RMS, and refit when at least one row remains.
    pub fn from_rows(rows: &[CalibrationRow]) -> eyre::Result<Self> {
        if rows.is_empty() {
            eyre::bail!("calibration requires at least one row");
        }
        for (i, r) in rows.iter().enumerate() {
            if !r.revolutions.is_finite() {
                eyre::bail!("calibration row {} has non-finite revolutions", i + 1);
            }
        }
        let pts: Vec<(f64, f64)> = rows
            .iter()
            .map(|r| (r.revolutions, r.pulses as f64))
            .collect();

        let Some(k0) = fit_through_origin(&pts) else {
            eyre::bail!("calibration cannot determine slope (all revolutions are zero)");
        };
        let rms0 = rms_residual(&pts, k0);

        let inliers: Vec<(f64, f64)> = if rms0 > 0.0 {
            pts.iter()
                .copied()
                .filter(|(r, p)| (p - k0 * r).abs() <= 2.0 * rms0)
                .collect()
        } else {
            pts.clone()
        };
        let (k, used) = match fit_through_origin(&inliers) {
            Some(k) if inliers.len() < pts.len() => (k, inliers),
            _ => (k0, pts),
        };

        if k <= 0.0 {
            eyre::bail!(
                "calibration produced non-positive pulses per revolution ({k:.1}); check encoder inversion"
            );
        }
        let rounded = k.round();
        if rounded < 1.0 || rounded > f64::from(u32::MAX) {
            eyre::bail!("calibration produced out-of-range pulses per revolution ({k:.1})");
        }

        Ok(Self {
            pulses_per_revolution: rounded as u32,
            residual_rms: rms_residual(&used, k),
            rows_used: used.len(),
        })
    }
}

impl TryFrom<&[CalibrationRow]> for EncoderCalibration {
    type Error = eyre::Report;
    fn try_from(rows: &[CalibrationRow]) -> Result<Self, Self::Error> {
        Self::from_rows(rows)
    }
}

pub fn load_calibration_csv(path: &std::path::Path) -> eyre::Result<EncoderCalibration> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| eyre::eyre!("open calibration CSV {:?}: {}", path, e))?;

    let headers = rdr
        .headers()
        .map_err(|e| eyre::eyre!("read CSV headers {:?}: {}", path, e))?
        .clone();
    let expected = ["pulses", "revolutions"];
    let actual: Vec<String> = headers.iter().map(|s| s.to_string()).collect();
    if actual != expected {
        eyre::bail!(
            "calibration CSV must have headers 'pulses,revolutions', got: {}",
            actual.join(",")
        );
    }

    let mut rows = Vec::new();
    for (idx, rec) in rdr.deserialize::<CalibrationRow>().enumerate() {
        match rec {
            Ok(row) => rows.push(row),
            Err(e) => eyre::bail!("invalid CSV row {}: {}", idx + 2, e),
        }
    }

    EncoderCalibration::from_rows(&rows)
}

fn check_gains(name: &str, g: Gains) -> eyre::Result<()> {
    for (k, v) in [("kp", g.kp), ("ki", g.ki), ("kd", g.kd)] {
        if !v.is_finite() || v < 0.0 {
            eyre::bail!("velocity.{name}.{k} must be a finite value >= 0");
        }
    }
    Ok(())
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Pins
        let pins = self.pins.all();
        for (i, a) in pins.iter().enumerate() {
            if pins[i + 1..].contains(a) {
                eyre::bail!("pins must be distinct (pin {a} is assigned twice)");
            }
        }

        // Encoder
        if self.encoder.pulses_per_revolution <= 0 {
            eyre::bail!("encoder.pulses_per_revolution must be > 0");
        }
        if self.encoder.left_ppr() <= 0 {
            eyre::bail!("encoder.left_pulses_per_revolution must be > 0");
        }
        if self.encoder.right_ppr() <= 0 {
            eyre::bail!("encoder.right_pulses_per_revolution must be > 0");
        }
        if self.encoder.left_ppr() > i64::from(u32::MAX) || self.encoder.right_ppr() > i64::from(u32::MAX) {
            eyre::bail!("encoder.pulses_per_revolution is out of range");
        }

        // Geometry
        if !(self.geometry.wheel_diameter_cm.is_finite() && self.geometry.wheel_diameter_cm > 0.0) {
            eyre::bail!("geometry.wheel_diameter_cm must be > 0");
        }
        if !(self.geometry.wheel_base_cm.is_finite() && self.geometry.wheel_base_cm > 0.0) {
            eyre::bail!("geometry.wheel_base_cm must be > 0");
        }

        // Velocity
        check_gains("gains", self.velocity.gains)?;
        if let Some(g) = self.velocity.left {
            check_gains("left", g)?;
        }
        if let Some(g) = self.velocity.right {
            check_gains("right", g)?;
        }
        if !(self.velocity.integral_clamp.is_finite() && self.velocity.integral_clamp >= 0.0) {
            eyre::bail!("velocity.integral_clamp must be >= 0");
        }
        if self.velocity.update_period_ms < 5 {
            eyre::bail!("velocity.update_period_ms must be >= 5");
        }
        if self.velocity.ramp_ms > 60 * 1000 {
            eyre::bail!("velocity.ramp_ms is unreasonably large (>60s)");
        }

        // Actuator
        if self.actuator.max_command <= 0 {
            eyre::bail!("actuator.max_command must be > 0");
        }
        if self.actuator.min_command < 0 || self.actuator.min_command > self.actuator.max_command {
            eyre::bail!("actuator.min_command must be in [0, max_command]");
        }
        for (k, v) in [
            ("left_compensation", self.actuator.left_compensation),
            ("right_compensation", self.actuator.right_compensation),
        ] {
            if !(v.is_finite() && v > 0.0 && v <= 2.0) {
                eyre::bail!("actuator.{k} must be in (0.0, 2.0]");
            }
        }

        // Runner
        if self.runner.tick_ms == 0 {
            eyre::bail!("runner.tick_ms must be >= 1");
        }

        // Hardware
        if self.hardware.edge_poll_ms == 0 {
            eyre::bail!("hardware.edge_poll_ms must be >= 1");
        }
        if !(self.hardware.pwm_frequency_hz.is_finite() && self.hardware.pwm_frequency_hz > 0.0) {
            eyre::bail!("hardware.pwm_frequency_hz must be > 0");
        }

        // Logging
        if let Some(r) = self.logging.rotation.as_deref()
            && !matches!(r, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never, daily, hourly");
        }

        Ok(())
    }
}
