//! Backend assembly and the `run`, `self-check` and `health` commands.

use std::sync::atomic::AtomicBool;
use std::time::Duration;

use amr_config::{Config, EncoderCalibration};
use amr_core::conversions::encoder_configs;
use amr_core::error::Result;
use amr_core::{DriveCfg, DriveError, DriveLoop, EncoderConfig, RunSummary, WheelSide};
use amr_traits::{EdgeSource, Motor};
use eyre::WrapErr;

type BoxedEdges = Box<dyn EdgeSource + Send>;

/// Motors and edge sources for one run.
pub struct Backend {
    pub name: &'static str,
    pub left_motor: Box<dyn Motor>,
    pub right_motor: Box<dyn Motor>,
    pub left_edges: BoxedEdges,
    pub right_edges: BoxedEdges,
    /// Whether `encoder.*_inverted` applies. Simulated wheels are never
    /// mounted mirrored.
    pub mirrored: bool,
    pub plant: Option<amr_hardware::PlantThread>,
}

#[cfg(not(feature = "hardware"))]
pub fn open_backend(_cfg: &Config) -> Result<Backend> {
    use amr_hardware::{PlantParams, SimulatedPlant};

    const SIM_STEP: Duration = Duration::from_millis(5);

    let (plant, io) = SimulatedPlant::new(PlantParams::default());
    tracing::debug!(step = ?SIM_STEP, "simulated plant started");
    Ok(Backend {
        name: "sim",
        left_motor: Box::new(io.left_motor),
        right_motor: Box::new(io.right_motor),
        left_edges: Box::new(io.left_edges),
        right_edges: Box::new(io.right_edges),
        mirrored: false,
        plant: Some(plant.spawn(SIM_STEP)),
    })
}

#[cfg(feature = "hardware")]
pub fn open_backend(cfg: &Config) -> Result<Backend> {
    use amr_hardware::gpio::{Bts7960Motor, GpioEncoder, open};

    let p = &cfg.pins;
    let max = cfg.actuator.max_command;
    let freq = cfg.hardware.pwm_frequency_hz;
    let gpio = open().wrap_err("open gpio")?;
    let left_edges = GpioEncoder::new(&gpio, p.encoder_left_a, p.encoder_left_b)
        .wrap_err("open left encoder pins")?;
    let right_edges = GpioEncoder::new(&gpio, p.encoder_right_a, p.encoder_right_b)
        .wrap_err("open right encoder pins")?;
    let left_motor = Bts7960Motor::new(&gpio, p.motor_left_forward, p.motor_left_reverse, max, freq)
        .wrap_err("open left motor pins")?;
    let right_motor =
        Bts7960Motor::new(&gpio, p.motor_right_forward, p.motor_right_reverse, max, freq)
            .wrap_err("open right motor pins")?;
    Ok(Backend {
        name: "gpio",
        left_motor: Box::new(left_motor),
        right_motor: Box::new(right_motor),
        left_edges: Box::new(left_edges),
        right_edges: Box::new(right_edges),
        mirrored: true,
        plant: None,
    })
}

/// Encoder settings after applying the calibration and the backend's
/// mounting.
pub fn encoder_setup(
    cfg: &Config,
    calib: Option<&EncoderCalibration>,
    mirrored: bool,
) -> (EncoderConfig, EncoderConfig) {
    let (mut left, mut right) = encoder_configs(&cfg.encoder);
    if let Some(c) = calib {
        let ppr = i64::from(c.pulses_per_revolution);
        left.set_pulses_per_revolution(ppr);
        right.set_pulses_per_revolution(ppr);
        tracing::info!(ppr, residual_rms = c.residual_rms, "using calibrated pulses per revolution");
    }
    if !mirrored {
        left.inverted = false;
        right.inverted = false;
    }
    (left, right)
}

fn build(
    cfg: &Config,
    calib: Option<&EncoderCalibration>,
    drive_cfg: DriveCfg,
    backend: Backend,
) -> Result<(Option<amr_hardware::PlantThread>, DriveLoop, &'static str)> {
    let (left_enc, right_enc) = encoder_setup(cfg, calib, backend.mirrored);
    let Backend {
        name,
        left_motor,
        right_motor,
        left_edges,
        right_edges,
        plant,
        ..
    } = backend;
    let drive = DriveLoop::builder()
        .with_config(drive_cfg)
        .with_encoder_config(left_enc, right_enc)
        .with_edge_sources(left_edges, right_edges)
        .with_motors(left_motor, right_motor)
        .build()?;
    Ok((plant, drive, name))
}

#[derive(Debug, Clone, Copy)]
pub struct RunRequest {
    pub left_pps: f32,
    pub right_pps: f32,
    pub duration: Duration,
    pub ramp: Option<Duration>,
    pub heading_deg: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct DriveReport {
    pub backend: &'static str,
    pub summary: RunSummary,
    pub counts: (i64, i64),
}

pub fn run_drive(
    cfg: &Config,
    calib: Option<&EncoderCalibration>,
    req: &RunRequest,
    shutdown: &AtomicBool,
) -> Result<DriveReport> {
    let mut drive_cfg = DriveCfg::from(cfg);
    if let Some(ramp) = req.ramp {
        drive_cfg.velocity.ramp = ramp;
    }
    // Bound first so the plant outlives the loop and its watchers.
    let (_plant, mut drive, backend) = build(cfg, calib, drive_cfg, open_backend(cfg)?)?;

    drive.set_pose(0.0, 0.0, req.heading_deg);
    drive.drive_at(req.left_pps, req.right_pps)?;
    tracing::info!(
        backend,
        left_pps = req.left_pps,
        right_pps = req.right_pps,
        "drive start"
    );
    let summary = drive.run_for(req.duration, shutdown)?;
    Ok(DriveReport {
        backend,
        summary,
        counts: drive.encoders().read_both(),
    })
}

const CHECK_PPS: f32 = 400.0;
const CHECK_TIME: Duration = Duration::from_millis(400);

/// Drive both wheels forward briefly and require both encoders to count up.
pub fn self_check(
    cfg: &Config,
    calib: Option<&EncoderCalibration>,
    shutdown: &AtomicBool,
) -> Result<DriveReport> {
    let mut drive_cfg = DriveCfg::from(cfg);
    drive_cfg.velocity.ramp = Duration::ZERO;
    let (_plant, mut drive, backend) = build(cfg, calib, drive_cfg, open_backend(cfg)?)?;

    drive.drive_at(CHECK_PPS, CHECK_PPS)?;
    let summary = drive.run_for(CHECK_TIME, shutdown)?;
    let counts = drive.encoders().read_both();
    for (side, n) in [(WheelSide::Left, counts.0), (WheelSide::Right, counts.1)] {
        if n <= 0 && !summary.interrupted {
            return Err(eyre::Report::new(DriveError::HardwareFault(format!(
                "{side} encoder counted {n} pulses while driving forward"
            ))));
        }
    }
    tracing::info!(backend, left = counts.0, right = counts.1, "self-check passed");
    Ok(DriveReport {
        backend,
        summary,
        counts,
    })
}

#[derive(Debug, Clone, Copy)]
pub struct Health {
    pub backend: &'static str,
    pub left_ppr: u32,
    pub right_ppr: u32,
    pub watchers: usize,
}

/// Bring the backend up without moving and report what was found.
pub fn health(cfg: &Config, calib: Option<&EncoderCalibration>) -> Result<Health> {
    let (_plant, drive, backend) = build(cfg, calib, DriveCfg::from(cfg), open_backend(cfg)?)?;
    let watchers = drive.watchers().iter().filter(|w| w.is_running()).count();
    if watchers != drive.watchers().len() {
        return Err(eyre::Report::new(DriveError::HardwareFault(
            "edge watcher exited during startup".into(),
        )));
    }
    let encoders = drive.encoders();
    Ok(Health {
        backend,
        left_ppr: encoders.pulses_per_revolution(WheelSide::Left),
        right_ppr: encoders.pulses_per_revolution(WheelSide::Right),
        watchers,
    })
}
