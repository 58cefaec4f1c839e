//! Type-state builder for `DriveLoop` and the generic `build_drive_loop`
//! constructor.
//!
//! `build()` is only available once encoders and motors are provided;
//! `try_build()` is always available and checks dynamically.

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use amr_traits::clock::{Clock, MonotonicClock};
use amr_traits::{EdgeSource, Motor};

use crate::config::{ActuatorCfg, DriveCfg, DriveGeometry, LoopCfg, PidGains, VelocityCfg};
use crate::encoder::{EncoderConfig, EncoderPair, WheelSide};
use crate::error::{BuildError, Result};
use crate::odometry::OdometryIntegrator;
use crate::runner::DriveLoop;
use crate::velocity::{MotorCommand, VelocityController};
use crate::watcher::EdgeWatcher;

pub struct Missing;
pub struct Set;

type BoxedEdgeSource = Box<dyn EdgeSource + Send>;

pub struct DriveLoopBuilder<E, M> {
    encoders: Option<Arc<EncoderPair>>,
    edge_sources: Option<(BoxedEdgeSource, BoxedEdgeSource)>,
    motors: Option<(Box<dyn Motor>, Box<dyn Motor>)>,
    cfg: DriveCfg,
    clock: Option<Arc<dyn Clock + Send + Sync>>,
    _e: PhantomData<E>,
    _m: PhantomData<M>,
}

impl Default for DriveLoopBuilder<Missing, Missing> {
    fn default() -> Self {
        Self {
            encoders: None,
            edge_sources: None,
            motors: None,
            cfg: DriveCfg::default(),
            clock: None,
            _e: PhantomData,
            _m: PhantomData,
        }
    }
}

impl DriveLoop {
    pub fn builder() -> DriveLoopBuilder<Missing, Missing> {
        DriveLoopBuilder::default()
    }
}

fn invalid(msg: &'static str) -> eyre::Report {
    eyre::Report::new(BuildError::InvalidConfig(msg))
}

fn gains_finite(g: PidGains) -> bool {
    g.kp.is_finite() && g.ki.is_finite() && g.kd.is_finite()
}

/// Reject configurations the loop cannot run with.
pub fn validate_cfg(cfg: &DriveCfg) -> Result<()> {
    let g = &cfg.geometry;
    if !(g.wheel_diameter_cm.is_finite() && g.wheel_diameter_cm > 0.0) {
        return Err(invalid("wheel diameter must be > 0"));
    }
    if !(g.wheel_base_cm.is_finite() && g.wheel_base_cm > 0.0) {
        return Err(invalid("wheel base must be > 0"));
    }
    let a = &cfg.actuator;
    if a.max_command <= 0 {
        return Err(invalid("max command must be > 0"));
    }
    if !(0..=a.max_command).contains(&a.min_command) {
        return Err(invalid("min command must be within 0..=max command"));
    }
    let v = &cfg.velocity;
    if !gains_finite(v.left_gains) || !gains_finite(v.right_gains) {
        return Err(invalid("pid gains must be finite"));
    }
    if !(v.integral_clamp.is_finite() && v.integral_clamp >= 0.0) {
        return Err(invalid("integral clamp must be >= 0"));
    }
    if !(v.left_compensation.is_finite() && v.right_compensation.is_finite()) {
        return Err(invalid("compensation must be finite"));
    }
    if cfg.cadence.tick.is_zero() {
        return Err(invalid("loop tick must be > 0"));
    }
    if cfg.cadence.edge_poll.is_zero() {
        return Err(invalid("edge poll timeout must be > 0"));
    }
    Ok(())
}

fn spawn_watcher(
    encoders: &Arc<EncoderPair>,
    side: WheelSide,
    source: BoxedEdgeSource,
    poll: Duration,
) -> Result<EdgeWatcher> {
    let decoder = encoders
        .decoder(side)
        .ok_or_else(|| invalid("encoder already has a decoder attached"))?;
    Ok(EdgeWatcher::spawn(source, decoder, poll)?)
}

/// Validate configuration and assemble a `DriveLoop`.
fn validate_and_build<L: Motor, R: Motor>(
    encoders: Arc<EncoderPair>,
    edge_sources: Option<(BoxedEdgeSource, BoxedEdgeSource)>,
    left: L,
    right: R,
    cfg: DriveCfg,
    clock: Option<Arc<dyn Clock + Send + Sync>>,
) -> Result<DriveLoop<L, R>> {
    validate_cfg(&cfg)?;
    let clock: Arc<dyn Clock + Send + Sync> = match clock {
        Some(c) => c,
        None => Arc::new(MonotonicClock::new()),
    };

    let mut watchers = Vec::new();
    if let Some((l_src, r_src)) = edge_sources {
        let poll = cfg.cadence.edge_poll;
        watchers.push(spawn_watcher(&encoders, WheelSide::Left, l_src, poll)?);
        watchers.push(spawn_watcher(&encoders, WheelSide::Right, r_src, poll)?);
    }

    let controller = VelocityController::new(cfg.velocity, cfg.actuator.max_command, Arc::clone(&clock));
    let odometry = OdometryIntegrator::new(Arc::clone(&encoders), cfg.geometry);
    let ctl_counts = encoders.read_both();
    let ctl_at = clock.now();

    tracing::debug!(
        left_ppr = encoders.pulses_per_revolution(WheelSide::Left),
        right_ppr = encoders.pulses_per_revolution(WheelSide::Right),
        watchers = watchers.len(),
        "drive loop built"
    );

    Ok(DriveLoop {
        encoders,
        controller,
        odometry,
        left,
        right,
        actuator: cfg.actuator,
        cadence: cfg.cadence,
        clock,
        watchers,
        ctl_counts,
        ctl_at,
        last_applied: MotorCommand::STOP,
    })
}

impl<E, M> DriveLoopBuilder<E, M> {
    /// Dynamic validation; available in any builder state.
    pub fn try_build(self) -> Result<DriveLoop> {
        let encoders = self
            .encoders
            .ok_or_else(|| eyre::Report::new(BuildError::MissingEncoders))?;
        let (left, right) = self
            .motors
            .ok_or_else(|| eyre::Report::new(BuildError::MissingMotors))?;
        validate_and_build(encoders, self.edge_sources, left, right, self.cfg, self.clock)
    }

    pub fn with_config(mut self, cfg: DriveCfg) -> Self {
        self.cfg = cfg;
        self
    }

    pub fn with_velocity(mut self, velocity: VelocityCfg) -> Self {
        self.cfg.velocity = velocity;
        self
    }

    pub fn with_actuator(mut self, actuator: ActuatorCfg) -> Self {
        self.cfg.actuator = actuator;
        self
    }

    pub fn with_geometry(mut self, geometry: DriveGeometry) -> Self {
        self.cfg.geometry = geometry;
        self
    }

    pub fn with_cadence(mut self, cadence: LoopCfg) -> Self {
        self.cfg.cadence = cadence;
        self
    }

    /// Defaults to `MonotonicClock`.
    pub fn with_clock(mut self, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Spawn one `EdgeWatcher` per wheel on build. Without this, edges must
    /// be fed through decoders obtained from the encoder pair.
    pub fn with_edge_sources(
        mut self,
        left: impl EdgeSource + Send + 'static,
        right: impl EdgeSource + Send + 'static,
    ) -> Self {
        self.edge_sources = Some((Box::new(left), Box::new(right)));
        self
    }
}

impl<M> DriveLoopBuilder<Missing, M> {
    /// Share an existing encoder pair.
    pub fn with_encoders(self, encoders: Arc<EncoderPair>) -> DriveLoopBuilder<Set, M> {
        DriveLoopBuilder {
            encoders: Some(encoders),
            edge_sources: self.edge_sources,
            motors: self.motors,
            cfg: self.cfg,
            clock: self.clock,
            _e: PhantomData,
            _m: PhantomData,
        }
    }

    pub fn with_encoder_config(
        self,
        left: EncoderConfig,
        right: EncoderConfig,
    ) -> DriveLoopBuilder<Set, M> {
        self.with_encoders(EncoderPair::new(left, right))
    }
}

impl<E> DriveLoopBuilder<E, Missing> {
    pub fn with_motors(
        self,
        left: impl Motor + 'static,
        right: impl Motor + 'static,
    ) -> DriveLoopBuilder<E, Set> {
        DriveLoopBuilder {
            encoders: self.encoders,
            edge_sources: self.edge_sources,
            motors: Some((Box::new(left), Box::new(right))),
            cfg: self.cfg,
            clock: self.clock,
            _e: PhantomData,
            _m: PhantomData,
        }
    }
}

impl DriveLoopBuilder<Set, Set> {
    pub fn build(self) -> Result<DriveLoop> {
        self.try_build()
    }
}

/// Statically-dispatched constructor for callers that keep concrete motor
/// types.
pub fn build_drive_loop<L: Motor, R: Motor>(
    encoders: Arc<EncoderPair>,
    left: L,
    right: R,
    cfg: DriveCfg,
    clock: Option<Arc<dyn Clock + Send + Sync>>,
) -> Result<DriveLoop<L, R>> {
    validate_and_build(encoders, None, left, right, cfg, clock)
}
