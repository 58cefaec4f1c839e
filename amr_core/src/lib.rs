#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Differential-drive control core (hardware-agnostic).
//!
//! All hardware interaction goes through `amr_traits::EdgeSource` and
//! `amr_traits::Motor`.
//!
//! ## Architecture
//!
//! - **Encoders**: per-wheel atomic pulse counters and the single-writer
//!   quadrature decoder (`encoder`)
//! - **Velocity**: one discrete PID loop per wheel with a ramped setpoint and
//!   anti-windup (`velocity`)
//! - **Odometry**: midpoint-heading dead reckoning (`odometry`)
//! - **Drive loop**: the periodic task wiring the above to two motors
//!   (`runner`), built with `DriveLoop::builder()`
//! - **Edge watcher**: thread standing in for the encoder interrupt (`watcher`)
//!
//! ## Concurrency
//!
//! The pulse counters are the only state shared between the event context
//! and the control loop. The decoder is the sole writer; everything else
//! reads atomic snapshots. Controller and integrator state is owned by the
//! loop and never shared.

pub mod builder;
pub mod config;
pub mod conversions;
pub mod encoder;
pub mod error;
pub mod hw_error;
pub mod mocks;
pub mod odometry;
pub mod runner;
pub mod status;
pub mod util;
pub mod velocity;
pub mod watcher;

pub use builder::{DriveLoopBuilder, build_drive_loop, validate_cfg};
pub use config::{ActuatorCfg, DriveCfg, DriveGeometry, LoopCfg, PidGains, VelocityCfg};
pub use encoder::{
    DEFAULT_PULSES_PER_REVOLUTION, EncoderConfig, EncoderPair, PulseCounter, QuadratureDecoder,
    WheelSide, decode_increment, pulses_to_distance, pulses_to_revolutions,
};
pub use error::{BuildError, DriveError, Report, Result};
pub use odometry::{Motion, OdometryIntegrator, Pose};
pub use runner::{DriveLoop, RunSummary, TickReport};
pub use status::UpdateOutcome;
pub use velocity::{MotorCommand, PidState, VelocityController};
pub use watcher::EdgeWatcher;
