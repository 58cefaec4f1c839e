//! The periodic driver that ties counters, controller, odometry and motors
//! together.
//!
//! One `tick()` snapshots both counters, feeds the deltas since the last
//! executed PID step to the velocity controller, shapes and applies any
//! resulting command, then integrates odometry. `run_for` repeats that at
//! the configured cadence.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use amr_traits::Motor;
use amr_traits::clock::Clock;
use eyre::WrapErr;

use crate::config::{ActuatorCfg, LoopCfg};
use crate::encoder::{EncoderPair, WheelSide};
use crate::error::{DriveError, Result};
use crate::hw_error::map_boxed;
use crate::odometry::{Motion, OdometryIntegrator, Pose};
use crate::status::UpdateOutcome;
use crate::velocity::{MotorCommand, VelocityController};
use crate::watcher::EdgeWatcher;

/// What one `tick()` did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickReport {
    pub outcome: UpdateOutcome,
    /// Command actually sent to the motors (after shaping), if any.
    pub applied: Option<MotorCommand>,
    pub motion: Motion,
    pub pose: Pose,
}

/// Totals from `run_for`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunSummary {
    pub ticks: u64,
    pub commands: u64,
    pub elapsed: Duration,
    pub pose: Pose,
    pub interrupted: bool,
}

pub struct DriveLoop<L = Box<dyn Motor>, R = Box<dyn Motor>> {
    pub(crate) encoders: Arc<EncoderPair>,
    pub(crate) controller: VelocityController,
    pub(crate) odometry: OdometryIntegrator,
    pub(crate) left: L,
    pub(crate) right: R,
    pub(crate) actuator: ActuatorCfg,
    pub(crate) cadence: LoopCfg,
    pub(crate) clock: Arc<dyn Clock + Send + Sync>,
    pub(crate) watchers: Vec<EdgeWatcher>,
    // Counter values and time at the last executed PID step.
    pub(crate) ctl_counts: (i64, i64),
    pub(crate) ctl_at: Instant,
    pub(crate) last_applied: MotorCommand,
}

impl<L, R> core::fmt::Debug for DriveLoop<L, R> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DriveLoop")
            .field("controller", &self.controller)
            .field("pose", &self.odometry.pose())
            .field("last_applied", &self.last_applied)
            .field("watchers", &self.watchers.len())
            .finish()
    }
}

impl<L: Motor, R: Motor> DriveLoop<L, R> {
    pub fn encoders(&self) -> &Arc<EncoderPair> {
        &self.encoders
    }

    pub fn controller(&self) -> &VelocityController {
        &self.controller
    }

    /// Direct access for setters (targets, gains, ramp). Prefer
    /// [`DriveLoop::enable`] over toggling the controller here so the
    /// loop's rate baseline follows.
    pub fn controller_mut(&mut self) -> &mut VelocityController {
        &mut self.controller
    }

    pub fn odometry(&self) -> &OdometryIntegrator {
        &self.odometry
    }

    pub fn pose(&self) -> Pose {
        self.odometry.pose()
    }

    pub fn last_applied(&self) -> MotorCommand {
        self.last_applied
    }

    pub fn cadence(&self) -> &LoopCfg {
        &self.cadence
    }

    pub fn watchers(&self) -> &[EdgeWatcher] {
        &self.watchers
    }

    fn sync_baseline(&mut self) {
        self.ctl_counts = self.encoders.read_both();
        self.ctl_at = self.clock.now();
    }

    /// Enable or disable closed-loop control. Disabling also stops both
    /// motors.
    pub fn enable(&mut self, on: bool) -> Result<()> {
        self.sync_baseline();
        self.controller.enable(on);
        if on { Ok(()) } else { self.stop_motors() }
    }

    pub fn is_enabled(&self) -> bool {
        self.controller.is_enabled()
    }

    /// Enable control if needed, then ramp toward the given wheel rates.
    /// Targets set on a disabled controller skip the ramp.
    pub fn drive_at(&mut self, left_pps: f32, right_pps: f32) -> Result<()> {
        if !self.is_enabled() {
            self.enable(true)?;
        }
        self.controller.set_target_rates(left_pps, right_pps);
        Ok(())
    }

    pub fn set_pose(&mut self, x: f64, y: f64, heading_deg: f64) {
        self.odometry.set_pose(x, y, heading_deg);
    }

    /// Zero pose and counters. The rate baseline is re-zeroed with them.
    pub fn reset_pose(&mut self) {
        self.odometry.reset_pose();
        self.ctl_counts = (0, 0);
    }

    /// First fault reported by any edge watcher. A watcher whose thread is
    /// gone without reporting (it panicked) counts as a fault too, since its
    /// wheel count is frozen.
    fn watcher_fault(&self) -> Option<(WheelSide, DriveError)> {
        self.watchers.iter().find_map(|w| {
            w.take_fault()
                .or_else(|| {
                    (!w.is_running())
                        .then(|| DriveError::HardwareFault("edge watcher exited".into()))
                })
                .map(|f| (w.side(), f))
        })
    }

    fn apply(&mut self, cmd: MotorCommand) -> Result<()> {
        self.left
            .set_command(cmd.left)
            .map_err(|e| eyre::Report::new(map_boxed(e.as_ref())))
            .wrap_err("left motor command failed")?;
        self.right
            .set_command(cmd.right)
            .map_err(|e| eyre::Report::new(map_boxed(e.as_ref())))
            .wrap_err("right motor command failed")?;
        self.last_applied = cmd;
        Ok(())
    }

    /// One control period.
    pub fn tick(&mut self) -> Result<TickReport> {
        if let Some((side, fault)) = self.watcher_fault() {
            self.halt();
            return Err(eyre::Report::new(fault))
                .wrap_err_with(|| format!("{side} encoder stopped"));
        }

        let now = self.clock.now();
        let (l, r) = self.encoders.read_both();
        let outcome = if self.controller.is_enabled() {
            let elapsed = now.saturating_duration_since(self.ctl_at);
            self.controller.update(
                l.wrapping_sub(self.ctl_counts.0),
                r.wrapping_sub(self.ctl_counts.1),
                elapsed,
            )
        } else {
            UpdateOutcome::Disabled
        };

        let applied = match outcome {
            UpdateOutcome::Commanded(cmd) => {
                self.ctl_counts = (l, r);
                self.ctl_at = now;
                let shaped = cmd.shaped(&self.actuator);
                if let Err(e) = self.apply(shaped) {
                    self.halt();
                    return Err(e);
                }
                Some(shaped)
            }
            UpdateOutcome::Disabled => {
                self.ctl_counts = (l, r);
                self.ctl_at = now;
                None
            }
            UpdateOutcome::ZeroElapsed | UpdateOutcome::NotDue => None,
        };

        let motion = self.odometry.update();
        Ok(TickReport {
            outcome,
            applied,
            motion,
            pose: self.odometry.pose(),
        })
    }

    /// Tick every `cadence.tick` until `duration` has passed or `shutdown`
    /// is raised, then disable control and stop the motors.
    pub fn run_for(&mut self, duration: Duration, shutdown: &AtomicBool) -> Result<RunSummary> {
        let start = self.clock.now();
        let mut ticks = 0u64;
        let mut commands = 0u64;
        let mut interrupted = false;
        tracing::info!(?duration, tick = ?self.cadence.tick, "drive run start");

        loop {
            if shutdown.load(Ordering::Relaxed) {
                interrupted = true;
                tracing::info!("drive run interrupted");
                break;
            }
            if self.clock.since(start) >= duration {
                break;
            }
            let report = self.tick()?;
            ticks += 1;
            if report.applied.is_some() {
                commands += 1;
            }
            self.clock.sleep(self.cadence.tick);
        }

        self.stop()?;
        let summary = RunSummary {
            ticks,
            commands,
            elapsed: self.clock.since(start),
            pose: self.odometry.pose(),
            interrupted,
        };
        tracing::info!(
            ticks,
            commands,
            x = summary.pose.x,
            y = summary.pose.y,
            heading_deg = summary.pose.heading_degrees(),
            "drive run complete"
        );
        Ok(summary)
    }

    /// Disable control and stop both motors.
    pub fn stop(&mut self) -> Result<()> {
        self.controller.enable(false);
        self.stop_motors()
    }

    fn stop_motors(&mut self) -> Result<()> {
        let left = self.left.stop();
        let right = self.right.stop();
        self.last_applied = MotorCommand::STOP;
        left.map_err(|e| eyre::Report::new(map_boxed(e.as_ref())))
            .wrap_err("left motor stop failed")?;
        right
            .map_err(|e| eyre::Report::new(map_boxed(e.as_ref())))
            .wrap_err("right motor stop failed")?;
        Ok(())
    }

    // Best-effort stop on an error path; the original error wins.
    fn halt(&mut self) {
        self.controller.enable(false);
        if let Err(e) = self.stop_motors() {
            tracing::warn!(error = %e, "motor stop failed during abort");
        }
    }
}
