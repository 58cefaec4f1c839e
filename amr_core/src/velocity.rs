//! Per-wheel discrete PID velocity control.
//!
//! Each wheel runs its own loop (own gains, own integrator, own output
//! clamp) driving the measured pulse rate toward a ramped setpoint. The
//! controller rate-limits itself against its clock: calls arriving sooner
//! than `update_period` after the last executed tick are no-ops.

use std::sync::Arc;
use std::time::{Duration, Instant};

use amr_traits::clock::Clock;

use crate::config::{ActuatorCfg, PidGains, VelocityCfg};
use crate::encoder::WheelSide;
use crate::status::UpdateOutcome;
use crate::util::clamp_update_period;

/// Signed actuator commands for both wheels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MotorCommand {
    pub left: i32,
    pub right: i32,
}

impl MotorCommand {
    pub const STOP: MotorCommand = MotorCommand { left: 0, right: 0 };

    pub fn get(&self, side: WheelSide) -> i32 {
        match side {
            WheelSide::Left => self.left,
            WheelSide::Right => self.right,
        }
    }

    /// Clamp to the actuator range and lift small non-zero magnitudes to the
    /// deadband floor.
    pub fn shaped(self, actuator: &ActuatorCfg) -> Self {
        Self {
            left: shape_one(self.left, actuator),
            right: shape_one(self.right, actuator),
        }
    }
}

#[inline]
fn shape_one(v: i32, actuator: &ActuatorCfg) -> i32 {
    let max = actuator.max_command.max(0);
    let min = actuator.min_command.clamp(0, max);
    let v = v.clamp(-max, max);
    if v != 0 && v.abs() < min {
        v.signum() * min
    } else {
        v
    }
}

/// Loop state for one wheel.
#[derive(Debug, Clone)]
pub struct PidState {
    gains: PidGains,
    integral: f32,
    prev_error: f32,
    target: f32,
    applied: f32,
    // Applied setpoint when the current target was set; sets the soft-stop
    // slope when the target is zero.
    ramp_from: f32,
    compensation: f32,
    measured: f32,
}

impl PidState {
    fn new(gains: PidGains, compensation: f32) -> Self {
        Self {
            gains,
            integral: 0.0,
            prev_error: 0.0,
            target: 0.0,
            applied: 0.0,
            ramp_from: 0.0,
            compensation,
            measured: 0.0,
        }
    }

    pub fn gains(&self) -> PidGains {
        self.gains
    }
    pub fn integral(&self) -> f32 {
        self.integral
    }
    pub fn previous_error(&self) -> f32 {
        self.prev_error
    }
    pub fn target(&self) -> f32 {
        self.target
    }
    pub fn applied(&self) -> f32 {
        self.applied
    }
    pub fn measured(&self) -> f32 {
        self.measured
    }
    pub fn compensation(&self) -> f32 {
        self.compensation
    }

    fn reset(&mut self) {
        self.integral = 0.0;
        self.prev_error = 0.0;
        self.applied = 0.0;
        self.ramp_from = 0.0;
    }

    /// Move the applied setpoint toward the target by at most
    /// `|target| / ramp * elapsed`; pin it once reached.
    fn slew(&mut self, elapsed: Duration, ramp: Duration) {
        if ramp.is_zero() {
            self.applied = self.target;
            return;
        }
        let basis = if self.target != 0.0 {
            self.target.abs()
        } else {
            self.ramp_from.abs()
        };
        let max_delta = basis / ramp.as_secs_f32() * elapsed.as_secs_f32();
        if self.applied < self.target {
            self.applied = (self.applied + max_delta).min(self.target);
        } else if self.applied > self.target {
            self.applied = (self.applied - max_delta).max(self.target);
        }
    }

    /// One PID step. Returns the raw (unclamped, uncompensated) output.
    fn step(&mut self, measured: f32, dt: f32, integral_clamp: f32) -> f32 {
        self.measured = measured;
        let error = self.applied - measured;
        self.integral = (self.integral + error * dt).clamp(-integral_clamp, integral_clamp);
        let derivative = (error - self.prev_error) / dt;
        self.prev_error = error;
        self.gains.kp * error + self.gains.ki * self.integral + self.gains.kd * derivative
    }
}

#[inline]
fn to_command(raw: f32, compensation: f32, limit: i32) -> i32 {
    let v = (raw * compensation).round();
    if !v.is_finite() {
        return 0;
    }
    let lim = limit.max(0) as f32;
    v.clamp(-lim, lim) as i32
}

/// Independent per-wheel PID velocity controller.
pub struct VelocityController {
    wheels: [PidState; 2],
    enabled: bool,
    integral_clamp: f32,
    update_period: Duration,
    ramp: Duration,
    output_limit: i32,
    last_tick: Instant,
    executed_ticks: u64,
    clock: Arc<dyn Clock + Send + Sync>,
}

impl core::fmt::Debug for VelocityController {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("VelocityController")
            .field("enabled", &self.enabled)
            .field("left", &self.wheels[0])
            .field("right", &self.wheels[1])
            .field("update_period", &self.update_period)
            .field("ramp", &self.ramp)
            .finish()
    }
}

impl VelocityController {
    /// Create a disabled controller. `output_limit` is the actuator's
    /// symmetric command range.
    pub fn new(cfg: VelocityCfg, output_limit: i32, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        let now = clock.now();
        let mut ctl = Self {
            wheels: [
                PidState::new(cfg.left_gains, cfg.left_compensation),
                PidState::new(cfg.right_gains, cfg.right_compensation),
            ],
            enabled: false,
            integral_clamp: 0.0,
            update_period: clamp_update_period(cfg.update_period),
            ramp: cfg.ramp,
            output_limit: output_limit.max(0),
            last_tick: now,
            executed_ticks: 0,
            clock,
        };
        ctl.set_integral_clamp(cfg.integral_clamp);
        ctl
    }

    #[inline]
    fn wheel(&self, side: WheelSide) -> &PidState {
        &self.wheels[side.index()]
    }

    #[inline]
    fn wheel_mut(&mut self, side: WheelSide) -> &mut PidState {
        &mut self.wheels[side.index()]
    }

    pub fn state(&self, side: WheelSide) -> &PidState {
        self.wheel(side)
    }

    /// Enable or disable closed-loop control.
    ///
    /// Disabling zeros both wheels' integrators, previous errors and applied
    /// setpoints; the caller must stop the motors separately. Enabling starts
    /// the rate-limit window from now.
    pub fn enable(&mut self, on: bool) {
        if on {
            self.last_tick = self.clock.now();
        } else {
            for w in &mut self.wheels {
                w.reset();
            }
        }
        if self.enabled != on {
            tracing::debug!(enabled = on, "velocity control toggled");
        }
        self.enabled = on;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Set one wheel's target rate in pulses per second. While disabled the
    /// applied setpoint jumps straight to the target.
    pub fn set_target_rate(&mut self, side: WheelSide, pps: f32) {
        let enabled = self.enabled;
        let w = self.wheel_mut(side);
        w.target = pps;
        if enabled {
            w.ramp_from = w.applied;
        } else {
            w.applied = pps;
            w.ramp_from = pps;
        }
        tracing::trace!(wheel = %side, pps, "target rate set");
    }

    pub fn set_target_rates(&mut self, left_pps: f32, right_pps: f32) {
        self.set_target_rate(WheelSide::Left, left_pps);
        self.set_target_rate(WheelSide::Right, right_pps);
    }

    pub fn set_target_rate_both(&mut self, pps: f32) {
        self.set_target_rates(pps, pps);
    }

    pub fn target_rate(&self, side: WheelSide) -> f32 {
        self.wheel(side).target
    }

    /// Ramped setpoint currently fed to the PID.
    pub fn applied_rate(&self, side: WheelSide) -> f32 {
        self.wheel(side).applied
    }

    /// Rate measured on the last executed tick.
    pub fn measured_rate(&self, side: WheelSide) -> f32 {
        self.wheel(side).measured
    }

    pub fn integral(&self, side: WheelSide) -> f32 {
        self.wheel(side).integral
    }

    pub fn set_gains(&mut self, side: WheelSide, kp: f32, ki: f32, kd: f32) {
        self.wheel_mut(side).gains = PidGains::new(kp, ki, kd);
        tracing::debug!(wheel = %side, kp, ki, kd, "pid gains set");
    }

    pub fn set_gains_both(&mut self, kp: f32, ki: f32, kd: f32) {
        for side in WheelSide::BOTH {
            self.set_gains(side, kp, ki, kd);
        }
    }

    pub fn gains(&self, side: WheelSide) -> PidGains {
        self.wheel(side).gains
    }

    /// Set the minimum time between executed ticks (floored at 5 ms).
    pub fn set_update_period(&mut self, period: Duration) {
        self.update_period = clamp_update_period(period);
    }

    pub fn update_period(&self) -> Duration {
        self.update_period
    }

    pub fn set_ramp_duration(&mut self, ramp: Duration) {
        self.ramp = ramp;
    }

    pub fn ramp_duration(&self) -> Duration {
        self.ramp
    }

    /// Negative or non-finite bounds are ignored.
    pub fn set_integral_clamp(&mut self, bound: f32) {
        if bound.is_finite() && bound >= 0.0 {
            self.integral_clamp = bound;
        } else {
            tracing::warn!(bound, "ignoring invalid integral clamp");
        }
    }

    pub fn integral_clamp(&self) -> f32 {
        self.integral_clamp
    }

    /// Scale one wheel's PID output before the final clamp. Non-finite
    /// factors are ignored.
    pub fn set_compensation(&mut self, side: WheelSide, factor: f32) {
        if factor.is_finite() {
            self.wheel_mut(side).compensation = factor;
        } else {
            tracing::warn!(wheel = %side, factor, "ignoring non-finite compensation");
        }
    }

    pub fn compensation(&self, side: WheelSide) -> f32 {
        self.wheel(side).compensation
    }

    pub fn output_limit(&self) -> i32 {
        self.output_limit
    }

    pub fn set_output_limit(&mut self, limit: i32) {
        self.output_limit = limit.max(0);
    }

    /// Number of PID steps actually executed.
    pub fn executed_ticks(&self) -> u64 {
        self.executed_ticks
    }

    /// Periodic tick.
    ///
    /// `left_delta`/`right_delta` are the pulses counted since the previous
    /// executed tick; `elapsed` is the caller's view of that interval and
    /// only gates the zero-interval case. The rate itself is computed against
    /// the controller's own clock.
    pub fn update(&mut self, left_delta: i64, right_delta: i64, elapsed: Duration) -> UpdateOutcome {
        if !self.enabled {
            return UpdateOutcome::Disabled;
        }
        if elapsed.is_zero() {
            return UpdateOutcome::ZeroElapsed;
        }
        let now = self.clock.now();
        let since = now.saturating_duration_since(self.last_tick);
        if since < self.update_period {
            return UpdateOutcome::NotDue;
        }
        self.last_tick = now;
        self.executed_ticks = self.executed_ticks.saturating_add(1);

        let dt = since.as_secs_f32();
        let ramp = self.ramp;
        let clamp = self.integral_clamp;
        let limit = self.output_limit;

        let mut out = [0i32; 2];
        for (i, delta) in [left_delta, right_delta].into_iter().enumerate() {
            let w = &mut self.wheels[i];
            let measured = delta as f32 / dt;
            w.slew(since, ramp);
            let raw = w.step(measured, dt, clamp);
            out[i] = to_command(raw, w.compensation, limit);
        }
        let cmd = MotorCommand {
            left: out[0],
            right: out[1],
        };
        tracing::trace!(
            dt,
            left_meas = self.wheels[0].measured,
            right_meas = self.wheels[1].measured,
            left_sp = self.wheels[0].applied,
            right_sp = self.wheels[1].applied,
            left_cmd = cmd.left,
            right_cmd = cmd.right,
            "velocity tick"
        );
        UpdateOutcome::Commanded(cmd)
    }
}
