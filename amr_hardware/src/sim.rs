//! Simulated motors, encoders and a simple drive plant.
//!
//! `SimulatedPlant` closes the loop without hardware: it reads the commands
//! written to its `SimulatedMotor`s, runs a first-order speed model per
//! wheel and emits the resulting quadrature edges into `ChannelEdgeSource`s.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU64, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use amr_traits::{ChannelLevels, EdgeSource, Motor};
use crossbeam_channel as xch;

use crate::error::HwError;

/// Motor that stores its latest command for inspection.
#[derive(Debug, Clone, Default)]
pub struct SimulatedMotor {
    command: Arc<AtomicI32>,
    writes: Arc<AtomicU64>,
}

impl SimulatedMotor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_command(&self) -> i32 {
        self.command.load(Ordering::Relaxed)
    }

    /// Number of `set_command`/`stop` calls so far.
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }
}

impl Motor for SimulatedMotor {
    fn set_command(&mut self, command: i32) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.command.store(command, Ordering::Relaxed);
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.set_command(0)
    }
}

/// Edge source fed through a channel.
#[derive(Debug)]
pub struct ChannelEdgeSource {
    rx: xch::Receiver<ChannelLevels>,
}

impl ChannelEdgeSource {
    /// Unbounded channel; the sender side plays the wire.
    pub fn channel() -> (xch::Sender<ChannelLevels>, Self) {
        let (tx, rx) = xch::unbounded();
        (tx, Self { rx })
    }
}

impl EdgeSource for ChannelEdgeSource {
    fn wait_edge(
        &mut self,
        timeout: Duration,
    ) -> Result<Option<ChannelLevels>, Box<dyn std::error::Error + Send + Sync>> {
        match self.rx.recv_timeout(timeout) {
            Ok(levels) => Ok(Some(levels)),
            Err(xch::RecvTimeoutError::Timeout) => Ok(None),
            Err(xch::RecvTimeoutError::Disconnected) => Err(Box::new(HwError::Disconnected)),
        }
    }
}

// Gray-code order of (A, B) for forward rotation.
const QUADRATURE: [ChannelLevels; 4] = [
    ChannelLevels { a: false, b: false },
    ChannelLevels { a: false, b: true },
    ChannelLevels { a: true, b: true },
    ChannelLevels { a: true, b: false },
];

/// Quadrature signal generator for one wheel.
///
/// Walks the gray code a quarter step at a time and reports the levels
/// after each secondary-channel (B) change, which is what the decoder sees.
#[derive(Debug, Clone, Default)]
pub struct SimulatedWheel {
    phase: usize,
}

impl SimulatedWheel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn levels(&self) -> ChannelLevels {
        QUADRATURE[self.phase]
    }

    /// One quarter step. Returns the levels if B changed.
    pub fn step(&mut self, forward: bool) -> Option<ChannelLevels> {
        let before = self.levels();
        self.phase = if forward {
            (self.phase + 1) % 4
        } else {
            (self.phase + 3) % 4
        };
        let after = self.levels();
        (after.b != before.b).then_some(after)
    }

    /// Edges for `pulses` decoded pulses; negative means reverse.
    pub fn edges(&mut self, pulses: i64) -> Vec<ChannelLevels> {
        let forward = pulses >= 0;
        let n = usize::try_from(pulses.unsigned_abs()).unwrap_or(usize::MAX);
        let mut out = Vec::with_capacity(n);
        while out.len() < n {
            if let Some(levels) = self.step(forward) {
                out.push(levels);
            }
        }
        out
    }
}

/// First-order speed model of one motor and wheel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlantParams {
    /// Steady-state pulse rate per unit of command.
    pub pps_per_command: f64,
    /// Commands below this magnitude do not overcome static friction.
    pub stiction_command: i32,
    /// Time constant of the speed response.
    pub time_constant: Duration,
}

impl Default for PlantParams {
    fn default() -> Self {
        Self {
            pps_per_command: 12.0,
            stiction_command: 40,
            time_constant: Duration::from_millis(150),
        }
    }
}

impl PlantParams {
    fn steady_rate(&self, command: i32) -> f64 {
        if command.abs() < self.stiction_command {
            0.0
        } else {
            f64::from(command) * self.pps_per_command
        }
    }
}

#[derive(Debug)]
struct PlantWheel {
    motor: SimulatedMotor,
    rate_pps: f64,
    // Fractional pulses carried between steps.
    carry: f64,
    quad: SimulatedWheel,
    tx: xch::Sender<ChannelLevels>,
}

impl PlantWheel {
    fn advance(&mut self, params: &PlantParams, dt: f64) -> i64 {
        let target = params.steady_rate(self.motor.last_command());
        let tau = params.time_constant.as_secs_f64();
        let alpha = if tau > 0.0 { (dt / tau).min(1.0) } else { 1.0 };
        self.rate_pps += (target - self.rate_pps) * alpha;

        self.carry += self.rate_pps * dt;
        let whole = self.carry.trunc();
        self.carry -= whole;
        let pulses = whole as i64;
        for levels in self.quad.edges(pulses) {
            // A dropped receiver just means nobody is listening.
            let _ = self.tx.send(levels);
        }
        pulses
    }
}

/// Motors and edge sources wired to a `SimulatedPlant`.
#[derive(Debug)]
pub struct PlantIo {
    pub left_motor: SimulatedMotor,
    pub right_motor: SimulatedMotor,
    pub left_edges: ChannelEdgeSource,
    pub right_edges: ChannelEdgeSource,
}

#[derive(Debug)]
pub struct SimulatedPlant {
    params: PlantParams,
    wheels: [PlantWheel; 2],
}

impl SimulatedPlant {
    pub fn new(params: PlantParams) -> (Self, PlantIo) {
        let left_motor = SimulatedMotor::new();
        let right_motor = SimulatedMotor::new();
        let (l_tx, left_edges) = ChannelEdgeSource::channel();
        let (r_tx, right_edges) = ChannelEdgeSource::channel();
        let wheel = |motor: &SimulatedMotor, tx: xch::Sender<ChannelLevels>| PlantWheel {
            motor: motor.clone(),
            rate_pps: 0.0,
            carry: 0.0,
            quad: SimulatedWheel::new(),
            tx,
        };
        let plant = Self {
            params,
            wheels: [wheel(&left_motor, l_tx), wheel(&right_motor, r_tx)],
        };
        (
            plant,
            PlantIo {
                left_motor,
                right_motor,
                left_edges,
                right_edges,
            },
        )
    }

    /// Advance the model by `dt` and emit the edges. Returns the pulses
    /// emitted per wheel `(left, right)`.
    pub fn advance(&mut self, dt: Duration) -> (i64, i64) {
        let dt = dt.as_secs_f64();
        let [l, r] = &mut self.wheels;
        (l.advance(&self.params, dt), r.advance(&self.params, dt))
    }

    /// Current modelled rates `(left, right)` in pulses per second.
    pub fn rates(&self) -> (f64, f64) {
        (self.wheels[0].rate_pps, self.wheels[1].rate_pps)
    }

    /// Run the plant in real time on its own thread.
    pub fn spawn(self, step: Duration) -> PlantThread {
        let shutdown = Arc::new(AtomicBool::new(false));
        let stop = Arc::clone(&shutdown);
        let mut plant = self;
        let join_handle = std::thread::Builder::new()
            .name("sim-plant".into())
            .spawn(move || {
                while !stop.load(Ordering::Relaxed) {
                    std::thread::sleep(step);
                    plant.advance(step);
                }
                tracing::trace!("plant thread exiting");
            })
            .map_err(|e| tracing::error!(error = %e, "failed to spawn plant thread"))
            .ok();
        PlantThread {
            shutdown,
            join_handle,
        }
    }
}

/// Background plant; stopped and joined on drop.
#[derive(Debug)]
pub struct PlantThread {
    shutdown: Arc<AtomicBool>,
    join_handle: Option<JoinHandle<()>>,
}

impl Drop for PlantThread {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(h) = self.join_handle.take()
            && h.join().is_err()
        {
            tracing::warn!("plant thread panicked during shutdown");
        }
    }
}
