//! Pulse counters and the quadrature decoder.
//!
//! Each wheel owns one signed [`PulseCounter`]. The hardware-event context is
//! the only writer (through that wheel's [`QuadratureDecoder`]); everything
//! else reads an atomic snapshot. An `AtomicI64` gives the tear-free
//! single-read/single-write discipline that the firmware got by masking
//! interrupts around each access.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, Ordering};

use amr_traits::ChannelLevels;

/// Measured pulses per wheel revolution for the stock gear motors.
pub const DEFAULT_PULSES_PER_REVOLUTION: u32 = 3418;

/// Which physical wheel an entity belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WheelSide {
    Left,
    Right,
}

impl WheelSide {
    pub const BOTH: [WheelSide; 2] = [WheelSide::Left, WheelSide::Right];

    #[inline]
    pub(crate) const fn index(self) -> usize {
        match self {
            WheelSide::Left => 0,
            WheelSide::Right => 1,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            WheelSide::Left => "left",
            WheelSide::Right => "right",
        }
    }
}

impl core::fmt::Display for WheelSide {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-wheel encoder settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderConfig {
    pulses_per_revolution: u32,
    pub inverted: bool,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            pulses_per_revolution: DEFAULT_PULSES_PER_REVOLUTION,
            inverted: false,
        }
    }
}

impl EncoderConfig {
    /// Build a config; a non-positive `pulses_per_revolution` falls back to
    /// [`DEFAULT_PULSES_PER_REVOLUTION`].
    pub fn new(pulses_per_revolution: i64, inverted: bool) -> Self {
        let mut cfg = Self {
            inverted,
            ..Self::default()
        };
        cfg.set_pulses_per_revolution(pulses_per_revolution);
        cfg
    }

    pub fn pulses_per_revolution(&self) -> u32 {
        self.pulses_per_revolution
    }

    /// Returns `true` when the value was applied. Zero, negative and
    /// out-of-range values are ignored and the previous value is kept.
    pub fn set_pulses_per_revolution(&mut self, value: i64) -> bool {
        match u32::try_from(value) {
            Ok(v) if v > 0 => {
                self.pulses_per_revolution = v;
                true
            }
            _ => false,
        }
    }
}

/// Signed pulse count for one wheel.
#[derive(Debug, Default)]
pub struct PulseCounter {
    pulses: AtomicI64,
}

impl PulseCounter {
    pub const fn new() -> Self {
        Self {
            pulses: AtomicI64::new(0),
        }
    }

    /// Atomic snapshot of the current count.
    #[inline]
    pub fn read(&self) -> i64 {
        self.pulses.load(Ordering::Acquire)
    }

    #[inline]
    pub fn reset(&self) {
        self.pulses.store(0, Ordering::Release);
    }

    // Only the decoder writes increments.
    #[inline]
    fn step(&self, delta: i64) {
        self.pulses.fetch_add(delta, Ordering::AcqRel);
    }
}

#[derive(Debug)]
struct WheelEncoder {
    counter: PulseCounter,
    pulses_per_revolution: AtomicU32,
    inverted: AtomicBool,
    // Set while a decoder for this wheel is alive.
    claimed: AtomicBool,
}

impl WheelEncoder {
    fn new(cfg: EncoderConfig) -> Self {
        Self {
            counter: PulseCounter::new(),
            pulses_per_revolution: AtomicU32::new(cfg.pulses_per_revolution),
            inverted: AtomicBool::new(cfg.inverted),
            claimed: AtomicBool::new(false),
        }
    }
}

/// Both wheels' counters and encoder settings, shared between the
/// hardware-event context and the control loop.
#[derive(Debug)]
pub struct EncoderPair {
    wheels: [WheelEncoder; 2],
}

impl EncoderPair {
    pub fn new(left: EncoderConfig, right: EncoderConfig) -> Arc<Self> {
        Arc::new(Self {
            wheels: [WheelEncoder::new(left), WheelEncoder::new(right)],
        })
    }

    #[inline]
    fn wheel(&self, side: WheelSide) -> &WheelEncoder {
        &self.wheels[side.index()]
    }

    pub fn counter(&self, side: WheelSide) -> &PulseCounter {
        &self.wheel(side).counter
    }

    /// Atomic snapshot of one wheel's count.
    #[inline]
    pub fn read(&self, side: WheelSide) -> i64 {
        self.wheel(side).counter.read()
    }

    /// `(left, right)` snapshots. Each read is atomic; the pair is not.
    #[inline]
    pub fn read_both(&self) -> (i64, i64) {
        (self.read(WheelSide::Left), self.read(WheelSide::Right))
    }

    pub fn reset(&self, side: WheelSide) {
        self.wheel(side).counter.reset();
    }

    pub fn reset_both(&self) {
        for side in WheelSide::BOTH {
            self.reset(side);
        }
        tracing::debug!("pulse counters reset");
    }

    pub fn config(&self, side: WheelSide) -> EncoderConfig {
        let w = self.wheel(side);
        EncoderConfig {
            pulses_per_revolution: w.pulses_per_revolution.load(Ordering::Relaxed),
            inverted: w.inverted.load(Ordering::Relaxed),
        }
    }

    pub fn pulses_per_revolution(&self, side: WheelSide) -> u32 {
        self.wheel(side).pulses_per_revolution.load(Ordering::Relaxed)
    }

    /// Non-positive values are ignored; the prior value stays in effect.
    pub fn set_pulses_per_revolution(&self, side: WheelSide, value: i64) {
        let mut cfg = self.config(side);
        if cfg.set_pulses_per_revolution(value) {
            self.wheel(side)
                .pulses_per_revolution
                .store(cfg.pulses_per_revolution, Ordering::Relaxed);
            tracing::debug!(wheel = %side, ppr = value, "pulses per revolution set");
        } else {
            tracing::warn!(wheel = %side, ppr = value, "ignoring non-positive pulses per revolution");
        }
    }

    /// Apply the same pulses-per-revolution to both wheels.
    pub fn set_pulses_per_revolution_both(&self, value: i64) {
        for side in WheelSide::BOTH {
            self.set_pulses_per_revolution(side, value);
        }
    }

    pub fn is_inverted(&self, side: WheelSide) -> bool {
        self.wheel(side).inverted.load(Ordering::Relaxed)
    }

    pub fn set_inverted(&self, side: WheelSide, inverted: bool) {
        self.wheel(side).inverted.store(inverted, Ordering::Relaxed);
    }

    /// Hand out the single writer for `side`'s counter.
    ///
    /// Returns `None` while another decoder for that wheel is still alive.
    pub fn decoder(self: &Arc<Self>, side: WheelSide) -> Option<QuadratureDecoder> {
        self.wheel(side)
            .claimed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| QuadratureDecoder {
                side,
                encoders: Arc::clone(self),
            })
    }
}

/// Direction of one decoded transition: `A == B` counts down, otherwise up,
/// negated when the wheel is wired inverted.
///
/// This compares the two levels sampled after a secondary-channel change; it
/// is not a full four-state transition table, so certain bounce sequences can
/// be mis-signed. Pulses-per-revolution calibration was measured against
/// exactly this behaviour.
#[inline]
pub const fn decode_increment(levels: ChannelLevels, inverted: bool) -> i64 {
    let delta = if levels.a == levels.b { -1 } else { 1 };
    if inverted { -delta } else { delta }
}

/// Writer half of one wheel's counter, driven from the hardware-event
/// context. Never blocks and never allocates.
#[derive(Debug)]
pub struct QuadratureDecoder {
    side: WheelSide,
    encoders: Arc<EncoderPair>,
}

impl QuadratureDecoder {
    pub fn side(&self) -> WheelSide {
        self.side
    }

    /// Handle one secondary-channel transition. Returns the applied
    /// increment (always `+1` or `-1`).
    #[inline]
    pub fn on_edge(&self, levels: ChannelLevels) -> i64 {
        let wheel = self.encoders.wheel(self.side);
        let delta = decode_increment(levels, wheel.inverted.load(Ordering::Relaxed));
        wheel.counter.step(delta);
        delta
    }
}

impl Drop for QuadratureDecoder {
    fn drop(&mut self) {
        self.encoders
            .wheel(self.side)
            .claimed
            .store(false, Ordering::Release);
    }
}

/// Revolutions represented by `pulses`.
#[inline]
pub fn pulses_to_revolutions(pulses: i64, pulses_per_revolution: u32) -> f64 {
    pulses as f64 / f64::from(pulses_per_revolution.max(1))
}

/// Linear wheel travel for `pulses`, in the unit of `circumference`.
#[inline]
pub fn pulses_to_distance(pulses: i64, pulses_per_revolution: u32, circumference: f64) -> f64 {
    pulses_to_revolutions(pulses, pulses_per_revolution) * circumference
}
