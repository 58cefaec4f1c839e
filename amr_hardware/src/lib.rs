//! Motor and encoder backends for the drive stack.
//!
//! `sim` is always available; the `hardware` feature adds Raspberry Pi GPIO
//! encoders and BTS7960 PWM motors through `rppal`.
pub mod error;
#[cfg(feature = "hardware")]
pub mod gpio;
pub mod sim;
pub mod util;

pub use error::HwError;
pub use sim::{
    ChannelEdgeSource, PlantIo, PlantParams, PlantThread, SimulatedMotor, SimulatedPlant,
    SimulatedWheel,
};
