//! Raspberry Pi encoder inputs and BTS7960 motor outputs via `rppal`.

use std::time::Duration;

use amr_traits::{ChannelLevels, EdgeSource, Motor};
use rppal::gpio::{Gpio, InputPin, OutputPin, Trigger};
use tracing::{debug, trace};

use crate::error::{HwError, Result};
use crate::util::bridge_duty;

/// One wheel's A/B encoder channels. Interrupts fire on both edges of B.
pub struct GpioEncoder {
    a: InputPin,
    b: InputPin,
}

impl GpioEncoder {
    pub fn new(gpio: &Gpio, a_pin: u8, b_pin: u8) -> Result<Self> {
        let a = gpio.get(a_pin)?.into_input_pullup();
        let mut b = gpio.get(b_pin)?.into_input_pullup();
        b.set_interrupt(Trigger::Both)?;
        debug!(a_pin, b_pin, "encoder interrupt armed");
        Ok(Self { a, b })
    }
}

impl EdgeSource for GpioEncoder {
    fn wait_edge(
        &mut self,
        timeout: Duration,
    ) -> std::result::Result<Option<ChannelLevels>, Box<dyn std::error::Error + Send + Sync>> {
        match self.b.poll_interrupt(true, Some(timeout)) {
            Ok(Some(_)) => Ok(Some(ChannelLevels {
                a: self.a.is_high(),
                b: self.b.is_high(),
            })),
            Ok(None) => Ok(None),
            Err(e) => Err(Box::new(HwError::from(e))),
        }
    }
}

/// BTS7960 half-bridge pair driven with software PWM on its two inputs.
pub struct Bts7960Motor {
    forward: OutputPin,
    reverse: OutputPin,
    max_command: i32,
    frequency_hz: f64,
}

impl Bts7960Motor {
    pub fn new(
        gpio: &Gpio,
        forward_pin: u8,
        reverse_pin: u8,
        max_command: i32,
        frequency_hz: f64,
    ) -> Result<Self> {
        let mut forward = gpio.get(forward_pin)?.into_output_low();
        let mut reverse = gpio.get(reverse_pin)?.into_output_low();
        forward.set_reset_on_drop(true);
        reverse.set_reset_on_drop(true);
        Ok(Self {
            forward,
            reverse,
            max_command,
            frequency_hz,
        })
    }

    fn drive(pin: &mut OutputPin, duty: f64, frequency_hz: f64) -> Result<()> {
        if duty <= 0.0 {
            pin.clear_pwm().map_err(|e| HwError::Pwm(e.to_string()))?;
            pin.set_low();
            Ok(())
        } else {
            pin.set_pwm_frequency(frequency_hz, duty)
                .map_err(|e| HwError::Pwm(e.to_string()))
        }
    }

    fn apply(&mut self, command: i32) -> Result<()> {
        let (fwd, rev) = bridge_duty(command, self.max_command);
        // Release the active side first so both inputs are never driven.
        if fwd > 0.0 {
            Self::drive(&mut self.reverse, 0.0, self.frequency_hz)?;
            Self::drive(&mut self.forward, fwd, self.frequency_hz)?;
        } else {
            Self::drive(&mut self.forward, 0.0, self.frequency_hz)?;
            Self::drive(&mut self.reverse, rev, self.frequency_hz)?;
        }
        trace!(command, fwd, rev, "bts7960 duty");
        Ok(())
    }
}

impl Motor for Bts7960Motor {
    fn set_command(
        &mut self,
        command: i32,
    ) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        Ok(self.apply(command)?)
    }

    fn stop(&mut self) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        Ok(self.apply(0)?)
    }
}

impl Drop for Bts7960Motor {
    fn drop(&mut self) {
        if let Err(e) = self.apply(0) {
            tracing::warn!(error = %e, "motor stop on drop failed");
        }
    }
}

/// Open the GPIO peripheral.
pub fn open() -> Result<Gpio> {
    Ok(Gpio::new()?)
}
