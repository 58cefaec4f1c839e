//! Hardware seams shared by the drive stack.
//!
//! The core never talks to GPIO directly: encoder channels arrive through
//! [`EdgeSource`] and actuation leaves through [`Motor`].
pub mod clock;

pub use clock::{Clock, MonotonicClock};

/// Levels of both encoder channels sampled right after a secondary-channel
/// transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelLevels {
    pub a: bool,
    pub b: bool,
}

/// A source of encoder channel-change events for one wheel.
///
/// `wait_edge` blocks until the secondary channel changes or `timeout`
/// elapses. `Ok(None)` means the timeout expired with no edge.
pub trait EdgeSource {
    fn wait_edge(
        &mut self,
        timeout: std::time::Duration,
    ) -> Result<Option<ChannelLevels>, Box<dyn std::error::Error + Send + Sync>>;
}

/// One wheel's actuator accepting a signed command in a fixed integer range.
pub trait Motor {
    fn set_command(&mut self, command: i32)
    -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
    fn stop(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

impl<T: Motor + ?Sized> Motor for Box<T> {
    fn set_command(
        &mut self,
        command: i32,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        (**self).set_command(command)
    }
    fn stop(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        (**self).stop()
    }
}

impl<T: EdgeSource + ?Sized> EdgeSource for Box<T> {
    fn wait_edge(
        &mut self,
        timeout: std::time::Duration,
    ) -> Result<Option<ChannelLevels>, Box<dyn std::error::Error + Send + Sync>> {
        (**self).wait_edge(timeout)
    }
}
