//! Outcome of one call into the velocity controller.

use crate::velocity::MotorCommand;

/// Why `VelocityController::update` did or did not run a PID step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Control is disabled; nothing was computed.
    Disabled,
    /// The caller reported a zero-length interval.
    ZeroElapsed,
    /// Less than the configured update period has passed since the last
    /// executed tick.
    NotDue,
    /// A PID step ran and produced this command.
    Commanded(MotorCommand),
}

impl UpdateOutcome {
    pub fn command(&self) -> Option<MotorCommand> {
        match self {
            UpdateOutcome::Commanded(cmd) => Some(*cmd),
            _ => None,
        }
    }

    pub fn executed(&self) -> bool {
        matches!(self, UpdateOutcome::Commanded(_))
    }
}
