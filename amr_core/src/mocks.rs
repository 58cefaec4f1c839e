//! Test and helper doubles for amr_core.

use std::sync::{Arc, Mutex};

use amr_traits::Motor;

/// Motor that records every command into a shared log. `stop()` records 0.
#[derive(Debug, Clone, Default)]
pub struct RecordingMotor {
    log: Arc<Mutex<Vec<i32>>>,
}

impl RecordingMotor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all commands so far.
    pub fn commands(&self) -> Vec<i32> {
        self.log.lock().map(|l| l.clone()).unwrap_or_default()
    }

    pub fn last(&self) -> Option<i32> {
        self.log.lock().ok().and_then(|l| l.last().copied())
    }
}

impl Motor for RecordingMotor {
    fn set_command(&mut self, command: i32) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if let Ok(mut l) = self.log.lock() {
            l.push(command);
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.set_command(0)
    }
}

/// Motor whose every call fails with the given message.
#[derive(Debug, Clone)]
pub struct FailingMotor(pub &'static str);

impl Motor for FailingMotor {
    fn set_command(&mut self, _command: i32) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        Err(Box::new(std::io::Error::other(self.0)))
    }

    fn stop(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        Err(Box::new(std::io::Error::other(self.0)))
    }
}
