//! Maps `Box<dyn Error>` from trait boundaries to typed `DriveError`.
//!
//! `amr_traits` uses `Box<dyn Error + Send + Sync>` so motor and encoder
//! backends stay decoupled from this crate; this module recovers a typed
//! error, downcasting `amr_hardware::HwError` when that feature is on.

use crate::error::DriveError;

/// Map a trait-boundary error to a typed `DriveError`.
pub fn map_hw_error(e: &(dyn std::error::Error + 'static)) -> DriveError {
    #[cfg(feature = "hardware-errors")]
    {
        if let Some(hw) = e.downcast_ref::<amr_hardware::error::HwError>() {
            return match hw {
                amr_hardware::error::HwError::EdgeTimeout => DriveError::Timeout,
                other => DriveError::HardwareFault(other.to_string()),
            };
        }
    }

    let s = e.to_string();
    if s.to_lowercase().contains("timeout") {
        DriveError::Timeout
    } else {
        DriveError::Hardware(s)
    }
}

/// Same as [`map_hw_error`] for the boxed errors returned by trait methods.
#[inline]
pub fn map_boxed(e: &(dyn std::error::Error + Send + Sync + 'static)) -> DriveError {
    map_hw_error(e)
}
