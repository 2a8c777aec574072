//! Maps `Box<dyn Error>` from trait boundaries to typed `GuardError`.
//!
//! The traits in `pisau_traits` use `Box<dyn Error + Send + Sync>` so drivers
//! stay free to use their own error types; this module converts those to our
//! typed enum, with an optional feature-gated path for `pisau_hardware::HwError`
//! downcasting.

use crate::error::GuardError;

/// Map a trait-boundary error to a typed `GuardError`.
///
/// Attempts to downcast known hardware error types first, then falls back
/// to string-based heuristics.
pub fn map_hw_error(e: &(dyn std::error::Error + 'static)) -> GuardError {
    #[cfg(feature = "hardware-errors")]
    {
        use pisau_hardware::error::HwError;
        if let Some(hw) = e.downcast_ref::<HwError>() {
            return match hw {
                HwError::Camera(_) | HwError::Image(_) | HwError::NoFrames(_) => {
                    GuardError::Camera(hw.to_string())
                }
                HwError::Gpio(_) | HwError::Pwm(_) => GuardError::HardwareFault(hw.to_string()),
                other => GuardError::Hardware(other.to_string()),
            };
        }
    }

    let s = e.to_string();
    if s.to_lowercase().contains("camera") {
        GuardError::Camera(s)
    } else {
        GuardError::Hardware(s)
    }
}

/// `map_hw_error` for the boxed form the traits return.
#[inline]
pub(crate) fn report(e: Box<dyn std::error::Error + Send + Sync>) -> eyre::Report {
    eyre::Report::new(map_hw_error(&*e))
}
