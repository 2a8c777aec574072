//! Test and helper mocks for pisau_core

use pisau_traits::{Frame, SwitchState};

/// A camera that never delivers a frame; drives the controller without vision.
pub struct NullCamera;

impl pisau_traits::Camera for NullCamera {
    fn read_frame(&mut self) -> Result<Frame, Box<dyn std::error::Error + Send + Sync>> {
        Err(Box::new(std::io::Error::other("null camera")))
    }
}

/// Switches frozen at one reading.
pub struct FixedSwitches(pub SwitchState);

impl pisau_traits::Switches for FixedSwitches {
    fn read(&mut self) -> Result<SwitchState, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self.0)
    }
}
