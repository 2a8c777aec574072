//! Hardware seams for the saw interlock.
//!
//! Every trait returns `Box<dyn Error + Send + Sync>` so drivers can surface
//! their own error types; `pisau_core` maps them to typed errors.
pub mod clock;

pub use clock::{Clock, ManualClock, MonotonicClock};

/// Raw camera frame (8-bit RGB). Owned by the pipeline iteration that read it.
pub type Frame = image::RgbImage;

/// Motor driver output stage: a PWM duty cycle plus an enable line.
pub trait MotorDriver {
    /// Apply a duty cycle in percent (`0.0..=100.0`).
    fn set_duty_cycle(
        &mut self,
        percent: f32,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
    /// Drive the enable line.
    fn set_enabled(&mut self, on: bool) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// Logical switch levels after active-low inversion (`true` = pressed / on).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SwitchState {
    pub run: bool,
    pub shutdown: bool,
}

pub trait Switches {
    fn read(&mut self) -> Result<SwitchState, Box<dyn std::error::Error + Send + Sync>>;
}

pub trait Camera {
    /// Grab the next frame. Errors are expected to be transient; callers skip the frame.
    fn read_frame(&mut self) -> Result<Frame, Box<dyn std::error::Error + Send + Sync>>;
}

impl<T: MotorDriver + ?Sized> MotorDriver for Box<T> {
    fn set_duty_cycle(
        &mut self,
        percent: f32,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        (**self).set_duty_cycle(percent)
    }
    fn set_enabled(&mut self, on: bool) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        (**self).set_enabled(on)
    }
}

impl<T: Switches + ?Sized> Switches for Box<T> {
    fn read(&mut self) -> Result<SwitchState, Box<dyn std::error::Error + Send + Sync>> {
        (**self).read()
    }
}

impl<T: Camera + ?Sized> Camera for Box<T> {
    fn read_frame(&mut self) -> Result<Frame, Box<dyn std::error::Error + Send + Sync>> {
        (**self).read_frame()
    }
}
