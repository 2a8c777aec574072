//! Runtime configuration types for the interlock.
//!
//! These are the structs the core components are built from. They are
//! separate from the TOML-deserialized config in `pisau_config`; see
//! `conversions` for the mapping.

use std::time::Duration;

/// Zone geometry in frame pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ZoneCfg {
    pub outer_width: i32,
    pub outer_height: i32,
    pub inner_width: i32,
    pub inner_height: i32,
    /// Offset of both zone centers from the frame center.
    pub offset_x: i32,
    pub offset_y: i32,
    /// Distance between diagonal hatch lines outside the outer zone.
    pub hatch_spacing: i32,
}

impl Default for ZoneCfg {
    fn default() -> Self {
        Self {
            outer_width: 400,
            outer_height: 300,
            inner_width: 200,
            inner_height: 200,
            offset_x: 0,
            offset_y: 0,
            hatch_spacing: 20,
        }
    }
}

impl ZoneCfg {
    /// Copy with the inner zone shrunk to fit the outer one.
    /// Returns `None` when nothing had to change.
    pub fn clamped(&self) -> Option<Self> {
        let inner_width = self.inner_width.min(self.outer_width);
        let inner_height = self.inner_height.min(self.outer_height);
        if inner_width == self.inner_width && inner_height == self.inner_height {
            return None;
        }
        Some(Self {
            inner_width,
            inner_height,
            ..*self
        })
    }
}

/// Detection thresholds for the intrusion pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionCfg {
    /// Inclusive HSV skin range, OpenCV 8-bit convention (H in 0..180).
    pub skin_lower: [u8; 3],
    pub skin_upper: [u8; 3],
    /// Minimum skin contour area in full-resolution pixels.
    pub min_hand_area: f64,
    /// Minimum motion contour area in full-resolution pixels.
    /// Divided by `downsample²` before comparing against the small frame.
    pub min_motion_area: f64,
    pub diff_threshold: u8,
    /// Square dilation radius applied to the difference mask.
    pub dilate_iterations: u8,
    pub downsample: u32,
    /// Gaussian sigma for the motion blur (5x5 kernel equivalent).
    pub blur_sigma: f32,
    /// How long the warning stays up after the last event.
    pub warning_duration: Duration,
}

impl Default for DetectionCfg {
    fn default() -> Self {
        Self {
            skin_lower: [0, 20, 70],
            skin_upper: [20, 255, 255],
            min_hand_area: 3000.0,
            min_motion_area: 1000.0,
            diff_threshold: 20,
            dilate_iterations: 3,
            downsample: 2,
            blur_sigma: 1.1,
            warning_duration: Duration::from_secs(3),
        }
    }
}

/// Motor model constants.
#[derive(Debug, Clone, PartialEq)]
pub struct GovernorCfg {
    pub max_rpm: f64,
    /// Above this the blade counts as cutting and the motor heats up.
    pub cutting_rpm: f64,
    /// Fraction of the remaining delta covered per tick.
    pub ramp_fraction: f64,
    /// Hard cap on the per-tick RPM step.
    pub max_rpm_step: f64,
    pub baseline_c: f64,
    pub max_temp_c: f64,
    /// Heating per tick at full speed, scaled by `rpm / max_rpm`.
    pub heat_per_tick_c: f64,
    pub cool_per_tick_c: f64,
    pub warm_per_tick_c: f64,
    /// Half-width of the ambient noise band around baseline.
    pub noise_c: f64,
    /// Seed for the noise generator; `None` seeds from entropy.
    pub seed: Option<u64>,
}

impl Default for GovernorCfg {
    fn default() -> Self {
        Self {
            max_rpm: 3000.0,
            cutting_rpm: 60.0,
            ramp_fraction: 0.1,
            max_rpm_step: 50.0,
            baseline_c: 27.0,
            max_temp_c: 70.0,
            heat_per_tick_c: 0.5,
            cool_per_tick_c: 0.2,
            warm_per_tick_c: 0.1,
            noise_c: 1.0,
            seed: None,
        }
    }
}

/// Dwell thresholds for thermal and RPM overrun.
#[derive(Debug, Clone, PartialEq)]
pub struct OverrunCfg {
    pub temp_threshold_c: f64,
    pub rpm_threshold: f64,
    /// Continuous time above threshold before the advisory.
    pub advisory_after: Duration,
    /// Continuous time above threshold before forced throttling.
    pub throttle_after: Duration,
    pub throttle_percent: u8,
}

impl Default for OverrunCfg {
    fn default() -> Self {
        Self {
            temp_threshold_c: 50.0,
            rpm_threshold: 2700.0,
            advisory_after: Duration::from_secs(10),
            throttle_after: Duration::from_secs(30),
            throttle_percent: 50,
        }
    }
}

/// Which intrusion kinds latch the emergency stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatchPolicy {
    pub on_hand: bool,
    pub on_motion_inner: bool,
}

impl Default for LatchPolicy {
    fn default() -> Self {
        Self {
            on_hand: true,
            on_motion_inner: false,
        }
    }
}

/// Periods of the three cooperative tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskPeriods {
    pub vision: Duration,
    pub status: Duration,
    pub motor: Duration,
    /// Delay between an operator reset request and the latch clearing.
    pub reset_settle: Duration,
}

impl Default for TaskPeriods {
    fn default() -> Self {
        Self {
            vision: crate::util::period(15),
            status: crate::util::period(1),
            motor: Duration::from_millis(500),
            reset_settle: Duration::from_millis(500),
        }
    }
}
