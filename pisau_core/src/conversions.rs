//! `From` implementations bridging `pisau_config` types to `pisau_core` types.

use crate::config::{DetectionCfg, LatchPolicy, TaskPeriods, ZoneCfg};
use std::time::Duration;

// ── ZoneCfg ──────────────────────────────────────────────────────────────────

impl From<&pisau_config::Config> for ZoneCfg {
    fn from(c: &pisau_config::Config) -> Self {
        Self {
            outer_width: c.outer_width,
            outer_height: c.outer_height,
            inner_width: c.inner_width,
            inner_height: c.inner_height,
            offset_x: c.zone_offset_x,
            offset_y: c.zone_offset_y,
            hatch_spacing: c.hatch_spacing,
        }
    }
}

// ── DetectionCfg ─────────────────────────────────────────────────────────────

impl From<&pisau_config::Config> for DetectionCfg {
    fn from(c: &pisau_config::Config) -> Self {
        let d = &c.detection;
        Self {
            skin_lower: d.skin_lower,
            skin_upper: d.skin_upper,
            min_hand_area: f64::from(d.min_hand_area),
            min_motion_area: f64::from(d.min_motion_area),
            diff_threshold: d.diff_threshold,
            dilate_iterations: d.dilate_iterations,
            downsample: d.downsample.max(1),
            warning_duration: Duration::from_secs(u64::try_from(c.warning_duration).unwrap_or(0)),
            ..Self::default()
        }
    }
}

// ── LatchPolicy ──────────────────────────────────────────────────────────────

impl From<&pisau_config::DetectionCfg> for LatchPolicy {
    fn from(d: &pisau_config::DetectionCfg) -> Self {
        Self {
            on_hand: d.latch_on_hand,
            on_motion_inner: d.latch_on_motion_inner,
        }
    }
}

// ── TaskPeriods ──────────────────────────────────────────────────────────────

impl From<&pisau_config::TimingCfg> for TaskPeriods {
    fn from(t: &pisau_config::TimingCfg) -> Self {
        Self {
            vision: crate::util::period(t.vision_hz.max(1)),
            status: crate::util::period(t.status_hz.max(1)),
            motor: Duration::from_millis(t.motor_tick_ms.max(1)),
            reset_settle: Duration::from_millis(t.reset_settle_ms),
        }
    }
}
