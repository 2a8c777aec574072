#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema and persistence for the saw interlock.
//!
//! - The zone record is flat (top-level integer keys) so it stays compatible
//!   with the settings screen; everything else lives in optional tables.
//! - `load_or_default` never fails: a missing file yields defaults, a broken
//!   one is logged and replaced by defaults.
//! - `save` is atomic (write to a sibling temp file, then rename).
use serde::{Deserialize, Serialize};
use std::path::Path;

/// HSV triple in OpenCV 8-bit convention: H in 0..180, S and V in 0..=255.
pub type Hsv = [u8; 3];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionCfg {
    pub skin_lower: Hsv,
    pub skin_upper: Hsv,
    /// Minimum skin contour area (pixels) to count as a hand.
    pub min_hand_area: u32,
    /// Minimum motion contour area at full resolution; scaled by downsample².
    pub min_motion_area: u32,
    /// Grayscale difference threshold for motion.
    pub diff_threshold: u8,
    pub dilate_iterations: u8,
    /// Motion stage downsample ratio (1 = full resolution).
    pub downsample: u32,
    /// Latch the emergency stop when a hand enters the inner zone.
    pub latch_on_hand: bool,
    /// Latch the emergency stop on inner-zone motion (off: the workpiece moves there).
    pub latch_on_motion_inner: bool,
}

impl Default for DetectionCfg {
    fn default() -> Self {
        Self {
            skin_lower: [0, 20, 70],
            skin_upper: [20, 255, 255],
            min_hand_area: 3000,
            min_motion_area: 1000,
            diff_threshold: 20,
            dilate_iterations: 3,
            downsample: 2,
            latch_on_hand: true,
            latch_on_motion_inner: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingCfg {
    pub vision_hz: u32,
    pub status_hz: u32,
    pub motor_tick_ms: u64,
    /// Delay between an operator reset and the latch actually clearing.
    pub reset_settle_ms: u64,
}

impl Default for TimingCfg {
    fn default() -> Self {
        Self {
            vision_hz: 15,
            status_hz: 1,
            motor_tick_ms: 500,
            reset_settle_ms: 500,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Pins {
    pub pwm_channel: u8,
    pub pwm_frequency_hz: u32,
    pub motor_enable: u8,
    pub run_switch: u8,
    pub shutdown_switch: u8,
}

impl Default for Pins {
    fn default() -> Self {
        Self {
            pwm_channel: 0,
            pwm_frequency_hz: 1000,
            motor_enable: 26,
            run_switch: 17,
            shutdown_switch: 27,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub outer_width: i32,
    pub outer_height: i32,
    pub inner_width: i32,
    pub inner_height: i32,
    pub zone_offset_x: i32,
    pub zone_offset_y: i32,
    pub hatch_spacing: i32,
    /// Seconds the warning stays up after the last intrusion event.
    pub warning_duration: i32,
    pub detection: DetectionCfg,
    pub timing: TimingCfg,
    pub pins: Pins,
    pub logging: Logging,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            outer_width: 400,
            outer_height: 300,
            inner_width: 200,
            inner_height: 200,
            zone_offset_x: 0,
            zone_offset_y: 0,
            hatch_spacing: 20,
            warning_duration: 3,
            detection: DetectionCfg::default(),
            timing: TimingCfg::default(),
            pins: Pins::default(),
            logging: Logging::default(),
        }
    }
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

fn check_range(name: &str, v: i32, lo: i32, hi: i32) -> eyre::Result<()> {
    if !(lo..=hi).contains(&v) {
        eyre::bail!("{name} must be in [{lo}, {hi}], got {v}");
    }
    Ok(())
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Zone record (settings-screen slider ranges)
        check_range("outer_width", self.outer_width, 100, 600)?;
        check_range("outer_height", self.outer_height, 100, 400)?;
        check_range("inner_width", self.inner_width, 50, 400)?;
        check_range("inner_height", self.inner_height, 50, 300)?;
        check_range("zone_offset_x", self.zone_offset_x, -300, 300)?;
        check_range("zone_offset_y", self.zone_offset_y, -200, 200)?;
        check_range("hatch_spacing", self.hatch_spacing, 5, 100)?;
        check_range("warning_duration", self.warning_duration, 1, 10)?;
        if self.inner_width > self.outer_width || self.inner_height > self.outer_height {
            eyre::bail!(
                "inner zone ({}x{}) must fit inside outer zone ({}x{})",
                self.inner_width,
                self.inner_height,
                self.outer_width,
                self.outer_height
            );
        }

        // Detection
        let d = &self.detection;
        if d.skin_lower.iter().zip(d.skin_upper.iter()).any(|(lo, hi)| lo > hi) {
            eyre::bail!("detection.skin_lower must be <= detection.skin_upper per channel");
        }
        if d.skin_upper[0] > 180 {
            eyre::bail!("detection.skin_upper hue must be <= 180");
        }
        if d.min_hand_area == 0 {
            eyre::bail!("detection.min_hand_area must be >= 1");
        }
        if d.min_motion_area == 0 {
            eyre::bail!("detection.min_motion_area must be >= 1");
        }
        if d.downsample == 0 || d.downsample > 8 {
            eyre::bail!("detection.downsample must be in [1, 8]");
        }

        // Timing
        if self.timing.vision_hz == 0 {
            eyre::bail!("timing.vision_hz must be > 0");
        }
        if self.timing.status_hz == 0 {
            eyre::bail!("timing.status_hz must be > 0");
        }
        if self.timing.motor_tick_ms == 0 {
            eyre::bail!("timing.motor_tick_ms must be >= 1");
        }

        // Pins
        if self.pins.pwm_channel > 1 {
            eyre::bail!("pins.pwm_channel must be 0 or 1");
        }
        if self.pins.pwm_frequency_hz == 0 {
            eyre::bail!("pins.pwm_frequency_hz must be > 0");
        }

        Ok(())
    }

    pub fn to_toml(&self) -> eyre::Result<String> {
        toml::to_string_pretty(self).map_err(|e| eyre::eyre!("serialize config: {e}"))
    }
}

/// Load the config at `path`, falling back to defaults instead of failing.
pub fn load_or_default(path: &Path) -> Config {
    let text = match std::fs::read_to_string(path) {
        Ok(t) => t,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::info!(path = %path.display(), "no config file, using defaults");
            return Config::default();
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "config unreadable, using defaults");
            return Config::default();
        }
    };
    let cfg = match load_toml(&text) {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "config malformed, using defaults");
            return Config::default();
        }
    };
    if let Err(e) = cfg.validate() {
        tracing::warn!(path = %path.display(), error = %e, "config invalid, using defaults");
        return Config::default();
    }
    cfg
}

/// Persist `cfg` atomically: write `<path>.new`, fsync, rename over `path`.
pub fn save(path: &Path, cfg: &Config) -> eyre::Result<()> {
    use std::io::Write;
    let text = cfg.to_toml()?;
    let tmp = path.with_extension("new");
    {
        let mut f = std::fs::File::create(&tmp)
            .map_err(|e| eyre::eyre!("create {}: {e}", tmp.display()))?;
        f.write_all(text.as_bytes())
            .and_then(|()| f.sync_all())
            .map_err(|e| eyre::eyre!("write {}: {e}", tmp.display()))?;
    }
    std::fs::rename(&tmp, path)
        .map_err(|e| eyre::eyre!("rename {} -> {}: {e}", tmp.display(), path.display()))?;
    tracing::debug!(path = %path.display(), "config saved");
    Ok(())
}
