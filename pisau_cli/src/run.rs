//! Device assembly and the `run` / `self-check` commands.

use crate::cli::{JSON_MODE, PresetArg};
use eyre::WrapErr;
use pisau_config::Config;
use pisau_core::{Command, Controller, GovernorCfg, Hardware, LoopStats, SpeedPreset};
use pisau_hardware::{Blob, ImageDirCamera, SimulatedCamera};
use pisau_traits::{Camera, MonotonicClock, MotorDriver, Switches};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

/// Simulated camera resolution.
const SIM_WIDTH: u32 = 640;
const SIM_HEIGHT: u32 = 480;
/// Renders inside the default skin HSV range.
const SIM_SKIN_RGB: [u8; 3] = [220, 160, 130];

#[derive(Debug, Default)]
pub struct RunOpts {
    pub frames: Option<PathBuf>,
    pub seconds: Option<f64>,
    pub speed: Option<u8>,
    pub preset: Option<PresetArg>,
    pub run_switch: bool,
    pub hand_at: Option<(i32, i32)>,
    pub snapshot: Option<PathBuf>,
    pub save_config: bool,
}

type Devices = Hardware<Box<dyn Camera>, Box<dyn Switches>, Box<dyn MotorDriver>>;

fn open_camera(opts: &RunOpts) -> eyre::Result<Box<dyn Camera>> {
    if let Some(dir) = &opts.frames {
        let cam = ImageDirCamera::open(dir)
            .wrap_err_with(|| format!("open frame directory {}", dir.display()))?;
        tracing::info!(dir = %dir.display(), frames = cam.len(), "replaying frames");
        return Ok(Box::new(cam));
    }
    let cam = SimulatedCamera::new(SIM_WIDTH, SIM_HEIGHT);
    if let Some((x, y)) = opts.hand_at {
        cam.scene()
            .set_blobs(vec![Blob::centered(x, y, 80, 60, SIM_SKIN_RGB)]);
        tracing::info!(x, y, "simulated hand placed");
    }
    Ok(Box::new(cam))
}

#[cfg(all(feature = "hardware", target_os = "linux"))]
fn open_devices(cfg: &Config, opts: &RunOpts) -> eyre::Result<Devices> {
    use pisau_hardware::pi::{GpioSwitches, PwmMotorDriver};
    let p = &cfg.pins;
    let driver = PwmMotorDriver::new(p.pwm_channel, f64::from(p.pwm_frequency_hz), p.motor_enable)
        .wrap_err("open motor driver")?;
    let switches =
        GpioSwitches::new(p.run_switch, p.shutdown_switch).wrap_err("open switch inputs")?;
    if opts.run_switch {
        tracing::warn!("--run-switch ignored with hardware switches");
    }
    Ok(Hardware {
        camera: open_camera(opts)?,
        switches: Box::new(switches),
        driver: Box::new(driver),
    })
}

#[cfg(not(all(feature = "hardware", target_os = "linux")))]
fn open_devices(_cfg: &Config, opts: &RunOpts) -> eyre::Result<Devices> {
    use pisau_hardware::{SimulatedMotorDriver, SimulatedSwitches};
    Ok(Hardware {
        camera: open_camera(opts)?,
        switches: Box::new(SimulatedSwitches::new(opts.run_switch)),
        driver: Box::new(SimulatedMotorDriver::new()),
    })
}

fn requested_speed(opts: &RunOpts) -> Option<u8> {
    opts.preset
        .map(|p| SpeedPreset::from(p).percent())
        .or(opts.speed)
}

pub fn run(
    cfg: &Config,
    config_path: &Path,
    opts: &RunOpts,
    stop: &Arc<AtomicBool>,
) -> eyre::Result<LoopStats> {
    let limit = match opts.seconds {
        Some(s) if s.is_finite() && s > 0.0 => Some(Duration::from_secs_f64(s)),
        Some(s) => eyre::bail!("--seconds must be a positive number, got {s}"),
        None => None,
    };
    let hw = open_devices(cfg, opts)?;
    let mut controller = Controller::new(cfg, hw, MonotonicClock, GovernorCfg::default())?;
    if let Some(p) = requested_speed(opts) {
        controller.command_sender().send(Command::SetSpeed(p));
    }

    let stats = controller.run(stop, limit)?;

    if let Some(path) = &opts.snapshot {
        match controller.last_frame() {
            Some(report) => {
                report
                    .annotated
                    .save_with_format(path, image::ImageFormat::Png)
                    .wrap_err_with(|| format!("write snapshot {}", path.display()))?;
                tracing::info!(path = %path.display(), "snapshot written");
            }
            None => tracing::warn!("no frame processed; snapshot skipped"),
        }
    }
    if opts.save_config {
        pisau_config::save(config_path, controller.config())?;
        tracing::info!(path = %config_path.display(), "config saved");
    }

    print_summary(&controller, stats);
    Ok(stats)
}

fn print_summary<C: Camera, S: Switches, D: MotorDriver, K: pisau_traits::Clock>(
    controller: &Controller<C, S, D, K>,
    stats: LoopStats,
) {
    let machine = controller.machine_state().label();
    let status = controller
        .last_snapshot()
        .map_or("Cutting Board is Clear", |s| s.status_text);
    let motor = controller.governor().borrow().telemetry();
    if JSON_MODE.get().copied().unwrap_or(false) {
        let v = serde_json::json!({
            "machine": machine,
            "status": status,
            "frames": stats.frames,
            "skipped_frames": stats.skipped_frames,
            "events": stats.events,
            "motor_ticks": stats.motor_ticks,
            "status_polls": stats.status_polls,
            "rpm": motor.current_rpm,
            "temperature_c": motor.temperature_c,
        });
        println!("{v}");
    } else {
        println!("machine: {machine}");
        println!("status: {status}");
        println!(
            "frames: {} (skipped {}), events: {}",
            stats.frames, stats.skipped_frames, stats.events
        );
        println!(
            "motor: {:.0} rpm, {:.1} C",
            motor.current_rpm, motor.temperature_c
        );
    }
}

/// Open every device, process one frame, and report what was found.
pub fn self_check(cfg: &Config) -> eyre::Result<()> {
    cfg.validate().wrap_err("config")?;
    let opts = RunOpts::default();
    let hw = open_devices(cfg, &opts)?;
    let mut controller = Controller::new(cfg, hw, MonotonicClock, GovernorCfg::default())?;
    controller.poll()?;
    let frame = controller
        .last_frame()
        .ok_or_else(|| eyre::Report::new(pisau_core::GuardError::Camera("no frame read".into())))?;
    let (w, h) = frame.annotated.dimensions();
    let cache = controller
        .zones()
        .cached()
        .ok_or_else(|| eyre::eyre!("zones not prepared after first frame"))?;
    println!("camera: ok ({w}x{h})");
    println!(
        "zones: outer {} points, inner {} points",
        cache.zones.outer.len(),
        cache.zones.inner.len()
    );
    println!("machine: {}", controller.machine_state().label());
    controller.governor().borrow_mut().disable()?;
    println!("OK");
    Ok(())
}
