//! Human-readable error descriptions and structured JSON error formatting.

use pisau_core::GuardError;
use pisau_hardware::error::HwError;

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    // Typed matches first
    if let Some(ge) = err.downcast_ref::<GuardError>() {
        return match ge {
            GuardError::HardwareFault(msg) => format!(
                "What happened: The motor driver or a switch input failed ({msg}).\nLikely causes: Wrong PWM channel or GPIO pin numbers, missing permissions on /dev/gpiomem, or a loose connector.\nHow to fix: Check [pins] in the config and the wiring; the motor was disabled before exit."
            ),
            GuardError::Hardware(msg) => format!(
                "What happened: A hardware call failed ({msg}).\nLikely causes: The driver rejected a command or the device went away.\nHow to fix: Power-cycle the controller and re-run with --log-level=debug."
            ),
            GuardError::Camera(msg) => format!(
                "What happened: No camera frames could be read ({msg}).\nLikely causes: Camera unplugged, wrong --frames directory, or unreadable images.\nHow to fix: Reconnect the camera or point --frames at a directory of PNG/JPEG files."
            ),
            GuardError::Config(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Out-of-range zone values or an inner zone larger than the outer zone.\nHow to fix: Edit the config file (or run `pisau config init --force`), then rerun."
            ),
            GuardError::State(msg) => format!(
                "What happened: Command not allowed in the current state ({msg}).\nLikely causes: The emergency stop is latched.\nHow to fix: Clear the intrusion, reset the emergency stop, then retry."
            ),
        };
    }

    if let Some(hw) = err.downcast_ref::<HwError>() {
        return match hw {
            HwError::NoFrames(dir) => format!(
                "What happened: No frames found in {dir}.\nLikely causes: The directory is empty or holds no .png/.jpg files.\nHow to fix: Point --frames at a directory of captured images."
            ),
            HwError::Gpio(_) | HwError::Pwm(_) => format!(
                "What happened: Failed to initialize hardware pins ({hw}).\nLikely causes: Incorrect pin numbers or insufficient GPIO permissions.\nHow to fix: Fix the [pins] values in the config; ensure the process has permission to access GPIO and PWM."
            ),
            other => format!(
                "What happened: {other}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
            ),
        };
    }

    // String-based heuristics for errors coming from init or config
    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();

    if lower.contains("must be in") || lower.contains("must fit inside") {
        return format!(
            "What happened: Configuration is invalid ({msg}).\nLikely causes: A value outside the settings-screen range.\nHow to fix: Edit the TOML config and try again."
        );
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable exit codes per error class; anything untyped returns 1.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    if let Some(ge) = err.downcast_ref::<GuardError>() {
        return match ge {
            GuardError::Config(_) => 2,
            GuardError::Hardware(_) | GuardError::HardwareFault(_) => 3,
            GuardError::Camera(_) => 4,
            GuardError::State(_) => 5,
        };
    }
    match err.downcast_ref::<HwError>() {
        Some(HwError::Gpio(_) | HwError::Pwm(_)) => 3,
        Some(_) => 4,
        None => 1,
    }
}

fn reason_name(err: &eyre::Report) -> &'static str {
    match err.downcast_ref::<GuardError>() {
        Some(GuardError::Hardware(_)) => "Hardware",
        Some(GuardError::HardwareFault(_)) => "HardwareFault",
        Some(GuardError::Camera(_)) => "Camera",
        Some(GuardError::Config(_)) => "Config",
        Some(GuardError::State(_)) => "State",
        None if err.downcast_ref::<HwError>().is_some() => "Hardware",
        None => "Error",
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;
    json!({
        "reason": reason_name(err),
        "exit_code": exit_code_for_error(err),
        "message": humanize(err),
        "chain": err.chain().map(ToString::to_string).collect::<Vec<_>>(),
    })
    .to_string()
}
