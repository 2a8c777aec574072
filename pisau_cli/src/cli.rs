//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use pisau_core::SpeedPreset;
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "pisau", version, about = "Saw safety interlock")]
pub struct Cli {
    /// Path to config TOML
    #[arg(long, value_name = "FILE", default_value = "etc/pisau.toml")]
    pub config: PathBuf,

    /// Log as JSON lines instead of pretty
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace); overrides [logging].level
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

/// Named speed presets offered by the operator panel.
#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum PresetArg {
    Off,
    Low,
    Medium,
    High,
}

impl From<PresetArg> for SpeedPreset {
    fn from(p: PresetArg) -> Self {
        match p {
            PresetArg::Off => Self::Off,
            PresetArg::Low => Self::Low,
            PresetArg::Medium => Self::Medium,
            PresetArg::High => Self::High,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the interlock (simulated devices unless built with `hardware`)
    Run {
        /// Replay frames from a directory of PNG/JPEG files instead of the camera
        #[arg(long, value_name = "DIR")]
        frames: Option<PathBuf>,
        /// Stop after this many seconds (default: until Ctrl-C or the shutdown switch)
        #[arg(long, value_name = "SECS")]
        seconds: Option<f64>,
        /// Requested motor speed in percent
        #[arg(long, value_name = "PERCENT", conflicts_with = "preset")]
        speed: Option<u8>,
        /// Requested motor speed as a preset
        #[arg(long, value_enum)]
        preset: Option<PresetArg>,
        /// Simulation: start with the run switch on
        #[arg(long, action = ArgAction::SetTrue)]
        run_switch: bool,
        /// Simulation: place a skin-coloured blob centred at X,Y
        #[arg(long, value_name = "X,Y", value_parser = parse_point)]
        hand_at: Option<(i32, i32)>,
        /// Write the last annotated frame to this PNG on exit
        #[arg(long, value_name = "PNG")]
        snapshot: Option<PathBuf>,
        /// Persist the effective config to --config on exit
        #[arg(long, action = ArgAction::SetTrue)]
        save_config: bool,
    },
    /// Print the outer and inner zone polygons for a frame size
    Zones {
        #[arg(long, default_value_t = 640)]
        width: u32,
        #[arg(long, default_value_t = 480)]
        height: u32,
    },
    /// Inspect or create the config file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Quick health check (devices open, config valid, one frame processed)
    SelfCheck,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Write the default config to --config (refuses to overwrite without --force)
    Init {
        #[arg(long, action = ArgAction::SetTrue)]
        force: bool,
    },
    /// Print the effective config (defaults substituted for a missing or invalid file)
    Show,
    /// Strictly parse and validate --config, reporting unknown keys
    Check,
}

fn parse_point(s: &str) -> Result<(i32, i32), String> {
    let (x, y) = s
        .split_once(',')
        .ok_or_else(|| format!("expected X,Y, got `{s}`"))?;
    let x = x.trim().parse::<i32>().map_err(|e| format!("bad x: {e}"))?;
    let y = y.trim().parse::<i32>().map_err(|e| format!("bad y: {e}"))?;
    Ok((x, y))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_points() {
        assert_eq!(parse_point("320,240"), Ok((320, 240)));
        assert_eq!(parse_point(" -5 , 7"), Ok((-5, 7)));
        assert!(parse_point("320").is_err());
        assert!(parse_point("a,b").is_err());
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
