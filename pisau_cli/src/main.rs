mod cli;
mod error_fmt;
mod run;

use clap::Parser;
use cli::{Cli, Commands, ConfigAction, FILE_GUARD, JSON_MODE};
use eyre::WrapErr;
use pisau_config::Config;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing_subscriber::{EnvFilter, Layer};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

fn main() {
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);
    if let Err(e) = color_eyre::install() {
        eprintln!("failed to install error reporter: {e}");
    }

    // Logging comes from the file config (if any); a broken file falls back to defaults.
    let cfg = pisau_config::load_or_default(&cli.config);
    init_tracing(&cli, &cfg);

    if let Err(err) = dispatch(&cli, &cfg) {
        if cli.json {
            println!("{}", error_fmt::format_error_json(&err));
        } else {
            println!("{}", error_fmt::humanize(&err));
            tracing::debug!(error = ?err, "command failed");
        }
        std::process::exit(error_fmt::exit_code_for_error(&err));
    }
}

fn dispatch(cli: &Cli, cfg: &Config) -> eyre::Result<()> {
    match &cli.cmd {
        Commands::Run {
            frames,
            seconds,
            speed,
            preset,
            run_switch,
            hand_at,
            snapshot,
            save_config,
        } => {
            let stop = Arc::new(AtomicBool::new(false));
            {
                let stop = Arc::clone(&stop);
                ctrlc::set_handler(move || stop.store(true, Ordering::Relaxed))
                    .wrap_err("install Ctrl-C handler")?;
            }
            let opts = run::RunOpts {
                frames: frames.clone(),
                seconds: *seconds,
                speed: *speed,
                preset: *preset,
                run_switch: *run_switch,
                hand_at: *hand_at,
                snapshot: snapshot.clone(),
                save_config: *save_config,
            };
            run::run(cfg, &cli.config, &opts, &stop)?;
            Ok(())
        }
        Commands::Zones { width, height } => {
            print_zones(cfg, *width, *height);
            Ok(())
        }
        Commands::Config { action } => match action {
            ConfigAction::Init { force } => config_init(&cli.config, *force),
            ConfigAction::Show => {
                print!("{}", cfg.to_toml()?);
                Ok(())
            }
            ConfigAction::Check => config_check(&cli.config),
        },
        Commands::SelfCheck => run::self_check(cfg),
    }
}

fn init_tracing(cli: &Cli, cfg: &Config) {
    let level = cli
        .log_level
        .as_deref()
        .or(cfg.logging.level.as_deref())
        .unwrap_or("info");
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // stdout is reserved for command output
    let console = if cli.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .boxed()
    };

    let file = cfg.logging.file.as_deref().map(|path| {
        let path = Path::new(path);
        let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
        let name = path.file_name().map_or_else(|| "pisau.log".into(), |n| n.to_os_string());
        let appender = match cfg.logging.rotation.as_deref() {
            Some("daily") => tracing_appender::rolling::daily(dir, name),
            Some("hourly") => tracing_appender::rolling::hourly(dir, name),
            _ => tracing_appender::rolling::never(dir, name),
        };
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let _ = FILE_GUARD.set(guard);
        tracing_subscriber::fmt::layer()
            .json()
            .with_ansi(false)
            .with_writer(writer)
    });

    if let Err(e) = tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
        .try_init()
    {
        eprintln!("logging disabled: {e}");
    }
}

fn print_zones(cfg: &Config, width: u32, height: u32) {
    let zone_cfg = pisau_core::ZoneCfg::from(cfg);
    let zones = pisau_core::compute_zones(width, height, &zone_cfg.clamped().unwrap_or(zone_cfg));
    let fmt = |poly: &[pisau_core::Point]| {
        poly.iter()
            .map(|p| format!("({},{})", p.x, p.y))
            .collect::<Vec<_>>()
            .join(" ")
    };
    if JSON_MODE.get().copied().unwrap_or(false) {
        let pts = |poly: &[pisau_core::Point]| {
            poly.iter().map(|p| [p.x, p.y]).collect::<Vec<_>>()
        };
        let v = serde_json::json!({
            "frame": [width, height],
            "outer": pts(&zones.outer),
            "inner": pts(&zones.inner),
        });
        println!("{v}");
    } else {
        println!("frame: {width}x{height}");
        println!("outer: {}", fmt(&zones.outer));
        println!("inner: {}", fmt(&zones.inner));
    }
}

fn config_init(path: &Path, force: bool) -> eyre::Result<()> {
    if path.exists() && !force {
        eyre::bail!(
            "{} already exists; pass --force to overwrite",
            path.display()
        );
    }
    if let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).wrap_err_with(|| format!("create {}", dir.display()))?;
    }
    pisau_config::save(path, &Config::default())?;
    println!("wrote {}", path.display());
    Ok(())
}

/// Strict counterpart of `load_or_default`: every problem is an error.
fn config_check(path: &Path) -> eyre::Result<()> {
    let text = std::fs::read_to_string(path).wrap_err_with(|| format!("read {}", path.display()))?;
    let cfg = pisau_config::load_toml(&text)
        .map_err(|e| eyre::Report::new(pisau_core::GuardError::Config(e.to_string())))?;
    cfg.validate()
        .map_err(|e| eyre::Report::new(pisau_core::GuardError::Config(e.to_string())))?;

    // serde(default) silently drops misspelled keys
    let known: toml::Table = toml::from_str(&Config::default().to_toml()?)?;
    let given: toml::Table = toml::from_str(&text)?;
    let unknown = unknown_keys(&known, &given, "");
    for key in &unknown {
        println!("warning: unknown key `{key}`");
    }
    println!("{}: ok", path.display());
    Ok(())
}

fn unknown_keys(known: &toml::Table, given: &toml::Table, prefix: &str) -> Vec<String> {
    let mut out = Vec::new();
    for (k, v) in given {
        let name = format!("{prefix}{k}");
        match (known.get(k), v) {
            (None, _) if is_optional_logging_key(&name) => {}
            (None, _) => out.push(name),
            (Some(toml::Value::Table(kt)), toml::Value::Table(gt)) => {
                out.extend(unknown_keys(kt, gt, &format!("{name}.")));
            }
            _ => {}
        }
    }
    out
}

/// `[logging]` keys are `Option`s and vanish from the serialized defaults.
fn is_optional_logging_key(name: &str) -> bool {
    matches!(
        name,
        "logging" | "logging.file" | "logging.level" | "logging.rotation"
    )
}
