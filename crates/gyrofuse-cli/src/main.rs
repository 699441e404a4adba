//! `gyrofuse` – side-by-side comparison of orientation strategies.
//!
//! The binary:
//!
//! 1. Loads `~/.gyrofuse/config.toml` (defaults when absent), then applies
//!    `GYROFUSE_*` environment overrides and command-line flags.
//! 2. Drives a real-time synthetic IMU that rotates about the vertical axis
//!    with a biased gyroscope and noisy absolute references.
//! 3. Runs every selected provider against the same sensor hub and prints
//!    each one's Euler angles and its error against ground truth.
//! 4. Stops on Ctrl-C or after the configured duration and prints a summary.

mod config;
mod telemetry;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use colored::Colorize;
use serde::Serialize;
use tracing::{error, info, warn};

use gyrofuse_middleware::{SensorHub, SimulatedImu, SimulationProfile, UpdateBus};
use gyrofuse_provider::{OrientationProvider, Provider, ProviderStatus};
use gyrofuse_types::{EulerAngles, OrientationState, ProviderKind};

fn main() {
    let _guard = telemetry::init_tracing("gyrofuse");

    let args = match CliArgs::parse(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{}: {}", "Argument error".red(), e);
            print_usage();
            std::process::exit(2);
        }
    };
    if args.help {
        print_usage();
        return;
    }

    print_banner();

    let path = args.config_path.clone().unwrap_or_else(config::config_path);
    let mut cfg = match config::load_from(&path) {
        Ok(Some(cfg)) => {
            println!("  Config loaded from {}", path.display().to_string().bold());
            cfg
        }
        Ok(None) => {
            println!("  No config at {}; using defaults.", path.display());
            config::Config::default()
        }
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
            config::Config::default()
        }
    };
    config::apply_env_overrides(&mut cfg);
    args.apply(&mut cfg);

    if let Err(e) = cfg.fusion.validate() {
        eprintln!("{}: {}", "Invalid configuration".red(), e);
        std::process::exit(1);
    }

    if args.write_config {
        match config::save_to(&cfg, &path) {
            Ok(()) => println!("  {} {}", "✓ Config written to".green(), path.display()),
            Err(e) => {
                eprintln!("{}: {}", "Config error".red(), e);
                std::process::exit(1);
            }
        }
        return;
    }

    // ── Shared shutdown flag ──────────────────────────────────────────────
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – stopping providers …".yellow().bold());
        shutdown_clone.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; run will stop only after its duration");
    }

    // The OTLP exporter is synchronous, so the runtime is built after
    // tracing is initialised.
    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "failed to build tokio runtime");
            std::process::exit(1);
        }
    };

    let summaries = runtime.block_on(run(&cfg, shutdown));
    print_summary(&summaries, args.json);
}

// ─────────────────────────────────────────────────────────────────────────────
// Command line
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, PartialEq)]
struct CliArgs {
    config_path: Option<PathBuf>,
    providers: Vec<ProviderKind>,
    duration_s: Option<f32>,
    write_config: bool,
    json: bool,
    help: bool,
}

impl CliArgs {
    fn parse(args: impl IntoIterator<Item = String>) -> Result<Self, String> {
        let mut out = CliArgs::default();
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" | "-c" => {
                    let value = args.next().ok_or("--config needs a path")?;
                    out.config_path = Some(PathBuf::from(value));
                }
                "--provider" | "-p" => {
                    let value = args.next().ok_or("--provider needs a name")?;
                    out.providers.extend(config::parse_providers(&value)?);
                }
                "--duration" | "-d" => {
                    let value = args.next().ok_or("--duration needs seconds")?;
                    let secs = value
                        .parse::<f32>()
                        .map_err(|_| format!("invalid duration '{value}'"))?;
                    if secs.is_nan() || secs < 0.0 {
                        return Err(format!("invalid duration '{value}'"));
                    }
                    out.duration_s = Some(secs);
                }
                "--write-config" => out.write_config = true,
                "--json" => out.json = true,
                "--help" | "-h" => out.help = true,
                other => return Err(format!("unknown argument '{other}'")),
            }
        }
        Ok(out)
    }

    /// Flags take precedence over file and environment.
    fn apply(&self, cfg: &mut config::Config) {
        if !self.providers.is_empty() {
            cfg.providers = self.providers.clone();
        }
        if let Some(d) = self.duration_s {
            cfg.duration_s = d;
        }
    }
}

fn print_usage() {
    println!("Usage: gyrofuse [OPTIONS]");
    println!();
    println!("  -c, --config <path>     Config file (default ~/.gyrofuse/config.toml)");
    println!("  -p, --provider <names>  Provider(s) to run; repeatable or comma-separated");
    println!("  -d, --duration <secs>   Run length; 0 runs until Ctrl-C");
    println!("      --write-config      Write the effective config and exit");
    println!("      --json              Print the final summary as JSON lines");
    println!("  -h, --help              Show this help");
    println!();
    let names: Vec<String> = ProviderKind::ALL.iter().map(|k| k.to_string()).collect();
    println!("  Providers: {}", names.join(", "));
}

// ─────────────────────────────────────────────────────────────────────────────
// Comparison run
// ─────────────────────────────────────────────────────────────────────────────

/// Final per-provider figures.
#[derive(Debug, Serialize)]
struct RunSummary {
    provider: ProviderKind,
    status: ProviderStatus,
    updates: u64,
    state: OrientationState,
    euler: EulerAngles,
    error_deg: f32,
    history_min: Option<f32>,
    history_max: Option<f32>,
    history_mean: Option<f32>,
}

async fn run(cfg: &config::Config, shutdown: Arc<AtomicBool>) -> Vec<RunSummary> {
    let hub = SensorHub::full();
    let bus = UpdateBus::default();

    let counts: Arc<Mutex<HashMap<ProviderKind, u64>>> = Arc::default();
    let mut receiver = bus.subscribe();
    let counter = {
        let counts = Arc::clone(&counts);
        tokio::spawn(async move {
            while let Some(update) = receiver.recv().await {
                *counts
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .entry(update.provider)
                    .or_insert(0) += 1;
            }
        })
    };

    let mut providers = Vec::new();
    for &kind in &cfg.providers {
        let built = Provider::builder(kind, Arc::new(hub.clone()))
            .config(cfg.fusion.clone())
            .bus(bus.clone())
            .build();
        let provider = match built {
            Ok(p) => p,
            Err(e) => {
                println!("  {} {}: {}", "✗".red(), kind, e);
                continue;
            }
        };
        match provider.start() {
            Ok(()) => {
                info!(provider = %kind, "provider started");
                providers.push(provider);
            }
            Err(e) => println!("  {} {}: {}", "✗".red(), kind, e),
        }
    }
    drop(bus);

    let profile = cfg.simulation.profile();
    let mut imu = SimulatedImu::new(hub, profile.clone());
    imu.start();

    let limit = (cfg.duration_s > 0.0 && cfg.duration_s.is_finite())
        .then(|| Duration::from_secs_f32(cfg.duration_s));
    let started = Instant::now();
    let mut ticker =
        tokio::time::interval(Duration::from_millis(cfg.report_interval_ms.max(10)));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    println!();
    loop {
        ticker.tick().await;
        if shutdown.load(Ordering::SeqCst) || limit.is_some_and(|l| started.elapsed() >= l) {
            break;
        }
        print_report(started.elapsed(), &providers, &profile);
    }

    for provider in &providers {
        provider.stop();
    }
    imu.stop();

    let summaries = providers
        .iter()
        .map(|p| {
            let state = p.state();
            let history = p.history();
            RunSummary {
                provider: p.kind(),
                status: p.status(),
                updates: 0,
                state,
                euler: state.euler_angles(),
                error_deg: error_deg(&state, &profile),
                history_min: history.min(),
                history_max: history.max(),
                history_mean: history.mean(),
            }
        })
        .collect::<Vec<_>>();

    // Providers hold the last bus senders; dropping them closes the channel.
    drop(providers);
    if let Err(e) = counter.await {
        warn!(error = %e, "update counter task failed");
    }
    let counts = counts.lock().unwrap_or_else(PoisonError::into_inner);
    summaries
        .into_iter()
        .map(|s| RunSummary {
            updates: counts.get(&s.provider).copied().unwrap_or(0),
            ..s
        })
        .collect()
}

/// Angular distance to ground truth at the sample time of `state`, degrees.
fn error_deg(state: &OrientationState, profile: &SimulationProfile) -> f32 {
    state
        .quaternion
        .angle_to(profile.truth_at(state.timestamp_ns))
        .to_degrees()
}

fn print_report(elapsed: Duration, providers: &[Provider], profile: &SimulationProfile) {
    println!("  {}", format!("t = {:.1}s", elapsed.as_secs_f32()).bold());
    for p in providers {
        let state = p.state();
        let e = state.euler_angles();
        let status = match p.status() {
            ProviderStatus::Running => "running".green(),
            ProviderStatus::Calibrating => {
                format!("calibrating {:>3.0}%", p.calibration_progress() * 100.0).yellow()
            }
            other => other.to_string().dimmed(),
        };
        println!(
            "    {:<24} yaw {:>8.2}  pitch {:>7.2}  roll {:>7.2}  err {:>6.2}°  {}",
            p.kind().to_string(),
            e.yaw,
            e.pitch,
            e.roll,
            error_deg(&state, profile),
            status
        );
    }
}

fn print_summary(summaries: &[RunSummary], json: bool) {
    if json {
        for s in summaries {
            match serde_json::to_string(s) {
                Ok(line) => println!("{line}"),
                Err(e) => warn!(provider = %s.provider, error = %e, "failed to encode summary"),
            }
        }
        return;
    }

    println!();
    println!("{}", "  Summary".bold().cyan());
    for s in summaries {
        println!(
            "    {:<24} {:>6} updates  final err {:>6.2}°  chart mean {}",
            s.provider.to_string().bold(),
            s.updates,
            s.error_deg,
            s.history_mean
                .map_or_else(|| "-".to_string(), |m| format!("{m:.2}")),
        );
    }
    println!();
}

fn print_banner() {
    println!();
    println!("{}", r#"   ___                 ___             "#.bold().cyan());
    println!("{}", r#"  / _ \_  _ _ _ ___  | __|  _ ______  "#.bold().cyan());
    println!("{}", r#" | (_ | || | '_/ _ \ | _| || (_-< -_) "#.bold().cyan());
    println!("{}", r#"  \___|\_, |_| \___/ |_| \_,_/__|___| "#.bold().cyan());
    println!("{}", r#"       |__/                            "#.bold().cyan());
    println!();
    println!(
        "  {} {}",
        "gyrofuse".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Orientation fusion on a synthetic IMU");
    println!();
}
