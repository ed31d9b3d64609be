//! # Stage Control Unit
//!
//! Firmware core of a multi-axis stepper stage controller. Brings the
//! parameter store, motion supervisor and both command links up, then
//! enters the cooperative cycle until a shutdown signal arrives.

use std::path::PathBuf;
use std::process;
use std::sync::atomic::Ordering;

use clap::Parser;
use stage_common::types::ConfigureMode;
use stage_control_unit::config::{load_config, RuntimeConfig};
use stage_control_unit::link::{LinkPort, LoopbackPort, TtyPort};
use stage_control_unit::motion::MotionSupervisor;
use stage_control_unit::params::ParameterStore;
use stage_control_unit::{Controller, CycleRunner};
use tracing::{error, info, warn, Level};
use tracing_subscriber::EnvFilter;

/// Stage Control Unit — multi-axis stepper stage controller
#[derive(Parser, Debug)]
#[command(name = "stage_control_unit")]
#[command(version)]
#[command(about = "Multi-axis stepper stage controller core")]
struct Args {
    /// Path to the runtime configuration TOML.
    #[arg(default_value = "config/stage.toml")]
    config: PathBuf,

    /// Start from compiled defaults instead of the persisted block.
    #[arg(long)]
    defaults: bool,

    /// Enable verbose logging (DEBUG level).
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format.
    #[arg(long)]
    json: bool,
}

fn main() {
    let args = Args::parse();
    setup_tracing(&args);

    info!("Stage Control Unit v{} starting...", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(&args) {
        error!("FATAL: {e}");
        process::exit(1);
    }

    info!("Stage Control Unit shutdown complete");
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = if args.config.exists() {
        load_config(&args.config)?
    } else {
        warn!(
            "No config at '{}', using compiled defaults",
            args.config.display()
        );
        RuntimeConfig::default()
    };
    info!(
        "Config OK: store={}, host={:?}, remote={:?}",
        config.store_path.display(),
        config.host_device,
        config.remote_device,
    );

    let host_port = open_port(config.host_device.as_deref(), "host")?;
    let remote_port = open_port(config.remote_device.as_deref(), "remote")?;

    let params = ParameterStore::new(config.store_path.clone());
    let mut controller = Controller::new(params, MotionSupervisor::new(), host_port, remote_port);
    controller.startup(if args.defaults {
        ConfigureMode::Defaults
    } else {
        ConfigureMode::LoadPersisted
    });

    let mut runner = CycleRunner::new(controller, &config.intervals);

    let running = runner.running_flag();
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        running.store(false, Ordering::SeqCst);
    })?;

    runner.run();
    Ok(())
}

/// Open a link device, falling back to an in-memory loopback when no
/// device is configured (bench mode).
fn open_port(
    device: Option<&std::path::Path>,
    label: &str,
) -> Result<Box<dyn LinkPort>, Box<dyn std::error::Error>> {
    match device {
        Some(path) => {
            info!("{label} link on {}", path.display());
            Ok(Box::new(TtyPort::open(path)?))
        }
        None => {
            warn!("{label} link has no device, running loopback");
            Ok(Box::new(LoopbackPort::new()))
        }
    }
}

/// Setup tracing subscriber based on CLI arguments.
fn setup_tracing(args: &Args) {
    let level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .compact()
            .init();
    }
}
