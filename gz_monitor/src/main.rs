//! # gz_monitor
//!
//! Inspection and control tool for a simulator namespace.
//!
//! # Usage
//!
//! ```bash
//! # Is a simulator serving namespace 0?
//! gz_monitor query
//!
//! # List interfaces, as a table or JSON
//! gz_monitor list
//! gz_monitor list --output json
//!
//! # Drive the simulation interface
//! gz_monitor sim pause
//! gz_monitor sim set-pose robot 1.0 -2.0 0.5
//! gz_monitor sim go 250000
//!
//! # Serve a stand-in world with two models
//! gz_monitor serve --model robot --model crate -v
//! ```

#![deny(warnings)]

use clap::{Parser, Subcommand, ValueEnum};
use gz_common::prelude::DEFAULT_TICK;
use gz_monitor::report::{StatusReport, interface_table, to_json};
use gz_monitor::{MonitorConfig, Stage};
use gz_shm::{Client, InterfaceDiscovery, Namespace, Server, ShmError, SimulationIface};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use tracing::{Level, error, info, warn};
use tracing_subscriber::EnvFilter;

type CliResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

/// gz_monitor - inspect and drive a simulator namespace
#[derive(Parser, Debug)]
#[command(name = "gz_monitor")]
#[command(author = "RTS007")]
#[command(version)]
#[command(about = "Inspect and drive a shared-memory simulator namespace")]
#[command(long_about = None)]
struct Args {
    /// Path to a monitor configuration file (TOML). Defaults apply without one.
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override the namespace server id from the configuration
    #[arg(short, long)]
    server_id: Option<u32>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Report whether a simulator is serving the namespace
    Query,
    /// List published interfaces
    List {
        #[arg(short, long, value_enum, default_value_t = Output::Table)]
        output: Output,
    },
    /// Print namespace statistics
    Stats,
    /// Print interface activity every time the simulator posts
    Watch {
        /// Stop after this many updates
        #[arg(short = 'n', long)]
        count: Option<u64>,
    },
    /// Talk to the simulation interface
    Sim {
        #[command(subcommand)]
        action: SimAction,
    },
    /// Remove interfaces left behind by dead simulators
    Cleanup,
    /// Serve a stand-in world until interrupted
    Serve {
        /// Model to place in the world (repeatable)
        #[arg(short, long = "model", default_value = "robot")]
        models: Vec<String>,

        /// Take the namespace over from a live server
        #[arg(short, long)]
        force: bool,
    },
}

#[derive(Subcommand, Debug)]
enum SimAction {
    /// Clocks, run state and queued requests
    Status {
        #[arg(short, long, value_enum, default_value_t = Output::Table)]
        output: Output,
    },
    /// Halt physics
    Pause,
    /// Resume physics
    Unpause,
    /// Return models to their saved poses
    Reset,
    /// Save the current world state
    Save,
    /// Print the pose of a model
    Pose { model: String },
    /// Place a model on the ground plane
    SetPose {
        model: String,
        #[arg(allow_hyphen_values = true)]
        x: f32,
        #[arg(allow_hyphen_values = true)]
        y: f32,
        #[arg(allow_hyphen_values = true)]
        yaw: f32,
    },
    /// List models with their type and pose
    Models,
    /// Run for the given simulated microseconds, then pause
    Go { run_time_us: u32 },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Output {
    Table,
    Json,
}

fn main() -> CliResult {
    if let Err(e) = run() {
        error!("gz_monitor failed: {}", e);
        std::process::exit(1);
    }
    Ok(())
}

fn run() -> CliResult {
    let args = Args::parse();
    setup_tracing(&args);

    let mut config = MonitorConfig::load_or_default(args.config.as_deref())?;
    if let Some(server_id) = args.server_id {
        config.monitor.server_id = server_id;
    }
    let server_id = config.monitor.server_id;

    match args.command {
        Command::Query => {
            let live = Client::query(&config.shm, server_id);
            println!(
                "server {} {}",
                server_id,
                if live { "running" } else { "not running" }
            );
            if !live {
                std::process::exit(2);
            }
        }
        Command::List { output } => {
            let interfaces = discovery(&config).list_interfaces()?;
            match output {
                Output::Table => print!("{}", interface_table(&interfaces)),
                Output::Json => println!("{}", to_json(&interfaces)?),
            }
        }
        Command::Stats => {
            let stats = discovery(&config).statistics()?;
            println!("{}", to_json(&stats)?);
        }
        Command::Watch { count } => watch(&config, count)?,
        Command::Sim { action } => sim(&config, action)?,
        Command::Cleanup => {
            let removed = discovery(&config).cleanup_stale()?;
            info!("Removed {} stale interfaces", removed);
        }
        Command::Serve { models, force } => serve(&config, &models, force)?,
    }
    Ok(())
}

fn discovery(config: &MonitorConfig) -> InterfaceDiscovery {
    InterfaceDiscovery::new(Namespace::new(&config.shm, config.monitor.server_id))
}

fn watch(config: &MonitorConfig, count: Option<u64>) -> CliResult {
    let client = Client::connect(&config.shm, config.monitor.server_id)?;
    let discovery = discovery(config);
    let mut seen = 0u64;
    while count.is_none_or(|limit| seen < limit) {
        match client.wait() {
            Ok(()) => {}
            Err(ShmError::ServerShutdown { .. }) => {
                warn!("Server stopped");
                break;
            }
            Err(e) => return Err(e.into()),
        }
        seen += 1;
        for info in discovery.list_interfaces()? {
            println!("{:>6} {:<32} {:>10} {:>10.3}", seen, info.id, info.post_count, info.time);
        }
    }
    Ok(())
}

fn sim(config: &MonitorConfig, action: SimAction) -> CliResult {
    let client = Client::connect(&config.shm, config.monitor.server_id)?;
    let sim = SimulationIface::open(&client, &config.monitor.simulation_id)?;

    match action {
        SimAction::Status { output } => {
            let report = StatusReport::from(sim.status()?);
            match output {
                Output::Table => println!(
                    "state {}  sim {:.3}s  pause {:.3}s  real {:.3}s  pending {}",
                    report.state,
                    report.sim_time,
                    report.pause_time,
                    report.real_time,
                    report.pending_requests
                ),
                Output::Json => println!("{}", to_json(&report)?),
            }
        }
        SimAction::Pause => sim.pause()?,
        SimAction::Unpause => sim.unpause()?,
        SimAction::Reset => sim.reset()?,
        SimAction::Save => sim.save()?,
        SimAction::Pose { model } => {
            let pose = found(sim.get_pose3d(&model)?, &model)?;
            println!(
                "{} x {:.3} y {:.3} z {:.3} roll {:.3} pitch {:.3} yaw {:.3}",
                model, pose.pos.x, pose.pos.y, pose.pos.z, pose.roll, pose.pitch, pose.yaw
            );
        }
        SimAction::SetPose { model, x, y, yaw } => sim.set_pose2d(&model, x, y, yaw)?,
        SimAction::Models => {
            let total = found(sim.get_num_models()?, "model count")?;
            for index in 0..total {
                let Some(name) = sim.get_model_name(index)? else {
                    warn!("Model {} vanished while listing", index);
                    continue;
                };
                let kind = sim.get_model_type(&name)?.unwrap_or_default();
                match sim.get_pose2d(&name)? {
                    Some((x, y, yaw)) => {
                        println!("{name:<24} {kind:<16} {x:>8.3} {y:>8.3} {yaw:>7.3}")
                    }
                    None => println!("{name:<24} {kind:<16}"),
                }
            }
        }
        SimAction::Go { run_time_us } => {
            let completion = sim.go(run_time_us)?;
            let outcome = completion.wait();
            println!("go {run_time_us}us: {outcome:?}");
        }
    }
    Ok(())
}

fn found<T>(value: Option<T>, what: &str) -> CliResult<T> {
    value.ok_or_else(|| format!("simulator has no answer for '{what}'").into())
}

fn serve(config: &MonitorConfig, models: &[String], force: bool) -> CliResult {
    info!(
        "{} v{} serving namespace {}",
        config.shared.service_name,
        env!("CARGO_PKG_VERSION"),
        config.monitor.server_id
    );
    let server = Server::init(&config.shm, config.monitor.server_id, force)?;
    let mut stage = Stage::new(&server, &config.monitor.simulation_id, models)?;

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = Arc::clone(&running);
        ctrlc::set_handler(move || {
            info!("Received shutdown signal");
            running.store(false, Ordering::SeqCst);
        })?;
    }

    while running.load(Ordering::SeqCst) {
        let report = stage.step(DEFAULT_TICK)?;
        if report.deferred > 0 {
            warn!("{} requests deferred to the next tick", report.deferred);
        }
        thread::sleep(DEFAULT_TICK);
    }

    stage.finish()?;
    server.fini()?;
    info!("gz_monitor shutdown complete");
    Ok(())
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
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}
