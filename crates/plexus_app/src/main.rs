// SPDX-License-Identifier: MIT OR Apache-2.0
//! Plexus - plug dependency graph engine
//!
//! Command line driver that builds a demo shot network and evaluates it
//! from worker threads:
//! - Engine settings loaded from a RON file
//! - Parallel evaluation over frames and shots through one shared cache
//! - Cache statistics logged after each pass
//!
//! Logging honours `RUST_LOG`, defaulting to `info` for Plexus crates.

mod demo;

use anyhow::Context as _;
use clap::Parser;
use plexus_graph::EngineConfig;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Evaluate a Plexus demo network
#[derive(Debug, Parser)]
#[command(name = "plexus", version, about)]
struct Args {
    /// Engine configuration file (RON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write the effective configuration to this path and exit
    #[arg(long)]
    write_config: Option<PathBuf>,

    /// Number of frames to evaluate
    #[arg(short, long, default_value_t = 24)]
    frames: u32,

    /// Number of worker threads
    #[arg(short, long, default_value_t = 4)]
    threads: usize,

    /// Change a spreadsheet row's scale before the second pass, e.g. `row1=2.0`
    #[arg(long, value_parser = parse_regrade)]
    regrade: Option<(String, f32)>,
}

fn parse_regrade(arg: &str) -> Result<(String, f32), String> {
    let (row, scale) = arg.split_once('=').ok_or("expected ROW=SCALE")?;
    let scale = scale.parse::<f32>().map_err(|e| format!("invalid scale: {e}"))?;
    Ok((row.to_string(), scale))
}

fn init_logging() -> anyhow::Result<()> {
    let env_filter = match tracing_subscriber::EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => tracing_subscriber::EnvFilter::try_new("plexus=info")?,
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()?;
    Ok(())
}

fn run(args: Args) -> anyhow::Result<()> {
    let config = match &args.config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("failed to load engine config from {}", path.display()))?,
        None => EngineConfig::default(),
    };

    if let Some(path) = &args.write_config {
        config
            .save(path)
            .with_context(|| format!("failed to write engine config to {}", path.display()))?;
        tracing::info!(path = %path.display(), "wrote engine config");
        return Ok(());
    }

    tracing::info!(?config, frames = args.frames, threads = args.threads, "starting");
    let demo = demo::build(config, args.frames)?;

    let evaluated = demo::evaluate(&demo, args.frames, args.threads)?;
    let stats = demo.graph.read().engine().stats();
    tracing::info!(evaluated, ?stats, "first pass");

    if let Some((row, scale)) = &args.regrade {
        demo::regrade(&demo, row, *scale)?;
        tracing::info!(row = %row, scale = *scale, "regraded");
    }

    let evaluated = demo::evaluate(&demo, args.frames, args.threads)?;
    let graph = demo.graph.read();
    let stats = graph.engine().stats();
    tracing::info!(evaluated, ?stats, "second pass");

    let released = graph.engine().sweep();
    tracing::info!(released, "swept value cache");
    drop(graph);

    if args.regrade.is_some() {
        demo::undo(&demo)?;
        tracing::info!("restored grade");
    }
    Ok(())
}

fn main() {
    let args = Args::parse();
    if let Err(e) = init_logging() {
        eprintln!("Failed to initialise logging: {e}");
    }

    tracing::info!("Starting Plexus v{}", env!("CARGO_PKG_VERSION"));
    if let Err(e) = run(args) {
        tracing::error!("Plexus failed: {e:#}");
        std::process::exit(1);
    }
}
