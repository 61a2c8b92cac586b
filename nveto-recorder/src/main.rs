//! nVETO recorder (nveto-recorder) - Main entry point
//!
//! Reads chunk files, runs the coincidence recorder over every chunk and
//! writes the kept records, retained lone records and lone statistics of
//! each input file as JSON.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use nveto_common::config::{load_config, write_toml_config, TomlConfig};
use nveto_recorder::io::{read_chunks, write_outputs, OutputPaths};
use nveto_recorder::NvetoRecorder;

/// Command-line arguments for nveto-recorder
#[derive(Parser, Debug)]
#[command(name = "nveto-recorder")]
#[command(about = "Software coincidence recorder for neutron-veto raw records")]
#[command(version)]
struct Args {
    /// Chunk files (JSON: one chunk object or an array of chunks)
    #[arg(required_unless_present = "write_default_config")]
    inputs: Vec<PathBuf>,

    /// Recorder config file (TOML)
    #[arg(short, long, env = "NVETO_RECORDER_CONFIG")]
    config: Option<PathBuf>,

    /// Directory for output files
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// Override coincidence_level
    #[arg(long)]
    coincidence_level: Option<u32>,

    /// Override resolving_time (ns)
    #[arg(long)]
    resolving_time: Option<i64>,

    /// Override n_lone_records
    #[arg(long)]
    n_lone_records: Option<usize>,

    /// Override any recorder option, e.g. --set channel_map=0-119
    #[arg(long = "set", value_name = "KEY=VALUE")]
    overrides: Vec<String>,

    /// Write a config file with default values to PATH and exit
    #[arg(long, value_name = "PATH")]
    write_default_config: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    if let Some(path) = &args.write_default_config {
        write_toml_config(&TomlConfig::default(), path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("Wrote default config to {}", path.display());
        return Ok(());
    }

    let mut toml_config = load_config(args.config.as_deref()).context("Failed to load config")?;

    // Initialize tracing (RUST_LOG wins over the configured level)
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| toml_config.logging.level.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting nVETO recorder v{}", env!("CARGO_PKG_VERSION"));

    let recorder_config = &mut toml_config.recorder;
    if let Some(level) = args.coincidence_level {
        recorder_config.set_coincidence_level(level)?;
    }
    if let Some(rt) = args.resolving_time {
        recorder_config.set_resolving_time(rt)?;
    }
    if let Some(n) = args.n_lone_records {
        recorder_config.set_n_lone_records(n)?;
    }
    for item in &args.overrides {
        let Some((key, value)) = item.split_once('=') else {
            bail!("Invalid override '{}', expected KEY=VALUE", item);
        };
        recorder_config
            .apply(key.trim(), value)
            .with_context(|| format!("Invalid override '{}'", item))?;
    }

    info!(
        coincidence_level = recorder_config.coincidence_level,
        resolving_time = recorder_config.resolving_time,
        channel_map = %recorder_config.channel_map,
        "Recorder configured"
    );

    let recorder = NvetoRecorder::new(toml_config.recorder.clone())
        .context("Invalid recorder configuration")?;

    for input in &args.inputs {
        let chunks = read_chunks(input)
            .with_context(|| format!("Failed to read chunks from {}", input.display()))?;
        let outputs = recorder
            .process_chunks(&chunks)
            .with_context(|| format!("Failed to process {}", input.display()))?;

        let paths = OutputPaths::for_input(&args.output_dir, input);
        write_outputs(&paths, &outputs)
            .with_context(|| format!("Failed to write outputs for {}", input.display()))?;

        let kept: usize = outputs.iter().map(|o| o.raw_records_coin.len()).sum();
        let total: usize = chunks.iter().map(|c| c.raw_records.len()).sum();
        info!(
            "Processed {}: {} chunks, kept {} of {} records",
            input.display(),
            chunks.len(),
            kept,
            total
        );
    }

    Ok(())
}
