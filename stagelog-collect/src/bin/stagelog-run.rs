//! CLI tool to turn a folder of instrument logs into one CSV file.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use stagelog_collect::{CollectConfig, Collector, LogConfig, init_logging};
use tracing::{info, warn};

/// Process instrument logs into structured CSV.
#[derive(Parser)]
#[command(name = "stagelog-run", version)]
struct Cli {
    /// Path to JSON configuration file
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    /// Override output CSV file path
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Log at debug level regardless of config
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let loaded = CollectConfig::load(&cli.config)
        .with_context(|| format!("Failed to load config '{}'", cli.config.display()))?;
    let config = loaded.config;

    init_logging(LogConfig {
        level: &config.log_level,
        verbose: cli.verbose,
        file: config.log_file.as_deref(),
    })?;
    info!("stagelog-run v{}", env!("CARGO_PKG_VERSION"));
    if !loaded.from_file {
        warn!(
            "Config file not found: {}, using defaults",
            cli.config.display()
        );
    }

    let output = cli.output.unwrap_or_else(|| config.output_csv.clone());
    let mut collector = Collector::new(config).context("Invalid configuration")?;
    let summary = collector.run(&output).context("Processing failed")?;

    println!();
    println!("{summary}");
    Ok(())
}
