//! Silo CLI
//!
//! TigerStyle: Command-line driver for the factorial grains with explicit error handling.

mod repl;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use repl::Repl;
use silo_core::config::SiloConfig;
use silo_core::telemetry::{init_telemetry, TelemetryConfig};
use silo_grains::{calculate, Factorial, MemoGrain, Recurrence};
use silo_runtime::{Runtime, RuntimeBuilder};
use std::path::PathBuf;
use tokio::io::BufReader;
use tracing::info;

/// Silo CLI
#[derive(Parser, Debug)]
#[command(name = "silo")]
#[command(about = "Single-process virtual actor host computing memoized factorials")]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// JSON configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Give up waiting on a call after this many milliseconds
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compute a single factorial
    Calc {
        /// Key of the factorial grain
        #[arg(allow_hyphen_values = true)]
        n: i64,
    },

    /// Read one integer per line from stdin and print its factorial
    Repl,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let _telemetry = init_telemetry(TelemetryConfig::new("silo").with_log_level(filter))
        .context("Failed to initialize logging")?;

    let config = load_config(&cli)?;
    let mut runtime = MemoGrain::<Factorial>::register(RuntimeBuilder::new())
        .with_silo_config(&config)
        .build()
        .context("Failed to build runtime")?;

    runtime.start().context("Failed to start runtime")?;
    info!("Silo started");

    let result = match cli.command.unwrap_or(Commands::Repl) {
        Commands::Calc { n } => cmd_calc(&runtime, n).await,
        Commands::Repl => cmd_repl(&runtime).await,
    };

    runtime.stop().await.context("Failed to stop runtime")?;
    info!("Silo stopped");
    result
}

/// Load the configuration file, if any, and apply command-line overrides
fn load_config(cli: &Cli) -> Result<SiloConfig> {
    let mut config = match &cli.config {
        Some(path) => SiloConfig::from_json_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => SiloConfig::default(),
    };

    if let Some(timeout_ms) = cli.timeout_ms {
        config.client.invocation_timeout_ms = Some(timeout_ms);
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Compute one factorial
async fn cmd_calc(runtime: &Runtime, n: i64) -> Result<()> {
    let handle = runtime.get_actor(Factorial::TYPE_TAG, n)?;
    let value = calculate(&handle)
        .await
        .with_context(|| format!("Failed to compute {}!", n))?;

    println!("{}! = {}", n, value);
    Ok(())
}

/// Answer stdin line by line until EOF or Ctrl-C
async fn cmd_repl(runtime: &Runtime) -> Result<()> {
    let repl = Repl::new(runtime.actor_handles());
    let input = BufReader::new(tokio::io::stdin());
    let mut output = tokio::io::stdout();
    let mut errors = tokio::io::stderr();

    tokio::select! {
        summary = repl.run(input, &mut output, &mut errors) => {
            let summary = summary?;
            info!(computed = summary.computed, failed = summary.failed, "Input ended");
        }
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for Ctrl-C")?;
            eprintln!();
            eprintln!("{}", "Interrupted, shutting down...".dimmed());
        }
    }

    Ok(())
}
