//! Command-line interface for the poller.

use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use clap::{Parser, Subcommand};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::config::load_config;
use crate::error::{PollerError, Result};
use crate::monitors::{custom_monitors, find_monitor, presets, Monitor};
use crate::output::{render, OutputFormat};
use crate::poll::{parse_reply, Poller};

/// Seconds between polls when `--count` is above one.
const DEFAULT_INTERVAL_SECS: u64 = 10;

/// sempwatch - Poll a message broker over SEMP and print the replies as tables.
#[derive(Parser)]
#[command(name = "sempwatch")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the available monitors.
    Monitors {
        /// Configuration file with custom monitors
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Extract a saved SEMP reply.
    Parse {
        /// File holding the reply XML
        file: PathBuf,

        /// Monitor whose request produced the reply
        #[arg(short, long)]
        monitor: String,

        /// Output format
        #[arg(short, long, value_enum, default_value_t)]
        format: OutputFormat,

        /// Configuration file with custom monitors
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Poll a broker and print each sample.
    Poll {
        /// Configuration file with the broker connection
        #[arg(short, long)]
        config: PathBuf,

        /// Monitor to run
        #[arg(short, long)]
        monitor: String,

        /// Output format
        #[arg(short, long, value_enum, default_value_t)]
        format: OutputFormat,

        /// Seconds between polls
        #[arg(short, long, default_value_t = DEFAULT_INTERVAL_SECS)]
        interval: u64,

        /// Number of polls
        #[arg(short = 'n', long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
        count: u32,
    },
}

/// Run the CLI.
pub fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Monitors { config } => monitors_command(config.as_deref()),
        Commands::Parse {
            file,
            monitor,
            format,
            config,
        } => parse_command(&file, &monitor, format, config.as_deref()),
        Commands::Poll {
            config,
            monitor,
            format,
            interval,
            count,
        } => poll_command(&config, &monitor, format, interval, count),
    }
}

/// Custom monitors from an optional configuration file.
fn load_custom(config: Option<&Path>) -> Result<Vec<Monitor>> {
    match config {
        Some(path) => custom_monitors(load_config(path)?.monitors),
        None => Ok(Vec::new()),
    }
}

/// Execute the monitors command.
fn monitors_command(config: Option<&Path>) -> Result<()> {
    let custom = load_custom(config)?;

    let mut monitors = custom.clone();
    monitors.extend(
        presets()
            .into_iter()
            .filter(|preset| !custom.iter().any(|c| c.name == preset.name)),
    );

    let width = monitors.iter().map(|m| m.name.len()).max().unwrap_or(0);
    for monitor in &monitors {
        println!(
            "{}  {}",
            style(format!("{:<width$}", monitor.name)).cyan(),
            monitor.description
        );
    }
    Ok(())
}

/// Execute the parse command.
fn parse_command(
    file: &Path,
    monitor: &str,
    format: OutputFormat,
    config: Option<&Path>,
) -> Result<()> {
    let custom = load_custom(config)?;
    let monitor = find_monitor(monitor, &custom)?;

    let reply = fs::read_to_string(file)?;
    let sample = parse_reply(&monitor, &reply)?;

    println!("{}", render(&sample, format)?);
    Ok(())
}

/// Execute the poll command.
fn poll_command(
    config: &Path,
    monitor: &str,
    format: OutputFormat,
    interval: u64,
    count: u32,
) -> Result<()> {
    let config = load_config(config)?;
    let custom = custom_monitors(config.monitors)?;
    let monitor = find_monitor(monitor, &custom)?;
    let url = config.broker.semp_url();

    let mut poller = Poller::new(config.broker, monitor)?;
    let mut failed = 0;

    for round in 1..=count {
        if round > 1 {
            thread::sleep(Duration::from_secs(interval));
        }

        let pb = spinner(format!(
            "Polling {} on {url} ({round}/{count})...",
            poller.monitor().name
        ));
        let polled = poller.poll_once();
        pb.finish_and_clear();

        let sample = match polled {
            Ok(sample) => sample,
            Err(e) => {
                failed += 1;
                tracing::warn!(round, error = %e, "Poll failed");
                eprintln!("{} poll {round}/{count}: {e}", style("Failed").red());
                continue;
            }
        };

        println!("{}", render(&sample, format)?);
        if round < count && format == OutputFormat::Table {
            println!();
        }
    }

    if failed > 0 {
        return Err(PollerError::PollsFailed {
            failed,
            total: count,
        });
    }
    Ok(())
}

/// Spinner shown while one poll is in flight.
fn spinner(message: String) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    #[allow(clippy::expect_used)] // Static template string that is guaranteed to be valid
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .expect("valid template"),
    );
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}
