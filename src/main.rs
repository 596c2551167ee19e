use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use cellblock::condition::parse_timeout;
use cellblock::config::EXAMPLE_CONFIG;
use cellblock::{util, Config, Scenario};

#[derive(Debug, Parser)]
#[command(name = "cellblock", version, about)]
struct Cli {
    /// Data directory (defaults to $CELLBLOCK_DATA_DIR, then ~/.cellblock)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Config file (defaults to <data-dir>/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run a scenario file and print the published output as JSON lines
    Run {
        scenario: PathBuf,
        /// Default timeout in seconds for magics without --timeout
        #[arg(short, long)]
        timeout: Option<String>,
    },
    /// Print the example configuration
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    util::init_data_dir(cli.data_dir.clone());

    // Initialize logging to file (~/.cellblock/logs/cellblock.log)
    fs::create_dir_all(util::logs_dir())?;

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(util::log_file_path())?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(log_file)
        .with_ansi(false)
        .init();

    match cli.command {
        Command::Config => {
            print!("{EXAMPLE_CONFIG}");
            Ok(())
        }
        Command::Run { scenario, timeout } => {
            let mut config = match &cli.config {
                Some(path) => Config::load_from(path)?,
                None => Config::load(),
            };
            if let Some(raw) = timeout {
                let timeout = parse_timeout(&raw).with_context(|| format!("--timeout {raw}"))?;
                config = config.with_default_timeout(Some(timeout));
            }
            run(&scenario, &config)
        }
    }
}

fn run(path: &Path, config: &Config) -> Result<()> {
    let scenario = Scenario::load(path)?;
    let report = scenario.run(config)?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    for record in &report.records {
        serde_json::to_writer(&mut out, record)?;
        writeln!(out)?;
    }
    out.flush()?;

    match &report.wait {
        Ok(Some(outcome)) => {
            eprintln!(
                "{:?} after {} steps in {:.3}s: {} captured, {} replayed, {} discarded",
                outcome.reason,
                outcome.steps,
                outcome.elapsed.as_secs_f64(),
                outcome.replay.captured,
                outcome.replay.replayed,
                outcome.replay.discarded,
            );
            Ok(())
        }
        Ok(None) => {
            eprintln!("Button already clicked, did not block");
            Ok(())
        }
        Err(e) => bail!("{e}"),
    }
}
