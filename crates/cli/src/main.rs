//! MediTrack CLI - patient and doctor portal client

mod commands;
mod config;
mod logging;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use commands::{AppContext, Commands};
use meditrack_client::StateDir;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{Level, error, info};

#[derive(Parser)]
#[command(name = "meditrack")]
#[command(about = "Command-line client for the MediTrack portal")]
#[command(version)]
struct Cli {
    /// Set logging level
    #[arg(short = 'l', long, global = true, default_value = "warn")]
    log_level: LogLevel,

    /// State directory for configuration, stored session and logs
    #[arg(short = 'd', long, global = true, env = "MEDITRACK_STATE_DIR")]
    state_dir: Option<PathBuf>,

    /// Configuration file (JSON, TOML or YAML)
    #[arg(short = 'c', long, global = true)]
    config: Option<PathBuf>,

    /// Timeout for operations in seconds (0 = no timeout, chat is never timed out)
    #[arg(short = 't', long, global = true, default_value = "60")]
    timeout: u64,

    /// Disable file logging (only log to stderr)
    #[arg(long, global = true)]
    no_file_log: bool,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Config can relocate the state directory, resolve it before logging starts
    let discovered = StateDir::resolve(cli.state_dir.clone());
    let mut client_config = config::load_client_config(cli.config.as_deref(), &discovered)?;
    let state_dir =
        config::effective_state_dir(cli.state_dir.is_some(), &mut client_config, discovered);
    state_dir.create_directories()?;

    logging::init_logging(cli.log_level.into(), &state_dir, "cli", cli.no_file_log)?;

    let ctx = AppContext::new(client_config, state_dir)?;
    info!("Starting MediTrack CLI");

    let timeout = (cli.timeout > 0 && !cli.command.is_interactive())
        .then(|| Duration::from_secs(cli.timeout));

    let outcome = match timeout {
        None => cli.command.execute(&ctx).await,
        Some(duration) => match tokio::time::timeout(duration, cli.command.execute(&ctx)).await {
            Ok(result) => result,
            Err(_) => {
                error!("Command timed out after {} seconds", cli.timeout);
                std::process::exit(1);
            }
        },
    };

    match outcome {
        Ok(()) => {
            info!("Command completed successfully");
        }
        Err(e) => {
            error!("Command failed: {e}");
            if ctx.session_expired() {
                eprintln!("Your session has expired. Run `meditrack login` to sign in again.");
            }
            std::process::exit(1);
        }
    }

    Ok(())
}

#[derive(Clone, Debug, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for Level {
    fn from(log_level: LogLevel) -> Self {
        match log_level {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Trace => Level::TRACE,
        }
    }
}
