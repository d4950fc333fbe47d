//! devlock CLI
//!
//! Runs the device-lock agent from the command line.
//!
//! # Commands
//!
//! - `run` - Poll the authority on a schedule and enforce the lock
//! - `sync` - Run a single sync attempt
//! - `status` - Show the provisioned identity and the last lock state
//! - `provision` - Write the device identity

mod commands;
mod terminal;

use clap::{Parser, Subcommand};
use commands::AgentArgs;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Remote device-lock enforcement agent.
#[derive(Parser)]
#[command(name = "devlock")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory holding the identity and lock state files
    #[arg(
        global = true,
        short,
        long,
        env = "DEVLOCK_DATA_DIR",
        default_value = "devlock-data"
    )]
    data_dir: PathBuf,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll the authority on a schedule and enforce the lock until Ctrl-C
    Run {
        #[command(flatten)]
        agent: AgentArgs,

        /// Minutes between sync cycles
        #[arg(short, long, default_value = "15")]
        interval: u64,

        /// Attempts per cycle, including the first
        #[arg(long, default_value = "3")]
        max_attempts: u32,

        /// Seconds before the first retry (doubles per retry)
        #[arg(long, default_value = "30")]
        retry_delay: u64,

        /// Sync even when the authority's host is unreachable
        #[arg(long)]
        no_network_check: bool,
    },

    /// Run a single sync attempt (exit code 0 success, 1 retryable, 2 terminal)
    Sync {
        #[command(flatten)]
        agent: AgentArgs,
    },

    /// Show the provisioned identity and the last lock state
    Status {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Write the device identity
    Provision {
        /// Device identifier (IMEI)
        #[arg(long)]
        imei: String,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Run {
            agent,
            interval,
            max_attempts,
            retry_delay,
            no_network_check,
        } => {
            let config = agent
                .config(&cli.data_dir)
                .with_schedule(commands::run::schedule(interval, no_network_check))
                .with_retry(commands::run::retry(max_attempts, retry_delay));
            commands::run::run(config)?;
        }
        Commands::Sync { agent } => {
            let code = commands::sync::run(agent.config(&cli.data_dir))?;
            if code != 0 {
                std::process::exit(code);
            }
        }
        Commands::Status { format } => {
            commands::status::run(&cli.data_dir, &format)?;
        }
        Commands::Provision { imei } => {
            commands::provision::run(&cli.data_dir, &imei)?;
        }
        Commands::Version => {
            println!("devlock v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
