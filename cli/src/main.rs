// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # MUSTER CLI
//!
//! The `muster` binary runs the command-dispatch broker and drives it as an
//! operator:
//!
//! - `muster serve` - run the broker daemon (HTTP control plane + agent channels)
//! - `muster status` - probe swarm liveness, optionally waiting for the full fleet
//! - `muster run` - dispatch a command to the swarm and collect its output
//! - `muster missed` - inspect or clear the broker's missed-response store

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

mod commands;

use commands::{MissedArgs, RunArgs, ServeArgs, StatusArgs};

/// MUSTER - fan a command out to a swarm of agents and collect the results
#[derive(Parser)]
#[command(name = "muster")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "MUSTER_LOG_LEVEL", default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the broker daemon
    #[command(name = "serve")]
    Serve {
        #[command(flatten)]
        args: ServeArgs,
    },

    /// Probe swarm liveness
    #[command(name = "status")]
    Status {
        #[command(flatten)]
        args: StatusArgs,
    },

    /// Dispatch a command to the swarm and wait for convergence
    #[command(name = "run")]
    Run {
        #[command(flatten)]
        args: RunArgs,
    },

    /// Inspect or clear the broker's missed-response store
    #[command(name = "missed")]
    Missed {
        #[command(flatten)]
        args: MissedArgs,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli.log_level)?;

    match cli.command {
        Commands::Serve { args } => commands::serve::execute(args).await,
        Commands::Status { args } => commands::status::execute(args).await,
        Commands::Run { args } => commands::run::execute(args).await,
        Commands::Missed { args } => commands::missed::execute(args).await,
    }
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();

    Ok(())
}
