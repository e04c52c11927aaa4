// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Swarm liveness probe.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use muster_swarm::{probe_status, wait_ready, BrokerClient, SwarmStatus};
use std::time::Duration;

#[derive(Debug, Args)]
pub struct StatusArgs {
    /// Broker control-plane URL
    #[arg(long, env = "MUSTER_BROKER_URL", default_value = "http://127.0.0.1:8080")]
    pub broker: String,

    /// Size of the swarm the broker fronts
    #[arg(long)]
    pub agents: usize,

    /// Keep polling until every agent answers
    #[arg(long)]
    pub wait: bool,

    /// Pause between liveness polls, milliseconds
    #[arg(long, default_value = "1000")]
    pub interval_ms: u64,

    /// Maximum number of liveness polls in --wait mode
    #[arg(long, default_value = "60")]
    pub attempts: usize,
}

pub async fn execute(args: StatusArgs) -> Result<()> {
    let client = BrokerClient::new(args.broker.trim_end_matches('/'), Some(args.agents));

    let status = if args.wait {
        wait_ready(
            &client,
            args.agents,
            Duration::from_millis(args.interval_ms),
            args.attempts,
        )
        .await?
    } else {
        probe_status(&client, args.agents).await?
    };

    match status {
        SwarmStatus::Down => println!("{}", status.to_string().red().bold()),
        SwarmStatus::Up(_) => println!("{}", status.to_string().yellow()),
        SwarmStatus::UpAll => println!("{}", status.to_string().green().bold()),
    }

    if !status.is_all_up() {
        std::process::exit(1);
    }
    Ok(())
}
