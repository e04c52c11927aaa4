// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Inspect or clear the broker's missed-response store.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use muster_swarm::BrokerClient;

#[derive(Debug, Args)]
pub struct MissedArgs {
    /// Broker control-plane URL
    #[arg(long, env = "MUSTER_BROKER_URL", default_value = "http://127.0.0.1:8080")]
    pub broker: String,

    /// Clear the store after reporting it
    #[arg(long)]
    pub clear: bool,
}

pub async fn execute(args: MissedArgs) -> Result<()> {
    let client = BrokerClient::new(args.broker.trim_end_matches('/'), None);
    let missed = client.missed(args.clear).await?;

    if missed.is_empty() {
        println!("{}", "no missed responses".dimmed());
        return Ok(());
    }

    for (req, responses) in &missed {
        println!(
            "{} {}",
            req.bold(),
            format!("({} response(s))", responses.len()).dimmed()
        );
        for response in responses {
            println!("  {}", serde_json::to_string(response)?);
        }
    }

    if args.clear {
        println!("{}", "store cleared".yellow());
    }
    Ok(())
}
