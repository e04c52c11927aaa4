// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Dispatch a command to the swarm and collect its output.

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;
use muster_core::domain::{AgentId, CommandPath, EnvSpec};
use muster_swarm::{BrokerClient, ControlPlane, ConvergencePolicy, RunCommand, SwarmSession};
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Command to execute on every agent
    pub path: String,

    /// Broker control-plane URL
    #[arg(long, env = "MUSTER_BROKER_URL", default_value = "http://127.0.0.1:8080")]
    pub broker: String,

    /// Size of the swarm the broker fronts
    #[arg(long)]
    pub agents: usize,

    /// Address a specific agent id (repeatable); discovered via ping when omitted
    #[arg(long = "agent", value_name = "ID")]
    pub agent_ids: Vec<String>,

    /// Environment entry for the command (repeatable)
    #[arg(short, long, value_name = "KEY=VALUE")]
    pub env: Vec<String>,

    /// Content piped to each agent's stdin
    #[arg(long)]
    pub stdin: Option<String>,

    /// How many agents may still be running when the run is declared done
    #[arg(long, default_value = "0")]
    pub can_run_off: usize,

    /// Pause between convergence polls, milliseconds
    #[arg(long, default_value = "1000")]
    pub loop_sleep_ms: u64,

    /// Maximum number of convergence polls before returning partial results
    #[arg(long, default_value = "1000")]
    pub loops: usize,
}

pub async fn execute(args: RunArgs) -> Result<()> {
    let client = BrokerClient::new(args.broker.trim_end_matches('/'), Some(args.agents));

    let agents: Vec<AgentId> = if args.agent_ids.is_empty() {
        client
            .ping()
            .await
            .context("Failed to discover agents via ping")?
    } else {
        args.agent_ids.iter().map(|id| AgentId(id.clone())).collect()
    };

    if agents.is_empty() {
        bail!("no agents reachable through {}", args.broker);
    }
    if agents.len() != args.agents {
        warn!(
            reachable = agents.len(),
            expected = args.agents,
            "swarm is not at full strength"
        );
    }

    let mut command = RunCommand::new(CommandPath::Exec(args.path));
    if !args.env.is_empty() {
        command = command.with_env(EnvSpec::Pairs(args.env).into_map()?);
    }
    if let Some(stdin) = args.stdin {
        command = command.with_stdin(stdin);
    }

    let policy = ConvergencePolicy {
        can_run_off: args.can_run_off,
        loop_sleep: Duration::from_millis(args.loop_sleep_ms),
        loop_budget: args.loops,
    };

    let session = SwarmSession::new(client, agents);
    let report = session.run(&command, &policy).await?;

    println!(
        "{}",
        format!(
            "run started {} UTC, {} of {} finished",
            report.started_at().format("%H:%M:%S"),
            report.finished(),
            session.target_count()
        )
        .dimmed()
    );

    let mut unfinished = 0;
    for agent in session.agents() {
        match report.exit_code(agent) {
            Some(0) => println!("{} {}", agent.to_string().bold(), "exit 0".green()),
            Some(code) => println!(
                "{} {}",
                agent.to_string().bold(),
                format!("exit {code}").red()
            ),
            None => {
                unfinished += 1;
                println!("{} {}", agent.to_string().bold(), "still running".yellow());
            }
        }

        let stdout = report.stdout(agent).unwrap_or_default();
        if !stdout.is_empty() {
            println!("{}", String::from_utf8_lossy(stdout));
        }
        let stderr = report.stderr(agent).unwrap_or_default();
        if !stderr.is_empty() {
            eprintln!("{}", String::from_utf8_lossy(stderr).red());
        }
    }

    if unfinished > args.can_run_off {
        bail!(
            "only {} of {} agents finished within the loop budget",
            session.target_count() - unfinished,
            session.target_count()
        );
    }
    Ok(())
}
