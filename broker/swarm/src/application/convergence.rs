// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! The convergence loop: poll completion status and incremental output until
//! enough of the swarm has finished.
//!
//! Two rules carry the correctness of this loop:
//!
//! 1. A check snapshot is only taken when the previous tail produced nothing.
//!    While output is still flowing, completion cannot be trusted yet — the
//!    agent may have exited with data still buffered on its side.
//! 2. Every iteration tails *after* any check, including the check that first
//!    observes an exit code. Output flushed right before exit is therefore
//!    always collected, at the cost of one extra tail per completed agent.
//!
//! Exhausting the loop budget is not an error: the partial report is
//! returned and the caller inspects exit-code completeness itself.

use crate::application::control::{ControlPlane, ControlPlaneError};
use crate::domain::RunReport;
use muster_core::domain::AgentId;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Termination policy for one run.
#[derive(Debug, Clone)]
pub struct ConvergencePolicy {
    /// How many agents may still be running when the loop declares success.
    pub can_run_off: usize,

    /// Pause between loop iterations.
    pub loop_sleep: Duration,

    /// Maximum number of iterations before giving up and returning whatever
    /// was collected.
    pub loop_budget: usize,
}

impl Default for ConvergencePolicy {
    fn default() -> Self {
        Self {
            can_run_off: 0,
            loop_sleep: Duration::from_secs(1),
            loop_budget: 1000,
        }
    }
}

impl ConvergencePolicy {
    /// A run that tolerates the whole swarm straggling would terminate
    /// immediately having required nothing; reject it up front.
    pub fn validate(&self, target_count: usize) -> Result<(), ConvergenceError> {
        if self.can_run_off >= target_count {
            return Err(ConvergenceError::TooManyStragglers {
                can_run_off: self.can_run_off,
                agents: target_count,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum ConvergenceError {
    #[error("straggler allowance {can_run_off} must be smaller than the swarm size {agents}")]
    TooManyStragglers { can_run_off: usize, agents: usize },

    #[error(transparent)]
    ControlPlane(#[from] ControlPlaneError),
}

/// Drive check/tail probes against an already-dispatched command until
/// `agents.len() - policy.can_run_off` agents have an exit code, or the loop
/// budget runs out.
pub async fn converge<C>(
    plane: &C,
    agents: &[AgentId],
    policy: &ConvergencePolicy,
) -> Result<RunReport, ConvergenceError>
where
    C: ControlPlane + ?Sized,
{
    policy.validate(agents.len())?;
    let threshold = agents.len() - policy.can_run_off;

    let mut report = RunReport::for_agents(agents);
    let mut finished = 0;
    let mut updated = false;

    for iteration in 0..policy.loop_budget {
        if !updated {
            let checks = plane.check().await?;
            debug!(iteration, rows = checks.len(), "check snapshot");

            for check in &checks {
                if let Some(code) = check.exit_code {
                    report.record_exit(&check.agent, code);
                }
            }
            finished = report.finished();
        }

        let tails = plane.tail().await?;
        debug!(iteration, rows = tails.len(), "tail snapshot");

        updated = false;
        for tail in &tails {
            let wrote_out = report.append_stdout(&tail.agent, &tail.stdout);
            let wrote_err = report.append_stderr(&tail.agent, &tail.stderr);
            if wrote_out || wrote_err {
                updated = true;
            }
        }

        // The tail above ran after the check that first saw each exit code,
        // so output flushed just before exit is already in the report.
        if finished >= threshold {
            debug!(finished, threshold, "swarm converged");
            break;
        }

        tokio::time::sleep(policy.loop_sleep).await;
    }

    Ok(report)
}
