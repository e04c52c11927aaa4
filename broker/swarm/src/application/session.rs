// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! One client session against a fixed swarm: dispatch, converge, probe.

use crate::application::control::{ControlPlane, ControlPlaneError, RunCommand};
use crate::application::convergence::{converge, ConvergenceError, ConvergencePolicy};
use crate::domain::{RunReport, SwarmStatus};
use muster_core::domain::AgentId;
use std::time::Duration;
use tracing::{debug, info};

/// A swarm is not a persisted object — just the broker endpoint plus the
/// fixed set of agents this session addresses.
pub struct SwarmSession<C> {
    plane: C,
    agents: Vec<AgentId>,
}

impl<C: ControlPlane> SwarmSession<C> {
    pub fn new(plane: C, agents: Vec<AgentId>) -> Self {
        Self { plane, agents }
    }

    pub fn agents(&self) -> &[AgentId] {
        &self.agents
    }

    pub fn target_count(&self) -> usize {
        self.agents.len()
    }

    /// Dispatch `command` to every agent and run the convergence loop until
    /// the policy's threshold is met or its budget runs out.
    ///
    /// Policy preconditions are checked before anything is published.
    pub async fn run(
        &self,
        command: &RunCommand,
        policy: &ConvergencePolicy,
    ) -> Result<RunReport, ConvergenceError> {
        policy.validate(self.target_count())?;

        let acks = self.plane.run_command(command).await?;
        info!(
            acks = acks.len(),
            agents = self.target_count(),
            "command in flight"
        );

        converge(&self.plane, &self.agents, policy).await
    }

    /// Liveness summary; see [`probe_status`].
    pub async fn status(&self) -> Result<SwarmStatus, ControlPlaneError> {
        probe_status(&self.plane, self.target_count()).await
    }

    /// Readiness wait; see [`wait_ready`].
    pub async fn wait_ready(
        &self,
        poll_interval: Duration,
        attempts: usize,
    ) -> Result<SwarmStatus, ControlPlaneError> {
        wait_ready(&self.plane, self.target_count(), poll_interval, attempts).await
    }
}

/// Liveness summary for a swarm of `target_count` agents. An unreachable
/// broker is a status, not an error; anything else the probe cannot
/// interpret still propagates.
pub async fn probe_status<C>(
    plane: &C,
    target_count: usize,
) -> Result<SwarmStatus, ControlPlaneError>
where
    C: ControlPlane + ?Sized,
{
    match plane.ping().await {
        Err(ControlPlaneError::Unreachable { reason }) => {
            debug!(%reason, "broker is down");
            Ok(SwarmStatus::Down)
        }
        Err(other) => Err(other),
        Ok(pings) if pings.len() == target_count => Ok(SwarmStatus::UpAll),
        Ok(pings) => Ok(SwarmStatus::Up(pings.len())),
    }
}

/// Block until the whole swarm answers the liveness probe, polling up to
/// `attempts` times. Returns the last observed status either way so the
/// caller can decide whether a degraded fleet is good enough.
pub async fn wait_ready<C>(
    plane: &C,
    target_count: usize,
    poll_interval: Duration,
    attempts: usize,
) -> Result<SwarmStatus, ControlPlaneError>
where
    C: ControlPlane + ?Sized,
{
    let mut last = probe_status(plane, target_count).await?;
    for _ in 1..attempts {
        if last.is_all_up() {
            break;
        }
        tokio::time::sleep(poll_interval).await;
        last = probe_status(plane, target_count).await?;
    }
    Ok(last)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::control::{CheckReply, TailReply};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Ping-only stub: scripted outcomes, one per call.
    struct ScriptedPings {
        outcomes: Mutex<Vec<Result<Vec<AgentId>, ControlPlaneError>>>,
    }

    impl ScriptedPings {
        fn new(outcomes: Vec<Result<Vec<AgentId>, ControlPlaneError>>) -> Self {
            Self {
                outcomes: Mutex::new(outcomes),
            }
        }
    }

    #[async_trait]
    impl ControlPlane for ScriptedPings {
        async fn run_command(
            &self,
            _command: &RunCommand,
        ) -> Result<Vec<serde_json::Value>, ControlPlaneError> {
            unimplemented!("status tests never dispatch")
        }

        async fn check(&self) -> Result<Vec<CheckReply>, ControlPlaneError> {
            unimplemented!("status tests never check")
        }

        async fn tail(&self) -> Result<Vec<TailReply>, ControlPlaneError> {
            unimplemented!("status tests never tail")
        }

        async fn ping(&self) -> Result<Vec<AgentId>, ControlPlaneError> {
            self.outcomes.lock().unwrap().remove(0)
        }
    }

    fn fleet(names: &[&str]) -> Vec<AgentId> {
        names.iter().map(|n| AgentId::from(*n)).collect()
    }

    #[tokio::test]
    async fn test_status_down_when_broker_unreachable() {
        let plane = ScriptedPings::new(vec![Err(ControlPlaneError::Unreachable {
            reason: "connection refused".into(),
        })]);
        let session = SwarmSession::new(plane, fleet(&["foo", "bar"]));

        assert_eq!(session.status().await.unwrap(), SwarmStatus::Down);
    }

    #[tokio::test]
    async fn test_status_counts_partial_fleet() {
        let plane = ScriptedPings::new(vec![Ok(fleet(&["foo"]))]);
        let session = SwarmSession::new(plane, fleet(&["foo", "bar"]));

        assert_eq!(session.status().await.unwrap(), SwarmStatus::Up(1));
    }

    #[tokio::test]
    async fn test_status_up_all_when_every_agent_answers() {
        let plane = ScriptedPings::new(vec![Ok(fleet(&["foo", "bar"]))]);
        let session = SwarmSession::new(plane, fleet(&["foo", "bar"]));

        assert_eq!(session.status().await.unwrap(), SwarmStatus::UpAll);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_ready_polls_until_all_up() {
        let plane = ScriptedPings::new(vec![
            Err(ControlPlaneError::Unreachable {
                reason: "starting".into(),
            }),
            Ok(fleet(&["foo"])),
            Ok(fleet(&["foo", "bar"])),
        ]);
        let session = SwarmSession::new(plane, fleet(&["foo", "bar"]));

        let status = session
            .wait_ready(Duration::from_secs(5), 10)
            .await
            .unwrap();
        assert_eq!(status, SwarmStatus::UpAll);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_ready_reports_last_status_on_budget_exhaustion() {
        let plane = ScriptedPings::new(vec![
            Ok(fleet(&["foo"])),
            Ok(fleet(&["foo"])),
            Ok(fleet(&["foo"])),
        ]);
        let session = SwarmSession::new(plane, fleet(&["foo", "bar"]));

        let status = session.wait_ready(Duration::from_secs(1), 3).await.unwrap();
        assert_eq!(status, SwarmStatus::Up(1));
    }
}
