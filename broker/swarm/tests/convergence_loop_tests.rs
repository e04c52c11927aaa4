// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Convergence-loop tests against a scripted control plane.
//!
//! The scripted plane plays the broker: check and tail replies are dequeued
//! in call order, and call counts are recorded so the tests can pin down the
//! exact probe interleaving — in particular the rule that a tail always runs
//! after the check that first observes an agent's completion.

use async_trait::async_trait;
use muster_core::domain::AgentId;
use muster_swarm::{
    converge, CheckReply, ControlPlane, ControlPlaneError, ConvergenceError, ConvergencePolicy,
    RunCommand, SwarmSession, TailReply,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

struct ScriptedPlane {
    checks: Mutex<VecDeque<Vec<CheckReply>>>,
    tails: Mutex<VecDeque<Vec<TailReply>>>,
    // Arc so call counts stay observable after the plane moves into a session.
    dispatch_calls: Arc<AtomicUsize>,
    check_calls: Arc<AtomicUsize>,
    tail_calls: Arc<AtomicUsize>,
}

impl ScriptedPlane {
    fn new(checks: Vec<Vec<CheckReply>>, tails: Vec<Vec<TailReply>>) -> Self {
        Self {
            checks: Mutex::new(checks.into()),
            tails: Mutex::new(tails.into()),
            dispatch_calls: Arc::new(AtomicUsize::new(0)),
            check_calls: Arc::new(AtomicUsize::new(0)),
            tail_calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl ControlPlane for ScriptedPlane {
    async fn run_command(
        &self,
        _command: &RunCommand,
    ) -> Result<Vec<serde_json::Value>, ControlPlaneError> {
        self.dispatch_calls.fetch_add(1, Ordering::SeqCst);
        Ok(vec![])
    }

    async fn check(&self) -> Result<Vec<CheckReply>, ControlPlaneError> {
        self.check_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.checks.lock().unwrap().pop_front().unwrap_or_default())
    }

    async fn tail(&self) -> Result<Vec<TailReply>, ControlPlaneError> {
        self.tail_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.tails.lock().unwrap().pop_front().unwrap_or_default())
    }

    async fn ping(&self) -> Result<Vec<AgentId>, ControlPlaneError> {
        Ok(vec![])
    }
}

fn fleet(names: &[&str]) -> Vec<AgentId> {
    names.iter().map(|n| AgentId::from(*n)).collect()
}

fn check(agent: &str, exit_code: Option<i32>) -> CheckReply {
    CheckReply {
        agent: AgentId::from(agent),
        exit_code,
    }
}

fn tail(agent: &str, stdout: &str, stderr: &str) -> TailReply {
    TailReply {
        agent: AgentId::from(agent),
        stdout: stdout.into(),
        stderr: stderr.into(),
    }
}

/// Two agents, one allowed straggler, sleep of 3 units. `foo` finishes on the
/// third check while both agents still have output in flight; the loop must
/// terminate right after that check's tail with every delta accounted for
/// and exactly four sleeps behind it.
#[tokio::test(start_paused = true)]
async fn test_two_agent_scenario_with_one_straggler() {
    let plane = ScriptedPlane::new(
        vec![
            vec![check("foo", None), check("bar", None)],
            vec![check("foo", None), check("bar", None)],
            vec![check("foo", Some(63)), check("bar", None)],
        ],
        vec![
            vec![
                tail("foo", "half the fleet ", "warming up "),
                tail("bar", "the other half ", "spinning up "),
            ],
            vec![],
            vec![
                tail("foo", "reports in", "going loud"),
                tail("bar", "stays quiet", "going dark"),
            ],
            vec![],
            vec![tail("foo", ".", "!"), tail("bar", ".", "!")],
        ],
    );
    let agents = fleet(&["foo", "bar"]);
    let policy = ConvergencePolicy {
        can_run_off: 1,
        loop_sleep: Duration::from_secs(3),
        loop_budget: 1000,
    };

    let started = tokio::time::Instant::now();
    let report = converge(&plane, &agents, &policy).await.unwrap();

    // Threshold met by foo alone; bar is the tolerated straggler.
    assert_eq!(report.exit_code(&agents[0]), Some(63));
    assert_eq!(report.exit_code(&agents[1]), None);
    assert_eq!(report.finished(), 1);

    // Each buffer is the concatenation of its deltas across all five tails,
    // including the one taken after the finishing check.
    assert_eq!(
        report.stdout(&agents[0]).unwrap(),
        b"half the fleet reports in."
    );
    assert_eq!(
        report.stdout(&agents[1]).unwrap(),
        b"the other half stays quiet."
    );
    assert_eq!(report.stderr(&agents[0]).unwrap(), b"warming up going loud!");
    assert_eq!(report.stderr(&agents[1]).unwrap(), b"spinning up going dark!");

    // Probe interleaving: checks skipped after productive tails, a tail on
    // every iteration, four sleeps of three units.
    assert_eq!(plane.check_calls.load(Ordering::SeqCst), 3);
    assert_eq!(plane.tail_calls.load(Ordering::SeqCst), 5);
    assert_eq!(started.elapsed(), Duration::from_secs(12));
}

/// An agent that finishes between polls can still have unflushed output; the
/// tail that follows the completion-observing check must capture it.
#[tokio::test(start_paused = true)]
async fn test_output_pending_at_completion_is_not_lost() {
    let plane = ScriptedPlane::new(
        vec![vec![check("foo", Some(0))]],
        vec![vec![tail("foo", "final words", "")]],
    );
    let agents = fleet(&["foo"]);
    let policy = ConvergencePolicy {
        can_run_off: 0,
        loop_sleep: Duration::from_millis(10),
        loop_budget: 10,
    };

    let report = converge(&plane, &agents, &policy).await.unwrap();

    assert_eq!(report.exit_code(&agents[0]), Some(0));
    assert_eq!(report.stdout(&agents[0]).unwrap(), b"final words");
    assert_eq!(plane.tail_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_budget_exhaustion_returns_partial_report() {
    // bar never finishes and nothing tolerates it.
    let plane = ScriptedPlane::new(
        vec![
            vec![check("foo", Some(0)), check("bar", None)],
            vec![check("foo", Some(0)), check("bar", None)],
            vec![check("foo", Some(0)), check("bar", None)],
        ],
        vec![vec![tail("foo", "done", "")]],
    );
    let agents = fleet(&["foo", "bar"]);
    let policy = ConvergencePolicy {
        can_run_off: 0,
        loop_sleep: Duration::from_millis(100),
        loop_budget: 3,
    };

    let report = converge(&plane, &agents, &policy).await.unwrap();

    assert_eq!(report.finished(), 1);
    assert_eq!(report.exit_code(&agents[0]), Some(0));
    assert_eq!(report.exit_code(&agents[1]), None);
    assert_eq!(report.stdout(&agents[0]).unwrap(), b"done");
}

#[tokio::test(start_paused = true)]
async fn test_threshold_is_exact_for_every_valid_allowance() {
    // Three agents, two finish. Allowing one straggler terminates; allowing
    // none exhausts the budget with the same two exit codes.
    for (can_run_off, expect_converged) in [(1, true), (0, false)] {
        let finished_snapshot = vec![
            check("a", Some(0)),
            check("b", Some(7)),
            check("c", None),
        ];
        let plane = ScriptedPlane::new(
            vec![finished_snapshot.clone(); 4],
            vec![],
        );
        let agents = fleet(&["a", "b", "c"]);
        let policy = ConvergencePolicy {
            can_run_off,
            loop_sleep: Duration::from_millis(10),
            loop_budget: 4,
        };

        let report = converge(&plane, &agents, &policy).await.unwrap();

        assert_eq!(report.finished(), 2);
        let checks_made = plane.check_calls.load(Ordering::SeqCst);
        if expect_converged {
            assert_eq!(checks_made, 1, "loop must stop at the first snapshot");
        } else {
            assert_eq!(checks_made, 4, "loop must burn the whole budget");
        }
    }
}

#[tokio::test]
async fn test_whole_swarm_straggling_is_rejected_before_dispatch() {
    let plane = ScriptedPlane::new(vec![], vec![]);
    let dispatches = plane.dispatch_calls.clone();
    let session = SwarmSession::new(plane, fleet(&["foo", "bar"]));
    let policy = ConvergencePolicy {
        can_run_off: 2,
        loop_sleep: Duration::from_millis(10),
        loop_budget: 10,
    };

    let command = RunCommand::new(muster_core::domain::CommandPath::Exec("/bin/true".into()));
    let error = session.run(&command, &policy).await.unwrap_err();

    assert!(matches!(
        error,
        ConvergenceError::TooManyStragglers {
            can_run_off: 2,
            agents: 2
        }
    ));
    // The precondition fired before anything was published.
    assert_eq!(dispatches.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_rows_for_unaddressed_agents_are_dropped() {
    let plane = ScriptedPlane::new(
        vec![vec![check("foo", Some(0)), check("intruder", Some(0))]],
        vec![vec![
            tail("foo", "mine", ""),
            tail("intruder", "not mine", ""),
        ]],
    );
    let agents = fleet(&["foo"]);
    let policy = ConvergencePolicy {
        can_run_off: 0,
        loop_sleep: Duration::from_millis(10),
        loop_budget: 5,
    };

    let report = converge(&plane, &agents, &policy).await.unwrap();

    assert_eq!(report.finished(), 1);
    assert_eq!(report.stdout(&agents[0]).unwrap(), b"mine");
    assert!(report.stdout(&AgentId::from("intruder")).is_none());
}

#[tokio::test(start_paused = true)]
async fn test_session_dispatches_then_converges() {
    let plane = ScriptedPlane::new(
        vec![vec![check("foo", Some(0))]],
        vec![vec![tail("foo", "ran", "")]],
    );
    let dispatches = plane.dispatch_calls.clone();
    let session = SwarmSession::new(plane, fleet(&["foo"]));
    let policy = ConvergencePolicy {
        can_run_off: 0,
        loop_sleep: Duration::from_millis(10),
        loop_budget: 10,
    };

    let command = RunCommand::new(muster_core::domain::CommandPath::Exec("/bin/true".into()));
    let report = session.run(&command, &policy).await.unwrap();

    assert_eq!(session.target_count(), 1);
    assert_eq!(dispatches.load(Ordering::SeqCst), 1);
    assert_eq!(report.exit_code(&AgentId::from("foo")), Some(0));
}
