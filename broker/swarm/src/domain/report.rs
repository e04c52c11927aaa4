// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Per-agent run result accumulated by the convergence loop.

use bytes::{BufMut, BytesMut};
use chrono::{DateTime, Utc};
use muster_core::domain::AgentId;
use std::collections::HashMap;
use tracing::debug;

/// The artifact one run produces: a growing stdout/stderr buffer pair and an
/// optional exit code per addressed agent.
///
/// # Invariants
///
/// - Buffers are append-only; their content is the concatenation of every
///   tail delta in call order.
/// - An exit code, once recorded, is never overwritten.
/// - Agents outside the addressed set never gain an entry; their rows are
///   dropped on append.
#[derive(Debug)]
pub struct RunReport {
    started_at: DateTime<Utc>,
    stdout: HashMap<AgentId, BytesMut>,
    stderr: HashMap<AgentId, BytesMut>,
    exit_codes: HashMap<AgentId, i32>,
}

impl RunReport {
    /// Empty report with one buffer pair per addressed agent.
    pub fn for_agents(agents: &[AgentId]) -> Self {
        let stdout = agents.iter().map(|a| (a.clone(), BytesMut::new())).collect();
        let stderr = agents.iter().map(|a| (a.clone(), BytesMut::new())).collect();
        Self {
            started_at: Utc::now(),
            stdout,
            stderr,
            exit_codes: HashMap::new(),
        }
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn is_addressed(&self, agent: &AgentId) -> bool {
        self.stdout.contains_key(agent)
    }

    /// Append a stdout delta. Returns whether anything was appended (empty
    /// deltas and unaddressed agents do not count as progress).
    pub fn append_stdout(&mut self, agent: &AgentId, delta: &str) -> bool {
        Self::append(&mut self.stdout, agent, delta)
    }

    /// Append a stderr delta; same contract as [`Self::append_stdout`].
    pub fn append_stderr(&mut self, agent: &AgentId, delta: &str) -> bool {
        Self::append(&mut self.stderr, agent, delta)
    }

    fn append(buffers: &mut HashMap<AgentId, BytesMut>, agent: &AgentId, delta: &str) -> bool {
        if delta.is_empty() {
            return false;
        }
        match buffers.get_mut(agent) {
            Some(buffer) => {
                buffer.put_slice(delta.as_bytes());
                true
            }
            None => {
                debug!(%agent, "dropping output for agent outside the addressed set");
                false
            }
        }
    }

    /// Record an agent's exit code. The first recorded value wins; repeated
    /// check snapshots re-reporting the same completion are no-ops.
    pub fn record_exit(&mut self, agent: &AgentId, code: i32) {
        if !self.is_addressed(agent) {
            debug!(%agent, "dropping exit code for agent outside the addressed set");
            return;
        }
        self.exit_codes.entry(agent.clone()).or_insert(code);
    }

    pub fn exit_code(&self, agent: &AgentId) -> Option<i32> {
        self.exit_codes.get(agent).copied()
    }

    /// Number of agents with a recorded exit code. An exit code of 0 counts:
    /// finished means "code present", not "code truthy".
    pub fn finished(&self) -> usize {
        self.exit_codes.len()
    }

    pub fn stdout(&self, agent: &AgentId) -> Option<&[u8]> {
        self.stdout.get(agent).map(|b| b.as_ref())
    }

    pub fn stderr(&self, agent: &AgentId) -> Option<&[u8]> {
        self.stderr.get(agent).map(|b| b.as_ref())
    }

    pub fn agents(&self) -> impl Iterator<Item = &AgentId> {
        self.stdout.keys()
    }
}
