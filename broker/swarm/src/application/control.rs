// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Control-plane seam the convergence loop drives.
//!
//! The trait keeps the loop transport-neutral: production goes through
//! [`crate::application::http::BrokerClient`], tests script replies by hand.

use async_trait::async_trait;
use muster_core::domain::{AgentId, CommandPath};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Payload of one dispatch call. The wire-level `thread` flag is not a knob
/// here: swarm runs are always non-blocking on the agent side, otherwise
/// check/tail probes would go unanswered mid-run.
#[derive(Debug, Clone, Serialize)]
pub struct RunCommand {
    pub path: CommandPath,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub env: Option<HashMap<String, String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub stdin: Option<String>,
}

impl RunCommand {
    pub fn new(path: CommandPath) -> Self {
        Self {
            path,
            env: None,
            stdin: None,
        }
    }

    pub fn with_env(mut self, env: HashMap<String, String>) -> Self {
        self.env = Some(env);
        self
    }

    pub fn with_stdin(mut self, stdin: impl Into<String>) -> Self {
        self.stdin = Some(stdin.into());
        self
    }
}

/// One row of a check snapshot. A missing or null `exit_code` means the
/// agent's command is still running.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckReply {
    pub agent: AgentId,

    #[serde(default)]
    pub exit_code: Option<i32>,
}

/// One row of a tail snapshot: output produced since the agent's previous
/// tail. Empty strings mean "nothing new".
#[derive(Debug, Clone, Deserialize)]
pub struct TailReply {
    pub agent: AgentId,

    #[serde(default)]
    pub stdout: String,

    #[serde(default)]
    pub stderr: String,
}

#[derive(Debug, Error)]
pub enum ControlPlaneError {
    /// The broker could not be reached at all. The status probe maps this to
    /// [`crate::domain::SwarmStatus::Down`] instead of propagating it.
    #[error("broker unreachable: {reason}")]
    Unreachable { reason: String },

    /// The broker answered with a non-success status.
    #[error("broker rejected the call with status {status}: {body}")]
    Rejected { status: u16, body: String },

    /// The broker answered 200 with a body the client cannot interpret.
    #[error("malformed broker reply: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// The four broker verbs the swarm client needs.
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// Dispatch a run command; returns the raw acknowledgement rows.
    async fn run_command(
        &self,
        command: &RunCommand,
    ) -> Result<Vec<serde_json::Value>, ControlPlaneError>;

    /// Completion snapshot for the in-flight command.
    async fn check(&self) -> Result<Vec<CheckReply>, ControlPlaneError>;

    /// Incremental output snapshot for the in-flight command.
    async fn tail(&self) -> Result<Vec<TailReply>, ControlPlaneError>;

    /// Liveness probe; returns the ids of currently reachable agents.
    async fn ping(&self) -> Result<Vec<AgentId>, ControlPlaneError>;
}
