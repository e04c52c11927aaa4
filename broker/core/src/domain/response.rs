// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Inbound response frames read off the fan-in channel.

use crate::domain::command::{AgentId, RequestId};
use serde::{Deserialize, Serialize};

/// One frame on the fan-in channel.
///
/// The broker correlates on `req` and relays the rest of the frame without
/// interpreting it: check replies carry an `exit_code`, tail replies carry
/// `stdout`/`stderr` deltas, ping replies carry nothing beyond the agent id.
/// Keeping the body schema-free here lets agents evolve their reply shapes
/// without a broker release.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResponse {
    /// The request this frame answers.
    pub req: RequestId,

    /// Self-reported agent identity. Absent only on malformed agents; such
    /// frames are still relayed so the operator can see them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<AgentId>,

    /// Remaining fields of the frame, relayed verbatim.
    #[serde(flatten)]
    pub body: serde_json::Map<String, serde_json::Value>,
}

impl AgentResponse {
    /// Bare reply frame, used by tests and embedded agents.
    pub fn new(req: RequestId, agent: impl Into<String>) -> Self {
        Self {
            req,
            agent: Some(AgentId(agent.into())),
            body: serde_json::Map::new(),
        }
    }

    /// Attach one body field.
    pub fn with_field(mut self, key: &str, value: serde_json::Value) -> Self {
        self.body.insert(key.to_string(), value);
        self
    }
}
