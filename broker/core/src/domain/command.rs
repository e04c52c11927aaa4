// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Outbound command frames broadcast on the fan-out channel.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Unique identifier correlating a broadcast command with its responses.
///
/// Serialized as a plain UUID string on the wire; agents echo it back in the
/// `req` field of every reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub Uuid);

impl RequestId {
    /// Generate a new random `RequestId`.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Opaque agent identifier, chosen by the agent itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AgentId(pub String);

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for AgentId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Executable reference carried by a run command: either a single path/shell
/// string or an argv list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CommandPath {
    Exec(String),
    Argv(Vec<String>),
}

impl CommandPath {
    /// Precondition check performed before any dispatch.
    pub fn validate(&self) -> Result<(), CommandError> {
        match self {
            CommandPath::Exec(path) if path.trim().is_empty() => Err(CommandError::EmptyPath),
            CommandPath::Argv(argv) if argv.is_empty() => Err(CommandError::EmptyArgv),
            CommandPath::Argv(argv) if argv[0].trim().is_empty() => Err(CommandError::EmptyArgv),
            _ => Ok(()),
        }
    }
}

/// Environment mapping as accepted at the control plane: either a ready map
/// or a list of `KEY=VALUE` entries (normalized with [`EnvSpec::into_map`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EnvSpec {
    Map(HashMap<String, String>),
    Pairs(Vec<String>),
}

impl EnvSpec {
    pub fn into_map(self) -> Result<HashMap<String, String>, CommandError> {
        match self {
            EnvSpec::Map(map) => Ok(map),
            EnvSpec::Pairs(pairs) => pairs
                .into_iter()
                .map(|entry| {
                    entry
                        .split_once('=')
                        .map(|(k, v)| (k.to_string(), v.to_string()))
                        .ok_or(CommandError::BadEnvEntry(entry))
                })
                .collect(),
        }
    }
}

/// Malformed command configuration, rejected before any dispatch occurs.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("command path must not be empty")]
    EmptyPath,

    #[error("command argv must contain an executable")]
    EmptyArgv,

    #[error("environment entry {0:?} is not of the form KEY=VALUE")]
    BadEnvEntry(String),
}

/// What the agents are asked to do.
///
/// The `action` tag is part of the wire format; the run variant carries the
/// full command payload, the probes carry nothing beyond the tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum AgentAction {
    /// Execute a command. `thread` tells the agent to run it non-blockingly
    /// and keep answering probes; the control plane always sets it.
    Run {
        path: CommandPath,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        env: Option<HashMap<String, String>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stdin: Option<String>,
        thread: bool,
    },
    /// Report the exit code of the in-flight command, `null` if still running.
    Check,
    /// Report stdout/stderr produced since the previous tail.
    Tail,
    /// Liveness probe.
    Ping,
}

impl AgentAction {
    pub fn validate(&self) -> Result<(), CommandError> {
        if let AgentAction::Run { path, .. } = self {
            path.validate()?;
        }
        Ok(())
    }
}

/// One frame on the fan-out channel: a request id plus the action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentCommand {
    pub req: RequestId,
    #[serde(flatten)]
    pub action: AgentAction,
}

impl AgentCommand {
    pub fn new(action: AgentAction) -> Self {
        Self {
            req: RequestId::new(),
            action,
        }
    }
}

/// Bounded collection budget for one fan-in drain.
///
/// Collection stops as soon as `expect` responses are in hand, or when the
/// timeout is exhausted, whichever comes first. `expect: None` means "as many
/// as the window allows".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectWindow {
    pub timeout: Duration,
    pub expect: Option<usize>,
}

impl CollectWindow {
    /// Default window for command dispatch: agents only acknowledge.
    pub const DISPATCH_TIMEOUT: Duration = Duration::from_millis(1000);

    /// Default window for probes and polls: agents may be mid-write.
    pub const POLL_TIMEOUT: Duration = Duration::from_millis(10_000);

    pub fn dispatch() -> Self {
        Self {
            timeout: Self::DISPATCH_TIMEOUT,
            expect: None,
        }
    }

    pub fn poll() -> Self {
        Self {
            timeout: Self::POLL_TIMEOUT,
            expect: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_command_wire_shape() {
        let command = AgentCommand::new(AgentAction::Run {
            path: CommandPath::Exec("/usr/bin/iperf -c 10.0.0.1".into()),
            env: None,
            stdin: None,
            thread: true,
        });

        let frame = serde_json::to_value(&command).unwrap();
        assert_eq!(frame["action"], "run");
        assert_eq!(frame["path"], "/usr/bin/iperf -c 10.0.0.1");
        assert_eq!(frame["thread"], true);
        assert!(frame.get("env").is_none());
        assert!(frame["req"].is_string());

        let back: AgentCommand = serde_json::from_value(frame).unwrap();
        assert_eq!(back, command);
    }

    #[test]
    fn test_probe_wire_shape() {
        let command = AgentCommand::new(AgentAction::Tail);
        let frame = serde_json::to_value(&command).unwrap();
        assert_eq!(frame["action"], "tail");
        assert_eq!(frame.as_object().unwrap().len(), 2);
    }

    #[test]
    fn test_argv_path_round_trips() {
        let path: CommandPath = serde_json::from_str(r#"["/bin/sh", "-c", "uptime"]"#).unwrap();
        assert_eq!(
            path,
            CommandPath::Argv(vec!["/bin/sh".into(), "-c".into(), "uptime".into()])
        );
        assert!(path.validate().is_ok());
    }

    #[test]
    fn test_empty_paths_rejected() {
        assert!(matches!(
            CommandPath::Exec("  ".into()).validate(),
            Err(CommandError::EmptyPath)
        ));
        assert!(matches!(
            CommandPath::Argv(vec![]).validate(),
            Err(CommandError::EmptyArgv)
        ));
        assert!(matches!(
            CommandPath::Argv(vec!["".into(), "-c".into()]).validate(),
            Err(CommandError::EmptyArgv)
        ));
    }

    #[test]
    fn test_env_pairs_normalize() {
        let env: EnvSpec =
            serde_json::from_str(r#"["STREAMS=4", "TARGET=10.0.0.1:5001"]"#).unwrap();
        let map = env.into_map().unwrap();
        assert_eq!(map["STREAMS"], "4");
        assert_eq!(map["TARGET"], "10.0.0.1:5001");

        let bad: EnvSpec = serde_json::from_str(r#"["NO_SEPARATOR"]"#).unwrap();
        assert!(matches!(
            bad.into_map(),
            Err(CommandError::BadEnvEntry(entry)) if entry == "NO_SEPARATOR"
        ));
    }
}
