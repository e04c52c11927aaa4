// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Agent Channel Primitives - Fan-out/Fan-in Transport Seam
//
// Two one-directional channels connect the broker to its agent fleet:
// - fan-out: one writer (the broker), many readers, no replies
// - fan-in: many writers, one reader (the broker), unordered
//
// The wire protocol is opaque to the rest of the crate; everything above this
// module works against the two traits. The in-memory implementation here
// backs tests and embedded agents; `tcp` provides the networked one.

use crate::domain::{AgentCommand, AgentResponse};
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, Mutex};
use tracing::debug;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("fan-in channel closed")]
    FaninClosed,

    #[error("failed to encode command frame: {0}")]
    Encode(#[from] serde_json::Error),
}

/// One-to-many command broadcast. Delivery is best-effort: publishing into an
/// empty fleet succeeds and reaches nobody.
#[async_trait]
pub trait FanoutChannel: Send + Sync {
    async fn publish(&self, command: &AgentCommand) -> Result<(), TransportError>;
}

/// Many-to-one response stream, drained by one reader at a time.
#[async_trait]
pub trait FaninChannel: Send + Sync {
    /// Wait up to `wait` for the next response. `Ok(None)` means the window
    /// elapsed with nothing to read.
    async fn recv(&self, wait: Duration) -> Result<Option<AgentResponse>, TransportError>;
}

/// In-process fan-out channel on a tokio broadcast pair.
pub struct MemoryFanout {
    sender: broadcast::Sender<AgentCommand>,
}

impl MemoryFanout {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe as an agent. Each subscriber sees every command published
    /// after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<AgentCommand> {
        self.sender.subscribe()
    }
}

#[async_trait]
impl FanoutChannel for MemoryFanout {
    async fn publish(&self, command: &AgentCommand) -> Result<(), TransportError> {
        let receiver_count = self.sender.send(command.clone()).unwrap_or(0);
        if receiver_count == 0 {
            debug!(req = %command.req, "no agents subscribed to fan-out channel");
        }
        Ok(())
    }
}

/// In-process fan-in channel on a tokio mpsc pair.
pub struct MemoryFanin {
    sender: mpsc::Sender<AgentResponse>,
    receiver: Mutex<mpsc::Receiver<AgentResponse>>,
}

impl MemoryFanin {
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity);
        Self {
            sender,
            receiver: Mutex::new(receiver),
        }
    }

    /// Writer handle for an agent.
    pub fn handle(&self) -> MemoryFaninHandle {
        MemoryFaninHandle {
            sender: self.sender.clone(),
        }
    }
}

#[async_trait]
impl FaninChannel for MemoryFanin {
    async fn recv(&self, wait: Duration) -> Result<Option<AgentResponse>, TransportError> {
        let mut receiver = self.receiver.lock().await;
        match tokio::time::timeout(wait, receiver.recv()).await {
            Ok(Some(response)) => Ok(Some(response)),
            Ok(None) => Err(TransportError::FaninClosed),
            Err(_elapsed) => Ok(None),
        }
    }
}

#[derive(Clone)]
pub struct MemoryFaninHandle {
    sender: mpsc::Sender<AgentResponse>,
}

impl MemoryFaninHandle {
    pub async fn send(&self, response: AgentResponse) -> Result<(), TransportError> {
        self.sender
            .send(response)
            .await
            .map_err(|_| TransportError::FaninClosed)
    }
}
