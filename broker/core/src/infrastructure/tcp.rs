// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// TCP Agent Channels - Newline-Delimited JSON Frames
//
// Networked rendition of the channel traits. Agents connect inbound:
// - fan-out bind: every connected subscriber receives each published frame
// - fan-in bind: lines from all connected writers merge into one stream
//
// A slow subscriber that falls behind the broadcast buffer loses the oldest
// frames (best-effort delivery); malformed inbound lines are logged and
// skipped rather than poisoning the stream.

use crate::domain::{AgentCommand, AgentResponse};
use crate::infrastructure::channel::{FaninChannel, FanoutChannel, TransportError};
use async_trait::async_trait;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, Mutex};
use tracing::{debug, warn};

const CHANNEL_CAPACITY: usize = 1024;

/// Fan-out bind: one writer, many connected readers.
pub struct TcpFanout {
    frames: broadcast::Sender<String>,
    local_addr: SocketAddr,
}

impl TcpFanout {
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| TransportError::Bind {
                addr: addr.to_string(),
                source,
            })?;
        let local_addr = listener.local_addr().map_err(|source| TransportError::Bind {
            addr: addr.to_string(),
            source,
        })?;

        let (frames, _) = broadcast::channel(CHANNEL_CAPACITY);
        tokio::spawn(accept_subscribers(listener, frames.clone()));

        debug!(%local_addr, "fan-out channel bound");
        Ok(Self { frames, local_addr })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

async fn accept_subscribers(listener: TcpListener, frames: broadcast::Sender<String>) {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                debug!(%peer, "agent subscribed to fan-out channel");
                tokio::spawn(forward_frames(stream, frames.subscribe(), peer));
            }
            Err(error) => {
                warn!(%error, "fan-out accept failed");
            }
        }
    }
}

async fn forward_frames(
    mut stream: TcpStream,
    mut frames: broadcast::Receiver<String>,
    peer: SocketAddr,
) {
    loop {
        match frames.recv().await {
            Ok(line) => {
                if stream.write_all(line.as_bytes()).await.is_err()
                    || stream.write_all(b"\n").await.is_err()
                {
                    debug!(%peer, "fan-out subscriber disconnected");
                    return;
                }
            }
            Err(broadcast::error::RecvError::Lagged(dropped)) => {
                warn!(%peer, dropped, "fan-out subscriber lagged, frames lost");
            }
            Err(broadcast::error::RecvError::Closed) => return,
        }
    }
}

#[async_trait]
impl FanoutChannel for TcpFanout {
    async fn publish(&self, command: &AgentCommand) -> Result<(), TransportError> {
        let line = serde_json::to_string(command)?;
        let receiver_count = self.frames.send(line).unwrap_or(0);
        if receiver_count == 0 {
            debug!(req = %command.req, "no agents subscribed to fan-out channel");
        }
        Ok(())
    }
}

/// Fan-in bind: many connected writers, one reader.
pub struct TcpFanin {
    receiver: Mutex<mpsc::Receiver<AgentResponse>>,
    local_addr: SocketAddr,
}

impl TcpFanin {
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| TransportError::Bind {
                addr: addr.to_string(),
                source,
            })?;
        let local_addr = listener.local_addr().map_err(|source| TransportError::Bind {
            addr: addr.to_string(),
            source,
        })?;

        let (sender, receiver) = mpsc::channel(CHANNEL_CAPACITY);
        tokio::spawn(accept_writers(listener, sender));

        debug!(%local_addr, "fan-in channel bound");
        Ok(Self {
            receiver: Mutex::new(receiver),
            local_addr,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

async fn accept_writers(listener: TcpListener, sender: mpsc::Sender<AgentResponse>) {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                debug!(%peer, "agent connected to fan-in channel");
                tokio::spawn(read_frames(stream, sender.clone(), peer));
            }
            Err(error) => {
                warn!(%error, "fan-in accept failed");
            }
        }
    }
}

async fn read_frames(stream: TcpStream, sender: mpsc::Sender<AgentResponse>, peer: SocketAddr) {
    let mut lines = BufReader::new(stream).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match serde_json::from_str::<AgentResponse>(line) {
                    Ok(response) => {
                        if sender.send(response).await.is_err() {
                            return;
                        }
                    }
                    Err(error) => {
                        warn!(%peer, %error, "discarding malformed fan-in frame");
                    }
                }
            }
            Ok(None) => {
                debug!(%peer, "fan-in writer disconnected");
                return;
            }
            Err(error) => {
                warn!(%peer, %error, "fan-in read failed");
                return;
            }
        }
    }
}

#[async_trait]
impl FaninChannel for TcpFanin {
    async fn recv(&self, wait: Duration) -> Result<Option<AgentResponse>, TransportError> {
        let mut receiver = self.receiver.lock().await;
        match tokio::time::timeout(wait, receiver.recv()).await {
            Ok(Some(response)) => Ok(Some(response)),
            Ok(None) => Err(TransportError::FaninClosed),
            Err(_elapsed) => Ok(None),
        }
    }
}
