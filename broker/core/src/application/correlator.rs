// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Request correlation: publish once, then drain the shared fan-in channel
//! for a bounded window, keeping only the responses that answer the request
//! being collected.
//!
//! Every frame read off the channel is delivered to exactly one consumer:
//! returned from the collect call whose id it answers, or stashed in the
//! [`MissedStore`] under its own id. Under-collection is not an error — a
//! short list just means slow agents, and a later poll can resume from the
//! stash.

use crate::application::missed::MissedStore;
use crate::domain::{AgentCommand, AgentResponse, CollectWindow, RequestId};
use crate::infrastructure::channel::{FaninChannel, FanoutChannel, TransportError};
use metrics::counter;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

pub struct Correlator {
    missed: Arc<MissedStore>,
}

impl Correlator {
    pub fn new(missed: Arc<MissedStore>) -> Self {
        Self { missed }
    }

    /// Publish `command` exactly once, then collect responses tagged with its
    /// request id until the window closes or the expected count is reached.
    pub async fn send_and_collect(
        &self,
        fanout: &dyn FanoutChannel,
        fanin: &dyn FaninChannel,
        command: &AgentCommand,
        window: CollectWindow,
    ) -> Result<Vec<AgentResponse>, TransportError> {
        fanout.publish(command).await?;
        counter!("muster_commands_published_total").increment(1);

        self.collect(fanin, Some(command.req), window).await
    }

    /// Drain the fan-in channel without publishing anything.
    ///
    /// With a target id, previously-missed responses for that id seed the
    /// collected set. With `None` (the `/missed` drain), every frame read is
    /// stashed and the returned list is empty.
    pub async fn collect(
        &self,
        fanin: &dyn FaninChannel,
        target: Option<RequestId>,
        window: CollectWindow,
    ) -> Result<Vec<AgentResponse>, TransportError> {
        let started = Instant::now();
        let expect = window.expect.unwrap_or(usize::MAX);

        let mut collected = match target {
            Some(id) => self.missed.pop(id),
            None => Vec::new(),
        };

        while collected.len() < expect {
            let elapsed = started.elapsed();
            if elapsed >= window.timeout {
                break;
            }

            match fanin.recv(window.timeout - elapsed).await? {
                Some(response) if target == Some(response.req) => collected.push(response),
                Some(response) => self.missed.stash(response),
                None => break,
            }
        }

        if let Some(id) = target {
            debug!(
                req = %id,
                collected = collected.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "collect window closed"
            );
        }
        counter!("muster_responses_collected_total").increment(collected.len() as u64);

        Ok(collected)
    }
}
