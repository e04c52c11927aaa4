// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Missed-response store: responses that arrived outside their request's
//! collection window, keyed by the request id they answer.
//!
//! The store is the only mutable state shared across broker calls. Invariant:
//! a response lands here at most once, and popping a bucket removes it, so a
//! later poll for the same id builds on the entries without re-consuming
//! them. Buckets preserve arrival order.

use crate::domain::{AgentResponse, RequestId};
use metrics::counter;
use parking_lot::Mutex;
use std::collections::HashMap;
use tracing::debug;

#[derive(Default)]
pub struct MissedStore {
    buckets: Mutex<HashMap<RequestId, Vec<AgentResponse>>>,
}

impl MissedStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// File a response under its own request id.
    pub fn stash(&self, response: AgentResponse) {
        debug!(req = %response.req, "stashing missed response");
        counter!("muster_missed_responses_stashed_total").increment(1);

        self.buckets
            .lock()
            .entry(response.req)
            .or_default()
            .push(response);
    }

    /// Remove and return the bucket for `id`. Empty when nothing was missed;
    /// the store is left unchanged in that case.
    pub fn pop(&self, id: RequestId) -> Vec<AgentResponse> {
        self.buckets.lock().remove(&id).unwrap_or_default()
    }

    /// Copy of the whole store, for diagnostics.
    pub fn snapshot(&self) -> HashMap<RequestId, Vec<AgentResponse>> {
        self.buckets.lock().clone()
    }

    /// Return and clear the whole store in one step. Atomic with respect to
    /// concurrent stashes: an insert lands either in the returned map or in
    /// the store, never nowhere.
    pub fn drain(&self) -> HashMap<RequestId, Vec<AgentResponse>> {
        std::mem::take(&mut *self.buckets.lock())
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.lock().is_empty()
    }
}
