// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! HTTP client for the broker control plane.

use crate::application::control::{
    CheckReply, ControlPlane, ControlPlaneError, RunCommand, TailReply,
};
use async_trait::async_trait;
use muster_core::domain::AgentId;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct BrokerClient {
    // No global timeout: poll-style endpoints legitimately hold the
    // connection for their whole collect window.
    http: reqwest::Client,
    base_url: String,
    agents: Option<usize>,
}

impl BrokerClient {
    pub fn new(base_url: impl Into<String>, agents: Option<usize>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            agents,
        }
    }

    /// Endpoint URL with the expected-agent bound attached when known.
    fn url(&self, path: &str) -> String {
        let mut url = format!("{}/{}", self.base_url, path);
        if let Some(agents) = self.agents {
            url.push_str(&format!("?agents={agents}"));
        }
        url
    }

    async fn read_reply<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, ControlPlaneError> {
        let response = request
            .send()
            .await
            .map_err(|error| ControlPlaneError::Unreachable {
                reason: error.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ControlPlaneError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|error| ControlPlaneError::Unreachable {
                reason: error.to_string(),
            })?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Report (and with `clear`, atomically empty) the broker's
    /// missed-response store.
    pub async fn missed(
        &self,
        clear: bool,
    ) -> Result<HashMap<String, Vec<Value>>, ControlPlaneError> {
        #[derive(Deserialize)]
        struct MissedReport {
            missed: HashMap<String, Vec<Value>>,
        }

        let url = self.url("missed");
        let request = if clear {
            self.http.delete(&url)
        } else {
            self.http.get(&url)
        };
        let report: MissedReport = self.read_reply(request).await?;
        Ok(report.missed)
    }

    /// Resume collection for a request id (the broker's last one when `req`
    /// is `None`) without re-dispatching anything.
    pub async fn poll(&self, req: Option<&str>) -> Result<Vec<Value>, ControlPlaneError> {
        let mut request = self.http.get(self.url("poll"));
        if let Some(req) = req {
            request = request.query(&[("req", req)]);
        }
        self.read_reply(request).await
    }
}

#[async_trait]
impl ControlPlane for BrokerClient {
    async fn run_command(
        &self,
        command: &RunCommand,
    ) -> Result<Vec<Value>, ControlPlaneError> {
        let mut body = serde_json::to_value(command)?;
        body["thread"] = json!(true);

        debug!(agents = ?self.agents, broker = %self.base_url, "dispatching command");
        self.read_reply(self.http.post(self.url("command")).json(&body))
            .await
    }

    async fn check(&self) -> Result<Vec<CheckReply>, ControlPlaneError> {
        self.read_reply(self.http.post(self.url("check"))).await
    }

    async fn tail(&self) -> Result<Vec<TailReply>, ControlPlaneError> {
        self.read_reply(self.http.post(self.url("tail"))).await
    }

    async fn ping(&self) -> Result<Vec<AgentId>, ControlPlaneError> {
        let rows: Vec<Value> = self.read_reply(self.http.get(self.url("ping"))).await?;
        Ok(rows
            .into_iter()
            .filter_map(|row| row["agent"].as_str().map(AgentId::from))
            .collect())
    }
}
