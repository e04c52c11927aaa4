// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Broker Control Plane
//!
//! Synchronous HTTP face of the broker. Every route is enumerated statically
//! in [`router`] — the table of (verb, path) pairs is fixed at startup:
//!
//! | Verb | Path | Effect |
//! |------|------|--------|
//! | POST | `/command` | broadcast a run command, collect acknowledgements |
//! | POST | `/check` | broadcast a completion probe, collect exit codes |
//! | POST | `/tail` | broadcast an output probe, collect stdout/stderr deltas |
//! | GET | `/ping` | broadcast a liveness probe, collect agent ids |
//! | GET | `/poll` | resume collection for an id without re-publishing |
//! | GET/DELETE | `/missed` | report (and optionally clear) the missed-response store |
//!
//! Mutable server state — the missed-response store and the "last request
//! id" cell — lives in one [`ServerState`] constructed at startup and handed
//! to every handler; nothing is process-global.

use crate::application::correlator::Correlator;
use crate::application::missed::MissedStore;
use crate::domain::{
    AgentAction, AgentCommand, AgentResponse, CollectWindow, CommandError, CommandPath, EnvSpec,
    RequestId, WindowsConfig,
};
use crate::infrastructure::channel::{FaninChannel, FanoutChannel, TransportError};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use metrics::counter;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// Shared state for every control-plane handler.
pub struct ServerState {
    fanout: Arc<dyn FanoutChannel>,
    fanin: Arc<dyn FaninChannel>,
    correlator: Correlator,
    missed: Arc<MissedStore>,
    last_req: parking_lot::Mutex<Option<RequestId>>,
    windows: WindowsConfig,
}

impl ServerState {
    pub fn new(
        fanout: Arc<dyn FanoutChannel>,
        fanin: Arc<dyn FaninChannel>,
        windows: WindowsConfig,
    ) -> Self {
        let missed = Arc::new(MissedStore::new());
        Self {
            fanout,
            fanin,
            correlator: Correlator::new(missed.clone()),
            missed,
            last_req: parking_lot::Mutex::new(None),
            windows,
        }
    }
}

/// Build the control-plane router over `state`.
pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/command", post(dispatch_command))
        .route("/check", post(probe_check))
        .route("/tail", post(probe_tail))
        .route("/ping", get(probe_ping))
        .route("/poll", get(poll))
        .route("/missed", get(missed_report).delete(missed_clear))
        .with_state(state)
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("duplicate parameter: {0}")]
    DuplicateParameter(&'static str),

    #[error(transparent)]
    Command(#[from] CommandError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::DuplicateParameter(_) | ApiError::Command(_) => StatusCode::BAD_REQUEST,
            ApiError::Transport(_) => StatusCode::BAD_GATEWAY,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Collection knobs every endpoint accepts through the query string.
#[derive(Debug, Default, Deserialize)]
struct WindowQuery {
    /// Collect window in milliseconds.
    timeout: Option<u64>,

    /// Expected number of responding agents; collection stops early once met.
    agents: Option<usize>,

    /// Request id to resume (poll only).
    req: Option<RequestId>,
}

impl WindowQuery {
    fn window(&self, default_timeout: Duration) -> CollectWindow {
        CollectWindow {
            timeout: self
                .timeout
                .map(Duration::from_millis)
                .unwrap_or(default_timeout),
            expect: self.agents,
        }
    }
}

/// JSON body of `POST /command`.
#[derive(Debug, Deserialize)]
struct CommandBody {
    path: CommandPath,

    #[serde(default)]
    env: Option<EnvSpec>,

    #[serde(default)]
    stdin: Option<String>,

    /// Agents run commands non-blockingly so they can keep answering
    /// check/tail probes; callers may only opt out explicitly.
    #[serde(default)]
    thread: Option<bool>,

    #[serde(default)]
    timeout: Option<u64>,

    #[serde(default)]
    agents: Option<usize>,
}

async fn dispatch_command(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<WindowQuery>,
    Json(body): Json<CommandBody>,
) -> Result<Json<Vec<AgentResponse>>, ApiError> {
    if query.timeout.is_some() && body.timeout.is_some() {
        return Err(ApiError::DuplicateParameter("timeout"));
    }
    if query.agents.is_some() && body.agents.is_some() {
        return Err(ApiError::DuplicateParameter("agents"));
    }

    let env = body.env.map(EnvSpec::into_map).transpose()?;
    let action = AgentAction::Run {
        path: body.path,
        env,
        stdin: body.stdin,
        thread: body.thread.unwrap_or(true),
    };
    action.validate()?;

    let window = CollectWindow {
        timeout: query
            .timeout
            .or(body.timeout)
            .map(Duration::from_millis)
            .unwrap_or_else(|| state.windows.dispatch()),
        expect: query.agents.or(body.agents),
    };

    let command = AgentCommand::new(action);
    info!(req = %command.req, "dispatching command to swarm");
    counter!("muster_commands_dispatched_total").increment(1);

    *state.last_req.lock() = Some(command.req);
    let responses = state
        .correlator
        .send_and_collect(&*state.fanout, &*state.fanin, &command, window)
        .await?;

    Ok(Json(responses))
}

async fn probe_check(
    state: State<Arc<ServerState>>,
    query: Query<WindowQuery>,
) -> Result<Json<Vec<AgentResponse>>, ApiError> {
    probe(state, query, AgentAction::Check).await
}

async fn probe_tail(
    state: State<Arc<ServerState>>,
    query: Query<WindowQuery>,
) -> Result<Json<Vec<AgentResponse>>, ApiError> {
    probe(state, query, AgentAction::Tail).await
}

async fn probe_ping(
    state: State<Arc<ServerState>>,
    query: Query<WindowQuery>,
) -> Result<Json<Vec<AgentResponse>>, ApiError> {
    probe(state, query, AgentAction::Ping).await
}

async fn probe(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<WindowQuery>,
    action: AgentAction,
) -> Result<Json<Vec<AgentResponse>>, ApiError> {
    let window = query.window(state.windows.poll());
    let command = AgentCommand::new(action);
    debug!(req = %command.req, action = ?command.action, "broadcasting probe");

    *state.last_req.lock() = Some(command.req);
    let responses = state
        .correlator
        .send_and_collect(&*state.fanout, &*state.fanin, &command, window)
        .await?;

    Ok(Json(responses))
}

/// Resume collection for a request id without re-publishing the command.
/// Defaults to the id of the most recently dispatched request; with neither,
/// the drain still runs and everything read lands in the missed store.
async fn poll(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<WindowQuery>,
) -> Result<Json<Vec<AgentResponse>>, ApiError> {
    let target = query.req.or(*state.last_req.lock());
    let window = query.window(state.windows.poll());

    let responses = state
        .correlator
        .collect(&*state.fanin, target, window)
        .await?;

    Ok(Json(responses))
}

async fn missed_report(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<WindowQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    drain_fanin(&state, &query).await?;
    Ok(Json(json!({ "missed": state.missed.snapshot() })))
}

async fn missed_clear(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<WindowQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    drain_fanin(&state, &query).await?;
    Ok(Json(json!({ "missed": state.missed.drain() })))
}

/// Pull whatever is sitting on the fan-in channel into the store, so the
/// report reflects responses that arrived since the last collect.
async fn drain_fanin(state: &ServerState, query: &WindowQuery) -> Result<(), ApiError> {
    state
        .correlator
        .collect(&*state.fanin, None, query.window(state.windows.poll()))
        .await?;
    Ok(())
}
