// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # `muster-core` — Command-Dispatch Broker Primitives
//!
//! Bridges a synchronous HTTP control plane to an asynchronous fan-out/fan-in
//! agent transport: commands are broadcast to every connected agent, and the
//! broker drains a shared fan-in channel for a bounded window, correlating
//! responses back to the request that asked for them.
//!
//! ## Crate Layout
//!
//! | Module | Layer | Contents |
//! |--------|-------|----------|
//! | [`domain`] | Domain | `RequestId`, `AgentCommand`, `AgentResponse`, `BrokerConfig` |
//! | [`application`] | Application | `Correlator`, `MissedStore` |
//! | [`infrastructure`] | Infrastructure | channel traits, in-memory and TCP transports |
//! | [`presentation`] | Presentation | axum control-plane router and `ServerState` |
//!
//! ## Key Concepts
//!
//! - **Request id**: opaque UUID correlating one broadcast command with the
//!   responses it produces. Agents echo it back in every reply.
//! - **Missed-response store**: holding area for responses that arrive while a
//!   different id is being collected, or after their window closed. Nothing
//!   read off the fan-in channel is ever dropped: a response is either
//!   returned to its own collect call or stashed for a later poll.
//! - **Collect window**: a shrinking time budget; collection stops early once
//!   the expected number of agents has answered.

pub mod domain;
pub mod application;
pub mod infrastructure;
pub mod presentation;

pub use domain::*;
