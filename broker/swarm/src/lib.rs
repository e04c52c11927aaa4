// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # `muster-swarm` — Swarm Client Library
//!
//! Drives a fleet of agents through the broker's control plane: dispatch a
//! command to every agent, then poll completion status and incremental
//! output until enough of the fleet has finished.
//!
//! ## Crate Layout
//!
//! | Module | Layer | Contents |
//! |--------|-------|----------|
//! | [`domain`] | Domain | `RunReport`, `SwarmStatus` |
//! | [`application`] | Application | `ControlPlane` trait, `BrokerClient`, convergence loop, `SwarmSession` |
//!
//! ## Key Concepts
//!
//! - **Convergence loop**: the poll/merge cycle that grows a [`RunReport`]
//!   out of partial check and tail replies. Its one hard guarantee: a tail
//!   call always follows the check call that first observes an agent's
//!   completion, so output flushed right before exit is never lost.
//! - **Straggler tolerance (`can_run_off`)**: how many agents may still be
//!   running when the loop declares success. Partial completion is a policy
//!   decision for the caller, not an error.

pub mod domain;
pub mod application;

pub use application::control::{CheckReply, ControlPlane, ControlPlaneError, RunCommand, TailReply};
pub use application::convergence::{converge, ConvergenceError, ConvergencePolicy};
pub use application::http::BrokerClient;
pub use application::session::{probe_status, wait_ready, SwarmSession};
pub use domain::*;
