// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod channel;
pub mod tcp;

pub use channel::{FaninChannel, FanoutChannel, TransportError};
