// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod control;
pub mod convergence;
pub mod http;
pub mod session;
