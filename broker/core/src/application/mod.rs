// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod correlator;
pub mod missed;

pub use correlator::Correlator;
pub use missed::MissedStore;
