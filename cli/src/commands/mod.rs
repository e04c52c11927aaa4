// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod missed;
pub mod run;
pub mod serve;
pub mod status;

pub use missed::MissedArgs;
pub use run::RunArgs;
pub use serve::ServeArgs;
pub use status::StatusArgs;
