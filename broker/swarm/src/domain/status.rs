// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Swarm liveness summary produced by the status probe.

use std::fmt;

/// What the liveness probe saw.
///
/// `Up(k)` covers any reachable-but-incomplete fleet, including `k == 0`
/// (broker reachable, no agents connected yet).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwarmStatus {
    /// The broker itself was unreachable.
    Down,
    /// The broker answered with `k` agents, fewer than the full swarm.
    Up(usize),
    /// Every addressed agent answered.
    UpAll,
}

impl SwarmStatus {
    pub fn is_all_up(&self) -> bool {
        matches!(self, SwarmStatus::UpAll)
    }
}

impl fmt::Display for SwarmStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SwarmStatus::Down => write!(f, "DOWN"),
            SwarmStatus::Up(k) => write!(f, "UP {k}"),
            SwarmStatus::UpAll => write!(f, "UP ALL"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_matches_operator_format() {
        assert_eq!(SwarmStatus::Down.to_string(), "DOWN");
        assert_eq!(SwarmStatus::Up(1).to_string(), "UP 1");
        assert_eq!(SwarmStatus::UpAll.to_string(), "UP ALL");
    }
}
