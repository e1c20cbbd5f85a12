// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Ian Philip Eglin
use serde::{Deserialize, Serialize};

/// Header bytes of a feasibility or completion notice
pub const BASE_MESSAGE_SIZE: u64 = 9;
/// Size of one coalition value or cost entry
pub const VALUE_SIZE: u64 = 8;

/// Simulated cost of running a strategy as a distributed protocol.
///
/// Counters only grow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DcopMetrics {
    pub messages_sent: u64,
    pub network_load_bytes: u64,
    /// Non-concurrent constraint checks
    pub ncccs: u64,
}

impl DcopMetrics {
    pub fn add_messages(&mut self, messages: u64, bytes: u64) {
        self.messages_sent += messages;
        self.network_load_bytes += bytes;
    }

    pub fn add_bytes(&mut self, bytes: u64) {
        self.network_load_bytes += bytes;
    }

    pub fn add_ncccs(&mut self, checks: u64) {
        self.ncccs += checks;
    }
}

/// Minimum number of bytes needed to encode `value` as a signed integer
pub fn bytes_needed(value: i32) -> u64 {
    match value {
        -0x80..=0x7f => 1,
        -0x8000..=0x7fff => 2,
        -0x80_0000..=0x7f_ffff => 3,
        _ => 4,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes_needed() {
        assert_eq!(bytes_needed(0), 1);
        assert_eq!(bytes_needed(127), 1);
        assert_eq!(bytes_needed(128), 2);
        assert_eq!(bytes_needed(-129), 2);
        assert_eq!(bytes_needed(40_000), 3);
        assert_eq!(bytes_needed(i32::MAX), 4);
    }

    #[test]
    fn test_metrics_accumulate() {
        let mut metrics = DcopMetrics::default();
        metrics.add_messages(3, 24);
        metrics.add_bytes(10);
        metrics.add_ncccs(2);
        assert_eq!(metrics.messages_sent, 3);
        assert_eq!(metrics.network_load_bytes, 34);
        assert_eq!(metrics.ncccs, 2);
    }
}
