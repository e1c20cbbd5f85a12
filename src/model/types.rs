// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Ian Philip Eglin
//! Core identifiers and value types shared by the problem model and the solvers

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct TaskId(pub u32);

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "T{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct AgentId(pub u32);

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "A{}", self.0)
    }
}

/// Deadline and workload of a task.
///
/// The deadline is the last tick at which work may still be done and the
/// workload is the amount of work the task needs before it is completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Demand {
    pub deadline: i32,
    pub workload: i32,
}

impl Demand {
    pub fn new(deadline: i32, workload: i32) -> Self {
        Self { deadline, workload }
    }

    pub fn is_valid(&self) -> bool {
        self.deadline >= 0 && self.workload > 0
    }
}

/// A coalition chosen for a task, with the agents' arrival ticks.
///
/// `travel_time` is the longest travel time in the coalition and
/// `completion_time` the tick at which the coalition is expected to finish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    pub task: usize,
    pub coalition: Vec<(usize, i32)>,
    pub travel_time: i32,
    pub completion_time: i32,
}

impl Allocation {
    pub fn agents(&self) -> impl Iterator<Item = usize> + '_ {
        self.coalition.iter().map(|(agent, _)| *agent)
    }

    pub fn len(&self) -> usize {
        self.coalition.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coalition.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demand_validation() {
        assert!(Demand::new(0, 1).is_valid());
        assert!(Demand::new(10, 6).is_valid());
        assert!(!Demand::new(-1, 6).is_valid());
        assert!(!Demand::new(10, 0).is_valid());
        assert!(!Demand::new(10, -3).is_valid());
    }

    #[test]
    fn test_id_display() {
        assert_eq!(TaskId(3).to_string(), "T3");
        assert_eq!(AgentId(12).to_string(), "A12");
    }
}
