// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Ian Philip Eglin
//! Status state machine of tasks, agents and agent-task assignment cells

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TaskStatus {
    #[default]
    NotCompleted,
    /// At least one free agent marked the task as feasible this tick
    Allocable,
    Allocated,
    Completed,
}

impl TaskStatus {
    /// Tasks a free agent may still be sent to
    pub fn is_open(&self) -> bool {
        !matches!(self, Self::Completed)
    }

    /// Tasks nobody has been sent to yet
    pub fn is_unallocated(&self) -> bool {
        matches!(self, Self::NotCompleted | Self::Allocable)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AgentStatus {
    #[default]
    Free,
    Reaching,
    Working,
}

impl AgentStatus {
    pub fn is_busy(&self) -> bool {
        !matches!(self, Self::Free)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Assignment {
    #[default]
    None,
    Feasible,
    Reaching,
    Working,
    Done,
}

impl Assignment {
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Reaching | Self::Working)
    }
}
