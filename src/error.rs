// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Ian Philip Eglin
//! Error types for problem construction and solving

use thiserror::Error;

/// Errors that can occur while building or solving a CFSTP instance
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Invalid demand for task {task}: deadline {deadline}, workload {workload}")]
    InvalidDemand {
        task: usize,
        deadline: i32,
        workload: i32,
    },
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),
    #[error("Location kinds do not match: {0} vs {1}")]
    LocationMismatch(&'static str, &'static str),
    #[error("Invalid speed {speed} for agent {agent}")]
    InvalidSpeed { agent: usize, speed: f32 },
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
    #[error("Unknown algorithm: {0}")]
    UnknownAlgorithm(String),
}

/// A specialized Result type for CFSTP operations
pub type Result<T> = std::result::Result<T, Error>;
