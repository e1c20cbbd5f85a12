// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Ian Philip Eglin
//! # cfstp - Coalition Formation with Spatial and Temporal constraints
//!
//! cfstp simulates agents that move on a map and team up to finish tasks with a
//! deadline and a workload, and compares allocation algorithms on the same
//! problem instance.
//!
//! ## Modules
//!
//! - [`model`] - Problem state, locations, coalition values, instance data and reports
//! - [`solver`] - Simulation engine and the allocation strategies (CTS, DSA-SDP,
//!   Max-Sum ADVP, CFLA, CFLA+, EDF)
//! - [`error`] - Error types and handling
//! - [`config`] - Configuration loading (JSON and Pkl)
//! - [`logger`] - Tracing subscriber setup
//!
//! ## Quick Start
//!
//! ```rust
//! use cfstp::*;
//!
//! let problem = Problem::new(
//!     vec![AgentId(0), AgentId(1)],
//!     vec![TaskId(0)],
//!     vec![Location::euclidean(0, 0), Location::euclidean(5, 5)],
//!     vec![Location::euclidean(0, 3)],
//!     vec![Demand::new(10, 6)],
//!     CoalitionValues::constant(2.0, 2),
//! )
//! .unwrap();
//!
//! let results = Algorithm::Cts.solve(&problem, &SolverConfig::default()).unwrap();
//! assert_eq!(results.completed_task_percentage, 100.0);
//! ```

pub mod config;
pub mod error;
pub mod logger;
pub mod model;
pub mod solver;

pub use error::*;
pub use model::*;
pub use solver::{Algorithm, Solver, SolverConfig, Strategy};
