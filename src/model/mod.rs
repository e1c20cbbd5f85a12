// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Ian Philip Eglin
pub mod data;
pub mod location;
pub mod problem;
pub mod report;
pub mod types;
pub mod value;

pub use data::*;
pub use location::*;
pub use problem::*;
pub use report::*;
pub use types::*;
pub use value::*;
