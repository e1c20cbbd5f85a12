// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Ian Philip Eglin
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::{Path, PathBuf};

/// Outcome of one solver run.
///
/// Carries allocation quality (travel and completion times, completion
/// percentage) and the simulated distributed cost (messages, bytes, NCCCs).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Results {
    pub algorithm: String,
    pub total_tasks: usize,
    pub completed_tasks: usize,
    pub completed_task_percentage: f32,
    /// Mean of the longest travel time of every allocated coalition
    pub avg_travel_time: f32,
    /// Mean ticks from first allocation to completion, over completed tasks
    pub avg_completion_time: f32,
    pub messages_sent: u64,
    pub network_load_bytes: u64,
    pub ncccs: u64,
    /// Number of simulated ticks
    pub ticks: i32,
}

/// Snapshot of the simulation at the end of a tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickRecord {
    pub time: i32,
    pub enabled_agents: usize,
    pub enabled_tasks: usize,
    pub busy_agents: usize,
    pub completed_tasks: usize,
    pub completed_this_tick: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub results: Results,
    #[serde(default)]
    pub ticks: Vec<TickRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkReport {
    pub agent_count: usize,
    pub task_count: usize,
    pub runs: Vec<RunReport>,
    pub total_duration_ms: f64,
}

pub fn write_report_json<P: AsRef<Path>>(
    report: &BenchmarkReport,
    result_dir: P,
) -> std::io::Result<PathBuf> {
    let summary_path = result_dir.as_ref().join("summary.json");
    let mut summary_file = File::create(&summary_path)?;
    serde_json::to_writer_pretty(&mut summary_file, report)?;
    Ok(summary_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_report_json() {
        let dir = std::env::temp_dir().join(format!("cfstp_report_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        let report = BenchmarkReport {
            agent_count: 2,
            task_count: 1,
            runs: vec![RunReport {
                results: Results {
                    algorithm: "CTS".to_string(),
                    total_tasks: 1,
                    completed_tasks: 1,
                    completed_task_percentage: 100.0,
                    avg_travel_time: 3.0,
                    avg_completion_time: 6.0,
                    messages_sent: 3,
                    network_load_bytes: 30,
                    ncccs: 1,
                    ticks: 7,
                },
                ticks: Vec::new(),
            }],
            total_duration_ms: 1.5,
        };

        let path = write_report_json(&report, &dir).unwrap();
        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["runs"][0]["results"]["algorithm"], "CTS");
        assert_eq!(json["runs"][0]["results"]["completed_tasks"], 1);
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
