// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Ian Philip Eglin
//! Benchmark runner: generates or loads CFSTP instances and compares the
//! allocation algorithms on each of them.

use anyhow::{Context, anyhow};
use chrono::Local;
use clap::Parser;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};

use cfstp::config;
use cfstp::logger;
use cfstp::model::{
    BenchmarkReport, InstanceFile, InstanceGenParams, generate_instance, load_instance,
    save_instance, write_report_json,
};
use cfstp::solver::{Algorithm, SolverConfig};

#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
#[serde(rename_all = "lowercase")]
enum SourceMode {
    Random,
    File,
}

#[derive(Debug, Deserialize, Clone)]
struct FileSourceConfig {
    path: String,
}

#[derive(Debug, Deserialize, Clone)]
struct InstanceSourceWrapper {
    mode: SourceMode,
    #[serde(default)]
    random: Option<InstanceGenParams>,
    #[serde(default)]
    file: Option<FileSourceConfig>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(try_from = "InstanceSourceWrapper")]
enum InstanceSource {
    Random(InstanceGenParams),
    File(FileSourceConfig),
}

impl TryFrom<InstanceSourceWrapper> for InstanceSource {
    type Error = String;

    fn try_from(w: InstanceSourceWrapper) -> Result<Self, Self::Error> {
        match w.mode {
            SourceMode::Random => Ok(InstanceSource::Random(w.random.unwrap_or_default())),
            SourceMode::File => w
                .file
                .map(InstanceSource::File)
                .ok_or_else(|| "Missing file config for file mode".to_string()),
        }
    }
}

impl Default for InstanceSource {
    fn default() -> Self {
        InstanceSource::Random(InstanceGenParams::default())
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct OutputConfig {
    dir: String,
    use_timestamp: bool,
    timestamp_fmt: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: "results".to_string(),
            use_timestamp: true,
            timestamp_fmt: "%Y-%m-%d_%H-%M-%S".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct BenchConfig {
    instance: InstanceSource,
    algorithms: Vec<Algorithm>,
    /// Instances per benchmark; random instances use `seed + replicate`
    replicates: u64,
    solver: SolverConfig,
    output_config: OutputConfig,
    log_level: String,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            instance: InstanceSource::default(),
            algorithms: Algorithm::ALL.to_vec(),
            replicates: 1,
            solver: SolverConfig::default(),
            output_config: OutputConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (.json or .pkl)
    #[arg(long, default_value = "demos/bench.json")]
    config: String,

    /// Override the number of replicates
    #[arg(long)]
    replicates: Option<u64>,

    /// Keep per-tick records in the report
    #[arg(long, default_value_t = false)]
    record_ticks: bool,
}

fn result_dir(output: &OutputConfig) -> PathBuf {
    if output.use_timestamp {
        let date_str = Local::now().format(&output.timestamp_fmt).to_string();
        Path::new(&output.dir).join(date_str)
    } else {
        Path::new(&output.dir).to_path_buf()
    }
}

fn load_replicate(
    source: &InstanceSource,
    replicate: u64,
    result_dir: &Path,
) -> anyhow::Result<InstanceFile> {
    let target = result_dir.join(format!("instance_{replicate:03}.json"));
    match source {
        InstanceSource::Random(params) => {
            let params = InstanceGenParams {
                seed: params.seed + replicate,
                ..params.clone()
            };
            info!(
                "Generating instance {} with {} agents and {} tasks",
                replicate,
                params.agents,
                params.task_count()
            );
            let instance = generate_instance(&params)?;
            save_instance(&instance, &target)?;
            Ok(instance)
        }
        InstanceSource::File(cfg) => {
            info!("Loading instance from file: {}", cfg.path);
            let path = Path::new(&cfg.path);
            if let Err(e) = std::fs::copy(path, &target) {
                warn!("Failed to copy instance file: {}", e);
            }
            load_instance(path)
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config_path = &cli.config;
    let mut config: BenchConfig = match config::load(config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config {}: {}", config_path, e);
            return Err(e.into());
        }
    };
    if let Some(replicates) = cli.replicates {
        config.replicates = replicates;
    }
    if cli.record_ticks {
        config.solver.record_ticks = true;
    }
    if config.algorithms.is_empty() {
        return Err(anyhow!("No algorithm selected in {}", config_path).into());
    }

    let result_dir = result_dir(&config.output_config);
    std::fs::create_dir_all(&result_dir)
        .with_context(|| format!("Failed to create {}", result_dir.display()))?;

    let log_path = result_dir.join("simulation.log");
    let _guard = logger::init(Some(&log_path), &config.log_level)?;

    info!("Loaded configuration from {}", config_path);
    info!("Results will be saved to: {}", result_dir.display());

    let bench_start = Instant::now();
    let mut runs = Vec::new();
    let (mut agent_count, mut task_count) = (0, 0);

    for replicate in 0..config.replicates.max(1) {
        let instance = load_replicate(&config.instance, replicate, &result_dir)?;
        let problem = instance.to_problem()?;
        agent_count = problem.agent_count();
        task_count = problem.task_count();

        let solver_config = config.solver.clone().with_seed(config.solver.seed + replicate);
        for algorithm in &config.algorithms {
            let run_start = Instant::now();
            let report = algorithm.run(&problem, &solver_config)?;
            info!(
                "[{:>3}] {:<13} {:6.2}% completed, {} messages, {} NCCCs in {:.1} ms",
                replicate,
                algorithm.name(),
                report.results.completed_task_percentage,
                report.results.messages_sent,
                report.results.ncccs,
                run_start.elapsed().as_secs_f64() * 1000.0
            );
            runs.push(report);
        }
    }

    let report = BenchmarkReport {
        agent_count,
        task_count,
        runs,
        total_duration_ms: bench_start.elapsed().as_secs_f64() * 1000.0,
    };
    let summary_path = write_report_json(&report, &result_dir)?;
    info!("Summary written to {}", summary_path.display());

    Ok(())
}
