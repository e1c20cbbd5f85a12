// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Ian Philip Eglin
//! Solver base: the strategy seam, the run loop and algorithm dispatch

pub mod cfla;
pub mod combinations;
pub mod cts;
pub mod dsa_sdp;
pub mod engine;
pub mod logging;
pub mod max_sum;
pub mod metrics;
pub mod status;
pub mod temporal;

pub use cfla::{Cfla, CflaConfig, Edf};
pub use cts::Cts;
pub use dsa_sdp::{DsaConfig, DsaSdp};
pub use engine::{CompletedTask, Engine};
pub use max_sum::{MaxSumAdvp, MaxSumConfig};
pub use metrics::DcopMetrics;
pub use status::{AgentStatus, Assignment, TaskStatus};

use crate::error::{Error, Result};
use crate::model::{Problem, Results, RunReport, TickRecord};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Settings shared by every run of a benchmark
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SolverConfig {
    /// Seed of the random generator of stochastic strategies
    pub seed: u64,
    /// Keep a [`TickRecord`] per simulated tick
    pub record_ticks: bool,
    pub dsa: DsaConfig,
    pub max_sum: MaxSumConfig,
    pub cfla: CflaConfig,
}

impl SolverConfig {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_record_ticks(mut self, record_ticks: bool) -> Self {
        self.record_ticks = record_ticks;
        self
    }
}

/// Decision rule of an allocation algorithm.
///
/// Each tick the engine moves agents, the strategy forms coalitions for free
/// agents, then allocated tasks make progress.
pub trait Strategy {
    fn name(&self) -> &'static str;

    /// Form and allocate coalitions for the current tick
    fn decide(&mut self, engine: &mut Engine) -> Result<()>;

    /// Called with the tasks completed at the end of the tick
    fn on_completed(&mut self, _engine: &mut Engine, _completed: &[CompletedTask]) {}

    /// Simulate one tick and return the number of tasks completed in it
    fn step(&mut self, engine: &mut Engine) -> Result<usize> {
        engine.advance_agents();
        self.decide(engine)?;
        let completed = engine.progress_tasks();
        self.on_completed(engine, &completed);
        Ok(completed.len())
    }
}

pub struct Solver<S: Strategy> {
    engine: Engine,
    strategy: S,
    record_ticks: bool,
    history: Vec<TickRecord>,
}

impl<S: Strategy> Solver<S> {
    pub fn new(problem: Problem, strategy: S) -> Self {
        Self {
            engine: Engine::new(problem),
            strategy,
            record_ticks: false,
            history: Vec::new(),
        }
    }

    pub fn with_tick_records(mut self, record_ticks: bool) -> Self {
        self.record_ticks = record_ticks;
        self
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn strategy(&self) -> &S {
        &self.strategy
    }

    pub fn history(&self) -> &[TickRecord] {
        &self.history
    }

    pub fn into_history(self) -> Vec<TickRecord> {
        self.history
    }

    /// Simulate until every task is completed, the maximum deadline is reached,
    /// or (static problems only) every agent is idle and nothing was completed
    /// in the last tick.
    pub fn run(&mut self) -> Result<Results> {
        let total = self.engine.task_count();
        let horizon = self.engine.problem().max_deadline();
        let dynamic = self.engine.problem().is_dynamic();
        let mut completed = 0;

        loop {
            if dynamic {
                self.engine.advance_dynamism();
            }
            let completed_now = self.strategy.step(&mut self.engine)?;
            completed += completed_now;

            logging::log_tick_status(&self.engine, completed);
            if self.record_ticks {
                self.history.push(TickRecord {
                    time: self.engine.time(),
                    enabled_agents: self.engine.problem().enabled_agent_count(),
                    enabled_tasks: self.engine.problem().enabled_task_count(),
                    busy_agents: self.engine.busy_agent_count(),
                    completed_tasks: completed,
                    completed_this_tick: completed_now,
                });
            }

            if completed >= total {
                break;
            }
            if !dynamic && completed_now == 0 && !self.engine.any_busy() {
                logging::log_stagnation(&self.engine);
                break;
            }
            if self.engine.time() >= horizon {
                break;
            }
            self.engine.tick();
        }

        let metrics = self.engine.metrics();
        let results = Results {
            algorithm: self.strategy.name().to_string(),
            total_tasks: total,
            completed_tasks: completed,
            completed_task_percentage: logging::completion_percentage(completed, total),
            avg_travel_time: self.engine.avg_travel_time(),
            avg_completion_time: self.engine.avg_completion_time(),
            messages_sent: metrics.messages_sent,
            network_load_bytes: metrics.network_load_bytes,
            ncccs: metrics.ncccs,
            ticks: self.engine.time() + 1,
        };
        logging::log_results(&results);
        Ok(results)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    Cts,
    DsaSdp,
    MaxSumAdvp,
    Cfla,
    CflaPlus,
    Edf,
}

impl Algorithm {
    pub const ALL: [Algorithm; 6] = [
        Algorithm::Cts,
        Algorithm::DsaSdp,
        Algorithm::MaxSumAdvp,
        Algorithm::Cfla,
        Algorithm::CflaPlus,
        Algorithm::Edf,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Cts => "CTS",
            Self::DsaSdp => "DSA-SDP",
            Self::MaxSumAdvp => "Max-Sum ADVP",
            Self::Cfla => "CFLA",
            Self::CflaPlus => "CFLA+",
            Self::Edf => "EDF",
        }
    }

    /// Solve a private copy of `problem`
    pub fn solve(&self, problem: &Problem, config: &SolverConfig) -> Result<Results> {
        Ok(self.run(problem, config)?.results)
    }

    /// Solve a private copy of `problem`, keeping tick records if configured
    pub fn run(&self, problem: &Problem, config: &SolverConfig) -> Result<RunReport> {
        let problem = problem.clone();
        let cfla = config.cfla.clone();
        match self {
            Self::Cts => run_strategy(problem, Cts::new(), config),
            Self::DsaSdp => {
                run_strategy(problem, DsaSdp::new(config.dsa.clone(), config.seed), config)
            }
            Self::MaxSumAdvp => {
                run_strategy(problem, MaxSumAdvp::new(config.max_sum.clone()), config)
            }
            Self::Cfla => run_strategy(problem, Cfla::new(cfla), config),
            Self::CflaPlus => run_strategy(problem, Cfla::improved(cfla), config),
            Self::Edf => run_strategy(problem, Edf::new(cfla), config),
        }
    }
}

fn run_strategy<S: Strategy>(
    problem: Problem,
    strategy: S,
    config: &SolverConfig,
) -> Result<RunReport> {
    let mut solver = Solver::new(problem, strategy).with_tick_records(config.record_ticks);
    let results = solver.run()?;
    Ok(RunReport {
        results,
        ticks: solver.into_history(),
    })
}

impl FromStr for Algorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().replace(['-', '_', ' '], "").as_str() {
            "cts" => Ok(Self::Cts),
            "dsasdp" => Ok(Self::DsaSdp),
            "maxsum" | "maxsumadvp" => Ok(Self::MaxSumAdvp),
            "cfla" => Ok(Self::Cfla),
            "cfla+" | "cflaplus" => Ok(Self::CflaPlus),
            "edf" => Ok(Self::Edf),
            _ => Err(Error::UnknownAlgorithm(s.to_string())),
        }
    }
}

impl std::fmt::Display for Algorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_algorithm_from_str() {
        assert_eq!("CTS".parse::<Algorithm>().unwrap(), Algorithm::Cts);
        assert_eq!("dsa-sdp".parse::<Algorithm>().unwrap(), Algorithm::DsaSdp);
        assert_eq!("Max-Sum ADVP".parse::<Algorithm>().unwrap(), Algorithm::MaxSumAdvp);
        assert_eq!("CFLA+".parse::<Algorithm>().unwrap(), Algorithm::CflaPlus);
        assert_eq!("edf".parse::<Algorithm>().unwrap(), Algorithm::Edf);
        assert_eq!(
            "greedy".parse::<Algorithm>(),
            Err(Error::UnknownAlgorithm("greedy".to_string()))
        );
    }

    #[test]
    fn test_algorithm_names_round_trip() {
        for algorithm in Algorithm::ALL {
            assert_eq!(algorithm.name().parse::<Algorithm>().unwrap(), algorithm);
        }
    }
}
