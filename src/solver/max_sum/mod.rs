// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Ian Philip Eglin
//! Fast Max-Sum with alternating directions and value propagation (ADVP).
//!
//! Each tick a factor graph is built over the free agents (variables) and the
//! tasks they can reach (functions). Messages travel along a DAG ordered by agent
//! index, once ascending and once descending, first plain and then with value
//! propagation. Every agent then picks the task with the lowest belief.

pub mod function;
pub mod graph;
pub mod variable;

pub use graph::{Edge, EdgeKind, FactorGraph};

use super::Strategy;
use super::engine::Engine;
use super::metrics::{DcopMetrics, VALUE_SIZE};
use crate::error::Result;
use crate::model::Problem;
use crate::solver_debug;
use serde::{Deserialize, Serialize};

/// Coalition bound of [`MaxSumConfig::default`]. R messages enumerate every
/// subset of a function's scope up to this size.
pub const DEFAULT_MAX_COALITION_SIZE: usize = 4;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MaxSumConfig {
    /// Largest coalition a function enumerates, 0 for no bound
    pub max_coalition_size: usize,
}

impl Default for MaxSumConfig {
    fn default() -> Self {
        Self {
            max_coalition_size: DEFAULT_MAX_COALITION_SIZE,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MaxSumAdvp {
    config: MaxSumConfig,
}

impl MaxSumAdvp {
    pub fn new(config: MaxSumConfig) -> Self {
        Self { config }
    }

    /// One pass over the edges, descending passes run in reverse with every
    /// direction flipped.
    fn send_messages(
        &self,
        problem: &Problem,
        graph: &mut FactorGraph,
        metrics: &mut DcopMetrics,
        descending: bool,
        value_propagation: bool,
    ) {
        let edges = graph.edges().to_vec();
        let FactorGraph {
            variables,
            functions,
            ..
        } = graph;

        let ordered: Box<dyn Iterator<Item = &Edge>> = if descending {
            Box::new(edges.iter().rev())
        } else {
            Box::new(edges.iter())
        };
        for edge in ordered {
            match edge.direction(descending) {
                EdgeKind::VariableToFunction => {
                    let Some(variable) = variables.get_mut(&edge.agent) else {
                        continue;
                    };
                    if !variable.contains(edge.task) {
                        continue;
                    }
                    variable.send_q(edge.task, functions);
                    let size = variable.domain().len() as u64;
                    metrics.add_messages(size, size * VALUE_SIZE);
                    metrics.add_ncccs(1);

                    if value_propagation {
                        let choice = variable.compute_assignment(functions);
                        if let Some(function) = functions.get_mut(&edge.task) {
                            function.record_commitment(edge.agent, choice == edge.task);
                        }
                        metrics.add_bytes(VALUE_SIZE);
                    }
                }
                EdgeKind::FunctionToVariable => {
                    let Some(function) = functions.get_mut(&edge.task) else {
                        continue;
                    };
                    if !function.in_scope(edge.agent) {
                        continue;
                    }
                    let checks = function.send_r(
                        edge.agent,
                        problem,
                        variables,
                        self.config.max_coalition_size,
                        value_propagation,
                    );
                    let size = function.scope().len() as u64;
                    metrics.add_messages(size, size * VALUE_SIZE);
                    metrics.add_ncccs(checks);
                }
            }
        }
    }
}

impl Strategy for MaxSumAdvp {
    fn name(&self) -> &'static str {
        "Max-Sum ADVP"
    }

    fn decide(&mut self, engine: &mut Engine) -> Result<()> {
        let mut domains = Vec::new();
        for agent in engine.free_agents() {
            let domain = engine.free_agent_domain(agent)?;
            if domain.is_empty() {
                continue;
            }
            for &(task, _) in &domain {
                engine.mark_feasible(agent, task);
            }
            domains.push((agent, domain));
        }

        let mut graph = FactorGraph::new(domains, engine);
        if graph.is_empty() {
            engine.clear_feasible();
            return Ok(());
        }

        let mut metrics = DcopMetrics::default();
        let passes = [(false, false), (true, false), (false, true), (true, true)];
        for (descending, vp) in passes {
            self.send_messages(engine.problem(), &mut graph, &mut metrics, descending, vp);
        }
        for variable in graph.variables.values_mut() {
            variable.compute_assignment(&graph.functions);
        }

        let totals = engine.metrics_mut();
        totals.add_messages(metrics.messages_sent, metrics.network_load_bytes);
        totals.add_ncccs(metrics.ncccs);

        engine.clear_feasible();
        for (task, coalition) in graph.coalitions() {
            solver_debug!(
                "Max-Sum allocating {} to {} agents",
                engine.problem().task_id(task),
                coalition.len()
            );
            engine.allocate(task, &coalition);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AgentId, CoalitionValues, Demand, Location, Problem, TaskId};
    use crate::solver::{AgentStatus, Assignment, Solver};

    #[test]
    fn test_single_agent_picks_completable_task() {
        // task 0 is closer but cannot be finished by its deadline
        let problem = Problem::new(
            vec![AgentId(0)],
            vec![TaskId(0), TaskId(1)],
            vec![Location::euclidean(0, 0)],
            vec![Location::euclidean(0, 2), Location::euclidean(0, 3)],
            vec![Demand::new(4, 10), Demand::new(10, 4)],
            CoalitionValues::constant(2.0, 1),
        )
        .unwrap();
        let mut engine = Engine::new(problem);
        MaxSumAdvp::default().decide(&mut engine).unwrap();

        assert_eq!(engine.assignment(0, 1), Assignment::Reaching);
        assert_eq!(engine.assignment(0, 0), Assignment::None);
        assert!(engine.metrics().messages_sent > 0);
        assert!(engine.is_consistent());
    }

    #[test]
    fn test_config_is_bounded_by_default() {
        assert_eq!(MaxSumConfig::default().max_coalition_size, DEFAULT_MAX_COALITION_SIZE);
        let config: MaxSumConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.max_coalition_size, 4);
        let config: MaxSumConfig = serde_json::from_str(r#"{"max_coalition_size": 0}"#).unwrap();
        assert_eq!(config.max_coalition_size, 0);
    }

    #[test]
    fn test_shared_task_is_completed() {
        let problem = Problem::new(
            vec![AgentId(0), AgentId(1)],
            vec![TaskId(0)],
            vec![Location::euclidean(0, 0), Location::euclidean(5, 5)],
            vec![Location::euclidean(0, 3)],
            vec![Demand::new(10, 6)],
            CoalitionValues::constant(2.0, 2),
        )
        .unwrap();
        let mut solver = Solver::new(problem, MaxSumAdvp::default());
        let results = solver.run().unwrap();

        assert_eq!(results.completed_task_percentage, 100.0);
        assert_eq!(solver.engine().agent_status(0), AgentStatus::Free);
        assert!(results.ncccs > 0);
    }

    #[test]
    fn test_deterministic() {
        let problem = Problem::new(
            (0..3).map(AgentId).collect(),
            (0..2).map(TaskId).collect(),
            vec![
                Location::euclidean(0, 0),
                Location::euclidean(2, 2),
                Location::euclidean(6, 1),
            ],
            vec![Location::euclidean(1, 4), Location::euclidean(5, 5)],
            vec![Demand::new(15, 9), Demand::new(18, 12)],
            CoalitionValues::constant(1.5, 3),
        )
        .unwrap();
        let first = Solver::new(problem.clone(), MaxSumAdvp::default()).run().unwrap();
        let second = Solver::new(problem, MaxSumAdvp::default()).run().unwrap();
        assert_eq!(first, second);
    }
}
