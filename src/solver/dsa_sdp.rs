// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Ian Philip Eglin
//! DSA-SDP: one synchronous round of the slope-dependent distributed
//! stochastic algorithm.
//!
//! Every free agent starts from a random reachable task and then decides, once,
//! whether to keep it or move to the task where it would help finish earliest.

use super::Strategy;
use super::engine::Engine;
use super::metrics::VALUE_SIZE;
use super::temporal::{TemporalCheck, completion_time};
use crate::error::Result;
use crate::solver_debug;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Acceptance parameters of the slope-dependent rule
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DsaConfig {
    pub p_a: f32,
    pub p_b: f32,
    pub p_c: f32,
    pub p_d: f32,
}

impl Default for DsaConfig {
    fn default() -> Self {
        Self {
            p_a: 0.6,
            p_b: 0.15,
            p_c: 0.4,
            p_d: 0.8,
        }
    }
}

/// A free agent and the tasks it can reach, with arrival ticks
#[derive(Debug, Clone)]
struct Variable {
    agent: usize,
    domain: Vec<(usize, i32)>,
}

impl Variable {
    fn arrival(&self, task: usize) -> Option<i32> {
        self.domain.iter().find(|(t, _)| *t == task).map(|(_, a)| *a)
    }
}

#[derive(Debug, Clone)]
pub struct DsaSdp {
    config: DsaConfig,
    rng: ChaCha8Rng,
}

impl DsaSdp {
    pub fn new(config: DsaConfig, seed: u64) -> Self {
        Self {
            config,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    fn draw(&mut self, probability: f32) -> bool {
        self.rng.random_range(0..=100) as f32 <= probability * 100.0
    }

    /// Completion of `task` by its committed agents plus `joining`
    fn evaluate(engine: &Engine, task: usize, joining: &[(usize, i32)]) -> TemporalCheck {
        let mut members = engine.committed_members(task);
        members.extend_from_slice(joining);
        completion_time(engine.problem(), task, engine.residual(task), &members)
    }

    /// Agents other than `except` whose current choice is `task`, plus `extra`
    fn sharing(
        variables: &[Variable],
        choices: &[usize],
        task: usize,
        except: usize,
        extra: Option<(usize, i32)>,
    ) -> Vec<(usize, i32)> {
        let mut coalition: Vec<(usize, i32)> = variables
            .iter()
            .zip(choices)
            .enumerate()
            .filter(|(j, (_, choice))| *j != except && **choice == task)
            .filter_map(|(_, (v, _))| v.arrival(task).map(|arrival| (v.agent, arrival)))
            .collect();
        coalition.extend(extra);
        coalition
    }

    /// Keep or change the choice of variable `i`. Returns the final task and the
    /// number of constraint checks spent.
    fn update_or_confirm(
        &mut self,
        engine: &Engine,
        variables: &[Variable],
        choices: &[usize],
        i: usize,
    ) -> (usize, u64) {
        let variable = &variables[i];
        let current_task = choices[i];
        let own = |task: usize| variable.arrival(task).map(|arrival| (variable.agent, arrival));

        let current = Self::evaluate(
            engine,
            current_task,
            &Self::sharing(variables, choices, current_task, i, own(current_task)),
        );
        let mut checks = current.checks;

        let mut best: Option<(usize, f64)> = None;
        for &(task, _) in &variable.domain {
            if task == current_task {
                continue;
            }
            let check = Self::evaluate(
                engine,
                task,
                &Self::sharing(variables, choices, task, i, own(task)),
            );
            checks += check.checks;
            if best.is_none_or(|(_, cost)| check.cost() < cost) {
                best = Some((task, check.cost()));
            }
        }

        let Some((best_task, new_cost)) = best else {
            return (current_task, checks);
        };
        if new_cost.is_infinite() {
            return (current_task, checks);
        }
        let current_cost = current.cost();
        if current_cost.is_infinite() {
            return (best_task, checks);
        }

        let p_cost = if current_cost > 0.0 {
            ((current_cost - new_cost).abs() / current_cost) as f32
        } else {
            0.0
        };
        let p = self.config.p_a + self.config.p_b.min(p_cost);
        let q = self.config.p_c.max(self.config.p_d - p_cost);

        let cond_a = self.draw(p);
        let cond_b = p_cost <= 1.0 && self.draw(q);
        if cond_a || cond_b {
            (best_task, checks)
        } else {
            (current_task, checks)
        }
    }
}

impl Strategy for DsaSdp {
    fn name(&self) -> &'static str {
        "DSA-SDP"
    }

    fn decide(&mut self, engine: &mut Engine) -> Result<()> {
        let mut variables = Vec::new();
        for agent in engine.free_agents() {
            let domain = engine.free_agent_domain(agent)?;
            if domain.is_empty() {
                continue;
            }
            for &(task, _) in &domain {
                engine.mark_feasible(agent, task);
            }
            variables.push(Variable { agent, domain });
        }
        if variables.is_empty() {
            engine.clear_feasible();
            return Ok(());
        }

        let initial: Vec<usize> = variables
            .iter()
            .map(|v| v.domain[self.rng.random_range(0..v.domain.len())].0)
            .collect();

        let n = variables.len() as u64;
        let messages = n * (n - 1);
        engine.metrics_mut().add_messages(messages, messages * VALUE_SIZE);

        // agents decide in parallel against the initial choices
        let mut choices = Vec::with_capacity(variables.len());
        let mut round_checks = 0;
        for i in 0..variables.len() {
            let (task, checks) = self.update_or_confirm(engine, &variables, &initial, i);
            choices.push(task);
            round_checks = round_checks.max(checks);
        }
        engine.metrics_mut().add_ncccs(round_checks);

        let mut coalitions: BTreeMap<usize, Vec<(usize, i32)>> = BTreeMap::new();
        for (variable, task) in variables.iter().zip(&choices) {
            if let Some(arrival) = variable.arrival(*task) {
                coalitions
                    .entry(*task)
                    .or_default()
                    .push((variable.agent, arrival));
            }
        }
        engine.clear_feasible();
        for (task, coalition) in coalitions {
            solver_debug!(
                "DSA-SDP allocating {} to {} agents",
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
    use crate::solver::{AgentStatus, Solver};

    fn two_tasks() -> Problem {
        Problem::new(
            vec![AgentId(0), AgentId(1), AgentId(2)],
            vec![TaskId(0), TaskId(1)],
            vec![
                Location::euclidean(0, 0),
                Location::euclidean(1, 0),
                Location::euclidean(2, 0),
            ],
            vec![Location::euclidean(0, 4), Location::euclidean(4, 4)],
            vec![Demand::new(20, 8), Demand::new(25, 8)],
            CoalitionValues::constant(2.0, 3),
        )
        .unwrap()
    }

    #[test]
    fn test_every_free_agent_is_allocated() {
        let mut engine = Engine::new(two_tasks());
        let mut dsa = DsaSdp::new(DsaConfig::default(), 7);
        dsa.decide(&mut engine).unwrap();

        for agent in 0..3 {
            assert_eq!(engine.agent_status(agent), AgentStatus::Reaching);
        }
        assert_eq!(engine.metrics().messages_sent, 6);
        assert_eq!(engine.metrics().network_load_bytes, 48);
        assert!(engine.metrics().ncccs > 0);
        assert!(engine.is_consistent());
    }

    #[test]
    fn test_same_seed_same_results() {
        let config = DsaConfig::default();
        let first = Solver::new(two_tasks(), DsaSdp::new(config.clone(), 3))
            .run()
            .unwrap();
        let second = Solver::new(two_tasks(), DsaSdp::new(config, 3))
            .run()
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(first.completed_tasks, 2);
    }

    #[test]
    fn test_single_agent_sends_no_messages() {
        let problem = Problem::new(
            vec![AgentId(0)],
            vec![TaskId(0)],
            vec![Location::euclidean(0, 0)],
            vec![Location::euclidean(0, 2)],
            vec![Demand::new(10, 2)],
            CoalitionValues::constant(1.0, 1),
        )
        .unwrap();
        let results = Solver::new(problem, DsaSdp::new(DsaConfig::default(), 0))
            .run()
            .unwrap();
        assert_eq!(results.messages_sent, 0);
        assert_eq!(results.completed_task_percentage, 100.0);
    }
}
