// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Ian Philip Eglin
//! Cluster-based task scheduling (CTS)
//!
//! Every free agent proposes itself to its nearest reachable task, unallocated
//! tasks first. Each task then takes the shortest prefix of its proposers, in
//! arrival order, that lets it finish by its deadline.

use super::Strategy;
use super::engine::{CompletedTask, Engine};
use super::metrics::{BASE_MESSAGE_SIZE, bytes_needed};
use super::temporal::completion_time;
use crate::error::Result;
use crate::solver_debug;

#[derive(Debug, Clone, Default)]
pub struct Cts;

impl Cts {
    pub fn new() -> Self {
        Self
    }

    /// Nearest task `agent` can reach before its deadline, preferring
    /// unallocated tasks, then earlier deadline.
    fn nearest_task(engine: &Engine, agent: usize) -> Result<Option<(usize, i32)>> {
        let domain = engine.free_agent_domain(agent)?;
        let best = domain.into_iter().min_by_key(|(task, arrival)| {
            (
                !engine.task_status(*task).is_unallocated(),
                *arrival,
                engine.problem().deadline(*task),
            )
        });
        Ok(best)
    }

    fn propose(&self, engine: &mut Engine) -> Result<()> {
        for agent in engine.free_agents() {
            if let Some((task, arrival)) = Self::nearest_task(engine, agent)? {
                engine.mark_feasible(agent, task);
                engine
                    .metrics_mut()
                    .add_messages(1, bytes_needed(arrival) + BASE_MESSAGE_SIZE);
                solver_debug!(
                    "{} can reach {} at t={}",
                    engine.problem().agent_id(agent),
                    engine.problem().task_id(task),
                    arrival
                );
            }
        }
        Ok(())
    }

    fn form_coalition(&self, engine: &mut Engine, task: usize) -> Result<()> {
        let mut feasible = Vec::new();
        for agent in engine.feasible_agents(task) {
            feasible.push((agent, engine.arrival_time(agent, task)?));
        }
        feasible.sort_by_key(|(_, arrival)| *arrival);

        let residual = engine.residual(task);
        let mut members = engine.committed_members(task);
        let mut selected = 0;

        let enough = !members.is_empty() && {
            let check = completion_time(engine.problem(), task, residual, &members);
            engine.metrics_mut().add_ncccs(1);
            check.is_feasible()
        };

        if !enough {
            selected = feasible.len();
            for i in 0..feasible.len() {
                members.push(feasible[i]);
                // agents arriving together join together
                if i + 1 < feasible.len() && feasible[i].1 == feasible[i + 1].1 {
                    continue;
                }
                let check = completion_time(engine.problem(), task, residual, &members);
                engine.metrics_mut().add_ncccs(1);
                if check.is_feasible() {
                    selected = i + 1;
                    break;
                }
            }
        }

        for &(agent, _) in &feasible[selected..] {
            engine.reset_feasible(agent, task);
        }
        let coalition = &feasible[..selected];
        if !coalition.is_empty() {
            engine.allocate(task, coalition);
            engine.metrics_mut().add_messages(coalition.len() as u64, 0);
        }
        Ok(())
    }
}

impl Strategy for Cts {
    fn name(&self) -> &'static str {
        "CTS"
    }

    fn decide(&mut self, engine: &mut Engine) -> Result<()> {
        self.propose(engine)?;
        for task in 0..engine.task_count() {
            if engine.is_task_open(task) && !engine.feasible_agents(task).is_empty() {
                self.form_coalition(engine, task)?;
            }
        }
        engine.clear_feasible();
        Ok(())
    }

    fn on_completed(&mut self, engine: &mut Engine, completed: &[CompletedTask]) {
        let notice = bytes_needed(engine.time()) + BASE_MESSAGE_SIZE;
        for done in completed {
            engine
                .metrics_mut()
                .add_bytes((done.workers + done.reachers) as u64 * notice);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AgentId, CoalitionValues, Demand, Location, Problem, TaskId};
    use crate::solver::{AgentStatus, Solver};

    fn scenario() -> Problem {
        Problem::new(
            vec![AgentId(0), AgentId(1)],
            vec![TaskId(0)],
            vec![Location::euclidean(0, 0), Location::euclidean(5, 5)],
            vec![Location::euclidean(0, 3)],
            vec![Demand::new(10, 6)],
            CoalitionValues::constant(2.0, 2),
        )
        .unwrap()
    }

    #[test]
    fn test_nearest_agent_alone_completes_task() {
        let mut solver = Solver::new(scenario(), Cts::new()).with_tick_records(true);
        let results = solver.run().unwrap();

        assert_eq!(results.completed_task_percentage, 100.0);
        assert_eq!(results.completed_tasks, 1);
        assert_eq!(solver.engine().time(), 6);
        assert_eq!(results.avg_travel_time, 3.0);

        let completion = solver
            .history()
            .iter()
            .find(|r| r.completed_this_tick == 1)
            .map(|r| r.time);
        assert_eq!(completion, Some(6));
        // agent 1 was never needed
        assert_eq!(*solver.engine().agent_location(1), Location::euclidean(5, 5));
        assert_eq!(solver.engine().agent_status(1), AgentStatus::Free);
    }

    #[test]
    fn test_first_tick_allocation() {
        let mut engine = Engine::new(scenario());
        let mut cts = Cts::new();
        engine.advance_agents();
        cts.decide(&mut engine).unwrap();

        assert_eq!(engine.agent_status(0), AgentStatus::Reaching);
        assert_eq!(engine.agent_status(1), AgentStatus::Free);
        assert!(engine.feasible_agents(0).is_empty());
        // two proposals and one allocation message
        assert_eq!(engine.metrics().messages_sent, 3);
        assert_eq!(engine.metrics().network_load_bytes, 2 * (1 + BASE_MESSAGE_SIZE));
        assert_eq!(engine.metrics().ncccs, 1);
        assert!(engine.is_consistent());
    }

    #[test]
    fn test_heavy_task_takes_both_agents() {
        let problem = Problem::new(
            vec![AgentId(0), AgentId(1)],
            vec![TaskId(0)],
            vec![Location::euclidean(0, 0), Location::euclidean(0, 1)],
            vec![Location::euclidean(0, 3)],
            vec![Demand::new(6, 10)],
            CoalitionValues::constant(2.0, 2),
        )
        .unwrap();
        let mut engine = Engine::new(problem);
        Cts::new().decide(&mut engine).unwrap();
        // no prefix finishes by the deadline, so every proposer is sent
        assert_eq!(engine.agent_status(0), AgentStatus::Reaching);
        assert_eq!(engine.agent_status(1), AgentStatus::Reaching);
    }
}
