// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Ian Philip Eglin
//! Time-stepped simulation engine shared by every strategy.
//!
//! The engine owns the problem copy of one run, the clock, and the status of
//! tasks, agents and agent-task cells. Strategies only decide which coalitions
//! to form; travelling, working and completing happen here.

use super::metrics::DcopMetrics;
use super::status::{AgentStatus, Assignment, TaskStatus};
use super::temporal::work_tolerance;
use crate::error::Result;
use crate::model::{DynamismChange, Location, Problem};
use crate::solver_debug;

/// Target of a busy agent. `countdown` is the number of ticks left before a
/// reaching agent starts working.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Commitment {
    task: usize,
    countdown: i32,
}

/// A task completed during [`Engine::progress_tasks`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletedTask {
    pub task: usize,
    pub workers: usize,
    pub reachers: usize,
}

#[derive(Debug, Clone, Copy, Default)]
struct AllocationStats {
    allocations: u64,
    travel_total: i64,
    completed: u64,
    completion_total: i64,
}

#[derive(Debug, Clone)]
pub struct Engine {
    problem: Problem,
    time: i32,
    agent_locations: Vec<Location>,
    task_status: Vec<TaskStatus>,
    agent_status: Vec<AgentStatus>,
    assignments: Vec<Vec<Assignment>>,
    commitments: Vec<Option<Commitment>>,
    working: Vec<usize>,
    residual: Vec<f64>,
    allocated_at: Vec<Option<i32>>,
    metrics: DcopMetrics,
    stats: AllocationStats,
}

impl Engine {
    pub fn new(problem: Problem) -> Self {
        let agents = problem.agent_count();
        let tasks = problem.task_count();
        Self {
            time: 0,
            agent_locations: (0..agents)
                .map(|a| *problem.initial_agent_location(a))
                .collect(),
            task_status: vec![TaskStatus::NotCompleted; tasks],
            agent_status: vec![AgentStatus::Free; agents],
            assignments: vec![vec![Assignment::None; tasks]; agents],
            commitments: vec![None; agents],
            working: vec![0; tasks],
            residual: (0..tasks).map(|v| problem.workload(v) as f64).collect(),
            allocated_at: vec![None; tasks],
            metrics: DcopMetrics::default(),
            stats: AllocationStats::default(),
            problem,
        }
    }

    pub fn problem(&self) -> &Problem {
        &self.problem
    }

    pub fn time(&self) -> i32 {
        self.time
    }

    pub fn tick(&mut self) {
        self.time += 1;
    }

    pub fn agent_count(&self) -> usize {
        self.agent_status.len()
    }

    pub fn task_count(&self) -> usize {
        self.task_status.len()
    }

    pub fn task_status(&self, task: usize) -> TaskStatus {
        self.task_status[task]
    }

    pub fn agent_status(&self, agent: usize) -> AgentStatus {
        self.agent_status[agent]
    }

    pub fn assignment(&self, agent: usize, task: usize) -> Assignment {
        self.assignments[agent][task]
    }

    pub fn residual(&self, task: usize) -> f64 {
        self.residual[task]
    }

    pub fn working_count(&self, task: usize) -> usize {
        self.working[task]
    }

    pub fn agent_location(&self, agent: usize) -> &Location {
        &self.agent_locations[agent]
    }

    pub fn metrics(&self) -> &DcopMetrics {
        &self.metrics
    }

    pub fn metrics_mut(&mut self) -> &mut DcopMetrics {
        &mut self.metrics
    }

    /// Task the agent is reaching or working on
    pub fn target(&self, agent: usize) -> Option<usize> {
        self.commitments[agent].map(|c| c.task)
    }

    /// Enabled agent with no target
    pub fn is_free(&self, agent: usize) -> bool {
        self.problem.is_agent_enabled(agent) && self.agent_status[agent] == AgentStatus::Free
    }

    pub fn free_agents(&self) -> Vec<usize> {
        (0..self.agent_count()).filter(|a| self.is_free(*a)).collect()
    }

    /// Enabled task that is not completed yet
    pub fn is_task_open(&self, task: usize) -> bool {
        self.problem.is_task_enabled(task) && self.task_status[task].is_open()
    }

    /// Enabled task no coalition has been sent to
    pub fn is_task_unallocated(&self, task: usize) -> bool {
        self.problem.is_task_enabled(task) && self.task_status[task].is_unallocated()
    }

    pub fn completed_count(&self) -> usize {
        self.task_status
            .iter()
            .filter(|s| **s == TaskStatus::Completed)
            .count()
    }

    pub fn any_busy(&self) -> bool {
        self.agent_status.iter().any(|s| s.is_busy())
    }

    pub fn busy_agent_count(&self) -> usize {
        self.agent_status.iter().filter(|s| s.is_busy()).count()
    }

    /// Tick from which `agent` counts as arrived at `task`, leaving from where
    /// it is now. An agent already on the task's location starts working this
    /// tick, so like a working agent it counts as arrived one tick ago.
    pub fn arrival_time(&self, agent: usize, task: usize) -> Result<i32> {
        let travel = self.problem.travel_time(
            &self.agent_locations[agent],
            self.problem.task_location(task),
            self.problem.agent_speed(agent),
        )?;
        if travel == 0 {
            return Ok(self.time - 1);
        }
        Ok(self.time.saturating_add(travel))
    }

    /// Open tasks `agent` can reach strictly before their deadline, with the
    /// arrival tick, sorted by arrival then task index.
    pub fn free_agent_domain(&self, agent: usize) -> Result<Vec<(usize, i32)>> {
        let mut domain = Vec::new();
        for task in 0..self.task_count() {
            if !self.is_task_open(task) {
                continue;
            }
            let arrival = self.arrival_time(agent, task)?;
            if arrival < self.problem.deadline(task) {
                domain.push((task, arrival));
            }
        }
        domain.sort_by_key(|(_, arrival)| *arrival);
        Ok(domain)
    }

    pub fn mark_feasible(&mut self, agent: usize, task: usize) {
        self.assignments[agent][task] = Assignment::Feasible;
        if self.task_status[task] == TaskStatus::NotCompleted {
            self.task_status[task] = TaskStatus::Allocable;
        }
    }

    pub fn reset_feasible(&mut self, agent: usize, task: usize) {
        if self.assignments[agent][task] == Assignment::Feasible {
            self.assignments[agent][task] = Assignment::None;
        }
    }

    pub fn feasible_agents(&self, task: usize) -> Vec<usize> {
        (0..self.agent_count())
            .filter(|a| self.assignments[*a][task] == Assignment::Feasible)
            .collect()
    }

    /// Drop every feasibility mark and return unallocated tasks to `NotCompleted`
    pub fn clear_feasible(&mut self) {
        for row in &mut self.assignments {
            for cell in row.iter_mut() {
                if *cell == Assignment::Feasible {
                    *cell = Assignment::None;
                }
            }
        }
        for status in &mut self.task_status {
            if *status == TaskStatus::Allocable {
                *status = TaskStatus::NotCompleted;
            }
        }
    }

    /// Agents already committed to `task`, with the tick from which each one
    /// counts as arrived. Working agents count as arrived one tick ago.
    pub fn committed_members(&self, task: usize) -> Vec<(usize, i32)> {
        self.commitments
            .iter()
            .enumerate()
            .filter_map(|(agent, c)| match c {
                Some(c) if c.task == task => match self.assignments[agent][task] {
                    Assignment::Working => Some((agent, self.time - 1)),
                    Assignment::Reaching => Some((agent, self.time + c.countdown - 1)),
                    _ => None,
                },
                _ => None,
            })
            .collect()
    }

    /// Send a coalition to `task`. Members that are not free are skipped.
    ///
    /// Returns the number of agents that were actually committed.
    pub fn allocate(&mut self, task: usize, coalition: &[(usize, i32)]) -> usize {
        let mut committed = 0;
        let mut max_travel = 0;
        for &(agent, arrival) in coalition {
            if !self.is_free(agent) {
                continue;
            }
            let travel = (arrival - self.time).max(0);
            max_travel = max_travel.max(travel);
            if travel > 0 {
                self.agent_status[agent] = AgentStatus::Reaching;
                self.assignments[agent][task] = Assignment::Reaching;
                self.commitments[agent] = Some(Commitment {
                    task,
                    countdown: travel + 1,
                });
            } else {
                self.agent_status[agent] = AgentStatus::Working;
                self.assignments[agent][task] = Assignment::Working;
                self.commitments[agent] = Some(Commitment { task, countdown: 0 });
                self.working[task] += 1;
            }
            committed += 1;
        }
        if committed == 0 {
            return 0;
        }

        self.task_status[task] = TaskStatus::Allocated;
        self.allocated_at[task].get_or_insert(self.time);
        self.stats.allocations += 1;
        self.stats.travel_total += max_travel as i64;
        solver_debug!(
            "t={} allocate {} agents to {} (max travel {})",
            self.time,
            committed,
            self.problem.task_id(task),
            max_travel
        );
        committed
    }

    /// Apply the dynamism schedule for the current tick
    pub fn advance_dynamism(&mut self) -> DynamismChange {
        let change = self.problem.advance_dynamism(self.time);
        if !change.is_empty() {
            solver_debug!(
                "t={} dynamism: disabled agents {:?}, enabled tasks {:?}",
                self.time,
                change.disabled_agents,
                change.enabled_tasks
            );
        }
        change
    }

    /// Release `agent` from its target
    pub fn remove_agent(&mut self, agent: usize) {
        if let Some(c) = self.commitments[agent].take() {
            if self.assignments[agent][c.task] == Assignment::Working {
                self.working[c.task] -= 1;
            }
            self.assignments[agent][c.task] = Assignment::None;
        }
        self.agent_status[agent] = AgentStatus::Free;
    }

    /// Move agents forward: disabled agents leave, agents heading to completed
    /// tasks are released, reaching agents count down and start working on arrival.
    pub fn advance_agents(&mut self) {
        for agent in 0..self.agent_count() {
            if !self.problem.is_agent_enabled(agent) {
                if self.agent_status[agent].is_busy() {
                    solver_debug!(
                        "t={} removing disabled {}",
                        self.time,
                        self.problem.agent_id(agent)
                    );
                    self.remove_agent(agent);
                }
                continue;
            }
            let Some(mut c) = self.commitments[agent] else {
                continue;
            };
            if self.agent_status[agent] != AgentStatus::Reaching {
                continue;
            }
            if self.task_status[c.task] == TaskStatus::Completed {
                self.remove_agent(agent);
                continue;
            }
            c.countdown -= 1;
            if c.countdown <= 0 {
                self.agent_status[agent] = AgentStatus::Working;
                self.assignments[agent][c.task] = Assignment::Working;
                self.agent_locations[agent] = *self.problem.task_location(c.task);
                self.working[c.task] += 1;
            }
            self.commitments[agent] = Some(c);
        }
    }

    /// Let every allocated task consume the value of its working coalition.
    pub fn progress_tasks(&mut self) -> Vec<CompletedTask> {
        let mut completed = Vec::new();
        for task in 0..self.task_count() {
            if !self.problem.is_task_enabled(task)
                || self.task_status[task] != TaskStatus::Allocated
            {
                continue;
            }
            let mut workers = Vec::with_capacity(self.working[task]);
            let mut reachers = 0;
            for agent in 0..self.agent_count() {
                match self.assignments[agent][task] {
                    Assignment::Working => workers.push(agent),
                    Assignment::Reaching => reachers += 1,
                    _ => {}
                }
            }

            if !workers.is_empty() {
                let value = self.problem.coalition_value(task, &workers).max(0.0) as f64;
                self.residual[task] = (self.residual[task] - value).max(0.0);
                if self.residual[task] <= work_tolerance(self.problem.workload(task)) {
                    self.residual[task] = 0.0;
                    self.task_status[task] = TaskStatus::Completed;
                    self.working[task] = 0;
                    for &agent in &workers {
                        self.assignments[agent][task] = Assignment::Done;
                        self.agent_status[agent] = AgentStatus::Free;
                        self.commitments[agent] = None;
                    }
                    self.stats.completed += 1;
                    self.stats.completion_total +=
                        (self.time - self.allocated_at[task].unwrap_or(self.time)) as i64;
                    solver_debug!(
                        "t={} {} completed by {} agents",
                        self.time,
                        self.problem.task_id(task),
                        workers.len()
                    );
                    completed.push(CompletedTask {
                        task,
                        workers: workers.len(),
                        reachers,
                    });
                }
            } else if reachers == 0 && self.time < self.problem.deadline(task) {
                self.task_status[task] = TaskStatus::NotCompleted;
            }
        }
        completed
    }

    /// Mean of the longest travel time of each allocation
    pub fn avg_travel_time(&self) -> f32 {
        if self.stats.allocations == 0 {
            return 0.0;
        }
        self.stats.travel_total as f32 / self.stats.allocations as f32
    }

    /// Mean ticks from first allocation to completion over completed tasks
    pub fn avg_completion_time(&self) -> f32 {
        if self.stats.completed == 0 {
            return 0.0;
        }
        self.stats.completion_total as f32 / self.stats.completed as f32
    }

    /// Check the conservation invariants between agent status, targets,
    /// assignment cells and working counts.
    pub fn is_consistent(&self) -> bool {
        for agent in 0..self.agent_count() {
            let active: Vec<usize> = (0..self.task_count())
                .filter(|v| self.assignments[agent][*v].is_active())
                .collect();
            let expected = match self.agent_status[agent] {
                AgentStatus::Free => None,
                AgentStatus::Reaching => Some(Assignment::Reaching),
                AgentStatus::Working => Some(Assignment::Working),
            };
            match (expected, self.commitments[agent], active.as_slice()) {
                (None, None, []) => {}
                (Some(cell), Some(c), [task]) if *task == c.task => {
                    if self.assignments[agent][*task] != cell {
                        return false;
                    }
                }
                _ => return false,
            }
        }
        (0..self.task_count()).all(|task| {
            let working = (0..self.agent_count())
                .filter(|a| self.assignments[*a][task] == Assignment::Working)
                .count();
            working == self.working[task]
                && self.residual[task] >= 0.0
                && self.residual[task] <= self.problem.workload(task) as f64
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AgentId, CoalitionValues, Demand, TaskId};
    use crate::solver::temporal::completion_time;

    fn scenario() -> Engine {
        let problem = Problem::new(
            vec![AgentId(0), AgentId(1)],
            vec![TaskId(0)],
            vec![Location::euclidean(0, 0), Location::euclidean(5, 5)],
            vec![Location::euclidean(0, 3)],
            vec![Demand::new(10, 6)],
            CoalitionValues::constant(2.0, 2),
        )
        .unwrap();
        Engine::new(problem)
    }

    #[test]
    fn test_free_agent_domain() {
        let engine = scenario();
        assert_eq!(engine.free_agent_domain(0).unwrap(), vec![(0, 3)]);
        // sqrt(25 + 4) rounds up to 6
        assert_eq!(engine.free_agent_domain(1).unwrap(), vec![(0, 6)]);
    }

    #[test]
    fn test_reaching_agent_works_after_arrival() {
        let mut engine = scenario();
        assert_eq!(engine.allocate(0, &[(0, 3)]), 1);
        assert_eq!(engine.agent_status(0), AgentStatus::Reaching);
        assert_eq!(engine.task_status(0), TaskStatus::Allocated);
        assert_eq!(engine.committed_members(0), vec![(0, 3)]);
        assert!(engine.progress_tasks().is_empty());

        let mut completed_at = None;
        for t in 1..=10 {
            engine.tick();
            engine.advance_agents();
            assert_eq!(engine.committed_members(0), vec![(0, (t - 1).max(3))]);
            let done = engine.progress_tasks();
            assert!(engine.is_consistent());
            if !done.is_empty() {
                completed_at = Some(t);
                break;
            }
        }
        assert_eq!(completed_at, Some(6));
        assert_eq!(engine.agent_status(0), AgentStatus::Free);
        assert_eq!(engine.assignment(0, 0), Assignment::Done);
        assert_eq!(*engine.agent_location(0), Location::euclidean(0, 3));
        assert_eq!(engine.avg_completion_time(), 6.0);
        assert_eq!(engine.avg_travel_time(), 3.0);
    }

    #[test]
    fn test_co_located_agent_works_immediately() {
        let mut engine = scenario();
        engine.allocate(0, &[(1, 0)]);
        assert_eq!(engine.agent_status(1), AgentStatus::Working);
        assert_eq!(engine.working_count(0), 1);
        engine.progress_tasks();
        assert_eq!(engine.residual(0), 4.0);
        assert!(engine.is_consistent());
    }

    #[test]
    fn test_co_located_agent_counts_as_arrived_last_tick() {
        let problem = Problem::new(
            vec![AgentId(0)],
            vec![TaskId(0)],
            vec![Location::euclidean(2, 2)],
            vec![Location::euclidean(2, 2)],
            vec![Demand::new(1, 4)],
            CoalitionValues::constant(2.0, 1),
        )
        .unwrap();
        let mut engine = Engine::new(problem);
        assert_eq!(engine.arrival_time(0, 0).unwrap(), -1);
        assert_eq!(engine.free_agent_domain(0).unwrap(), vec![(0, -1)]);

        let check = completion_time(engine.problem(), 0, engine.residual(0), &[(0, -1)]);
        assert_eq!(check.completion, Some(1));

        engine.allocate(0, &[(0, -1)]);
        assert_eq!(engine.agent_status(0), AgentStatus::Working);
        engine.progress_tasks();
        engine.tick();
        engine.advance_agents();
        assert_eq!(engine.progress_tasks().len(), 1);
        assert_eq!(engine.time(), 1);
    }

    #[test]
    fn test_fractional_progress_finishes_when_planned() {
        for (workload, value) in [(3, 0.3), (1, 0.2), (6, 0.6), (7, 0.7)] {
            let problem = Problem::new(
                vec![AgentId(0)],
                vec![TaskId(0)],
                vec![Location::euclidean(0, 0)],
                vec![Location::euclidean(0, 0)],
                vec![Demand::new(100, workload)],
                CoalitionValues::constant(value, 1),
            )
            .unwrap();
            let mut engine = Engine::new(problem);
            let planned = completion_time(engine.problem(), 0, engine.residual(0), &[(0, -1)])
                .completion
                .unwrap();

            engine.allocate(0, &[(0, -1)]);
            let mut completed_at = None;
            while completed_at.is_none() && engine.time() <= planned {
                engine.advance_agents();
                if !engine.progress_tasks().is_empty() {
                    completed_at = Some(engine.time());
                }
                engine.tick();
            }
            assert_eq!(completed_at, Some(planned), "workload {workload}, value {value}");
            assert_eq!(engine.residual(0), 0.0);
        }
    }

    #[test]
    fn test_allocated_task_reverts_when_abandoned() {
        let mut engine = scenario();
        engine.allocate(0, &[(0, 3)]);
        engine.remove_agent(0);
        assert!(engine.is_consistent());
        engine.progress_tasks();
        assert_eq!(engine.task_status(0), TaskStatus::NotCompleted);
    }

    #[test]
    fn test_clear_feasible() {
        let mut engine = scenario();
        engine.mark_feasible(0, 0);
        engine.mark_feasible(1, 0);
        assert_eq!(engine.task_status(0), TaskStatus::Allocable);
        assert_eq!(engine.feasible_agents(0), vec![0, 1]);

        engine.clear_feasible();
        assert_eq!(engine.task_status(0), TaskStatus::NotCompleted);
        assert!(engine.feasible_agents(0).is_empty());
    }

    #[test]
    fn test_busy_agents_are_not_reallocated() {
        let mut engine = scenario();
        engine.allocate(0, &[(0, 3)]);
        assert_eq!(engine.allocate(0, &[(0, 3), (1, 6)]), 1);
        assert_eq!(engine.busy_agent_count(), 2);
        assert!(engine.is_consistent());
    }
}
