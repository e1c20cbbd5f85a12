// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Ian Philip Eglin
//! CFSTP problem state: tasks, agents, demands, locations, speeds, coalition
//! values and the dynamism schedule.

use super::location::Location;
use super::types::{AgentId, Demand, TaskId};
use super::value::CoalitionValues;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Percentages of the horizon during which agents leave
const AGENTS_DECREASE_WINDOW: (i32, i32) = (15, 70);
/// Percentage of the horizon during which tasks keep appearing
const TASKS_INCREASE_END: i32 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DynamismKind {
    #[default]
    Static,
    /// Agents are disabled one by one during the middle of the horizon
    AgentsDecrease,
    /// Tasks start disabled and are enabled during the first half of the horizon
    TasksIncrease,
}

/// What changed in one call of [`Problem::advance_dynamism`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DynamismChange {
    pub disabled_agents: Vec<usize>,
    pub enabled_tasks: Vec<usize>,
}

impl DynamismChange {
    pub fn is_empty(&self) -> bool {
        self.disabled_agents.is_empty() && self.enabled_tasks.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct Problem {
    agents: Vec<AgentId>,
    tasks: Vec<TaskId>,
    initial_agent_locations: Vec<Location>,
    task_locations: Vec<Location>,
    demands: Vec<Demand>,
    speeds: Vec<f32>,
    values: CoalitionValues,
    dynamism: DynamismKind,
    agent_enabled: Vec<bool>,
    task_enabled: Vec<bool>,
    max_deadline: i32,
    min_deadline: i32,
    max_workload: i32,
    min_workload: i32,
}

impl Problem {
    /// Build and validate a static problem with unit speeds.
    pub fn new(
        agents: Vec<AgentId>,
        tasks: Vec<TaskId>,
        initial_agent_locations: Vec<Location>,
        task_locations: Vec<Location>,
        demands: Vec<Demand>,
        values: CoalitionValues,
    ) -> Result<Self> {
        if initial_agent_locations.len() != agents.len() {
            return Err(Error::DimensionMismatch(format!(
                "{} agents but {} agent locations",
                agents.len(),
                initial_agent_locations.len()
            )));
        }
        if task_locations.len() != tasks.len() || demands.len() != tasks.len() {
            return Err(Error::DimensionMismatch(format!(
                "{} tasks, {} task locations, {} demands",
                tasks.len(),
                task_locations.len(),
                demands.len()
            )));
        }
        for (task, demand) in demands.iter().enumerate() {
            if !demand.is_valid() {
                return Err(Error::InvalidDemand {
                    task,
                    deadline: demand.deadline,
                    workload: demand.workload,
                });
            }
        }
        let mut locations = initial_agent_locations.iter().chain(task_locations.iter());
        if let Some(first) = locations.next() {
            if let Some(other) = locations.find(|l| !l.same_kind(first)) {
                return Err(Error::LocationMismatch(first.kind(), other.kind()));
            }
        }

        let max_deadline = demands.iter().map(|d| d.deadline).max().unwrap_or(0);
        let min_deadline = demands.iter().map(|d| d.deadline).min().unwrap_or(0);
        let max_workload = demands.iter().map(|d| d.workload).max().unwrap_or(0);
        let min_workload = demands.iter().map(|d| d.workload).min().unwrap_or(0);

        Ok(Self {
            speeds: vec![1.0; agents.len()],
            agent_enabled: vec![true; agents.len()],
            task_enabled: vec![true; tasks.len()],
            agents,
            tasks,
            initial_agent_locations,
            task_locations,
            demands,
            values,
            dynamism: DynamismKind::Static,
            max_deadline,
            min_deadline,
            max_workload,
            min_workload,
        })
    }

    pub fn with_speeds(mut self, speeds: Vec<f32>) -> Result<Self> {
        if speeds.len() != self.agents.len() {
            return Err(Error::DimensionMismatch(format!(
                "{} agents but {} speeds",
                self.agents.len(),
                speeds.len()
            )));
        }
        if let Some((agent, speed)) = speeds
            .iter()
            .enumerate()
            .find(|(_, s)| !(s.is_finite() && **s > 0.0))
        {
            return Err(Error::InvalidSpeed {
                agent,
                speed: *speed,
            });
        }
        self.speeds = speeds;
        Ok(self)
    }

    pub fn with_dynamism(mut self, dynamism: DynamismKind) -> Self {
        self.dynamism = dynamism;
        self.agent_enabled = vec![true; self.agents.len()];
        self.task_enabled = vec![dynamism != DynamismKind::TasksIncrease; self.tasks.len()];
        self
    }

    pub fn agent_count(&self) -> usize {
        self.agents.len()
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    pub fn agent_id(&self, agent: usize) -> AgentId {
        self.agents[agent]
    }

    pub fn task_id(&self, task: usize) -> TaskId {
        self.tasks[task]
    }

    pub fn initial_agent_location(&self, agent: usize) -> &Location {
        &self.initial_agent_locations[agent]
    }

    pub fn task_location(&self, task: usize) -> &Location {
        &self.task_locations[task]
    }

    pub fn demand(&self, task: usize) -> Demand {
        self.demands[task]
    }

    pub fn deadline(&self, task: usize) -> i32 {
        self.demands[task].deadline
    }

    pub fn workload(&self, task: usize) -> i32 {
        self.demands[task].workload
    }

    pub fn agent_speed(&self, agent: usize) -> f32 {
        self.speeds[agent]
    }

    pub fn values(&self) -> &CoalitionValues {
        &self.values
    }

    pub fn dynamism(&self) -> DynamismKind {
        self.dynamism
    }

    pub fn is_dynamic(&self) -> bool {
        self.dynamism != DynamismKind::Static
    }

    pub fn max_deadline(&self) -> i32 {
        self.max_deadline
    }

    pub fn min_deadline(&self) -> i32 {
        self.min_deadline
    }

    pub fn max_workload(&self) -> i32 {
        self.max_workload
    }

    pub fn min_workload(&self) -> i32 {
        self.min_workload
    }

    pub fn is_agent_enabled(&self, agent: usize) -> bool {
        self.agent_enabled[agent]
    }

    pub fn is_task_enabled(&self, task: usize) -> bool {
        self.task_enabled[task]
    }

    pub fn enabled_agent_count(&self) -> usize {
        self.agent_enabled.iter().filter(|e| **e).count()
    }

    pub fn enabled_task_count(&self) -> usize {
        self.task_enabled.iter().filter(|e| **e).count()
    }

    /// Travel time between two locations at the given speed
    pub fn travel_time(&self, from: &Location, to: &Location, speed: f32) -> Result<i32> {
        from.travel_time(to, speed)
    }

    /// Probability that an urgent value model perturbs `task`: earlier deadlines
    /// are more urgent.
    pub fn urgency(&self, task: usize) -> f32 {
        1.0 - self.demands[task].deadline as f32 / (self.max_deadline + 1) as f32
    }

    /// Work per tick of `coalition` (agent indices) on `task`
    pub fn coalition_value(&self, task: usize, coalition: &[usize]) -> f32 {
        self.values.value(task, coalition, self.urgency(task))
    }

    /// Apply the dynamism schedule for tick `time`.
    pub fn advance_dynamism(&mut self, time: i32) -> DynamismChange {
        let mut change = DynamismChange::default();
        let horizon = self.max_deadline;
        match self.dynamism {
            DynamismKind::Static => {}
            DynamismKind::AgentsDecrease => {
                let count = self.agents.len() as i32;
                let (from, to) = AGENTS_DECREASE_WINDOW;
                let outside = time * 100 < from * horizon || time * 100 > to * horizon;
                if horizon <= 0 || count == 0 || outside {
                    return change;
                }
                let step = (horizon + count - 1) / count;
                let start = (from * horizon + 99) / 100;
                if (time - start) % step != 0 {
                    return change;
                }
                if let Some(agent) = self.agent_enabled.iter().position(|e| *e) {
                    self.agent_enabled[agent] = false;
                    change.disabled_agents.push(agent);
                }
            }
            DynamismKind::TasksIncrease => {
                if time * 100 > TASKS_INCREASE_END * horizon {
                    return change;
                }
                let count = self.tasks.len();
                let batch = if horizon <= 1 {
                    count
                } else {
                    count.div_ceil((horizon / 2) as usize)
                };
                let pending: Vec<usize> = (0..count)
                    .filter(|t| !self.task_enabled[*t])
                    .take(batch)
                    .collect();
                for task in pending {
                    self.task_enabled[task] = true;
                    change.enabled_tasks.push(task);
                }
            }
        }
        change
    }
}
