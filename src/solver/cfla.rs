// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Ian Philip Eglin
//! Centralised greedy allocation: CFLA, CFLA+ and EDF.
//!
//! Each tick at most one task is allocated, to its earliest-completion-first
//! (ECF) coalition: the smallest group of free agents able to finish it by its
//! deadline, with the earliest completion among groups of that size. CFLA picks
//! the task whose allocation leaves the most other tasks completable by a
//! one-step look-ahead. EDF walks tasks by deadline instead.

use super::Strategy;
use super::combinations::{combinations, subsets_by_size};
use super::engine::Engine;
use super::temporal::completion_time;
use crate::error::Result;
use crate::model::{Allocation, Location};
use crate::solver_debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CflaConfig {
    /// Largest coalition considered, 0 for no bound
    pub max_coalition_size: usize,
}

impl CflaConfig {
    fn max_size(&self, available: usize) -> usize {
        if self.max_coalition_size == 0 {
            available
        } else {
            self.max_coalition_size.min(available)
        }
    }
}

/// Mark every free agent feasible for every unallocated task it can reach by
/// the deadline.
fn mark_feasible_allocations(engine: &mut Engine) -> Result<()> {
    for agent in engine.free_agents() {
        for task in 0..engine.task_count() {
            if !engine.is_task_unallocated(task) {
                continue;
            }
            if engine.arrival_time(agent, task)? <= engine.problem().deadline(task) {
                engine.mark_feasible(agent, task);
            }
        }
    }
    Ok(())
}

/// Earliest-completion-first coalition of the agents marked feasible for `task`
fn ecf(engine: &Engine, task: usize, config: &CflaConfig) -> Result<Option<Allocation>> {
    let mut feasible = Vec::new();
    for agent in engine.feasible_agents(task) {
        feasible.push((agent, engine.arrival_time(agent, task)?));
    }

    let residual = engine.residual(task);
    for size in 1..=config.max_size(feasible.len()) {
        let mut best: Option<(i32, Vec<(usize, i32)>)> = None;
        for coalition in combinations(&feasible, size) {
            let check = completion_time(engine.problem(), task, residual, &coalition);
            if let Some(completion) = check.completion
                && best.as_ref().is_none_or(|(c, _)| completion < *c)
            {
                best = Some((completion, coalition));
            }
        }
        if let Some((completion_time, coalition)) = best {
            let last_arrival = coalition.iter().map(|(_, a)| *a).max().unwrap_or(engine.time());
            return Ok(Some(Allocation {
                task,
                coalition,
                travel_time: (last_arrival - engine.time()).max(0),
                completion_time,
            }));
        }
    }
    Ok(None)
}

/// Min-max normalisation, 0 when every value is the same
fn normalise(value: i32, min: i32, max: i32) -> f32 {
    if max == min {
        0.0
    } else {
        (value - min) as f32 / (max - min) as f32
    }
}

#[derive(Debug, Clone, Default)]
pub struct Cfla {
    config: CflaConfig,
    improved: bool,
    /// Agents expected free at a tick, with the task they leave from
    releases: BTreeMap<i32, Vec<(usize, usize)>>,
}

impl Cfla {
    pub fn new(config: CflaConfig) -> Self {
        Self {
            config,
            improved: false,
            releases: BTreeMap::new(),
        }
    }

    /// CFLA+: look ahead only at tasks due no earlier, weighted by workload
    pub fn improved(config: CflaConfig) -> Self {
        Self {
            improved: true,
            ..Self::new(config)
        }
    }

    /// Agents available right after `allocation` completes, with the location
    /// they start from.
    fn released_agents(&self, engine: &Engine, allocation: &Allocation) -> Vec<(usize, Location)> {
        let here = engine.problem().task_location(allocation.task);
        let mut agents: Vec<(usize, Location)> =
            allocation.agents().map(|a| (a, *here)).collect();
        let released = self.releases.get(&(allocation.completion_time + 1));
        for &(agent, task) in released.into_iter().flatten() {
            if engine.problem().is_agent_enabled(agent)
                && !agents.iter().any(|(a, _)| *a == agent)
            {
                agents.push((agent, *engine.problem().task_location(task)));
            }
        }
        agents
    }

    /// Score `allocation` by the other tasks that stay completable after it.
    ///
    /// Released agents leave at `completion + 1`; one already on the next
    /// task's location counts as arrived at `completion`.
    fn look_ahead(&self, engine: &Engine, allocation: &Allocation) -> Result<f32> {
        let problem = engine.problem();
        let v = allocation.task;
        let start = allocation.completion_time;
        let released = self.released_agents(engine, allocation);
        let mut degree = 0.0;

        for v2 in 0..engine.task_count() {
            if v2 == v || !engine.is_task_unallocated(v2) {
                continue;
            }
            let deadline = problem.deadline(v2);
            if self.improved && deadline < problem.deadline(v) {
                continue;
            }

            let mut candidates = Vec::new();
            for (agent, from) in &released {
                let to = problem.task_location(v2);
                let travel = problem.travel_time(from, to, problem.agent_speed(*agent))?;
                let arrival = if travel == 0 {
                    start
                } else {
                    start.saturating_add(1 + travel)
                };
                if arrival <= deadline {
                    candidates.push((*agent, arrival));
                }
            }

            let residual = engine.residual(v2);
            let completable = subsets_by_size(&candidates, self.config.max_coalition_size)
                .any(|c| completion_time(problem, v2, residual, &c).is_feasible());
            if completable {
                degree += if self.improved {
                    let workload = problem.workload(v2);
                    2.0 - normalise(workload, problem.min_workload(), problem.max_workload())
                } else {
                    1.0
                };
            }
        }
        Ok(degree)
    }
}

/// Send `allocation` and remember when its agents are released
fn commit(
    engine: &mut Engine,
    allocation: &Allocation,
    releases: Option<&mut BTreeMap<i32, Vec<(usize, usize)>>>,
) {
    solver_debug!(
        "t={} allocating {} to {:?}, completion at {}",
        engine.time(),
        engine.problem().task_id(allocation.task),
        allocation.agents().collect::<Vec<_>>(),
        allocation.completion_time
    );
    engine.allocate(allocation.task, &allocation.coalition);
    if let Some(releases) = releases {
        releases
            .entry(allocation.completion_time + 1)
            .or_default()
            .extend(allocation.agents().map(|a| (a, allocation.task)));
    }
}

impl Strategy for Cfla {
    fn name(&self) -> &'static str {
        if self.improved { "CFLA+" } else { "CFLA" }
    }

    fn decide(&mut self, engine: &mut Engine) -> Result<()> {
        let now = engine.time();
        self.releases.retain(|t, _| *t >= now);
        mark_feasible_allocations(engine)?;

        let mut best: Option<(f32, Allocation)> = None;
        for task in 0..engine.task_count() {
            if !engine.is_task_unallocated(task) {
                continue;
            }
            let Some(allocation) = ecf(engine, task, &self.config)? else {
                continue;
            };
            let degree = self.look_ahead(engine, &allocation)?;
            if best.as_ref().is_none_or(|(d, _)| degree > *d) {
                best = Some((degree, allocation));
            }
        }

        engine.clear_feasible();
        if let Some((_, allocation)) = best {
            commit(engine, &allocation, Some(&mut self.releases));
        }
        Ok(())
    }
}

/// Earliest deadline first, with ECF coalitions
#[derive(Debug, Clone, Default)]
pub struct Edf {
    config: CflaConfig,
    order: Option<Vec<usize>>,
    cursor: usize,
}

impl Edf {
    pub fn new(config: CflaConfig) -> Self {
        Self {
            config,
            order: None,
            cursor: 0,
        }
    }

    /// Next task of the deadline list that is still unallocated. The list is
    /// rebuilt once, from tasks not yet allocated and not yet due, when the
    /// cursor runs past its end.
    fn next_task(&mut self, engine: &Engine) -> Option<usize> {
        let order = self.order.get_or_insert_with(|| {
            let mut tasks: Vec<usize> = (0..engine.task_count()).collect();
            tasks.sort_by_key(|t| engine.problem().deadline(*t));
            tasks
        });

        for rebuilt in [false, true] {
            if rebuilt {
                let now = engine.time();
                order.retain(|t| {
                    engine.task_status(*t).is_unallocated() && engine.problem().deadline(*t) >= now
                });
                self.cursor = 0;
            }
            while self.cursor < order.len() {
                let task = order[self.cursor];
                self.cursor += 1;
                if engine.is_task_unallocated(task) {
                    return Some(task);
                }
            }
        }
        None
    }
}

impl Strategy for Edf {
    fn name(&self) -> &'static str {
        "EDF"
    }

    fn decide(&mut self, engine: &mut Engine) -> Result<()> {
        mark_feasible_allocations(engine)?;
        let allocation = match self.next_task(engine) {
            Some(task) => ecf(engine, task, &self.config)?,
            None => None,
        };
        engine.clear_feasible();
        if let Some(allocation) = allocation {
            commit(engine, &allocation, None);
        }
        Ok(())
    }
}
