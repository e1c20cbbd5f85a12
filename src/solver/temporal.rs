// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Ian Philip Eglin
//! Temporal constraint check: can a coalition whose members arrive at
//! different ticks finish a task's residual workload by its deadline?
//!
//! An agent arriving at tick `t` contributes from tick `t + 1` on. Between two
//! consecutive arrival ticks the agents arrived so far work together at the rate
//! given by their coalition value.
//!
//! Leftover work within [`work_tolerance`] of zero counts as done, here and in
//! [`Engine::progress_tasks`](super::engine::Engine::progress_tasks), so a plan
//! and its execution finish on the same tick.

use crate::model::Problem;

/// Share of a task's workload that may be left over when it counts as done
const WORK_TOLERANCE: f64 = 1e-6;

/// Leftover work at or below which a task with `workload` is completed
pub fn work_tolerance(workload: i32) -> f64 {
    WORK_TOLERANCE * workload.max(1) as f64
}

/// Result of [`completion_time`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TemporalCheck {
    /// Tick at which the residual workload is covered, if before the deadline
    pub completion: Option<i32>,
    /// Number of constraint checks spent
    pub checks: u64,
}

impl TemporalCheck {
    pub fn is_feasible(&self) -> bool {
        self.completion.is_some()
    }

    /// Completion tick as a cost, infinite when infeasible
    pub fn cost(&self) -> f64 {
        self.completion.map_or(f64::INFINITY, |c| c as f64)
    }
}

/// Completion tick of `members` (agent, arrival tick) on `task`.
pub fn completion_time(
    problem: &Problem,
    task: usize,
    residual: f64,
    members: &[(usize, i32)],
) -> TemporalCheck {
    let mut check = TemporalCheck {
        completion: None,
        checks: 0,
    };
    if members.is_empty() {
        return check;
    }

    let mut sorted = members.to_vec();
    sorted.sort_by_key(|(agent, arrival)| (*arrival, *agent));

    let tolerance = work_tolerance(problem.workload(task));
    if residual <= tolerance {
        check.completion = Some(sorted[0].1);
        return check;
    }

    let deadline = problem.deadline(task);
    let mut done = 0.0_f64;
    let mut active: Vec<usize> = Vec::with_capacity(sorted.len());
    let mut i = 0;

    while i < sorted.len() {
        let start = sorted[i].1;
        while i < sorted.len() && sorted[i].1 == start {
            active.push(sorted[i].0);
            i += 1;
        }
        if start >= deadline {
            break;
        }
        let end = sorted.get(i).map_or(deadline, |(_, next)| (*next).min(deadline));
        let span = end - start;

        check.checks += 1;
        let rate = problem.coalition_value(task, &active) as f64;
        if rate <= 0.0 {
            continue;
        }

        let ticks = ((residual - done - tolerance) / rate).ceil().max(1.0);
        if ticks <= span as f64 {
            check.completion = Some(start + ticks as i32);
            return check;
        }
        done += rate * span as f64;
    }

    check
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AgentId, CoalitionValueModel, CoalitionValues, Demand, Location, TaskId};

    fn single_task_problem(deadline: i32, workload: i32, model: CoalitionValueModel) -> Problem {
        Problem::new(
            vec![AgentId(0), AgentId(1), AgentId(2)],
            vec![TaskId(0)],
            vec![Location::euclidean(0, 0); 3],
            vec![Location::euclidean(0, 3)],
            vec![Demand::new(deadline, workload)],
            CoalitionValues::new(model, 3, 0),
        )
        .unwrap()
    }

    #[test]
    fn test_single_agent_completion() {
        let problem = single_task_problem(10, 6, CoalitionValueModel::Constant { value: 2.0 });
        let check = completion_time(&problem, 0, 6.0, &[(0, 3)]);
        assert_eq!(check.completion, Some(6));
        assert_eq!(check.checks, 1);
    }

    #[test]
    fn test_staggered_arrivals_accumulate_work() {
        // one agent alone for 2 ticks (2 work), then both at rate 2
        let problem = single_task_problem(10, 6, CoalitionValueModel::Linear { per_size: None });
        let check = completion_time(&problem, 0, 6.0, &[(1, 4), (0, 2)]);
        assert_eq!(check.completion, Some(6));
        assert_eq!(check.checks, 2);
    }

    #[test]
    fn test_deadline_bounds_the_schedule() {
        let problem = single_task_problem(5, 6, CoalitionValueModel::Constant { value: 2.0 });
        assert_eq!(completion_time(&problem, 0, 6.0, &[(0, 3)]).completion, None);
        assert_eq!(completion_time(&problem, 0, 6.0, &[(0, 5)]).completion, None);
        assert_eq!(completion_time(&problem, 0, 4.0, &[(0, 3)]).completion, Some(5));
    }

    #[test]
    fn test_zero_rate_makes_no_progress() {
        let problem = single_task_problem(10, 6, CoalitionValueModel::Constant { value: 0.0 });
        let check = completion_time(&problem, 0, 6.0, &[(0, 1), (1, 2)]);
        assert!(!check.is_feasible());
        assert_eq!(check.cost(), f64::INFINITY);
        assert_eq!(check.checks, 2);
    }

    #[test]
    fn test_fractional_rates_finish_on_the_exact_tick() {
        // 7 / 0.7 is 10 ticks even though 0.7 is not exact in binary
        let problem = single_task_problem(11, 7, CoalitionValueModel::Constant { value: 0.7 });
        assert_eq!(completion_time(&problem, 0, 7.0, &[(0, 1)]).completion, Some(11));

        let problem = single_task_problem(11, 3, CoalitionValueModel::Constant { value: 0.3 });
        assert_eq!(completion_time(&problem, 0, 3.0, &[(0, 1)]).completion, Some(11));
        assert_eq!(completion_time(&problem, 0, 3.0, &[(0, 2)]).completion, None);
    }

    #[test]
    fn test_empty_coalition_is_infeasible() {
        let problem = single_task_problem(10, 6, CoalitionValueModel::Constant { value: 2.0 });
        let check = completion_time(&problem, 0, 6.0, &[]);
        assert!(!check.is_feasible());
        assert_eq!(check.checks, 0);
    }
}
