// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Ian Philip Eglin
use super::engine::Engine;
use crate::model::Results;

#[macro_export]
macro_rules! solver_info {
    ($($arg:tt)+) => {
        tracing::info!(target: "cfstp", $($arg)+)
    }
}

#[macro_export]
macro_rules! solver_debug {
    ($($arg:tt)+) => {
        tracing::debug!(target: "cfstp", $($arg)+)
    }
}

/// Share of completed tasks, 100 when there are none
pub(crate) fn completion_percentage(part: usize, total: usize) -> f32 {
    if total == 0 {
        100.0
    } else {
        100.0 * part as f32 / total as f32
    }
}

/// Log the progress of a run at the end of a tick
pub fn log_tick_status(engine: &Engine, completed: usize) {
    let problem = engine.problem();
    if problem.is_dynamic() {
        solver_debug!(
            "[time: {:3}, agents: {}, tasks: {}, busy: {}, completed: {:.2}%]",
            engine.time(),
            problem.enabled_agent_count(),
            problem.enabled_task_count(),
            engine.busy_agent_count(),
            completion_percentage(completed, engine.task_count())
        );
    } else {
        solver_debug!(
            "[time: {:3}, busy: {}, completed: {:.2}%]",
            engine.time(),
            engine.busy_agent_count(),
            completion_percentage(completed, engine.task_count())
        );
    }
}

/// Log why a run stopped before every task was completed
pub fn log_stagnation(engine: &Engine) {
    solver_info!(
        "No task can be further allocated, stopping at t={} before the maximum deadline ({})",
        engine.time(),
        engine.problem().max_deadline()
    );
}

/// Log the summary of a finished run
pub fn log_results(results: &Results) {
    solver_info!(
        "{}: completed {}/{} tasks ({:.2}%) in {} ticks",
        results.algorithm,
        results.completed_tasks,
        results.total_tasks,
        results.completed_task_percentage,
        results.ticks
    );
    solver_info!(
        "  avg travel time: {:.2}, avg completion time: {:.2}",
        results.avg_travel_time,
        results.avg_completion_time
    );
    solver_info!(
        "  messages: {}, network load: {} bytes, NCCCs: {}",
        results.messages_sent,
        results.network_load_bytes,
        results.ncccs
    );
}
