// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Ian Philip Eglin
use super::variable::VariableNode;
use crate::model::Problem;
use crate::solver::combinations::subsets_by_size;
use crate::solver::temporal::completion_time;
use std::collections::BTreeMap;

/// Constraint of one task over the agents able to reach it.
///
/// R messages are binary (Fast Max-Sum): slot 0 is the cost seen by an agent
/// that does not pick this task, slot 1 the cost if it does.
#[derive(Debug, Clone)]
pub struct FunctionNode {
    pub task: usize,
    /// Agents in ascending order with their arrival ticks
    scope: Vec<(usize, i32)>,
    /// Agents already reaching or working on the task
    committed: Vec<(usize, i32)>,
    residual: f64,
    r: BTreeMap<usize, [f64; 2]>,
    /// Whether an agent committed to this task during value propagation
    commitments: BTreeMap<usize, bool>,
}

impl FunctionNode {
    pub fn new(
        task: usize,
        scope: Vec<(usize, i32)>,
        committed: Vec<(usize, i32)>,
        residual: f64,
    ) -> Self {
        let r = scope.iter().map(|(agent, _)| (*agent, [0.0, 0.0])).collect();
        Self {
            task,
            scope,
            committed,
            residual,
            r,
            commitments: BTreeMap::new(),
        }
    }

    pub fn scope(&self) -> &[(usize, i32)] {
        &self.scope
    }

    pub fn in_scope(&self, agent: usize) -> bool {
        self.r.contains_key(&agent)
    }

    /// Last R message to `agent`
    pub fn r(&self, agent: usize, assigned: bool) -> f64 {
        self.r.get(&agent).map_or(0.0, |slots| slots[usize::from(assigned)])
    }

    pub fn record_commitment(&mut self, agent: usize, assigned: bool) {
        self.commitments.insert(agent, assigned);
    }

    fn is_consistent(&self, subset: &[(usize, i32)], receiver: usize) -> bool {
        self.commitments
            .iter()
            .filter(|(agent, _)| **agent != receiver)
            .all(|(agent, assigned)| subset.iter().any(|(a, _)| a == agent) == *assigned)
    }

    fn completion(&self, problem: &Problem, subset: &[(usize, i32)]) -> f64 {
        let mut members = self.committed.clone();
        members.extend_from_slice(subset);
        completion_time(problem, self.task, self.residual, &members).cost()
    }

    /// Recompute the R message to `receiver`. Returns the constraint checks spent.
    pub fn send_r(
        &mut self,
        receiver: usize,
        problem: &Problem,
        variables: &BTreeMap<usize, VariableNode>,
        max_size: usize,
        value_propagation: bool,
    ) -> u64 {
        if !self.in_scope(receiver) {
            return 0;
        }

        let mut slots = [0.0, f64::INFINITY];
        let mut checks = 0;
        for subset in subsets_by_size(&self.scope, max_size) {
            if value_propagation && !self.is_consistent(&subset, receiver) {
                continue;
            }
            checks += 1;

            let completion = self.completion(problem, &subset);
            let sigma = subset
                .iter()
                .filter(|(agent, _)| *agent != receiver)
                .map(|(agent, _)| variables.get(agent).map_or(0.0, |v| v.q(self.task, self.task)))
                .fold(completion, |acc, q| acc + q);

            let assigned = subset.iter().any(|(agent, _)| *agent == receiver);
            let slot = &mut slots[usize::from(assigned)];
            if sigma < *slot {
                *slot = sigma;
            }
            if value_propagation && assigned && completion.is_finite() {
                break;
            }
        }

        self.r.insert(receiver, slots);
        checks
    }
}
