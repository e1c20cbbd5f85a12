// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Ian Philip Eglin
use super::function::FunctionNode;
use std::collections::BTreeMap;

/// Decision of one free agent: which task of its domain to move to
#[derive(Debug, Clone)]
pub struct VariableNode {
    pub agent: usize,
    /// Reachable tasks with arrival ticks
    domain: Vec<(usize, i32)>,
    /// Last Q message sent to each function, one entry per domain element
    q: BTreeMap<usize, Vec<f64>>,
    assignment: usize,
}

impl VariableNode {
    /// `None` when the domain is empty
    pub fn new(agent: usize, domain: Vec<(usize, i32)>) -> Option<Self> {
        let assignment = domain.first()?.0;
        let q = domain
            .iter()
            .map(|(task, _)| (*task, vec![0.0; domain.len()]))
            .collect();
        Some(Self {
            agent,
            domain,
            q,
            assignment,
        })
    }

    pub fn domain(&self) -> &[(usize, i32)] {
        &self.domain
    }

    pub fn contains(&self, task: usize) -> bool {
        self.domain.iter().any(|(t, _)| *t == task)
    }

    pub fn arrival(&self, task: usize) -> Option<i32> {
        self.domain.iter().find(|(t, _)| *t == task).map(|(_, a)| *a)
    }

    pub fn assignment(&self) -> usize {
        self.assignment
    }

    /// Last Q message to `function` evaluated at domain value `value`
    pub fn q(&self, function: usize, value: usize) -> f64 {
        let Some(i) = self.domain.iter().position(|(t, _)| *t == value) else {
            return 0.0;
        };
        self.q.get(&function).map_or(0.0, |row| row[i])
    }

    /// Recompute the Q message to `function` from the R messages of every
    /// other function in the domain, normalised to zero mean.
    pub fn send_q(&mut self, function: usize, functions: &BTreeMap<usize, FunctionNode>) {
        let mut row: Vec<f64> = self
            .domain
            .iter()
            .map(|&(value, _)| {
                self.domain
                    .iter()
                    .filter(|(other, _)| *other != function)
                    .map(|&(other, _)| r_message(functions, other, self.agent, value == other))
                    .sum()
            })
            .collect();

        let finite: Vec<f64> = row.iter().copied().filter(|q| q.is_finite()).collect();
        if !finite.is_empty() {
            let alpha = finite.iter().sum::<f64>() / finite.len() as f64;
            for q in row.iter_mut().filter(|q| q.is_finite()) {
                *q -= alpha;
            }
        }
        self.q.insert(function, row);
    }

    /// Pick the domain value with the lowest belief, first on ties
    pub fn compute_assignment(&mut self, functions: &BTreeMap<usize, FunctionNode>) -> usize {
        let mut best: Option<(usize, f64)> = None;
        for &(value, _) in &self.domain {
            let belief: f64 = self
                .domain
                .iter()
                .map(|&(task, _)| r_message(functions, task, self.agent, value == task))
                .sum();
            if best.is_none_or(|(_, b)| belief < b) {
                best = Some((value, belief));
            }
        }
        if let Some((value, _)) = best {
            self.assignment = value;
        }
        self.assignment
    }
}

fn r_message(
    functions: &BTreeMap<usize, FunctionNode>,
    task: usize,
    agent: usize,
    assigned: bool,
) -> f64 {
    functions.get(&task).map_or(0.0, |f| f.r(agent, assigned))
}
