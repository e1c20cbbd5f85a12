// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Ian Philip Eglin
//! Factor graph of one Max-Sum tick, ordered as a DAG over agent indexes

use super::function::FunctionNode;
use super::variable::VariableNode;
use crate::solver::engine::Engine;
use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// Direction of a factor graph edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EdgeKind {
    VariableToFunction,
    FunctionToVariable,
}

impl EdgeKind {
    pub fn flipped(self) -> Self {
        match self {
            Self::VariableToFunction => Self::FunctionToVariable,
            Self::FunctionToVariable => Self::VariableToFunction,
        }
    }
}

/// Edge between the variable of `agent` and the function of `task`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Edge {
    pub agent: usize,
    pub task: usize,
    pub kind: EdgeKind,
}

impl Edge {
    /// Direction of the edge in an ascending pass, or flipped in a descending one
    pub fn direction(&self, descending: bool) -> EdgeKind {
        if descending { self.kind.flipped() } else { self.kind }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Node {
    Variable(usize),
    Function(usize),
}

#[derive(Debug, Clone)]
pub struct FactorGraph {
    pub variables: BTreeMap<usize, VariableNode>,
    pub functions: BTreeMap<usize, FunctionNode>,
    edges: Vec<Edge>,
}

impl FactorGraph {
    /// Build the graph from free agents and their (task, arrival) domains.
    /// Agents with an empty domain get no variable node.
    pub fn new(domains: Vec<(usize, Vec<(usize, i32)>)>, engine: &Engine) -> Self {
        let mut scopes: BTreeMap<usize, Vec<(usize, i32)>> = BTreeMap::new();
        for (agent, domain) in &domains {
            for &(task, arrival) in domain {
                scopes.entry(task).or_default().push((*agent, arrival));
            }
        }

        let mut edges = Vec::new();
        let mut variables = BTreeMap::new();
        for (agent, domain) in domains {
            for &(task, _) in &domain {
                let has_later_agent = scopes
                    .get(&task)
                    .is_some_and(|scope| scope.iter().any(|(other, _)| *other > agent));
                let kind = if has_later_agent {
                    EdgeKind::VariableToFunction
                } else {
                    EdgeKind::FunctionToVariable
                };
                edges.push(Edge { agent, task, kind });
            }
            if let Some(node) = VariableNode::new(agent, domain) {
                variables.insert(agent, node);
            }
        }
        edges.sort_by_key(|e| (e.agent, e.task));

        let functions = scopes
            .into_iter()
            .map(|(task, mut scope)| {
                scope.sort_by_key(|(agent, _)| *agent);
                let node = FunctionNode::new(
                    task,
                    scope,
                    engine.committed_members(task),
                    engine.residual(task),
                );
                (task, node)
            })
            .collect();

        Self {
            variables,
            functions,
            edges,
        }
    }

    /// Edges ordered by (agent, task)
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    /// Check that the oriented edges contain no directed cycle
    pub fn is_acyclic(&self) -> bool {
        let mut out: BTreeMap<Node, Vec<Node>> = BTreeMap::new();
        let mut in_degree: BTreeMap<Node, usize> = BTreeMap::new();
        for edge in &self.edges {
            let (from, to) = match edge.kind {
                EdgeKind::VariableToFunction => {
                    (Node::Variable(edge.agent), Node::Function(edge.task))
                }
                EdgeKind::FunctionToVariable => {
                    (Node::Function(edge.task), Node::Variable(edge.agent))
                }
            };
            out.entry(from).or_default().push(to);
            in_degree.entry(from).or_default();
            *in_degree.entry(to).or_default() += 1;
        }

        let mut ready: VecDeque<Node> = in_degree
            .iter()
            .filter(|(_, d)| **d == 0)
            .map(|(n, _)| *n)
            .collect();
        let mut visited = BTreeSet::new();
        while let Some(node) = ready.pop_front() {
            visited.insert(node);
            for next in out.get(&node).into_iter().flatten() {
                if let Some(d) = in_degree.get_mut(next) {
                    *d -= 1;
                    if *d == 0 {
                        ready.push_back(*next);
                    }
                }
            }
        }
        visited.len() == in_degree.len()
    }

    /// Final choice of every variable grouped by task, members in agent order
    pub fn coalitions(&self) -> BTreeMap<usize, Vec<(usize, i32)>> {
        let mut coalitions: BTreeMap<usize, Vec<(usize, i32)>> = BTreeMap::new();
        for variable in self.variables.values() {
            let task = variable.assignment();
            if let Some(arrival) = variable.arrival(task) {
                coalitions
                    .entry(task)
                    .or_default()
                    .push((variable.agent, arrival));
            }
        }
        coalitions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AgentId, CoalitionValues, Demand, Location, Problem, TaskId};

    fn engine() -> Engine {
        let problem = Problem::new(
            (0..3).map(AgentId).collect(),
            (0..3).map(TaskId).collect(),
            vec![
                Location::euclidean(0, 0),
                Location::euclidean(3, 0),
                Location::euclidean(6, 0),
            ],
            vec![
                Location::euclidean(1, 1),
                Location::euclidean(4, 1),
                Location::euclidean(50, 50),
            ],
            vec![Demand::new(20, 4), Demand::new(20, 4), Demand::new(20, 4)],
            CoalitionValues::constant(1.0, 3),
        )
        .unwrap();
        Engine::new(problem)
    }

    fn domains(engine: &Engine) -> Vec<(usize, Vec<(usize, i32)>)> {
        engine
            .free_agents()
            .into_iter()
            .map(|a| (a, engine.free_agent_domain(a).unwrap()))
            .collect()
    }

    #[test]
    fn test_one_edge_per_reachable_pair() {
        let engine = engine();
        let domains = domains(&engine);
        let graph = FactorGraph::new(domains.clone(), &engine);

        let pairs: usize = domains.iter().map(|(_, d)| d.len()).sum();
        assert_eq!(graph.edges().len(), pairs);
        let unique: BTreeSet<(usize, usize)> =
            graph.edges().iter().map(|e| (e.agent, e.task)).collect();
        assert_eq!(unique.len(), pairs);
        // task 2 is out of reach
        assert!(!graph.functions.contains_key(&2));
        assert_eq!(graph.variables.len(), 3);
    }

    #[test]
    fn test_edge_orientation_and_order() {
        let engine = engine();
        let graph = FactorGraph::new(domains(&engine), &engine);

        let edges = graph.edges();
        assert!(edges.windows(2).all(|w| (w[0].agent, w[0].task) < (w[1].agent, w[1].task)));
        for edge in edges {
            let expected = if edge.agent < 2 {
                EdgeKind::VariableToFunction
            } else {
                EdgeKind::FunctionToVariable
            };
            assert_eq!(edge.kind, expected);
            assert_eq!(edge.direction(true), expected.flipped());
        }
        assert!(graph.is_acyclic());
    }

    #[test]
    fn test_cycle_is_detected() {
        let engine = engine();
        let mut graph = FactorGraph::new(domains(&engine), &engine);
        // var 0 -> task 0 -> var 1 -> task 1 -> var 0
        graph.edges = vec![
            Edge { agent: 0, task: 0, kind: EdgeKind::VariableToFunction },
            Edge { agent: 0, task: 1, kind: EdgeKind::FunctionToVariable },
            Edge { agent: 1, task: 0, kind: EdgeKind::FunctionToVariable },
            Edge { agent: 1, task: 1, kind: EdgeKind::VariableToFunction },
        ];
        assert!(!graph.is_acyclic());
    }
}
