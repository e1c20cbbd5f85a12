// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Ian Philip Eglin
//! Coalition value models
//!
//! A coalition value is the amount of workload a set of agents completes on a
//! task in one tick. Values are memoised per task and per canonical (sorted)
//! coalition, so a model with random perturbations stays consistent for the
//! lifetime of a problem.

use crate::error::{Error, Result};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal as NormalDist};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::HashMap;

/// Probability that an entry of a modified table gets an extra bonus
const BONUS_PROBABILITY: f64 = 0.2;
const BONUS_MAX: f32 = 50.0;

/// Which random perturbations an agent-based or NDCS model applies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Perturbation {
    /// Larger coalitions are more likely to lose value
    pub congested: bool,
    /// Tasks with earlier deadlines are more likely to lose value
    pub urgent: bool,
}

impl Perturbation {
    pub fn is_none(&self) -> bool {
        !self.congested && !self.urgent
    }
}

/// Coalition value model with its parameter table.
///
/// Per-size tables are indexed by `|C| - 1`; coalitions larger than the table use
/// the last entry. The empty coalition is always worth 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum CoalitionValueModel {
    Constant {
        value: f32,
    },
    /// `|C|` when `per_size` is absent, otherwise a perturbed linear table
    Linear {
        #[serde(default)]
        per_size: Option<Vec<f32>>,
    },
    Uniform {
        per_size: Vec<f32>,
    },
    Normal {
        per_size: Vec<f32>,
    },
    /// Sum of the members' individual performance
    AgentBased {
        performance: Vec<f32>,
        #[serde(default)]
        perturbation: Perturbation,
    },
    /// Normally distributed coalition structures
    Ndcs {
        per_size: Vec<f32>,
        #[serde(default)]
        perturbation: Perturbation,
    },
}

/// Generator families for [`CoalitionValueModel::generate`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueModelKind {
    Constant,
    #[default]
    Superadditive,
    LinearPerturbed,
    Uniform,
    ModifiedUniform,
    Normal,
    ModifiedNormal,
    AgentBased,
    CongestedAgentBased,
    UrgentAgentBased,
    UrgentCongestedAgentBased,
    Ndcs,
    CongestedNdcs,
    UrgentNdcs,
    UrgentCongestedNdcs,
}

impl ValueModelKind {
    fn perturbation(&self) -> Perturbation {
        use ValueModelKind::*;
        match self {
            CongestedAgentBased | CongestedNdcs => Perturbation {
                congested: true,
                urgent: false,
            },
            UrgentAgentBased | UrgentNdcs => Perturbation {
                congested: false,
                urgent: true,
            },
            UrgentCongestedAgentBased | UrgentCongestedNdcs => Perturbation {
                congested: true,
                urgent: true,
            },
            _ => Perturbation::default(),
        }
    }
}

fn normal(mean: f32, std_dev: f32) -> Result<NormalDist<f32>> {
    NormalDist::new(mean, std_dev).map_err(|e| Error::ConfigurationError(e.to_string()))
}

fn lookup(table: &[f32], size: usize) -> f32 {
    table
        .get(size - 1)
        .or(table.last())
        .copied()
        .unwrap_or(0.0)
}

impl CoalitionValueModel {
    /// Draw a model of the given family for `agent_count` agents
    pub fn generate<R: Rng + ?Sized>(
        kind: ValueModelKind,
        agent_count: usize,
        rng: &mut R,
    ) -> Result<Self> {
        use ValueModelKind::*;
        let sizes = 1..=agent_count;
        let model = match kind {
            Constant => Self::Constant { value: 1.0 },
            Superadditive => Self::Linear { per_size: None },
            LinearPerturbed => Self::Linear {
                per_size: Some(
                    sizes
                        .map(|n| n as f32 * rng.random_range(1.0..=2.0))
                        .collect(),
                ),
            },
            Uniform => Self::Uniform {
                per_size: sizes.map(|n| rng.random_range(0.0..=n as f32)).collect(),
            },
            ModifiedUniform => Self::Uniform {
                per_size: sizes
                    .map(|n| {
                        let base = rng.random_range(0.0..=10.0 * n as f32);
                        base + bonus(rng)
                    })
                    .collect(),
            },
            Normal | ModifiedNormal => {
                let mut per_size = Vec::with_capacity(agent_count);
                for n in sizes {
                    let mut value = normal(10.0 * n as f32, 0.1)?.sample(rng).abs();
                    if kind == ModifiedNormal {
                        value += bonus(rng);
                    }
                    per_size.push(value);
                }
                Self::Normal { per_size }
            }
            AgentBased | CongestedAgentBased | UrgentAgentBased | UrgentCongestedAgentBased => {
                Self::AgentBased {
                    performance: (0..agent_count)
                        .map(|_| {
                            let spread = rng.random_range(0.0..=10.0_f32);
                            rng.random_range(0.0..=2.0 * spread)
                        })
                        .collect(),
                    perturbation: kind.perturbation(),
                }
            }
            Ndcs | CongestedNdcs | UrgentNdcs | UrgentCongestedNdcs => {
                let mut per_size = Vec::with_capacity(agent_count);
                for n in sizes {
                    let mean = n as f32;
                    per_size.push(normal(mean, mean.powf(0.25))?.sample(rng).abs());
                }
                Self::Ndcs {
                    per_size,
                    perturbation: kind.perturbation(),
                }
            }
        };
        Ok(model)
    }

    pub fn perturbation(&self) -> Perturbation {
        match self {
            Self::AgentBased { perturbation, .. } | Self::Ndcs { perturbation, .. } => {
                *perturbation
            }
            _ => Perturbation::default(),
        }
    }

    /// Value of a coalition before perturbations
    pub fn base_value(&self, coalition: &[usize]) -> f32 {
        let size = coalition.len();
        if size == 0 {
            return 0.0;
        }
        match self {
            Self::Constant { value } => *value,
            Self::Linear { per_size: None } => size as f32,
            Self::Linear {
                per_size: Some(table),
            }
            | Self::Uniform { per_size: table }
            | Self::Normal { per_size: table }
            | Self::Ndcs {
                per_size: table, ..
            } => lookup(table, size),
            Self::AgentBased { performance, .. } => coalition
                .iter()
                .map(|agent| performance.get(*agent).copied().unwrap_or(0.0))
                .sum(),
        }
    }
}

fn bonus<R: Rng + ?Sized>(rng: &mut R) -> f32 {
    if rng.random_bool(BONUS_PROBABILITY) {
        rng.random_range(0.0..=BONUS_MAX)
    } else {
        0.0
    }
}

/// Canonical cache key: task index and sorted agent indices
pub type CoalitionKey = (u32, Box<[u32]>);

/// Memoising coalition value table.
///
/// Cloning copies the cache and the perturbation generator, so a clone answers
/// every query exactly as the cloned table would from that point on.
#[derive(Debug, Clone)]
pub struct CoalitionValues {
    model: CoalitionValueModel,
    agent_count: usize,
    cache: RefCell<HashMap<CoalitionKey, f32>>,
    rng: RefCell<ChaCha8Rng>,
}

impl CoalitionValues {
    pub fn new(model: CoalitionValueModel, agent_count: usize, seed: u64) -> Self {
        Self {
            model,
            agent_count,
            cache: RefCell::new(HashMap::new()),
            rng: RefCell::new(ChaCha8Rng::seed_from_u64(seed)),
        }
    }

    pub fn constant(value: f32, agent_count: usize) -> Self {
        Self::new(CoalitionValueModel::Constant { value }, agent_count, 0)
    }

    pub fn model(&self) -> &CoalitionValueModel {
        &self.model
    }

    pub fn cached_len(&self) -> usize {
        self.cache.borrow().len()
    }

    /// Work per tick of `coalition` on `task`.
    ///
    /// `urgency` is the probability in `[0, 1]` that an urgent model perturbs
    /// this task's values.
    pub fn value(&self, task: usize, coalition: &[usize], urgency: f32) -> f32 {
        if coalition.is_empty() {
            return 0.0;
        }
        let mut agents: Vec<u32> = coalition.iter().map(|a| *a as u32).collect();
        agents.sort_unstable();
        let key: CoalitionKey = (task as u32, agents.into_boxed_slice());

        if let Some(value) = self.cache.borrow().get(&key) {
            return *value;
        }

        let base = self.model.base_value(coalition);
        let value = self.perturb(base, coalition.len(), urgency).max(0.0);
        self.cache.borrow_mut().insert(key, value);
        value
    }

    fn perturb(&self, base: f32, size: usize, urgency: f32) -> f32 {
        let perturbation = self.model.perturbation();
        if perturbation.is_none() || base <= 0.0 {
            return base;
        }

        let mut rng = self.rng.borrow_mut();
        let mut value = base;
        let congestion = size as f32 / (self.agent_count + 1) as f32;
        if perturbation.congested && rng.random::<f32>() < congestion {
            value -= rng.random_range(base / 10.0..=base / 4.0);
        }
        if perturbation.urgent && rng.random::<f32>() < urgency {
            value -= rng.random_range(base / 10.0..=base / 4.0);
        }
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_superadditive_and_empty() {
        let values = CoalitionValues::new(CoalitionValueModel::Linear { per_size: None }, 4, 0);
        assert_eq!(values.value(0, &[], 0.0), 0.0);
        assert_eq!(values.value(0, &[2], 0.0), 1.0);
        assert_eq!(values.value(0, &[3, 1, 0], 0.0), 3.0);
    }

    #[test]
    fn test_per_size_lookup_uses_last_entry_past_table() {
        let model = CoalitionValueModel::Uniform {
            per_size: vec![0.5, 1.5],
        };
        assert_eq!(model.base_value(&[0]), 0.5);
        assert_eq!(model.base_value(&[0, 1]), 1.5);
        assert_eq!(model.base_value(&[0, 1, 2, 3]), 1.5);
    }

    #[test]
    fn test_agent_based_sums_performance() {
        let model = CoalitionValueModel::AgentBased {
            performance: vec![1.0, 2.5, 4.0],
            perturbation: Perturbation::default(),
        };
        assert_eq!(model.base_value(&[0, 2]), 5.0);
    }

    #[test]
    fn test_values_are_memoised_per_canonical_key() {
        let model = CoalitionValueModel::generate(
            ValueModelKind::UrgentCongestedAgentBased,
            6,
            &mut ChaCha8Rng::seed_from_u64(3),
        )
        .unwrap();
        let values = CoalitionValues::new(model, 6, 11);

        let first = values.value(2, &[4, 1, 3], 0.9);
        let again = values.value(2, &[3, 4, 1], 0.9);
        assert_eq!(first, again);
        assert_eq!(values.cached_len(), 1);
        assert!(first >= 0.0);
    }

    #[test]
    fn test_clone_has_independent_cache() {
        let values = CoalitionValues::constant(2.0, 3);
        values.value(0, &[0], 0.0);

        let copy = values.clone();
        copy.value(1, &[0, 1], 0.0);

        assert_eq!(values.cached_len(), 1);
        assert_eq!(copy.cached_len(), 2);
    }

    #[test]
    fn test_generate_tables_have_one_entry_per_size() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        for kind in [
            ValueModelKind::LinearPerturbed,
            ValueModelKind::Uniform,
            ValueModelKind::ModifiedUniform,
            ValueModelKind::Normal,
            ValueModelKind::ModifiedNormal,
            ValueModelKind::Ndcs,
        ] {
            let model = CoalitionValueModel::generate(kind, 5, &mut rng).unwrap();
            let table = match &model {
                CoalitionValueModel::Linear {
                    per_size: Some(table),
                }
                | CoalitionValueModel::Uniform { per_size: table }
                | CoalitionValueModel::Normal { per_size: table }
                | CoalitionValueModel::Ndcs {
                    per_size: table, ..
                } => table,
                other => panic!("unexpected model {other:?} for {kind:?}"),
            };
            assert_eq!(table.len(), 5);
            assert!(table.iter().all(|v| *v >= 0.0));
        }
    }

    #[test]
    fn test_generate_is_deterministic_for_a_seed() {
        let a = CoalitionValueModel::generate(
            ValueModelKind::ModifiedNormal,
            8,
            &mut ChaCha8Rng::seed_from_u64(9),
        )
        .unwrap();
        let b = CoalitionValueModel::generate(
            ValueModelKind::ModifiedNormal,
            8,
            &mut ChaCha8Rng::seed_from_u64(9),
        )
        .unwrap();
        assert_eq!(a, b);
    }
}
