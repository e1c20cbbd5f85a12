// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Ian Philip Eglin
//! Synthetic instance generation and JSON instance files

use super::location::Location;
use super::problem::{DynamismKind, Problem};
use super::types::{AgentId, Demand, TaskId};
use super::value::{CoalitionValueModel, CoalitionValues, ValueModelKind};
use crate::error;
use anyhow::{Context, Result};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeometryKind {
    #[default]
    Euclidean,
    Manhattan,
    LatLng,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InstanceGenParams {
    pub agents: usize,
    /// Tasks per agent; the task count is `ceil(agents * ratio)`
    pub ratio: f32,
    pub geometry: GeometryKind,
    /// Side of the square grid for grid geometries
    pub world_size: Option<i32>,
    pub lat_range: Option<(f64, f64)>,
    pub lon_range: Option<(f64, f64)>,
    pub deadline_range: Option<(i32, i32)>,
    pub workload_range: Option<(i32, i32)>,
    pub speed: Option<f32>,
    pub value_model: ValueModelKind,
    pub dynamism: DynamismKind,
    pub seed: u64,
}

impl Default for InstanceGenParams {
    fn default() -> Self {
        Self {
            agents: 10,
            ratio: 2.0,
            geometry: GeometryKind::default(),
            world_size: None,
            lat_range: None,
            lon_range: None,
            deadline_range: None,
            workload_range: None,
            speed: None,
            value_model: ValueModelKind::default(),
            dynamism: DynamismKind::default(),
            seed: 0,
        }
    }
}

impl InstanceGenParams {
    pub fn task_count(&self) -> usize {
        (self.agents as f32 * self.ratio).ceil() as usize
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRecord {
    pub id: AgentId,
    pub location: Location,
    #[serde(default = "default_speed")]
    pub speed: f32,
}

fn default_speed() -> f32 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: TaskId,
    pub location: Location,
    pub demand: Demand,
}

/// Serialisable description of a problem instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceFile {
    pub agents: Vec<AgentRecord>,
    pub tasks: Vec<TaskRecord>,
    pub value_model: CoalitionValueModel,
    /// Seed of the generator behind value perturbations
    #[serde(default)]
    pub value_seed: u64,
    #[serde(default)]
    pub dynamism: DynamismKind,
}

impl InstanceFile {
    pub fn to_problem(&self) -> error::Result<Problem> {
        let values = CoalitionValues::new(
            self.value_model.clone(),
            self.agents.len(),
            self.value_seed,
        );
        let problem = Problem::new(
            self.agents.iter().map(|a| a.id).collect(),
            self.tasks.iter().map(|t| t.id).collect(),
            self.agents.iter().map(|a| a.location).collect(),
            self.tasks.iter().map(|t| t.location).collect(),
            self.tasks.iter().map(|t| t.demand).collect(),
            values,
        )?;
        Ok(problem
            .with_speeds(self.agents.iter().map(|a| a.speed).collect())?
            .with_dynamism(self.dynamism))
    }
}

fn random_location<R: Rng + ?Sized>(params: &InstanceGenParams, rng: &mut R) -> Location {
    match params.geometry {
        GeometryKind::Euclidean | GeometryKind::Manhattan => {
            let size = params.world_size.unwrap_or(50).max(1);
            let x = rng.random_range(0..size);
            let y = rng.random_range(0..size);
            if params.geometry == GeometryKind::Euclidean {
                Location::euclidean(x, y)
            } else {
                Location::manhattan(x, y)
            }
        }
        GeometryKind::LatLng => {
            let (min_lat, max_lat) = params.lat_range.unwrap_or((51.28, 51.69));
            let (min_lon, max_lon) = params.lon_range.unwrap_or((-0.51, 0.33));
            Location::lat_lng(
                rng.random_range(min_lat..=max_lat),
                rng.random_range(min_lon..=max_lon),
            )
        }
    }
}

pub fn generate_instance(params: &InstanceGenParams) -> error::Result<InstanceFile> {
    let mut rng = ChaCha8Rng::seed_from_u64(params.seed);

    let (min_deadline, max_deadline) = params.deadline_range.unwrap_or((10, 100));
    let (min_workload, max_workload) = params.workload_range.unwrap_or((10, 300));
    let speed = params.speed.unwrap_or(1.0);

    let agents = (0..params.agents)
        .map(|i| AgentRecord {
            id: AgentId(i as u32),
            location: random_location(params, &mut rng),
            speed,
        })
        .collect();

    let tasks = (0..params.task_count())
        .map(|i| TaskRecord {
            id: TaskId(i as u32),
            location: random_location(params, &mut rng),
            demand: Demand::new(
                rng.random_range(min_deadline..=max_deadline),
                rng.random_range(min_workload..=max_workload),
            ),
        })
        .collect();

    let value_model = CoalitionValueModel::generate(params.value_model, params.agents, &mut rng)?;

    Ok(InstanceFile {
        agents,
        tasks,
        value_model,
        value_seed: rng.random(),
        dynamism: params.dynamism,
    })
}

pub fn load_instance(path: &Path) -> Result<InstanceFile> {
    let json = fs::read_to_string(path).context("Failed to read instance file")?;
    let instance: InstanceFile =
        serde_json::from_str(&json).context("Failed to parse instance json")?;
    Ok(instance)
}

pub fn save_instance(instance: &InstanceFile, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(instance).context("Failed to serialize instance")?;
    fs::write(path, json).context("Failed to write instance file")?;
    Ok(())
}
