// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Ian Philip Eglin
//! Configuration loading for benchmark and solver settings.
//!
//! Every format is turned into JSON text first and then deserialised with
//! `serde_json`, so one set of serde attributes covers all of them.

use anyhow::{Context, Result, bail};
use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;
use std::process::Command;
use tracing::{debug, error};

/// Source formats understood by [`load`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    /// Evaluated by the `pkl` CLI into JSON
    Pkl,
}

impl ConfigFormat {
    /// Format implied by the file extension, JSON unless it is `.pkl`
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("pkl") => Self::Pkl,
            _ => Self::Json,
        }
    }

    fn to_json(self, path: &Path) -> Result<String> {
        match self {
            Self::Json => fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display())),
            Self::Pkl => eval_pkl(path),
        }
    }
}

fn eval_pkl(path: &Path) -> Result<String> {
    debug!("Evaluating {} with pkl", path.display());
    let output = Command::new("pkl")
        .args(["eval", "-f", "json"])
        .arg(path)
        .output()
        .with_context(|| format!("Failed to run pkl on {}", path.display()))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        error!("pkl eval of {} failed: {}", path.display(), stderr.trim());
        bail!("pkl eval of {} failed: {}", path.display(), stderr.trim());
    }
    String::from_utf8(output.stdout).context("pkl produced non UTF-8 output")
}

fn load_as<T: DeserializeOwned>(path: &Path, format: ConfigFormat) -> Result<T> {
    let json = format.to_json(path)?;
    serde_json::from_str(&json)
        .with_context(|| format!("Failed to parse {:?} config {}", format, path.display()))
}

/// Load a configuration file, choosing the format from its extension.
pub fn load<T: DeserializeOwned>(config_path: impl AsRef<Path>) -> Result<T> {
    let path = config_path.as_ref();
    load_as(path, ConfigFormat::from_path(path))
}

pub fn load_json<T: DeserializeOwned>(config_path: impl AsRef<Path>) -> Result<T> {
    load_as(config_path.as_ref(), ConfigFormat::Json)
}

pub fn load_pkl<T: DeserializeOwned>(config_path: impl AsRef<Path>) -> Result<T> {
    load_as(config_path.as_ref(), ConfigFormat::Pkl)
}
