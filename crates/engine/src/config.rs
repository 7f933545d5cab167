// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Umbrella configuration covering the loop, scheduler, and dispatcher.

use crate::dispatcher::DispatcherConfig;
use crate::error::EngineError;
use crate::runtime::LoopConfig;
use crate::scheduler::SchedulerConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Full engine configuration. Every field has a default, so an empty TOML
/// document is a valid config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HiveConfig {
    #[serde(rename = "loop")]
    pub loop_: LoopConfig,
    pub scheduler: SchedulerConfig,
    pub dispatcher: DispatcherConfig,
}

impl HiveConfig {
    /// Parse a TOML document; missing sections and keys fall back to
    /// defaults.
    pub fn from_toml_str(content: &str) -> Result<Self, EngineError> {
        toml::from_str(content).map_err(|e| EngineError::Config(e.to_string()))
    }

    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, EngineError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
