//! Workbench settings, read from YAML and overridable from the command line.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};

use crate::stats::PValueMode;

pub const DEFAULT_PREVIEW_ROWS: usize = 10;
pub const DEFAULT_INFERENCE_SAMPLE_ROWS: usize = 1000;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct WorkbenchConfig {
    /// Rows returned with every step outcome.
    pub preview_rows: usize,
    /// Rows sampled when inferring variable types during ingestion.
    pub inference_sample_rows: usize,
    pub p_value_mode: PValueMode,
    /// JSON file receiving pipeline progress after each change.
    pub progress_path: Option<PathBuf>,
}

impl Default for WorkbenchConfig {
    fn default() -> Self {
        Self {
            preview_rows: DEFAULT_PREVIEW_ROWS,
            inference_sample_rows: DEFAULT_INFERENCE_SAMPLE_ROWS,
            p_value_mode: PValueMode::default(),
            progress_path: None,
        }
    }
}

impl WorkbenchConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Reading workbench config {path:?}"))?;
        Self::from_yaml(&raw).with_context(|| format!("Parsing workbench config {path:?}"))
    }

    pub fn from_yaml(raw: &str) -> Result<Self> {
        let config: WorkbenchConfig = if raw.trim().is_empty() {
            WorkbenchConfig::default()
        } else {
            serde_yaml::from_str(raw)?
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.inference_sample_rows > 0,
            "inferenceSampleRows must be greater than zero"
        );
        Ok(())
    }
}
