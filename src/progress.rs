//! Durable bookkeeping of pipeline progress.
//!
//! Only metadata, step completion flags, the last descriptor per step and
//! the navigation cursor are persisted. Rows and variables stay in memory
//! and are gone after a reload until the dataset is ingested again.

use std::{
    cell::RefCell,
    collections::BTreeMap,
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::{Path, PathBuf},
    rc::Rc,
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{
    pipeline::{ChangeDescriptor, StepKind},
    store::DatasetMetadata,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSummary {
    pub metadata: Option<DatasetMetadata>,
    #[serde(default)]
    pub completed: BTreeMap<StepKind, bool>,
    #[serde(default)]
    pub descriptors: BTreeMap<StepKind, ChangeDescriptor>,
    #[serde(default)]
    pub current_step: Option<StepKind>,
}

pub trait ProgressStore {
    fn save(&mut self, summary: &ProgressSummary) -> Result<()>;
    fn load(&self) -> Result<Option<ProgressSummary>>;
}

/// JSON file next to wherever the caller keeps session state.
#[derive(Debug, Clone)]
pub struct JsonFileProgress {
    path: PathBuf,
}

impl JsonFileProgress {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ProgressStore for JsonFileProgress {
    fn save(&mut self, summary: &ProgressSummary) -> Result<()> {
        let file = File::create(&self.path)
            .with_context(|| format!("Creating progress file {:?}", self.path))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, summary).context("Writing progress JSON")?;
        writer
            .flush()
            .with_context(|| format!("Flushing progress file {:?}", self.path))
    }

    fn load(&self) -> Result<Option<ProgressSummary>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let file = File::open(&self.path)
            .with_context(|| format!("Opening progress file {:?}", self.path))?;
        let summary =
            serde_json::from_reader(BufReader::new(file)).context("Parsing progress JSON")?;
        Ok(Some(summary))
    }
}

/// In-memory store; clones share the same slot so a test can hand one
/// clone to a store and inspect the other.
#[derive(Debug, Clone, Default)]
pub struct MemoryProgress {
    slot: Rc<RefCell<Option<ProgressSummary>>>,
}

impl MemoryProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Option<ProgressSummary> {
        self.slot.borrow().clone()
    }
}

impl ProgressStore for MemoryProgress {
    fn save(&mut self, summary: &ProgressSummary) -> Result<()> {
        *self.slot.borrow_mut() = Some(summary.clone());
        Ok(())
    }

    fn load(&self) -> Result<Option<ProgressSummary>> {
        Ok(self.slot.borrow().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::RemoveColumnsChange;
    use tempfile::tempdir;

    #[test]
    fn json_file_round_trips_summary() {
        let dir = tempdir().expect("temp dir");
        let mut store = JsonFileProgress::new(dir.path().join("progress.json"));
        assert_eq!(store.load().unwrap(), None);

        let mut summary = ProgressSummary::default();
        summary.completed.insert(StepKind::RemoveColumns, true);
        summary.descriptors.insert(
            StepKind::RemoveColumns,
            ChangeDescriptor::RemoveColumns(RemoveColumnsChange {
                columns: vec!["id".to_string()],
            }),
        );
        summary.current_step = Some(StepKind::RemoveColumns);
        store.save(&summary).unwrap();

        assert_eq!(store.load().unwrap(), Some(summary));
    }

    #[test]
    fn memory_clones_share_state() {
        let observer = MemoryProgress::new();
        let mut writer = observer.clone();
        writer.save(&ProgressSummary::default()).unwrap();
        assert!(observer.snapshot().is_some());
    }

    #[test]
    fn save_into_missing_directory_reports_error() {
        let dir = tempdir().expect("temp dir");
        let mut store = JsonFileProgress::new(dir.path().join("absent").join("progress.json"));
        let err = store.save(&ProgressSummary::default()).unwrap_err();
        assert!(format!("{err:#}").contains("progress"));
    }

    #[test]
    fn saved_file_is_complete_when_save_returns() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("progress.json");
        let mut store = JsonFileProgress::new(&path);
        let mut summary = ProgressSummary::default();
        summary.current_step = Some(StepKind::FixDuplicates);
        store.save(&summary).unwrap();
        let raw = std::fs::read_to_string(&path).unwrap();
        let parsed: ProgressSummary = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed, summary);
    }
}
