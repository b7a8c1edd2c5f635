//! The dataset snapshot store: the single owner of rows, variables and the
//! step log.
//!
//! `load` is used once per ingestion; `commit` is the only way a snapshot
//! changes afterwards. Reads never recompute anything and return empty
//! collections before a dataset is loaded.

use std::collections::{BTreeMap, HashSet};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::{
    data::Row,
    error::{WorkbenchError, WorkbenchResult},
    pipeline::{ChangeDescriptor, StepKind, graph::StepGraph},
    progress::{ProgressStore, ProgressSummary},
    variable::VariableDescriptor,
};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DatasetMetadata {
    pub file_name: String,
    pub total_rows: usize,
    pub total_columns: usize,
    pub uploaded_at: DateTime<Utc>,
    pub session_id: u64,
}

/// What ingestion knows about an upload before the store assigns a session.
#[derive(Debug, Clone)]
pub struct UploadInfo {
    pub file_name: String,
    pub uploaded_at: DateTime<Utc>,
}

impl UploadInfo {
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            uploaded_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StepRecord {
    pub descriptor: ChangeDescriptor,
    pub applied_at: Option<DateTime<Utc>>,
    pub completed: bool,
}

pub struct SnapshotStore {
    rows: Vec<Row>,
    variables: Vec<VariableDescriptor>,
    metadata: Option<DatasetMetadata>,
    loaded: bool,
    steps: BTreeMap<StepKind, StepRecord>,
    graph: StepGraph,
    cursor: StepKind,
    next_session_id: u64,
    progress: Option<Box<dyn ProgressStore>>,
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SnapshotStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotStore")
            .field("rows", &self.rows.len())
            .field("variables", &self.variables.len())
            .field("metadata", &self.metadata)
            .field("steps", &self.steps.keys().collect::<Vec<_>>())
            .field("cursor", &self.cursor)
            .finish()
    }
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self {
            rows: Vec::new(),
            variables: Vec::new(),
            metadata: None,
            loaded: false,
            steps: BTreeMap::new(),
            graph: StepGraph::pipeline(),
            cursor: StepKind::MissingValues,
            next_session_id: 1,
            progress: None,
        }
    }

    pub fn with_graph(mut self, graph: StepGraph) -> Self {
        self.graph = graph;
        self
    }

    pub fn with_progress(mut self, progress: Box<dyn ProgressStore>) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Rebuilds step bookkeeping from persisted progress. The dataset itself
    /// is not restored; `is_loaded` stays false until the next `load`.
    pub fn restore(progress: Box<dyn ProgressStore>) -> Result<Self> {
        let summary = progress
            .load()
            .context("Loading persisted pipeline progress")?
            .unwrap_or_default();
        let mut store = Self::new();
        store.next_session_id = summary
            .metadata
            .as_ref()
            .map_or(1, |metadata| metadata.session_id + 1);
        store.metadata = summary.metadata;
        for (kind, descriptor) in summary.descriptors {
            let completed = summary.completed.get(&kind).copied().unwrap_or(false);
            store.steps.insert(
                kind,
                StepRecord {
                    descriptor,
                    applied_at: None,
                    completed,
                },
            );
        }
        store.cursor = summary.current_step.unwrap_or(StepKind::MissingValues);
        store.progress = Some(progress);
        info!(
            "Restored progress for {} step(s); dataset must be re-ingested",
            store.steps.len()
        );
        Ok(store)
    }

    /// Replaces the whole snapshot with a fresh ingestion.
    pub fn load(
        &mut self,
        rows: Vec<Row>,
        variables: Vec<VariableDescriptor>,
        upload: UploadInfo,
    ) -> WorkbenchResult<&DatasetMetadata> {
        if rows.is_empty() || variables.is_empty() {
            return Err(WorkbenchError::EmptyDataset {
                rows: rows.len(),
                variables: variables.len(),
            });
        }
        validate_snapshot(&rows, &variables)?;
        let metadata = DatasetMetadata {
            file_name: upload.file_name,
            total_rows: rows.len(),
            total_columns: variables.len(),
            uploaded_at: upload.uploaded_at,
            session_id: self.next_session_id,
        };
        self.next_session_id += 1;
        (self.rows, self.variables) = (rows, variables);
        self.loaded = true;
        self.steps.clear();
        self.cursor = StepKind::MissingValues;
        info!(
            "Loaded '{}' as session {} ({} row(s), {} variable(s))",
            metadata.file_name, metadata.session_id, metadata.total_rows, metadata.total_columns
        );
        self.metadata = Some(metadata);
        self.persist();
        self.metadata.as_ref().ok_or(WorkbenchError::NotLoaded)
    }

    /// True between a successful `load` and the end of the session. A step
    /// that drops every row leaves the dataset loaded but empty.
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn current_variables(&self) -> &[VariableDescriptor] {
        &self.variables
    }

    /// One page of rows, 0-based. Out-of-range pages are empty.
    pub fn current_rows(&self, page: usize, page_size: usize) -> &[Row] {
        if page_size == 0 {
            return &[];
        }
        let start = page.saturating_mul(page_size).min(self.rows.len());
        let end = start.saturating_add(page_size).min(self.rows.len());
        &self.rows[start..end]
    }

    pub fn all_rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn metadata(&self) -> Option<&DatasetMetadata> {
        self.metadata.as_ref()
    }

    pub fn step(&self, kind: StepKind) -> Option<&StepRecord> {
        self.steps.get(&kind)
    }

    pub fn is_completed(&self, kind: StepKind) -> bool {
        self.steps.get(&kind).is_some_and(|record| record.completed)
    }

    pub fn completed_steps(&self) -> Vec<StepKind> {
        self.steps
            .iter()
            .filter(|(_, record)| record.completed)
            .map(|(kind, _)| *kind)
            .collect()
    }

    /// Commits a step's output. Returns the steps invalidated by it.
    pub fn commit(
        &mut self,
        kind: StepKind,
        rows: Vec<Row>,
        variables: Vec<VariableDescriptor>,
        descriptor: ChangeDescriptor,
    ) -> WorkbenchResult<Vec<StepKind>> {
        if descriptor.kind() != kind {
            return Err(WorkbenchError::StepMismatch {
                expected: kind,
                found: descriptor.kind(),
            });
        }
        if !self.is_loaded() {
            return Err(WorkbenchError::NotLoaded);
        }
        if descriptor.is_empty() {
            self.mark_skipped(descriptor)?;
            return Ok(Vec::new());
        }
        validate_snapshot(&rows, &variables)?;

        (self.rows, self.variables) = (rows, variables);
        self.steps.insert(
            kind,
            StepRecord {
                descriptor,
                applied_at: Some(Utc::now()),
                completed: true,
            },
        );
        let invalidated = self
            .graph
            .dependents(kind)
            .into_iter()
            .filter(|step| self.steps.remove(step).is_some())
            .collect::<Vec<_>>();
        if !invalidated.is_empty() {
            debug!("Committing {kind} invalidated {invalidated:?}");
        }
        info!(
            "Committed {kind}: {} row(s), {} variable(s)",
            self.rows.len(),
            self.variables.len()
        );
        self.persist();
        Ok(invalidated)
    }

    /// Records that a step was reviewed and nothing was changed. No
    /// mutation and no invalidation of later steps.
    pub fn mark_skipped(&mut self, descriptor: ChangeDescriptor) -> WorkbenchResult<()> {
        if !self.is_loaded() {
            return Err(WorkbenchError::NotLoaded);
        }
        let kind = descriptor.kind();
        self.steps.insert(
            kind,
            StepRecord {
                descriptor,
                applied_at: Some(Utc::now()),
                completed: true,
            },
        );
        debug!("Marked {kind} complete without changes");
        self.persist();
        Ok(())
    }

    pub fn current_step(&self) -> StepKind {
        self.cursor
    }

    pub fn advance(&mut self) -> StepKind {
        if let Some(next) = self.cursor.next() {
            self.go_to(next);
        }
        self.cursor
    }

    pub fn retreat(&mut self) -> StepKind {
        if let Some(previous) = self.cursor.previous() {
            self.go_to(previous);
        }
        self.cursor
    }

    pub fn go_to(&mut self, kind: StepKind) {
        self.cursor = kind;
        self.persist();
    }

    pub fn progress_summary(&self) -> ProgressSummary {
        ProgressSummary {
            metadata: self.metadata.clone(),
            completed: self
                .steps
                .iter()
                .map(|(kind, record)| (*kind, record.completed))
                .collect(),
            descriptors: self
                .steps
                .iter()
                .map(|(kind, record)| (*kind, record.descriptor.clone()))
                .collect(),
            current_step: Some(self.cursor),
        }
    }

    fn persist(&mut self) {
        let summary = self.progress_summary();
        if let Some(progress) = self.progress.as_mut()
            && let Err(err) = progress.save(&summary)
        {
            warn!("Failed to persist pipeline progress: {err:#}");
        }
    }
}

/// Names unique, and every variable present as a key in every row.
fn validate_snapshot(rows: &[Row], variables: &[VariableDescriptor]) -> WorkbenchResult<()> {
    let mut names = HashSet::new();
    for variable in variables {
        if !names.insert(variable.name.as_str()) {
            return Err(WorkbenchError::DuplicateVariable {
                name: variable.name.clone(),
            });
        }
    }
    for (position, row) in rows.iter().enumerate() {
        if row.len() != variables.len() {
            return Err(WorkbenchError::SnapshotInvariant {
                reason: format!(
                    "row {position} has {} field(s) for {} variable(s)",
                    row.len(),
                    variables.len()
                ),
            });
        }
        if let Some(missing) = variables.iter().find(|v| !row.contains_key(&v.name)) {
            return Err(WorkbenchError::SnapshotInvariant {
                reason: format!("row {position} has no field '{}'", missing.name),
            });
        }
    }
    Ok(())
}
