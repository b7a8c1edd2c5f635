//! Application-facing surface over one [`SnapshotStore`].
//!
//! A `Workbench` owns its store and configuration; two workbenches never
//! share state.

use std::path::Path;

use anyhow::{Context, Result};
use log::info;
use serde::Serialize;

use crate::{
    config::WorkbenchConfig,
    data::Row,
    error::{WorkbenchError, WorkbenchResult},
    ingest::{self, IngestOptions},
    pipeline::{
        self, ChangeDescriptor, CompositeProposal, DuplicateGroup, LabelInconsistency,
        RemovalCandidate, Rename, StepKind, StepReport, composite, duplicates, remove,
        standardize,
    },
    progress::JsonFileProgress,
    selector::{self, AnalysisIntent},
    stats::{self, TestId, TestResult},
    store::{DatasetMetadata, SnapshotStore, UploadInfo},
    variable::{self, VariableDescriptor},
};

/// Returned by every step action so the caller can redraw without a
/// second round trip.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StepOutcome {
    pub kind: StepKind,
    pub variables: Vec<VariableDescriptor>,
    pub preview_rows: Vec<Row>,
    pub report: StepReport,
    pub invalidated: Vec<StepKind>,
}

/// Everything the review screens offer before the user picks changes.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub removal_candidates: Vec<RemovalCandidate>,
    pub duplicate_groups: Vec<DuplicateGroup>,
    pub label_inconsistencies: Vec<LabelInconsistency>,
    pub composite_proposals: Vec<CompositeProposal>,
    pub rename_suggestions: Vec<Rename>,
}

#[derive(Debug, Default)]
pub struct Workbench {
    store: SnapshotStore,
    config: WorkbenchConfig,
}

impl Workbench {
    /// Builds a workbench, restoring step progress when the config names a
    /// progress file.
    pub fn new(config: WorkbenchConfig) -> Result<Self> {
        config.validate()?;
        let store = match &config.progress_path {
            Some(path) => SnapshotStore::restore(Box::new(JsonFileProgress::new(path)))
                .with_context(|| format!("Restoring progress from {path:?}"))?,
            None => SnapshotStore::new(),
        };
        Ok(Self { store, config })
    }

    pub fn with_store(store: SnapshotStore, config: WorkbenchConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &WorkbenchConfig {
        &self.config
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    // === Ingestion ===

    pub fn ingest_file(&mut self, path: &Path, options: &IngestOptions) -> Result<&DatasetMetadata> {
        let options = IngestOptions {
            sample_rows: self.config.inference_sample_rows,
            ..options.clone()
        };
        let ingested = ingest::read_csv(path, &options)?;
        self.store
            .load(ingested.rows, ingested.variables, ingested.upload)
            .with_context(|| format!("Loading {path:?}"))
    }

    pub fn ingest(
        &mut self,
        rows: Vec<Row>,
        variables: Vec<VariableDescriptor>,
        upload: UploadInfo,
    ) -> WorkbenchResult<&DatasetMetadata> {
        self.store.load(rows, variables, upload)
    }

    // === Reads ===

    pub fn is_loaded(&self) -> bool {
        self.store.is_loaded()
    }

    pub fn get_variables(&self) -> &[VariableDescriptor] {
        self.store.current_variables()
    }

    pub fn get_rows(&self, page: usize, page_size: usize) -> &[Row] {
        self.store.current_rows(page, page_size)
    }

    pub fn get_all_rows(&self) -> &[Row] {
        self.store.all_rows()
    }

    pub fn get_row_count(&self) -> usize {
        self.store.row_count()
    }

    pub fn get_metadata(&self) -> Option<&DatasetMetadata> {
        self.store.metadata()
    }

    // === Steps ===

    /// Applies a change to the current snapshot and commits it. An empty
    /// descriptor marks the step complete without touching the data.
    pub fn apply_step(&mut self, descriptor: ChangeDescriptor) -> WorkbenchResult<StepOutcome> {
        if !self.store.is_loaded() {
            return Err(WorkbenchError::NotLoaded);
        }
        let kind = descriptor.kind();
        if descriptor.is_empty() {
            self.store.mark_skipped(descriptor)?;
            return Ok(self.outcome(kind, skipped_report(), Vec::new()));
        }
        let applied = pipeline::apply(
            self.store.all_rows(),
            self.store.current_variables(),
            &descriptor,
        )?;
        let invalidated = self
            .store
            .commit(kind, applied.rows, applied.variables, descriptor)?;
        Ok(self.outcome(kind, applied.report, invalidated))
    }

    pub fn skip_step(&mut self, kind: StepKind) -> WorkbenchResult<StepOutcome> {
        self.apply_step(ChangeDescriptor::empty(kind))
    }

    fn outcome(&self, kind: StepKind, report: StepReport, invalidated: Vec<StepKind>) -> StepOutcome {
        StepOutcome {
            kind,
            variables: self.store.current_variables().to_vec(),
            preview_rows: self.store.current_rows(0, self.config.preview_rows).to_vec(),
            report,
            invalidated,
        }
    }

    pub fn review(&self) -> WorkbenchResult<Review> {
        if !self.store.is_loaded() {
            return Err(WorkbenchError::NotLoaded);
        }
        let rows = self.store.all_rows();
        let variables = self.store.current_variables();
        Ok(Review {
            removal_candidates: remove::removal_candidates(rows.len(), variables),
            duplicate_groups: duplicates::scan_exact_duplicates(rows),
            label_inconsistencies: duplicates::scan_inconsistent_labels(rows, variables),
            composite_proposals: composite::detect_composites(variables),
            rename_suggestions: standardize::suggest_renames(variables),
        })
    }

    // === Analysis ===

    pub fn run_test(
        &self,
        test: TestId,
        primary: &str,
        secondary: Option<&str>,
    ) -> WorkbenchResult<TestResult> {
        stats::run_test(&self.store, self.config.p_value_mode, test, primary, secondary)
    }

    pub fn suggest_tests(
        &self,
        intent: AnalysisIntent,
        first: &str,
        second: Option<&str>,
    ) -> WorkbenchResult<Vec<TestId>> {
        if !self.store.is_loaded() {
            return Err(WorkbenchError::NotLoaded);
        }
        let variables = self.store.current_variables();
        let lookup = |name: &str| {
            variable::find(variables, name).ok_or_else(|| WorkbenchError::UnknownVariable {
                name: name.to_string(),
            })
        };
        let first = lookup(first)?;
        let second = second.map(lookup).transpose()?;
        let tests = selector::admissible_tests(intent, first, second);
        info!(
            "Suggested {:?} for {intent} of '{}'",
            tests.iter().map(|t| t.as_str()).collect::<Vec<_>>(),
            first.name
        );
        Ok(tests)
    }

    // === Navigation ===

    pub fn current_step(&self) -> StepKind {
        self.store.current_step()
    }

    pub fn next_step(&mut self) -> StepKind {
        self.store.advance()
    }

    pub fn previous_step(&mut self) -> StepKind {
        self.store.retreat()
    }

    pub fn go_to_step(&mut self, kind: StepKind) {
        self.store.go_to(kind);
    }
}

fn skipped_report() -> StepReport {
    StepReport {
        notes: vec!["Step completed without changes".to_string()],
        ..StepReport::default()
    }
}
