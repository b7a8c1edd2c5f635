//! Typed errors raised by the dataset store, the preparation pipeline, and
//! the statistical test engine.

use thiserror::Error;

use crate::pipeline::StepKind;

pub type WorkbenchResult<T> = std::result::Result<T, WorkbenchError>;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum WorkbenchError {
    // === Store state ===
    /// An operation needs a loaded dataset.
    #[error("no dataset is loaded")]
    NotLoaded,

    /// Ingestion handed over zero rows or zero variables.
    #[error("dataset is empty: {rows} row(s), {variables} variable(s)")]
    EmptyDataset { rows: usize, variables: usize },

    /// A proposed snapshot breaks the row/variable invariant.
    #[error("snapshot invariant violated: {reason}")]
    SnapshotInvariant { reason: String },

    // === Variables ===
    #[error("variable '{name}' not found")]
    UnknownVariable { name: String },

    #[error("variable '{name}' already exists")]
    DuplicateVariable { name: String },

    #[error("variable '{name}' is {actual}, expected {expected}")]
    VariableType {
        name: String,
        expected: String,
        actual: String,
    },

    #[error("{test} requires a second variable")]
    MissingSecondVariable { test: String },

    // === Statistical preconditions ===
    #[error("{test} needs at least {required} observation(s) in {context}, found {found}")]
    InsufficientObservations {
        test: String,
        context: String,
        required: usize,
        found: usize,
    },

    #[error("{test} needs {expected} groups in '{variable}', found {found}")]
    GroupCount {
        test: String,
        variable: String,
        expected: String,
        found: usize,
    },

    #[error("{test} needs at least 2 categories in '{variable}', found {found}")]
    CategoryCount {
        test: String,
        variable: String,
        found: usize,
    },

    #[error("{test} cannot be computed: '{variable}' has zero variance")]
    ZeroVariance { test: String, variable: String },

    // === Pipeline ===
    #[error("change descriptor for {found} cannot be applied as {expected}")]
    StepMismatch { expected: StepKind, found: StepKind },

    #[error("category '{label}' not found in '{variable}'")]
    UnknownCategory { variable: String, label: String },

    #[error("code {code} is assigned to more than one category of '{variable}'")]
    DuplicateCode { variable: String, code: i64 },

    #[error("step dependency {upstream} -> {downstream} would create a cycle")]
    DependencyCycle {
        upstream: StepKind,
        downstream: StepKind,
    },
}

impl WorkbenchError {
    /// Errors caused by the data or the caller's choice of test/step rather
    /// than by engine state. Callers surface these and let the user pick
    /// something else.
    pub fn is_precondition(&self) -> bool {
        !matches!(
            self,
            WorkbenchError::NotLoaded | WorkbenchError::DependencyCycle { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_count_message_names_variable() {
        let err = WorkbenchError::GroupCount {
            test: "independent-t-test".to_string(),
            variable: "region".to_string(),
            expected: "exactly 2".to_string(),
            found: 4,
        };
        assert_eq!(
            err.to_string(),
            "independent-t-test needs exactly 2 groups in 'region', found 4"
        );
        assert!(err.is_precondition());
        assert!(!WorkbenchError::NotLoaded.is_precondition());
    }
}
