//! Dataset preparation pipeline.
//!
//! The pipeline is a fixed sequence of steps. Each step turns the current
//! `(rows, variables)` pair plus a [`ChangeDescriptor`] into a new pair; the
//! store commits the result and invalidates every dependent step through the
//! [`graph::StepGraph`]. `apply` never looks at anything but its arguments, so
//! steps can be discarded and re-run in any temporal order.

pub mod composite;
pub mod duplicates;
pub mod graph;
pub mod missing;
pub mod recode;
pub mod relabel;
pub mod remove;
pub mod standardize;

use std::{fmt, str::FromStr};

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::{
    data::Row,
    error::{WorkbenchError, WorkbenchResult},
    variable::{VariableDescriptor, VariableType},
};

pub use composite::{Aggregation, CompositeChange, CompositeProposal, CompositeSpec};
pub use duplicates::{DuplicateGroup, DuplicatesChange, LabelInconsistency};
pub use missing::{MissingStrategy, MissingValuesChange, MixedStrategy};
pub use recode::{Recode, RecodeChange};
pub use remove::{RemovalCandidate, RemovalReason, RemoveColumnsChange};
pub use standardize::{Rename, StandardizeChange};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "camelCase")]
pub enum StepKind {
    MissingValues,
    StandardizeVariables,
    FixDuplicates,
    RecodeVariables,
    CompositeScores,
    RemoveColumns,
}

impl StepKind {
    pub const ORDER: [StepKind; 6] = [
        StepKind::MissingValues,
        StepKind::StandardizeVariables,
        StepKind::FixDuplicates,
        StepKind::RecodeVariables,
        StepKind::CompositeScores,
        StepKind::RemoveColumns,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StepKind::MissingValues => "missingValues",
            StepKind::StandardizeVariables => "standardizeVariables",
            StepKind::FixDuplicates => "fixDuplicates",
            StepKind::RecodeVariables => "recodeVariables",
            StepKind::CompositeScores => "compositeScores",
            StepKind::RemoveColumns => "removeColumns",
        }
    }

    pub fn position(self) -> usize {
        Self::ORDER
            .iter()
            .position(|kind| *kind == self)
            .unwrap_or_default()
    }

    pub fn next(self) -> Option<StepKind> {
        Self::ORDER.get(self.position() + 1).copied()
    }

    pub fn previous(self) -> Option<StepKind> {
        self.position()
            .checked_sub(1)
            .and_then(|idx| Self::ORDER.get(idx).copied())
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StepKind {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        let wanted = value.trim();
        StepKind::ORDER
            .iter()
            .copied()
            .find(|kind| {
                kind.as_str().eq_ignore_ascii_case(wanted)
                    || heck::ToKebabCase::to_kebab_case(kind.as_str()) == wanted
            })
            .ok_or_else(|| anyhow!("Unknown step '{value}'"))
    }
}

/// Step-specific change, one variant per [`StepKind`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ChangeDescriptor {
    MissingValues(MissingValuesChange),
    StandardizeVariables(StandardizeChange),
    FixDuplicates(DuplicatesChange),
    RecodeVariables(RecodeChange),
    CompositeScores(CompositeChange),
    RemoveColumns(RemoveColumnsChange),
}

impl ChangeDescriptor {
    /// The "reviewed, changed nothing" descriptor for a step.
    pub fn empty(kind: StepKind) -> Self {
        match kind {
            StepKind::MissingValues => Self::MissingValues(MissingValuesChange::default()),
            StepKind::StandardizeVariables => {
                Self::StandardizeVariables(StandardizeChange::default())
            }
            StepKind::FixDuplicates => Self::FixDuplicates(DuplicatesChange::default()),
            StepKind::RecodeVariables => Self::RecodeVariables(RecodeChange::default()),
            StepKind::CompositeScores => Self::CompositeScores(CompositeChange::default()),
            StepKind::RemoveColumns => Self::RemoveColumns(RemoveColumnsChange::default()),
        }
    }

    pub fn kind(&self) -> StepKind {
        match self {
            Self::MissingValues(_) => StepKind::MissingValues,
            Self::StandardizeVariables(_) => StepKind::StandardizeVariables,
            Self::FixDuplicates(_) => StepKind::FixDuplicates,
            Self::RecodeVariables(_) => StepKind::RecodeVariables,
            Self::CompositeScores(_) => StepKind::CompositeScores,
            Self::RemoveColumns(_) => StepKind::RemoveColumns,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::MissingValues(change) => change.is_empty(),
            Self::StandardizeVariables(change) => change.is_empty(),
            Self::FixDuplicates(change) => change.is_empty(),
            Self::RecodeVariables(change) => change.is_empty(),
            Self::CompositeScores(change) => change.is_empty(),
            Self::RemoveColumns(change) => change.is_empty(),
        }
    }
}

/// What a step did, for the reviewer. A step that found nothing to change
/// still succeeds; `notes` explains why.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StepReport {
    pub rows_removed: usize,
    pub values_changed: usize,
    pub variables_added: Vec<String>,
    pub variables_removed: Vec<String>,
    pub notes: Vec<String>,
}

impl StepReport {
    pub fn is_noop(&self) -> bool {
        self.rows_removed == 0
            && self.values_changed == 0
            && self.variables_added.is_empty()
            && self.variables_removed.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct Applied {
    pub rows: Vec<Row>,
    pub variables: Vec<VariableDescriptor>,
    pub report: StepReport,
}

/// Computes the effect of `change` on the given snapshot without mutating it.
pub fn apply(
    rows: &[Row],
    variables: &[VariableDescriptor],
    change: &ChangeDescriptor,
) -> WorkbenchResult<Applied> {
    if change.is_empty() {
        return Ok(Applied {
            rows: rows.to_vec(),
            variables: variables.to_vec(),
            report: StepReport {
                notes: vec!["No changes selected".to_string()],
                ..StepReport::default()
            },
        });
    }
    match change {
        ChangeDescriptor::MissingValues(change) => missing::apply(rows, variables, change),
        ChangeDescriptor::StandardizeVariables(change) => {
            standardize::apply(rows, variables, change)
        }
        ChangeDescriptor::FixDuplicates(change) => duplicates::apply(rows, variables, change),
        ChangeDescriptor::RecodeVariables(change) => recode::apply(rows, variables, change),
        ChangeDescriptor::CompositeScores(change) => composite::apply(rows, variables, change),
        ChangeDescriptor::RemoveColumns(change) => remove::apply(rows, variables, change),
    }
}

pub(crate) fn variable_index(variables: &[VariableDescriptor], name: &str) -> WorkbenchResult<usize> {
    variables
        .iter()
        .position(|v| v.name == name)
        .ok_or_else(|| WorkbenchError::UnknownVariable {
            name: name.to_string(),
        })
}

pub(crate) fn expect_type(
    variable: &VariableDescriptor,
    expected: VariableType,
) -> WorkbenchResult<()> {
    if variable.var_type == expected {
        Ok(())
    } else {
        Err(WorkbenchError::VariableType {
            name: variable.name.clone(),
            expected: expected.to_string(),
            actual: variable.var_type.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_order_navigation() {
        assert_eq!(StepKind::MissingValues.previous(), None);
        assert_eq!(
            StepKind::MissingValues.next(),
            Some(StepKind::StandardizeVariables)
        );
        assert_eq!(StepKind::RemoveColumns.next(), None);
        assert_eq!(StepKind::RemoveColumns.position(), 5);
    }

    #[test]
    fn step_kind_parses_camel_and_kebab_case() {
        assert_eq!(
            "fixDuplicates".parse::<StepKind>().unwrap(),
            StepKind::FixDuplicates
        );
        assert_eq!(
            "remove-columns".parse::<StepKind>().unwrap(),
            StepKind::RemoveColumns
        );
        assert!("sorting".parse::<StepKind>().is_err());
    }

    #[test]
    fn empty_descriptor_matches_kind() {
        for kind in StepKind::ORDER {
            let change = ChangeDescriptor::empty(kind);
            assert_eq!(change.kind(), kind);
            assert!(change.is_empty());
        }
    }

    #[test]
    fn descriptor_round_trips_through_tagged_json() {
        let json = r#"{"kind":"removeColumns","columns":["id"]}"#;
        let change: ChangeDescriptor = serde_json::from_str(json).unwrap();
        assert_eq!(change.kind(), StepKind::RemoveColumns);
        assert!(!change.is_empty());
    }
}
