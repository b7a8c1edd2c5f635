//! Column removal and the heuristics that flag removal candidates.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::{data::Row, error::WorkbenchResult, variable::VariableDescriptor};

use super::{Applied, StepReport, variable_index};

const HIGH_MISSING_PERCENT: f64 = 50.0;
const IDENTIFIER_UNIQUE_RATIO: f64 = 0.95;
const NEAR_CONSTANT_UNIQUE_RATIO: f64 = 0.02;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RemoveColumnsChange {
    #[serde(default)]
    pub columns: Vec<String>,
}

impl RemoveColumnsChange {
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum RemovalReason {
    HighMissing,
    LikelyIdentifier,
    NearConstant,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RemovalCandidate {
    pub name: String,
    pub reason: RemovalReason,
    pub missing_percentage: f64,
    pub unique_ratio: f64,
}

pub(crate) fn apply(
    rows: &[Row],
    variables: &[VariableDescriptor],
    change: &RemoveColumnsChange,
) -> WorkbenchResult<Applied> {
    for column in &change.columns {
        variable_index(variables, column)?;
    }
    let doomed = change.columns.iter().collect::<HashSet<_>>();
    let variables = variables
        .iter()
        .filter(|v| !doomed.contains(&v.name))
        .cloned()
        .collect::<Vec<_>>();
    let rows = rows
        .iter()
        .map(|row| {
            let mut row = row.clone();
            for column in &doomed {
                row.remove(*column);
            }
            row
        })
        .collect();
    let mut removed = Vec::new();
    for column in &change.columns {
        if !removed.contains(column) {
            removed.push(column.clone());
        }
    }
    Ok(Applied {
        rows,
        variables,
        report: StepReport {
            variables_removed: removed,
            ..StepReport::default()
        },
    })
}

/// Flags variables that are mostly missing, look like identifiers, or barely
/// vary. The first matching reason wins.
pub fn removal_candidates(row_count: usize, variables: &[VariableDescriptor]) -> Vec<RemovalCandidate> {
    if row_count == 0 {
        return Vec::new();
    }
    variables
        .iter()
        .filter_map(|variable| {
            let rows = match variable.counted_rows {
                0 => row_count,
                counted => counted,
            } as f64;
            let missing_percentage = variable.missing as f64 / rows * 100.0;
            let unique_ratio = variable.unique as f64 / rows;
            let reason = if missing_percentage > HIGH_MISSING_PERCENT {
                RemovalReason::HighMissing
            } else if !variable.is_numeric() && unique_ratio > IDENTIFIER_UNIQUE_RATIO {
                RemovalReason::LikelyIdentifier
            } else if unique_ratio < NEAR_CONSTANT_UNIQUE_RATIO {
                RemovalReason::NearConstant
            } else {
                return None;
            };
            Some(RemovalCandidate {
                name: variable.name.clone(),
                reason,
                missing_percentage,
                unique_ratio,
            })
        })
        .collect()
}
