//! Exact duplicate removal and near-duplicate label consolidation.

use std::collections::{BTreeMap, HashMap, HashSet};

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::{
    data::{Row, Value, row_identity},
    error::{WorkbenchError, WorkbenchResult},
    variable::{VariableDescriptor, VariableType},
};

use super::{
    Applied, StepReport,
    relabel::{CodePolicy, relabel},
    variable_index,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DuplicatesChange {
    /// Drop rows identical to an earlier row across every field.
    #[serde(default)]
    pub remove_exact: bool,
    /// Per variable, variant label -> canonical label.
    #[serde(default)]
    pub canonical_labels: BTreeMap<String, BTreeMap<String, String>>,
}

impl DuplicatesChange {
    pub fn is_empty(&self) -> bool {
        !self.remove_exact
            && self
                .canonical_labels
                .values()
                .all(|mapping| mapping.iter().all(|(variant, canonical)| variant == canonical))
    }
}

/// Row positions sharing identical content. The first position is the row kept.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DuplicateGroup {
    pub positions: Vec<usize>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LabelInconsistency {
    pub variable: String,
    pub canonical: String,
    pub variants: Vec<String>,
}

impl LabelInconsistency {
    pub fn mapping(&self) -> BTreeMap<String, String> {
        self.variants
            .iter()
            .filter(|variant| **variant != self.canonical)
            .map(|variant| (variant.clone(), self.canonical.clone()))
            .collect()
    }
}

pub(crate) fn apply(
    rows: &[Row],
    variables: &[VariableDescriptor],
    change: &DuplicatesChange,
) -> WorkbenchResult<Applied> {
    let mut variables = variables.to_vec();
    let mut report = StepReport::default();

    let mut rows = if change.remove_exact {
        let mut seen = HashSet::new();
        let kept = rows
            .iter()
            .filter(|row| seen.insert(row_identity(row)))
            .cloned()
            .collect::<Vec<_>>();
        report.rows_removed = rows.len() - kept.len();
        if report.rows_removed == 0 {
            report.notes.push("No exact duplicate rows found".to_string());
        }
        kept
    } else {
        rows.to_vec()
    };

    for (name, mapping) in &change.canonical_labels {
        if mapping.is_empty() {
            continue;
        }
        let idx = variable_index(&variables, name)?;
        let variable = &mut variables[idx];
        if !matches!(
            variable.var_type,
            VariableType::Categorical | VariableType::Text
        ) {
            return Err(WorkbenchError::VariableType {
                name: name.clone(),
                expected: "categorical or text".to_string(),
                actual: variable.var_type.to_string(),
            });
        }
        report.values_changed += relabel(&mut rows, variable, mapping, CodePolicy::Carry);
    }

    // Row removal changes every variable's counts.
    if report.rows_removed > 0 {
        crate::variable::refresh_all(&mut variables, &rows);
    }
    Ok(Applied {
        rows,
        variables,
        report,
    })
}

/// Groups of byte-identical rows, ordered by first occurrence.
pub fn scan_exact_duplicates(rows: &[Row]) -> Vec<DuplicateGroup> {
    let mut groups: HashMap<String, Vec<usize>> = HashMap::new();
    for (position, row) in rows.iter().enumerate() {
        groups.entry(row_identity(row)).or_default().push(position);
    }
    groups
        .into_values()
        .filter(|positions| positions.len() > 1)
        .sorted_by_key(|positions| positions[0])
        .map(|positions| DuplicateGroup { positions })
        .collect()
}

/// Categorical/text labels that differ only by case or whitespace. The most
/// frequent variant becomes canonical; ties go to the variant seen first.
pub fn scan_inconsistent_labels(
    rows: &[Row],
    variables: &[VariableDescriptor],
) -> Vec<LabelInconsistency> {
    let mut found = Vec::new();
    for variable in variables.iter().filter(|v| {
        matches!(v.var_type, VariableType::Categorical | VariableType::Text)
    }) {
        // normalized key -> variant -> (count, first position)
        let mut buckets: Vec<(String, Vec<(String, usize, usize)>)> = Vec::new();
        for (position, row) in rows.iter().enumerate() {
            let Some(label) = row.get(&variable.name).and_then(Value::label) else {
                continue;
            };
            let key = normalize_label(&label);
            let idx = match buckets.iter().position(|(k, _)| *k == key) {
                Some(idx) => idx,
                None => {
                    buckets.push((key, Vec::new()));
                    buckets.len() - 1
                }
            };
            let bucket = &mut buckets[idx].1;
            match bucket.iter_mut().find(|(variant, _, _)| *variant == label) {
                Some(entry) => entry.1 += 1,
                None => bucket.push((label, 1, position)),
            }
        }
        for (_, variants) in buckets.into_iter().filter(|(_, v)| v.len() > 1) {
            let canonical = variants
                .iter()
                .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.2.cmp(&a.2)))
                .map(|(label, _, _)| label.clone())
                .unwrap_or_default();
            found.push(LabelInconsistency {
                variable: variable.name.clone(),
                canonical,
                variants: variants.into_iter().map(|(label, _, _)| label).collect(),
            });
        }
    }
    found
}

fn normalize_label(label: &str) -> String {
    label
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}
