//! Composite scores derived from groups of numeric items.

use std::{collections::HashSet, sync::OnceLock};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{
    data::{Row, Value},
    error::{WorkbenchError, WorkbenchResult},
    variable::{VariableDescriptor, VariableType},
};

use super::{Applied, StepReport, expect_type, variable_index};

const MIN_PROPOSAL_ITEMS: usize = 2;
const MIN_SELECTED_ITEMS: usize = 3;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    #[default]
    Mean,
    Sum,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompositeSpec {
    pub name: String,
    pub items: Vec<String>,
    #[serde(default)]
    pub method: Aggregation,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CompositeChange {
    #[serde(default)]
    pub composites: Vec<CompositeSpec>,
}

impl CompositeChange {
    pub fn is_empty(&self) -> bool {
        self.composites.is_empty()
    }
}

/// A detected item group, offered to the reviewer.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CompositeProposal {
    pub stem: String,
    pub spec: CompositeSpec,
    pub selected: bool,
}

impl CompositeChange {
    /// Builds a change from the proposals the reviewer kept selected.
    pub fn from_selected(proposals: &[CompositeProposal]) -> Self {
        Self {
            composites: proposals
                .iter()
                .filter(|p| p.selected)
                .map(|p| p.spec.clone())
                .collect(),
        }
    }
}

/// Adds each composite, or recomputes it in place when a composite of that
/// name already exists (a re-run after an earlier step changed its items).
pub(crate) fn apply(
    rows: &[Row],
    variables: &[VariableDescriptor],
    change: &CompositeChange,
) -> WorkbenchResult<Applied> {
    let mut names = HashSet::new();
    for spec in &change.composites {
        let existing = variables.iter().find(|v| v.name == spec.name);
        if spec.name.trim().is_empty()
            || !names.insert(spec.name.as_str())
            || existing.is_some_and(|v| !v.is_composite())
            || spec.items.contains(&spec.name)
        {
            return Err(WorkbenchError::DuplicateVariable {
                name: spec.name.clone(),
            });
        }
        if spec.items.is_empty() {
            return Err(WorkbenchError::InsufficientObservations {
                test: "composite score".to_string(),
                context: format!("'{}'", spec.name),
                required: 1,
                found: 0,
            });
        }
        for item in &spec.items {
            let idx = variable_index(variables, item)?;
            expect_type(&variables[idx], VariableType::Numeric)?;
        }
    }

    let mut rows = rows.to_vec();
    let mut variables = variables.to_vec();
    let mut report = StepReport::default();
    for spec in &change.composites {
        let mut changed = 0usize;
        for row in rows.iter_mut() {
            let score = Value::from(score_row(row, spec));
            if row.insert(spec.name.clone(), score.clone()).is_some_and(|old| old != score) {
                changed += 1;
            }
        }
        let mut descriptor = VariableDescriptor::new(spec.name.clone(), VariableType::Numeric);
        descriptor.composite_items = Some(spec.items.clone());
        descriptor.refresh_counts(&rows);
        match variables.iter().position(|v| v.name == spec.name) {
            Some(idx) => {
                variables[idx] = descriptor;
                report.values_changed += changed;
                report.notes.push(format!("Recomputed '{}'", spec.name));
            }
            None => {
                variables.push(descriptor);
                report.variables_added.push(spec.name.clone());
            }
        }
    }
    Ok(Applied {
        rows,
        variables,
        report,
    })
}

/// Aggregates the non-missing items of a row; `None` when every item is missing.
fn score_row(row: &Row, spec: &CompositeSpec) -> Option<f64> {
    let values = spec
        .items
        .iter()
        .filter_map(|item| row.get(item).and_then(Value::as_number))
        .collect::<Vec<_>>();
    if values.is_empty() {
        return None;
    }
    let sum = values.iter().sum::<f64>();
    Some(match spec.method {
        Aggregation::Sum => sum,
        Aggregation::Mean => sum / values.len() as f64,
    })
}

fn stem_patterns() -> &'static [Regex; 2] {
    static PATTERNS: OnceLock<[Regex; 2]> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            // prefix_N: sat_1, sat_2
            Regex::new(r"^(?P<stem>.+)_\d+$").expect("valid prefix_N pattern"),
            // qN_suffix: q3_a, q3_b
            Regex::new(r"^(?P<stem>[A-Za-z]+\d+)_.+$").expect("valid qN_suffix pattern"),
        ]
    })
}

fn item_stem(name: &str) -> Option<String> {
    stem_patterns()
        .iter()
        .find_map(|pattern| pattern.captures(name))
        .map(|captures| captures["stem"].to_string())
}

/// Groups numeric variables by shared name stem. Groups of two items are
/// proposed but left unselected; three or more are selected by default. A
/// group that already has a composite over the same items is proposed under
/// that composite's name, so applying it recomputes instead of duplicating.
pub fn detect_composites(variables: &[VariableDescriptor]) -> Vec<CompositeProposal> {
    let mut groups: Vec<(String, Vec<String>)> = Vec::new();
    for variable in variables
        .iter()
        .filter(|v| v.is_numeric() && !v.is_composite())
    {
        let Some(stem) = item_stem(&variable.name) else {
            continue;
        };
        match groups.iter_mut().find(|(s, _)| *s == stem) {
            Some((_, items)) => items.push(variable.name.clone()),
            None => groups.push((stem, vec![variable.name.clone()])),
        }
    }

    let mut taken = variables
        .iter()
        .map(|v| v.name.clone())
        .collect::<HashSet<_>>();
    groups
        .into_iter()
        .filter(|(_, items)| items.len() >= MIN_PROPOSAL_ITEMS)
        .map(|(stem, items)| {
            let name = match existing_composite(variables, &items) {
                Some(existing) => existing.to_string(),
                None => {
                    let mut name = format!("{stem}_score");
                    while taken.contains(&name) {
                        name.push_str("_composite");
                    }
                    taken.insert(name.clone());
                    name
                }
            };
            CompositeProposal {
                selected: items.len() >= MIN_SELECTED_ITEMS,
                spec: CompositeSpec {
                    name,
                    items,
                    method: Aggregation::Mean,
                },
                stem,
            }
        })
        .collect()
}

fn existing_composite<'a>(variables: &'a [VariableDescriptor], items: &[String]) -> Option<&'a str> {
    let wanted = items.iter().collect::<HashSet<_>>();
    variables
        .iter()
        .find(|v| {
            v.composite_items
                .as_ref()
                .is_some_and(|existing| existing.iter().collect::<HashSet<_>>() == wanted)
        })
        .map(|v| v.name.as_str())
}
