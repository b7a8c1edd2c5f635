//! Variable renaming and category label standardization.

use std::collections::{BTreeMap, HashSet};

use heck::ToSnakeCase;
use serde::{Deserialize, Serialize};

use crate::{
    data::Row,
    error::{WorkbenchError, WorkbenchResult},
    variable::{VariableDescriptor, VariableType},
};

use super::{
    Applied, StepReport, expect_type,
    relabel::{CodePolicy, relabel},
    variable_index,
};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Rename {
    pub from: String,
    pub to: String,
}

impl Rename {
    pub fn new(from: &str, to: &str) -> Self {
        Self {
            from: from.to_string(),
            to: to.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StandardizeChange {
    #[serde(default)]
    pub renames: Vec<Rename>,
    /// Label rewrites keyed by variable (either its old or its new name).
    #[serde(default)]
    pub labels: BTreeMap<String, BTreeMap<String, String>>,
}

impl StandardizeChange {
    pub fn is_empty(&self) -> bool {
        self.renames.iter().all(|r| r.from == r.to)
            && self
                .labels
                .values()
                .all(|mapping| mapping.iter().all(|(old, new)| old == new))
    }
}

pub(crate) fn apply(
    rows: &[Row],
    variables: &[VariableDescriptor],
    change: &StandardizeChange,
) -> WorkbenchResult<Applied> {
    let renames = validate_renames(variables, &change.renames)?;
    let mut report = StepReport::default();

    let mut variables = variables.to_vec();
    for variable in variables.iter_mut() {
        if let Some(target) = renames.get(&variable.name) {
            variable.name = target.clone();
        }
    }
    let mut rows = if renames.is_empty() {
        rows.to_vec()
    } else {
        rows.iter()
            .map(|row| {
                row.iter()
                    .map(|(key, value)| {
                        let key = renames.get(key).unwrap_or(key).clone();
                        (key, value.clone())
                    })
                    .collect::<Row>()
            })
            .collect()
    };

    for (key, mapping) in &change.labels {
        if mapping.is_empty() {
            continue;
        }
        let name = renames.get(key).unwrap_or(key);
        let idx = variable_index(&variables, name)?;
        expect_type(&variables[idx], VariableType::Categorical)?;
        report.values_changed += relabel(&mut rows, &mut variables[idx], mapping, CodePolicy::Dense);
    }

    if !renames.is_empty() {
        report
            .notes
            .push(format!("Renamed {} variable(s)", renames.len()));
    }
    Ok(Applied {
        rows,
        variables,
        report,
    })
}

fn validate_renames(
    variables: &[VariableDescriptor],
    renames: &[Rename],
) -> WorkbenchResult<BTreeMap<String, String>> {
    let mut mapping = BTreeMap::new();
    for rename in renames {
        variable_index(variables, &rename.from)?;
        let target = rename.to.trim();
        if target.is_empty() {
            return Err(WorkbenchError::SnapshotInvariant {
                reason: format!("variable '{}' cannot be renamed to an empty name", rename.from),
            });
        }
        if rename.from != target {
            mapping.insert(rename.from.clone(), target.to_string());
        }
    }
    let mut final_names = HashSet::new();
    for variable in variables {
        let name = mapping.get(&variable.name).unwrap_or(&variable.name);
        if !final_names.insert(name.clone()) {
            return Err(WorkbenchError::DuplicateVariable { name: name.clone() });
        }
    }
    Ok(mapping)
}

/// Proposes `snake_case` names for variables whose names are not already
/// normalized, skipping proposals that would collide.
pub fn suggest_renames(variables: &[VariableDescriptor]) -> Vec<Rename> {
    let mut taken = variables
        .iter()
        .map(|v| v.name.clone())
        .collect::<HashSet<_>>();
    let mut renames = Vec::new();
    for variable in variables {
        let proposed = variable.name.trim().to_snake_case();
        if proposed.is_empty() || proposed == variable.name || taken.contains(&proposed) {
            continue;
        }
        taken.insert(proposed.clone());
        renames.push(Rename::new(&variable.name, &proposed));
    }
    renames
}
