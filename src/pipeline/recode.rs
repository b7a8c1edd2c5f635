//! Categorical recoding: label renames and explicit code assignments.

use std::collections::{BTreeMap, HashSet};

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

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Recode {
    /// Old label -> new label. Row values follow label changes.
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    /// Label (after relabelling) -> code.
    #[serde(default)]
    pub codes: BTreeMap<String, i64>,
}

impl Recode {
    pub fn is_empty(&self) -> bool {
        self.labels.iter().all(|(old, new)| old == new) && self.codes.is_empty()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RecodeChange {
    #[serde(default)]
    pub recodes: BTreeMap<String, Recode>,
}

impl RecodeChange {
    pub fn is_empty(&self) -> bool {
        self.recodes.values().all(Recode::is_empty)
    }
}

pub(crate) fn apply(
    rows: &[Row],
    variables: &[VariableDescriptor],
    change: &RecodeChange,
) -> WorkbenchResult<Applied> {
    let mut rows = rows.to_vec();
    let mut variables = variables.to_vec();
    let mut report = StepReport::default();

    for (name, recode) in change.recodes.iter().filter(|(_, r)| !r.is_empty()) {
        let idx = variable_index(&variables, name)?;
        let variable = &mut variables[idx];
        expect_type(variable, VariableType::Categorical)?;

        if !recode.labels.is_empty() {
            report.values_changed += relabel(&mut rows, variable, &recode.labels, CodePolicy::Carry);
        }
        if !recode.codes.is_empty() {
            let mut coding = variable.coding.clone().unwrap_or_default();
            for (label, code) in &recode.codes {
                if !coding.contains_key(label) {
                    return Err(WorkbenchError::UnknownCategory {
                        variable: name.clone(),
                        label: label.clone(),
                    });
                }
                coding.insert(label.clone(), *code);
            }
            let mut used = HashSet::new();
            for code in coding.values() {
                if !used.insert(*code) {
                    return Err(WorkbenchError::DuplicateCode {
                        variable: name.clone(),
                        code: *code,
                    });
                }
            }
            if variable.original_categories.is_none() {
                variable.original_categories = Some(variable.categories_by_code());
            }
            variable.coding = Some(coding);
        }
    }

    Ok(Applied {
        rows,
        variables,
        report,
    })
}
