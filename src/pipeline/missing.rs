//! Missing-value handling and mixed-numeric resolution.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::{
    data::{Row, Value},
    error::WorkbenchResult,
    variable::{self, VariableDescriptor, VariableType},
};

use super::{Applied, StepReport, expect_type, variable_index};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MissingStrategy {
    Drop,
    Mean,
    Median,
    Mode,
    Zero,
    Ignore,
}

/// Replacement for the non-numeric tokens of a mixed-numeric column.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MixedStrategy {
    Null,
    Zero,
    Mean,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MissingValuesChange {
    #[serde(default)]
    pub strategies: BTreeMap<String, MissingStrategy>,
    #[serde(default)]
    pub mixed: BTreeMap<String, MixedStrategy>,
}

impl MissingValuesChange {
    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty() && self.mixed.is_empty()
    }

    pub fn with_strategy(mut self, variable: &str, strategy: MissingStrategy) -> Self {
        self.strategies.insert(variable.to_string(), strategy);
        self
    }

    pub fn with_mixed(mut self, variable: &str, strategy: MixedStrategy) -> Self {
        self.mixed.insert(variable.to_string(), strategy);
        self
    }
}

pub(crate) fn apply(
    rows: &[Row],
    variables: &[VariableDescriptor],
    change: &MissingValuesChange,
) -> WorkbenchResult<Applied> {
    let mut variables = variables.to_vec();
    for (name, strategy) in &change.strategies {
        let variable = &variables[variable_index(&variables, name)?];
        match strategy {
            MissingStrategy::Mean | MissingStrategy::Median => {
                expect_type(variable, VariableType::Numeric)?
            }
            MissingStrategy::Mode => expect_type(variable, VariableType::Categorical)?,
            _ => {}
        }
    }
    for name in change.mixed.keys() {
        let variable = &variables[variable_index(&variables, name)?];
        expect_type(variable, VariableType::Numeric)?;
    }

    let mut report = StepReport::default();
    let drop_columns = change
        .strategies
        .iter()
        .filter(|(_, strategy)| **strategy == MissingStrategy::Drop)
        .map(|(name, _)| name.as_str())
        .collect::<Vec<_>>();
    let before = rows.len();
    let mut rows = rows
        .iter()
        .filter(|row| {
            !drop_columns
                .iter()
                .any(|column| row.get(*column).is_none_or(Value::is_missing))
        })
        .cloned()
        .collect::<Vec<_>>();
    report.rows_removed = before - rows.len();

    for (name, strategy) in &change.mixed {
        let replacement = match strategy {
            MixedStrategy::Null => Some(Value::Null),
            MixedStrategy::Zero => Some(Value::Number(0.0)),
            MixedStrategy::Mean => numeric_mean(&rows, name).map(Value::Number),
        };
        let replacement = replacement.unwrap_or(Value::Null);
        for row in rows.iter_mut() {
            if let Some(cell) = row.get_mut(name)
                && !cell.is_missing()
                && cell.as_number().is_none()
            {
                *cell = replacement.clone();
                report.values_changed += 1;
            }
        }
        let idx = variable_index(&variables, name)?;
        variables[idx].invalid_values = None;
        variables[idx].numeric_percentage = None;
    }

    for (name, strategy) in &change.strategies {
        let fill = match strategy {
            MissingStrategy::Mean => numeric_mean(&rows, name).map(Value::Number),
            MissingStrategy::Median => numeric_median(&rows, name).map(Value::Number),
            MissingStrategy::Mode => modal_value(&rows, name),
            MissingStrategy::Zero => Some(Value::Number(0.0)),
            MissingStrategy::Drop | MissingStrategy::Ignore => continue,
        };
        let Some(fill) = fill else {
            report
                .notes
                .push(format!("'{name}' has no observed values to fill from"));
            continue;
        };
        for row in rows.iter_mut() {
            let cell = row.entry(name.clone()).or_default();
            if cell.is_missing() {
                *cell = fill.clone();
                report.values_changed += 1;
            }
        }
    }

    variable::refresh_all(&mut variables, &rows);
    if report.is_noop() {
        report.notes.push("No missing values required changes".to_string());
    }
    Ok(Applied {
        rows,
        variables,
        report,
    })
}

fn numeric_values(rows: &[Row], column: &str) -> Vec<f64> {
    rows.iter()
        .filter_map(|row| row.get(column).and_then(Value::as_number))
        .collect()
}

pub(crate) fn numeric_mean(rows: &[Row], column: &str) -> Option<f64> {
    let values = numeric_values(rows, column);
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

fn numeric_median(rows: &[Row], column: &str) -> Option<f64> {
    let mut values = numeric_values(rows, column);
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len().is_multiple_of(2) {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}

/// Most frequent category; ties go to the label seen first.
fn modal_value(rows: &[Row], column: &str) -> Option<Value> {
    let mut counts: HashMap<String, (usize, usize, Value)> = HashMap::new();
    for (position, row) in rows.iter().enumerate() {
        if let Some(value) = row.get(column)
            && let Some(label) = value.label()
        {
            counts
                .entry(label)
                .or_insert_with(|| (0, position, value.clone()))
                .0 += 1;
        }
    }
    counts
        .into_values()
        .max_by(|a, b| a.0.cmp(&b.0).then_with(|| b.1.cmp(&a.1)))
        .map(|(_, _, value)| value)
}
