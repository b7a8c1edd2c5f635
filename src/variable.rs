//! Per-column metadata carried alongside the rows of a snapshot.

use std::{
    collections::{BTreeMap, HashSet},
    fmt,
};

use serde::{Deserialize, Serialize};

use crate::data::{Row, Value};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum VariableType {
    Numeric,
    Categorical,
    Date,
    Text,
}

impl VariableType {
    pub fn as_str(self) -> &'static str {
        match self {
            VariableType::Numeric => "numeric",
            VariableType::Categorical => "categorical",
            VariableType::Date => "date",
            VariableType::Text => "text",
        }
    }
}

impl fmt::Display for VariableType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VariableDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub var_type: VariableType,
    pub missing: usize,
    pub unique: usize,
    #[serde(default)]
    pub example: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coding: Option<BTreeMap<String, i64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_categories: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invalid_values: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub numeric_percentage: Option<f64>,
    /// Items a composite score was computed from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub composite_items: Option<Vec<String>>,
    /// Rows `missing` and `unique` were counted over.
    #[serde(skip)]
    pub counted_rows: usize,
}

impl VariableDescriptor {
    pub fn new(name: impl Into<String>, var_type: VariableType) -> Self {
        Self {
            name: name.into(),
            var_type,
            missing: 0,
            unique: 0,
            example: Value::Null,
            coding: None,
            original_categories: None,
            invalid_values: None,
            numeric_percentage: None,
            composite_items: None,
            counted_rows: 0,
        }
    }

    pub fn is_numeric(&self) -> bool {
        self.var_type == VariableType::Numeric
    }

    pub fn is_composite(&self) -> bool {
        self.composite_items.is_some()
    }

    pub fn is_categorical(&self) -> bool {
        self.var_type == VariableType::Categorical
    }

    /// Mostly numeric column still holding non-numeric tokens.
    pub fn is_mixed_numeric(&self) -> bool {
        self.invalid_values
            .as_ref()
            .is_some_and(|tokens| !tokens.is_empty())
    }

    /// Category labels ordered by code, falling back to label order for ties.
    pub fn categories_by_code(&self) -> Vec<String> {
        let Some(coding) = &self.coding else {
            return Vec::new();
        };
        let mut entries = coding.iter().collect::<Vec<_>>();
        entries.sort_by(|a, b| a.1.cmp(b.1).then_with(|| a.0.cmp(b.0)));
        entries.into_iter().map(|(label, _)| label.clone()).collect()
    }

    /// Recomputes `missing`, `unique` and `example` from the given rows.
    pub fn refresh_counts(&mut self, rows: &[Row]) {
        let mut missing = 0usize;
        let mut seen = HashSet::new();
        let mut example = None;
        for row in rows {
            match row.get(&self.name) {
                Some(value) if !value.is_missing() => {
                    if seen.insert(value.identity_key()) && example.is_none() {
                        example = Some(value.clone());
                    }
                }
                _ => missing += 1,
            }
        }
        self.missing = missing;
        self.unique = seen.len();
        self.counted_rows = rows.len();
        self.example = example.unwrap_or(Value::Null);
    }
}

/// Labels of a column in first-seen row order.
pub fn labels_in_order(rows: &[Row], column: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut labels = Vec::new();
    for row in rows {
        if let Some(label) = row.get(column).and_then(Value::label)
            && seen.insert(label.clone())
        {
            labels.push(label);
        }
    }
    labels
}

/// Dense 1-based codes in the given label order.
pub fn dense_coding(labels: &[String]) -> BTreeMap<String, i64> {
    labels
        .iter()
        .enumerate()
        .map(|(idx, label)| (label.clone(), idx as i64 + 1))
        .collect()
}

pub fn refresh_all(variables: &mut [VariableDescriptor], rows: &[Row]) {
    for variable in variables.iter_mut() {
        variable.refresh_counts(rows);
    }
}

pub fn find<'a>(variables: &'a [VariableDescriptor], name: &str) -> Option<&'a VariableDescriptor> {
    variables.iter().find(|v| v.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, Value)]) -> Row {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn refresh_counts_tracks_missing_and_unique() {
        let rows = vec![
            row(&[("city", Value::text("Oslo"))]),
            row(&[("city", Value::Null)]),
            row(&[("city", Value::text("Oslo"))]),
            row(&[("city", Value::text(" "))]),
            row(&[("city", Value::text("Bergen"))]),
        ];
        let mut variable = VariableDescriptor::new("city", VariableType::Categorical);
        variable.refresh_counts(&rows);
        assert_eq!(variable.missing, 2);
        assert_eq!(variable.unique, 2);
        assert_eq!(variable.example, Value::text("Oslo"));
    }

    #[test]
    fn dense_coding_is_one_based_in_order() {
        let labels = labels_in_order(
            &[
                row(&[("g", Value::text("b"))]),
                row(&[("g", Value::text("a"))]),
                row(&[("g", Value::text("b"))]),
            ],
            "g",
        );
        assert_eq!(labels, vec!["b", "a"]);
        let coding = dense_coding(&labels);
        assert_eq!(coding["b"], 1);
        assert_eq!(coding["a"], 2);
    }

    #[test]
    fn descriptor_serializes_type_field() {
        let variable = VariableDescriptor::new("age", VariableType::Numeric);
        let json = serde_json::to_value(&variable).unwrap();
        assert_eq!(json["type"], "numeric");
        assert!(json.get("coding").is_none());
    }
}
