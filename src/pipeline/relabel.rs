//! Atomic category relabelling.
//!
//! Row values, `coding` and `originalCategories` of a variable are updated
//! together here and nowhere else.

use std::collections::BTreeMap;

use crate::{
    data::{Row, Value},
    variable::{VariableDescriptor, dense_coding, labels_in_order},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodePolicy {
    /// Codes reassigned 1..n in first-seen order of the new labels.
    Dense,
    /// Each new label keeps the code of the first old label mapped onto it.
    Carry,
}

/// Rewrites `mapping` (old label -> new label) across rows and metadata.
/// Returns the number of cells changed. When no cell changes, the variable's
/// coding and counts are left exactly as they were.
pub fn relabel(
    rows: &mut [Row],
    variable: &mut VariableDescriptor,
    mapping: &BTreeMap<String, String>,
    policy: CodePolicy,
) -> usize {
    let mapping = mapping
        .iter()
        .filter(|(old, new)| old != new)
        .collect::<BTreeMap<_, _>>();
    if mapping.is_empty() {
        return 0;
    }
    let previous_order = category_order(rows, variable);

    let mut changed = 0usize;
    for row in rows.iter_mut() {
        let Some(cell) = row.get_mut(&variable.name) else {
            continue;
        };
        if let Some(label) = cell.label()
            && let Some(new_label) = mapping.get(&label)
        {
            *cell = Value::Text((*new_label).clone());
            changed += 1;
        }
    }
    if changed == 0 {
        return 0;
    }

    if variable.is_categorical() || variable.coding.is_some() {
        let coding = match policy {
            CodePolicy::Dense => dense_coding(&labels_in_order(rows, &variable.name)),
            CodePolicy::Carry => carry_codes(rows, variable, &mapping),
        };
        if variable.original_categories.is_none() {
            variable.original_categories = Some(previous_order);
        }
        variable.coding = Some(coding);
    }
    variable.refresh_counts(rows);
    changed
}

fn category_order(rows: &[Row], variable: &VariableDescriptor) -> Vec<String> {
    let mut order = variable.categories_by_code();
    for label in labels_in_order(rows, &variable.name) {
        if !order.contains(&label) {
            order.push(label);
        }
    }
    order
}

fn carry_codes(
    rows: &[Row],
    variable: &VariableDescriptor,
    mapping: &BTreeMap<&String, &String>,
) -> BTreeMap<String, i64> {
    let mut coding = BTreeMap::new();
    if let Some(previous) = &variable.coding {
        let mut entries = previous.iter().collect::<Vec<_>>();
        entries.sort_by_key(|(_, code)| **code);
        for (label, code) in entries {
            let target = mapping.get(label).map_or(label, |new| *new);
            coding.entry(target.clone()).or_insert(*code);
        }
    }
    let mut next = coding.values().copied().max().unwrap_or(0) + 1;
    for label in labels_in_order(rows, &variable.name) {
        coding.entry(label).or_insert_with(|| {
            next += 1;
            next - 1
        });
    }
    coding
}
