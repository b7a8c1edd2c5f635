//! Statistical test engine.
//!
//! `run_test` reads the current snapshot of a [`SnapshotStore`], pulls the
//! requested columns out of it and hands them to one of the procedures in
//! [`procedures`]. Nothing in here mutates the store.

pub mod assumptions;
pub mod descriptive;
pub mod procedures;
pub mod pvalue;

use std::{collections::HashSet, fmt, str::FromStr};

use anyhow::{Result, anyhow};
use log::info;
use serde::{Deserialize, Serialize};

use crate::{
    data::Row,
    error::{WorkbenchError, WorkbenchResult},
    store::SnapshotStore,
    variable::{self, VariableDescriptor},
};

pub use assumptions::Assumptions;
pub use descriptive::DistributionShape;
pub use procedures::Group;
pub use pvalue::PValueMode;

pub const ALPHA: f64 = 0.05;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "kebab-case")]
pub enum TestId {
    IndependentTTest,
    OneWayAnova,
    PearsonCorrelation,
    ChiSquare,
    Normality,
}

impl TestId {
    pub const ALL: [TestId; 5] = [
        TestId::IndependentTTest,
        TestId::OneWayAnova,
        TestId::PearsonCorrelation,
        TestId::ChiSquare,
        TestId::Normality,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TestId::IndependentTTest => "independent-t-test",
            TestId::OneWayAnova => "one-way-anova",
            TestId::PearsonCorrelation => "pearson-correlation",
            TestId::ChiSquare => "chi-square",
            TestId::Normality => "normality",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            TestId::IndependentTTest => "Independent samples t-test",
            TestId::OneWayAnova => "One-way ANOVA",
            TestId::PearsonCorrelation => "Pearson correlation",
            TestId::ChiSquare => "Chi-square test of independence",
            TestId::Normality => "Normality check",
        }
    }

    pub fn needs_second_variable(self) -> bool {
        self != TestId::Normality
    }
}

impl fmt::Display for TestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TestId {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        let normalized = value.trim().to_ascii_lowercase().replace('_', "-");
        match normalized.as_str() {
            "independent-t-test" | "t-test" | "ttest" => Ok(TestId::IndependentTTest),
            "one-way-anova" | "anova" => Ok(TestId::OneWayAnova),
            "pearson-correlation" | "pearson" | "correlation" => Ok(TestId::PearsonCorrelation),
            "chi-square" | "chi-squared" | "chisq" => Ok(TestId::ChiSquare),
            "normality" => Ok(TestId::Normality),
            other => Err(anyhow!(
                "Unknown test '{other}'. Expected one of: {}",
                TestId::ALL.map(TestId::as_str).join(", ")
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Magnitude {
    Negligible,
    Small,
    Medium,
    Large,
}

impl fmt::Display for Magnitude {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Magnitude::Negligible => "negligible",
            Magnitude::Small => "small",
            Magnitude::Medium => "medium",
            Magnitude::Large => "large",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EffectSize {
    pub measure: String,
    pub value: f64,
    pub magnitude: Magnitude,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConfidenceInterval {
    pub level: f64,
    pub lower: f64,
    pub upper: f64,
}

impl ConfidenceInterval {
    fn around(center: f64, margin: f64) -> Self {
        Self {
            level: 0.95,
            lower: center - margin,
            upper: center + margin,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GroupSummary {
    pub label: String,
    pub n: usize,
    pub mean: f64,
    pub std_dev: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    pub test: TestId,
    pub variables: Vec<String>,
    pub statistic: f64,
    pub p_value: f64,
    pub significant: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub degrees_of_freedom: Option<f64>,
    /// Within-groups degrees of freedom for ANOVA.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_degrees_of_freedom: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effect_size: Option<EffectSize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence_interval: Option<ConfidenceInterval>,
    pub sample_size: usize,
    pub interpretation: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assumptions: Option<Assumptions>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<GroupSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distribution: Option<DistributionShape>,
}

/// Runs `test` against the store's current snapshot.
pub fn run_test(
    store: &SnapshotStore,
    mode: PValueMode,
    test: TestId,
    primary: &str,
    secondary: Option<&str>,
) -> WorkbenchResult<TestResult> {
    if !store.is_loaded() {
        return Err(WorkbenchError::NotLoaded);
    }
    let variables = store.current_variables();
    let rows = store.all_rows();
    let first = lookup(variables, primary)?;
    let second = if test.needs_second_variable() {
        let name = secondary.ok_or_else(|| WorkbenchError::MissingSecondVariable {
            test: test.to_string(),
        })?;
        Some(lookup(variables, name)?)
    } else {
        None
    };

    let result = match (test, second) {
        (TestId::Normality, _) => {
            require_type(first, first.is_numeric(), "numeric")?;
            let values = numeric_column(rows, &first.name);
            procedures::normality(mode, &first.name, &values)
        }
        (TestId::IndependentTTest, Some(second)) => {
            let (grouping, outcome) = grouping_and_outcome(first, second)?;
            let groups = extract_groups(rows, grouping, outcome);
            procedures::independent_t_test(mode, &grouping.name, &outcome.name, &groups)
        }
        (TestId::OneWayAnova, Some(second)) => {
            let (grouping, outcome) = grouping_and_outcome(first, second)?;
            let groups = extract_groups(rows, grouping, outcome);
            procedures::one_way_anova(mode, &grouping.name, &outcome.name, &groups)
        }
        (TestId::PearsonCorrelation, Some(second)) => {
            require_type(first, first.is_numeric(), "numeric")?;
            require_type(second, second.is_numeric(), "numeric")?;
            let pairs = rows
                .iter()
                .filter_map(|row| {
                    let x = row.get(&first.name)?.as_number()?;
                    let y = row.get(&second.name)?.as_number()?;
                    Some((x, y))
                })
                .collect::<Vec<_>>();
            procedures::pearson_correlation(mode, &first.name, &second.name, &pairs)
        }
        (TestId::ChiSquare, Some(second)) => {
            require_type(first, first.is_categorical(), "categorical")?;
            require_type(second, second.is_categorical(), "categorical")?;
            let pairs = rows
                .iter()
                .filter_map(|row| {
                    let a = row.get(&first.name)?.label()?;
                    let b = row.get(&second.name)?.label()?;
                    Some((a, b))
                })
                .collect::<Vec<_>>();
            let row_labels = ordered_categories(first, pairs.iter().map(|p| p.0.as_str()));
            let column_labels = ordered_categories(second, pairs.iter().map(|p| p.1.as_str()));
            procedures::chi_square(
                mode,
                &first.name,
                &second.name,
                &row_labels,
                &column_labels,
                &pairs,
            )
        }
        (_, None) => Err(WorkbenchError::MissingSecondVariable {
            test: test.to_string(),
        }),
    }?;

    info!(
        "Ran {} on {} (n = {}, p = {:.4})",
        test,
        result.variables.join(" x "),
        result.sample_size,
        result.p_value
    );
    Ok(result)
}

fn lookup<'a>(variables: &'a [VariableDescriptor], name: &str) -> WorkbenchResult<&'a VariableDescriptor> {
    variable::find(variables, name).ok_or_else(|| WorkbenchError::UnknownVariable {
        name: name.to_string(),
    })
}

fn require_type(variable: &VariableDescriptor, ok: bool, expected: &str) -> WorkbenchResult<()> {
    if ok {
        return Ok(());
    }
    Err(WorkbenchError::VariableType {
        name: variable.name.clone(),
        expected: expected.to_string(),
        actual: variable.var_type.to_string(),
    })
}

/// Accepts the categorical/numeric pair in either order.
fn grouping_and_outcome<'a>(
    first: &'a VariableDescriptor,
    second: &'a VariableDescriptor,
) -> WorkbenchResult<(&'a VariableDescriptor, &'a VariableDescriptor)> {
    if first.is_categorical() && second.is_numeric() {
        return Ok((first, second));
    }
    if first.is_numeric() && second.is_categorical() {
        return Ok((second, first));
    }
    let usable = |v: &VariableDescriptor| v.is_categorical() || v.is_numeric();
    let (offender, expected) = if !usable(first) {
        (first, "categorical or numeric")
    } else if !usable(second) {
        (second, "categorical or numeric")
    } else if first.is_categorical() {
        (second, "numeric")
    } else {
        (second, "categorical")
    };
    Err(WorkbenchError::VariableType {
        name: offender.name.clone(),
        expected: expected.to_string(),
        actual: offender.var_type.to_string(),
    })
}

fn numeric_column(rows: &[Row], column: &str) -> Vec<f64> {
    rows.iter()
        .filter_map(|row| row.get(column)?.as_number())
        .collect()
}

/// One group per category present in the grouping column, in code order.
/// Pairs each row's group label with its numeric outcome. Only categories
/// with at least one outcome form a group; rows missing either side are
/// left out.
fn extract_groups(
    rows: &[Row],
    grouping: &VariableDescriptor,
    outcome: &VariableDescriptor,
) -> Vec<Group> {
    let observations = rows
        .iter()
        .filter_map(|row| {
            let label = row.get(&grouping.name).and_then(|v| v.label())?;
            let value = row.get(&outcome.name).and_then(|v| v.as_number())?;
            Some((label, value))
        })
        .collect::<Vec<_>>();
    let order = ordered_categories(grouping, observations.iter().map(|(label, _)| label.as_str()));
    let mut groups = order
        .into_iter()
        .map(|label| Group {
            label,
            values: Vec::new(),
        })
        .collect::<Vec<_>>();
    for (label, value) in observations {
        if let Some(group) = groups.iter_mut().find(|g| g.label == label) {
            group.values.push(value);
        }
    }
    groups
}

/// Labels observed in `observed`, ordered by the variable's coding with
/// uncoded labels appended in first-seen order.
fn ordered_categories<'a>(
    variable: &VariableDescriptor,
    observed: impl Iterator<Item = &'a str>,
) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut first_seen = Vec::new();
    for label in observed {
        if seen.insert(label) {
            first_seen.push(label.to_string());
        }
    }
    let mut ordered = variable
        .categories_by_code()
        .into_iter()
        .filter(|label| seen.contains(label.as_str()))
        .collect::<Vec<_>>();
    for label in first_seen {
        if !ordered.contains(&label) {
            ordered.push(label);
        }
    }
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        data::Value,
        store::UploadInfo,
        variable::{VariableType, dense_coding, refresh_all},
    };

    fn loaded_store() -> SnapshotStore {
        let rows = (0..12)
            .map(|i| {
                Row::from([
                    (
                        "group".to_string(),
                        Value::text(["b", "a", "c"][i % 3]),
                    ),
                    ("score".to_string(), Value::Number(i as f64)),
                    ("note".to_string(), Value::text(format!("n{i}"))),
                ])
            })
            .collect::<Vec<_>>();
        let mut group = VariableDescriptor::new("group", VariableType::Categorical);
        group.coding = Some(dense_coding(&[
            "a".to_string(),
            "b".to_string(),
            "c".to_string(),
        ]));
        let mut variables = vec![
            group,
            VariableDescriptor::new("score", VariableType::Numeric),
            VariableDescriptor::new("note", VariableType::Text),
        ];
        refresh_all(&mut variables, &rows);
        let mut store = SnapshotStore::new();
        store
            .load(rows, variables, UploadInfo::new("fixture.csv"))
            .unwrap();
        store
    }

    #[test]
    fn test_ids_parse_aliases() {
        assert_eq!("t-test".parse::<TestId>().unwrap(), TestId::IndependentTTest);
        assert_eq!("one_way_anova".parse::<TestId>().unwrap(), TestId::OneWayAnova);
        assert!("regression".parse::<TestId>().is_err());
        assert_eq!(
            serde_json::to_string(&TestId::ChiSquare).unwrap(),
            "\"chi-square\""
        );
    }

    #[test]
    fn requires_loaded_store() {
        let store = SnapshotStore::new();
        assert_eq!(
            run_test(&store, PValueMode::Approximate, TestId::Normality, "x", None),
            Err(WorkbenchError::NotLoaded)
        );
    }

    #[test]
    fn groups_follow_coding_order_in_either_argument_order() {
        let store = loaded_store();
        let result = run_test(
            &store,
            PValueMode::Approximate,
            TestId::OneWayAnova,
            "score",
            Some("group"),
        )
        .unwrap();
        let labels = result.groups.iter().map(|g| g.label.as_str()).collect::<Vec<_>>();
        assert_eq!(labels, vec!["a", "b", "c"]);
        assert_eq!(result.variables, vec!["group", "score"]);
        assert_eq!(result.sample_size, 12);
    }

    #[test]
    fn t_test_on_three_groups_is_a_group_count_error() {
        let store = loaded_store();
        let err = run_test(
            &store,
            PValueMode::Approximate,
            TestId::IndependentTTest,
            "group",
            Some("score"),
        )
        .unwrap_err();
        assert!(matches!(err, WorkbenchError::GroupCount { found: 3, .. }));
        assert!(err.is_precondition());
    }

    #[test]
    fn type_and_arity_errors_are_typed() {
        let store = loaded_store();
        assert!(matches!(
            run_test(&store, PValueMode::Approximate, TestId::PearsonCorrelation, "score", None),
            Err(WorkbenchError::MissingSecondVariable { .. })
        ));
        assert!(matches!(
            run_test(&store, PValueMode::Approximate, TestId::Normality, "ghost", None),
            Err(WorkbenchError::UnknownVariable { .. })
        ));
        assert!(matches!(
            run_test(&store, PValueMode::Approximate, TestId::Normality, "group", None),
            Err(WorkbenchError::VariableType { .. })
        ));
        assert!(matches!(
            run_test(
                &store,
                PValueMode::Approximate,
                TestId::OneWayAnova,
                "note",
                Some("score")
            ),
            Err(WorkbenchError::VariableType { name, .. }) if name == "note"
        ));
    }

    #[test]
    fn categories_without_outcomes_do_not_count_as_groups() {
        let mut rows = (0..10)
            .map(|i| {
                Row::from([
                    ("arm".to_string(), Value::text(["x", "y"][i % 2])),
                    ("score".to_string(), Value::Number((i % 4) as f64)),
                ])
            })
            .collect::<Vec<_>>();
        rows.push(Row::from([
            ("arm".to_string(), Value::text("z")),
            ("score".to_string(), Value::Null),
        ]));
        let mut arm = VariableDescriptor::new("arm", VariableType::Categorical);
        arm.coding = Some(dense_coding(&["x".to_string(), "y".to_string(), "z".to_string()]));
        let mut variables = vec![arm, VariableDescriptor::new("score", VariableType::Numeric)];
        refresh_all(&mut variables, &rows);
        let mut store = SnapshotStore::new();
        store
            .load(rows, variables, UploadInfo::new("arms.csv"))
            .unwrap();

        let result = run_test(
            &store,
            PValueMode::Approximate,
            TestId::IndependentTTest,
            "arm",
            Some("score"),
        )
        .unwrap();
        assert_eq!(result.groups.len(), 2);
        assert_eq!(result.sample_size, 10);
    }
}
