//! Test procedures over already-extracted columns.
//!
//! Each function validates its own preconditions and returns a fully
//! populated [`TestResult`]; the column extraction lives in the parent
//! module.

use std::collections::HashMap;

use crate::error::{WorkbenchError, WorkbenchResult};

use super::{
    ConfidenceInterval, EffectSize, GroupSummary, Magnitude, TestId, TestResult,
    assumptions::{self, ANOVA_ALTERNATIVES, T_TEST_ALTERNATIVES},
    descriptive::{self, DistributionShape},
    pvalue::{self, PValueMode, Reference},
};

const Z_95: f64 = 1.96;
const R_CLAMP: f64 = 0.999_999;

/// Outcome values observed for one category of a grouping variable.
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub label: String,
    pub values: Vec<f64>,
}

impl Group {
    fn summary(&self) -> GroupSummary {
        GroupSummary {
            label: self.label.clone(),
            n: self.values.len(),
            mean: descriptive::mean(&self.values).unwrap_or(f64::NAN),
            std_dev: descriptive::std_dev(&self.values).unwrap_or(0.0),
        }
    }
}

pub fn independent_t_test(
    mode: PValueMode,
    grouping: &str,
    outcome: &str,
    groups: &[Group],
) -> WorkbenchResult<TestResult> {
    let test = TestId::IndependentTTest;
    if groups.len() != 2 {
        return Err(WorkbenchError::GroupCount {
            test: test.to_string(),
            variable: grouping.to_string(),
            expected: "exactly 2".to_string(),
            found: groups.len(),
        });
    }
    require_group_sizes(test, groups)?;

    let (first, second) = (&groups[0], &groups[1]);
    let (n1, n2) = (first.values.len() as f64, second.values.len() as f64);
    let mean1 = descriptive::mean(&first.values).unwrap_or_default();
    let mean2 = descriptive::mean(&second.values).unwrap_or_default();
    let var1 = descriptive::variance(&first.values).unwrap_or_default();
    let var2 = descriptive::variance(&second.values).unwrap_or_default();

    let df = n1 + n2 - 2.0;
    let pooled = ((n1 - 1.0) * var1 + (n2 - 1.0) * var2) / df;
    if pooled <= 0.0 {
        return Err(WorkbenchError::ZeroVariance {
            test: test.to_string(),
            variable: outcome.to_string(),
        });
    }
    let se = (pooled * (1.0 / n1 + 1.0 / n2)).sqrt();
    let difference = mean1 - mean2;
    let t = difference / se;
    let p_value = pvalue::p_value(mode, test.as_str(), t, Reference::T { df });
    let d = difference.abs() / pooled.sqrt();
    let effect = EffectSize::new("Cohen's d", d, [0.2, 0.5, 0.8]);

    let interpretation = format!(
        "{} in {outcome} between {} (M = {:.2}) and {} (M = {:.2}), t({df}) = {t:.2}, p {}, d = {d:.2} ({} effect).",
        significance_phrase(p_value, "difference"),
        first.label,
        mean1,
        second.label,
        mean2,
        format_p(p_value),
        effect.magnitude,
    );

    Ok(TestResult {
        test,
        variables: vec![grouping.to_string(), outcome.to_string()],
        statistic: t,
        p_value,
        significant: p_value < super::ALPHA,
        degrees_of_freedom: Some(df),
        error_degrees_of_freedom: None,
        effect_size: Some(effect),
        confidence_interval: Some(ConfidenceInterval::around(difference, Z_95 * se)),
        sample_size: (n1 + n2) as usize,
        interpretation,
        assumptions: Some(assumptions::check_groups(groups, T_TEST_ALTERNATIVES)),
        groups: groups.iter().map(Group::summary).collect(),
        distribution: None,
    })
}

pub fn one_way_anova(
    mode: PValueMode,
    grouping: &str,
    outcome: &str,
    groups: &[Group],
) -> WorkbenchResult<TestResult> {
    let test = TestId::OneWayAnova;
    if groups.len() < 3 {
        return Err(WorkbenchError::GroupCount {
            test: test.to_string(),
            variable: grouping.to_string(),
            expected: "at least 3".to_string(),
            found: groups.len(),
        });
    }
    require_group_sizes(test, groups)?;

    let total = groups.iter().map(|g| g.values.len()).sum::<usize>();
    let grand_mean = groups.iter().flat_map(|g| g.values.iter()).sum::<f64>() / total as f64;
    let (mut ss_between, mut ss_within) = (0.0, 0.0);
    for group in groups {
        let mean = descriptive::mean(&group.values).unwrap_or_default();
        ss_between += group.values.len() as f64 * (mean - grand_mean).powi(2);
        ss_within += group.values.iter().map(|v| (v - mean).powi(2)).sum::<f64>();
    }
    if ss_within <= 0.0 {
        return Err(WorkbenchError::ZeroVariance {
            test: test.to_string(),
            variable: outcome.to_string(),
        });
    }

    let df_between = (groups.len() - 1) as f64;
    let df_within = (total - groups.len()) as f64;
    let f = (ss_between / df_between) / (ss_within / df_within);
    let p_value = pvalue::p_value(
        mode,
        test.as_str(),
        f,
        Reference::F {
            df1: df_between,
            df2: df_within,
        },
    );
    let eta_squared = ss_between / (ss_between + ss_within);
    let effect = EffectSize::new("eta-squared", eta_squared, [0.01, 0.06, 0.14]);

    let interpretation = format!(
        "{} in {outcome} across {} groups of {grouping}, F({df_between}, {df_within}) = {f:.2}, p {}, eta-squared = {eta_squared:.3} ({} effect).",
        significance_phrase(p_value, "difference"),
        groups.len(),
        format_p(p_value),
        effect.magnitude,
    );

    Ok(TestResult {
        test,
        variables: vec![grouping.to_string(), outcome.to_string()],
        statistic: f,
        p_value,
        significant: p_value < super::ALPHA,
        degrees_of_freedom: Some(df_between),
        error_degrees_of_freedom: Some(df_within),
        effect_size: Some(effect),
        confidence_interval: None,
        sample_size: total,
        interpretation,
        assumptions: Some(assumptions::check_groups(groups, ANOVA_ALTERNATIVES)),
        groups: groups.iter().map(Group::summary).collect(),
        distribution: None,
    })
}

/// Pearson correlation over complete pairs. The reported statistic is `r`;
/// significance comes from `t = r * sqrt(df) / sqrt(1 - r^2)`.
pub fn pearson_correlation(
    mode: PValueMode,
    first: &str,
    second: &str,
    pairs: &[(f64, f64)],
) -> WorkbenchResult<TestResult> {
    let test = TestId::PearsonCorrelation;
    let n = pairs.len();
    if n < 3 {
        return Err(WorkbenchError::InsufficientObservations {
            test: test.to_string(),
            context: format!("complete pairs of '{first}' and '{second}'"),
            required: 3,
            found: n,
        });
    }
    let mean_x = pairs.iter().map(|p| p.0).sum::<f64>() / n as f64;
    let mean_y = pairs.iter().map(|p| p.1).sum::<f64>() / n as f64;
    let (mut sxx, mut syy, mut sxy) = (0.0, 0.0, 0.0);
    for (x, y) in pairs {
        let (dx, dy) = (x - mean_x, y - mean_y);
        sxx += dx * dx;
        syy += dy * dy;
        sxy += dx * dy;
    }
    for (variable, spread) in [(first, sxx), (second, syy)] {
        if spread <= 0.0 {
            return Err(WorkbenchError::ZeroVariance {
                test: test.to_string(),
                variable: variable.to_string(),
            });
        }
    }

    let r = (sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0);
    let df = (n - 2) as f64;
    let t = if r.abs() >= 1.0 {
        f64::INFINITY.copysign(r)
    } else {
        r * df.sqrt() / (1.0 - r * r).sqrt()
    };
    let p_value = pvalue::p_value(mode, test.as_str(), t, Reference::T { df });
    let effect = EffectSize::new("r", r, [0.1, 0.3, 0.5]);

    let confidence_interval = (n > 3).then(|| {
        let z = r.clamp(-R_CLAMP, R_CLAMP).atanh();
        let margin = Z_95 / ((n - 3) as f64).sqrt();
        ConfidenceInterval {
            level: 0.95,
            lower: (z - margin).tanh(),
            upper: (z + margin).tanh(),
        }
    });

    let direction = if r >= 0.0 { "positive" } else { "negative" };
    let interpretation = format!(
        "{} between {first} and {second}: {} {direction} correlation, r({df}) = {r:.3}, p {}.",
        significance_phrase(p_value, "relationship"),
        effect.magnitude,
        format_p(p_value),
    );

    Ok(TestResult {
        test,
        variables: vec![first.to_string(), second.to_string()],
        statistic: r,
        p_value,
        significant: p_value < super::ALPHA,
        degrees_of_freedom: Some(df),
        error_degrees_of_freedom: None,
        effect_size: Some(effect),
        confidence_interval,
        sample_size: n,
        interpretation,
        assumptions: None,
        groups: Vec::new(),
        distribution: None,
    })
}

/// Chi-square test of independence. `row_labels` and `column_labels` fix
/// the category order; every pair must use labels from those lists.
pub fn chi_square(
    mode: PValueMode,
    first: &str,
    second: &str,
    row_labels: &[String],
    column_labels: &[String],
    pairs: &[(String, String)],
) -> WorkbenchResult<TestResult> {
    let test = TestId::ChiSquare;
    for (variable, labels) in [(first, row_labels), (second, column_labels)] {
        if labels.len() < 2 {
            return Err(WorkbenchError::CategoryCount {
                test: test.to_string(),
                variable: variable.to_string(),
                found: labels.len(),
            });
        }
    }
    let row_index = index_of(row_labels);
    let column_index = index_of(column_labels);
    let mut observed = vec![vec![0usize; column_labels.len()]; row_labels.len()];
    for (row, column) in pairs {
        if let (Some(&r), Some(&c)) = (row_index.get(row.as_str()), column_index.get(column.as_str())) {
            observed[r][c] += 1;
        }
    }

    let n = observed.iter().flatten().sum::<usize>();
    let row_totals = observed.iter().map(|row| row.iter().sum::<usize>()).collect::<Vec<_>>();
    let column_totals = (0..column_labels.len())
        .map(|c| observed.iter().map(|row| row[c]).sum::<usize>())
        .collect::<Vec<_>>();

    let mut statistic = 0.0;
    for (r, row) in observed.iter().enumerate() {
        for (c, &count) in row.iter().enumerate() {
            let expected = (row_totals[r] * column_totals[c]) as f64 / n as f64;
            if expected > 0.0 {
                statistic += (count as f64 - expected).powi(2) / expected;
            }
        }
    }

    let df = ((row_labels.len() - 1) * (column_labels.len() - 1)) as f64;
    let p_value = pvalue::p_value(mode, test.as_str(), statistic, Reference::ChiSquare { df });
    let smaller = row_labels.len().min(column_labels.len()) as f64;
    let cramers_v = if n == 0 {
        0.0
    } else {
        (statistic / (n as f64 * (smaller - 1.0))).sqrt()
    };
    let effect = EffectSize::new("Cramér's V", cramers_v, [0.1, 0.3, 0.5]);

    let interpretation = format!(
        "{} between {first} and {second}, chi-square({df}, N = {n}) = {statistic:.2}, p {}, Cramér's V = {cramers_v:.3} ({} effect).",
        significance_phrase(p_value, "association"),
        format_p(p_value),
        effect.magnitude,
    );

    Ok(TestResult {
        test,
        variables: vec![first.to_string(), second.to_string()],
        statistic,
        p_value,
        significant: p_value < super::ALPHA,
        degrees_of_freedom: Some(df),
        error_degrees_of_freedom: None,
        effect_size: Some(effect),
        confidence_interval: None,
        sample_size: n,
        interpretation,
        assumptions: None,
        groups: Vec::new(),
        distribution: None,
    })
}

/// Moment-based normality screen. The statistic is Jarque-Bera; `significant`
/// means the data depart from normality.
pub fn normality(mode: PValueMode, variable: &str, values: &[f64]) -> WorkbenchResult<TestResult> {
    let test = TestId::Normality;
    let Some(shape) = DistributionShape::of(values).filter(|s| s.n >= 3) else {
        return Err(WorkbenchError::InsufficientObservations {
            test: test.to_string(),
            context: format!("'{variable}'"),
            required: 3,
            found: values.len(),
        });
    };
    let n = values.len() as f64;
    let jarque_bera =
        n / 6.0 * (shape.skewness.powi(2) + shape.excess_kurtosis.powi(2) / 4.0);
    let p_value = match mode {
        PValueMode::Approximate if shape.normal => {
            pvalue::non_significant(test.as_str(), jarque_bera)
        }
        PValueMode::Approximate => 0.01,
        PValueMode::Exact => pvalue::exact(jarque_bera, Reference::ChiSquare { df: 2.0 }),
    };

    let verdict = if shape.normal {
        "approximately normal"
    } else {
        "not normal"
    };
    let interpretation = format!(
        "{variable} appears {verdict} (M = {:.2}, SD = {:.2}, skewness = {:.2}, excess kurtosis = {:.2}).",
        shape.mean, shape.std_dev, shape.skewness, shape.excess_kurtosis
    );

    Ok(TestResult {
        test,
        variables: vec![variable.to_string()],
        statistic: jarque_bera,
        p_value,
        significant: p_value < super::ALPHA,
        degrees_of_freedom: None,
        error_degrees_of_freedom: None,
        effect_size: None,
        confidence_interval: None,
        sample_size: shape.n,
        interpretation,
        assumptions: None,
        groups: Vec::new(),
        distribution: Some(shape),
    })
}

fn require_group_sizes(test: TestId, groups: &[Group]) -> WorkbenchResult<()> {
    if let Some(small) = groups.iter().find(|g| g.values.len() < 2) {
        return Err(WorkbenchError::InsufficientObservations {
            test: test.to_string(),
            context: format!("group '{}'", small.label),
            required: 2,
            found: small.values.len(),
        });
    }
    Ok(())
}

fn index_of(labels: &[String]) -> HashMap<&str, usize> {
    labels
        .iter()
        .enumerate()
        .map(|(idx, label)| (label.as_str(), idx))
        .collect()
}

fn significance_phrase(p_value: f64, noun: &str) -> String {
    if p_value < super::ALPHA {
        format!("Statistically significant {noun}")
    } else {
        format!("No statistically significant {noun}")
    }
}

pub fn format_p(p_value: f64) -> String {
    if p_value < 0.001 {
        "< .001".to_string()
    } else {
        format!("= {p_value:.3}")
    }
}

impl EffectSize {
    fn new(measure: &str, value: f64, thresholds: [f64; 3]) -> Self {
        let size = value.abs();
        let magnitude = if size >= thresholds[2] {
            Magnitude::Large
        } else if size >= thresholds[1] {
            Magnitude::Medium
        } else if size >= thresholds[0] {
            Magnitude::Small
        } else {
            Magnitude::Negligible
        };
        Self {
            measure: measure.to_string(),
            value,
            magnitude,
        }
    }
}
