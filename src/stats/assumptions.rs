//! Assumption diagnostics for the group comparison tests.

use serde::Serialize;

use super::{
    descriptive::{self, KURTOSIS_LIMIT, SKEWNESS_LIMIT},
    procedures::Group,
};

/// Largest/smallest group variance beyond which equal variances are doubtful.
pub const VARIANCE_RATIO_LIMIT: f64 = 4.0;

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GroupNormality {
    pub group: String,
    pub n: usize,
    pub skewness: f64,
    pub excess_kurtosis: f64,
    /// `None` when the group is too small to judge.
    pub normal: Option<bool>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Homogeneity {
    pub variance_ratio: f64,
    pub homogeneous: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Assumptions {
    pub normality: Vec<GroupNormality>,
    pub homogeneity: Homogeneity,
    pub satisfied: bool,
    pub recommendations: Vec<String>,
}

/// Names of the fallback procedures suggested when an assumption fails.
#[derive(Debug, Clone, Copy)]
pub struct Alternatives {
    pub non_parametric: &'static str,
    pub unequal_variance: &'static str,
}

pub const T_TEST_ALTERNATIVES: Alternatives = Alternatives {
    non_parametric: "Mann-Whitney U test",
    unequal_variance: "Welch's t-test",
};

pub const ANOVA_ALTERNATIVES: Alternatives = Alternatives {
    non_parametric: "Kruskal-Wallis test",
    unequal_variance: "Welch's ANOVA",
};

pub fn check_groups(groups: &[Group], alternatives: Alternatives) -> Assumptions {
    let normality = groups
        .iter()
        .map(|group| {
            let (skewness, excess_kurtosis) = descriptive::shape(&group.values);
            let normal = (group.values.len() >= 3).then(|| {
                skewness.abs() < SKEWNESS_LIMIT && excess_kurtosis.abs() < KURTOSIS_LIMIT
            });
            GroupNormality {
                group: group.label.clone(),
                n: group.values.len(),
                skewness,
                excess_kurtosis,
                normal,
            }
        })
        .collect::<Vec<_>>();

    let variances = groups
        .iter()
        .filter_map(|group| descriptive::variance(&group.values))
        .collect::<Vec<_>>();
    let variance_ratio = variance_ratio(&variances);
    let homogeneity = Homogeneity {
        variance_ratio,
        homogeneous: variance_ratio < VARIANCE_RATIO_LIMIT,
    };

    let mut recommendations = Vec::new();
    let skewed = normality
        .iter()
        .filter(|g| g.normal == Some(false))
        .map(|g| format!("'{}'", g.group))
        .collect::<Vec<_>>();
    if !skewed.is_empty() {
        recommendations.push(format!(
            "Group(s) {} depart from normality; consider the {}.",
            skewed.join(", "),
            alternatives.non_parametric
        ));
    }
    if !homogeneity.homogeneous {
        recommendations.push(format!(
            "Largest/smallest variance ratio is {:.2} (limit {VARIANCE_RATIO_LIMIT}); consider {}.",
            variance_ratio, alternatives.unequal_variance
        ));
    }

    Assumptions {
        satisfied: recommendations.is_empty(),
        normality,
        homogeneity,
        recommendations,
    }
}

fn variance_ratio(variances: &[f64]) -> f64 {
    let max = variances.iter().copied().fold(0.0_f64, f64::max);
    let min = variances.iter().copied().fold(f64::INFINITY, f64::min);
    if variances.is_empty() || max == 0.0 {
        1.0
    } else if min == 0.0 {
        f64::INFINITY
    } else {
        max / min
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(label: &str, values: &[f64]) -> Group {
        Group {
            label: label.to_string(),
            values: values.to_vec(),
        }
    }

    #[test]
    fn well_behaved_groups_pass() {
        let groups = [
            group("a", &[1.0, 2.0, 3.0, 4.0, 5.0]),
            group("b", &[2.0, 3.0, 4.0, 5.0, 6.0]),
        ];
        let assumptions = check_groups(&groups, T_TEST_ALTERNATIVES);
        assert!(assumptions.satisfied);
        assert_eq!(assumptions.homogeneity.variance_ratio, 1.0);
        assert!(assumptions.recommendations.is_empty());
    }

    #[test]
    fn unequal_variances_recommend_welch() {
        let groups = [
            group("narrow", &[4.9, 5.0, 5.1, 5.0]),
            group("wide", &[1.0, 9.0, 2.0, 8.0]),
        ];
        let assumptions = check_groups(&groups, T_TEST_ALTERNATIVES);
        assert!(!assumptions.homogeneity.homogeneous);
        assert!(
            assumptions
                .recommendations
                .iter()
                .any(|r| r.contains("Welch's t-test"))
        );
    }

    #[test]
    fn skewed_group_recommends_non_parametric() {
        let mut skewed = vec![1.0; 20];
        skewed.push(50.0);
        let groups = [
            group("a", &skewed),
            group("b", &[1.0, 2.0, 3.0]),
            group("c", &[2.0, 3.0, 4.0]),
        ];
        let assumptions = check_groups(&groups, ANOVA_ALTERNATIVES);
        assert_eq!(assumptions.normality[0].normal, Some(false));
        assert!(
            assumptions
                .recommendations
                .iter()
                .any(|r| r.contains("Kruskal-Wallis"))
        );
    }

    #[test]
    fn tiny_groups_are_not_judged() {
        let groups = [group("a", &[1.0, 2.0]), group("b", &[3.0, 4.0])];
        let assumptions = check_groups(&groups, T_TEST_ALTERNATIVES);
        assert!(assumptions.normality.iter().all(|g| g.normal.is_none()));
    }

    #[test]
    fn zero_variance_group_makes_ratio_infinite() {
        assert_eq!(variance_ratio(&[0.0, 2.0]), f64::INFINITY);
        assert_eq!(variance_ratio(&[0.0, 0.0]), 1.0);
    }
}
