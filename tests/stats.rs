mod common;

use common::workbench_with_config;
use survey_workbench::{
    config::WorkbenchConfig,
    error::WorkbenchError,
    stats::{PValueMode, TestId},
};

const SPREAD: [f64; 5] = [-2.0, -1.0, 0.0, 1.0, 2.0];

fn config(mode: PValueMode) -> WorkbenchConfig {
    WorkbenchConfig {
        p_value_mode: mode,
        ..WorkbenchConfig::default()
    }
}

/// Deviations for 30 respondents: mean 0, sample variance exactly 4
/// (squares sum to 116 = 4 * 29).
fn deviation(i: usize) -> f64 {
    match i {
        26 => 3.0,
        27..=29 => -1.0,
        _ if i % 2 == 0 => 2.0,
        _ => -2.0,
    }
}

/// 30 respondents per arm, means 10 and 20, variance 4 in each arm.
fn two_arm_records() -> Vec<Vec<String>> {
    (0..60)
        .map(|i| {
            let (arm, mean) = if i < 30 { ("control", 10.0) } else { ("treated", 20.0) };
            vec![arm.to_string(), (mean + deviation(i % 30)).to_string()]
        })
        .collect()
}

#[test]
fn clearly_separated_means_are_significant() {
    for mode in [PValueMode::Approximate, PValueMode::Exact] {
        let workbench = workbench_with_config(&["arm", "score"], &two_arm_records(), config(mode));
        let result = workbench
            .run_test(TestId::IndependentTTest, "arm", Some("score"))
            .expect("t-test");
        assert!(result.statistic.abs() > 10.0, "t = {}", result.statistic);
        assert!(result.significant);
        assert!(result.p_value < 0.001 + f64::EPSILON);
        assert_eq!(result.degrees_of_freedom, Some(58.0));
        for group in &result.groups {
            assert!((group.std_dev - 2.0).abs() < 1e-9, "sd = {}", group.std_dev);
        }
        let ci = result.confidence_interval.expect("confidence interval");
        assert!(ci.lower < -10.0 + 1.0 && ci.upper > -10.0 - 1.0);
    }
}

#[test]
fn variable_correlates_perfectly_with_itself() {
    let records = (0..25)
        .map(|i| {
            let x = (i * 3 % 11) as f64 + 0.5;
            vec![x.to_string(), x.to_string()]
        })
        .collect::<Vec<_>>();
    let workbench = workbench_with_config(&["x", "x_copy"], &records, config(PValueMode::Exact));
    let result = workbench
        .run_test(TestId::PearsonCorrelation, "x", Some("x_copy"))
        .expect("pearson");
    assert!((result.statistic - 1.0).abs() < 1e-9);
    assert!(result.significant);
    assert_eq!(result.degrees_of_freedom, Some(23.0));
}

#[test]
fn chi_square_degrees_of_freedom_follow_table_shape() {
    let regions = ["north", "south", "east"];
    let answers = ["never", "rarely", "often", "always"];
    let records = (0..120)
        .map(|i| {
            vec![
                regions[i % 3].to_string(),
                answers[(i / 3) % 4].to_string(),
            ]
        })
        .collect::<Vec<_>>();
    let workbench = workbench_with_config(
        &["region", "answer"],
        &records,
        config(PValueMode::Approximate),
    );
    let result = workbench
        .run_test(TestId::ChiSquare, "region", Some("answer"))
        .expect("chi-square");
    assert_eq!(result.degrees_of_freedom, Some(6.0));
    assert_eq!(result.sample_size, 120);
    let effect = result.effect_size.expect("Cramér's V");
    assert!((0.0..=1.0).contains(&effect.value));
}

#[test]
fn anova_across_three_arms() {
    let records = (0..45)
        .map(|i| {
            let arm = ["a", "b", "c"][i % 3];
            let base = [5.0, 10.0, 15.0][i % 3];
            vec![arm.to_string(), (base + SPREAD[(i / 3) % 5]).to_string()]
        })
        .collect::<Vec<_>>();
    let workbench = workbench_with_config(&["arm", "score"], &records, config(PValueMode::Exact));
    let result = workbench
        .run_test(TestId::OneWayAnova, "score", Some("arm"))
        .expect("anova");
    assert_eq!(result.degrees_of_freedom, Some(2.0));
    assert_eq!(result.error_degrees_of_freedom, Some(42.0));
    assert!(result.significant);
    let labels = result
        .groups
        .iter()
        .map(|g| g.label.as_str())
        .collect::<Vec<_>>();
    assert_eq!(labels, vec!["a", "b", "c"]);
}

#[test]
fn normality_flags_heavy_tail() {
    let mut records = (0..40).map(|_| vec!["1".to_string()]).collect::<Vec<_>>();
    records.push(vec!["2".to_string()]);
    records.push(vec!["500".to_string()]);
    let workbench = workbench_with_config(&["income"], &records, config(PValueMode::Approximate));
    let result = workbench
        .run_test(TestId::Normality, "income", None)
        .expect("normality");
    let shape = result.distribution.expect("distribution");
    assert!(!shape.normal);
    assert!(result.significant);
}

#[test]
fn approximate_p_values_are_reproducible() {
    let records = (0..30)
        .map(|i| vec![(i % 7).to_string(), ((i * 5) % 11).to_string()])
        .collect::<Vec<_>>();
    let first = workbench_with_config(&["a", "b"], &records, config(PValueMode::Approximate))
        .run_test(TestId::PearsonCorrelation, "a", Some("b"))
        .expect("pearson");
    let second = workbench_with_config(&["a", "b"], &records, config(PValueMode::Approximate))
        .run_test(TestId::PearsonCorrelation, "a", Some("b"))
        .expect("pearson");
    assert_eq!(first.p_value, second.p_value);
}

#[test]
fn too_few_pairs_is_a_precondition_error() {
    let records = vec![
        vec!["1".to_string(), "2".to_string()],
        vec!["2".to_string(), "".to_string()],
        vec!["3".to_string(), "5".to_string()],
    ];
    let workbench = workbench_with_config(&["a", "b"], &records, config(PValueMode::Approximate));
    let err = workbench
        .run_test(TestId::PearsonCorrelation, "a", Some("b"))
        .expect_err("two pairs");
    assert!(matches!(
        err,
        WorkbenchError::InsufficientObservations { found: 2, .. }
    ));
    assert!(err.is_precondition());
}
