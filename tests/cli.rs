mod common;

use std::fs;

use assert_cmd::Command;
use common::{TestWorkspace, csv_text, survey_records};
use predicates::str::contains;

fn workbench_cmd() -> Command {
    let mut cmd = Command::cargo_bin("survey-workbench").expect("binary exists");
    cmd.env("RUST_LOG", "error");
    cmd
}

fn survey_file(workspace: &TestWorkspace) -> std::path::PathBuf {
    let (headers, records) = survey_records();
    workspace.write("survey.csv", &csv_text(&headers, &records))
}

const FILL_GENDER: &str = "- kind: missingValues\n  strategies:\n    gender: mode\n";

#[test]
fn probe_lists_inferred_types() {
    let workspace = TestWorkspace::new();
    let input = survey_file(&workspace);
    workbench_cmd()
        .args(["probe", "-i", input.to_str().unwrap()])
        .assert()
        .success()
        .stdout(contains("gender"))
        .stdout(contains("categorical"))
        .stdout(contains("Male | Female"));
}

#[test]
fn probe_reads_semicolon_input() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("scores.csv", "name;score\nann;1\nbob;2\ncy;3\n");
    let output = workbench_cmd()
        .args([
            "probe",
            "-i",
            input.to_str().unwrap(),
            "--delimiter",
            ";",
            "--format",
            "json",
        ])
        .output()
        .expect("run probe");
    assert!(output.status.success());
    let variables: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("json variables");
    assert_eq!(variables[1]["name"], "score");
    assert_eq!(variables[1]["type"], "numeric");
}

#[test]
fn analyze_after_steps_reports_json() {
    let workspace = TestWorkspace::new();
    let input = survey_file(&workspace);
    let steps = workspace.write("steps.yaml", FILL_GENDER);
    let output = workbench_cmd()
        .args([
            "analyze",
            "-i",
            input.to_str().unwrap(),
            "--steps",
            steps.to_str().unwrap(),
            "--test",
            "t-test",
            "--primary",
            "gender",
            "--secondary",
            "satisfaction",
            "--format",
            "json",
        ])
        .output()
        .expect("run analyze");
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let result: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json result");
    assert_eq!(result["test"], "independent-t-test");
    assert_eq!(result["degreesOfFreedom"].as_f64(), Some(148.0));
    assert_eq!(result["sampleSize"].as_u64(), Some(150));
    assert!(result["effectSize"].is_object());
}

#[test]
fn analyze_table_output_interprets_result() {
    let workspace = TestWorkspace::new();
    let input = survey_file(&workspace);
    workbench_cmd()
        .args([
            "analyze",
            "-i",
            input.to_str().unwrap(),
            "--test",
            "normality",
            "--primary",
            "satisfaction",
            "--p-values",
            "exact",
        ])
        .assert()
        .success()
        .stdout(contains("satisfaction"));
}

#[test]
fn prepare_writes_prepared_csv_and_report() {
    let workspace = TestWorkspace::new();
    let input = survey_file(&workspace);
    let steps = workspace.write(
        "steps.yaml",
        &format!("{FILL_GENDER}- kind: removeColumns\n  columns: [respondent]\n"),
    );
    let output = workspace.path().join("prepared.csv");
    let report = workspace.path().join("report.json");
    workbench_cmd()
        .args([
            "prepare",
            "-i",
            input.to_str().unwrap(),
            "--steps",
            steps.to_str().unwrap(),
            "-o",
            output.to_str().unwrap(),
            "--report",
            report.to_str().unwrap(),
        ])
        .assert()
        .success();

    let prepared = fs::read_to_string(&output).expect("prepared csv");
    let mut lines = prepared.lines();
    assert_eq!(lines.next(), Some("\"gender\",\"satisfaction\""));
    assert_eq!(lines.count(), 150);
    assert!(!prepared.contains("\n\"\",\""));

    let outcomes: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&report).expect("report")).expect("json");
    assert_eq!(outcomes.as_array().map(Vec::len), Some(2));
    assert_eq!(outcomes[0]["kind"], "missingValues");
}

#[test]
fn prepare_without_steps_fails() {
    let workspace = TestWorkspace::new();
    let input = survey_file(&workspace);
    workbench_cmd()
        .args(["prepare", "-i", input.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(contains("--steps"));
}

#[test]
fn t_test_rejects_three_groups() {
    let workspace = TestWorkspace::new();
    let records = (0..30)
        .map(|i| vec![["a", "b", "c"][i % 3].to_string(), (i % 7).to_string()])
        .collect::<Vec<_>>();
    let input = workspace.write("arms.csv", &csv_text(&["arm", "score"], &records));
    workbench_cmd()
        .args([
            "analyze",
            "-i",
            input.to_str().unwrap(),
            "--test",
            "independent-t-test",
            "--primary",
            "arm",
            "--secondary",
            "score",
        ])
        .assert()
        .failure()
        .stderr(contains("exactly 2"));
}

#[test]
fn unknown_test_lists_known_ones() {
    let workspace = TestWorkspace::new();
    let input = survey_file(&workspace);
    workbench_cmd()
        .args([
            "analyze",
            "-i",
            input.to_str().unwrap(),
            "--test",
            "wilcoxon",
            "--primary",
            "satisfaction",
        ])
        .assert()
        .failure()
        .stderr(contains("one-way-anova"));
}

#[test]
fn suggest_marks_recommended_test() {
    let workspace = TestWorkspace::new();
    let input = survey_file(&workspace);
    workbench_cmd()
        .args([
            "suggest",
            "-i",
            input.to_str().unwrap(),
            "--intent",
            "comparison",
            "--first",
            "gender",
            "--second",
            "satisfaction",
        ])
        .assert()
        .success()
        .stdout(contains("independent-t-test (recommended)"))
        .stdout(contains("one-way-anova"));
}

#[test]
fn review_reads_from_stdin() {
    let (headers, mut records) = survey_records();
    records.push(records[0].clone());
    workbench_cmd()
        .args(["review", "-i", "-", "--format", "json"])
        .write_stdin(csv_text(&headers, &records))
        .assert()
        .success()
        .stdout(contains("duplicateGroups"));
}

#[test]
fn invalid_config_file_is_reported() {
    let workspace = TestWorkspace::new();
    let input = survey_file(&workspace);
    let config = workspace.write("workbench.yaml", "pValueMode: nope\n");
    workbench_cmd()
        .args([
            "--config",
            config.to_str().unwrap(),
            "probe",
            "-i",
            input.to_str().unwrap(),
        ])
        .assert()
        .failure()
        .stderr(contains("workbench.yaml"));
}
