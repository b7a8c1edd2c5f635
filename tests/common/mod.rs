#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use survey_workbench::{
    config::WorkbenchConfig,
    ingest,
    workbench::Workbench,
};
use tempfile::{TempDir, tempdir};

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents.as_bytes())
            .expect("write temp file contents");
        path
    }
}

/// Joins a header line and records into CSV text.
pub fn csv_text(headers: &[&str], records: &[Vec<String>]) -> String {
    let mut text = headers.join(",");
    text.push('\n');
    for record in records {
        text.push_str(&record.join(","));
        text.push('\n');
    }
    text
}

/// 150 respondents: `gender` alternates Male/Female with rows 10 and 20
/// left blank; `satisfaction` cycles 1..=10 and is never missing.
pub fn survey_records() -> (Vec<&'static str>, Vec<Vec<String>>) {
    let records = (0..150)
        .map(|i| {
            let gender = match i {
                10 | 20 => "",
                _ if i % 2 == 0 => "Male",
                _ => "Female",
            };
            let satisfaction = (i * 7 % 10) + 1;
            vec![
                (i + 1).to_string(),
                gender.to_string(),
                satisfaction.to_string(),
            ]
        })
        .collect();
    (vec!["respondent", "gender", "satisfaction"], records)
}

/// Runs the records through type inference and loads them.
pub fn workbench_from_records(headers: &[&str], records: &[Vec<String>]) -> Workbench {
    workbench_with_config(headers, records, WorkbenchConfig::default())
}

pub fn workbench_with_config(
    headers: &[&str],
    records: &[Vec<String>],
    config: WorkbenchConfig,
) -> Workbench {
    let headers = headers.iter().map(|h| h.to_string()).collect::<Vec<_>>();
    let ingested =
        ingest::ingest_records("fixture.csv", &headers, records, config.inference_sample_rows)
            .expect("ingest fixture");
    let mut workbench = Workbench::new(config).expect("workbench");
    workbench
        .ingest(ingested.rows, ingested.variables, ingested.upload)
        .expect("load fixture");
    workbench
}

pub fn survey_workbench() -> Workbench {
    let (headers, records) = survey_records();
    workbench_from_records(&headers, &records)
}
