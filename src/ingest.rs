//! CSV ingestion: decode the file, infer one descriptor per column from a
//! sample of rows, then convert every cell into a [`Value`].

use std::{collections::HashSet, path::Path};

use anyhow::{Context, Result, bail};
use encoding_rs::{Encoding, UTF_8};
use log::{debug, info};

use crate::{
    config::DEFAULT_INFERENCE_SAMPLE_ROWS,
    data::{Row, Value, parse_naive_date, parse_number},
    io_utils,
    store::UploadInfo,
    variable::{self, VariableDescriptor, VariableType},
};

/// Share of parseable tokens above which a column is treated as numeric
/// with a few invalid entries.
const MIXED_NUMERIC_SHARE: f64 = 0.9;
const MAX_CATEGORIES: usize = 20;

#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub delimiter: Option<u8>,
    pub encoding: &'static Encoding,
    pub sample_rows: usize,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            delimiter: None,
            encoding: UTF_8,
            sample_rows: DEFAULT_INFERENCE_SAMPLE_ROWS,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Ingested {
    pub rows: Vec<Row>,
    pub variables: Vec<VariableDescriptor>,
    pub upload: UploadInfo,
}

pub fn read_csv(path: &Path, options: &IngestOptions) -> Result<Ingested> {
    let delimiter = io_utils::resolve_delimiter(path, options.delimiter);
    let mut reader = io_utils::open_csv_reader(path, delimiter)?;
    let headers = io_utils::reader_headers(&mut reader, options.encoding)
        .with_context(|| format!("Reading headers from {path:?}"))?;
    let mut records = Vec::new();
    let mut record = csv::ByteRecord::new();
    while reader
        .read_byte_record(&mut record)
        .with_context(|| format!("Reading record {} of {path:?}", records.len() + 1))?
    {
        records.push(io_utils::decode_record(&record, options.encoding)?);
    }
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "stdin".to_string());
    let ingested = ingest_records(&file_name, &headers, &records, options.sample_rows)
        .with_context(|| format!("Ingesting {path:?}"))?;
    info!(
        "Read {} row(s) and {} column(s) from {:?}",
        ingested.rows.len(),
        ingested.variables.len(),
        path
    );
    Ok(ingested)
}

/// Builds rows and descriptors from already-decoded records.
pub fn ingest_records(
    file_name: &str,
    headers: &[String],
    records: &[Vec<String>],
    sample_rows: usize,
) -> Result<Ingested> {
    let headers = normalize_headers(headers)?;
    if records.is_empty() {
        bail!("'{file_name}' contains no data rows");
    }
    let sample = &records[..records.len().min(sample_rows.max(1))];
    let mut variables = headers
        .iter()
        .enumerate()
        .map(|(idx, name)| {
            let mut profile = ColumnProfile::default();
            for record in sample {
                profile.observe(record.get(idx).map(String::as_str).unwrap_or(""));
            }
            let variable = profile.describe(name);
            debug!("Inferred '{}' as {}", name, variable.var_type);
            variable
        })
        .collect::<Vec<_>>();

    let rows = records
        .iter()
        .map(|record| {
            headers
                .iter()
                .zip(&variables)
                .enumerate()
                .map(|(idx, (name, variable))| {
                    let raw = record.get(idx).map(String::as_str).unwrap_or("");
                    (name.clone(), to_value(raw, variable.var_type))
                })
                .collect::<Row>()
        })
        .collect::<Vec<_>>();

    for variable in variables.iter_mut().filter(|v| v.is_categorical()) {
        let labels = variable::labels_in_order(&rows, &variable.name);
        variable.coding = Some(variable::dense_coding(&labels));
    }
    // Counts describe the inference sample; committed steps recount over every row.
    variable::refresh_all(&mut variables, &rows[..sample.len()]);

    Ok(Ingested {
        rows,
        variables,
        upload: UploadInfo::new(file_name),
    })
}

fn normalize_headers(headers: &[String]) -> Result<Vec<String>> {
    let mut seen = HashSet::new();
    let mut normalized = Vec::with_capacity(headers.len());
    for (idx, header) in headers.iter().enumerate() {
        let trimmed = header.trim().trim_start_matches('\u{feff}');
        let name = if trimmed.is_empty() {
            format!("column_{}", idx + 1)
        } else {
            trimmed.to_string()
        };
        if !seen.insert(name.clone()) {
            bail!("Duplicate column header '{name}'");
        }
        normalized.push(name);
    }
    if normalized.is_empty() {
        bail!("Input has no header row");
    }
    Ok(normalized)
}

fn to_value(raw: &str, var_type: VariableType) -> Value {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Value::Null;
    }
    match var_type {
        VariableType::Numeric => parse_number(trimmed)
            .map(Value::Number)
            .unwrap_or_else(|| Value::text(trimmed)),
        _ => Value::text(trimmed),
    }
}

#[derive(Debug, Default)]
struct ColumnProfile {
    non_missing: usize,
    numeric: usize,
    dates: usize,
    distinct: Vec<String>,
    distinct_seen: HashSet<String>,
    invalid: Vec<String>,
}

impl ColumnProfile {
    fn observe(&mut self, raw: &str) {
        let token = raw.trim();
        if token.is_empty() {
            return;
        }
        self.non_missing += 1;
        if self.distinct_seen.insert(token.to_string()) {
            self.distinct.push(token.to_string());
        }
        if parse_number(token).is_some() {
            self.numeric += 1;
        } else if !self.invalid.iter().any(|t| t == token) {
            self.invalid.push(token.to_string());
        }
        if parse_naive_date(token).is_ok() {
            self.dates += 1;
        }
    }

    fn describe(&self, name: &str) -> VariableDescriptor {
        if self.non_missing == 0 {
            return VariableDescriptor::new(name, VariableType::Text);
        }
        if self.numeric == self.non_missing {
            return VariableDescriptor::new(name, VariableType::Numeric);
        }
        let share = self.numeric as f64 / self.non_missing as f64;
        if share >= MIXED_NUMERIC_SHARE {
            let mut variable = VariableDescriptor::new(name, VariableType::Numeric);
            variable.invalid_values = Some(self.invalid.clone());
            variable.numeric_percentage =
                Some(self.numeric as f64 * 100.0 / self.non_missing as f64);
            return variable;
        }
        if self.dates == self.non_missing {
            return VariableDescriptor::new(name, VariableType::Date);
        }
        let distinct = self.distinct.len();
        if distinct <= MAX_CATEGORIES && distinct * 2 < self.non_missing {
            return VariableDescriptor::new(name, VariableType::Categorical);
        }
        VariableDescriptor::new(name, VariableType::Text)
    }
}
