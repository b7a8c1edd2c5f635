use std::{collections::BTreeMap, fmt};

use anyhow::{Result, anyhow};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A single cell. Serialized untagged so rows read as plain JSON objects.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(untagged)]
pub enum Value {
    Number(f64),
    Text(String),
    #[default]
    Null,
}

pub type Row = BTreeMap<String, Value>;

impl Value {
    pub fn text(value: impl Into<String>) -> Self {
        Value::Text(value.into())
    }

    /// Null or whitespace-only text.
    pub fn is_missing(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Text(s) => s.trim().is_empty(),
            Value::Number(f) => f.is_nan(),
        }
    }

    /// Numeric reading of the value; text is accepted when it parses cleanly.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(f) if f.is_finite() => Some(*f),
            Value::Text(s) => parse_number(s),
            _ => None,
        }
    }

    /// Category label used for grouping and coding. Missing values have none.
    pub fn label(&self) -> Option<String> {
        if self.is_missing() {
            return None;
        }
        Some(self.as_display())
    }

    pub fn as_display(&self) -> String {
        match self {
            Value::Text(s) => s.clone(),
            Value::Number(f) => {
                if f.fract() == 0.0 && f.abs() < 1e15 {
                    (*f as i64).to_string()
                } else {
                    f.to_string()
                }
            }
            Value::Null => String::new(),
        }
    }

    /// Exact identity used for duplicate detection: numbers compare by bit
    /// pattern, text byte-for-byte.
    pub fn identity_key(&self) -> String {
        match self {
            Value::Number(f) => format!("n:{:016x}", f.to_bits()),
            Value::Text(s) => format!("s:{}:{s}", s.len()),
            Value::Null => "z".to_string(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

pub fn parse_number(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|f| f.is_finite())
}

pub fn parse_naive_date(value: &str) -> Result<NaiveDate> {
    const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%m/%d/%Y", "%Y/%m/%d", "%d-%m-%Y"];
    for fmt in DATE_FORMATS {
        if let Ok(parsed) = NaiveDate::parse_from_str(value.trim(), fmt) {
            return Ok(parsed);
        }
    }
    Err(anyhow!("Failed to parse '{value}' as date"))
}

/// Stable identity for a whole row, covering every field in key order.
pub fn row_identity(row: &Row) -> String {
    let mut key = String::new();
    for (column, value) in row {
        key.push_str(&column.len().to_string());
        key.push(':');
        key.push_str(column);
        key.push('=');
        key.push_str(&value.identity_key());
        key.push('\u{1f}');
    }
    key
}
