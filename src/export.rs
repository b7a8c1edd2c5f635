//! Writes the current snapshot back out as CSV.

use std::path::Path;

use anyhow::{Context, Result};
use encoding_rs::Encoding;
use log::info;

use crate::{data::Row, io_utils, variable::VariableDescriptor};

/// Renders rows as CSV text with columns in descriptor order. Missing
/// values become empty fields.
pub fn render_csv(rows: &[Row], variables: &[VariableDescriptor], delimiter: u8) -> Result<String> {
    let mut writer = io_utils::buffered_csv_writer(delimiter);
    writer
        .write_record(variables.iter().map(|v| v.name.as_str()))
        .context("Writing CSV header")?;
    for row in rows {
        let record = variables
            .iter()
            .map(|v| row.get(&v.name).map(|value| value.as_display()).unwrap_or_default());
        writer.write_record(record).context("Writing CSV row")?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|err| anyhow::anyhow!("Finishing CSV output: {err}"))?;
    String::from_utf8(bytes).context("CSV output is not valid UTF-8")
}

pub fn write_csv(
    rows: &[Row],
    variables: &[VariableDescriptor],
    path: &Path,
    delimiter: Option<u8>,
    encoding: &'static Encoding,
) -> Result<()> {
    let delimiter = io_utils::resolve_delimiter(path, delimiter);
    let text = render_csv(rows, variables, delimiter)?;
    io_utils::write_encoded(path, &text, encoding)?;
    info!(
        "Wrote {} row(s) and {} column(s) to {:?}",
        rows.len(),
        variables.len(),
        path
    );
    Ok(())
}
