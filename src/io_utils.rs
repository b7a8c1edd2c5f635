//! CSV reading and writing helpers shared by ingestion and export.
//!
//! Input is decoded field by field with `encoding_rs`; output is built as
//! UTF-8 and transcoded once on the way out. The `-` path stands for
//! stdin/stdout.

use std::{
    fs::File,
    io::{self, BufReader, Read, Write},
    path::Path,
};

use anyhow::{Context, Result, anyhow};
use csv::QuoteStyle;
use encoding_rs::{Encoding, UTF_8};

pub const DEFAULT_CSV_DELIMITER: u8 = b',';
pub const DEFAULT_TSV_DELIMITER: u8 = b'\t';

pub fn is_dash(path: &Path) -> bool {
    path == Path::new("-")
}

pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    match label {
        Some(value) => Encoding::for_label(value.trim().as_bytes())
            .ok_or_else(|| anyhow!("Unknown encoding '{value}'")),
        None => Ok(UTF_8),
    }
}

/// Explicit delimiter, else tab for `.tsv` files, else comma.
pub fn resolve_delimiter(path: &Path, provided: Option<u8>) -> u8 {
    provided.unwrap_or_else(|| match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => DEFAULT_TSV_DELIMITER,
        _ => DEFAULT_CSV_DELIMITER,
    })
}

pub fn open_csv_reader(path: &Path, delimiter: u8) -> Result<csv::Reader<Box<dyn Read>>> {
    let source: Box<dyn Read> = if is_dash(path) {
        Box::new(io::stdin().lock())
    } else {
        Box::new(BufReader::new(
            File::open(path).with_context(|| format!("Opening input file {path:?}"))?,
        ))
    };
    let mut builder = csv::ReaderBuilder::new();
    builder
        .has_headers(true)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(true);
    Ok(builder.from_reader(source))
}

pub fn decode_record(record: &csv::ByteRecord, encoding: &'static Encoding) -> Result<Vec<String>> {
    record
        .iter()
        .map(|field| {
            let (text, _, had_errors) = encoding.decode(field);
            if had_errors {
                Err(anyhow!("Failed to decode field with encoding {}", encoding.name()))
            } else {
                Ok(text.into_owned())
            }
        })
        .collect()
}

pub fn reader_headers<R: Read>(
    reader: &mut csv::Reader<R>,
    encoding: &'static Encoding,
) -> Result<Vec<String>> {
    let headers = reader.byte_headers().context("Reading CSV headers")?.clone();
    decode_record(&headers, encoding)
}

/// In-memory CSV writer; hand the finished buffer to [`write_encoded`].
pub fn buffered_csv_writer(delimiter: u8) -> csv::Writer<Vec<u8>> {
    csv::WriterBuilder::new()
        .delimiter(delimiter)
        .quote_style(QuoteStyle::Always)
        .double_quote(true)
        .from_writer(Vec::new())
}

/// Writes UTF-8 `text` to `path` (stdout for `-`) in the requested encoding.
pub fn write_encoded(path: &Path, text: &str, encoding: &'static Encoding) -> Result<()> {
    let (encoded, _, had_errors) = encoding.encode(text);
    if had_errors {
        return Err(anyhow!(
            "Output contains characters that cannot be encoded as {}",
            encoding.name()
        ));
    }
    if is_dash(path) {
        let mut stdout = io::stdout().lock();
        stdout.write_all(&encoded).context("Writing to stdout")?;
        stdout.flush().context("Flushing stdout")?;
        return Ok(());
    }
    let mut file = File::create(path).with_context(|| format!("Creating output file {path:?}"))?;
    file.write_all(&encoded)
        .with_context(|| format!("Writing output file {path:?}"))?;
    file.flush()?;
    Ok(())
}
