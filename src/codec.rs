//! CSV decoding/encoding for [`Table`] plus the file helpers the CLI uses.
//!
//! - **Delimiter resolution**: `.tsv` inputs default to tab, everything else to
//!   comma, with a manual override.
//! - **Encoding**: input bytes are decoded through `encoding_rs` (UTF-8 unless
//!   told otherwise); output is always UTF-8.
//! - **stdin/stdout**: the `-` path reads stdin or writes stdout.

use std::{
    fs,
    io::{self, Read, Write},
    path::Path,
};

use anyhow::{Context, Result, anyhow};
use csv::QuoteStyle;
use encoding_rs::{Encoding, UTF_8};

use crate::{
    error::{PipelineError, PipelineResult},
    table::{Cell, Table},
};

pub const DEFAULT_CSV_DELIMITER: u8 = b',';
pub const DEFAULT_TSV_DELIMITER: u8 = b'\t';

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecodeOptions {
    pub delimiter: u8,
    pub encoding: &'static Encoding,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            delimiter: DEFAULT_CSV_DELIMITER,
            encoding: UTF_8,
        }
    }
}

pub fn decode(bytes: &[u8], options: DecodeOptions) -> PipelineResult<Table> {
    let (text, _, had_errors) = options.encoding.decode(bytes);
    if had_errors {
        return Err(PipelineError::Parse(format!(
            "Failed to decode input with encoding {}",
            options.encoding.name()
        )));
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .delimiter(options.delimiter)
        .double_quote(true)
        .flexible(false)
        .from_reader(text.as_bytes());

    let headers = reader
        .headers()
        .map_err(|err| parse_error("Reading CSV header", err))?
        .iter()
        .map(|h| h.to_string())
        .collect::<Vec<_>>();
    if headers.is_empty() || headers.iter().all(|h| h.is_empty()) {
        return Err(PipelineError::Parse("CSV input has no header row".to_string()));
    }
    if let Some(dup) = first_duplicate(&headers) {
        return Err(PipelineError::Parse(format!(
            "CSV header repeats column '{dup}'"
        )));
    }

    let mut rows = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let record = record.map_err(|err| parse_error(&format!("Reading row {}", idx + 2), err))?;
        rows.push(
            record
                .iter()
                .map(|field| (!field.is_empty()).then(|| field.to_string()))
                .collect::<Vec<Cell>>(),
        );
    }
    Table::new(headers, rows)
}

pub fn encode(table: &Table, delimiter: u8) -> PipelineResult<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .quote_style(QuoteStyle::Necessary)
        .double_quote(true)
        .from_writer(Vec::new());
    writer
        .write_record(table.headers())
        .map_err(|err| PipelineError::Internal(format!("Writing CSV header: {err}")))?;
    for row in table.rows() {
        writer
            .write_record(row.iter().map(|cell| cell.as_deref().unwrap_or("")))
            .map_err(|err| PipelineError::Internal(format!("Writing CSV row: {err}")))?;
    }
    writer
        .into_inner()
        .map_err(|err| PipelineError::Internal(format!("Flushing CSV output: {err}")))
}

fn parse_error(context: &str, err: csv::Error) -> PipelineError {
    PipelineError::Parse(format!("{context}: {err}"))
}

fn first_duplicate(headers: &[String]) -> Option<&str> {
    headers
        .iter()
        .enumerate()
        .find(|(idx, h)| headers[..*idx].contains(h))
        .map(|(_, h)| h.as_str())
}

pub fn is_dash(path: &Path) -> bool {
    path == Path::new("-")
}

pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    if let Some(value) = label {
        Encoding::for_label(value.trim().as_bytes())
            .ok_or_else(|| anyhow!("Unknown encoding '{value}'"))
    } else {
        Ok(UTF_8)
    }
}

pub fn resolve_input_delimiter(path: &Path, provided: Option<u8>) -> u8 {
    provided.unwrap_or_else(|| match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => DEFAULT_TSV_DELIMITER,
        _ => DEFAULT_CSV_DELIMITER,
    })
}

pub fn read_input(path: &Path) -> Result<Vec<u8>> {
    if is_dash(path) {
        let mut buf = Vec::new();
        io::stdin()
            .lock()
            .read_to_end(&mut buf)
            .context("Reading stdin")?;
        Ok(buf)
    } else {
        fs::read(path).with_context(|| format!("Opening input file {path:?}"))
    }
}

pub fn write_output(path: Option<&Path>, bytes: &[u8]) -> Result<()> {
    match path {
        Some(p) if !is_dash(p) => {
            fs::write(p, bytes).with_context(|| format!("Creating output file {p:?}"))
        }
        _ => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(bytes).context("Writing to stdout")?;
            stdout.flush().context("Flushing stdout")
        }
    }
}
