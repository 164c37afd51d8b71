use std::fmt;
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use arrow::array::{Array, AsArray};
use arrow::datatypes::{DataType, Float32Type, Float64Type, Int32Type, Int64Type};
use arrow::util::display::array_value_to_string;
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

use super::model::Dataset;
use crate::error::LoadError;

/// Byte formats `load_bytes` understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    /// Delimited text (`;`, `,` or tab separated).
    Delimited,
    /// xlsx / xls / ods workbook, first sheet.
    Spreadsheet,
    /// `[{ "col": value, ... }, ...]`
    Json,
}

impl SourceFormat {
    fn name(self) -> &'static str {
        match self {
            SourceFormat::Delimited => "csv",
            SourceFormat::Spreadsheet => "spreadsheet",
            SourceFormat::Json => "json",
        }
    }

    /// Guess from a file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "csv" | "tsv" | "txt" => Some(SourceFormat::Delimited),
            "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => Some(SourceFormat::Spreadsheet),
            "json" => Some(SourceFormat::Json),
            _ => None,
        }
    }
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Field separator for delimited text. `None` sniffs it from the header.
    pub delimiter: Option<u8>,
}

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Load a dataset from a file. Dispatch by extension.
///
/// Supported formats:
/// * `.csv` / `.tsv` / `.txt` – delimited text with a header row
/// * `.xlsx` / `.xls` / `.ods` – first worksheet, header row first
/// * `.json` – `[{ "col": value, ... }, ...]`
/// * `.parquet` – flat scalar columns
///
/// Any other extension is sniffed like an upload.
pub fn load_file(path: &Path, options: &LoadOptions) -> Result<Dataset, LoadError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    if ext == "parquet" || ext == "pq" {
        let dataset = load_parquet(path).map_err(|e| LoadError::UnreadableFile {
            attempts: vec![("parquet", format!("{e:#}"))],
        })?;
        log_loaded(&dataset, "parquet");
        return Ok(dataset);
    }

    let bytes = std::fs::read(path).map_err(|source| LoadError::Io {
        path: path.display().to_string(),
        source,
    })?;
    load_bytes(&bytes, SourceFormat::from_extension(&ext), options)
}

/// Parse an uploaded byte stream.
///
/// Delimited text and spreadsheets fall back to each other: the primary
/// format comes from the magic bytes, then `hint`, then delimited text. If
/// the primary parse fails the other format is tried, and
/// [`LoadError::UnreadableFile`] is returned only when both fail.
pub fn load_bytes(
    bytes: &[u8],
    hint: Option<SourceFormat>,
    options: &LoadOptions,
) -> Result<Dataset, LoadError> {
    if hint == Some(SourceFormat::Json) {
        let dataset = parse_json(bytes).map_err(|e| LoadError::UnreadableFile {
            attempts: vec![("json", format!("{e:#}"))],
        })?;
        log_loaded(&dataset, "json");
        return Ok(dataset);
    }

    let primary = if looks_like_workbook(bytes) {
        SourceFormat::Spreadsheet
    } else {
        hint.unwrap_or(SourceFormat::Delimited)
    };
    let secondary = match primary {
        SourceFormat::Spreadsheet => SourceFormat::Delimited,
        _ => SourceFormat::Spreadsheet,
    };

    let mut attempts = Vec::with_capacity(2);
    for (i, format) in [primary, secondary].into_iter().enumerate() {
        if i > 0 {
            log::warn!("{primary} parse failed, falling back to {format}");
        }
        let parsed = match format {
            SourceFormat::Spreadsheet => parse_spreadsheet(bytes),
            _ => parse_delimited(bytes, options.delimiter),
        };
        match parsed {
            Ok(dataset) => {
                log_loaded(&dataset, format.name());
                return Ok(dataset);
            }
            Err(e) => {
                log::debug!("{format} parser rejected input: {e:#}");
                attempts.push((format.name(), format!("{e:#}")));
            }
        }
    }
    Err(LoadError::UnreadableFile { attempts })
}

fn log_loaded(dataset: &Dataset, format: &str) {
    log::info!(
        "loaded {} rows x {} columns from {format} (fingerprint {})",
        dataset.len(),
        dataset.schema().len(),
        dataset.fingerprint().short()
    );
}

/// ZIP (xlsx, ods) or OLE2 (xls) container signature.
fn looks_like_workbook(bytes: &[u8]) -> bool {
    bytes.starts_with(b"PK\x03\x04") || bytes.starts_with(&[0xD0, 0xCF, 0x11, 0xE0])
}

/// Blank headers become `Unnamed: <index>`.
fn name_headers(headers: impl IntoIterator<Item = String>) -> Vec<String> {
    headers
        .into_iter()
        .enumerate()
        .map(|(i, h)| if h.is_empty() { format!("Unnamed: {i}") } else { h })
        .collect()
}

// ---------------------------------------------------------------------------
// Delimited text
// ---------------------------------------------------------------------------

/// Records inspected when sniffing the separator.
const SNIFF_RECORDS: usize = 50;

const DELIMITERS: [u8; 3] = [b',', b';', b'\t'];

/// Pick the separator that splits the leading records into the most fields
/// (more than one) while giving every record the same width. Quoted content
/// is ignored. Without such a candidate, the separator occurring most often
/// in the header line wins, and `,` if there is none. Ties go to the earlier
/// candidate.
fn sniff_delimiter(bytes: &[u8]) -> u8 {
    let mut best: Option<(u8, usize)> = None;
    for candidate in DELIMITERS {
        let width = consistent_width(bytes, candidate);
        if width > 1 && best.map_or(true, |(_, w)| width > w) {
            best = Some((candidate, width));
        }
    }
    let delimiter = best
        .map(|(d, _)| d)
        .unwrap_or_else(|| most_frequent_in_header(bytes));
    log::debug!("sniffed delimiter {:?}", delimiter as char);
    delimiter
}

fn most_frequent_in_header(bytes: &[u8]) -> u8 {
    let line = bytes.split(|b| *b == b'\n').next().unwrap_or(&[]);
    let mut best = (b',', 0usize);
    for candidate in DELIMITERS {
        let count = line.iter().filter(|b| **b == candidate).count();
        if count > best.1 {
            best = (candidate, count);
        }
    }
    best.0
}

/// Field count shared by the leading records, or 0 if they disagree.
fn consistent_width(bytes: &[u8], delimiter: u8) -> usize {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);
    let mut width = None;
    for record in reader.byte_records().take(SNIFF_RECORDS) {
        let Ok(record) = record else {
            return 0;
        };
        match width {
            None => width = Some(record.len()),
            Some(w) if w != record.len() => return 0,
            Some(_) => {}
        }
    }
    width.unwrap_or(0)
}

fn parse_delimited(bytes: &[u8], delimiter: Option<u8>) -> Result<Dataset> {
    let delimiter = delimiter.unwrap_or_else(|| sniff_delimiter(bytes));
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .from_reader(bytes);

    let headers: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.to_string())
        .collect();
    if headers.iter().all(|h| h.is_empty()) {
        bail!("CSV has no header row");
    }

    let mut rows = Vec::new();
    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;
        rows.push(
            record
                .iter()
                .map(|field| (!field.is_empty()).then(|| field.to_string()))
                .collect(),
        );
    }

    Dataset::from_text_rows(name_headers(headers), rows).context("building dataset")
}

// ---------------------------------------------------------------------------
// Spreadsheet
// ---------------------------------------------------------------------------

fn parse_spreadsheet(bytes: &[u8]) -> Result<Dataset> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes)).context("opening workbook")?;
    let range = workbook
        .worksheet_range_at(0)
        .context("workbook has no worksheets")?
        .context("reading first worksheet")?;

    let mut rows = range.rows();
    let Some(header_row) = rows.next() else {
        bail!("first worksheet is empty");
    };
    let headers = name_headers(header_row.iter().map(|c| cell_text(c).unwrap_or_default()));
    let rows = rows
        .map(|row| row.iter().map(cell_text).collect())
        .collect();

    Dataset::from_text_rows(headers, rows).context("building dataset")
}

fn cell_text(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty | Data::Error(_) => None,
        Data::String(s) if s.is_empty() => None,
        Data::String(s) => Some(s.clone()),
        Data::Float(v) => Some(v.to_string()),
        Data::Int(v) => Some(v.to_string()),
        Data::Bool(v) => Some(v.to_string()),
        other => Some(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Expected JSON schema (records-oriented, the default `df.to_json(orient='records')`):
///
/// ```json
/// [
///   { "age": 31, "job": "admin", "y": "no" },
///   ...
/// ]
/// ```
fn parse_json(bytes: &[u8]) -> Result<Dataset> {
    let root: JsonValue = serde_json::from_slice(bytes).context("parsing JSON")?;
    let records = root.as_array().context("Expected top-level JSON array")?;

    let mut headers: Vec<String> = Vec::new();
    for (i, rec) in records.iter().enumerate() {
        let obj = rec
            .as_object()
            .with_context(|| format!("Row {i} is not a JSON object"))?;
        for key in obj.keys() {
            if !headers.contains(key) {
                headers.push(key.clone());
            }
        }
    }

    let rows = records
        .iter()
        .filter_map(|rec| rec.as_object())
        .map(|obj| {
            headers
                .iter()
                .map(|h| obj.get(h).and_then(json_text))
                .collect()
        })
        .collect();

    Dataset::from_text_rows(headers, rows).context("building dataset")
}

fn json_text(val: &JsonValue) -> Option<String> {
    match val {
        JsonValue::Null => None,
        JsonValue::String(s) if s.is_empty() => None,
        JsonValue::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a Parquet file with flat scalar columns.
///
/// Works with files written by both **Pandas** (`df.to_parquet()`) and
/// **Polars** (`df.write_parquet()`).
fn load_parquet(path: &Path) -> Result<Dataset> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(file).context("reading parquet metadata")?;
    let headers: Vec<String> = builder
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect();
    let reader = builder.build().context("building parquet reader")?;

    let mut rows = Vec::new();
    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        for row in 0..batch.num_rows() {
            let cells = batch
                .columns()
                .iter()
                .map(|col| extract_cell(col, row))
                .collect::<Result<Vec<_>>>()
                .with_context(|| format!("Row {row}"))?;
            rows.push(cells);
        }
    }

    Dataset::from_text_rows(name_headers(headers), rows).context("building dataset")
}

/// Textual form of one Arrow cell.
fn extract_cell(col: &Arc<dyn Array>, row: usize) -> Result<Option<String>> {
    if col.is_null(row) {
        return Ok(None);
    }
    let text = match col.data_type() {
        DataType::Utf8 => col.as_string::<i32>().value(row).to_string(),
        DataType::LargeUtf8 => col.as_string::<i64>().value(row).to_string(),
        DataType::Int32 => col.as_primitive::<Int32Type>().value(row).to_string(),
        DataType::Int64 => col.as_primitive::<Int64Type>().value(row).to_string(),
        DataType::Float32 => col.as_primitive::<Float32Type>().value(row).to_string(),
        DataType::Float64 => col.as_primitive::<Float64Type>().value(row).to_string(),
        DataType::Boolean => col.as_boolean().value(row).to_string(),
        DataType::List(_) | DataType::LargeList(_) | DataType::Struct(_) | DataType::Map(..) => {
            bail!("nested column type {:?} is not supported", col.data_type())
        }
        _ => array_value_to_string(col.as_ref(), row)?,
    };
    Ok((!text.is_empty()).then_some(text))
}
