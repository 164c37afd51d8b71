use std::fmt;

use csv::QuoteStyle;
use rust_xlsxwriter::{DocProperties, ExcelDateTime, Workbook};
use serde::{Deserialize, Serialize};

use super::distribution::Distribution;
use super::model::{Dataset, Value};
use crate::error::ExportError;

/// Name of the single worksheet in spreadsheet exports.
pub const SHEET_NAME: &str = "Sheet1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// Comma separated, header row, no index column.
    Csv,
    /// xlsx workbook with one sheet.
    Spreadsheet,
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportFormat::Csv => write!(f, "csv"),
            ExportFormat::Spreadsheet => write!(f, "xlsx"),
        }
    }
}

impl ExportFormat {
    pub fn mime_type(self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv",
            ExportFormat::Spreadsheet => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
        }
    }
}

pub fn export_dataset(dataset: &Dataset, format: ExportFormat) -> Result<Vec<u8>, ExportError> {
    let bytes = match format {
        ExportFormat::Csv => write_csv(dataset)?,
        ExportFormat::Spreadsheet => write_xlsx(dataset)?,
    };
    log::info!(
        "exported {} rows as {format} ({} bytes)",
        dataset.len(),
        bytes.len()
    );
    Ok(bytes)
}

/// Export the `<target>, count, percentage` table of a distribution.
pub fn export_distribution(
    distribution: &Distribution,
    format: ExportFormat,
) -> Result<Vec<u8>, ExportError> {
    export_dataset(&distribution.to_dataset()?, format)
}

/// Every field is quoted when any text contains another candidate
/// separator, so delimiter sniffing reads the file back as comma-separated.
fn write_csv(dataset: &Dataset) -> Result<Vec<u8>, ExportError> {
    let style = if has_foreign_separator(dataset) {
        QuoteStyle::Always
    } else {
        QuoteStyle::Necessary
    };
    let mut writer = csv::WriterBuilder::new()
        .quote_style(style)
        .from_writer(Vec::new());
    writer.write_record(dataset.schema().names())?;
    for row in dataset.rows() {
        for value in row {
            writer.write_field(&*value.to_field())?;
        }
        writer.write_record(None::<&[u8]>)?;
    }
    writer
        .into_inner()
        .map_err(|e| ExportError::CsvFlush(e.to_string()))
}

fn has_foreign_separator(dataset: &Dataset) -> bool {
    dataset
        .schema()
        .names()
        .chain(dataset.rows().iter().flatten().filter_map(Value::as_str))
        .any(|s| s.contains(|c: char| c == ';' || c == '\t'))
}

fn write_xlsx(dataset: &Dataset) -> Result<Vec<u8>, ExportError> {
    let mut workbook = Workbook::new();
    // Pinned so identical data produces identical bytes.
    let created = ExcelDateTime::from_ymd(2000, 1, 1)?;
    workbook.set_properties(&DocProperties::new().set_creation_datetime(&created));

    let worksheet = workbook.add_worksheet();
    worksheet.set_name(SHEET_NAME)?;

    for (c, name) in dataset.schema().names().enumerate() {
        worksheet.write_string(0, column_index(c)?, name)?;
    }
    for (r, row) in dataset.rows().iter().enumerate() {
        let r = u32::try_from(r + 1)
            .map_err(|_| ExportError::Limit(format!("row {r} exceeds sheet limits")))?;
        for (c, value) in row.iter().enumerate() {
            let c = column_index(c)?;
            match value {
                Value::Null => {}
                Value::Number(v) => {
                    worksheet.write_number(r, c, *v)?;
                }
                Value::Text(s) => {
                    worksheet.write_string(r, c, s)?;
                }
            }
        }
    }

    Ok(workbook.save_to_buffer()?)
}

fn column_index(c: usize) -> Result<u16, ExportError> {
    u16::try_from(c).map_err(|_| ExportError::Limit(format!("column {c} exceeds sheet limits")))
}
