use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema as ArrowSchema};
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use arrow::util::pretty::pretty_format_batches;

use super::model::{ColumnKind, Dataset, Value};

/// Columnar copy of a dataset: numeric columns become `Float64`,
/// categorical ones `Utf8`, nulls stay null.
pub fn to_record_batch(dataset: &Dataset) -> Result<RecordBatch, ArrowError> {
    let schema = dataset.schema();
    let fields: Vec<Field> = schema
        .columns()
        .iter()
        .map(|c| {
            let data_type = match c.kind {
                ColumnKind::Numeric => DataType::Float64,
                ColumnKind::Categorical => DataType::Utf8,
            };
            Field::new(c.name.as_str(), data_type, true)
        })
        .collect();

    let arrays: Vec<ArrayRef> = schema
        .columns()
        .iter()
        .enumerate()
        .map(|(idx, c)| -> ArrayRef {
            let values = dataset.rows().iter().map(|row| &row[idx]);
            match c.kind {
                ColumnKind::Numeric => {
                    Arc::new(values.map(Value::as_f64).collect::<Float64Array>())
                }
                ColumnKind::Categorical => {
                    Arc::new(values.map(Value::as_str).collect::<StringArray>())
                }
            }
        })
        .collect();

    let options = arrow::record_batch::RecordBatchOptions::new()
        .with_row_count(Some(dataset.len()));
    RecordBatch::try_new_with_options(Arc::new(ArrowSchema::new(fields)), arrays, &options)
}

/// Text table of the first `rows` rows.
pub fn preview(dataset: &Dataset, rows: usize) -> Result<String, ArrowError> {
    let batch = to_record_batch(&dataset.head(rows))?;
    Ok(pretty_format_batches(&[batch])?.to_string())
}
