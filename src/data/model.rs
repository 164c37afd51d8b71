use std::borrow::Cow;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::DatasetError;

// ---------------------------------------------------------------------------
// Value – a single cell
// ---------------------------------------------------------------------------

/// A dynamically-typed cell value.
/// Using `BTreeMap` / `BTreeSet` downstream so `Value` must be `Ord`.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Number(f64),
    Text(String),
}

// -- Manual Eq/Ord so we can put Value in BTreeSet --

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == std::cmp::Ordering::Equal
    }
}

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        use Value::*;
        fn discriminant(v: &Value) -> u8 {
            match v {
                Null => 0,
                Number(_) => 1,
                Text(_) => 2,
            }
        }
        match (self, other) {
            (Null, Null) => std::cmp::Ordering::Equal,
            (Number(a), Number(b)) => a.total_cmp(b),
            (Text(a), Text(b)) => a.cmp(b),
            _ => discriminant(self).cmp(&discriminant(other)),
        }
    }
}

impl std::hash::Hash for Value {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Text(s) => s.hash(state),
            Value::Number(f) => f.to_bits().hash(state),
            Value::Null => {}
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(s) => write!(f, "{s}"),
            Value::Number(v) => write!(f, "{v}"),
            Value::Null => write!(f, "<null>"),
        }
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Number(v)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl Value {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Textual cell content as written to delimited files. `Null` is the
    /// empty field and numbers use the shortest representation that parses
    /// back to the same `f64`.
    pub fn to_field(&self) -> Cow<'_, str> {
        match self {
            Value::Null => Cow::Borrowed(""),
            Value::Number(v) => Cow::Owned(v.to_string()),
            Value::Text(s) => Cow::Borrowed(s),
        }
    }

    fn kind(&self) -> Option<ColumnKind> {
        match self {
            Value::Null => None,
            Value::Number(_) => Some(ColumnKind::Numeric),
            Value::Text(_) => Some(ColumnKind::Categorical),
        }
    }
}

/// Parse a cell as a finite number. `NaN`/`inf` spellings stay text.
pub(crate) fn parse_number(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Numeric,
    Categorical,
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnKind::Numeric => write!(f, "numeric"),
            ColumnKind::Categorical => write!(f, "categorical"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub kind: ColumnKind,
}

impl Column {
    pub fn new(name: impl Into<String>, kind: ColumnKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// Ordered column list. Kinds are fixed once a dataset is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    columns: Vec<Column>,
}

impl Schema {
    pub fn new(columns: Vec<Column>) -> Result<Self, DatasetError> {
        let mut seen = BTreeSet::new();
        for col in &columns {
            if !seen.insert(col.name.as_str()) {
                return Err(DatasetError::DuplicateColumn(col.name.clone()));
            }
        }
        Ok(Self { columns })
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }
}

// ---------------------------------------------------------------------------
// Fingerprint – content identity used in cache keys
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    fn of(schema: &Schema, rows: &[Row]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update((schema.len() as u64).to_le_bytes());
        for col in schema.columns() {
            hasher.update((col.name.len() as u64).to_le_bytes());
            hasher.update(col.name.as_bytes());
            hasher.update([col.kind as u8]);
        }
        hasher.update((rows.len() as u64).to_le_bytes());
        for row in rows {
            for value in row {
                match value {
                    Value::Null => hasher.update([0u8]),
                    Value::Number(v) => {
                        hasher.update([1u8]);
                        hasher.update(v.to_bits().to_le_bytes());
                    }
                    Value::Text(s) => {
                        hasher.update([2u8]);
                        hasher.update((s.len() as u64).to_le_bytes());
                        hasher.update(s.as_bytes());
                    }
                }
            }
        }
        Fingerprint(hasher.finalize().into())
    }

    /// First 12 hex digits, for log lines.
    pub fn short(&self) -> String {
        self.to_string()[..12].to_string()
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.0 {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Dataset – the complete loaded table
// ---------------------------------------------------------------------------

/// One row, aligned with the schema's column order.
pub type Row = Vec<Value>;

/// A borrowed view of one row that can be queried by column name.
#[derive(Debug, Clone, Copy)]
pub struct Record<'a> {
    schema: &'a Schema,
    values: &'a [Value],
}

impl<'a> Record<'a> {
    pub fn get(&self, column: &str) -> Option<&'a Value> {
        self.schema.index_of(column).map(|i| &self.values[i])
    }

    pub fn values(&self) -> &'a [Value] {
        self.values
    }
}

/// An immutable, fully materialized table. Filtering produces new datasets
/// sharing the same schema.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    schema: Arc<Schema>,
    rows: Vec<Row>,
    fingerprint: Fingerprint,
}

impl Dataset {
    /// Build a dataset, checking every row against the schema.
    pub fn new(schema: Schema, rows: Vec<Row>) -> Result<Self, DatasetError> {
        for (r, row) in rows.iter().enumerate() {
            if row.len() != schema.len() {
                return Err(DatasetError::RowWidth {
                    row: r,
                    expected: schema.len(),
                    found: row.len(),
                });
            }
            for (col, value) in schema.columns().iter().zip(row) {
                if let Some(kind) = value.kind() {
                    if kind != col.kind {
                        return Err(DatasetError::KindMismatch {
                            row: r,
                            column: col.name.clone(),
                            expected: col.kind,
                        });
                    }
                }
            }
        }
        Ok(Self::from_parts(Arc::new(schema), rows))
    }

    /// Infer a dataset from textual cells (`None` = empty cell).
    ///
    /// A column is numeric when every non-empty cell is a finite number and
    /// at least one cell is non-empty; every other column is categorical.
    /// Duplicate header names get a `.1`, `.2`, ... suffix. Short rows are
    /// padded with nulls; a row wider than the header is a
    /// [`DatasetError::RowWidth`].
    ///
    /// A column with no values at all is categorical, so a numeric column
    /// that is empty (for example in a zero-row export) reads back as
    /// categorical.
    pub fn from_text_rows(
        headers: Vec<String>,
        rows: Vec<Vec<Option<String>>>,
    ) -> Result<Self, DatasetError> {
        let headers = dedupe_headers(headers);
        let width = headers.len();
        if let Some((row, cells)) = rows.iter().enumerate().find(|(_, r)| r.len() > width) {
            return Err(DatasetError::RowWidth {
                row,
                expected: width,
                found: cells.len(),
            });
        }

        let kinds: Vec<ColumnKind> = (0..width)
            .map(|c| {
                let mut any = false;
                let all_numeric = rows.iter().all(|row| match row.get(c).and_then(|v| v.as_deref()) {
                    None => true,
                    Some(s) => {
                        any = true;
                        parse_number(s).is_some()
                    }
                });
                if any && all_numeric {
                    ColumnKind::Numeric
                } else {
                    ColumnKind::Categorical
                }
            })
            .collect();

        let rows: Vec<Row> = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, None);
                row.into_iter()
                    .zip(&kinds)
                    .map(|(cell, kind)| match (cell, kind) {
                        (None, _) => Value::Null,
                        (Some(s), ColumnKind::Numeric) => {
                            parse_number(&s).map(Value::Number).unwrap_or(Value::Null)
                        }
                        (Some(s), ColumnKind::Categorical) => Value::Text(s),
                    })
                    .collect()
            })
            .collect();

        let columns = headers
            .into_iter()
            .zip(kinds)
            .map(|(name, kind)| Column { name, kind })
            .collect();
        Ok(Self::from_parts(Arc::new(Schema { columns }), rows))
    }

    /// Same schema, a different selection of rows.
    pub(crate) fn derive(&self, rows: Vec<Row>) -> Self {
        Self::from_parts(Arc::clone(&self.schema), rows)
    }

    fn from_parts(schema: Arc<Schema>, rows: Vec<Row>) -> Self {
        let fingerprint = Fingerprint::of(&schema, &rows);
        Self {
            schema,
            rows,
            fingerprint,
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn fingerprint(&self) -> Fingerprint {
        self.fingerprint
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the dataset has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn record(&self, index: usize) -> Option<Record<'_>> {
        self.rows.get(index).map(|values| Record {
            schema: &self.schema,
            values,
        })
    }

    pub fn records(&self) -> impl Iterator<Item = Record<'_>> {
        self.rows.iter().map(|values| Record {
            schema: &self.schema,
            values,
        })
    }

    /// All values of one column in row order.
    pub fn column_values(&self, column: &str) -> Option<impl Iterator<Item = &Value>> {
        let idx = self.schema.index_of(column)?;
        Some(self.rows.iter().map(move |row| &row[idx]))
    }

    /// Sorted distinct values of a column, `Null` included when present.
    pub fn unique_values(&self, column: &str) -> Option<BTreeSet<Value>> {
        Some(self.column_values(column)?.cloned().collect())
    }

    /// Observed `(min, max)` of a numeric column, ignoring nulls.
    pub fn numeric_range(&self, column: &str) -> Option<(f64, f64)> {
        self.column_values(column)?
            .filter_map(Value::as_f64)
            .fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }

    /// The first `n` rows.
    pub fn head(&self, n: usize) -> Self {
        self.derive(self.rows.iter().take(n).cloned().collect())
    }
}

pub(crate) fn dedupe_headers(headers: Vec<String>) -> Vec<String> {
    let mut seen: BTreeSet<String> = BTreeSet::new();
    headers
        .into_iter()
        .map(|h| {
            let mut name = h.clone();
            let mut n = 1;
            while seen.contains(&name) {
                name = format!("{h}.{n}");
                n += 1;
            }
            seen.insert(name.clone());
            name
        })
        .collect()
}
