use std::collections::BTreeMap;

use serde::Serialize;

use super::model::{dedupe_headers, Column, ColumnKind, Dataset, Schema, Value};
use crate::error::{DatasetError, DistributionError};

/// Share of one distinct value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Share {
    pub value: Value,
    pub count: usize,
    pub percentage: f64,
}

/// Percentage breakdown of a column, sorted by value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Distribution {
    column: String,
    kind: ColumnKind,
    total: usize,
    shares: Vec<Share>,
}

/// Normalized frequency of each non-null value of `target`.
///
/// Fails with [`DistributionError::EmptyDataset`] when there is nothing to
/// divide by: no rows at all, or only nulls in the target column.
pub fn distribution(dataset: &Dataset, target: &str) -> Result<Distribution, DistributionError> {
    let kind = dataset
        .schema()
        .column(target)
        .map(|c| c.kind)
        .ok_or_else(|| DistributionError::UnknownColumn(target.to_string()))?;

    let mut counts: BTreeMap<&Value, usize> = BTreeMap::new();
    let mut total = 0usize;
    for value in dataset
        .column_values(target)
        .ok_or_else(|| DistributionError::UnknownColumn(target.to_string()))?
    {
        if value.is_null() {
            continue;
        }
        *counts.entry(value).or_default() += 1;
        total += 1;
    }

    if total == 0 {
        return Err(DistributionError::EmptyDataset {
            column: target.to_string(),
        });
    }

    let shares = counts
        .into_iter()
        .map(|(value, count)| Share {
            value: value.clone(),
            count,
            percentage: count as f64 / total as f64 * 100.0,
        })
        .collect();

    Ok(Distribution {
        column: target.to_string(),
        kind,
        total,
        shares,
    })
}

impl Distribution {
    pub fn column(&self) -> &str {
        &self.column
    }

    /// Kind of the source column.
    pub fn kind(&self) -> ColumnKind {
        self.kind
    }

    /// Number of non-null values counted.
    pub fn total(&self) -> usize {
        self.total
    }

    pub fn shares(&self) -> &[Share] {
        &self.shares
    }

    pub fn percentage_of(&self, value: &Value) -> Option<f64> {
        self.shares
            .binary_search_by(|s| s.value.cmp(value))
            .ok()
            .map(|i| self.shares[i].percentage)
    }

    pub fn percentage_sum(&self) -> f64 {
        self.shares.iter().map(|s| s.percentage).sum()
    }

    /// Tabular form with columns `<target>`, `count`, `percentage`.
    pub fn to_dataset(&self) -> Result<Dataset, DatasetError> {
        let names = dedupe_headers(vec![
            self.column.clone(),
            "count".to_string(),
            "percentage".to_string(),
        ]);
        let kinds = [self.kind, ColumnKind::Numeric, ColumnKind::Numeric];
        let schema = Schema::new(
            names
                .into_iter()
                .zip(kinds)
                .map(|(name, kind)| Column::new(name, kind))
                .collect(),
        )?;
        let rows = self
            .shares
            .iter()
            .map(|s| {
                vec![
                    s.value.clone(),
                    Value::Number(s.count as f64),
                    Value::Number(s.percentage),
                ]
            })
            .collect();
        Dataset::new(schema, rows)
    }
}
