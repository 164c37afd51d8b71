use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::filter::{Choice, FilterSet, RangeFilter, SetFilter};
use super::model::Dataset;
use crate::error::FilterError;

/// Which columns the analyst can filter on: one numeric range column and a
/// fixed list of categorical columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterLayout {
    pub range_column: Option<String>,
    pub categorical_columns: Vec<String>,
}

impl Default for FilterLayout {
    fn default() -> Self {
        Self {
            range_column: Some("age".to_string()),
            categorical_columns: [
                "job",
                "marital",
                "default",
                "housing",
                "loan",
                "contact",
                "month",
                "day_of_week",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }
}

/// Current state of the filter controls. Anything left unset falls back to
/// "no restriction": the full observed range, or `All`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selections {
    pub lower: Option<f64>,
    pub upper: Option<f64>,
    pub categories: BTreeMap<String, Vec<Choice>>,
}

impl Selections {
    pub fn with_range(mut self, lower: f64, upper: f64) -> Self {
        self.lower = Some(lower);
        self.upper = Some(upper);
        self
    }

    pub fn select<I, C>(mut self, column: impl Into<String>, choices: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Choice>,
    {
        self.categories
            .insert(column.into(), choices.into_iter().map(Into::into).collect());
        self
    }
}

impl FilterLayout {
    /// Turn control state into a filter set: one predicate per layout
    /// column, plus one for every selected column outside the layout.
    ///
    /// Column existence and kinds are not checked here; applying the set
    /// reports them.
    pub fn build(&self, dataset: &Dataset, selections: &Selections) -> Result<FilterSet, FilterError> {
        let mut set = FilterSet::new();

        if let Some(column) = &self.range_column {
            let (min, max) = dataset
                .numeric_range(column)
                .unwrap_or((f64::NEG_INFINITY, f64::INFINITY));
            let lower = selections.lower.unwrap_or(min);
            let upper = selections.upper.unwrap_or(max);
            set.push(RangeFilter::new(column.as_str(), lower, upper)?);
        }

        for column in &self.categorical_columns {
            let filter = match selections.categories.get(column) {
                Some(choices) => SetFilter::new(column.as_str(), choices.iter().cloned()),
                None => SetFilter::all(column.as_str()),
            };
            set.push(filter);
        }

        for (column, choices) in &selections.categories {
            if !self.categorical_columns.contains(column) {
                set.push(SetFilter::new(column.as_str(), choices.iter().cloned()));
            }
        }

        Ok(set)
    }

    /// Selectable entries for a categorical control: the distinct values
    /// followed by the `All` wildcard.
    pub fn options(dataset: &Dataset, column: &str) -> Option<Vec<Choice>> {
        let mut options: Vec<Choice> = dataset
            .unique_values(column)?
            .into_iter()
            .filter(|v| !v.is_null())
            .map(Choice::Value)
            .collect();
        options.push(Choice::All);
        Some(options)
    }
}
