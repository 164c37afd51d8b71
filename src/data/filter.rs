use std::collections::BTreeSet;

use serde::Serialize;

use super::model::{ColumnKind, Dataset, Row, Schema, Value};
use crate::error::FilterError;

// ---------------------------------------------------------------------------
// Filter predicates
// ---------------------------------------------------------------------------

/// One entry of a categorical selection: either a concrete value or the
/// `All` wildcard, which disables the filter for its column.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Choice {
    All,
    Value(Value),
}

impl Choice {
    /// Parse a user-supplied selection entry. The literal `all` is the
    /// wildcard; anything else is a categorical value.
    pub fn parse(s: &str) -> Self {
        if s == "all" {
            Choice::All
        } else {
            Choice::Value(Value::from(s))
        }
    }
}

impl From<Value> for Choice {
    fn from(v: Value) -> Self {
        Choice::Value(v)
    }
}

impl From<&str> for Choice {
    fn from(s: &str) -> Self {
        Choice::Value(Value::from(s))
    }
}

/// Inclusive numeric range over one column. Nulls never match.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RangeFilter {
    column: String,
    lower: f64,
    upper: f64,
}

impl RangeFilter {
    pub fn new(column: impl Into<String>, lower: f64, upper: f64) -> Result<Self, FilterError> {
        let column = column.into();
        if lower.is_nan() || upper.is_nan() || lower > upper {
            return Err(FilterError::InvalidRange {
                column,
                lower,
                upper,
            });
        }
        Ok(Self {
            column,
            lower,
            upper,
        })
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn bounds(&self) -> (f64, f64) {
        (self.lower, self.upper)
    }

    pub fn matches(&self, value: &Value) -> Result<bool, FilterError> {
        match value {
            Value::Null => Ok(false),
            Value::Number(v) => Ok(self.lower <= *v && *v <= self.upper),
            Value::Text(_) => Err(FilterError::TypeMismatch {
                column: self.column.clone(),
                expected: ColumnKind::Numeric,
                found: ColumnKind::Categorical,
            }),
        }
    }
}

/// Membership test over a categorical column.
///
/// * `All` in the selection matches every value, nulls included.
/// * An empty selection matches nothing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SetFilter {
    column: String,
    all: bool,
    values: BTreeSet<Value>,
}

impl SetFilter {
    pub fn new<I, C>(column: impl Into<String>, selected: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Choice>,
    {
        let mut all = false;
        let mut values = BTreeSet::new();
        for choice in selected {
            match choice.into() {
                Choice::All => all = true,
                Choice::Value(v) => {
                    values.insert(v);
                }
            }
        }
        // The wildcard makes the rest of the set irrelevant.
        if all {
            values.clear();
        }
        Self {
            column: column.into(),
            all,
            values,
        }
    }

    /// A filter that lets everything through.
    pub fn all(column: impl Into<String>) -> Self {
        Self::new(column, [Choice::All])
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn is_all(&self) -> bool {
        self.all
    }

    pub fn selected(&self) -> &BTreeSet<Value> {
        &self.values
    }

    pub fn matches(&self, value: &Value) -> Result<bool, FilterError> {
        if self.all {
            return Ok(true);
        }
        if let Value::Number(_) = value {
            return Err(FilterError::TypeMismatch {
                column: self.column.clone(),
                expected: ColumnKind::Categorical,
                found: ColumnKind::Numeric,
            });
        }
        Ok(self.values.contains(value))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum FilterPredicate {
    Range(RangeFilter),
    Set(SetFilter),
}

impl FilterPredicate {
    pub fn column(&self) -> &str {
        match self {
            FilterPredicate::Range(r) => r.column(),
            FilterPredicate::Set(s) => s.column(),
        }
    }

    /// Column kind this predicate can be applied to.
    pub fn expected_kind(&self) -> ColumnKind {
        match self {
            FilterPredicate::Range(_) => ColumnKind::Numeric,
            FilterPredicate::Set(_) => ColumnKind::Categorical,
        }
    }

    pub fn matches(&self, value: &Value) -> Result<bool, FilterError> {
        match self {
            FilterPredicate::Range(r) => r.matches(value),
            FilterPredicate::Set(s) => s.matches(value),
        }
    }

    /// Distinct for predicates that can select different rows. Bounds use
    /// `Debug` formatting, which keeps infinities apart.
    fn cache_key(&self) -> String {
        match self {
            FilterPredicate::Range(r) => {
                let (lower, upper) = r.bounds();
                format!("range({:?},{lower:?},{upper:?})", r.column())
            }
            FilterPredicate::Set(s) if s.is_all() => format!("set({:?},*)", s.column()),
            FilterPredicate::Set(s) => format!("set({:?},{:?})", s.column(), s.selected()),
        }
    }
}

impl From<RangeFilter> for FilterPredicate {
    fn from(r: RangeFilter) -> Self {
        FilterPredicate::Range(r)
    }
}

impl From<SetFilter> for FilterPredicate {
    fn from(s: SetFilter) -> Self {
        FilterPredicate::Set(s)
    }
}

// ---------------------------------------------------------------------------
// Filter set: conjunction of predicates
// ---------------------------------------------------------------------------

/// Predicates combined with AND. Evaluation order never changes the result.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FilterSet {
    predicates: Vec<FilterPredicate>,
}

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, predicate: impl Into<FilterPredicate>) -> Self {
        self.predicates.push(predicate.into());
        self
    }

    pub fn push(&mut self, predicate: impl Into<FilterPredicate>) {
        self.predicates.push(predicate.into());
    }

    pub fn predicates(&self) -> &[FilterPredicate] {
        &self.predicates
    }

    pub fn len(&self) -> usize {
        self.predicates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    /// Resolve every predicate against `schema`. Fails on the first unknown
    /// column or kind mismatch, before any row is looked at.
    pub fn bind<'a>(&'a self, schema: &Schema) -> Result<BoundFilterSet<'a>, FilterError> {
        let mut bound = Vec::with_capacity(self.predicates.len());
        for predicate in &self.predicates {
            let column = predicate.column();
            let idx = schema
                .index_of(column)
                .ok_or_else(|| FilterError::UnknownColumn(column.to_string()))?;
            let found = schema.columns()[idx].kind;
            let expected = predicate.expected_kind();
            if found != expected {
                return Err(FilterError::TypeMismatch {
                    column: column.to_string(),
                    expected,
                    found,
                });
            }
            bound.push((idx, predicate));
        }
        Ok(BoundFilterSet { predicates: bound })
    }

    /// Stable selection of the rows matching every predicate. The source
    /// dataset is left untouched.
    pub fn apply(&self, dataset: &Dataset) -> Result<Dataset, FilterError> {
        let bound = self.bind(dataset.schema())?;
        let mut rows = Vec::new();
        for row in dataset.rows() {
            if bound.matches(row)? {
                rows.push(row.clone());
            }
        }
        Ok(dataset.derive(rows))
    }

    /// Serialized arguments for cache lookups. Predicates are sorted so
    /// every permutation of the same set shares one key.
    pub fn cache_key(&self) -> String {
        let mut parts: Vec<String> = self
            .predicates
            .iter()
            .map(FilterPredicate::cache_key)
            .collect();
        parts.sort();
        format!("[{}]", parts.join(","))
    }
}

impl FromIterator<FilterPredicate> for FilterSet {
    fn from_iter<T: IntoIterator<Item = FilterPredicate>>(iter: T) -> Self {
        Self {
            predicates: iter.into_iter().collect(),
        }
    }
}

/// A filter set whose columns have been resolved to schema positions.
#[derive(Debug)]
pub struct BoundFilterSet<'a> {
    predicates: Vec<(usize, &'a FilterPredicate)>,
}

impl BoundFilterSet<'_> {
    pub fn matches(&self, row: &Row) -> Result<bool, FilterError> {
        for (idx, predicate) in &self.predicates {
            if !predicate.matches(&row[*idx])? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bank() -> Dataset {
        let rows = [
            ("25", "admin"),
            ("30", "admin"),
            ("", "admin"),
            ("50", "technician"),
            ("51", "admin"),
            ("40", ""),
        ];
        Dataset::from_text_rows(
            vec!["age".into(), "job".into()],
            rows.iter()
                .map(|(a, j)| {
                    vec![
                        (!a.is_empty()).then(|| a.to_string()),
                        (!j.is_empty()).then(|| j.to_string()),
                    ]
                })
                .collect(),
        ).unwrap()
    }

    fn ages(ds: &Dataset) -> Vec<Value> {
        ds.column_values("age").unwrap().cloned().collect()
    }

    #[test]
    fn range_is_inclusive_and_skips_nulls() {
        let ds = bank();
        let set = FilterSet::new().with(RangeFilter::new("age", 30.0, 50.0).unwrap());
        let out = set.apply(&ds).unwrap();
        assert_eq!(
            ages(&out),
            vec![Value::Number(30.0), Value::Number(50.0), Value::Number(40.0)]
        );
    }

    #[test]
    fn inverted_range_is_rejected() {
        let err = RangeFilter::new("age", 50.0, 30.0).unwrap_err();
        assert!(matches!(err, FilterError::InvalidRange { .. }));
        assert!(RangeFilter::new("age", f64::NAN, 1.0).is_err());
        assert!(RangeFilter::new("age", 5.0, 5.0).is_ok());
    }

    #[test]
    fn all_matches_nulls_and_unknown_categories() {
        let f = SetFilter::new("job", [Choice::All, Choice::from("admin")]);
        assert!(f.is_all());
        assert!(f.matches(&Value::Null).unwrap());
        assert!(f.matches(&Value::from("retired")).unwrap());
    }

    #[test]
    fn empty_selection_matches_nothing() {
        let ds = bank();
        let set = FilterSet::new().with(SetFilter::new("job", Vec::<Choice>::new()));
        assert!(set.apply(&ds).unwrap().is_empty());
    }

    #[test]
    fn set_filter_keeps_selected_values_only() {
        let ds = bank();
        let set = FilterSet::new().with(SetFilter::new("job", ["technician"]));
        let out = set.apply(&ds).unwrap();
        assert_eq!(ages(&out), vec![Value::Number(50.0)]);
    }

    #[test]
    fn unknown_column_fails_before_filtering() {
        let ds = bank();
        let set = FilterSet::new()
            .with(SetFilter::new("job", ["admin"]))
            .with(SetFilter::all("education"));
        assert_eq!(
            set.apply(&ds).unwrap_err(),
            FilterError::UnknownColumn("education".into())
        );
    }

    #[test]
    fn kind_mismatch_is_reported() {
        let ds = bank();
        let range_on_text = FilterSet::new().with(RangeFilter::new("job", 0.0, 1.0).unwrap());
        assert!(matches!(
            range_on_text.apply(&ds),
            Err(FilterError::TypeMismatch { .. })
        ));
        let set_on_number = FilterSet::new().with(SetFilter::all("age"));
        assert!(matches!(
            set_on_number.apply(&ds),
            Err(FilterError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn range_on_text_value_is_a_type_mismatch() {
        let f = RangeFilter::new("age", 0.0, 1.0).unwrap();
        assert!(f.matches(&Value::from("ten")).is_err());
        assert!(!f.matches(&Value::Null).unwrap());
    }

    #[test]
    fn source_dataset_is_untouched() {
        let ds = bank();
        let before = ds.clone();
        let _ = FilterSet::new()
            .with(SetFilter::new("job", ["admin"]))
            .apply(&ds)
            .unwrap();
        assert_eq!(ds, before);
    }

    #[test]
    fn cache_key_ignores_predicate_order() {
        let range = RangeFilter::new("age", 30.0, 50.0).unwrap();
        let set = SetFilter::new("job", ["admin"]);
        let a = FilterSet::new().with(range.clone()).with(set.clone());
        let b = FilterSet::new().with(set).with(range);
        assert_eq!(a.cache_key(), b.cache_key());
        assert_ne!(a.cache_key(), FilterSet::new().cache_key());
    }

    #[test]
    fn cache_key_keeps_infinite_bounds_apart() {
        let keys: Vec<String> = [
            (f64::NEG_INFINITY, f64::INFINITY),
            (f64::INFINITY, f64::INFINITY),
            (f64::NEG_INFINITY, f64::NEG_INFINITY),
        ]
        .into_iter()
        .map(|(lo, hi)| {
            FilterSet::new()
                .with(RangeFilter::new("age", lo, hi).unwrap())
                .cache_key()
        })
        .collect();
        assert_ne!(keys[0], keys[1]);
        assert_ne!(keys[0], keys[2]);
        assert_ne!(keys[1], keys[2]);
    }

    #[test]
    fn choice_parse_recognises_wildcard() {
        assert_eq!(Choice::parse("all"), Choice::All);
        assert_eq!(Choice::parse("admin"), Choice::Value(Value::from("admin")));
    }
}
