use proptest::prelude::*;

use rusty_lens::{
    distribution, export_dataset, load_bytes, Choice, Column, ColumnKind, Dataset, ExportFormat,
    FilterPredicate, FilterSet, LoadOptions, RangeFilter, Schema, SetFilter, SourceFormat, Value,
};

const JOBS: &[&str] = &["admin", "blue-collar", "technician", "retired", "self;employed"];
const LOANS: &[&str] = &["no", "yes", "unknown"];

fn schema(loan: &str) -> Schema {
    Schema::new(vec![
        Column::new("age", ColumnKind::Numeric),
        Column::new("job", ColumnKind::Categorical),
        Column::new(loan, ColumnKind::Categorical),
        Column::new("y", ColumnKind::Categorical),
    ])
    .unwrap()
}

fn text(options: &'static [&'static str]) -> impl Strategy<Value = Value> {
    prop_oneof![
        1 => Just(Value::Null),
        6 => proptest::sample::select(options).prop_map(Value::from),
    ]
}

fn row() -> impl Strategy<Value = Vec<Value>> {
    (
        prop_oneof![1 => Just(Value::Null), 6 => (18u8..90).prop_map(|a| Value::Number(a as f64))],
        text(JOBS),
        text(LOANS),
        text(&["no", "yes"]),
    )
        .prop_map(|(age, job, loan, y)| vec![age, job, loan, y])
}

/// Datasets whose first row has an age, so the column reads back as numeric.
fn dataset_with(loan: &'static str) -> impl Strategy<Value = Dataset> {
    (18u8..90, proptest::collection::vec(row(), 0..40)).prop_map(move |(first_age, mut rows)| {
        if let Some(first) = rows.first_mut() {
            first[0] = Value::Number(first_age as f64);
        }
        Dataset::new(schema(loan), rows).unwrap()
    })
}

fn dataset() -> impl Strategy<Value = Dataset> {
    dataset_with("loan")
}

/// Like [`dataset`], sometimes with a `;` in a column name.
fn any_headers_dataset() -> impl Strategy<Value = Dataset> {
    prop_oneof![dataset_with("loan"), dataset_with("loan;status")]
}

fn selection(options: &'static [&'static str]) -> impl Strategy<Value = Vec<Choice>> {
    proptest::collection::vec(
        prop_oneof![
            1 => Just(Choice::All),
            8 => proptest::sample::select(options).prop_map(Choice::from),
        ],
        0..4,
    )
}

fn predicates() -> impl Strategy<Value = Vec<FilterPredicate>> {
    (0.0f64..100.0, 0.0f64..60.0, selection(JOBS), selection(LOANS)).prop_map(
        |(lower, span, jobs, loans)| {
            vec![
                RangeFilter::new("age", lower, lower + span).unwrap().into(),
                SetFilter::new("job", jobs).into(),
                SetFilter::new("loan", loans).into(),
            ]
        },
    )
}

proptest! {
    #[test]
    fn filtering_is_idempotent(ds in dataset(), preds in predicates()) {
        let set: FilterSet = preds.into_iter().collect();
        let once = set.apply(&ds).unwrap();
        let twice = set.apply(&once).unwrap();
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn predicate_order_does_not_matter(
        ds in dataset(),
        preds in predicates(),
        perm in Just(vec![0usize, 1, 2]).prop_shuffle(),
    ) {
        let forward: FilterSet = preds.iter().cloned().collect();
        let permuted: FilterSet = perm.iter().map(|&i| preds[i].clone()).collect();
        prop_assert_eq!(forward.apply(&ds).unwrap(), permuted.apply(&ds).unwrap());
        prop_assert_eq!(forward.cache_key(), permuted.cache_key());
    }

    #[test]
    fn filtering_is_a_stable_selection(ds in dataset(), preds in predicates()) {
        let set: FilterSet = preds.into_iter().collect();
        let out = set.apply(&ds).unwrap();
        let bound = set.bind(ds.schema()).unwrap();
        let expected: Vec<_> = ds
            .rows()
            .iter()
            .filter(|row| bound.matches(row).unwrap())
            .cloned()
            .collect();
        prop_assert_eq!(out.rows(), expected.as_slice());
        prop_assert_eq!(out.schema(), ds.schema());
    }

    #[test]
    fn wildcard_equals_omitting_the_predicate(
        ds in dataset(),
        lower in 0.0f64..100.0,
        others in selection(JOBS),
    ) {
        let range = RangeFilter::new("age", lower, lower + 20.0).unwrap();
        let mut choices = others;
        choices.push(Choice::All);
        let with_all = FilterSet::new().with(range.clone()).with(SetFilter::new("job", choices));
        let without = FilterSet::new().with(range);
        prop_assert_eq!(with_all.apply(&ds).unwrap(), without.apply(&ds).unwrap());
    }

    #[test]
    fn empty_selection_yields_no_rows(ds in dataset(), preds in predicates()) {
        let mut set: FilterSet = preds.into_iter().collect();
        set.push(SetFilter::new("loan", Vec::<Choice>::new()));
        prop_assert!(set.apply(&ds).unwrap().is_empty());
    }

    #[test]
    fn percentages_sum_to_one_hundred(ds in dataset()) {
        match distribution(&ds, "y") {
            Ok(dist) => {
                prop_assert!((dist.percentage_sum() - 100.0).abs() <= 1e-6);
                let counted: usize = dist.shares().iter().map(|s| s.count).sum();
                prop_assert_eq!(counted, dist.total());
            }
            Err(_) => prop_assert!(ds.column_values("y").unwrap().all(Value::is_null)),
        }
    }

    #[test]
    fn csv_export_round_trips(ds in any_headers_dataset()) {
        prop_assume!(!ds.is_empty());
        let bytes = export_dataset(&ds, ExportFormat::Csv).unwrap();
        let back = load_bytes(&bytes, Some(SourceFormat::Delimited), &LoadOptions::default()).unwrap();
        prop_assert_eq!(back, ds);
    }
}
