use std::io::Write;
use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Array, Int64Array, StringArray};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use pretty_assertions::assert_eq;

use rusty_lens::{
    load_bytes, load_file, AppConfig, Choice, ColumnKind, Dataset, DistributionError, Engine,
    Error, ExportFormat, FilterError, FilterLayout, FilterSet, LoadError, LoadOptions,
    RangeFilter, Selections, Session, SetFilter, Value,
};

const CLIENTS: &str = "age,job,y\n\
    25,admin,no\n\
    28,blue-collar,no\n\
    30,admin,yes\n\
    33,technician,no\n\
    37,admin,no\n\
    41,blue-collar,yes\n\
    45,technician,no\n\
    50,admin,yes\n\
    55,admin,no\n\
    60,technician,yes\n";

fn clients() -> Dataset {
    load_bytes(CLIENTS.as_bytes(), None, &LoadOptions::default()).unwrap()
}

fn ages(ds: &Dataset) -> Vec<f64> {
    ds.column_values("age")
        .unwrap()
        .filter_map(Value::as_f64)
        .collect()
}

#[test]
fn age_and_job_filters_are_conjunctive() {
    let engine = Engine::new();
    let ds = clients();
    let set = FilterSet::new()
        .with(RangeFilter::new("age", 30.0, 50.0).unwrap())
        .with(SetFilter::new("job", ["admin"]));
    let filtered = engine.filter(&ds, &set).unwrap();

    assert_eq!(ages(&filtered), vec![30.0, 37.0, 50.0]);
    assert!(filtered
        .records()
        .all(|r| r.get("job") == Some(&Value::from("admin"))));

    let dist = engine.distribution(&filtered, "y").unwrap();
    assert_eq!(dist.total(), 3);
    let yes = dist.percentage_of(&Value::from("yes")).unwrap();
    assert!((yes - 200.0 / 3.0).abs() < 1e-9);
}

#[test]
fn no_match_reports_empty_distribution() {
    let engine = Engine::new();
    let ds = clients();
    let set = FilterSet::new()
        .with(RangeFilter::new("age", 51.0, 54.0).unwrap())
        .with(SetFilter::new("job", ["admin"]));
    let filtered = engine.filter(&ds, &set).unwrap();
    assert!(filtered.is_empty());
    assert_eq!(filtered.schema(), ds.schema());
    assert!(matches!(
        engine.distribution(&filtered, "y"),
        Err(DistributionError::EmptyDataset { .. })
    ));
}

#[test]
fn wildcard_ignores_the_job_column() {
    let ds = clients();
    let range = RangeFilter::new("age", 30.0, 50.0).unwrap();
    let age_only = FilterSet::new().with(range.clone()).apply(&ds).unwrap();
    let with_all = FilterSet::new()
        .with(range)
        .with(SetFilter::new("job", [Choice::parse("all")]))
        .apply(&ds)
        .unwrap();
    assert_eq!(with_all, age_only);
    assert_eq!(with_all.len(), 6);
}

#[test]
fn structural_errors_are_reported_before_filtering() {
    let ds = clients();
    let unknown = FilterSet::new().with(SetFilter::new("education", ["basic.4y"]));
    assert_eq!(
        unknown.apply(&ds),
        Err(FilterError::UnknownColumn("education".into()))
    );

    let mismatched = FilterSet::new().with(RangeFilter::new("job", 0.0, 1.0).unwrap());
    assert!(matches!(
        mismatched.apply(&ds),
        Err(FilterError::TypeMismatch { .. })
    ));

    assert!(matches!(
        RangeFilter::new("age", 50.0, 30.0),
        Err(FilterError::InvalidRange { .. })
    ));
}

#[test]
fn session_compares_raw_and_filtered_targets() {
    let config = AppConfig {
        filters: FilterLayout {
            range_column: Some("age".into()),
            categorical_columns: vec!["job".into()],
        },
        ..AppConfig::default()
    };
    let mut session = Session::new(config);
    session.load_bytes(CLIENTS.as_bytes(), None).unwrap();

    let cmp = session
        .apply(&Selections::default().with_range(40.0, 60.0).select("job", ["technician"]))
        .unwrap();
    assert_eq!(ages(&cmp.filtered), vec![45.0, 60.0]);

    let raw = cmp.raw_distribution.as_ref().unwrap();
    assert_eq!(raw.percentage_of(&Value::from("yes")), Some(40.0));
    let filtered = cmp.filtered_distribution.as_ref().unwrap();
    assert_eq!(filtered.percentage_of(&Value::from("yes")), Some(50.0));

    let csv = session.export_filtered(&cmp, ExportFormat::Csv).unwrap();
    assert_eq!(
        String::from_utf8(csv.to_vec()).unwrap(),
        "age,job,y\n45,technician,no\n60,technician,yes\n"
    );
}

#[test]
fn session_without_upload_refuses_to_filter() {
    let session = Session::new(AppConfig::default());
    assert!(matches!(session.export_raw(ExportFormat::Csv), Err(Error::NoDataset)));
}

#[test]
fn delimited_file_loads_from_disk() {
    let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
    file.write_all(CLIENTS.replace(',', ";").as_bytes()).unwrap();
    let ds = load_file(file.path(), &LoadOptions::default()).unwrap();
    assert_eq!(ds, clients());
}

#[test]
fn spreadsheet_file_loads_from_disk() {
    let original = clients();
    let bytes = rusty_lens::export_dataset(&original, ExportFormat::Spreadsheet).unwrap();
    let mut file = tempfile::Builder::new().suffix(".xlsx").tempfile().unwrap();
    file.write_all(&bytes).unwrap();
    let ds = load_file(file.path(), &LoadOptions::default()).unwrap();
    assert_eq!(ds, original);
}

#[test]
fn misnamed_spreadsheet_falls_back_to_csv() {
    let mut file = tempfile::Builder::new().suffix(".xlsx").tempfile().unwrap();
    file.write_all(CLIENTS.as_bytes()).unwrap();
    let ds = load_file(file.path(), &LoadOptions::default()).unwrap();
    assert_eq!(ds.len(), 10);
}

#[test]
fn json_file_loads_from_disk() {
    let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
    file.write_all(br#"[{"age": 30, "job": "admin", "y": "yes"}, {"age": 41, "job": null, "y": "no"}]"#)
        .unwrap();
    let ds = load_file(file.path(), &LoadOptions::default()).unwrap();
    assert_eq!(ds.len(), 2);
    assert_eq!(ds.schema().column("age").unwrap().kind, ColumnKind::Numeric);
    assert_eq!(ds.record(1).unwrap().get("job"), Some(&Value::Null));
}

#[test]
fn parquet_file_loads_from_disk() {
    let batch = RecordBatch::try_from_iter([
        ("age", Arc::new(Int64Array::from(vec![Some(30), None, Some(52)])) as ArrayRef),
        ("duration", Arc::new(Float64Array::from(vec![12.5, 300.0, 7.0])) as ArrayRef),
        ("y", Arc::new(StringArray::from(vec!["no", "yes", "no"])) as ArrayRef),
    ])
    .unwrap();
    let file = tempfile::Builder::new().suffix(".parquet").tempfile().unwrap();
    let mut writer = ArrowWriter::try_new(file.reopen().unwrap(), batch.schema(), None).unwrap();
    writer.write(&batch).unwrap();
    writer.close().unwrap();

    let ds = load_file(file.path(), &LoadOptions::default()).unwrap();
    assert_eq!(ds.len(), 3);
    assert_eq!(ds.schema().column("age").unwrap().kind, ColumnKind::Numeric);
    assert_eq!(ds.record(1).unwrap().get("age"), Some(&Value::Null));
    assert_eq!(ds.record(0).unwrap().get("duration"), Some(&Value::Number(12.5)));
}

#[test]
fn garbage_reports_both_attempts() {
    let err = load_bytes(&[0xff, 0xfe, 0x00, 0x9f], None, &LoadOptions::default()).unwrap_err();
    match err {
        LoadError::UnreadableFile { attempts } => {
            let formats: Vec<_> = attempts.iter().map(|(f, _)| *f).collect();
            assert_eq!(formats, vec!["csv", "spreadsheet"]);
        }
        other => panic!("unexpected error: {other}"),
    }
}
