use std::path::PathBuf;

use tabx::dataset::{DatasetStore, Record};
use tabx::domain::{Message, TVConfig, TVError};
use tabx::export::{ExportOptions, FileName, to_table};
use tabx::loader::load_file;
use tabx::model::Model;
use tabx::view::{FilterPredicate, MatchMode, ViewConfig, compute_view};

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn people() -> (Vec<Record>, Vec<String>) {
    let records = vec![
        Record::from_iter([("name", "Ann"), ("age", "30")]),
        Record::from_iter([("name", "Bo"), ("age", "41")]),
    ];
    (records, vec!["name".to_string(), "age".to_string()])
}

#[test]
fn csv_fixture_loads_as_text() {
    let table = load_file(&fixture("people.csv"), b',').unwrap();
    assert_eq!(table.fields, ["name", "age", "city"]);
    assert_eq!(table.records.len(), 3);
    assert_eq!(table.records[0].get("age"), "30");
    assert_eq!(table.records[1].get("city"), "");
    assert_eq!(table.records[2].get("name"), "Cy, Jr.");
}

#[test]
fn tsv_fixture_through_the_model() {
    let path = fixture("notes.tsv");
    let cfg = TVConfig::new(path.clone());
    let mut model = Model::init(&cfg, 80, 24).unwrap();
    model.load_data_file(path).unwrap();

    assert_eq!(model.view_config().selected(), ["id", "note"]);
    assert_eq!(model.row_metrics().height(0), Some(40));
    assert_eq!(model.row_metrics().height(1), Some(80));
    assert_eq!(model.get_uidata().name, "notes.tsv");
}

#[test]
fn missing_file_keeps_model_empty() {
    let cfg = TVConfig::new("nope.csv");
    let mut model = Model::init(&cfg, 80, 24).unwrap();
    assert!(matches!(
        model.load_data_file(fixture("nope.csv")),
        Err(TVError::FileNotFound)
    ));
    assert!(model.dataset().is_none());
}

#[test]
fn empty_load_leaves_previous_dataset() {
    let mut store = DatasetStore::default();
    let (records, fields) = people();
    let first = store.load(records, fields).unwrap();

    assert!(matches!(store.load(vec![], vec![]), Err(TVError::EmptyDataset)));
    assert!(matches!(
        store.load(vec![Record::default()], vec![]),
        Err(TVError::EmptyDataset)
    ));
    assert_eq!(store.current().map(|d| d.len()), Some(2));
    assert_eq!(store.current().unwrap().fields(), first.fields());
}

#[test]
fn single_column_export_example() {
    let mut store = DatasetStore::default();
    let (records, fields) = people();
    let ds = store.load(records, fields).unwrap();

    let config = ViewConfig::for_dataset(&ds).toggle_column("age");
    let rows = compute_view(&ds, &config);
    let table = to_table(&ds, &rows, config.selected());
    assert_eq!(table.header, ["name"]);
    assert_eq!(table.rows, vec![vec!["Ann"], vec!["Bo"]]);
}

#[test]
fn exact_filter_without_match_is_empty() {
    let mut store = DatasetStore::default();
    let (records, fields) = people();
    let ds = store.load(records, fields).unwrap();

    let config = ViewConfig::for_dataset(&ds)
        .set_filter("name", FilterPredicate::new(MatchMode::Exact, false, "Zzz"));
    let rows = compute_view(&ds, &config);
    assert!(rows.is_empty());
    let table = to_table(&ds, &rows, config.selected());
    assert_eq!(table.header, ["name", "age"]);
    assert!(table.rows.is_empty());
}

#[test]
fn model_exports_real_xlsx() {
    let dir = std::env::temp_dir().join(format!("tabx-it-{}", std::process::id()));
    let cfg = TVConfig::new(fixture("people.csv"));
    let mut model = Model::init(&cfg, 80, 24)
        .unwrap()
        .with_export_options(
            ExportOptions::default()
                .with_directory(dir.clone())
                .with_file_name(FileName::Fixed("people.xlsx".into())),
        );
    model.load_data_file(fixture("people.csv")).unwrap();
    model.update(Some(Message::Export)).unwrap();

    let bytes = std::fs::read(dir.join("people.xlsx")).unwrap();
    assert_eq!(&bytes[..2], b"PK");
    std::fs::remove_dir_all(dir).unwrap();
}
