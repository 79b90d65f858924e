//! End-to-end tests: data tree on disk -> manifest -> coordinator -> SQLite.
//!
//! Every test builds its own `<root>/<year>/<month>/<day>/...` tree in a temp
//! directory, so nothing depends on fixtures being present.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tick_loader::{
    DatabaseConfig, DayCoordinator, DayManifest, DayPhase, IngestConfig, IngestError,
    SqliteTickStore, TickStore,
};

const HEADER: &str = "市场代码,证券代码,时间,最新价,成交笔数,成交额,成交量,方向,\
    买一价,买二价,买三价,买四价,买五价,卖一价,卖二价,卖三价,卖四价,卖五价,\
    买一量,买二量,买三量,买四量,买五量,卖一量,卖二量,卖三量,卖四量,卖五量";

fn tick_line(market: &str, symbol: &str, day: &str, second: usize, price: &str) -> String {
    format!(
        "{market},{symbol},2016-04-{day} 09:3{}:{:02},{price},2,2000,200,B,\
         9.9,9.8,9.7,9.6,9.5,10.1,10.2,10.3,10.4,10.5,\
         100,200,300,400,500,150,250,350,450,550",
        second / 60,
        second % 60
    )
}

fn write_symbol(day_dir: &Path, market: &str, symbol: &str, day: &str, rows: usize) -> PathBuf {
    fs::create_dir_all(day_dir).unwrap();
    let mut body = String::from(HEADER);
    body.push('\n');
    for i in 0..rows {
        body.push_str(&tick_line(market, symbol, day, i, "10.00"));
        body.push('\n');
    }
    let path = day_dir.join(format!("{symbol}.csv"));
    fs::write(&path, body).unwrap();
    path
}

fn coordinator(partitions: usize, workers: usize) -> DayCoordinator {
    DayCoordinator::new(&IngestConfig {
        partitions,
        workers,
    })
    .unwrap()
}

#[test]
fn test_loads_one_day_end_to_end() {
    let root = TempDir::new().unwrap();
    let day_dir = root.path().join("2016").join("04").join("01");
    write_symbol(&day_dir, "sh", "600000", "01", 10);
    write_symbol(&day_dir, "sz", "000001", "01", 10);
    write_symbol(&day_dir, "sz", "000002", "01", 10);

    let manifest = DayManifest::scan(root.path(), "2016", "04").unwrap();
    assert_eq!(manifest.len(), 1);
    assert_eq!(manifest.total_files(), 3);

    let mut store = SqliteTickStore::open_in_memory().unwrap();
    let report = coordinator(4, 2).run(&mut store, &manifest);

    let day = &report.days[0];
    assert_eq!(day.day, "01");
    assert_eq!(day.phase, DayPhase::Committed);
    assert_eq!(day.inserted, 30);
    assert!(day.is_clean());
    assert_eq!(day.flush_order(), vec![0, 1, 2, 3]);

    // One commit per partition, including the empty fourth one
    assert_eq!(store.stats().commits, 4);
    assert_eq!(store.count_rows().unwrap(), 30);

    let rate = day.records_per_sec.expect("rate");
    assert!(rate.is_finite() && rate > 0.0);
}

#[test]
fn test_malformed_line_is_dropped_not_fatal() {
    let root = TempDir::new().unwrap();
    let day_dir = root.path().join("2016").join("04").join("05");
    write_symbol(&day_dir, "sz", "000001", "05", 5);

    let mut body = String::from(HEADER);
    body.push('\n');
    for i in 0..5 {
        let price = if i == 2 { "abc" } else { "8.25" };
        body.push_str(&tick_line("sh", "600036", "05", i, price));
        body.push('\n');
    }
    fs::write(day_dir.join("600036.csv"), body).unwrap();

    let manifest = DayManifest::scan(root.path(), "2016", "04").unwrap();
    let mut store = SqliteTickStore::open_in_memory().unwrap();
    let report = coordinator(2, 2).run(&mut store, &manifest);

    let day = &report.days[0];
    assert_eq!(day.phase, DayPhase::Committed);
    assert_eq!(day.inserted, 9);
    assert_eq!(day.rejected(), 1);
    assert_eq!(store.count_rows().unwrap(), 9);

    let errors: Vec<_> = day.errors().collect();
    assert_eq!(errors.len(), 1);
    match errors[0] {
        IngestError::MalformedRecord { file, line, .. } => {
            assert!(file.ends_with("600036.csv"));
            // header is line 1, third data line is line 4
            assert_eq!(*line, 4);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_empty_day_commits_nothing() {
    let root = TempDir::new().unwrap();
    fs::create_dir_all(root.path().join("2016").join("04").join("06")).unwrap();

    let manifest = DayManifest::scan(root.path(), "2016", "04").unwrap();
    let mut store = SqliteTickStore::open_in_memory().unwrap();
    let report = coordinator(3, 2).run(&mut store, &manifest);

    let day = &report.days[0];
    assert_eq!(day.inserted, 0);
    assert_eq!(day.phase, DayPhase::Committed);
    assert_eq!(day.error_count(), 0);
    assert!(day.records_per_sec.map_or(true, |r| r == 0.0));
    assert_eq!(store.count_rows().unwrap(), 0);
}

#[test]
fn test_missing_month_is_fatal() {
    let root = TempDir::new().unwrap();
    fs::create_dir_all(root.path().join("2016")).unwrap();

    let err = DayManifest::scan(root.path(), "2016", "07").unwrap_err();
    assert!(matches!(err, IngestError::DirectoryNotFound(_)));
    assert!(err.is_fatal());
}

#[test]
fn test_days_load_in_order_into_file_database() {
    let root = TempDir::new().unwrap();
    let month = root.path().join("2016").join("04");
    write_symbol(&month.join("12"), "sh", "600000", "12", 4);
    write_symbol(&month.join("11"), "sh", "600000", "11", 3);
    // Symbol subdirectory layout is picked up as well
    write_symbol(&month.join("11").join("000001"), "sz", "000001", "11", 2);

    let db = TempDir::new().unwrap();
    let config = DatabaseConfig {
        path: db.path().join("ticks.db"),
        ..DatabaseConfig::default()
    };

    let manifest = DayManifest::scan(root.path(), "2016", "04").unwrap();
    let mut store = SqliteTickStore::open(&config).unwrap();
    let report = coordinator(2, 2).run(&mut store, &manifest);
    store.close().unwrap();

    let seen: Vec<_> = report.days.iter().map(|d| d.day.as_str()).collect();
    assert_eq!(seen, vec!["11", "12"]);
    assert_eq!(report.inserted(), 9);
    assert_eq!(report.failed_days().count(), 0);

    let reader = SqliteTickStore::open_read_only(&config.path).unwrap();
    let days = reader.day_summaries().unwrap();
    assert_eq!(days.len(), 2);
    assert_eq!(days[0].day, "2016-04-11");
    assert_eq!(days[0].rows, 5);
    assert_eq!(days[0].symbols, 2);
    assert_eq!(days[1].rows, 4);
}

#[test]
fn test_day_filter_limits_run() {
    let root = TempDir::new().unwrap();
    let month = root.path().join("2016").join("04");
    write_symbol(&month.join("01"), "sh", "600000", "01", 2);
    write_symbol(&month.join("02"), "sh", "600000", "02", 2);

    let mut manifest = DayManifest::scan(root.path(), "2016", "04").unwrap();
    manifest.retain_days(&["02".to_string()]);

    let mut store = SqliteTickStore::open_in_memory().unwrap();
    let report = coordinator(1, 1).run(&mut store, &manifest);

    assert_eq!(report.days.len(), 1);
    assert_eq!(report.days[0].day, "02");
    assert_eq!(store.count_rows().unwrap(), 2);
}
