//! SQLite 表输出集成测试
//!
//! 需要 `sqlite` feature：`cargo test --features sqlite`

#![cfg(feature = "sqlite")]

use fanlog::sinks::table::{fields, open_database, SqliteDatabase};
use fanlog::{
    FailurePolicy, FanlogError, FieldValue, OwnerLink, TableConfig, TableOptions, TableSink,
};
use std::sync::Arc;

fn prepared(dir: &tempfile::TempDir) -> (SqliteDatabase, TableConfig) {
    let path = dir.path().join("fanlog.db");
    let config = TableConfig::default().sqlite(&path).name("job_log");
    let db = SqliteDatabase::open(path.to_str().unwrap(), 1, 5000).unwrap();
    db.execute_batch(
        "CREATE TABLE job_log (
             id INTEGER PRIMARY KEY AUTOINCREMENT,
             status TEXT,
             progress INTEGER,
             updated TIMESTAMP
         );
         CREATE TABLE pair (x INTEGER, y INTEGER, PRIMARY KEY (x, y));",
    )
    .unwrap();
    (db, config)
}

#[test]
fn insert_update_and_new_session() {
    let dir = tempfile::tempdir().unwrap();
    let (_db, config) = prepared(&dir);

    let mut sink = TableSink::new(OwnerLink::detached(), true, FailurePolicy::Strict);
    sink.configure(TableOptions::new(config.date_column("updated")))
        .unwrap();

    sink.write(fields([("status", FieldValue::from("running")), ("progress", FieldValue::from(0))]))
        .unwrap();
    assert_eq!(sink.primary_key(), Some(&FieldValue::Integer(1)));

    sink.write(fields([("status", FieldValue::from("done")), ("progress", FieldValue::from(100))]))
        .unwrap();
    assert_eq!(sink.primary_key(), Some(&FieldValue::Integer(1)));

    sink.new_session().unwrap();
    sink.write(fields([("status", "queued")])).unwrap();
    assert_eq!(sink.primary_key(), Some(&FieldValue::Integer(2)));
}

#[test]
fn configured_from_vendor_options() {
    let dir = tempfile::tempdir().unwrap();
    let (_db, config) = prepared(&dir);

    let database = open_database(&config).unwrap();
    let proxy = database.table("job_log").unwrap();
    assert_eq!(proxy.primary_key(), vec!["id".to_string()]);

    let mut sink = TableSink::new(OwnerLink::detached(), true, FailurePolicy::Lenient);
    sink.configure(TableOptions::new(config)).unwrap();
    assert_eq!(sink.primary_key_column(), Some("id"));
}

#[test]
fn composite_key_table_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let (db, _config) = prepared(&dir);

    let mut sink = TableSink::new(OwnerLink::detached(), true, FailurePolicy::Lenient);
    let result = sink.configure(
        TableOptions::new(TableConfig::default().name("pair")).database(Arc::new(db)),
    );

    assert!(matches!(result, Err(FanlogError::ConfigError(_))));
    assert!(!sink.is_configured());
}
