//! Integration tests for the audit command

use crate::common::{quiet_options, records, run_audit, sample_data, stored_rows, CliTestRunner, TestFixture};
use rowaudit::config::DatabaseType;
use rowaudit::RunOptions;

fn three_run_scenario(audit_type: DatabaseType) {
    let fixture = TestFixture::new().unwrap();
    fixture.create_sqlite_source("source.sqlite", sample_data::TABLE_T).unwrap();
    let config = fixture.config("source.sqlite", audit_type, &[("T", &["id"])]);

    // Run 1: empty store, both rows recorded without dumps
    let run1 = run_audit(&config, quiet_options()).unwrap();
    assert_eq!(run1.database_changes, 2);
    assert_eq!(run1.rows_processed, 2);

    let after_run1 = stored_rows(&config, "T");
    assert_eq!(after_run1.len(), 2);
    assert!(after_run1.iter().all(|r| r.dump.is_none()));
    assert_eq!(after_run1[0].identity.as_deref(), Some("1"));
    assert_eq!(after_run1[1].identity.as_deref(), Some("2"));

    // Run 2: unchanged data
    let run2 = run_audit(&config, quiet_options()).unwrap();
    assert_eq!(run2.database_changes, 0);
    assert_eq!(run2.rows_processed, 2);
    assert_eq!(stored_rows(&config, "T").len(), 2);

    // Run 3: row 2 changes
    fixture
        .execute_sqlite("source.sqlite", "UPDATE T SET name = 'c' WHERE id = 2")
        .unwrap();
    let run3 = run_audit(&config, quiet_options()).unwrap();
    assert_eq!(run3.database_changes, 1);
    assert_eq!(run3.changes_for("T"), Some(1));

    let after_run3 = stored_rows(&config, "T");
    assert_eq!(after_run3.len(), 3);
    assert_eq!(after_run3[0], after_run1[0], "record for identity 1 is untouched");

    let newest = &after_run3[2];
    assert_eq!(newest.identity.as_deref(), Some("2"));
    assert_ne!(newest.fingerprint, after_run1[1].fingerprint);
    let dump: serde_json::Value = serde_json::from_str(newest.dump.as_deref().unwrap()).unwrap();
    assert_eq!(dump, serde_json::json!({"id": 2, "name": "c"}));
}

#[test]
fn test_three_run_scenario_duckdb_store() {
    three_run_scenario(DatabaseType::DuckDb);
}

#[test]
fn test_three_run_scenario_sqlite_store() {
    three_run_scenario(DatabaseType::Sqlite);
}

#[test]
fn test_audit_whole_catalog_when_no_tables_configured() {
    let fixture = TestFixture::new().unwrap();
    fixture
        .create_sqlite_source("source.sqlite", sample_data::CHINOOK_SUBSET)
        .unwrap();
    let config = fixture.config("source.sqlite", DatabaseType::DuckDb, &[]);

    let summary = run_audit(&config, quiet_options()).unwrap();
    let tables: Vec<&str> = summary.tables.iter().map(|t| t.table.as_str()).collect();
    assert_eq!(tables, vec!["Album", "Artist"]);
    assert_eq!(summary.rows_processed, 7);
    assert_eq!(summary.database_changes, 7);

    // Keyless tables are identified by fingerprint
    assert!(records(&config, "Album").iter().all(|r| r.identity.is_none()));
}

#[test]
fn test_audit_duckdb_source() {
    let fixture = TestFixture::new().unwrap();
    fixture
        .create_duckdb_source(
            "source.duckdb",
            "CREATE TABLE Track (TrackId INTEGER, Name VARCHAR, Milliseconds BIGINT, Price DECIMAL(10,2), Added DATE);
             INSERT INTO Track VALUES
                (1, 'For Those About To Rock', 343719, 0.99, DATE '2024-01-01'),
                (2, 'Put The Finger On You', 205662, 0.99, NULL);",
        )
        .unwrap();

    let mut config = fixture.config("source.duckdb", DatabaseType::Sqlite, &[("Track", &["TrackId"])]);
    config.target.db_type = DatabaseType::DuckDb;

    let first = run_audit(&config, quiet_options()).unwrap();
    assert_eq!(first.database_changes, 2);

    let second = run_audit(&config, quiet_options()).unwrap();
    assert_eq!(second.database_changes, 0);

    fixture
        .execute_duckdb("source.duckdb", "UPDATE Track SET Price = 1.29 WHERE TrackId = 1")
        .unwrap();
    let third = run_audit(&config, quiet_options()).unwrap();
    assert_eq!(third.database_changes, 1);

    let rows = stored_rows(&config, "Track");
    assert_eq!(rows.last().and_then(|r| r.identity.as_deref()), Some("1"));
    assert!(rows.last().unwrap().dump.as_deref().unwrap().contains("1.29"));
}

#[test]
fn test_audit_command_end_to_end() {
    let mut runner = CliTestRunner::new().unwrap();
    runner
        .fixture()
        .create_sqlite_source("source.sqlite", sample_data::CHINOOK_SUBSET)
        .unwrap();
    let config = runner.fixture().config(
        "source.sqlite",
        DatabaseType::DuckDb,
        &[("Album", &["AlbumId"]), ("Artist", &["ArtistId"])],
    );
    runner.use_config(&config).unwrap();

    runner.expect_success(&["audit", "--no-progress"]);
    runner.expect_success(&["audit", "--no-progress", "--format", "json", "--history", "1"]);

    assert_eq!(records(&config, "Album").len(), 4);
    assert_eq!(records(&config, "Artist").len(), 3);

    let history = crate::common::open_store(&config).unwrap().read_history().unwrap();
    assert_eq!(history.len(), 5);
    assert_eq!(history[0].key, "Table Album");
    assert_eq!(history[0].value, "0");
}

#[test]
fn test_audit_command_with_workers() {
    let mut runner = CliTestRunner::new().unwrap();
    runner
        .fixture()
        .create_sqlite_source("source.sqlite", sample_data::CHINOOK_SUBSET)
        .unwrap();
    let config = runner.fixture().config(
        "source.sqlite",
        DatabaseType::Sqlite,
        &[("Album", &["AlbumId"]), ("Artist", &["ArtistId"])],
    );
    runner.use_config(&config).unwrap();

    runner.expect_success(&["audit", "--no-progress", "--workers", "2"]);
    assert_eq!(records(&config, "Album").len(), 4);
    assert_eq!(records(&config, "Artist").len(), 3);
}

#[test]
fn test_history_only_when_requested() {
    let fixture = TestFixture::new().unwrap();
    fixture.create_sqlite_source("source.sqlite", sample_data::TABLE_T).unwrap();
    let config = fixture.config("source.sqlite", DatabaseType::DuckDb, &[("T", &["id"])]);

    run_audit(&config, quiet_options()).unwrap();
    assert!(crate::common::open_store(&config).unwrap().read_history().unwrap().is_empty());

    let options = RunOptions {
        save_history: true,
        ..RunOptions::default()
    };
    let summary = run_audit(&config, options).unwrap();
    let history = crate::common::open_store(&config).unwrap().read_history().unwrap();

    assert_eq!(history.len(), 4);
    assert!(history
        .iter()
        .all(|h| Some(&h.execution_timestamp) == summary.execution_timestamp.as_ref()));
    assert_eq!(history[2].key, "Rows processed");
    assert_eq!(history[2].value, "2");
}
