//! Integration tests for the list-tables command

use crate::common::{sample_data, CliTestRunner, TestFixture};
use rowaudit::auditor::tables_to_audit;
use rowaudit::config::DatabaseType;
use rowaudit::connection::open_source;
use rowaudit::AuditError;

#[test]
fn test_catalog_tables_sorted_by_name() {
    let fixture = TestFixture::new().unwrap();
    fixture
        .create_sqlite_source("source.sqlite", sample_data::CHINOOK_SUBSET)
        .unwrap();
    let config = fixture.config("source.sqlite", DatabaseType::DuckDb, &[]);

    let source = open_source(&config.target, 0).unwrap();
    assert_eq!(
        tables_to_audit(&config, source.as_ref()).unwrap(),
        vec!["Album", "Artist"]
    );
}

#[test]
fn test_allow_list_keeps_configuration_order() {
    let fixture = TestFixture::new().unwrap();
    fixture
        .create_sqlite_source("source.sqlite", sample_data::CHINOOK_SUBSET)
        .unwrap();
    let config = fixture.config(
        "source.sqlite",
        DatabaseType::DuckDb,
        &[("Artist", &["ArtistId"]), ("Album", &["AlbumId"])],
    );

    let source = open_source(&config.target, 0).unwrap();
    assert_eq!(
        tables_to_audit(&config, source.as_ref()).unwrap(),
        vec!["Artist", "Album"]
    );
}

#[test]
fn test_list_tables_command() {
    let mut runner = CliTestRunner::new().unwrap();
    runner
        .fixture()
        .create_sqlite_source("source.sqlite", sample_data::CHINOOK_SUBSET)
        .unwrap();
    let config = runner.fixture().config("source.sqlite", DatabaseType::DuckDb, &[]);
    runner.use_config(&config).unwrap();

    runner.expect_success(&["list-tables"]);
    runner.expect_success(&["list-tables", "--format", "json"]);

    // Listing never touches the audit store
    assert!(!runner.fixture().path("audit.duckdb").exists());
}

#[test]
fn test_list_tables_missing_source() {
    let mut runner = CliTestRunner::new().unwrap();
    let config = runner.fixture().config("missing.sqlite", DatabaseType::DuckDb, &[]);
    runner.use_config(&config).unwrap();

    let err = runner.expect_failure(&["list-tables"]);
    assert!(matches!(err, AuditError::Connectivity { .. }));
}
