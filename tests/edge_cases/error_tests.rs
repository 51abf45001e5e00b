//! Edge case tests for failing runs: nothing half-written, earlier tables kept

use crate::common::{quiet_options, records, run_audit, sample_data, stored_rows, TestFixture};
use rowaudit::config::DatabaseType;
use rowaudit::connection::Connections;
use rowaudit::row::Row;
use rowaudit::store::RowSource;
use rowaudit::{AuditError, Auditor, CancellationToken, RunOptions};
use std::time::Duration;

#[test]
fn test_empty_identity_aborts_before_commit() {
    let fixture = TestFixture::new().unwrap();
    fixture
        .create_sqlite_source(
            "source.sqlite",
            "CREATE TABLE T (id TEXT, name TEXT);
             INSERT INTO T VALUES ('1', 'a'), (NULL, 'b');",
        )
        .unwrap();
    let config = fixture.config("source.sqlite", DatabaseType::DuckDb, &[("T", &["id"])]);

    let err = run_audit(&config, quiet_options()).unwrap_err();
    assert!(matches!(err, AuditError::Config { .. }));
    assert!(err.to_string().contains("Empty primary key for table 'T'"));
    assert!(records(&config, "T").is_empty());
}

#[test]
fn test_missing_key_column_is_config_error() {
    let fixture = TestFixture::new().unwrap();
    fixture.create_sqlite_source("source.sqlite", sample_data::TABLE_T).unwrap();
    let config = fixture.config("source.sqlite", DatabaseType::DuckDb, &[("T", &["TId"])]);

    let err = run_audit(&config, quiet_options()).unwrap_err();
    assert!(err.to_string().contains("Key column 'TId' not found in table 'T'"));
}

#[test]
fn test_missing_table_keeps_earlier_tables() {
    let fixture = TestFixture::new().unwrap();
    fixture
        .create_sqlite_source("source.sqlite", sample_data::CHINOOK_SUBSET)
        .unwrap();
    let config = fixture.config(
        "source.sqlite",
        DatabaseType::DuckDb,
        &[("Artist", &["ArtistId"]), ("Genre", &["GenreId"]), ("Album", &["AlbumId"])],
    );

    let err = run_audit(&config, quiet_options()).unwrap_err();
    assert!(matches!(err, AuditError::Query { .. }));
    assert!(err.to_string().contains("Genre"));

    assert_eq!(records(&config, "Artist").len(), 3);
    assert!(records(&config, "Album").is_empty());
}

#[test]
fn test_failing_insert_rolls_back_whole_table() {
    let fixture = TestFixture::new().unwrap();
    fixture
        .create_sqlite_source(
            "source.sqlite",
            "CREATE TABLE A (id TEXT, v TEXT);
             CREATE TABLE B (id TEXT, v TEXT);
             INSERT INTO A VALUES ('a1', 'x');
             INSERT INTO B VALUES ('ok1', 'x'), ('ok2', 'y'), ('bad', 'z');",
        )
        .unwrap();
    // Audit store whose audit table refuses one identity
    fixture
        .create_sqlite_source(
            "audit.sqlite",
            "CREATE TABLE audit (
                TableName VARCHAR,
                PrimaryKey VARCHAR CHECK (PrimaryKey <> 'bad'),
                RowHash VARCHAR,
                RowDump VARCHAR,
                Modified VARCHAR
             );",
        )
        .unwrap();
    let config = fixture.config(
        "source.sqlite",
        DatabaseType::Sqlite,
        &[("A", &["id"]), ("B", &["id"])],
    );

    let err = run_audit(&config, quiet_options()).unwrap_err();
    assert!(matches!(err, AuditError::Commit { .. }));

    assert_eq!(records(&config, "A").len(), 1);
    assert!(records(&config, "B").is_empty(), "no partial batch for B");
}

/// Row source that cancels a run as soon as a given table is scanned
struct CancellingSource {
    inner: Box<dyn RowSource>,
    cancel_at: &'static str,
    token: CancellationToken,
}

impl RowSource for CancellingSource {
    fn list_tables(&self) -> rowaudit::Result<Vec<String>> {
        self.inner.list_tables()
    }

    fn count_rows(&self, table: &str) -> rowaudit::Result<u64> {
        self.inner.count_rows(table)
    }

    fn for_each_row(
        &self,
        table: &str,
        visit: &mut dyn FnMut(Row) -> rowaudit::Result<()>,
    ) -> rowaudit::Result<u64> {
        if table == self.cancel_at {
            self.token.cancel();
        }
        self.inner.for_each_row(table, visit)
    }

    fn try_clone_source(&self) -> rowaudit::Result<Box<dyn RowSource>> {
        Err(AuditError::config("not shareable"))
    }
}

#[test]
fn test_cancellation_keeps_committed_tables() {
    let fixture = TestFixture::new().unwrap();
    fixture
        .create_sqlite_source("source.sqlite", sample_data::CHINOOK_SUBSET)
        .unwrap();
    let config = fixture.config(
        "source.sqlite",
        DatabaseType::DuckDb,
        &[("Artist", &["ArtistId"]), ("Album", &["AlbumId"])],
    );

    let token = CancellationToken::new();
    {
        let Connections { mut audit, target } = Connections::connect(&config).unwrap();
        let source = CancellingSource {
            inner: target,
            cancel_at: "Album",
            token: token.clone(),
        };

        let auditor = Auditor::new(&config, quiet_options()).with_cancellation(token.clone());
        let err = auditor.run(audit.as_mut(), &source).unwrap_err();
        assert!(matches!(err, AuditError::Cancelled));
    }

    assert!(token.is_cancelled());
    assert_eq!(records(&config, "Artist").len(), 3);
    assert!(records(&config, "Album").is_empty());
}

#[test]
fn test_timeout_aborts_table() {
    let fixture = TestFixture::new().unwrap();
    fixture.create_sqlite_source("source.sqlite", sample_data::TABLE_T).unwrap();
    let config = fixture.config("source.sqlite", DatabaseType::DuckDb, &[("T", &["id"])]);
    let options = RunOptions {
        table_timeout: Some(Duration::ZERO),
        ..RunOptions::default()
    };

    let err = run_audit(&config, options).unwrap_err();
    assert!(matches!(err, AuditError::Timeout { ref table, .. } if table == "T"));
    assert!(records(&config, "T").is_empty());
}

#[test]
fn test_non_finite_float_is_serialization_error() {
    let fixture = TestFixture::new().unwrap();
    fixture
        .create_duckdb_source(
            "source.duckdb",
            "CREATE TABLE M (id INTEGER, reading DOUBLE);
             INSERT INTO M VALUES (1, 1.5), (2, 'NaN'::DOUBLE);",
        )
        .unwrap();
    let mut config = fixture.config("source.duckdb", DatabaseType::Sqlite, &[("M", &["id"])]);
    config.target.db_type = DatabaseType::DuckDb;

    let err = run_audit(&config, quiet_options()).unwrap_err();
    assert!(matches!(err, AuditError::Serialization { .. }));
    let message = err.to_string();
    assert!(message.contains("table 'M'"));
    assert!(message.contains("row '2'"));
    assert!(stored_rows(&config, "M").is_empty());
}

#[test]
fn test_unsupported_column_type_is_serialization_error() {
    let fixture = TestFixture::new().unwrap();
    fixture
        .create_duckdb_source(
            "source.duckdb",
            "CREATE TABLE L (id INTEGER, tags INTEGER[]);
             INSERT INTO L VALUES (1, [1, 2]);",
        )
        .unwrap();
    let mut config = fixture.config("source.duckdb", DatabaseType::Sqlite, &[("L", &["id"])]);
    config.target.db_type = DatabaseType::DuckDb;

    let err = run_audit(&config, quiet_options()).unwrap_err();
    assert!(matches!(err, AuditError::Serialization { .. }));
    assert!(err.to_string().contains("column 'tags'"));
}

#[test]
fn test_missing_source_fails_after_retries() {
    let fixture = TestFixture::new().unwrap();
    let mut config = fixture.config("missing.sqlite", DatabaseType::DuckDb, &[]);
    config.connect_retries = 1;

    let err = run_audit(&config, quiet_options()).unwrap_err();
    assert!(matches!(err, AuditError::Connectivity { .. }));
    assert!(!fixture.path("audit.duckdb").exists());
}

#[test]
fn test_in_memory_sqlite_store_cannot_be_shared_by_workers() {
    let fixture = TestFixture::new().unwrap();
    fixture
        .create_sqlite_source("source.sqlite", sample_data::CHINOOK_SUBSET)
        .unwrap();
    let mut config = fixture.config("source.sqlite", DatabaseType::Sqlite, &[]);
    config.audit.connection_string = ":memory:".to_string();
    let options = RunOptions {
        workers: 2,
        ..RunOptions::default()
    };

    let err = run_audit(&config, options).unwrap_err();
    assert!(matches!(err, AuditError::Config { .. }));
}
