use db_resolver::db::{
    ConnectionResolver, PoolCache, SqlxDriver, SqlxPoolFactory, StrategyTable, close_connection,
};
use db_resolver::diagnostics::{BatchOutcomeReporter, Diagnostic, ErrorChainWalker};
use db_resolver::error::DbError;
use db_resolver::models::{BackendConfig, BackendKind, EXECUTE_FAILED};
use std::sync::Arc;
use tempfile::TempDir;

fn sqlx_resolver() -> ConnectionResolver {
    let table = StrategyTable::standard(
        Arc::new(SqlxDriver),
        Arc::new(SqlxPoolFactory::default()),
    );
    ConnectionResolver::new(table, Arc::new(PoolCache::new()))
}

fn embedded_config(dir: &TempDir) -> BackendConfig {
    let path = dir.path().join("coffee.db");
    BackendConfig::new(BackendKind::Embedded, "ignored")
        .with_database(path.to_str().unwrap())
}

#[tokio::test]
async fn test_embedded_creates_database_on_connect() {
    let dir = TempDir::new().unwrap();
    let config = embedded_config(&dir);

    let mut conn = sqlx_resolver().resolve(&config).await.unwrap();
    assert!(dir.path().join("coffee.db").exists());
    assert!(conn.url().ends_with("coffee.db?mode=rwc"));

    let caps = conn.capabilities().await.unwrap();
    assert!(caps.server_version.is_some());
    assert!(caps.forward_only);

    close_connection(Some(&mut conn)).await;
}

#[tokio::test]
async fn test_embedded_catalog_and_create_are_no_ops() {
    let dir = TempDir::new().unwrap();
    let mut conn = sqlx_resolver()
        .resolve(&embedded_config(&dir))
        .await
        .unwrap();

    conn.create_database("COFFEEBREAK").await.unwrap();
    conn.set_catalog("COFFEEBREAK").await.unwrap();
    assert!(conn.warnings().await.unwrap().is_none());

    conn.close().await.unwrap();
}

#[tokio::test]
async fn test_embedded_batch_stops_on_duplicate_table() {
    let dir = TempDir::new().unwrap();
    let mut conn = sqlx_resolver()
        .resolve(&embedded_config(&dir))
        .await
        .unwrap();

    let err = conn
        .execute_batch(&[
            "CREATE TABLE COFFEES (COF_NAME VARCHAR(32) PRIMARY KEY, PRICE NUMERIC(10,2))",
            "INSERT INTO COFFEES VALUES ('Colombian', 7.99)",
            "CREATE TABLE COFFEES (COF_NAME VARCHAR(32))",
            "INSERT INTO COFFEES VALUES ('Espresso', 9.99)",
        ])
        .await
        .unwrap_err();

    let DbError::BatchPartialFailure { result } = &err else {
        panic!("expected batch failure, got {:?}", err);
    };
    assert_eq!(result.update_counts, vec![0, 1, EXECUTE_FAILED]);

    let node = result.error.as_ref().unwrap();
    assert!(node.message.contains("already exists"));

    let report = BatchOutcomeReporter.diagnostics(result);
    assert!(matches!(report[0], Diagnostic::BatchFailure { .. }));
    assert_eq!(report.len(), 4);

    let walked = ErrorChainWalker::default().diagnostics(node);
    assert!(matches!(walked[0], Diagnostic::Error { .. }));

    // Statements after the failure did not run.
    let rows = conn.execute("DELETE FROM COFFEES").await.unwrap();
    assert_eq!(rows, 1);
}

#[tokio::test]
async fn test_embedded_statement_error_after_close() {
    let dir = TempDir::new().unwrap();
    let mut conn = sqlx_resolver()
        .resolve(&embedded_config(&dir))
        .await
        .unwrap();
    conn.close().await.unwrap();

    assert!(matches!(
        conn.execute("SELECT 1").await,
        Err(DbError::ConnectionClosed)
    ));
}

#[tokio::test]
async fn test_embedded_syntax_error_is_statement_error() {
    let dir = TempDir::new().unwrap();
    let mut conn = sqlx_resolver()
        .resolve(&embedded_config(&dir))
        .await
        .unwrap();

    let err = conn.execute("SELEC 1").await.unwrap_err();
    assert!(matches!(err, DbError::Statement { .. }));
    assert!(!err.is_ignorable());

    // SQLite result codes are vendor codes, never SQLSTATEs.
    let node = err.error_node().unwrap();
    assert!(node.sql_state.is_none());
    assert_eq!(node.vendor_code, 1);
}

#[tokio::test]
async fn test_embedded_path_with_url_syntax_is_kept_verbatim() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("shop%41?v2.db");
    let config = BackendConfig::new(BackendKind::Embedded, "")
        .with_database(path.to_str().unwrap());

    let mut conn = sqlx_resolver().resolve(&config).await.unwrap();
    conn.execute("CREATE TABLE T (ID INTEGER)").await.unwrap();
    close_connection(Some(&mut conn)).await;

    assert!(path.exists());
    assert!(!dir.path().join("shopA.db").exists());
    assert!(!dir.path().join("shop%41").exists());
}
