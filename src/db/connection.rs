//! Caller-owned connection handle.

use crate::db::driver::BackendConnection;
use crate::db::sqlx_backend::quote_identifier;
use crate::diagnostics::{ErrorChainWalker, report_error};
use crate::error::{DbError, DbResult};
use crate::models::{BackendKind, BatchResult, Capabilities, EXECUTE_FAILED, ErrorNode};
use tracing::{debug, info};

/// A live session resolved for one backend kind.
///
/// `close` is idempotent. Dropping an unclosed connection releases the
/// backend session; pooled sessions go back to their pool.
pub struct Connection {
    kind: BackendKind,
    url: String,
    inner: Option<Box<dyn BackendConnection>>,
}

impl Connection {
    pub fn new(kind: BackendKind, url: impl Into<String>, inner: Box<dyn BackendConnection>) -> Self {
        Self {
            kind,
            url: url.into(),
            inner: Some(inner),
        }
    }

    pub fn kind(&self) -> BackendKind {
        self.kind
    }

    /// The URL this connection was opened with.
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_none()
    }

    fn session(&mut self) -> DbResult<&mut (dyn BackendConnection + 'static)> {
        self.inner.as_deref_mut().ok_or(DbError::ConnectionClosed)
    }

    /// Execute one statement and return the number of affected rows.
    pub async fn execute(&mut self, sql: &str) -> DbResult<u64> {
        self.session()?
            .execute(sql)
            .await
            .map_err(DbError::statement)
    }

    /// Execute statements in order, stopping at the first failure.
    ///
    /// On failure the returned [`DbError::BatchPartialFailure`] holds the
    /// update counts of the statements that ran, with [`EXECUTE_FAILED`] in the
    /// failing statement's slot, plus the error chain.
    pub async fn execute_batch<S: AsRef<str>>(&mut self, statements: &[S]) -> DbResult<BatchResult> {
        let session = self.session()?;
        let mut update_counts = Vec::with_capacity(statements.len());

        for (index, statement) in statements.iter().enumerate() {
            match session.execute(statement.as_ref()).await {
                Ok(rows) => update_counts.push(i64::try_from(rows).unwrap_or(i64::MAX)),
                Err(err) => {
                    debug!(statement = index, "Batch statement failed");
                    update_counts.push(EXECUTE_FAILED);
                    return Err(DbError::BatchPartialFailure {
                        result: BatchResult::new(update_counts, Some(err)),
                    });
                }
            }
        }

        Ok(BatchResult::new(update_counts, None))
    }

    /// Select `catalog` as the current database.
    pub async fn set_catalog(&mut self, catalog: &str) -> DbResult<()> {
        self.session()?
            .set_catalog(catalog)
            .await
            .map_err(DbError::statement)
    }

    pub async fn capabilities(&mut self) -> DbResult<Capabilities> {
        self.session()?
            .capabilities()
            .await
            .map_err(DbError::statement)
    }

    /// Warnings raised by the most recent statement.
    pub async fn warnings(&mut self) -> DbResult<Option<ErrorNode>> {
        self.session()?
            .warnings()
            .await
            .map_err(DbError::statement)
    }

    /// Create `name` if it does not exist, then report any server warnings.
    ///
    /// The embedded backend creates its storage on connect, so this is a no-op
    /// there.
    pub async fn create_database(&mut self, name: &str) -> DbResult<()> {
        if !self.kind.is_mysql_family() {
            debug!(backend = %self.kind, database = %name, "Skipping database creation");
            return Ok(());
        }

        let sql = format!("CREATE DATABASE IF NOT EXISTS {}", quote_identifier(name));
        self.execute(&sql).await?;
        info!(database = %name, "Created database");

        let warnings = self.warnings().await?;
        ErrorChainWalker::default().report_warnings(warnings.as_ref());
        Ok(())
    }

    /// Release the session. Calling this again does nothing.
    pub async fn close(&mut self) -> DbResult<()> {
        let Some(session) = self.inner.take() else {
            return Ok(());
        };
        debug!(backend = %self.kind, "Closing connection");
        session.close().await.map_err(DbError::statement)
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if self.inner.take().is_some() {
            debug!(backend = %self.kind, "Releasing unclosed connection on drop");
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("kind", &self.kind)
            .field("url", &self.url)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Close `connection` if there is one. Never fails.
///
/// Close errors are reported through the diagnostics layer instead of being
/// returned.
pub async fn close_connection(connection: Option<&mut Connection>) {
    info!("Releasing all open resources");
    let Some(connection) = connection else {
        return;
    };
    if let Err(err) = connection.close().await {
        report_error(&err);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fails every statement containing "FAIL".
    struct ScriptedSession {
        closes: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl BackendConnection for ScriptedSession {
        async fn execute(&mut self, sql: &str) -> Result<u64, ErrorNode> {
            if sql.contains("FAIL") {
                return Err(ErrorNode::new("scripted failure").with_sql_state("42000"));
            }
            Ok(1)
        }

        async fn set_catalog(&mut self, _catalog: &str) -> Result<(), ErrorNode> {
            Ok(())
        }

        async fn capabilities(&mut self) -> Result<Capabilities, ErrorNode> {
            Ok(Capabilities::SQLITE)
        }

        async fn close(self: Box<Self>) -> Result<(), ErrorNode> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn connection(kind: BackendKind) -> (Connection, Arc<AtomicUsize>) {
        let closes = Arc::new(AtomicUsize::new(0));
        let session = ScriptedSession {
            closes: Arc::clone(&closes),
        };
        (Connection::new(kind, "test://", Box::new(session)), closes)
    }

    #[tokio::test]
    async fn test_batch_stops_at_first_failure() {
        let (mut conn, _) = connection(BackendKind::Embedded);
        let err = conn
            .execute_batch(&["INSERT 1", "INSERT 2", "FAIL", "INSERT 4"])
            .await
            .unwrap_err();

        let DbError::BatchPartialFailure { result } = err else {
            panic!("expected batch failure");
        };
        assert_eq!(result.update_counts, vec![1, 1, EXECUTE_FAILED]);
        assert_eq!(result.succeeded(), 2);
        assert_eq!(result.error.unwrap().sql_state.as_deref(), Some("42000"));
    }

    #[tokio::test]
    async fn test_batch_success() {
        let (mut conn, _) = connection(BackendKind::Embedded);
        let result = conn.execute_batch(&["A", "B"]).await.unwrap();
        assert_eq!(result.update_counts, vec![1, 1]);
        assert!(result.error.is_none());
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let (mut conn, closes) = connection(BackendKind::MySql);
        conn.close().await.unwrap();
        conn.close().await.unwrap();
        assert!(conn.is_closed());
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_use_after_close() {
        let (mut conn, _) = connection(BackendKind::MySql);
        conn.close().await.unwrap();
        assert!(matches!(
            conn.execute("SELECT 1").await,
            Err(DbError::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn test_close_connection_tolerates_none() {
        close_connection(None).await;

        let (mut conn, closes) = connection(BackendKind::MySql);
        close_connection(Some(&mut conn)).await;
        close_connection(Some(&mut conn)).await;
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_create_database_skipped_for_embedded() {
        let (mut conn, _) = connection(BackendKind::Embedded);
        conn.create_database("FAIL").await.unwrap();
    }

    #[tokio::test]
    async fn test_create_database_on_mysql() {
        let (mut conn, _) = connection(BackendKind::PooledMariaDb);
        conn.create_database("shop").await.unwrap();
    }
}
