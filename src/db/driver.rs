//! Driver-layer seams.
//!
//! The resolver never talks to a database client directly. It goes through
//! these traits, which the `sqlx` backend implements for production use and
//! tests implement with in-process fakes.

use crate::models::{Capabilities, Credentials, ErrorNode};
use async_trait::async_trait;
use std::sync::Arc;

/// A live backend session.
#[async_trait]
pub trait BackendConnection: Send {
    /// Execute one statement and return the number of affected rows.
    async fn execute(&mut self, sql: &str) -> Result<u64, ErrorNode>;

    /// Select `catalog` as the session's current database.
    async fn set_catalog(&mut self, catalog: &str) -> Result<(), ErrorNode>;

    /// Advisory capability flags for this session's backend.
    async fn capabilities(&mut self) -> Result<Capabilities, ErrorNode>;

    /// Warnings raised by the most recent statement, as a sibling chain.
    async fn warnings(&mut self) -> Result<Option<ErrorNode>, ErrorNode> {
        Ok(None)
    }

    /// Release the session. Pooled sessions go back to their pool.
    async fn close(self: Box<Self>) -> Result<(), ErrorNode>;
}

/// Opens direct (unpooled) sessions from a connection URL.
#[async_trait]
pub trait Driver: Send + Sync {
    async fn connect(
        &self,
        url: &str,
        credentials: &Credentials,
    ) -> Result<Box<dyn BackendConnection>, ErrorNode>;
}

/// A pool of sessions for one backend.
#[async_trait]
pub trait PoolProvider: Send + Sync {
    async fn get_connection(&self) -> Result<Box<dyn BackendConnection>, ErrorNode>;

    async fn close(&self) {}
}

/// Builds pool providers.
#[async_trait]
pub trait PoolFactory: Send + Sync {
    async fn new_pool(
        &self,
        url: &str,
        credentials: &Credentials,
    ) -> Result<Arc<dyn PoolProvider>, ErrorNode>;
}
