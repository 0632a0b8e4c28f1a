//! Turning a backend configuration into a live connection.

use crate::config::PoolOptions;
use crate::db::connection::Connection;
use crate::db::pool::PoolCache;
use crate::db::sqlx_backend::{SqlxDriver, SqlxPoolFactory};
use crate::db::strategy::StrategyTable;
use crate::error::{DbError, DbResult};
use crate::models::{BackendConfig, Capabilities};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Resolves [`BackendConfig`]s through a table of connection strategies.
#[derive(Debug)]
pub struct ConnectionResolver {
    strategies: StrategyTable,
    pools: Arc<PoolCache>,
}

impl ConnectionResolver {
    pub fn new(strategies: StrategyTable, pools: Arc<PoolCache>) -> Self {
        Self { strategies, pools }
    }

    /// Resolver backed by `sqlx` and the process-wide pool cache.
    pub fn with_sqlx(pool_options: PoolOptions) -> Self {
        let strategies = StrategyTable::standard(
            Arc::new(SqlxDriver),
            Arc::new(SqlxPoolFactory::new(pool_options)),
        );
        Self::new(strategies, PoolCache::shared())
    }

    pub fn pools(&self) -> &Arc<PoolCache> {
        &self.pools
    }

    /// Open a connection for `config`.
    ///
    /// Kinds without a registered strategy fail before any driver or pool is
    /// touched. Capability probing after connect is best effort.
    pub async fn resolve(&self, config: &BackendConfig) -> DbResult<Connection> {
        let kind = config.kind;
        let strategy = self
            .strategies
            .get(kind)
            .ok_or_else(|| DbError::unsupported_backend(kind.identifier()))?;
        config.validate()?;

        let url = strategy.connection_url(config);
        info!(
            backend = %kind,
            url = %url,
            user = %config.credentials.user,
            "Connecting to backend"
        );

        let session = strategy
            .open(&url, config, &self.pools)
            .await
            .map_err(|cause| DbError::backend_rejected(kind, cause))?;

        let mut connection = Connection::new(kind, url, session);
        info!(backend = %kind, "Connected to database");

        match connection.capabilities().await {
            Ok(caps) => log_capabilities(&caps),
            Err(err) => warn!(backend = %kind, error = %err, "Could not query backend capabilities"),
        }

        Ok(connection)
    }
}

fn log_capabilities(caps: &Capabilities) {
    debug!(
        forward_only = caps.forward_only,
        scroll_insensitive = caps.scroll_insensitive,
        scroll_sensitive = caps.scroll_sensitive,
        scroll_insensitive_read_only = caps.scroll_insensitive_read_only,
        scroll_insensitive_updatable = caps.scroll_insensitive_updatable,
        hold_over_commit = caps.supports_hold_over_commit,
        close_at_commit = caps.supports_close_at_commit,
        "Result set support"
    );
    info!(
        default_holdability = ?caps.default_holdability,
        row_id_lifetime = caps.row_id_lifetime.description(),
        server_version = caps.server_version.as_deref().unwrap_or("unknown"),
        "Backend capabilities"
    );
}
