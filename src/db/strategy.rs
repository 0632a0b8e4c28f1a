//! Connection strategies, one per backend kind.
//!
//! A strategy knows how to turn a [`BackendConfig`] into a URL and a live
//! session. The resolver looks strategies up in a [`StrategyTable`], so adding
//! a backend means registering one more entry.

use crate::db::driver::{BackendConnection, Driver, PoolFactory};
use crate::db::pool::PoolCache;
use crate::models::{BackendConfig, BackendKind, ErrorNode};
use async_trait::async_trait;
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// How one backend kind is connected.
#[async_trait]
pub trait ConnectStrategy: Send + Sync {
    /// The connection URL for `config`. Never contains credentials.
    fn connection_url(&self, config: &BackendConfig) -> String;

    /// Open a session at `url`.
    async fn open(
        &self,
        url: &str,
        config: &BackendConfig,
        pools: &PoolCache,
    ) -> Result<Box<dyn BackendConnection>, ErrorNode>;
}

/// Characters the SQLite URL parser treats as syntax inside a path.
const SQLITE_PATH: &AsciiSet = &CONTROLS.add(b'%').add(b'?').add(b'#');

fn server_url(config: &BackendConfig) -> String {
    // IPv6 literals need brackets to keep the port separator unambiguous.
    let host = if config.host.contains(':') && !config.host.starts_with('[') {
        format!("[{}]", config.host)
    } else {
        config.host.clone()
    };
    format!("{}://{}:{}/", config.kind.url_scheme(), host, config.port)
}

/// Unpooled connections straight from the driver.
pub struct DirectStrategy {
    driver: Arc<dyn Driver>,
}

impl DirectStrategy {
    pub fn new(driver: Arc<dyn Driver>) -> Self {
        Self { driver }
    }
}

#[async_trait]
impl ConnectStrategy for DirectStrategy {
    fn connection_url(&self, config: &BackendConfig) -> String {
        server_url(config)
    }

    async fn open(
        &self,
        url: &str,
        config: &BackendConfig,
        _pools: &PoolCache,
    ) -> Result<Box<dyn BackendConnection>, ErrorNode> {
        let mut session = self.driver.connect(url, &config.credentials).await?;

        let catalog = config.database.as_deref().filter(|_| config.bind_catalog);
        if let Some(catalog) = catalog {
            debug!(catalog = %catalog, "Binding database as catalog");
            if let Err(err) = session.set_catalog(catalog).await {
                // The bind failure is what the caller needs to see.
                let _ = session.close().await;
                return Err(err);
            }
        }

        Ok(session)
    }
}

/// Sessions checked out of a cached pool.
pub struct PooledStrategy {
    factory: Arc<dyn PoolFactory>,
}

impl PooledStrategy {
    pub fn new(factory: Arc<dyn PoolFactory>) -> Self {
        Self { factory }
    }
}

#[async_trait]
impl ConnectStrategy for PooledStrategy {
    fn connection_url(&self, config: &BackendConfig) -> String {
        server_url(config)
    }

    async fn open(
        &self,
        url: &str,
        config: &BackendConfig,
        pools: &PoolCache,
    ) -> Result<Box<dyn BackendConnection>, ErrorNode> {
        let handle = pools
            .get_or_create(config.kind, url, || {
                self.factory.new_pool(url, &config.credentials)
            })
            .await?;
        handle.get_connection().await
    }
}

/// Embedded SQLite database, created on first connect.
pub struct EmbeddedStrategy {
    driver: Arc<dyn Driver>,
}

impl EmbeddedStrategy {
    pub fn new(driver: Arc<dyn Driver>) -> Self {
        Self { driver }
    }
}

#[async_trait]
impl ConnectStrategy for EmbeddedStrategy {
    fn connection_url(&self, config: &BackendConfig) -> String {
        // mode=rwc creates the database file if it is absent
        let path = config.database.as_deref().unwrap_or_default();
        format!("sqlite:{}?mode=rwc", utf8_percent_encode(path, SQLITE_PATH))
    }

    async fn open(
        &self,
        url: &str,
        config: &BackendConfig,
        _pools: &PoolCache,
    ) -> Result<Box<dyn BackendConnection>, ErrorNode> {
        self.driver.connect(url, &config.credentials).await
    }
}

/// Backend kind to strategy.
#[derive(Default)]
pub struct StrategyTable {
    strategies: HashMap<BackendKind, Arc<dyn ConnectStrategy>>,
}

impl StrategyTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// The full table: direct and pooled MySQL/MariaDB plus embedded SQLite.
    pub fn standard(driver: Arc<dyn Driver>, factory: Arc<dyn PoolFactory>) -> Self {
        let direct: Arc<dyn ConnectStrategy> = Arc::new(DirectStrategy::new(Arc::clone(&driver)));
        let pooled: Arc<dyn ConnectStrategy> = Arc::new(PooledStrategy::new(factory));

        Self::new()
            .register(BackendKind::MySql, Arc::clone(&direct))
            .register(BackendKind::MariaDb, direct)
            .register(BackendKind::PooledMySql, Arc::clone(&pooled))
            .register(BackendKind::PooledMariaDb, pooled)
            .register(BackendKind::Embedded, Arc::new(EmbeddedStrategy::new(driver)))
    }

    pub fn register(mut self, kind: BackendKind, strategy: Arc<dyn ConnectStrategy>) -> Self {
        self.strategies.insert(kind, strategy);
        self
    }

    pub fn get(&self, kind: BackendKind) -> Option<&Arc<dyn ConnectStrategy>> {
        self.strategies.get(&kind)
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}

impl std::fmt::Debug for StrategyTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Vec<_> = self.strategies.keys().map(BackendKind::identifier).collect();
        kinds.sort_unstable();
        f.debug_struct("StrategyTable").field("kinds", &kinds).finish()
    }
}
