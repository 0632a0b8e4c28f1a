//! `sqlx`-backed drivers and pools.
//!
//! MySQL and MariaDB both go through `sqlx::mysql` (MariaDB speaks the same
//! protocol); the embedded backend is SQLite.

use crate::config::PoolOptions;
use crate::db::driver::{BackendConnection, Driver, PoolFactory, PoolProvider};
use crate::models::{Capabilities, Credentials, ErrorNode};
use async_trait::async_trait;
use sqlx::Connection as _;
use sqlx::{Executor, Row};
use sqlx::mysql::{MySql, MySqlConnectOptions, MySqlConnection, MySqlPool, MySqlPoolOptions};
use sqlx::pool::PoolConnection;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// A session opened through `sqlx`.
pub enum SqlxSession {
    MySql(MySqlConnection),
    /// Checked out of a pool; dropping it returns it.
    PooledMySql(PoolConnection<MySql>),
    Sqlite(SqliteConnection),
}

/// Mutable view of a session with pooled and direct MySQL unified.
pub enum SessionRef<'a> {
    MySql(&'a mut MySqlConnection),
    Sqlite(&'a mut SqliteConnection),
}

impl SqlxSession {
    pub fn borrow_mut(&mut self) -> SessionRef<'_> {
        match self {
            SqlxSession::MySql(conn) => SessionRef::MySql(conn),
            SqlxSession::PooledMySql(conn) => SessionRef::MySql(&mut **conn),
            SqlxSession::Sqlite(conn) => SessionRef::Sqlite(conn),
        }
    }
}

impl std::fmt::Debug for SqlxSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let variant = match self {
            SqlxSession::MySql(_) => "MySql",
            SqlxSession::PooledMySql(_) => "PooledMySql",
            SqlxSession::Sqlite(_) => "Sqlite",
        };
        f.debug_tuple("SqlxSession").field(&variant).finish()
    }
}

#[async_trait]
impl BackendConnection for SqlxSession {
    async fn execute(&mut self, sql: &str) -> Result<u64, ErrorNode> {
        let rows = dispatch_session!(self.borrow_mut(), {
            MySql(conn) => Executor::execute(&mut *conn, sqlx::raw_sql(sql)).await?.rows_affected(),
            Sqlite(conn) => Executor::execute(&mut *conn, sqlx::raw_sql(sql)).await?.rows_affected(),
        });
        Ok(rows)
    }

    async fn set_catalog(&mut self, catalog: &str) -> Result<(), ErrorNode> {
        match self.borrow_mut() {
            SessionRef::MySql(conn) => {
                let sql = format!("USE {}", quote_identifier(catalog));
                Executor::execute(&mut *conn, sqlx::raw_sql(&sql)).await?;
            }
            SessionRef::Sqlite(_) => {
                debug!(catalog = %catalog, "SQLite has no catalogs, ignoring");
            }
        }
        Ok(())
    }

    async fn capabilities(&mut self) -> Result<Capabilities, ErrorNode> {
        let caps = dispatch_session!(self.borrow_mut(), {
            MySql(conn) => {
                let row = Executor::fetch_one(&mut *conn, "SELECT version()").await?;
                Capabilities::MYSQL.with_server_version(row.try_get::<String, _>(0)?)
            },
            Sqlite(conn) => {
                let row = Executor::fetch_one(&mut *conn, "SELECT sqlite_version()").await?;
                Capabilities::SQLITE.with_server_version(row.try_get::<String, _>(0)?)
            },
        });
        Ok(caps)
    }

    async fn warnings(&mut self) -> Result<Option<ErrorNode>, ErrorNode> {
        let SessionRef::MySql(conn) = self.borrow_mut() else {
            return Ok(None);
        };

        let rows = Executor::fetch_all(&mut *conn, sqlx::raw_sql("SHOW WARNINGS")).await?;
        let mut chain: Option<ErrorNode> = None;
        for row in rows {
            let level: String = row.try_get("Level")?;
            let code: u32 = row.try_get("Code")?;
            let message: String = row.try_get("Message")?;
            let node = ErrorNode::new(format!("{}: {}", level, message))
                .with_vendor_code(i32::try_from(code).unwrap_or(i32::MAX));
            match chain.as_mut() {
                Some(root) => root.push_next(node),
                None => chain = Some(node),
            }
        }
        Ok(chain)
    }

    async fn close(self: Box<Self>) -> Result<(), ErrorNode> {
        match *self {
            SqlxSession::MySql(conn) => conn.close().await?,
            SqlxSession::PooledMySql(conn) => drop(conn),
            SqlxSession::Sqlite(conn) => conn.close().await?,
        }
        Ok(())
    }
}

/// Quote a MySQL identifier with backticks.
pub fn quote_identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

fn no_suitable_driver(url: &str) -> ErrorNode {
    ErrorNode::new(format!("No suitable driver found for {}", url)).with_sql_state("08001")
}

fn is_mysql_family(url: &str) -> bool {
    url.starts_with("mysql://") || url.starts_with("mariadb://")
}

/// Parse a MySQL/MariaDB URL and attach credentials.
fn mysql_options(url: &str, credentials: &Credentials) -> Result<MySqlConnectOptions, ErrorNode> {
    let normalized = match url.strip_prefix("mariadb://") {
        Some(rest) => format!("mysql://{}", rest),
        None => url.to_string(),
    };
    let mut options = MySqlConnectOptions::from_str(&normalized)?.charset("utf8mb4");
    if !credentials.user.is_empty() {
        options = options.username(&credentials.user);
    }
    if !credentials.password.is_empty() {
        options = options.password(&credentials.password);
    }
    Ok(options)
}

/// Direct connections through `sqlx`, selected by URL scheme.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlxDriver;

#[async_trait]
impl Driver for SqlxDriver {
    async fn connect(
        &self,
        url: &str,
        credentials: &Credentials,
    ) -> Result<Box<dyn BackendConnection>, ErrorNode> {
        if url.starts_with("sqlite:") {
            let options = SqliteConnectOptions::from_str(url)?;
            let conn = SqliteConnection::connect_with(&options).await?;
            return Ok(Box::new(SqlxSession::Sqlite(conn)));
        }

        if is_mysql_family(url) {
            let options = mysql_options(url, credentials)?;
            let conn = MySqlConnection::connect_with(&options).await?;
            return Ok(Box::new(SqlxSession::MySql(conn)));
        }

        Err(no_suitable_driver(url))
    }
}

/// A lazily-connecting `MySqlPool`.
#[derive(Debug, Clone)]
pub struct SqlxPool {
    pool: MySqlPool,
}

#[async_trait]
impl PoolProvider for SqlxPool {
    async fn get_connection(&self) -> Result<Box<dyn BackendConnection>, ErrorNode> {
        let conn = self.pool.acquire().await?;
        Ok(Box::new(SqlxSession::PooledMySql(conn)))
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

/// Builds `MySqlPool`s from the configured pool options.
#[derive(Debug, Clone, Default)]
pub struct SqlxPoolFactory {
    options: PoolOptions,
}

impl SqlxPoolFactory {
    pub fn new(options: PoolOptions) -> Self {
        Self { options }
    }
}

#[async_trait]
impl PoolFactory for SqlxPoolFactory {
    async fn new_pool(
        &self,
        url: &str,
        credentials: &Credentials,
    ) -> Result<Arc<dyn PoolProvider>, ErrorNode> {
        if !is_mysql_family(url) {
            return Err(no_suitable_driver(url));
        }

        let opts = &self.options;
        let connect_options = mysql_options(url, credentials)?;
        // Lazy: no connection is opened until the first acquire.
        let pool = MySqlPoolOptions::new()
            .min_connections(opts.min_connections_or_default())
            .max_connections(opts.max_connections_or_default())
            .acquire_timeout(Duration::from_secs(opts.acquire_timeout_or_default()))
            .idle_timeout(Some(Duration::from_secs(opts.idle_timeout_or_default())))
            .test_before_acquire(opts.test_before_acquire_or_default())
            .connect_lazy_with(connect_options);

        debug!(
            url = %url,
            max_connections = opts.max_connections_or_default(),
            "Created connection pool"
        );
        Ok(Arc::new(SqlxPool { pool }))
    }
}
