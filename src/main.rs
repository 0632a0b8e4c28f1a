//! db-resolver - Main entry point.
//!
//! Resolves a connection for the configured backend, optionally creates and
//! selects the database, runs the given statements as one batch and reports
//! any failure with its full error chain.

use clap::Parser;
use db_resolver::config::Config;
use db_resolver::db::{Connection, ConnectionResolver, close_connection};
use db_resolver::diagnostics::report_error;
use db_resolver::error::{DbError, DbResult};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber for logging.
fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber.with(fmt::layer().json()).init();
    } else {
        subscriber
            .with(fmt::layer().with_target(true).with_thread_ids(false))
            .init();
    }
}

/// Everything that happens while the connection is open.
async fn run(config: &Config, connection: &mut Connection) -> DbResult<()> {
    if config.create_database {
        let database = config
            .database
            .as_deref()
            .ok_or_else(|| DbError::invalid_config("--create-database requires --database"))?;
        connection.create_database(database).await?;
        connection.set_catalog(database).await?;
    }

    if config.statements.is_empty() {
        return Ok(());
    }

    let result = connection.execute_batch(&config.statements).await?;
    info!(
        statements = result.update_counts.len(),
        update_counts = ?result.update_counts,
        "Batch completed"
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse configuration from command line and environment
    let config = Config::parse();

    // Initialize logging
    init_tracing(&config);

    info!(
        backend = %config.backend,
        "Starting db-resolver v{}",
        env!("CARGO_PKG_VERSION")
    );

    let backend = config.backend_config()?;
    let resolver = ConnectionResolver::with_sqlx(config.pool_options()?);

    let mut connection = match resolver.resolve(&backend).await {
        Ok(connection) => connection,
        Err(e) => {
            report_error(&e);
            return Err(e.into());
        }
    };

    let result = run(&config, &mut connection).await;

    close_connection(Some(&mut connection)).await;
    resolver.pools().clear().await;

    // Benign states are filtered by the walker only; the batch report and
    // the exit status still reflect the failure.
    if let Err(e) = result {
        report_error(&e);
        return Err(e.into());
    }
    Ok(())
}
