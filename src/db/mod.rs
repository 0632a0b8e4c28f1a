//! Database connection layer.
//!
//! This module provides connection resolution:
//! - Driver and pool seams (`driver`)
//! - `sqlx`-backed drivers and pools
//! - Per-kind connection strategies
//! - Lazily created, cached pools
//! - Session dispatch macros for reducing code duplication

pub mod connection;
pub mod driver;
#[macro_use]
pub mod macros;
pub mod pool;
pub mod resolver;
pub mod sqlx_backend;
pub mod strategy;

pub use connection::{Connection, close_connection};
pub use driver::{BackendConnection, Driver, PoolFactory, PoolProvider};
pub use pool::{PoolCache, PoolHandle};
pub use resolver::ConnectionResolver;
pub use sqlx_backend::{SqlxDriver, SqlxPool, SqlxPoolFactory, SqlxSession};
pub use strategy::{
    ConnectStrategy, DirectStrategy, EmbeddedStrategy, PooledStrategy, StrategyTable,
};
