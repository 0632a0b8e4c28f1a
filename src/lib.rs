//! db-resolver Library
//!
//! This library resolves connections to MySQL, MariaDB (direct or pooled) and
//! embedded SQLite backends behind one abstraction, and classifies and reports
//! the error chains those backends return.

pub mod config;
pub mod db;
pub mod diagnostics;
pub mod error;
pub mod models;

pub use config::Config;
pub use db::ConnectionResolver;
pub use error::DbError;
