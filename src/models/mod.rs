//! Data models for db-resolver.
//!
//! This module re-exports all model types used throughout the crate.

pub mod batch;
pub mod capabilities;
pub mod connection;
pub mod error_node;

// Re-export commonly used types
pub use batch::{BatchResult, EXECUTE_FAILED, SUCCESS_NO_INFO};
pub use capabilities::{Capabilities, CursorHoldability, RowIdLifetime};
pub use connection::{BackendConfig, BackendKind, Credentials};
pub use error_node::{ErrorNode, MAX_CHAIN_DEPTH};
