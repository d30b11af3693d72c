//! Common library for the lost & found board
//!
//! This crate provides shared functionality used by the adapters and the
//! API service: the error taxonomy, PostgreSQL connectivity and schema, and
//! the cleanup/timeout rules that keep the backends consistent.

pub mod consistency;
pub mod database;
pub mod error;

pub use consistency::{CleanupPolicy, ConsistencyConfig, with_deadline};
pub use error::{CoreError, CoreResult, ErrorKind};
