//! Tessera Database — SurrealDB connection management, schema
//! initialization and repository implementations.
//!
//! This crate provides:
//! - Connection management ([`DbManager`], [`DbConfig`])
//! - Schema initialization and migrations ([`run_migrations`])
//! - Implementations of the `tessera-core` repository traits
//! - The SurrealDB-backed audit sink ([`SurrealAuditLog`])
//!
//! All implementations are generic over [`surrealdb::Connection`] so
//! tests can run against the in-memory engine.

mod audit;
mod connection;
mod error;
pub mod repository;
mod schema;

pub use audit::SurrealAuditLog;
pub use connection::{DbConfig, DbManager};
pub use error::DbError;
pub use schema::{run_migrations, schema_v1};
