//! Tessera Core — domain models, repository trait contracts and the
//! error taxonomy shared by every other crate.
//!
//! This crate has no I/O dependencies: services in `tessera-auth` are
//! generic over the repository traits defined here, and `tessera-db`
//! provides the SurrealDB implementations.

pub mod error;
pub mod models;
pub mod repository;

pub use error::{TesseraError, TesseraResult};
