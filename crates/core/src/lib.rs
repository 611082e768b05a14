//! Core types and shared functionality for quire.
//!
//! This crate provides:
//! - Parser registry with SQLite backend
//! - Domain resolution for matching page URLs to parser records
//! - Unified error types
//! - Configuration structures

pub mod config;
pub mod error;
pub mod registry;
pub mod resolver;

pub use config::AppConfig;
pub use error::Error;
pub use registry::{CustomParserRecord, ParserRecord, RegistryDb, UpsertOutcome};
pub use resolver::{DomainResolver, ResolvedParser};
