//! SQLite-backed parser registry.
//!
//! This module provides persistent storage for extraction script records
//! with async access via tokio-rusqlite. It supports:
//!
//! - Shared records keyed by script id, with a domain lookup table
//! - Per-user override records keyed by (owner, hostname)
//! - Automatic schema migrations
//! - WAL mode for concurrent access
//! - Transactional bulk upsert and full replacement

pub mod connection;
pub mod custom;
pub mod manifest;
pub mod migrations;
pub mod records;

pub use crate::Error;

pub use connection::RegistryDb;
pub use custom::CustomParserRecord;
pub use manifest::DomainManifest;
pub use records::{ParserRecord, UpsertOutcome};
