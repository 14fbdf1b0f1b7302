//! SQL Export Core Library
//!
//! Contains the catalog model, catalog adapters, and the export engine that
//! turns a SQL Server catalog into replayable per-database DDL scripts.

pub mod adapter;
pub mod domain;
pub mod emitter;
pub mod error;
pub mod export;
pub mod filter;
pub mod object;
pub mod scanner;
pub mod scheduler;
pub mod script;
pub mod sql_gen;

#[cfg(test)]
mod test_support;

pub use adapter::{CatalogAdapter, CatalogSnapshot, MssqlAdapter, SnapshotAdapter};
pub use error::{CoreError, Result};
pub use export::{ExportConfig, ExportOrchestrator};
