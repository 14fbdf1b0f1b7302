//! Core error types for the export engine

use thiserror::Error;

use crate::domain::CollectionKind;

/// Core error type for all operations
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Catalog error: {0}")]
    Catalog(#[from] tiberius::error::Error),

    #[error("Pool error: {message} (while {context})")]
    Pool { message: String, context: String },

    #[error("Schema introspection failed: {0}")]
    IntrospectionFailed(String),

    #[error("Could not render {identity}: {cause}")]
    Render { identity: String, cause: String },

    #[error("Could not scan {kind}: {cause}")]
    Scan { kind: CollectionKind, cause: String },

    #[error("Could not export database {database}: {cause}")]
    DatabaseExport { database: String, cause: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid snapshot: {0}")]
    Snapshot(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Export cancelled")]
    Cancelled,
}

impl CoreError {
    /// Create a Pool error with context about where it occurred
    pub fn pool(message: impl std::fmt::Display, context: impl Into<String>) -> Self {
        CoreError::Pool {
            message: message.to_string(),
            context: context.into(),
        }
    }

    /// Create a Render error for the object with the given identity
    pub fn render(identity: impl Into<String>, cause: impl Into<String>) -> Self {
        CoreError::Render {
            identity: identity.into(),
            cause: cause.into(),
        }
    }

    pub fn scan(kind: CollectionKind, cause: impl std::fmt::Display) -> Self {
        CoreError::Scan {
            kind,
            cause: cause.to_string(),
        }
    }

    pub fn database(database: impl Into<String>, cause: impl std::fmt::Display) -> Self {
        CoreError::DatabaseExport {
            database: database.into(),
            cause: cause.to_string(),
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\n\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }

    /// Process exit code for a failure that stopped the whole run
    pub fn exit_code(&self) -> u8 {
        match self {
            CoreError::Config(_) | CoreError::Snapshot(_) => 2,
            CoreError::Catalog(_) | CoreError::Pool { .. } | CoreError::IntrospectionFailed(_) => 3,
            CoreError::Cancelled => 130,
            _ => 1,
        }
    }
}

/// Result type alias using CoreError
pub type Result<T> = std::result::Result<T, CoreError>;
