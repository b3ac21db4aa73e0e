//! Error types for the description sync library.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for description sync operations.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Configuration error (invalid YAML, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Explicit documentation corpus path does not exist
    #[error("Could not find the documentation corpus at {}", path.display())]
    CorpusNotFound { path: PathBuf },

    /// Documentation corpus could not be parsed
    #[error("Documentation corpus error: {0}")]
    Corpus(String),

    /// Type model is inconsistent (unknown type, wrong arity, cycle, ...)
    #[error("Type model error: {0}")]
    Model(String),

    /// Could not open or close the database connection
    #[error("Connection error: {0}")]
    Connection(String),

    /// Could not begin, commit or roll back the transaction
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// A lookup or upsert statement failed
    #[error("SQL execution failed: {message}\n  Statement: {statement}")]
    SqlExecution { statement: String, message: String },

    /// The whole run was aborted and rolled back
    #[error("Description sync failed for {aggregate}")]
    SyncFailed {
        aggregate: String,
        #[source]
        source: Box<SyncError>,
    },

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SyncError {
    /// Create a SqlExecution error for a failed statement
    pub fn sql(statement: impl Into<String>, message: impl ToString) -> Self {
        SyncError::SqlExecution {
            statement: statement.into(),
            message: message.to_string(),
        }
    }

    /// Wrap a failure of a whole run
    pub fn sync_failed(aggregate: impl Into<String>, source: SyncError) -> Self {
        SyncError::SyncFailed {
            aggregate: aggregate.into(),
            source: Box::new(source),
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for description sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;
