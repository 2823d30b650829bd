use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the BillIntel crates.
#[derive(Error, Debug)]
pub enum BillingError {
    /// No billing data was supplied, or its structure could not be understood.
    #[error("Invalid input: {0}")]
    Input(String),

    /// The narrative generator (or another external collaborator) failed.
    #[error("Collaborator error: {0}")]
    Collaborator(String),

    /// A file could not be opened or read from disk.
    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A JSON document could not be parsed.
    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// Pass-through for any raw I/O error that does not carry a path.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Catch-all for errors from third-party crates via `anyhow`.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl BillingError {
    /// Shorthand for [`BillingError::Input`].
    pub fn input(msg: impl Into<String>) -> Self {
        Self::Input(msg.into())
    }

    /// Shorthand for [`BillingError::Collaborator`].
    pub fn collaborator(msg: impl Into<String>) -> Self {
        Self::Collaborator(msg.into())
    }

    /// `true` for errors the caller caused by supplying bad data.
    pub fn is_input(&self) -> bool {
        matches!(self, Self::Input(_) | Self::JsonParse(_))
    }
}

/// Convenience alias used throughout the billing crates.
pub type Result<T> = std::result::Result<T, BillingError>;
