//! Error taxonomy for backup/restore orchestration.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Missing or ambiguous connection/auth data. Fatal, never retried.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Invalid combination of time filter, mode and collection count.
    /// Reported before any I/O happens.
    #[error("invalid selection: {0}")]
    Selection(String),

    /// Live catalog enumeration failed. Recovered in place by downgrading
    /// the selection to a full backup.
    #[error("catalog fetch failed: {0}")]
    CatalogFetch(String),

    /// External tool exited non-zero, or the process/session died. Fatal,
    /// triggers cleanup of any partially written archive.
    #[error("execution failed: {0}")]
    Execution(String),

    /// Missing or corrupt sidecar metadata. Fatal on restore.
    #[error("metadata error: {0}")]
    Metadata(String),
}

pub type Result<T> = std::result::Result<T, Error>;
