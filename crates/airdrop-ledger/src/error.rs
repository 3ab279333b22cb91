//! Ledger persistence errors.

use std::path::PathBuf;

use airdrop_core::ValidationError;

/// Errors from reading or writing the ledger and its in-flight journal.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// Filesystem operation failed.
    #[error("ledger I/O error during {operation} on {}: {source}", .path.display())]
    Io {
        operation: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },

    /// A record could not be encoded.
    #[error("invalid ledger record: {0}")]
    Validation(#[from] ValidationError),

    /// A journal line could not be decoded.
    #[error("corrupt in-flight journal {} at line {line}: {source}", .path.display())]
    Journal {
        path: PathBuf,
        line: usize,
        source: serde_json::Error,
    },

    /// A journal record could not be encoded.
    #[error("failed to encode in-flight journal record: {0}")]
    JournalEncode(serde_json::Error),
}

impl LedgerError {
    pub(crate) fn io(operation: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }
}
