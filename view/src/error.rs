use thiserror::Error;

/// Errors reported by a [`LedgerClient`](crate::LedgerClient).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("read failed: {0}")]
    Read(String),

    /// The ledger refused a write. The reason is the ledger's own text.
    #[error("{0}")]
    Rejected(String),

    #[error("transport error: {0}")]
    Transport(String),
}
