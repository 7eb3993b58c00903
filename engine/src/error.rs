use civitas_governance::{ActionKey, DenialReason};
use thiserror::Error;

/// Why an action did not reach the ledger, or was refused by it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    /// Another action with the same key is still in flight.
    #[error("action already in progress: {key}")]
    Concurrent { key: ActionKey },

    #[error("{0}")]
    Denied(#[from] DenialReason),

    /// Cancelled before anything was submitted.
    #[error("action cancelled before submission: {key}")]
    Cancelled { key: ActionKey },

    /// Refused at submission or reverted at finality. `reason` is the
    /// ledger's own text.
    #[error("{reason}")]
    Submission { reason: String },
}

impl ActionError {
    /// True if nothing was sent to the ledger.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            Self::Concurrent { .. } | Self::Denied(_) | Self::Cancelled { .. }
        )
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config error: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}
