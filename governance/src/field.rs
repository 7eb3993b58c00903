//! Per-field read outcomes.
//!
//! Every value read from the ledger is either known or unknown. Unknown
//! never means "false": consumers must treat it as "cannot decide".

use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a field could not be read.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadFailure {
    pub reason: String,
}

impl ReadFailure {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    /// The placeholder for a field no refresh has populated yet.
    pub fn not_loaded() -> Self {
        Self::new("not loaded")
    }
}

impl fmt::Display for ReadFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.reason)
    }
}

/// A single snapshot field.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Field<T> {
    Known(T),
    Unknown(ReadFailure),
}

impl<T> Field<T> {
    pub fn unknown(reason: impl Into<String>) -> Self {
        Self::Unknown(ReadFailure::new(reason))
    }

    pub fn known(&self) -> Option<&T> {
        match self {
            Self::Known(v) => Some(v),
            Self::Unknown(_) => None,
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self, Self::Known(_))
    }

    pub fn failure(&self) -> Option<&ReadFailure> {
        match self {
            Self::Known(_) => None,
            Self::Unknown(f) => Some(f),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Field<U> {
        match self {
            Self::Known(v) => Field::Known(f(v)),
            Self::Unknown(e) => Field::Unknown(e),
        }
    }

    /// Record a read result; the error's text becomes the failure reason.
    pub fn from_result<E: fmt::Display>(result: Result<T, E>) -> Self {
        match result {
            Ok(v) => Self::Known(v),
            Err(e) => Self::unknown(e.to_string()),
        }
    }
}

impl<T> Default for Field<T> {
    fn default() -> Self {
        Self::Unknown(ReadFailure::not_loaded())
    }
}
