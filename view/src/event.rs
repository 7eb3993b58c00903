//! Change notifications for presentation layers.

use crate::store::EntityKey;

/// Emitted by the assembler after each applied read.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ViewEvent {
    /// At least one field of the entity was read successfully.
    Refreshed { key: EntityKey, version: u64 },
    /// Every read for the entity failed; its fields are now unknown.
    ReadFailed { key: EntityKey, reason: String },
}

impl ViewEvent {
    pub fn key(&self) -> EntityKey {
        match self {
            Self::Refreshed { key, .. } | Self::ReadFailed { key, .. } => *key,
        }
    }
}
