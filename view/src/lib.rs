//! Client-side view of the governance ledger.
//!
//! [`ViewAssembler`] owns every snapshot. It issues reads through a
//! [`LedgerClient`], records each result per field, and hands out owned
//! copies. Callers never mutate snapshots; they ask for a refresh.

pub mod assembler;
pub mod client;
pub mod error;
pub mod event;
pub mod store;

pub use assembler::{RefreshReport, ViewAssembler, MAX_LOADED_PROPOSALS};
pub use client::{Finality, LedgerClient};
pub use error::LedgerError;
pub use event::ViewEvent;
pub use store::{EntityKey, Order, SnapshotStore};
