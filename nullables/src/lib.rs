//! Nullable infrastructure for deterministic testing.
//!
//! External dependencies (clock, ledger) are abstracted behind traits. This
//! crate provides test-friendly implementations that:
//! - Return deterministic values
//! - Can be controlled programmatically (time, read failures, finality)
//! - Never touch the network
//!
//! Usage: swap real implementations for nullables in tests.

pub mod clock;
pub mod ledger;

pub use clock::NullClock;
pub use ledger::{NullLedger, ReadOp, Submission, WriteCall};
