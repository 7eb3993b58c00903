//! Fundamental types for the Civitas governance client.
//!
//! Shared by every crate in the workspace: identities, timestamps, token
//! amounts, proposal ids, and transaction references.

pub mod address;
pub mod amount;
pub mod error;
pub mod hash;
pub mod id;
pub mod time;

pub use address::Address;
pub use amount::TokenAmount;
pub use error::TypesError;
pub use hash::TxRef;
pub use id::ProposalId;
pub use time::{Clock, SystemClock, Timestamp};
