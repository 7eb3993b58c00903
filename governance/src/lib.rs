//! Governance data model and pure decision logic for the Civitas client.
//!
//! - Snapshots of ledger state where every field is known or unknown
//! - The eligibility evaluator that gates actions before submission
//! - Aggregate statistics over a set of proposals
//!
//! Nothing here touches the network or holds mutable shared state.

pub mod action;
pub mod delegation;
pub mod eligibility;
pub mod error;
pub mod field;
pub mod filter;
pub mod params;
pub mod proposal;
pub mod snapshot;
pub mod stats;

pub use action::{Action, ActionKey, ActionKind, ProposalDraft, TargetId};
pub use delegation::{DelegationRecord, ProxyRecord};
pub use eligibility::{CreditNotice, Eligibility, Evaluator};
pub use error::{DenialReason, GovernanceError};
pub use field::{Field, ReadFailure};
pub use filter::ProposalFilter;
pub use params::{GovernanceParams, BPS_DENOMINATOR, PROXY_VALIDITY_SECS};
pub use proposal::{
    BudgetAllocation, Category, Outcome, Proposal, ProposalFields, ProposalStatus,
};
pub use snapshot::{AccountSnapshot, ProposalSnapshot, RegistrySnapshot, VoteRecord};
pub use stats::{execution_outcome, participation_score, AggregateStats};
