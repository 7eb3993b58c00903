//! Point-in-time, possibly partial copies of ledger state.
//!
//! Every snapshot carries a version that the assembler bumps on each refresh
//! in which at least one of its reads succeeded.

use civitas_types::{Address, ProposalId, TokenAmount};
use serde::{Deserialize, Serialize};

use crate::delegation::{DelegationRecord, ProxyRecord};
use crate::error::GovernanceError;
use crate::field::Field;
use crate::proposal::Proposal;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalSnapshot {
    pub id: ProposalId,
    pub proposal: Field<Proposal>,
    pub version: u64,
}

impl ProposalSnapshot {
    pub fn unloaded(id: ProposalId) -> Self {
        Self {
            id,
            proposal: Field::default(),
            version: 0,
        }
    }

    pub fn known(&self) -> Option<&Proposal> {
        self.proposal.known()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub address: Address,
    pub is_citizen: Field<bool>,
    pub token_balance: Field<TokenAmount>,
    /// Allowance granted to the governance contract.
    pub allowance: Field<TokenAmount>,
    pub delegation: Field<DelegationRecord>,
    pub proxy: Field<ProxyRecord>,
    pub version: u64,
}

impl AccountSnapshot {
    pub fn unloaded(address: Address) -> Self {
        Self {
            address,
            is_citizen: Field::default(),
            token_balance: Field::default(),
            allowance: Field::default(),
            delegation: Field::default(),
            proxy: Field::default(),
            version: 0,
        }
    }
}

/// Whether `address` has voted on or vetoed `proposal_id`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteRecord {
    pub proposal_id: ProposalId,
    pub address: Address,
    pub has_voted: Field<bool>,
    pub has_vetoed: Field<bool>,
    pub version: u64,
}

impl VoteRecord {
    pub fn unloaded(proposal_id: ProposalId, address: Address) -> Self {
        Self {
            proposal_id,
            address,
            has_voted: Field::default(),
            has_vetoed: Field::default(),
            version: 0,
        }
    }

    /// Combine the two flag reads. The ledger never sets both; a record
    /// claiming both is contradictory, so both fields become unknown.
    pub fn from_reads(
        proposal_id: ProposalId,
        address: Address,
        has_voted: Field<bool>,
        has_vetoed: Field<bool>,
    ) -> Self {
        let conflicting = matches!(
            (&has_voted, &has_vetoed),
            (Field::Known(true), Field::Known(true))
        );
        let (has_voted, has_vetoed) = if conflicting {
            let reason = GovernanceError::ConflictingVoteRecord.to_string();
            (Field::unknown(reason.clone()), Field::unknown(reason))
        } else {
            (has_voted, has_vetoed)
        };
        Self {
            proposal_id,
            address,
            has_voted,
            has_vetoed,
            version: 0,
        }
    }
}

/// Ledger-wide counters.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrySnapshot {
    pub total_citizens: Field<u64>,
    pub proposal_count: Field<u64>,
    pub version: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflicting_flags_become_unknown() {
        let id = ProposalId::new(1).unwrap();
        let rec = VoteRecord::from_reads(
            id,
            Address::new([1; 20]),
            Field::Known(true),
            Field::Known(true),
        );
        assert!(!rec.has_voted.is_known());
        assert!(!rec.has_vetoed.is_known());
    }

    #[test]
    fn consistent_flags_pass_through() {
        let id = ProposalId::new(1).unwrap();
        let rec = VoteRecord::from_reads(
            id,
            Address::new([1; 20]),
            Field::Known(true),
            Field::unknown("timeout"),
        );
        assert_eq!(rec.has_voted, Field::Known(true));
        assert_eq!(rec.has_vetoed, Field::unknown("timeout"));
    }
}
