//! State-changing actions a user can request.

use civitas_types::{Address, ProposalId, TokenAmount};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::proposal::Category;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    Vote,
    Veto,
    Execute,
    CreateProposal,
    RegisterCitizen,
    Approve,
    Delegate,
    RevokeDelegation,
    AssignProxy,
}

impl ActionKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Vote => "vote",
            Self::Veto => "veto",
            Self::Execute => "execute",
            Self::CreateProposal => "create_proposal",
            Self::RegisterCitizen => "register_citizen",
            Self::Approve => "approve",
            Self::Delegate => "delegate",
            Self::RevokeDelegation => "revoke_delegation",
            Self::AssignProxy => "assign_proxy",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The entity an action mutates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TargetId {
    Proposal(ProposalId),
    /// The acting account's own record (citizenship, allowance, delegation, proxy).
    Account,
    /// The ledger-wide proposal registry.
    Registry,
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Proposal(id) => write!(f, "proposal {id}"),
            Self::Account => f.write_str("account"),
            Self::Registry => f.write_str("registry"),
        }
    }
}

/// Deduplication key: at most one action per key is in flight.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActionKey {
    pub actor: Address,
    pub kind: ActionKind,
    pub target: TargetId,
}

impl fmt::Display for ActionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} on {}", self.actor, self.kind, self.target)
    }
}

/// Input for a new proposal. Addresses stay as entered until validated.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalDraft {
    pub description: String,
    pub category: Category,
    /// Required for budget proposals, ignored otherwise.
    pub target: Option<String>,
    pub allocated_amount: TokenAmount,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    Vote {
        proposal: ProposalId,
        support: bool,
        credits: u64,
    },
    Veto {
        proposal: ProposalId,
    },
    Execute {
        proposal: ProposalId,
    },
    CreateProposal(ProposalDraft),
    RegisterCitizen,
    Approve {
        amount: TokenAmount,
    },
    Delegate {
        target: String,
    },
    RevokeDelegation,
    AssignProxy {
        target: String,
    },
}

impl Action {
    /// Approve the governance contract for the maximum amount.
    pub fn unlimited_approval() -> Self {
        Self::Approve {
            amount: TokenAmount::MAX,
        }
    }

    pub fn kind(&self) -> ActionKind {
        match self {
            Self::Vote { .. } => ActionKind::Vote,
            Self::Veto { .. } => ActionKind::Veto,
            Self::Execute { .. } => ActionKind::Execute,
            Self::CreateProposal(_) => ActionKind::CreateProposal,
            Self::RegisterCitizen => ActionKind::RegisterCitizen,
            Self::Approve { .. } => ActionKind::Approve,
            Self::Delegate { .. } => ActionKind::Delegate,
            Self::RevokeDelegation => ActionKind::RevokeDelegation,
            Self::AssignProxy { .. } => ActionKind::AssignProxy,
        }
    }

    pub fn proposal_id(&self) -> Option<ProposalId> {
        match self {
            Self::Vote { proposal, .. } | Self::Veto { proposal } | Self::Execute { proposal } => {
                Some(*proposal)
            }
            _ => None,
        }
    }

    pub fn target_id(&self) -> TargetId {
        match (self.proposal_id(), self) {
            (Some(id), _) => TargetId::Proposal(id),
            (None, Self::CreateProposal(_)) => TargetId::Registry,
            (None, _) => TargetId::Account,
        }
    }

    pub fn key(&self, actor: Address) -> ActionKey {
        ActionKey {
            actor,
            kind: self.kind(),
            target: self.target_id(),
        }
    }
}
