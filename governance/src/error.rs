use thiserror::Error;

use civitas_types::ProposalId;

/// Why an action was refused before submission.
///
/// Variants are listed in the order the evaluator checks them; the message
/// text mirrors the ledger's own rejection wording.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DenialReason {
    #[error("not a citizen")]
    NotCitizen,

    #[error("voting period ended")]
    VotingEnded,

    #[error("proposal paused")]
    Paused,

    #[error("already executed")]
    AlreadyExecuted,

    #[error("already vetoed")]
    AlreadyVetoed,

    #[error("already voted")]
    AlreadyVoted,

    #[error("vote credits must be positive")]
    InvalidCredits,

    #[error("voting period still active")]
    VotingActive,

    #[error("cannot target self")]
    SelfTarget,

    #[error("invalid address")]
    InvalidAddress,

    #[error("already a citizen")]
    AlreadyCitizen,

    #[error("description required")]
    EmptyDescription,

    #[error("invalid budget target")]
    InvalidBudgetTarget,

    #[error("invalid allocated amount")]
    InvalidAllocation,

    #[error("state unavailable, retry")]
    StateUnavailable,
}

/// Ledger data that cannot be turned into a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GovernanceError {
    #[error("proposal {id}: unknown category index {index}")]
    InvalidCategory { id: ProposalId, index: u8 },

    #[error("proposal {0} reports both executed and paused")]
    ConflictingTerminalState(ProposalId),

    #[error("vote record reports both voted and vetoed")]
    ConflictingVoteRecord,
}
