//! Governance proposals as the ledger reports them.

use civitas_types::{Address, ProposalId, Timestamp, TokenAmount};
use serde::{Deserialize, Serialize};

use crate::error::GovernanceError;

/// What a proposal is about. The ledger stores the index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    /// Moves treasury funds to a target on execution.
    Budget,
    Policy,
    Infrastructure,
    Other,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Budget,
        Category::Policy,
        Category::Infrastructure,
        Category::Other,
    ];

    pub fn from_index(index: u8) -> Option<Self> {
        Self::ALL.get(index as usize).copied()
    }

    pub fn index(&self) -> u8 {
        match self {
            Self::Budget => 0,
            Self::Policy => 1,
            Self::Infrastructure => 2,
            Self::Other => 3,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Budget => "Budget",
            Self::Policy => "Policy",
            Self::Infrastructure => "Infrastructure",
            Self::Other => "Other",
        }
    }
}

/// The raw tuple returned by the ledger's `getProposal`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalFields {
    pub description: String,
    pub category: u8,
    pub end_time: Timestamp,
    pub target_address: Address,
    pub allocated_amount: TokenAmount,
    pub total_yes_credits: u64,
    pub total_no_credits: u64,
    pub veto_votes: u64,
    pub executed: bool,
    pub paused: bool,
}

/// Funds a budget proposal moves when executed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetAllocation {
    pub target: Address,
    pub amount: TokenAmount,
}

/// Lifecycle position of a proposal at a given instant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProposalStatus {
    Active,
    /// Voting closed, not yet executed.
    Ended,
    Executed,
    /// Veto threshold crossed; terminal.
    Paused,
}

/// Result of an executed proposal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Passed,
    Failed,
}

/// A validated proposal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    pub id: ProposalId,
    pub description: String,
    pub category: Category,
    pub end_time: Timestamp,
    /// Present only for [`Category::Budget`].
    pub budget: Option<BudgetAllocation>,
    pub total_yes_credits: u64,
    pub total_no_credits: u64,
    pub veto_votes: u64,
    pub executed: bool,
    pub paused: bool,
}

impl Proposal {
    /// Validate ledger fields. Executed and paused are mutually exclusive
    /// terminal states; a record claiming both is rejected.
    pub fn from_fields(id: ProposalId, fields: ProposalFields) -> Result<Self, GovernanceError> {
        let category =
            Category::from_index(fields.category).ok_or(GovernanceError::InvalidCategory {
                id,
                index: fields.category,
            })?;
        if fields.executed && fields.paused {
            return Err(GovernanceError::ConflictingTerminalState(id));
        }
        let budget = (category == Category::Budget).then_some(BudgetAllocation {
            target: fields.target_address,
            amount: fields.allocated_amount,
        });
        Ok(Self {
            id,
            description: fields.description,
            category,
            end_time: fields.end_time,
            budget,
            total_yes_credits: fields.total_yes_credits,
            total_no_credits: fields.total_no_credits,
            veto_votes: fields.veto_votes,
            executed: fields.executed,
            paused: fields.paused,
        })
    }

    pub fn has_ended(&self, now: Timestamp) -> bool {
        now >= self.end_time
    }

    pub fn is_active(&self, now: Timestamp) -> bool {
        !self.executed && !self.paused && !self.has_ended(now)
    }

    pub fn status(&self, now: Timestamp) -> ProposalStatus {
        if self.executed {
            ProposalStatus::Executed
        } else if self.paused {
            ProposalStatus::Paused
        } else if self.has_ended(now) {
            ProposalStatus::Ended
        } else {
            ProposalStatus::Active
        }
    }

    /// Whether anyone has cast credits either way.
    pub fn has_participation(&self) -> bool {
        self.total_yes_credits > 0 || self.total_no_credits > 0
    }

    /// Defined only once executed.
    pub fn outcome(&self) -> Option<Outcome> {
        if !self.executed {
            return None;
        }
        if self.total_yes_credits > self.total_no_credits {
            Some(Outcome::Passed)
        } else {
            Some(Outcome::Failed)
        }
    }

    /// Share of yes credits, rounded to a whole percent. Zero with no votes.
    pub fn yes_percentage(&self) -> u8 {
        let total = self.total_yes_credits as u128 + self.total_no_credits as u128;
        if total == 0 {
            return 0;
        }
        ((self.total_yes_credits as u128 * 200 + total) / (total * 2)) as u8
    }

    /// Seconds left to vote, `None` once the period has ended.
    pub fn time_remaining(&self, now: Timestamp) -> Option<u64> {
        (!self.has_ended(now)).then(|| self.end_time.remaining_from(now))
    }
}
