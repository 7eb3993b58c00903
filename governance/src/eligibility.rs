//! Pre-submission eligibility checks.
//!
//! [`Evaluator::evaluate`] is pure: given the latest snapshots and the
//! current time it predicts whether the ledger would accept an action.
//! Rules run in the ledger's own rejection order and the first failing rule
//! wins. A rule whose input is unknown denies with
//! [`DenialReason::StateUnavailable`] instead of guessing.

use civitas_types::{Address, ProposalId, Timestamp};
use serde::{Deserialize, Serialize};

use crate::action::{Action, ProposalDraft};
use crate::error::DenialReason;
use crate::field::Field;
use crate::params::{GovernanceParams, BPS_DENOMINATOR};
use crate::proposal::{Category, Proposal};
use crate::snapshot::{AccountSnapshot, ProposalSnapshot, VoteRecord};

/// Advisory information shown before a vote. The ledger applies the real
/// cap and burn; amounts above the cap are not rejected here.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditNotice {
    pub requested: u64,
    /// Requested credits limited to the cap.
    pub effective: u64,
    pub burned: u64,
    pub capped: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Eligibility {
    Allowed { notice: Option<CreditNotice> },
    Denied(DenialReason),
}

impl Eligibility {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed { .. })
    }

    pub fn denial(&self) -> Option<&DenialReason> {
        match self {
            Self::Allowed { .. } => None,
            Self::Denied(reason) => Some(reason),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct Evaluator {
    params: GovernanceParams,
}

impl Evaluator {
    pub fn new(params: GovernanceParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &GovernanceParams {
        &self.params
    }

    /// Decide whether `account` may perform `action` at `now`.
    ///
    /// `proposal` and `vote` are the snapshots for the action's proposal, if
    /// it names one; a missing snapshot counts as unknown state.
    pub fn evaluate(
        &self,
        proposal: Option<&ProposalSnapshot>,
        vote: Option<&VoteRecord>,
        account: &AccountSnapshot,
        action: &Action,
        now: Timestamp,
    ) -> Eligibility {
        match self.check(proposal, vote, account, action, now) {
            Ok(notice) => Eligibility::Allowed { notice },
            Err(reason) => Eligibility::Denied(reason),
        }
    }

    /// Advisory cap and burn for `credits`.
    ///
    /// `burned` is `credits * vote_burn_bps / 10_000` rounded down, so at
    /// the default 500 bps any vote under 20 credits burns nothing. A rate
    /// above [`BPS_DENOMINATOR`] is treated as a full burn.
    pub fn credit_notice(&self, credits: u64) -> CreditNotice {
        let bps = self.params.vote_burn_bps.min(BPS_DENOMINATOR);
        let burned = (u128::from(credits) * u128::from(bps) / u128::from(BPS_DENOMINATOR)) as u64;
        CreditNotice {
            requested: credits,
            effective: credits.min(self.params.vote_credit_cap),
            burned,
            capped: credits > self.params.vote_credit_cap,
        }
    }

    fn check(
        &self,
        proposal: Option<&ProposalSnapshot>,
        vote: Option<&VoteRecord>,
        account: &AccountSnapshot,
        action: &Action,
        now: Timestamp,
    ) -> Result<Option<CreditNotice>, DenialReason> {
        match action {
            Action::Vote {
                proposal: id,
                credits,
                ..
            } => {
                require_citizen(account)?;
                let p = require_proposal(proposal, *id)?;
                require_open(p, now)?;
                let record = require_vote_record(vote, *id, account.address)?;
                if known(&record.has_vetoed)? {
                    return Err(DenialReason::AlreadyVetoed);
                }
                if known(&record.has_voted)? {
                    return Err(DenialReason::AlreadyVoted);
                }
                if *credits == 0 {
                    return Err(DenialReason::InvalidCredits);
                }
                Ok(Some(self.credit_notice(*credits)))
            }
            Action::Veto { proposal: id } => {
                require_citizen(account)?;
                let p = require_proposal(proposal, *id)?;
                require_open(p, now)?;
                let record = require_vote_record(vote, *id, account.address)?;
                if known(&record.has_voted)? {
                    return Err(DenialReason::AlreadyVoted);
                }
                if known(&record.has_vetoed)? {
                    return Err(DenialReason::AlreadyVetoed);
                }
                Ok(None)
            }
            Action::Execute { proposal: id } => {
                let p = require_proposal(proposal, *id)?;
                if !p.has_ended(now) {
                    return Err(DenialReason::VotingActive);
                }
                require_not_terminal(p)?;
                Ok(None)
            }
            Action::CreateProposal(draft) => {
                require_citizen(account)?;
                check_draft(draft)?;
                Ok(None)
            }
            Action::RegisterCitizen => {
                if known(&account.is_citizen)? {
                    return Err(DenialReason::AlreadyCitizen);
                }
                Ok(None)
            }
            Action::Approve { .. } => Ok(None),
            Action::Delegate { target } | Action::AssignProxy { target } => {
                require_citizen(account)?;
                parse_target(target, account.address)?;
                Ok(None)
            }
            Action::RevokeDelegation => {
                require_citizen(account)?;
                Ok(None)
            }
        }
    }
}

/// Parse a delegate or proxy target entered by the acting account.
pub fn parse_target(raw: &str, actor: Address) -> Result<Address, DenialReason> {
    let target = Address::parse(raw)
        .ok()
        .and_then(Address::non_zero)
        .ok_or(DenialReason::InvalidAddress)?;
    if target == actor {
        return Err(DenialReason::SelfTarget);
    }
    Ok(target)
}

/// Validate a draft and resolve the budget target it should submit.
pub fn check_draft(draft: &ProposalDraft) -> Result<Option<Address>, DenialReason> {
    if draft.description.trim().is_empty() {
        return Err(DenialReason::EmptyDescription);
    }
    if draft.category != Category::Budget {
        return Ok(None);
    }
    let target = draft
        .target
        .as_deref()
        .and_then(|raw| Address::parse(raw).ok())
        .and_then(Address::non_zero)
        .ok_or(DenialReason::InvalidBudgetTarget)?;
    if draft.allocated_amount.is_zero() {
        return Err(DenialReason::InvalidAllocation);
    }
    Ok(Some(target))
}

fn known<T: Copy>(field: &Field<T>) -> Result<T, DenialReason> {
    field.known().copied().ok_or(DenialReason::StateUnavailable)
}

fn require_citizen(account: &AccountSnapshot) -> Result<(), DenialReason> {
    if known(&account.is_citizen)? {
        Ok(())
    } else {
        Err(DenialReason::NotCitizen)
    }
}

fn require_proposal(
    snapshot: Option<&ProposalSnapshot>,
    id: ProposalId,
) -> Result<&Proposal, DenialReason> {
    snapshot
        .filter(|s| s.id == id)
        .and_then(ProposalSnapshot::known)
        .ok_or(DenialReason::StateUnavailable)
}

fn require_vote_record(
    record: Option<&VoteRecord>,
    id: ProposalId,
    actor: Address,
) -> Result<&VoteRecord, DenialReason> {
    record
        .filter(|r| r.proposal_id == id && r.address == actor)
        .ok_or(DenialReason::StateUnavailable)
}

fn require_open(p: &Proposal, now: Timestamp) -> Result<(), DenialReason> {
    if p.has_ended(now) {
        return Err(DenialReason::VotingEnded);
    }
    require_not_terminal(p)
}

fn require_not_terminal(p: &Proposal) -> Result<(), DenialReason> {
    if p.paused {
        return Err(DenialReason::Paused);
    }
    if p.executed {
        return Err(DenialReason::AlreadyExecuted);
    }
    Ok(())
}
