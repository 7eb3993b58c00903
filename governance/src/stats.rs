//! Cross-proposal aggregates.
//!
//! Recomputed from scratch on every call; nothing is carried between calls,
//! so the numbers always describe exactly the snapshot set passed in.

use civitas_types::Timestamp;
use serde::{Deserialize, Serialize};

use crate::delegation::DelegationRecord;
use crate::proposal::{Outcome, Proposal, ProposalStatus};
use crate::snapshot::{ProposalSnapshot, VoteRecord};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateStats {
    /// Proposals whose fields are known. Unknown snapshots are not counted.
    pub total: usize,
    pub active_count: usize,
    pub ended_count: usize,
    pub executed_count: usize,
    pub paused_count: usize,
    /// Proposals with any yes or no credits.
    pub participating_count: usize,
}

impl AggregateStats {
    pub fn compute<'a>(proposals: impl IntoIterator<Item = &'a Proposal>, now: Timestamp) -> Self {
        let mut stats = Self::default();
        for p in proposals {
            stats.total += 1;
            match p.status(now) {
                ProposalStatus::Active => stats.active_count += 1,
                ProposalStatus::Ended => stats.ended_count += 1,
                ProposalStatus::Executed => stats.executed_count += 1,
                ProposalStatus::Paused => stats.paused_count += 1,
            }
            if p.has_participation() {
                stats.participating_count += 1;
            }
        }
        stats
    }

    pub fn from_snapshots(snapshots: &[ProposalSnapshot], now: Timestamp) -> Self {
        Self::compute(snapshots.iter().filter_map(ProposalSnapshot::known), now)
    }

    /// Share of proposals with participation, 0 when there are none.
    pub fn participation_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.participating_count as f64 / self.total as f64
    }

    /// [`Self::participation_rate`] as a rounded whole percent.
    pub fn participation_percent(&self) -> u32 {
        (self.participation_rate() * 100.0).round() as u32
    }
}

/// PASSED/FAILED for an executed proposal.
pub fn execution_outcome(proposal: &Proposal) -> Option<Outcome> {
    proposal.outcome()
}

/// Activity score for a profile: one point per proposal, plus ten for each
/// executed proposal the account voted on or five for other executed
/// proposals, plus the delegation reputation.
pub fn participation_score<'a>(
    proposals: impl IntoIterator<Item = &'a Proposal>,
    votes: &[VoteRecord],
    delegation: Option<&DelegationRecord>,
) -> u64 {
    let mut score = 0u64;
    for p in proposals {
        score += 1;
        if p.executed {
            let voted = votes
                .iter()
                .any(|v| v.proposal_id == p.id && v.has_voted.known() == Some(&true));
            score += if voted { 10 } else { 5 };
        }
    }
    score + delegation.map_or(0, |d| d.reputation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::Field;
    use crate::proposal::Category;
    use civitas_types::{Address, ProposalId};

    const NOW: u64 = 50_000;

    fn p(id: u64, end: u64, executed: bool, paused: bool, yes: u64, no: u64) -> Proposal {
        Proposal {
            id: ProposalId::new(id).unwrap(),
            description: format!("proposal {id}"),
            category: Category::Other,
            end_time: Timestamp::new(end),
            budget: None,
            total_yes_credits: yes,
            total_no_credits: no,
            veto_votes: 0,
            executed,
            paused,
        }
    }

    #[test]
    fn mixed_set_scenario() {
        let set = vec![
            p(1, NOW - 10, false, false, 0, 0),
            p(2, NOW + 1_000, false, false, 5, 0),
            p(3, NOW - 10, true, false, 10, 2),
        ];
        let stats = AggregateStats::compute(&set, Timestamp::new(NOW));
        assert_eq!(stats.active_count, 1);
        assert_eq!(stats.ended_count, 1);
        assert_eq!(stats.executed_count, 1);
        assert!((stats.participation_rate() - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(stats.participation_percent(), 67);
        assert_eq!(execution_outcome(&set[2]), Some(Outcome::Passed));
        assert_eq!(execution_outcome(&set[0]), None);
    }

    #[test]
    fn empty_set_has_zero_rate() {
        let stats = AggregateStats::compute(std::iter::empty(), Timestamp::new(NOW));
        assert_eq!(stats, AggregateStats::default());
        assert_eq!(stats.participation_rate(), 0.0);
    }

    #[test]
    fn end_time_equal_to_now_counts_as_ended() {
        let set = [p(1, NOW, false, false, 0, 0)];
        let stats = AggregateStats::compute(&set, Timestamp::new(NOW));
        assert_eq!((stats.active_count, stats.ended_count), (0, 1));
    }

    #[test]
    fn paused_counts_separately() {
        let set = [p(1, NOW + 5, false, true, 1, 9)];
        let stats = AggregateStats::compute(&set, Timestamp::new(NOW));
        assert_eq!(stats.paused_count, 1);
        assert_eq!(stats.active_count + stats.ended_count, 0);
    }

    #[test]
    fn unknown_snapshots_are_skipped() {
        let snaps = vec![
            ProposalSnapshot {
                id: ProposalId::new(1).unwrap(),
                proposal: Field::Known(p(1, NOW + 5, false, false, 0, 0)),
                version: 1,
            },
            ProposalSnapshot::unloaded(ProposalId::new(2).unwrap()),
        ];
        let stats = AggregateStats::from_snapshots(&snaps, Timestamp::new(NOW));
        assert_eq!(stats.total, 1);
        assert_eq!(stats.active_count, 1);
    }

    #[test]
    fn score_counts_votes_on_executed() {
        let set = [
            p(1, NOW - 1, true, false, 3, 1),
            p(2, NOW - 1, true, false, 0, 1),
            p(3, NOW + 1, false, false, 0, 0),
        ];
        let me = Address::new([1; 20]);
        let votes = [VoteRecord {
            has_voted: Field::Known(true),
            has_vetoed: Field::Known(false),
            ..VoteRecord::unloaded(ProposalId::new(1).unwrap(), me)
        }];
        let delegation = DelegationRecord::from_ledger(Address::new([2; 20]), Timestamp::new(1), 4);
        assert_eq!(participation_score(&set, &votes, Some(&delegation)), 3 + 10 + 5 + 4);
        assert_eq!(participation_score(&set, &[], None), 3 + 5 + 5);
    }
}
