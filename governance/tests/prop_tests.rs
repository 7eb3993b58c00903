use proptest::prelude::*;

use civitas_governance::{AggregateStats, Proposal, ProposalFields};
use civitas_types::{Address, ProposalId, Timestamp, TokenAmount};

fn arb_fields() -> impl Strategy<Value = ProposalFields> {
    (
        0u8..6,
        0u64..2_000,
        0u64..50,
        0u64..50,
        any::<bool>(),
        any::<bool>(),
    )
        .prop_map(|(category, end, yes, no, executed, paused)| ProposalFields {
            description: "generated".into(),
            category,
            end_time: Timestamp::new(end),
            target_address: Address::new([5; 20]),
            allocated_amount: TokenAmount::new(10),
            total_yes_credits: yes,
            total_no_credits: no,
            veto_votes: 0,
            executed,
            paused,
        })
}

proptest! {
    /// No validated proposal is both executed and paused.
    #[test]
    fn terminal_states_exclusive(fields in arb_fields(), id in 1u64..1_000) {
        let id = ProposalId::new(id).unwrap();
        if let Ok(p) = Proposal::from_fields(id, fields) {
            prop_assert!(!(p.executed && p.paused));
            prop_assert_eq!(p.budget.is_some(), p.category.index() == 0);
        }
    }

    /// Status buckets partition the set and the rate stays in [0, 1].
    #[test]
    fn stats_partition(set in prop::collection::vec(arb_fields(), 0..30), now in 0u64..2_000) {
        let proposals: Vec<Proposal> = set
            .into_iter()
            .enumerate()
            .filter_map(|(i, f)| Proposal::from_fields(ProposalId::new(i as u64 + 1).unwrap(), f).ok())
            .collect();
        let stats = AggregateStats::compute(&proposals, Timestamp::new(now));
        prop_assert_eq!(stats.total, proposals.len());
        prop_assert_eq!(
            stats.active_count + stats.ended_count + stats.executed_count + stats.paused_count,
            stats.total
        );
        let rate = stats.participation_rate();
        prop_assert!((0.0..=1.0).contains(&rate));
    }
}
