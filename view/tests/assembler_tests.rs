//! Assembler behaviour against the in-memory ledger: per-field failure
//! isolation, batch attribution, ordering, versions, and events.

use std::sync::Arc;

use civitas_governance::{Field, ProposalFields};
use civitas_nullables::{NullClock, NullLedger, ReadOp};
use civitas_types::{Address, ProposalId, Timestamp, TokenAmount};
use civitas_view::{EntityKey, Order, ViewAssembler, ViewEvent, MAX_LOADED_PROPOSALS};

const NOW: u64 = 10_000;

fn addr(n: u8) -> Address {
    Address::new([n; 20])
}

fn fields(description: &str, end: u64, yes: u64) -> ProposalFields {
    ProposalFields {
        description: description.into(),
        category: 3,
        end_time: Timestamp::new(end),
        target_address: Address::ZERO,
        allocated_amount: TokenAmount::ZERO,
        total_yes_credits: yes,
        total_no_credits: 0,
        veto_votes: 0,
        executed: false,
        paused: false,
    }
}

fn setup() -> (Arc<NullLedger>, ViewAssembler) {
    let ledger = Arc::new(NullLedger::new(Arc::new(NullClock::new(NOW))));
    let assembler = ViewAssembler::new(ledger.clone(), addr(0xC1));
    (ledger, assembler)
}

fn ids(snapshots: &[civitas_governance::ProposalSnapshot]) -> Vec<u64> {
    snapshots.iter().map(|s| s.id.get()).collect()
}

#[tokio::test]
async fn failed_account_field_leaves_siblings_known() {
    let (ledger, assembler) = setup();
    let me = addr(1);
    ledger.add_citizen(me);
    ledger.set_balance(me, TokenAmount::new(70));
    ledger.fail_read(ReadOp::Delegation(me));

    let report = assembler.refresh_account(me).await;
    assert!(report.failed.is_empty());
    assert_eq!(report.updated, vec![(EntityKey::Account(me), 1)]);

    let account = assembler.account(me);
    assert_eq!(account.is_citizen, Field::Known(true));
    assert_eq!(account.token_balance, Field::Known(TokenAmount::new(70)));
    assert!(!account.delegation.is_known());
    assert!(account.proxy.is_known());
}

#[tokio::test]
async fn failed_field_overwrites_previous_value_without_new_version() {
    let (ledger, assembler) = setup();
    let me = addr(1);
    ledger.add_citizen(me);
    assembler.refresh_account(me).await;
    assert_eq!(assembler.account(me).is_citizen, Field::Known(true));

    for op in [
        ReadOp::IsCitizen(me),
        ReadOp::TokenBalance(me),
        ReadOp::Allowance(me),
        ReadOp::Delegation(me),
        ReadOp::Proxy(me),
    ] {
        ledger.fail_read(op);
    }
    let report = assembler.refresh_account(me).await;
    assert_eq!(report.failed, vec![EntityKey::Account(me)]);

    let account = assembler.account(me);
    assert!(!account.is_citizen.is_known());
    assert_eq!(account.version, 1);
}

#[tokio::test]
async fn batch_failure_is_attributed_to_one_proposal() {
    let (ledger, assembler) = setup();
    for n in 1..=3 {
        ledger.insert_proposal(fields(&format!("p{n}"), NOW + 100, n));
    }
    let second = ProposalId::new(2).unwrap();
    ledger.fail_read(ReadOp::Proposal(second));

    let (loaded, report) = assembler.refresh_all_proposals().await;
    assert_eq!(loaded.len(), 3);
    assert_eq!(report.failed, vec![EntityKey::Proposal(second)]);
    assert_eq!(report.updated.len(), 3); // registry + two proposals

    let snaps = assembler.proposals(Order::OldestFirst);
    assert_eq!(ids(&snaps), vec![1, 2, 3]);
    assert!(snaps[0].known().is_some());
    assert!(snaps[1].known().is_none());
    assert_eq!(snaps[2].known().unwrap().total_yes_credits, 3);
}

#[tokio::test]
async fn recent_window_loads_newest_first() {
    let (ledger, assembler) = setup();
    for n in 1..=8 {
        ledger.insert_proposal(fields(&format!("p{n}"), NOW + 100, 0));
    }
    let (loaded, report) = assembler.refresh_recent(6).await;
    assert!(report.is_complete());
    assert_eq!(
        loaded.iter().map(|id| id.get()).collect::<Vec<_>>(),
        vec![8, 7, 6, 5, 4, 3]
    );
    assert_eq!(ids(&assembler.proposals(Order::NewestFirst)), vec![8, 7, 6, 5, 4, 3]);
    assert_eq!(assembler.registry().proposal_count, Field::Known(8));
}

#[tokio::test]
async fn oversized_count_loads_a_bounded_newest_window() {
    let (ledger, assembler) = setup();
    ledger.insert_proposal(fields("p1", NOW + 100, 0));
    ledger.report_proposal_count(u64::MAX);

    let (loaded, report) = assembler.refresh_all_proposals().await;
    assert_eq!(loaded.len(), MAX_LOADED_PROPOSALS);
    assert_eq!(loaded[0].get(), u64::MAX);
    assert_eq!(report.failed.len(), MAX_LOADED_PROPOSALS);
    assert_eq!(assembler.registry().proposal_count, Field::Known(u64::MAX));

    let (loaded, _) = assembler.refresh_recent(usize::MAX).await;
    assert_eq!(loaded.len(), MAX_LOADED_PROPOSALS);
}

#[tokio::test]
async fn unknown_count_derives_no_ids_and_keeps_snapshots() {
    let (ledger, assembler) = setup();
    ledger.insert_proposal(fields("p1", NOW + 100, 0));
    assembler.refresh_recent(6).await;

    ledger.fail_read(ReadOp::ProposalCount);
    let (loaded, _) = assembler.refresh_recent(6).await;
    assert!(loaded.is_empty());
    assert!(!assembler.registry().proposal_count.is_known());
    assert!(assembler.registry().total_citizens.is_known());
    assert_eq!(assembler.proposals(Order::NewestFirst).len(), 1);
}

#[tokio::test]
async fn conflicting_terminal_state_is_unknown() {
    let (ledger, assembler) = setup();
    let mut bad = fields("broken", NOW - 1, 0);
    bad.executed = true;
    bad.paused = true;
    let id = ledger.insert_proposal(bad);
    let report = assembler.refresh_proposals(&[id]).await;
    assert_eq!(report.failed, vec![EntityKey::Proposal(id)]);
    assert!(assembler.proposal(id).unwrap().known().is_none());
}

#[tokio::test]
async fn conflicting_vote_flags_are_unknown() {
    let (ledger, assembler) = setup();
    let me = addr(1);
    let id = ledger.insert_proposal(fields("p", NOW + 100, 0));
    ledger.force_vote_flags(id, me, true, true);
    assembler.refresh_vote_records(&[id], me).await;
    let record = assembler.vote_record(id, me).unwrap();
    assert!(!record.has_voted.is_known());
    assert!(!record.has_vetoed.is_known());
}

#[tokio::test]
async fn repeated_refresh_changes_only_versions() {
    let (ledger, assembler) = setup();
    let me = addr(1);
    ledger.add_citizen(me);
    let id = ledger.insert_proposal(fields("p", NOW + 100, 4));
    let keys = [
        EntityKey::Registry,
        EntityKey::Proposal(id),
        EntityKey::Account(me),
        EntityKey::VoteRecord(id, me),
    ];

    assembler.refresh(&keys).await;
    let first = (
        assembler.proposal(id).unwrap(),
        assembler.account(me),
        assembler.vote_record(id, me).unwrap(),
        assembler.registry(),
    );
    assembler.refresh(&keys).await;
    let second = (
        assembler.proposal(id).unwrap(),
        assembler.account(me),
        assembler.vote_record(id, me).unwrap(),
        assembler.registry(),
    );

    assert_eq!(first.0.proposal, second.0.proposal);
    assert_eq!(first.1.is_citizen, second.1.is_citizen);
    assert_eq!(first.1.delegation, second.1.delegation);
    assert_eq!(first.2.has_voted, second.2.has_voted);
    assert_eq!(first.3.total_citizens, second.3.total_citizens);
    for key in keys {
        assert_eq!(assembler.version(key), 2, "{key}");
    }
}

#[tokio::test]
async fn events_follow_applied_reads() {
    let (ledger, assembler) = setup();
    let id = ledger.insert_proposal(fields("p", NOW + 100, 0));
    let mut events = assembler.subscribe();

    assembler.refresh_proposals(&[id]).await;
    assert_eq!(
        events.recv().await.unwrap(),
        ViewEvent::Refreshed {
            key: EntityKey::Proposal(id),
            version: 1
        }
    );

    ledger.fail_read_once(ReadOp::Proposal(id));
    assembler.refresh_proposals(&[id]).await;
    let event = events.recv().await.unwrap();
    assert_eq!(event.key(), EntityKey::Proposal(id));
    assert!(matches!(event, ViewEvent::ReadFailed { .. }));
}

#[tokio::test]
async fn missing_account_reads_as_unloaded() {
    let (_, assembler) = setup();
    let account = assembler.account(addr(4));
    assert_eq!(account.version, 0);
    assert!(!account.is_citizen.is_known());
    assert_eq!(assembler.spender(), addr(0xC1));
}
