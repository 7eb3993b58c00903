//! View model assembler: turns independent ledger reads into snapshots.
//!
//! Each read is attributed to exactly one field. A failed read marks that
//! field unknown and leaves every other field, entity, and batch item alone.

use std::sync::Arc;

use civitas_governance::{
    AccountSnapshot, Field, Proposal, ProposalSnapshot, RegistrySnapshot, VoteRecord,
};
use civitas_types::{Address, ProposalId};
use tokio::sync::broadcast;

use crate::client::LedgerClient;
use crate::event::ViewEvent;
use crate::store::{AccountReads, Applied, EntityKey, Order, SnapshotStore};

/// Capacity of the change-notification channel.
const EVENT_CAPACITY: usize = 256;

/// Most proposals a single refresh reads, whatever count the ledger reports.
pub const MAX_LOADED_PROPOSALS: usize = 1_000;

/// Summary of one refresh call.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RefreshReport {
    /// Entities whose version advanced, with the new version.
    pub updated: Vec<(EntityKey, u64)>,
    /// Entities for which every read failed.
    pub failed: Vec<EntityKey>,
    /// Results discarded because a newer refresh landed first.
    pub stale: usize,
}

impl RefreshReport {
    pub fn merge(&mut self, other: RefreshReport) {
        self.updated.extend(other.updated);
        self.failed.extend(other.failed);
        self.stale += other.stale;
    }

    pub fn is_complete(&self) -> bool {
        self.failed.is_empty() && self.stale == 0
    }
}

pub struct ViewAssembler {
    client: Arc<dyn LedgerClient>,
    store: SnapshotStore,
    /// The governance contract; allowances are read against it.
    spender: Address,
    events: broadcast::Sender<ViewEvent>,
}

impl ViewAssembler {
    pub fn new(client: Arc<dyn LedgerClient>, spender: Address) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            client,
            store: SnapshotStore::new(),
            spender,
            events,
        }
    }

    pub fn spender(&self) -> Address {
        self.spender
    }

    /// Receive a [`ViewEvent`] for every applied read from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<ViewEvent> {
        self.events.subscribe()
    }

    // ── Queries ─────────────────────────────────────────────────────────

    pub fn version(&self, key: EntityKey) -> u64 {
        self.store.version(key)
    }

    pub fn registry(&self) -> RegistrySnapshot {
        self.store.registry()
    }

    pub fn proposal(&self, id: ProposalId) -> Option<ProposalSnapshot> {
        self.store.proposal(id)
    }

    pub fn proposals(&self, order: Order) -> Vec<ProposalSnapshot> {
        self.store.proposals(order)
    }

    pub fn proposals_for(&self, ids: &[ProposalId], order: Order) -> Vec<ProposalSnapshot> {
        self.store.proposals_for(ids, order)
    }

    /// The account snapshot, all fields unknown if it was never read.
    pub fn account(&self, address: Address) -> AccountSnapshot {
        self.store
            .account(address)
            .unwrap_or_else(|| AccountSnapshot::unloaded(address))
    }

    pub fn vote_record(&self, id: ProposalId, address: Address) -> Option<VoteRecord> {
        self.store.vote_record(id, address)
    }

    pub fn vote_records(&self, address: Address) -> Vec<VoteRecord> {
        self.store.vote_records(address)
    }

    // ── Refresh ─────────────────────────────────────────────────────────

    pub async fn refresh_registry(&self) -> RefreshReport {
        let ticket = self.store.issue();
        let (citizens, count) =
            tokio::join!(self.client.total_citizens(), self.client.proposal_count());
        let applied = self.store.apply_registry(
            ticket,
            Field::from_result(citizens),
            Field::from_result(count),
        );
        self.record(EntityKey::Registry, applied, "registry reads failed")
    }

    /// Read every listed proposal in one batch.
    pub async fn refresh_proposals(&self, ids: &[ProposalId]) -> RefreshReport {
        if ids.is_empty() {
            return RefreshReport::default();
        }
        let ticket = self.store.issue();
        let results = self.client.get_proposals(ids).await;
        let mut report = RefreshReport::default();
        for (id, result) in ids.iter().copied().zip(results) {
            let field = match result {
                Ok(fields) => Field::from_result(Proposal::from_fields(id, fields)),
                Err(e) => Field::unknown(e.to_string()),
            };
            let reason = field.failure().map(|f| f.reason.clone()).unwrap_or_default();
            let applied = self.store.apply_proposal(ticket, id, field);
            report.merge(self.record(EntityKey::Proposal(id), applied, &reason));
        }
        report
    }

    /// Load the newest `limit` proposals, at most [`MAX_LOADED_PROPOSALS`].
    /// Returns the ids requested, newest first; empty if the proposal count
    /// is unknown.
    pub async fn refresh_recent(&self, limit: usize) -> (Vec<ProposalId>, RefreshReport) {
        let mut report = self.refresh_registry().await;
        let limit = limit.min(MAX_LOADED_PROPOSALS);
        let ids = match self.store.registry().proposal_count.known() {
            Some(&count) => {
                if count > limit as u64 && limit == MAX_LOADED_PROPOSALS {
                    tracing::warn!(
                        count,
                        limit,
                        "proposal count exceeds load limit, loading newest only"
                    );
                }
                ProposalId::newest(count, limit)
            }
            None => Vec::new(),
        };
        report.merge(self.refresh_proposals(&ids).await);
        (ids, report)
    }

    /// Load every proposal, up to [`MAX_LOADED_PROPOSALS`] of the newest.
    pub async fn refresh_all_proposals(&self) -> (Vec<ProposalId>, RefreshReport) {
        self.refresh_recent(MAX_LOADED_PROPOSALS).await
    }

    pub async fn refresh_account(&self, address: Address) -> RefreshReport {
        let ticket = self.store.issue();
        let client = &self.client;
        let (citizen, balance, allowance, delegation, proxy) = tokio::join!(
            client.is_citizen(address),
            client.token_balance(address),
            client.allowance(address, self.spender),
            client.delegation_of(address),
            client.proxy_of(address),
        );
        let reads = AccountReads {
            is_citizen: Field::from_result(citizen),
            token_balance: Field::from_result(balance),
            allowance: Field::from_result(allowance),
            delegation: Field::from_result(delegation),
            proxy: Field::from_result(proxy),
        };
        for (field, failure) in [
            ("is_citizen", reads.is_citizen.failure()),
            ("token_balance", reads.token_balance.failure()),
            ("allowance", reads.allowance.failure()),
            ("delegation", reads.delegation.failure()),
            ("proxy", reads.proxy.failure()),
        ] {
            if let Some(failure) = failure {
                tracing::warn!(account = %address, field, error = %failure, "account field unavailable");
            }
        }
        let applied = self.store.apply_account(ticket, address, reads);
        self.record(EntityKey::Account(address), applied, "account reads failed")
    }

    /// Read the voted/vetoed flags of `address` for every listed proposal.
    pub async fn refresh_vote_records(&self, ids: &[ProposalId], address: Address) -> RefreshReport {
        if ids.is_empty() {
            return RefreshReport::default();
        }
        let ticket = self.store.issue();
        let results = self.client.vote_flags(ids, address).await;
        let mut report = RefreshReport::default();
        for (id, (voted, vetoed)) in ids.iter().copied().zip(results) {
            let record = VoteRecord::from_reads(
                id,
                address,
                Field::from_result(voted),
                Field::from_result(vetoed),
            );
            let reason = record
                .has_voted
                .failure()
                .map(|f| f.reason.clone())
                .unwrap_or_default();
            let applied = self.store.apply_vote_record(ticket, record);
            report.merge(self.record(EntityKey::VoteRecord(id, address), applied, &reason));
        }
        report
    }

    /// Refresh exactly the given entities, batching by entity type.
    pub async fn refresh(&self, keys: &[EntityKey]) -> RefreshReport {
        let mut report = RefreshReport::default();
        let mut proposals = Vec::new();
        let mut votes: Vec<(Address, Vec<ProposalId>)> = Vec::new();
        let mut accounts = Vec::new();
        let mut registry = false;
        for key in keys {
            match *key {
                EntityKey::Registry => registry = true,
                EntityKey::Proposal(id) => {
                    if !proposals.contains(&id) {
                        proposals.push(id);
                    }
                }
                EntityKey::Account(addr) => {
                    if !accounts.contains(&addr) {
                        accounts.push(addr);
                    }
                }
                EntityKey::VoteRecord(id, addr) => {
                    match votes.iter_mut().find(|(a, _)| *a == addr) {
                        Some((_, ids)) if !ids.contains(&id) => ids.push(id),
                        Some(_) => {}
                        None => votes.push((addr, vec![id])),
                    }
                }
            }
        }
        if registry {
            report.merge(self.refresh_registry().await);
        }
        report.merge(self.refresh_proposals(&proposals).await);
        for (addr, ids) in &votes {
            report.merge(self.refresh_vote_records(ids, *addr).await);
        }
        for addr in accounts {
            report.merge(self.refresh_account(addr).await);
        }
        report
    }

    fn record(&self, key: EntityKey, applied: Applied, reason: &str) -> RefreshReport {
        let mut report = RefreshReport::default();
        match applied {
            Applied::Updated { version } => {
                tracing::debug!(%key, version, "snapshot refreshed");
                report.updated.push((key, version));
                let _ = self.events.send(ViewEvent::Refreshed { key, version });
            }
            Applied::Failed { version } => {
                tracing::warn!(%key, version, reason, "snapshot read failed");
                report.failed.push(key);
                let _ = self.events.send(ViewEvent::ReadFailed {
                    key,
                    reason: reason.to_string(),
                });
            }
            Applied::Stale => {
                tracing::debug!(%key, "discarding stale read");
                report.stale += 1;
            }
        }
        report
    }
}
