//! Versioned snapshot store.
//!
//! Entities are keyed by id; each carries its own version, bumped whenever a
//! refresh lands with at least one successful read. Refreshes are ticketed
//! when issued: a result is applied only if its ticket is newer than the
//! last one applied to that entity, so a slow response can never overwrite
//! a fresher one.
//!
//! All access goes through short, synchronous critical sections. Readers get
//! owned copies.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use civitas_governance::{
    AccountSnapshot, DelegationRecord, Field, Proposal, ProposalSnapshot, ProxyRecord,
    RegistrySnapshot, VoteRecord,
};
use civitas_types::{Address, ProposalId, TokenAmount};

/// Identifies one snapshot in the store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntityKey {
    Registry,
    Proposal(ProposalId),
    Account(Address),
    VoteRecord(ProposalId, Address),
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Registry => f.write_str("registry"),
            Self::Proposal(id) => write!(f, "proposal {id}"),
            Self::Account(addr) => write!(f, "account {addr}"),
            Self::VoteRecord(id, addr) => write!(f, "vote record {id}/{addr}"),
        }
    }
}

/// Order of proposal listings.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Order {
    #[default]
    NewestFirst,
    OldestFirst,
}

/// Identifies one issued refresh. Later tickets compare greater.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Ticket(u64);

/// Field results of one account refresh.
#[derive(Clone, Debug)]
pub struct AccountReads {
    pub is_citizen: Field<bool>,
    pub token_balance: Field<TokenAmount>,
    pub allowance: Field<TokenAmount>,
    pub delegation: Field<DelegationRecord>,
    pub proxy: Field<ProxyRecord>,
}

impl AccountReads {
    fn any_known(&self) -> bool {
        self.is_citizen.is_known()
            || self.token_balance.is_known()
            || self.allowance.is_known()
            || self.delegation.is_known()
            || self.proxy.is_known()
    }
}

/// What happened to an applied result.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Applied {
    /// Stored; the entity's version is now `version`.
    Updated { version: u64 },
    /// Stored, but nothing succeeded, so the version did not move.
    Failed { version: u64 },
    /// A newer refresh of the same entity already landed.
    Stale,
}

#[derive(Default)]
struct Inner {
    registry: RegistrySnapshot,
    proposals: BTreeMap<ProposalId, ProposalSnapshot>,
    accounts: HashMap<Address, AccountSnapshot>,
    votes: HashMap<(ProposalId, Address), VoteRecord>,
    applied: HashMap<EntityKey, Ticket>,
    next_ticket: u64,
}

impl Inner {
    /// Claim `key` for `ticket`. False if a newer result already landed.
    fn claim(&mut self, key: EntityKey, ticket: Ticket) -> bool {
        match self.applied.get(&key) {
            Some(last) if *last >= ticket => false,
            _ => {
                self.applied.insert(key, ticket);
                true
            }
        }
    }
}

#[derive(Default)]
pub struct SnapshotStore {
    inner: RwLock<Inner>,
}

fn bump(version: &mut u64, success: bool) -> Applied {
    if success {
        *version += 1;
        Applied::Updated { version: *version }
    } else {
        Applied::Failed { version: *version }
    }
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    // Critical sections never panic part-way, so a poisoned lock still
    // guards consistent data.
    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Issue a ticket for a refresh about to start.
    pub fn issue(&self) -> Ticket {
        let mut inner = self.write();
        inner.next_ticket += 1;
        Ticket(inner.next_ticket)
    }

    // ── Apply ───────────────────────────────────────────────────────────

    pub fn apply_registry(
        &self,
        ticket: Ticket,
        total_citizens: Field<u64>,
        proposal_count: Field<u64>,
    ) -> Applied {
        let mut inner = self.write();
        if !inner.claim(EntityKey::Registry, ticket) {
            return Applied::Stale;
        }
        let success = total_citizens.is_known() || proposal_count.is_known();
        let registry = &mut inner.registry;
        registry.total_citizens = total_citizens;
        registry.proposal_count = proposal_count;
        bump(&mut registry.version, success)
    }

    pub fn apply_proposal(&self, ticket: Ticket, id: ProposalId, proposal: Field<Proposal>) -> Applied {
        let mut inner = self.write();
        if !inner.claim(EntityKey::Proposal(id), ticket) {
            return Applied::Stale;
        }
        let success = proposal.is_known();
        let snapshot = inner
            .proposals
            .entry(id)
            .or_insert_with(|| ProposalSnapshot::unloaded(id));
        snapshot.proposal = proposal;
        bump(&mut snapshot.version, success)
    }

    pub fn apply_account(&self, ticket: Ticket, address: Address, reads: AccountReads) -> Applied {
        let mut inner = self.write();
        if !inner.claim(EntityKey::Account(address), ticket) {
            return Applied::Stale;
        }
        let success = reads.any_known();
        let snapshot = inner
            .accounts
            .entry(address)
            .or_insert_with(|| AccountSnapshot::unloaded(address));
        snapshot.is_citizen = reads.is_citizen;
        snapshot.token_balance = reads.token_balance;
        snapshot.allowance = reads.allowance;
        snapshot.delegation = reads.delegation;
        snapshot.proxy = reads.proxy;
        bump(&mut snapshot.version, success)
    }

    /// `record` carries the fresh flags; its version is ignored.
    pub fn apply_vote_record(&self, ticket: Ticket, record: VoteRecord) -> Applied {
        let key = EntityKey::VoteRecord(record.proposal_id, record.address);
        let mut inner = self.write();
        if !inner.claim(key, ticket) {
            return Applied::Stale;
        }
        let success = record.has_voted.is_known() || record.has_vetoed.is_known();
        let snapshot = inner
            .votes
            .entry((record.proposal_id, record.address))
            .or_insert_with(|| VoteRecord::unloaded(record.proposal_id, record.address));
        snapshot.has_voted = record.has_voted;
        snapshot.has_vetoed = record.has_vetoed;
        bump(&mut snapshot.version, success)
    }

    // ── Query ───────────────────────────────────────────────────────────

    /// Current version of an entity; zero if it was never refreshed.
    pub fn version(&self, key: EntityKey) -> u64 {
        let inner = self.read();
        match key {
            EntityKey::Registry => inner.registry.version,
            EntityKey::Proposal(id) => inner.proposals.get(&id).map_or(0, |s| s.version),
            EntityKey::Account(addr) => inner.accounts.get(&addr).map_or(0, |s| s.version),
            EntityKey::VoteRecord(id, addr) => {
                inner.votes.get(&(id, addr)).map_or(0, |s| s.version)
            }
        }
    }

    pub fn registry(&self) -> RegistrySnapshot {
        self.read().registry.clone()
    }

    pub fn proposal(&self, id: ProposalId) -> Option<ProposalSnapshot> {
        self.read().proposals.get(&id).cloned()
    }

    pub fn proposals(&self, order: Order) -> Vec<ProposalSnapshot> {
        let inner = self.read();
        let all = inner.proposals.values().cloned();
        match order {
            Order::NewestFirst => all.rev().collect(),
            Order::OldestFirst => all.collect(),
        }
    }

    /// Snapshots for `ids` that exist, in the requested order.
    pub fn proposals_for(&self, ids: &[ProposalId], order: Order) -> Vec<ProposalSnapshot> {
        let inner = self.read();
        let mut found: Vec<ProposalSnapshot> = ids
            .iter()
            .filter_map(|id| inner.proposals.get(id).cloned())
            .collect();
        found.sort_by_key(|s| s.id);
        found.dedup_by_key(|s| s.id);
        if order == Order::NewestFirst {
            found.reverse();
        }
        found
    }

    pub fn account(&self, address: Address) -> Option<AccountSnapshot> {
        self.read().accounts.get(&address).cloned()
    }

    pub fn vote_record(&self, id: ProposalId, address: Address) -> Option<VoteRecord> {
        self.read().votes.get(&(id, address)).cloned()
    }

    pub fn vote_records(&self, address: Address) -> Vec<VoteRecord> {
        let inner = self.read();
        let mut records: Vec<VoteRecord> = inner
            .votes
            .values()
            .filter(|r| r.address == address)
            .cloned()
            .collect();
        records.sort_by_key(|r| std::cmp::Reverse(r.proposal_id));
        records
    }
}
