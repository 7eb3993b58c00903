//! Nullable ledger: an in-memory governance contract.
//!
//! Applies the same rules the real contract enforces, but lets tests:
//! - seed citizens, balances, and proposals directly
//! - make individual reads fail (persistently or once)
//! - reject the next submission outright
//! - hold finality so an action can be observed mid-flight
//!
//! Writes take effect at submission unless finality is held, in which case
//! they queue until released. Waiting on finality never changes the outcome.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use civitas_governance::{Category, DelegationRecord, ProposalFields, ProxyRecord, PROXY_VALIDITY_SECS};
use civitas_types::{Address, ProposalId, Timestamp, TokenAmount, TxRef};
use civitas_view::{Finality, LedgerClient, LedgerError};
use tokio::sync::Notify;

use crate::clock::NullClock;

/// Voting period for proposals created through the ledger.
pub const VOTING_PERIOD_SECS: u64 = 7 * 24 * 60 * 60;
/// Credits counted per vote.
pub const CREDIT_CAP: u64 = 100;
/// Veto share that pauses a proposal, in basis points of all citizens.
pub const VETO_THRESHOLD_BPS: u64 = 1_000;

/// A single read the ledger can be told to fail.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ReadOp {
    Proposal(ProposalId),
    IsCitizen(Address),
    HasVoted(ProposalId, Address),
    HasVetoed(ProposalId, Address),
    TotalCitizens,
    ProposalCount,
    TokenBalance(Address),
    Allowance(Address),
    Delegation(Address),
    Proxy(Address),
}

/// A write as submitted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WriteCall {
    Vote {
        id: ProposalId,
        support: bool,
        credits: u64,
    },
    Veto(ProposalId),
    Execute(ProposalId),
    CreateProposal {
        description: String,
        category: u8,
        target: Address,
        allocated_amount: TokenAmount,
    },
    RegisterCitizen,
    Approve {
        spender: Address,
        amount: TokenAmount,
    },
    DelegateTo(Address),
    RevokeDelegation,
    AssignProxy(Address),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Submission {
    pub from: Address,
    pub call: WriteCall,
    pub tx: TxRef,
}

#[derive(Default)]
struct State {
    citizens: HashSet<Address>,
    proposals: Vec<ProposalFields>,
    voted: HashSet<(ProposalId, Address)>,
    vetoed: HashSet<(ProposalId, Address)>,
    balances: HashMap<Address, TokenAmount>,
    allowances: HashMap<(Address, Address), TokenAmount>,
    delegations: HashMap<Address, DelegationRecord>,
    proxies: HashMap<Address, ProxyRecord>,
    reported_count: Option<u64>,
}

#[derive(Default)]
struct Faults {
    persistent: HashSet<ReadOp>,
    once: HashSet<ReadOp>,
    reject_next_submit: Option<String>,
}

pub struct NullLedger {
    clock: Arc<NullClock>,
    state: Mutex<State>,
    faults: Mutex<Faults>,
    queued: Mutex<Vec<Submission>>,
    outcomes: Mutex<HashMap<TxRef, Finality>>,
    submissions: Mutex<Vec<Submission>>,
    reads: AtomicU64,
    next_tx: AtomicU64,
    finality_held: AtomicBool,
    finality_released: Notify,
}

fn guard<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

fn reject(reason: &str) -> Result<(), String> {
    Err(reason.to_string())
}

impl NullLedger {
    pub fn new(clock: Arc<NullClock>) -> Self {
        Self {
            clock,
            state: Mutex::new(State::default()),
            faults: Mutex::new(Faults::default()),
            queued: Mutex::new(Vec::new()),
            outcomes: Mutex::new(HashMap::new()),
            submissions: Mutex::new(Vec::new()),
            reads: AtomicU64::new(0),
            next_tx: AtomicU64::new(0),
            finality_held: AtomicBool::new(false),
            finality_released: Notify::new(),
        }
    }

    // ── Seeding ─────────────────────────────────────────────────────────

    pub fn add_citizen(&self, address: Address) {
        guard(&self.state).citizens.insert(address);
    }

    pub fn set_balance(&self, address: Address, amount: TokenAmount) {
        guard(&self.state).balances.insert(address, amount);
    }

    /// Append a proposal exactly as given and return its id.
    pub fn insert_proposal(&self, fields: ProposalFields) -> ProposalId {
        let mut state = guard(&self.state);
        state.proposals.push(fields);
        ProposalId::new(state.proposals.len() as u64).unwrap_or_else(|| unreachable!())
    }

    /// Overwrite the vote flags of `address` on `id`, bypassing the rules.
    pub fn force_vote_flags(&self, id: ProposalId, address: Address, voted: bool, vetoed: bool) {
        let mut locked = guard(&self.state);
        let state = &mut *locked;
        for (set, on) in [(&mut state.voted, voted), (&mut state.vetoed, vetoed)] {
            if on {
                set.insert((id, address));
            } else {
                set.remove(&(id, address));
            }
        }
    }

    /// Report `count` from `proposal_count` regardless of what is stored.
    pub fn report_proposal_count(&self, count: u64) {
        guard(&self.state).reported_count = Some(count);
    }

    pub fn proposal_fields(&self, id: ProposalId) -> Option<ProposalFields> {
        guard(&self.state)
            .proposals
            .get(id.get() as usize - 1)
            .cloned()
    }

    // ── Fault injection ─────────────────────────────────────────────────

    /// Fail `op` until [`NullLedger::heal_read`] is called.
    pub fn fail_read(&self, op: ReadOp) {
        guard(&self.faults).persistent.insert(op);
    }

    /// Fail `op` on its next call only.
    pub fn fail_read_once(&self, op: ReadOp) {
        guard(&self.faults).once.insert(op);
    }

    pub fn heal_read(&self, op: ReadOp) {
        let mut faults = guard(&self.faults);
        faults.persistent.remove(&op);
        faults.once.remove(&op);
    }

    /// Refuse the next write at submission with `reason`.
    pub fn reject_next_submission(&self, reason: impl Into<String>) {
        guard(&self.faults).reject_next_submit = Some(reason.into());
    }

    /// Queue writes unapplied until [`NullLedger::release_finality`].
    pub fn hold_finality(&self) {
        self.finality_held.store(true, Ordering::SeqCst);
    }

    /// Apply every queued write in submission order and wake all waiters.
    pub fn release_finality(&self) {
        self.finality_held.store(false, Ordering::SeqCst);
        let mut queued = guard(&self.queued);
        for submission in queued.drain(..) {
            self.finalize(&submission);
        }
        drop(queued);
        self.finality_released.notify_waiters();
    }

    /// Writes submitted while finality is held.
    pub fn queued(&self) -> usize {
        guard(&self.queued).len()
    }

    // ── Inspection ──────────────────────────────────────────────────────

    /// Every accepted submission, in order.
    pub fn submissions(&self) -> Vec<Submission> {
        guard(&self.submissions).clone()
    }

    pub fn balance_of(&self, address: Address) -> TokenAmount {
        guard(&self.state)
            .balances
            .get(&address)
            .copied()
            .unwrap_or_default()
    }

    /// Total read calls served or failed.
    pub fn read_count(&self) -> u64 {
        self.reads.load(Ordering::SeqCst)
    }

    // ── Internals ───────────────────────────────────────────────────────

    fn read<T>(&self, op: ReadOp, f: impl FnOnce(&State) -> T) -> Result<T, LedgerError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        {
            let mut faults = guard(&self.faults);
            if faults.persistent.contains(&op) || faults.once.remove(&op) {
                return Err(LedgerError::Read(format!("{op:?} unavailable")));
            }
        }
        Ok(f(&guard(&self.state)))
    }

    fn submit(&self, from: Address, call: WriteCall) -> Result<TxRef, LedgerError> {
        if let Some(reason) = guard(&self.faults).reject_next_submit.take() {
            return Err(LedgerError::Rejected(reason));
        }
        let n = self.next_tx.fetch_add(1, Ordering::SeqCst) + 1;
        let mut bytes = [0u8; 32];
        bytes[24..].copy_from_slice(&n.to_be_bytes());
        let tx = TxRef::new(bytes);
        let submission = Submission { from, call, tx };
        guard(&self.submissions).push(submission.clone());
        if self.finality_held.load(Ordering::SeqCst) {
            guard(&self.queued).push(submission);
        } else {
            self.finalize(&submission);
        }
        Ok(tx)
    }

    fn finalize(&self, submission: &Submission) {
        let finality = match self.apply(submission) {
            Ok(()) => Finality::Finalized,
            Err(reason) => Finality::Rejected(reason),
        };
        guard(&self.outcomes).insert(submission.tx, finality);
    }

    fn apply(&self, submission: &Submission) -> Result<(), String> {
        let now = self.clock.now();
        let from = submission.from;
        let mut state = guard(&self.state);
        let citizen = state.citizens.contains(&from);
        match &submission.call {
            WriteCall::RegisterCitizen => {
                if citizen {
                    return reject("Already a citizen");
                }
                state.citizens.insert(from);
            }
            WriteCall::CreateProposal {
                description,
                category,
                target,
                allocated_amount,
            } => {
                if !citizen {
                    return reject("Not a verified citizen");
                }
                let budget = *category == Category::Budget.index();
                state.proposals.push(ProposalFields {
                    description: description.clone(),
                    category: *category,
                    end_time: now.plus_secs(VOTING_PERIOD_SECS),
                    target_address: if budget { *target } else { Address::ZERO },
                    allocated_amount: if budget { *allocated_amount } else { TokenAmount::ZERO },
                    total_yes_credits: 0,
                    total_no_credits: 0,
                    veto_votes: 0,
                    executed: false,
                    paused: false,
                });
            }
            WriteCall::Vote {
                id,
                support,
                credits,
            } => {
                if !citizen {
                    return reject("Not a verified citizen");
                }
                Self::check_open(&state, *id, now)?;
                if state.vetoed.contains(&(*id, from)) {
                    return reject("Already vetoed");
                }
                if state.voted.contains(&(*id, from)) {
                    return reject("Already voted");
                }
                if *credits == 0 {
                    return reject("Invalid credits");
                }
                let counted = (*credits).min(CREDIT_CAP);
                state.voted.insert((*id, from));
                let p = &mut state.proposals[id.get() as usize - 1];
                if *support {
                    p.total_yes_credits += counted;
                } else {
                    p.total_no_credits += counted;
                }
            }
            WriteCall::Veto(id) => {
                if !citizen {
                    return reject("Not a verified citizen");
                }
                Self::check_open(&state, *id, now)?;
                if state.voted.contains(&(*id, from)) {
                    return reject("Already voted");
                }
                if state.vetoed.contains(&(*id, from)) {
                    return reject("Already vetoed");
                }
                state.vetoed.insert((*id, from));
                let citizens = state.citizens.len() as u64;
                let p = &mut state.proposals[id.get() as usize - 1];
                p.veto_votes += 1;
                if p.veto_votes * 10_000 >= citizens * VETO_THRESHOLD_BPS {
                    p.paused = true;
                }
            }
            WriteCall::Execute(id) => {
                let p = state
                    .proposals
                    .get(id.get() as usize - 1)
                    .cloned()
                    .ok_or_else(|| "Unknown proposal".to_string())?;
                if now < p.end_time {
                    return reject("Voting still active");
                }
                if p.paused {
                    return reject("Proposal paused");
                }
                if p.executed {
                    return reject("Already executed");
                }
                state.proposals[id.get() as usize - 1].executed = true;
                let passed = p.total_yes_credits > p.total_no_credits;
                if passed && p.category == Category::Budget.index() {
                    let balance = state.balances.entry(p.target_address).or_default();
                    *balance = balance
                        .raw()
                        .checked_add(p.allocated_amount.raw())
                        .map_or(TokenAmount::MAX, TokenAmount::new);
                }
            }
            WriteCall::Approve { spender, amount } => {
                state.allowances.insert((from, *spender), *amount);
            }
            WriteCall::DelegateTo(delegate) => {
                if !citizen {
                    return reject("Not a verified citizen");
                }
                if *delegate == from {
                    return reject("Cannot delegate to self");
                }
                let reputation = state.delegations.get(&from).map_or(0, |d| d.reputation);
                state.delegations.insert(
                    from,
                    DelegationRecord::from_ledger(*delegate, now, reputation),
                );
            }
            WriteCall::RevokeDelegation => {
                if !citizen {
                    return reject("Not a verified citizen");
                }
                let reputation = state.delegations.get(&from).map_or(0, |d| d.reputation);
                state.delegations.insert(
                    from,
                    DelegationRecord::from_ledger(Address::ZERO, Timestamp::EPOCH, reputation),
                );
            }
            WriteCall::AssignProxy(proxy) => {
                if !citizen {
                    return reject("Not a verified citizen");
                }
                if *proxy == from {
                    return reject("Cannot assign self as proxy");
                }
                let expiry = ProxyRecord::expiry_for(now, PROXY_VALIDITY_SECS);
                state
                    .proxies
                    .insert(from, ProxyRecord::from_ledger(*proxy, expiry));
            }
        }
        Ok(())
    }

    fn check_open(state: &State, id: ProposalId, now: Timestamp) -> Result<(), String> {
        let p = state
            .proposals
            .get(id.get() as usize - 1)
            .ok_or_else(|| "Unknown proposal".to_string())?;
        if now >= p.end_time {
            return reject("Voting period ended");
        }
        if p.paused {
            return reject("Proposal paused");
        }
        if p.executed {
            return reject("Already executed");
        }
        Ok(())
    }
}

#[async_trait]
impl LedgerClient for NullLedger {
    async fn get_proposal(&self, id: ProposalId) -> Result<ProposalFields, LedgerError> {
        self.read(ReadOp::Proposal(id), |s| {
            s.proposals.get(id.get() as usize - 1).cloned()
        })?
        .ok_or_else(|| LedgerError::Read(format!("proposal {id} does not exist")))
    }

    async fn is_citizen(&self, address: Address) -> Result<bool, LedgerError> {
        self.read(ReadOp::IsCitizen(address), |s| s.citizens.contains(&address))
    }

    async fn has_voted(&self, id: ProposalId, address: Address) -> Result<bool, LedgerError> {
        self.read(ReadOp::HasVoted(id, address), |s| {
            s.voted.contains(&(id, address))
        })
    }

    async fn has_vetoed(&self, id: ProposalId, address: Address) -> Result<bool, LedgerError> {
        self.read(ReadOp::HasVetoed(id, address), |s| {
            s.vetoed.contains(&(id, address))
        })
    }

    async fn total_citizens(&self) -> Result<u64, LedgerError> {
        self.read(ReadOp::TotalCitizens, |s| s.citizens.len() as u64)
    }

    async fn proposal_count(&self) -> Result<u64, LedgerError> {
        self.read(ReadOp::ProposalCount, |s| {
            s.reported_count.unwrap_or(s.proposals.len() as u64)
        })
    }

    async fn token_balance(&self, address: Address) -> Result<TokenAmount, LedgerError> {
        self.read(ReadOp::TokenBalance(address), |s| {
            s.balances.get(&address).copied().unwrap_or_default()
        })
    }

    async fn allowance(
        &self,
        owner: Address,
        spender: Address,
    ) -> Result<TokenAmount, LedgerError> {
        self.read(ReadOp::Allowance(owner), |s| {
            s.allowances
                .get(&(owner, spender))
                .copied()
                .unwrap_or_default()
        })
    }

    async fn delegation_of(&self, address: Address) -> Result<DelegationRecord, LedgerError> {
        self.read(ReadOp::Delegation(address), |s| {
            s.delegations
                .get(&address)
                .cloned()
                .unwrap_or_else(DelegationRecord::none)
        })
    }

    async fn proxy_of(&self, address: Address) -> Result<ProxyRecord, LedgerError> {
        self.read(ReadOp::Proxy(address), |s| {
            s.proxies
                .get(&address)
                .cloned()
                .unwrap_or_else(ProxyRecord::none)
        })
    }

    async fn vote(
        &self,
        from: Address,
        id: ProposalId,
        support: bool,
        credits: u64,
    ) -> Result<TxRef, LedgerError> {
        self.submit(
            from,
            WriteCall::Vote {
                id,
                support,
                credits,
            },
        )
    }

    async fn veto(&self, from: Address, id: ProposalId) -> Result<TxRef, LedgerError> {
        self.submit(from, WriteCall::Veto(id))
    }

    async fn execute_proposal(
        &self,
        from: Address,
        id: ProposalId,
    ) -> Result<TxRef, LedgerError> {
        self.submit(from, WriteCall::Execute(id))
    }

    async fn create_proposal(
        &self,
        from: Address,
        description: &str,
        category: u8,
        target: Address,
        allocated_amount: TokenAmount,
    ) -> Result<TxRef, LedgerError> {
        self.submit(
            from,
            WriteCall::CreateProposal {
                description: description.to_string(),
                category,
                target,
                allocated_amount,
            },
        )
    }

    async fn register_citizen(&self, from: Address) -> Result<TxRef, LedgerError> {
        self.submit(from, WriteCall::RegisterCitizen)
    }

    async fn approve(
        &self,
        from: Address,
        spender: Address,
        amount: TokenAmount,
    ) -> Result<TxRef, LedgerError> {
        self.submit(from, WriteCall::Approve { spender, amount })
    }

    async fn delegate_to(&self, from: Address, delegate: Address) -> Result<TxRef, LedgerError> {
        self.submit(from, WriteCall::DelegateTo(delegate))
    }

    async fn revoke_delegation(&self, from: Address) -> Result<TxRef, LedgerError> {
        self.submit(from, WriteCall::RevokeDelegation)
    }

    async fn assign_proxy(&self, from: Address, proxy: Address) -> Result<TxRef, LedgerError> {
        self.submit(from, WriteCall::AssignProxy(proxy))
    }

    async fn await_finality(&self, tx: TxRef) -> Result<Finality, LedgerError> {
        loop {
            let released = self.finality_released.notified();
            let pending = guard(&self.queued).iter().any(|s| s.tx == tx);
            if !pending {
                return guard(&self.outcomes)
                    .get(&tx)
                    .cloned()
                    .ok_or_else(|| LedgerError::Transport(format!("unknown transaction {tx}")));
            }
            released.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(n: u8) -> Address {
        Address::new([n; 20])
    }

    fn ledger() -> NullLedger {
        NullLedger::new(Arc::new(NullClock::new(1_000)))
    }

    async fn finalize(ledger: &NullLedger, tx: Result<TxRef, LedgerError>) -> Finality {
        ledger.await_finality(tx.unwrap()).await.unwrap()
    }

    #[tokio::test]
    async fn citizen_creates_and_votes() {
        let ledger = ledger();
        let alice = addr(1);
        let tx = ledger.register_citizen(alice).await;
        assert_eq!(finalize(&ledger, tx).await, Finality::Finalized);

        let tx = ledger
            .create_proposal(alice, "Plant trees", 1, addr(9), TokenAmount::new(5))
            .await;
        assert_eq!(finalize(&ledger, tx).await, Finality::Finalized);
        let id = ProposalId::new(1).unwrap();
        let fields = ledger.proposal_fields(id).unwrap();
        assert_eq!(fields.target_address, Address::ZERO);
        assert_eq!(fields.end_time.as_secs(), 1_000 + VOTING_PERIOD_SECS);

        let tx = ledger.vote(alice, id, true, 250).await;
        assert_eq!(finalize(&ledger, tx).await, Finality::Finalized);
        assert_eq!(ledger.proposal_fields(id).unwrap().total_yes_credits, CREDIT_CAP);
        assert!(ledger.has_voted(id, alice).await.unwrap());

        let tx = ledger.veto(alice, id).await;
        assert_eq!(
            finalize(&ledger, tx).await,
            Finality::Rejected("Already voted".into())
        );
    }

    #[tokio::test]
    async fn veto_threshold_pauses() {
        let ledger = ledger();
        let id = ledger.insert_proposal(ProposalFields {
            description: "x".into(),
            category: 3,
            end_time: Timestamp::new(5_000),
            target_address: Address::ZERO,
            allocated_amount: TokenAmount::ZERO,
            total_yes_credits: 0,
            total_no_credits: 0,
            veto_votes: 0,
            executed: false,
            paused: false,
        });
        for n in 1..=3 {
            ledger.add_citizen(addr(n));
        }
        let tx = ledger.veto(addr(1), id).await;
        assert_eq!(finalize(&ledger, tx).await, Finality::Finalized);
        assert!(ledger.proposal_fields(id).unwrap().paused);
    }

    #[tokio::test]
    async fn read_faults() {
        let ledger = ledger();
        ledger.fail_read_once(ReadOp::TotalCitizens);
        assert!(ledger.total_citizens().await.is_err());
        assert_eq!(ledger.total_citizens().await, Ok(0));

        ledger.fail_read(ReadOp::ProposalCount);
        assert!(ledger.proposal_count().await.is_err());
        assert!(ledger.proposal_count().await.is_err());
        ledger.heal_read(ReadOp::ProposalCount);
        assert_eq!(ledger.proposal_count().await, Ok(0));
        assert_eq!(ledger.read_count(), 5);
    }

    #[tokio::test]
    async fn rejected_submission_is_not_recorded() {
        let ledger = ledger();
        ledger.reject_next_submission("user rejected the request");
        assert_eq!(
            ledger.register_citizen(addr(1)).await,
            Err(LedgerError::Rejected("user rejected the request".into()))
        );
        assert!(ledger.submissions().is_empty());
        assert!(ledger.register_citizen(addr(1)).await.is_ok());
    }

    #[tokio::test]
    async fn held_finality_waits_for_release() {
        let ledger = Arc::new(ledger());
        ledger.hold_finality();
        let tx = ledger.register_citizen(addr(1)).await.unwrap();
        let waiter = {
            let ledger = Arc::clone(&ledger);
            tokio::spawn(async move { ledger.await_finality(tx).await })
        };
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());
        assert_eq!(ledger.queued(), 1);
        assert!(!ledger.is_citizen(addr(1)).await.unwrap());
        ledger.release_finality();
        assert_eq!(waiter.await.unwrap(), Ok(Finality::Finalized));
        assert!(ledger.is_citizen(addr(1)).await.unwrap());
    }

    #[tokio::test]
    async fn released_writes_land_without_a_waiter() {
        let ledger = ledger();
        ledger.hold_finality();
        ledger.register_citizen(addr(2)).await.unwrap();
        ledger.release_finality();
        assert!(ledger.is_citizen(addr(2)).await.unwrap());
    }
}
