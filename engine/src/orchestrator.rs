//! Action orchestration: lock, evaluate, submit, await finality, refresh.
//!
//! Each action runs through
//! `Idle → Locked → Submitted → AwaitingFinality → Refreshing → Idle`
//! under a per-key lock. Eligibility is decided against the cached
//! snapshots before anything is sent, so denials and concurrent requests
//! are answered without a ledger call. Nothing is ever retried.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use civitas_governance::eligibility::{check_draft, parse_target};
use civitas_governance::{Action, ActionKey, CreditNotice, DenialReason, Eligibility, Evaluator};
use civitas_types::{Address, Clock, ProposalId, TokenAmount, TxRef};
use civitas_view::{
    EntityKey, Finality, LedgerClient, LedgerError, RefreshReport, ViewAssembler,
};
use tokio_util::sync::CancellationToken;

use crate::config::EngineConfig;
use crate::error::ActionError;
use crate::lock::{ActionLocks, ActionState, LockGuard};

/// Whether the post-finality refresh observed the change.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefreshStatus {
    /// This action's own refresh advanced every affected entity.
    Confirmed,
    /// At least one affected entity was not advanced by that refresh.
    Unconfirmed,
}

/// Resolution of an action that reached the ledger.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ActionOutcome {
    Finalized {
        tx: TxRef,
        refresh: RefreshStatus,
        /// Advisory credit cap and burn, for votes.
        notice: Option<CreditNotice>,
    },
    /// The finality wait timed out. The transaction may still land.
    Unconfirmed { tx: TxRef },
    /// The caller stopped waiting. The transaction may still land.
    Cancelled { tx: TxRef },
}

impl ActionOutcome {
    pub fn tx(&self) -> TxRef {
        match self {
            Self::Finalized { tx, .. } | Self::Unconfirmed { tx } | Self::Cancelled { tx } => *tx,
        }
    }

    pub fn is_finalized(&self) -> bool {
        matches!(self, Self::Finalized { .. })
    }
}

/// A ledger write with every argument resolved.
#[derive(Clone, Debug, PartialEq, Eq)]
enum Call {
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
    Approve(TokenAmount),
    Delegate(Address),
    RevokeDelegation,
    AssignProxy(Address),
}

impl Call {
    fn resolve(action: &Action, actor: Address) -> Result<Self, DenialReason> {
        Ok(match action {
            Action::Vote {
                proposal,
                support,
                credits,
            } => Self::Vote {
                id: *proposal,
                support: *support,
                credits: *credits,
            },
            Action::Veto { proposal } => Self::Veto(*proposal),
            Action::Execute { proposal } => Self::Execute(*proposal),
            Action::CreateProposal(draft) => {
                let budget = check_draft(draft)?;
                Self::CreateProposal {
                    description: draft.description.trim().to_string(),
                    category: draft.category.index(),
                    target: budget.unwrap_or(Address::ZERO),
                    allocated_amount: if budget.is_some() {
                        draft.allocated_amount
                    } else {
                        TokenAmount::ZERO
                    },
                }
            }
            Action::RegisterCitizen => Self::RegisterCitizen,
            Action::Approve { amount } => Self::Approve(*amount),
            Action::Delegate { target } => Self::Delegate(parse_target(target, actor)?),
            Action::RevokeDelegation => Self::RevokeDelegation,
            Action::AssignProxy { target } => Self::AssignProxy(parse_target(target, actor)?),
        })
    }

    /// Entities whose ledger state this write changes.
    fn affected(&self, actor: Address) -> Vec<EntityKey> {
        match self {
            Self::Vote { id, .. } | Self::Veto(id) => {
                vec![EntityKey::Proposal(*id), EntityKey::VoteRecord(*id, actor)]
            }
            Self::Execute(id) => vec![EntityKey::Proposal(*id)],
            Self::CreateProposal { .. } => vec![EntityKey::Registry],
            Self::RegisterCitizen
            | Self::Approve(_)
            | Self::Delegate(_)
            | Self::RevokeDelegation
            | Self::AssignProxy(_) => vec![EntityKey::Account(actor)],
        }
    }
}

pub struct ActionOrchestrator {
    assembler: Arc<ViewAssembler>,
    client: Arc<dyn LedgerClient>,
    clock: Arc<dyn Clock>,
    evaluator: Evaluator,
    locks: ActionLocks,
    finality_timeout: Option<Duration>,
    recent_window: usize,
}

impl ActionOrchestrator {
    pub fn new(
        assembler: Arc<ViewAssembler>,
        client: Arc<dyn LedgerClient>,
        clock: Arc<dyn Clock>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            assembler,
            client,
            clock,
            evaluator: Evaluator::new(config.governance.clone()),
            locks: ActionLocks::new(),
            finality_timeout: config.finality_timeout(),
            recent_window: config.recent_proposals,
        }
    }

    /// Eligibility of `action` against the current snapshots, without
    /// taking a lock.
    pub fn evaluate(&self, actor: Address, action: &Action) -> Eligibility {
        let account = self.assembler.account(actor);
        let (proposal, vote) = match action.proposal_id() {
            Some(id) => (
                self.assembler.proposal(id),
                self.assembler.vote_record(id, actor),
            ),
            None => (None, None),
        };
        self.evaluator.evaluate(
            proposal.as_ref(),
            vote.as_ref(),
            &account,
            action,
            self.clock.now(),
        )
    }

    pub fn state(&self, key: &ActionKey) -> ActionState {
        self.locks.state(key)
    }

    pub fn in_flight(&self) -> usize {
        self.locks.active()
    }

    /// Lock the action's key and decide eligibility.
    ///
    /// Returns before any ledger call: a held key yields
    /// [`ActionError::Concurrent`] and an ineligible action yields
    /// [`ActionError::Denied`], releasing the lock.
    pub fn begin(&self, actor: Address, action: Action) -> Result<PendingAction<'_>, ActionError> {
        let key = action.key(actor);
        let Some(guard) = self.locks.try_acquire(key) else {
            tracing::info!(%key, "action already in progress");
            return Err(ActionError::Concurrent { key });
        };

        let notice = match self.evaluate(actor, &action) {
            Eligibility::Allowed { notice } => notice,
            Eligibility::Denied(reason) => {
                tracing::info!(%key, %reason, "action denied");
                return Err(reason.into());
            }
        };
        let call = Call::resolve(&action, actor)?;
        let affected = call.affected(actor);
        let baseline = affected
            .iter()
            .map(|key| (*key, self.assembler.version(*key)))
            .collect();
        if let Some(notice) = notice.filter(|n| n.capped) {
            tracing::info!(
                %key,
                requested = notice.requested,
                effective = notice.effective,
                "credits above cap will not be counted"
            );
        }

        Ok(PendingAction {
            orchestrator: self,
            guard,
            actor,
            call,
            baseline,
            notice,
        })
    }

    pub async fn invoke(&self, actor: Address, action: Action) -> Result<ActionOutcome, ActionError> {
        self.begin(actor, action)?.run().await
    }

    pub async fn invoke_cancellable(
        &self,
        actor: Address,
        action: Action,
        cancel: CancellationToken,
    ) -> Result<ActionOutcome, ActionError> {
        self.begin(actor, action)?.run_with_cancel(cancel).await
    }
}

/// An eligible action holding its key lock, not yet submitted.
///
/// Dropping it without running releases the lock.
pub struct PendingAction<'a> {
    orchestrator: &'a ActionOrchestrator,
    guard: LockGuard,
    actor: Address,
    call: Call,
    /// Versions of the affected entities before submission.
    baseline: Vec<(EntityKey, u64)>,
    notice: Option<CreditNotice>,
}

impl fmt::Debug for PendingAction<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingAction")
            .field("key", self.guard.key())
            .field("call", &self.call)
            .field("notice", &self.notice)
            .finish()
    }
}

impl PendingAction<'_> {
    pub fn key(&self) -> &ActionKey {
        self.guard.key()
    }

    pub fn notice(&self) -> Option<&CreditNotice> {
        self.notice.as_ref()
    }

    pub fn affected(&self) -> Vec<EntityKey> {
        self.baseline.iter().map(|(key, _)| *key).collect()
    }

    pub async fn run(self) -> Result<ActionOutcome, ActionError> {
        self.run_with_cancel(CancellationToken::new()).await
    }

    /// Submit, then wait for finality unless `cancel` fires first.
    ///
    /// A token already cancelled stops the action before submission with
    /// [`ActionError::Cancelled`]. Once submitted, cancellation only stops
    /// the local wait; the transaction stays on the ledger.
    pub async fn run_with_cancel(
        self,
        cancel: CancellationToken,
    ) -> Result<ActionOutcome, ActionError> {
        let key = *self.guard.key();
        if cancel.is_cancelled() {
            tracing::info!(%key, "action cancelled before submission");
            return Err(ActionError::Cancelled { key });
        }

        self.guard.set_state(ActionState::Submitted);
        let tx = match self.submit().await {
            Ok(tx) => tx,
            Err(e) => {
                tracing::warn!(%key, error = %e, "submission failed");
                return Err(ActionError::Submission {
                    reason: e.to_string(),
                });
            }
        };
        tracing::info!(%key, %tx, "submitted");

        self.guard.set_state(ActionState::AwaitingFinality);
        let finality = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::info!(%key, %tx, "finality wait cancelled, outcome unknown");
                return Ok(ActionOutcome::Cancelled { tx });
            }
            finality = self.await_finality(tx) => finality,
        };
        match finality {
            None => {
                tracing::warn!(%key, %tx, "finality wait timed out, outcome unconfirmed");
                return Ok(ActionOutcome::Unconfirmed { tx });
            }
            Some(Err(e)) => {
                tracing::warn!(%key, %tx, error = %e, "finality wait failed");
                return Err(ActionError::Submission {
                    reason: e.to_string(),
                });
            }
            Some(Ok(Finality::Rejected(reason))) => {
                tracing::warn!(%key, %tx, %reason, "rejected by ledger");
                return Err(ActionError::Submission { reason });
            }
            Some(Ok(Finality::Finalized)) => {}
        }

        self.guard.set_state(ActionState::Refreshing);
        let refresh = self.refresh().await;
        tracing::info!(%key, %tx, ?refresh, "action finalized");
        Ok(ActionOutcome::Finalized {
            tx,
            refresh,
            notice: self.notice,
        })
    }

    async fn submit(&self) -> Result<TxRef, LedgerError> {
        let client = &self.orchestrator.client;
        let from = self.actor;
        match &self.call {
            Call::Vote {
                id,
                support,
                credits,
            } => client.vote(from, *id, *support, *credits).await,
            Call::Veto(id) => client.veto(from, *id).await,
            Call::Execute(id) => client.execute_proposal(from, *id).await,
            Call::CreateProposal {
                description,
                category,
                target,
                allocated_amount,
            } => {
                client
                    .create_proposal(from, description, *category, *target, *allocated_amount)
                    .await
            }
            Call::RegisterCitizen => client.register_citizen(from).await,
            Call::Approve(amount) => {
                client
                    .approve(from, self.orchestrator.assembler.spender(), *amount)
                    .await
            }
            Call::Delegate(delegate) => client.delegate_to(from, *delegate).await,
            Call::RevokeDelegation => client.revoke_delegation(from).await,
            Call::AssignProxy(proxy) => client.assign_proxy(from, *proxy).await,
        }
    }

    /// `None` when the configured timeout expires first.
    async fn await_finality(&self, tx: TxRef) -> Option<Result<Finality, LedgerError>> {
        let wait = self.orchestrator.client.await_finality(tx);
        match self.orchestrator.finality_timeout {
            Some(limit) => tokio::time::timeout(limit, wait).await.ok(),
            None => Some(wait.await),
        }
    }

    async fn refresh(&self) -> RefreshStatus {
        let assembler = &self.orchestrator.assembler;
        let report = match self.call {
            Call::CreateProposal { .. } => {
                assembler
                    .refresh_recent(self.orchestrator.recent_window)
                    .await
                    .1
            }
            _ => assembler.refresh(&self.affected()).await,
        };
        let lagging = lagging(&self.baseline, &report);
        if lagging.is_empty() {
            RefreshStatus::Confirmed
        } else {
            tracing::warn!(
                key = %self.guard.key(),
                lagging = ?lagging,
                failed = report.failed.len(),
                stale = report.stale,
                "refresh unconfirmed"
            );
            RefreshStatus::Unconfirmed
        }
    }
}

/// Affected entities this refresh did not move past their baseline.
/// Versions bumped by other refreshes in the meantime do not count.
fn lagging(baseline: &[(EntityKey, u64)], report: &RefreshReport) -> Vec<EntityKey> {
    baseline
        .iter()
        .filter(|(key, before)| {
            !report
                .updated
                .iter()
                .any(|(updated, version)| updated == key && version > before)
        })
        .map(|(key, _)| *key)
        .collect()
}
