//! The engine facade: one handle for queries, refreshes, and actions.

use std::sync::Arc;

use civitas_governance::{
    participation_score, AccountSnapshot, Action, ActionKey, AggregateStats, Eligibility,
    Proposal, ProposalFilter, ProposalSnapshot, RegistrySnapshot, VoteRecord,
};
use civitas_types::{Address, Clock, ProposalId, Timestamp};
use civitas_view::{EntityKey, LedgerClient, Order, RefreshReport, ViewAssembler, ViewEvent};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::config::EngineConfig;
use crate::error::{ActionError, ConfigError};
use crate::lock::ActionState;
use crate::orchestrator::{ActionOrchestrator, ActionOutcome, PendingAction};

pub struct Engine {
    assembler: Arc<ViewAssembler>,
    orchestrator: ActionOrchestrator,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
    /// Parent of every finality wait started through [`Engine::invoke`].
    shutdown: CancellationToken,
}

impl Engine {
    pub fn new(
        client: Arc<dyn LedgerClient>,
        clock: Arc<dyn Clock>,
        config: EngineConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let assembler = Arc::new(ViewAssembler::new(
            Arc::clone(&client),
            config.governance_contract,
        ));
        let orchestrator = ActionOrchestrator::new(
            Arc::clone(&assembler),
            client,
            Arc::clone(&clock),
            &config,
        );
        tracing::info!(
            contract = %config.governance_contract,
            finality_timeout_secs = ?config.finality_timeout_secs,
            recent = config.recent_proposals,
            "engine ready"
        );
        Ok(Self {
            assembler,
            orchestrator,
            clock,
            config,
            shutdown: CancellationToken::new(),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ViewEvent> {
        self.assembler.subscribe()
    }

    // ── Queries ─────────────────────────────────────────────────────────

    pub fn registry(&self) -> RegistrySnapshot {
        self.assembler.registry()
    }

    pub fn proposal(&self, id: ProposalId) -> Option<ProposalSnapshot> {
        self.assembler.proposal(id)
    }

    pub fn proposals(&self, order: Order) -> Vec<ProposalSnapshot> {
        self.assembler.proposals(order)
    }

    /// Loaded proposals matching `filter`. Unknown proposals never match.
    pub fn proposals_matching(&self, filter: &ProposalFilter, order: Order) -> Vec<Proposal> {
        let now = self.now();
        self.assembler
            .proposals(order)
            .into_iter()
            .filter_map(|s| s.proposal.known().cloned())
            .filter(|p| filter.matches(p, now))
            .collect()
    }

    pub fn account(&self, address: Address) -> AccountSnapshot {
        self.assembler.account(address)
    }

    pub fn vote_record(&self, id: ProposalId, address: Address) -> Option<VoteRecord> {
        self.assembler.vote_record(id, address)
    }

    /// Aggregates over every loaded proposal, recomputed on each call.
    pub fn stats(&self) -> AggregateStats {
        AggregateStats::from_snapshots(&self.assembler.proposals(Order::NewestFirst), self.now())
    }

    /// Aggregates over the given proposals only.
    pub fn stats_for(&self, ids: &[ProposalId]) -> AggregateStats {
        AggregateStats::from_snapshots(
            &self.assembler.proposals_for(ids, Order::NewestFirst),
            self.now(),
        )
    }

    pub fn participation_score(&self, address: Address) -> u64 {
        let snapshots = self.assembler.proposals(Order::NewestFirst);
        let account = self.assembler.account(address);
        participation_score(
            snapshots.iter().filter_map(|s| s.proposal.known()),
            &self.assembler.vote_records(address),
            account.delegation.known(),
        )
    }

    // ── Refresh ─────────────────────────────────────────────────────────

    pub async fn refresh(&self, keys: &[EntityKey]) -> RefreshReport {
        self.assembler.refresh(keys).await
    }

    pub async fn refresh_recent(&self) -> (Vec<ProposalId>, RefreshReport) {
        self.assembler.refresh_recent(self.config.recent_proposals).await
    }

    pub async fn refresh_all_proposals(&self) -> (Vec<ProposalId>, RefreshReport) {
        self.assembler.refresh_all_proposals().await
    }

    pub async fn refresh_account(&self, address: Address) -> RefreshReport {
        self.assembler.refresh_account(address).await
    }

    /// Registry, newest proposals, the account, and its vote records on
    /// those proposals.
    pub async fn refresh_dashboard(&self, address: Address) -> RefreshReport {
        let (ids, mut report) = self.refresh_recent().await;
        let (account, votes) = tokio::join!(
            self.assembler.refresh_account(address),
            self.assembler.refresh_vote_records(&ids, address),
        );
        report.merge(account);
        report.merge(votes);
        tracing::debug!(
            account = %address,
            proposals = ids.len(),
            updated = report.updated.len(),
            failed = report.failed.len(),
            "dashboard refreshed"
        );
        report
    }

    // ── Actions ─────────────────────────────────────────────────────────

    /// Eligibility against current snapshots, for presentation.
    pub fn evaluate(&self, actor: Address, action: &Action) -> Eligibility {
        self.orchestrator.evaluate(actor, action)
    }

    pub fn action_state(&self, key: &ActionKey) -> ActionState {
        self.orchestrator.state(key)
    }

    pub fn begin(&self, actor: Address, action: Action) -> Result<PendingAction<'_>, ActionError> {
        self.orchestrator.begin(actor, action)
    }

    /// Run `action` to completion. [`Engine::shutdown`] ends the finality
    /// wait early.
    pub async fn invoke(&self, actor: Address, action: Action) -> Result<ActionOutcome, ActionError> {
        self.invoke_cancellable(actor, action, self.cancellation_token())
            .await
    }

    pub async fn invoke_cancellable(
        &self,
        actor: Address,
        action: Action,
        cancel: CancellationToken,
    ) -> Result<ActionOutcome, ActionError> {
        self.orchestrator
            .invoke_cancellable(actor, action, cancel)
            .await
    }

    /// A token cancelled by [`Engine::shutdown`] and cancellable on its own.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.shutdown.child_token()
    }

    /// Stop every finality wait started from this engine's tokens.
    /// Submitted transactions are not affected.
    pub fn shutdown(&self) {
        tracing::info!(in_flight = self.orchestrator.in_flight(), "engine shutting down");
        self.shutdown.cancel();
    }
}
