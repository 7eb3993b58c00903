//! The ledger interface this client consumes.
//!
//! Implemented outside this workspace (wallet/provider bindings) and by
//! `civitas-nullables` for tests. Every call is a suspension point.

use async_trait::async_trait;
use civitas_governance::{DelegationRecord, ProposalFields, ProxyRecord};
use civitas_types::{Address, ProposalId, TokenAmount, TxRef};
use futures_util::future::join_all;

use crate::error::LedgerError;

/// Resolution of a submitted transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Finality {
    Finalized,
    /// Reverted on the ledger; carries the ledger's reason.
    Rejected(String),
}

/// Typed access to the governance ledger.
///
/// Writes are signed by `from` and return as soon as the transaction is
/// accepted for inclusion; [`LedgerClient::await_finality`] resolves it.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    // ── Reads ───────────────────────────────────────────────────────────

    async fn get_proposal(&self, id: ProposalId) -> Result<ProposalFields, LedgerError>;

    async fn is_citizen(&self, address: Address) -> Result<bool, LedgerError>;

    async fn has_voted(&self, id: ProposalId, address: Address) -> Result<bool, LedgerError>;

    async fn has_vetoed(&self, id: ProposalId, address: Address) -> Result<bool, LedgerError>;

    async fn total_citizens(&self) -> Result<u64, LedgerError>;

    async fn proposal_count(&self) -> Result<u64, LedgerError>;

    async fn token_balance(&self, address: Address) -> Result<TokenAmount, LedgerError>;

    async fn allowance(&self, owner: Address, spender: Address)
        -> Result<TokenAmount, LedgerError>;

    async fn delegation_of(&self, address: Address) -> Result<DelegationRecord, LedgerError>;

    async fn proxy_of(&self, address: Address) -> Result<ProxyRecord, LedgerError>;

    // ── Batched reads ───────────────────────────────────────────────────
    //
    // One result per requested item, in request order. Clients with a
    // native multicall override these.

    async fn get_proposals(
        &self,
        ids: &[ProposalId],
    ) -> Vec<Result<ProposalFields, LedgerError>> {
        join_all(ids.iter().map(|id| self.get_proposal(*id))).await
    }

    async fn vote_flags(
        &self,
        ids: &[ProposalId],
        address: Address,
    ) -> Vec<(Result<bool, LedgerError>, Result<bool, LedgerError>)> {
        join_all(ids.iter().map(|id| async move {
            (
                self.has_voted(*id, address).await,
                self.has_vetoed(*id, address).await,
            )
        }))
        .await
    }

    // ── Writes ──────────────────────────────────────────────────────────

    async fn vote(
        &self,
        from: Address,
        id: ProposalId,
        support: bool,
        credits: u64,
    ) -> Result<TxRef, LedgerError>;

    async fn veto(&self, from: Address, id: ProposalId) -> Result<TxRef, LedgerError>;

    async fn execute_proposal(&self, from: Address, id: ProposalId)
        -> Result<TxRef, LedgerError>;

    /// Non-budget proposals pass the zero identity and a zero amount.
    async fn create_proposal(
        &self,
        from: Address,
        description: &str,
        category: u8,
        target: Address,
        allocated_amount: TokenAmount,
    ) -> Result<TxRef, LedgerError>;

    async fn register_citizen(&self, from: Address) -> Result<TxRef, LedgerError>;

    async fn approve(
        &self,
        from: Address,
        spender: Address,
        amount: TokenAmount,
    ) -> Result<TxRef, LedgerError>;

    async fn delegate_to(&self, from: Address, delegate: Address) -> Result<TxRef, LedgerError>;

    async fn revoke_delegation(&self, from: Address) -> Result<TxRef, LedgerError>;

    async fn assign_proxy(&self, from: Address, proxy: Address) -> Result<TxRef, LedgerError>;

    // ── Finality ────────────────────────────────────────────────────────

    async fn await_finality(&self, tx: TxRef) -> Result<Finality, LedgerError>;
}
