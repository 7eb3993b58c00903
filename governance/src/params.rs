//! Client-side governance constants.
//!
//! These mirror values the ledger enforces. The client only uses them to
//! predict outcomes and word notices; it never substitutes them for the
//! ledger's own arithmetic.

use serde::{Deserialize, Serialize};

/// Seven days, the fixed validity of a proxy assignment.
pub const PROXY_VALIDITY_SECS: u64 = 7 * 24 * 60 * 60;

/// Basis points in a whole; `vote_burn_bps` may not exceed it.
pub const BPS_DENOMINATOR: u32 = 10_000;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GovernanceParams {
    /// Credits beyond this are not counted by the ledger.
    #[serde(default = "default_vote_credit_cap")]
    pub vote_credit_cap: u64,

    /// Share of submitted credits burned on every vote, in basis points,
    /// at most [`BPS_DENOMINATOR`].
    #[serde(default = "default_vote_burn_bps")]
    pub vote_burn_bps: u32,
}

fn default_vote_credit_cap() -> u64 {
    100
}

fn default_vote_burn_bps() -> u32 {
    500
}

impl Default for GovernanceParams {
    fn default() -> Self {
        Self {
            vote_credit_cap: default_vote_credit_cap(),
            vote_burn_bps: default_vote_burn_bps(),
        }
    }
}
