//! Ledger-assigned identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A proposal id. Assigned by the ledger starting at 1, never reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProposalId(u64);

impl ProposalId {
    /// Returns `None` for zero, which the ledger never assigns.
    pub fn new(id: u64) -> Option<Self> {
        (id > 0).then_some(Self(id))
    }

    pub fn get(&self) -> u64 {
        self.0
    }

    /// Ids `count, count-1, ..., 1`, newest first, at most `limit` of them.
    pub fn newest(count: u64, limit: usize) -> Vec<Self> {
        (1..=count).rev().take(limit).map(Self).collect()
    }
}

impl fmt::Display for ProposalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_is_not_an_id() {
        assert!(ProposalId::new(0).is_none());
        assert_eq!(ProposalId::new(3).map(|id| id.get()), Some(3));
    }

    #[test]
    fn newest_window() {
        let ids: Vec<u64> = ProposalId::newest(9, 6).iter().map(|i| i.get()).collect();
        assert_eq!(ids, vec![9, 8, 7, 6, 5, 4]);
        let ids: Vec<u64> = ProposalId::newest(2, 6).iter().map(|i| i.get()).collect();
        assert_eq!(ids, vec![2, 1]);
        assert!(ProposalId::newest(0, 6).is_empty());
    }
}
