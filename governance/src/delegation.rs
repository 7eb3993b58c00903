//! Delegation and proxy records.
//!
//! A delegation hands an account's voting weight to a delegate for as long
//! as it stays in place; a proxy may vote on the account's behalf for a
//! fixed window after assignment.

use civitas_types::{Address, Timestamp};
use serde::{Deserialize, Serialize};

/// An account's current delegation as the ledger reports it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegationRecord {
    /// `None` when the ledger holds the zero identity.
    pub delegate: Option<Address>,
    pub start_time: Timestamp,
    /// Never decreases while the delegation is active.
    pub reputation: u64,
}

impl DelegationRecord {
    pub fn from_ledger(delegate: Address, start_time: Timestamp, reputation: u64) -> Self {
        Self {
            delegate: delegate.non_zero(),
            start_time,
            reputation,
        }
    }

    pub fn none() -> Self {
        Self {
            delegate: None,
            start_time: Timestamp::EPOCH,
            reputation: 0,
        }
    }

    pub fn is_active(&self) -> bool {
        self.delegate.is_some()
    }
}

/// An account's proxy assignment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyRecord {
    /// `None` when the ledger holds the zero identity.
    pub proxy: Option<Address>,
    /// Fixed at assignment; re-reading never extends it.
    pub expiry: Timestamp,
}

impl ProxyRecord {
    pub fn from_ledger(proxy: Address, expiry: Timestamp) -> Self {
        Self {
            proxy: proxy.non_zero(),
            expiry,
        }
    }

    pub fn none() -> Self {
        Self {
            proxy: None,
            expiry: Timestamp::EPOCH,
        }
    }

    /// Expiry of a proxy assigned at `assigned_at`.
    pub fn expiry_for(assigned_at: Timestamp, validity_secs: u64) -> Timestamp {
        assigned_at.plus_secs(validity_secs)
    }

    /// A proxy is valid strictly before its expiry.
    pub fn is_valid(&self, now: Timestamp) -> bool {
        self.proxy.is_some() && now < self.expiry
    }

    /// The proxy identity if it can still act.
    pub fn active_proxy(&self, now: Timestamp) -> Option<Address> {
        self.proxy.filter(|_| self.is_valid(now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::PROXY_VALIDITY_SECS;

    #[test]
    fn zero_delegate_means_none() {
        let rec = DelegationRecord::from_ledger(Address::ZERO, Timestamp::new(5), 0);
        assert!(!rec.is_active());
        let rec = DelegationRecord::from_ledger(Address::new([2; 20]), Timestamp::new(5), 3);
        assert_eq!(rec.delegate, Some(Address::new([2; 20])));
    }

    #[test]
    fn proxy_valid_until_expiry() {
        let assigned = Timestamp::new(1_000);
        let expiry = ProxyRecord::expiry_for(assigned, PROXY_VALIDITY_SECS);
        assert_eq!(expiry.as_secs(), 1_000 + 604_800);

        let rec = ProxyRecord::from_ledger(Address::new([3; 20]), expiry);
        assert!(rec.is_valid(Timestamp::new(1_000)));
        assert!(rec.is_valid(Timestamp::new(expiry.as_secs() - 1)));
        assert!(!rec.is_valid(expiry));
        assert_eq!(rec.active_proxy(expiry), None);
    }

    #[test]
    fn zero_proxy_is_never_valid() {
        let rec = ProxyRecord::from_ledger(Address::ZERO, Timestamp::new(u64::MAX));
        assert!(!rec.is_valid(Timestamp::new(0)));
    }
}
