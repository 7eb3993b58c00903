//! Per-key action locks.
//!
//! At most one action per [`ActionKey`] is in flight. Actions on different
//! keys proceed independently; a second request on a held key is refused
//! immediately rather than queued.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use civitas_governance::ActionKey;

/// Where an action is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ActionState {
    Idle,
    Locked,
    Submitted,
    AwaitingFinality,
    Refreshing,
}

impl fmt::Display for ActionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::Locked => "locked",
            Self::Submitted => "submitted",
            Self::AwaitingFinality => "awaiting_finality",
            Self::Refreshing => "refreshing",
        })
    }
}

/// Table of held keys and the state of the action holding each one.
/// An absent key is idle.
#[derive(Clone, Default)]
pub struct ActionLocks {
    held: Arc<Mutex<HashMap<ActionKey, ActionState>>>,
}

impl ActionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self) -> MutexGuard<'_, HashMap<ActionKey, ActionState>> {
        self.held.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Take the lock for `key`, or `None` if it is already held.
    pub fn try_acquire(&self, key: ActionKey) -> Option<LockGuard> {
        let mut table = self.table();
        if table.contains_key(&key) {
            return None;
        }
        table.insert(key, ActionState::Locked);
        Some(LockGuard {
            locks: self.clone(),
            key,
        })
    }

    pub fn state(&self, key: &ActionKey) -> ActionState {
        self.table().get(key).copied().unwrap_or(ActionState::Idle)
    }

    /// Number of keys currently held.
    pub fn active(&self) -> usize {
        self.table().len()
    }
}

/// Holds one key until dropped. Dropping returns the key to idle on every
/// path, including errors and cancellation.
pub struct LockGuard {
    locks: ActionLocks,
    key: ActionKey,
}

impl LockGuard {
    pub fn key(&self) -> &ActionKey {
        &self.key
    }

    pub fn set_state(&self, state: ActionState) {
        let previous = self.locks.table().insert(self.key, state);
        tracing::debug!(
            key = %self.key,
            from = %previous.unwrap_or(ActionState::Idle),
            to = %state,
            "action state"
        );
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        self.locks.table().remove(&self.key);
        tracing::debug!(key = %self.key, to = %ActionState::Idle, "action state");
    }
}

impl fmt::Debug for LockGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockGuard").field("key", &self.key).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use civitas_governance::{ActionKind, TargetId};
    use civitas_types::{Address, ProposalId};

    fn key(actor: u8, kind: ActionKind, proposal: u64) -> ActionKey {
        ActionKey {
            actor: Address::new([actor; 20]),
            kind,
            target: TargetId::Proposal(ProposalId::new(proposal).unwrap()),
        }
    }

    #[test]
    fn second_acquire_on_same_key_is_refused() {
        let locks = ActionLocks::new();
        let k = key(1, ActionKind::Vote, 5);
        let guard = locks.try_acquire(k).unwrap();
        assert!(locks.try_acquire(k).is_none());
        assert_eq!(locks.state(&k), ActionState::Locked);
        drop(guard);
        assert_eq!(locks.state(&k), ActionState::Idle);
        assert!(locks.try_acquire(k).is_some());
    }

    #[test]
    fn distinct_keys_are_independent() {
        let locks = ActionLocks::new();
        let _a = locks.try_acquire(key(1, ActionKind::Vote, 5)).unwrap();
        let _b = locks.try_acquire(key(2, ActionKind::Vote, 5)).unwrap();
        let _c = locks.try_acquire(key(1, ActionKind::Veto, 5)).unwrap();
        let _d = locks.try_acquire(key(1, ActionKind::Vote, 6)).unwrap();
        assert_eq!(locks.active(), 4);
    }

    #[test]
    fn guard_tracks_state_transitions() {
        let locks = ActionLocks::new();
        let k = key(1, ActionKind::Execute, 2);
        let guard = locks.try_acquire(k).unwrap();
        for state in [
            ActionState::Submitted,
            ActionState::AwaitingFinality,
            ActionState::Refreshing,
        ] {
            guard.set_state(state);
            assert_eq!(locks.state(&k), state);
            assert!(locks.try_acquire(k).is_none());
        }
        drop(guard);
        assert_eq!(locks.active(), 0);
    }

    #[tokio::test]
    async fn guard_released_when_task_is_aborted() {
        let locks = ActionLocks::new();
        let k = key(3, ActionKind::Vote, 1);
        let guard = locks.try_acquire(k).unwrap();
        let task = tokio::spawn(async move {
            let _held = guard;
            std::future::pending::<()>().await;
        });
        tokio::task::yield_now().await;
        assert_eq!(locks.state(&k), ActionState::Locked);
        task.abort();
        assert!(task.await.unwrap_err().is_cancelled());
        assert_eq!(locks.state(&k), ActionState::Idle);
    }
}
