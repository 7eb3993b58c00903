use std::collections::HashMap;

use proptest::prelude::*;

use civitas_engine::{ActionLocks, ActionState, LockGuard};
use civitas_governance::{ActionKey, ActionKind, TargetId};
use civitas_types::{Address, ProposalId};

fn key(actor: u8, kind: u8, proposal: u64) -> ActionKey {
    let kind = if kind % 2 == 0 {
        ActionKind::Vote
    } else {
        ActionKind::Veto
    };
    ActionKey {
        actor: Address::new([actor; 20]),
        kind,
        target: TargetId::Proposal(ProposalId::new(proposal).unwrap()),
    }
}

#[derive(Clone, Debug)]
enum Op {
    Acquire(u8, u8, u64),
    Release(u8, u8, u64),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u8..3, 0u8..2, 1u64..4).prop_map(|(a, k, p)| Op::Acquire(a, k, p)),
        (0u8..3, 0u8..2, 1u64..4).prop_map(|(a, k, p)| Op::Release(a, k, p)),
    ]
}

proptest! {
    /// Acquire succeeds exactly when no guard for the key is alive, and the
    /// table holds exactly the keys with live guards.
    #[test]
    fn locks_admit_one_holder_per_key(ops in prop::collection::vec(op(), 0..64)) {
        let locks = ActionLocks::new();
        let mut held: HashMap<ActionKey, LockGuard> = HashMap::new();
        for op in ops {
            match op {
                Op::Acquire(a, k, p) => {
                    let k = key(a, k, p);
                    let acquired = locks.try_acquire(k);
                    prop_assert_eq!(acquired.is_some(), !held.contains_key(&k));
                    if let Some(guard) = acquired {
                        held.insert(k, guard);
                    }
                }
                Op::Release(a, k, p) => {
                    let k = key(a, k, p);
                    held.remove(&k);
                    prop_assert_eq!(locks.state(&k), ActionState::Idle);
                }
            }
            prop_assert_eq!(locks.active(), held.len());
        }
    }
}
