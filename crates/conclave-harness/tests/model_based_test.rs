//! Model-based property tests.
//!
//! These tests generate random operation sequences across several users
//! sharing a simulated chat and check the room invariants after every step.
//!
//! # Architecture
//!
//! ```text
//! proptest generates: Vec<Operation>
//!                          │
//!                          ▼
//!                     SimNetwork ──► snapshot ──► InvariantRegistry
//!                 (loopback engines)
//! ```

use arbitrary::{Arbitrary, Unstructured};
use conclave_harness::{InvariantRegistry, Operation, SimNetwork, SmallText, USERS};
use proptest::prelude::*;

/// Strategy for generating SmallText.
fn small_text_strategy() -> impl Strategy<Value = SmallText> {
    (any::<u8>(), any::<bool>()).prop_map(|(seed, command)| SmallText { seed, command })
}

/// Strategy for generating operations.
fn operation_strategy() -> impl Strategy<Value = Operation> {
    let user = 0..USERS.len() as u8;
    let slot = any::<u8>();

    prop_oneof![
        // Weight towards operations that create shared state
        3 => user.clone().prop_map(|user| Operation::Join { user }),
        1 => user.clone().prop_map(|user| Operation::Leave { user }),
        3 => user.clone().prop_map(|user| Operation::CreateChannel { user }),
        1 => user.clone().prop_map(|user| Operation::SearchChannels { user }),
        3 => (user.clone(), user.clone()).prop_map(|(user, invitee)| Operation::Invite { user, invitee }),
        2 => (user.clone(), slot.clone()).prop_map(|(user, slot)| Operation::JoinChannel { user, slot }),
        2 => (user.clone(), slot).prop_map(|(user, slot)| Operation::Focus { user, slot }),
        1 => user.clone().prop_map(|user| Operation::Unfocus { user }),
        3 => (user.clone(), small_text_strategy()).prop_map(|(user, text)| Operation::Chat { user, text }),
        2 => (user.clone(), user.clone()).prop_map(|(user, target)| Operation::Authorize { user, target }),
        1 => (user, any::<u8>()).prop_map(|(user, seed)| Operation::Garbage { user, seed }),
        1 => (0u8..60).prop_map(|seconds| Operation::AdvanceTime { seconds }),
    ]
}

fn run(seed: u64, ops: &[Operation]) -> SimNetwork {
    let registry = InvariantRegistry::standard();
    let mut network = SimNetwork::new(seed);
    for (i, op) in ops.iter().enumerate() {
        op.apply(&mut network);
        registry.assert_all(&network.snapshot(), &format!("after operation {i}: {op:?}"));
    }
    network
}

proptest! {
    /// Invariants hold after every operation of any sequence.
    #[test]
    fn prop_invariants_hold(
        seed in any::<u64>(),
        ops in prop::collection::vec(operation_strategy(), 0..60)
    ) {
        run(seed, &ops);
    }

    /// The same seed and operations produce the same observable history.
    #[test]
    fn prop_simulation_is_deterministic(
        seed in any::<u64>(),
        ops in prop::collection::vec(operation_strategy(), 0..30)
    ) {
        let first = run(seed, &ops);
        let second = run(seed, &ops);

        prop_assert_eq!(first.delivered(), second.delivered());
        for user in first.users() {
            let a = first.session(user).unwrap();
            let b = second.session(user).unwrap();
            prop_assert_eq!(a.presentation().shown(), b.presentation().shown());
            prop_assert_eq!(a.room().identity().public_key(), b.room().identity().public_key());
        }
    }

    /// Once everyone has left the chat, nothing is left behind.
    #[test]
    fn prop_everyone_leaving_clears_network(
        ops in prop::collection::vec(operation_strategy(), 0..40)
    ) {
        let mut network = run(7, &ops);
        let users: Vec<String> = network.users().map(str::to_owned).collect();
        for user in &users {
            let session = network.leave(user).unwrap();
            prop_assert_eq!(session.room().channel_count(), 0);
            prop_assert!(!session.room().is_started());
            prop_assert!(session.engine().is_none());
        }
        prop_assert_eq!(network.users().count(), 0);
    }
}

#[test]
fn arbitrary_bytes_drive_the_model() {
    let bytes: Vec<u8> = (0..2048u32).map(|i| (i.wrapping_mul(2_654_435_761) >> 13) as u8).collect();
    let mut input = Unstructured::new(&bytes);
    let mut ops = Vec::new();
    while let Ok(op) = Operation::arbitrary(&mut input) {
        ops.push(op);
        if input.is_empty() {
            break;
        }
    }
    assert!(!ops.is_empty());
    run(11, &ops);
}
