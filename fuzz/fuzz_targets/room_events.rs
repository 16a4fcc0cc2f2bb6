//! Fuzz target for multi-user rooms
//!
//! Drives a simulated chat of up to four users with arbitrary operations:
//! joins and departures, channel creation, invitations, chat, votes and
//! garbage on the transport.
//!
//! # Invariants
//!
//! - Every standard room invariant holds after every operation
//! - No operation sequence panics

#![no_main]

use arbitrary::Arbitrary;
use conclave_harness::{InvariantRegistry, Operation, SimNetwork};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct Scenario {
    seed: u64,
    operations: Vec<Operation>,
}

fuzz_target!(|scenario: Scenario| {
    let registry = InvariantRegistry::standard();
    let mut network = SimNetwork::new(scenario.seed);

    for (step, operation) in scenario.operations.iter().take(256).enumerate() {
        operation.apply(&mut network);
        registry.assert_all(&network.snapshot(), &format!("step {step}: {operation:?}"));
    }
});
