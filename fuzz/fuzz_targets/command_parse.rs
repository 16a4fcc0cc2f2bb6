//! Fuzz target for Command::parse
//!
//! Typed chat lines reach the parser unfiltered, so it must never panic.
//!
//! # Invariants
//!
//! - Invalid input returns an error
//! - A parsed command prints back to text that parses to the same command

#![no_main]

use conclave_core::Command;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|text: &str| {
    if let Ok(command) = Command::parse(text) {
        let printed = command.to_string();
        assert_eq!(Command::parse(&printed), Ok(command), "reprinted as {printed:?}");
    }
});
