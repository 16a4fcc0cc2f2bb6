//! Operations for model-based testing.
//!
//! Random operation sequences are generated by proptest or the fuzzer and
//! applied to a [`crate::SimNetwork`]; the invariant registry is checked
//! after every step.

mod operation;

pub use operation::{Operation, SmallText, USERS, UserId, user};
