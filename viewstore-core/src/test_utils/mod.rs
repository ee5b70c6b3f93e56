//! Test utilities shared by unit and integration tests
//!
//! Fixtures build databases with an isolated modification tracker so tests
//! running in parallel never observe each other's counters.

pub mod assertions;
pub mod fixtures;

pub use assertions::*;
pub use fixtures::*;
