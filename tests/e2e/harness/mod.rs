//! E2E test harness for quoteprobe.
//!
//! Some builders and assertion variants are only used by a subset of
//! scenarios.

#![allow(dead_code)]

pub mod assertions;
pub mod runner;
pub mod scenario;

pub use assertions::Assertion;
pub use clock::MockClock;
pub use party::QuotingParty;
pub use rig::{Rig, ALERT, TARGET};
pub use scenario::Scenario;
