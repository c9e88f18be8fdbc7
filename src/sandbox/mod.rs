//! Paper-trading simulation
//!
//! [`SandboxEngine`] stands in for real exchanges: one [`SandboxExchange`]
//! per configured venue, each owning its own [`SandboxLedger`]. Exchanges take
//! `&mut self`, so a ledger is only ever mutated by its owner; callers sharing
//! an engine across tasks wrap it in a mutex.
//!
//! [`PaperTestRunner`] replays a synthetic price series to validate signal
//! thresholds before they reach a live venue.

mod engine;
mod exchange;
pub mod paper_test;
pub mod types;

pub use engine::SandboxEngine;
pub use exchange::{SandboxExchange, SandboxLedger};
pub use paper_test::{
    FailureCount, PaperTestResult, PaperTestRunner, PaperTestThresholds, SkipReason,
};
pub use types::{CloseResult, OrderResult, SandboxBalance, SandboxOrder, SandboxPosition};
