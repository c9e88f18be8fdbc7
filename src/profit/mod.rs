//! Fee model and the profit/close decision engine
//!
//! ```text
//!   price tick ──► TradeContext ──► ProfitEngine::evaluate ──► ProfitVerdict
//!                                        │                      │
//!                                   FeeSchedule           should_close?
//!                                                                │
//!                                              order-management collaborator
//! ```
//!
//! [`ProfitEngine::evaluate`] is the only place that decides whether a trade
//! is profitable enough to close. A close is allowed when
//! `net_profit >= max(min_profit_threshold, total_fees * 1.5)`, so fee noise
//! alone can never trigger an exit.

mod engine;
mod fees;

pub use engine::{ProfitEngine, ProfitVerdict, TradeContext, DEFAULT_FEE_MARGIN};
pub use fees::{FeeKind, FeeSchedule, VenueFees};
