//! Execution latency telemetry
//!
//! ```text
//!   PhaseTimer ──► TradeExecutionTiming ──► ExecutionAlerter::check
//!                                               │          │
//!                                     recent alerts    AlertSink (webhook)
//!                                     (ring buffer)    throttled per (kind, phase)
//! ```

mod alerter;
mod timer;
pub mod types;
mod webhook;

pub use alerter::ExecutionAlerter;
pub use timer::PhaseTimer;
pub use types::{
    AlertKind, AlertPayload, AlertTradeData, ExecutionAlert, ExecutionThresholds, Phase, Severity,
    TradeExecutionTiming,
};
pub use webhook::WebhookSink;
