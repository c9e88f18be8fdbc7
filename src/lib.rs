//! Scalper Core Library
//!
//! The decision-making core of an automated crypto micro-scalping bot:
//! a fee-aware profit gate, a health watchdog for trading modules and
//! exchange connections, a paper-trading sandbox and execution latency
//! alerting. Exchange protocols, storage schemas and presentation are
//! collaborators consumed through traits.

pub mod common;
pub mod config;
pub mod profit;
pub mod sandbox;
pub mod session;
pub mod telemetry;
pub mod watchdog;

// Re-export commonly used types
pub use common::clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use common::errors::{CoreError, Result};
pub use common::scheduler::{CancelHandle, ManualScheduler, Scheduler, TokioScheduler};
pub use common::store::{FileSnapshotStore, MemorySnapshotStore, SharedStore, SnapshotStore};
pub use common::traits::{AlertSink, NoopWatchdogHandler, WatchdogHandler};
pub use common::types::{Direction, HealthEvent};
pub use config::types::AppConfig;
pub use session::TradingSession;

// Component types
pub use profit::{FeeKind, FeeSchedule, ProfitEngine, ProfitVerdict, TradeContext, VenueFees};
pub use sandbox::{
    CloseResult, OrderResult, PaperTestResult, PaperTestRunner, PaperTestThresholds,
    SandboxBalance, SandboxEngine, SandboxOrder,
};
pub use telemetry::{
    AlertPayload, ExecutionAlert, ExecutionAlerter, ExecutionThresholds, PhaseTimer,
    TradeExecutionTiming, WebhookSink,
};
pub use watchdog::{HealthWatchdog, OverallHealth, WatchdogStatus};
