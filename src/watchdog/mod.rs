//! Health watchdog for trading modules and exchange connections
//!
//! Trading-loop modules report liveness through [`HealthWatchdog::heartbeat`],
//! [`HealthWatchdog::report_error`] and [`HealthWatchdog::report_success`]
//! (directly or as [`HealthEvent`](crate::common::types::HealthEvent)s over a
//! channel). A periodic check detects stalls, asks the owner to restart the
//! module and persists a snapshot under `trading-watchdog-state`.

mod monitor;
pub mod types;

pub use monitor::HealthWatchdog;
pub use types::{ConnectionHealth, ModuleHealth, OverallHealth, WatchdogSnapshot, WatchdogStatus};
