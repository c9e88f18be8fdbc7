//! Trait definitions for the seams between the core and its collaborators

use async_trait::async_trait;

use super::errors::Result;
use crate::telemetry::types::AlertPayload;

/// Callbacks fired by the health watchdog
///
/// Implemented by whatever owns the trading modules (usually the session).
/// Callbacks run synchronously inside a health check cycle, so they should
/// hand off real work (spawning tasks, reconnecting sockets) and return fast.
#[cfg_attr(test, mockall::automock)]
pub trait WatchdogHandler: Send + Sync {
    /// A stalled module should be restarted
    ///
    /// # Arguments
    /// * `module` - Name the module was registered under
    /// * `restart_count` - Restart attempts so far, including this one
    fn on_restart(&self, module: &str, restart_count: u32);

    /// A module crossed into the unhealthy state
    fn on_unhealthy(&self, _module: &str, _reason: &str) {}

    /// A connection went from connected to disconnected
    fn on_connection_lost(&self, _venue: &str, _reconnect_attempts: u32) {}

    /// A connection went from disconnected back to connected
    fn on_connection_restored(&self, _venue: &str) {}
}

/// Handler that only logs through the watchdog itself
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopWatchdogHandler;

impl WatchdogHandler for NoopWatchdogHandler {
    fn on_restart(&self, _module: &str, _restart_count: u32) {}
}

/// Outbound destination for execution alerts (webhook, chat bot, ...)
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AlertSink: Send + Sync {
    /// Deliver one alert. Errors are logged by the caller and never retried.
    async fn send(&self, payload: &AlertPayload) -> Result<()>;

    /// Short name for logs
    fn name(&self) -> &'static str;
}
