use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use tracing::{debug, error, info, instrument, warn};

use super::types::{
    ConnectionHealth, ModuleHealth, OverallHealth, WatchdogSnapshot, WatchdogStatus,
};
use crate::common::clock::SharedClock;
use crate::common::scheduler::{CancelHandle, Scheduler};
use crate::common::store::{load_typed, save_typed, SharedStore, WATCHDOG_STATE_KEY};
use crate::common::traits::WatchdogHandler;
use crate::common::types::HealthEvent;
use crate::config::WatchdogConfig;

/// Callback work collected under the lock and fired after it is released,
/// so handlers may call back into the watchdog.
#[derive(Debug)]
enum Notice {
    Restart { module: String, restart_count: u32 },
    Unhealthy { module: String, reason: String },
    ConnectionLost { venue: String, attempts: u32 },
    ConnectionRestored { venue: String },
}

#[derive(Debug, Default)]
struct WatchdogState {
    is_active: bool,
    modules: HashMap<String, ModuleHealth>,
    connections: HashMap<String, ConnectionHealth>,
}

struct Inner {
    config: WatchdogConfig,
    clock: SharedClock,
    store: SharedStore,
    handler: Arc<dyn WatchdogHandler>,
    state: Mutex<WatchdogState>,
    timer: Mutex<Option<CancelHandle>>,
}

/// Heartbeat-driven health monitor for trading modules and exchange links
///
/// Cheap to clone; clones share state. Each trading session owns its own
/// instance, so several watchdogs can coexist (one per test, for example).
///
/// # Module lifecycle
///
/// `healthy ⇄ unhealthy`. A module becomes unhealthy after
/// `max_consecutive_errors` errors in a row or after `max_stall_time_ms`
/// without a heartbeat; the next heartbeat or success report makes it
/// healthy again and clears the error count. Stalled modules are restarted
/// through [`WatchdogHandler::on_restart`] with the heartbeat clock reset
/// first, so one stall yields one restart.
#[derive(Clone)]
pub struct HealthWatchdog {
    inner: Arc<Inner>,
}

impl HealthWatchdog {
    /// Create a watchdog, restoring a fresh snapshot from `store` if present
    pub fn new(
        config: WatchdogConfig,
        store: SharedStore,
        clock: SharedClock,
        handler: Arc<dyn WatchdogHandler>,
    ) -> Self {
        let state = Self::restore_state(&config, store.as_ref(), clock.now_ms());
        Self {
            inner: Arc::new(Inner {
                config,
                clock,
                store,
                handler,
                state: Mutex::new(state),
                timer: Mutex::new(None),
            }),
        }
    }

    fn restore_state(
        config: &WatchdogConfig,
        store: &dyn crate::common::store::SnapshotStore,
        now_ms: i64,
    ) -> WatchdogState {
        let snapshot: WatchdogSnapshot = match load_typed(store, WATCHDOG_STATE_KEY) {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => {
                debug!("No watchdog snapshot found, starting empty");
                return WatchdogState::default();
            }
            Err(e) => {
                warn!(error = %e, "Unreadable watchdog snapshot, starting empty");
                return WatchdogState::default();
            }
        };

        if !snapshot.is_fresh(now_ms, config.snapshot_max_age_ms) {
            info!(
                age_ms = now_ms - snapshot.last_check_time,
                max_age_ms = config.snapshot_max_age_ms,
                "Discarding stale watchdog snapshot"
            );
            return WatchdogState::default();
        }

        info!(
            modules = snapshot.modules.len(),
            connections = snapshot.connections.len(),
            "Restored watchdog state from snapshot"
        );
        WatchdogState {
            is_active: false,
            modules: snapshot.modules.into_iter().collect(),
            connections: snapshot.connections.into_iter().collect(),
        }
    }

    fn state(&self) -> MutexGuard<'_, WatchdogState> {
        self.inner.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn now(&self) -> i64 {
        self.inner.clock.now_ms()
    }

    pub fn config(&self) -> &WatchdogConfig {
        &self.inner.config
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Begin periodic health checks on `scheduler`. No-op if already running.
    pub fn start(&self, scheduler: &dyn Scheduler) {
        let mut timer = self.inner.timer.lock().unwrap_or_else(|e| e.into_inner());
        if timer.is_some() {
            debug!("Watchdog already running");
            return;
        }

        self.state().is_active = true;

        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let period = Duration::from_millis(self.inner.config.heartbeat_interval_ms);
        *timer = Some(scheduler.every(
            period,
            Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    HealthWatchdog { inner }.check_health();
                }
            }),
        ));

        info!(
            interval_ms = self.inner.config.heartbeat_interval_ms,
            max_stall_ms = self.inner.config.max_stall_time_ms,
            "Health watchdog started"
        );
    }

    /// Stop periodic checks and persist the current state
    ///
    /// A check already in progress runs to completion.
    pub fn stop(&self) {
        let handle = self
            .inner
            .timer
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(handle) = handle {
            handle.cancel();
        }
        self.state().is_active = false;
        self.persist();
        info!("Health watchdog stopped");
    }

    pub fn is_active(&self) -> bool {
        self.state().is_active
    }

    // ========================================================================
    // Module API
    // ========================================================================

    /// Start tracking a module. Re-registering keeps the existing record.
    pub fn register_module(&self, name: &str) {
        let now = self.now();
        let mut state = self.state();
        if state.modules.contains_key(name) {
            debug!(module = name, "Module already registered");
            return;
        }
        state
            .modules
            .insert(name.to_string(), ModuleHealth::new(name, now));
        info!(module = name, "Module registered with watchdog");
    }

    /// Stop tracking a module. Returns whether it was registered.
    pub fn unregister_module(&self, name: &str) -> bool {
        let removed = self.state().modules.remove(name).is_some();
        if removed {
            info!(module = name, "Module unregistered from watchdog");
        }
        removed
    }

    /// Liveness signal from a module
    pub fn heartbeat(&self, name: &str) {
        let now = self.now();
        let mut state = self.state();
        let Some(module) = state.modules.get_mut(name) else {
            debug!(module = name, "Heartbeat from unregistered module ignored");
            return;
        };
        module.last_heartbeat_at = now;
        Self::mark_recovered(module, "heartbeat");
    }

    /// A module completed a unit of work
    pub fn report_success(&self, name: &str) {
        let now = self.now();
        let mut state = self.state();
        let Some(module) = state.modules.get_mut(name) else {
            debug!(module = name, "Success from unregistered module ignored");
            return;
        };
        module.last_heartbeat_at = now;
        Self::mark_recovered(module, "success");
    }

    /// A module failed a unit of work
    pub fn report_error(&self, name: &str, err: &str) {
        let max_errors = self.inner.config.max_consecutive_errors;
        let notice = {
            let mut state = self.state();
            let Some(module) = state.modules.get_mut(name) else {
                debug!(module = name, "Error from unregistered module ignored");
                return;
            };
            module.consecutive_errors = module.consecutive_errors.saturating_add(1);
            warn!(
                module = name,
                consecutive_errors = module.consecutive_errors,
                error = err,
                "Module reported error"
            );

            if module.healthy && module.consecutive_errors >= max_errors {
                module.healthy = false;
                Some(Notice::Unhealthy {
                    module: name.to_string(),
                    reason: format!("{} consecutive errors, last: {}", module.consecutive_errors, err),
                })
            } else {
                None
            }
        };
        self.dispatch(notice.into_iter().collect());
    }

    fn mark_recovered(module: &mut ModuleHealth, via: &str) {
        if !module.healthy {
            info!(
                module = %module.name,
                via = via,
                restart_count = module.restart_count,
                "Module recovered"
            );
        }
        module.healthy = true;
        module.consecutive_errors = 0;
    }

    // ========================================================================
    // Connection API
    // ========================================================================

    /// Start tracking an exchange connection, assumed connected
    pub fn register_connection(&self, venue: &str) {
        let now = self.now();
        let max_attempts = self.inner.config.max_reconnect_attempts;
        let mut state = self.state();
        if state.connections.contains_key(venue) {
            return;
        }
        state.connections.insert(
            venue.to_string(),
            ConnectionHealth::new(venue, now, max_attempts),
        );
        info!(venue = venue, "Connection registered with watchdog");
    }

    /// Stop tracking a connection. Returns whether it was registered.
    pub fn unregister_connection(&self, venue: &str) -> bool {
        self.state().connections.remove(venue).is_some()
    }

    /// Record an observed connection state
    ///
    /// Only edges matter: `connected → disconnected` counts a reconnect
    /// attempt and fires `on_connection_lost`; `disconnected → connected`
    /// clears the attempt counter and fires `on_connection_restored`.
    pub fn update_connection_status(&self, venue: &str, connected: bool) {
        let now = self.now();
        let notice = {
            let mut state = self.state();
            let Some(conn) = state.connections.get_mut(venue) else {
                debug!(venue = venue, "Status for unregistered connection ignored");
                return;
            };
            conn.last_checked_at = now;

            match (conn.connected, connected) {
                (true, false) => {
                    conn.connected = false;
                    conn.reconnect_attempts = conn.reconnect_attempts.saturating_add(1);
                    if conn.reconnects_exhausted() {
                        error!(
                            venue = venue,
                            attempts = conn.reconnect_attempts,
                            max_attempts = conn.max_reconnect_attempts,
                            "Connection lost, reconnect attempts exhausted"
                        );
                    } else {
                        warn!(
                            venue = venue,
                            attempts = conn.reconnect_attempts,
                            "Connection lost"
                        );
                    }
                    Some(Notice::ConnectionLost {
                        venue: venue.to_string(),
                        attempts: conn.reconnect_attempts,
                    })
                }
                (false, true) => {
                    conn.connected = true;
                    conn.reconnect_attempts = 0;
                    info!(venue = venue, "Connection restored");
                    Some(Notice::ConnectionRestored {
                        venue: venue.to_string(),
                    })
                }
                _ => None,
            }
        };
        self.dispatch(notice.into_iter().collect());
    }

    /// Route a health event from a trading-loop task
    pub fn apply(&self, event: &HealthEvent) {
        match event {
            HealthEvent::Heartbeat { module } => self.heartbeat(module),
            HealthEvent::Success { module } => self.report_success(module),
            HealthEvent::Error { module, error } => self.report_error(module, error),
            HealthEvent::ConnectionStatus { venue, connected } => {
                self.update_connection_status(venue, *connected)
            }
        }
    }

    // ========================================================================
    // Health check cycle
    // ========================================================================

    /// Run one health check cycle and persist a snapshot
    ///
    /// Returns the names of modules restarted in this cycle.
    #[instrument(skip(self))]
    pub fn check_health(&self) -> Vec<String> {
        let now = self.now();
        let config = &self.inner.config;
        let max_stall = config.max_stall_time_ms as i64;

        let notices = {
            let mut state = self.state();
            let mut notices = Vec::new();

            for module in state.modules.values_mut() {
                if module.healthy && module.consecutive_errors >= config.max_consecutive_errors {
                    module.healthy = false;
                    notices.push(Notice::Unhealthy {
                        module: module.name.clone(),
                        reason: format!("{} consecutive errors", module.consecutive_errors),
                    });
                }

                let silence = module.silence_ms(now);
                if silence <= max_stall {
                    continue;
                }

                warn!(
                    module = %module.name,
                    silence_ms = silence,
                    max_stall_ms = max_stall,
                    "Module stalled"
                );
                if module.healthy {
                    module.healthy = false;
                    notices.push(Notice::Unhealthy {
                        module: module.name.clone(),
                        reason: format!("no heartbeat for {silence} ms"),
                    });
                }

                // Reset before restarting so the restart itself is not a new stall.
                module.last_heartbeat_at = now;

                match config.max_restart_attempts {
                    Some(max) if module.restart_count >= max => {
                        error!(
                            module = %module.name,
                            restart_count = module.restart_count,
                            max_restarts = max,
                            "Module stalled but restart ceiling reached"
                        );
                    }
                    _ => {
                        module.restart_count = module.restart_count.saturating_add(1);
                        info!(
                            module = %module.name,
                            restart_count = module.restart_count,
                            "Attempting module restart"
                        );
                        notices.push(Notice::Restart {
                            module: module.name.clone(),
                            restart_count: module.restart_count,
                        });
                    }
                }
            }
            notices
        };

        let restarted = notices
            .iter()
            .filter_map(|notice| match notice {
                Notice::Restart { module, .. } => Some(module.clone()),
                _ => None,
            })
            .collect();

        self.dispatch(notices);
        self.persist();
        restarted
    }

    fn dispatch(&self, notices: Vec<Notice>) {
        let handler = &self.inner.handler;
        for notice in notices {
            match notice {
                Notice::Restart {
                    module,
                    restart_count,
                } => handler.on_restart(&module, restart_count),
                Notice::Unhealthy { module, reason } => {
                    warn!(module = %module, reason = %reason, "Module marked unhealthy");
                    handler.on_unhealthy(&module, &reason)
                }
                Notice::ConnectionLost { venue, attempts } => {
                    handler.on_connection_lost(&venue, attempts)
                }
                Notice::ConnectionRestored { venue } => handler.on_connection_restored(&venue),
            }
        }
    }

    // ========================================================================
    // Status & persistence
    // ========================================================================

    /// Current health of every module and connection
    pub fn get_status(&self) -> WatchdogStatus {
        let state = self.state();

        let mut modules: Vec<ModuleHealth> = state.modules.values().cloned().collect();
        modules.sort_by(|a, b| a.name.cmp(&b.name));
        let mut connections: Vec<ConnectionHealth> = state.connections.values().cloned().collect();
        connections.sort_by(|a, b| a.venue.cmp(&b.venue));

        let overall_health = OverallHealth::classify(
            modules.len(),
            modules.iter().filter(|m| !m.healthy).count(),
            connections.len(),
            connections.iter().filter(|c| !c.connected).count(),
        );

        WatchdogStatus {
            is_active: state.is_active,
            modules,
            connections,
            overall_health,
        }
    }

    pub fn module(&self, name: &str) -> Option<ModuleHealth> {
        self.state().modules.get(name).cloned()
    }

    pub fn connection(&self, venue: &str) -> Option<ConnectionHealth> {
        self.state().connections.get(venue).cloned()
    }

    /// Current state in snapshot form
    pub fn snapshot(&self) -> WatchdogSnapshot {
        let now = self.now();
        let state = self.state();
        let mut modules: Vec<(String, ModuleHealth)> = state
            .modules
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        modules.sort_by(|a, b| a.0.cmp(&b.0));
        let mut connections: Vec<(String, ConnectionHealth)> = state
            .connections
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        connections.sort_by(|a, b| a.0.cmp(&b.0));

        WatchdogSnapshot {
            last_check_time: now,
            modules,
            connections,
        }
    }

    fn persist(&self) {
        let snapshot = self.snapshot();
        if let Err(e) = save_typed(self.inner.store.as_ref(), WATCHDOG_STATE_KEY, &snapshot) {
            warn!(error = %e, "Failed to persist watchdog snapshot");
        }
    }
}
