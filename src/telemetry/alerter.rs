use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::types::{AlertKind, AlertPayload, ExecutionAlert, ExecutionThresholds, Phase, TradeExecutionTiming};
use crate::common::clock::SharedClock;
use crate::common::errors::Result;
use crate::common::store::{load_typed, save_typed, SharedStore, EXECUTION_THRESHOLDS_KEY};
use crate::common::traits::AlertSink;
use crate::config::TelemetryConfig;

/// Cooldown bucket: alert kind plus phase name or `"total"`
type CooldownKey = (AlertKind, &'static str);

#[derive(Debug)]
struct AlerterState {
    thresholds: ExecutionThresholds,
    alerts: VecDeque<ExecutionAlert>,
    seen: HashSet<String>,
    seen_order: VecDeque<String>,
    last_dispatch: HashMap<CooldownKey, i64>,
    dispatched: u64,
    alert_seq: u64,
}

/// Compares trade phase durations against thresholds and throttles
/// outbound notifications
///
/// Every trade id is checked once. Raised alerts go into a ring buffer of
/// the most recent `max_alerts`; alerts whose kind is enabled for the sink
/// are forwarded at most once per cooldown window per `(kind, phase)`.
/// Delivery is fire-and-forget on the current tokio runtime.
pub struct ExecutionAlerter {
    config: TelemetryConfig,
    clock: SharedClock,
    store: SharedStore,
    sink: Option<Arc<dyn AlertSink>>,
    state: Mutex<AlerterState>,
    in_flight: Mutex<Vec<JoinHandle<()>>>,
}

impl ExecutionAlerter {
    /// Create an alerter. Persisted thresholds win over `config.thresholds`.
    pub fn new(
        config: TelemetryConfig,
        store: SharedStore,
        clock: SharedClock,
        sink: Option<Arc<dyn AlertSink>>,
    ) -> Self {
        let thresholds = match load_typed::<ExecutionThresholds>(store.as_ref(), EXECUTION_THRESHOLDS_KEY) {
            Ok(Some(saved)) => {
                info!(total_ms = saved.total_ms, "Loaded persisted execution thresholds");
                saved
            }
            Ok(None) => config.thresholds,
            Err(e) => {
                warn!(error = %e, "Unreadable execution thresholds, using configured values");
                config.thresholds
            }
        };

        let capacity = config.max_alerts;
        Self {
            config,
            clock,
            store,
            sink,
            state: Mutex::new(AlerterState {
                thresholds,
                alerts: VecDeque::with_capacity(capacity),
                seen: HashSet::new(),
                seen_order: VecDeque::new(),
                last_dispatch: HashMap::new(),
                dispatched: 0,
                alert_seq: 0,
            }),
            in_flight: Mutex::new(Vec::new()),
        }
    }

    fn state(&self) -> MutexGuard<'_, AlerterState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn sink_enabled_for(&self, kind: AlertKind) -> bool {
        self.sink.is_some()
            && match kind {
                AlertKind::SlowTotal => self.config.webhook.on_slow_total,
                AlertKind::SlowPhase => self.config.webhook.on_slow_phase,
            }
    }

    /// Check a completed trade and return the alerts it raised
    ///
    /// A trade id seen before yields nothing.
    pub fn check(&self, trade: &TradeExecutionTiming) -> Vec<ExecutionAlert> {
        let now = self.clock.now_ms();
        let mut payloads = Vec::new();

        let raised = {
            let mut state = self.state();
            if state.seen.contains(&trade.trade_id) {
                debug!(trade_id = %trade.trade_id, "Trade already checked");
                return Vec::new();
            }
            self.remember(&mut state, &trade.trade_id);

            let thresholds = state.thresholds;
            if !thresholds.enable_alerts {
                return Vec::new();
            }

            let mut raised = Vec::new();
            let total = trade.total_ms();
            if total > thresholds.total_ms {
                raised.push(Self::build_alert(
                    &mut state,
                    trade,
                    AlertKind::SlowTotal,
                    None,
                    total,
                    thresholds.total_ms,
                    now,
                ));
            }
            for phase in Phase::ALL {
                let duration = trade.phase_ms(phase);
                let limit = thresholds.for_phase(phase);
                if duration > limit {
                    raised.push(Self::build_alert(
                        &mut state,
                        trade,
                        AlertKind::SlowPhase,
                        Some(phase),
                        duration,
                        limit,
                        now,
                    ));
                }
            }

            for alert in &raised {
                warn!(
                    trade_id = %alert.trade_id,
                    kind = %alert.kind,
                    scope = alert.scope(),
                    duration_ms = alert.duration_ms,
                    threshold_ms = alert.threshold_ms,
                    "Slow trade execution"
                );

                if state.alerts.len() >= self.config.max_alerts {
                    state.alerts.pop_front();
                }
                if self.config.max_alerts > 0 {
                    state.alerts.push_back(alert.clone());
                }

                if !self.sink_enabled_for(alert.kind) {
                    continue;
                }
                let key: CooldownKey = (alert.kind, alert.scope());
                let cooling = state
                    .last_dispatch
                    .get(&key)
                    .is_some_and(|last| now - last < self.config.cooldown_ms as i64);
                if cooling {
                    debug!(kind = %alert.kind, scope = alert.scope(), "Alert dispatch throttled");
                    continue;
                }
                state.last_dispatch.insert(key, now);
                state.dispatched += 1;
                payloads.push(AlertPayload::from(alert));
            }
            raised
        };

        for payload in payloads {
            self.dispatch(payload);
        }
        raised
    }

    fn remember(&self, state: &mut AlerterState, trade_id: &str) {
        if self.config.max_tracked_trades > 0 && state.seen_order.len() >= self.config.max_tracked_trades {
            if let Some(oldest) = state.seen_order.pop_front() {
                state.seen.remove(&oldest);
            }
        }
        state.seen.insert(trade_id.to_string());
        state.seen_order.push_back(trade_id.to_string());
    }

    fn build_alert(
        state: &mut AlerterState,
        trade: &TradeExecutionTiming,
        kind: AlertKind,
        phase: Option<Phase>,
        duration_ms: u64,
        threshold_ms: u64,
        now: i64,
    ) -> ExecutionAlert {
        state.alert_seq += 1;
        ExecutionAlert {
            id: format!("alert-{}-{}", now, state.alert_seq),
            kind,
            phase,
            duration_ms,
            threshold_ms,
            trade_id: trade.trade_id.clone(),
            venue: trade.venue.clone(),
            pair: trade.pair.clone(),
            timestamp: now,
        }
    }

    fn dispatch(&self, payload: AlertPayload) {
        let Some(sink) = self.sink.clone() else {
            return;
        };
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                warn!(sink = sink.name(), "No async runtime, alert not delivered");
                return;
            }
        };

        let task = handle.spawn(async move {
            if let Err(e) = sink.send(&payload).await {
                warn!(
                    sink = sink.name(),
                    alert_type = %payload.alert_type,
                    trade_id = %payload.trade_data.trade_id,
                    error = %e,
                    "Alert delivery failed"
                );
            }
        });

        let mut in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        in_flight.retain(|h| !h.is_finished());
        in_flight.push(task);
    }

    /// Wait for deliveries already handed to the sink
    pub async fn flush(&self) {
        let pending: Vec<JoinHandle<()>> = {
            let mut in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
            std::mem::take(&mut *in_flight)
        };
        for task in pending {
            if let Err(e) = task.await {
                warn!(error = %e, "Alert delivery task aborted");
            }
        }
    }

    /// Forget cooldowns whose window has passed. Returns how many were removed.
    pub fn prune_cooldowns(&self) -> usize {
        let now = self.clock.now_ms();
        let window = self.config.cooldown_ms as i64;
        let mut state = self.state();
        let before = state.last_dispatch.len();
        state.last_dispatch.retain(|_, last| now - *last < window);
        before - state.last_dispatch.len()
    }

    /// Replace the thresholds and persist them
    ///
    /// The new values apply even if persisting fails.
    pub fn update_thresholds(&self, thresholds: ExecutionThresholds) -> Result<()> {
        self.state().thresholds = thresholds;
        info!(
            total_ms = thresholds.total_ms,
            enable_alerts = thresholds.enable_alerts,
            "Execution thresholds updated"
        );
        save_typed(self.store.as_ref(), EXECUTION_THRESHOLDS_KEY, &thresholds)
    }

    pub fn thresholds(&self) -> ExecutionThresholds {
        self.state().thresholds
    }

    /// Most recent alerts, oldest first
    pub fn recent_alerts(&self) -> Vec<ExecutionAlert> {
        self.state().alerts.iter().cloned().collect()
    }

    pub fn clear_alerts(&self) {
        self.state().alerts.clear();
    }

    /// Alerts handed to the sink so far
    pub fn dispatch_count(&self) -> u64 {
        self.state().dispatched
    }

    pub fn config(&self) -> &TelemetryConfig {
        &self.config
    }
}
