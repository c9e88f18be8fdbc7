//! Trading session: owns one instance of every core component
//!
//! Nothing in the crate is a process-wide singleton. A session is built from
//! configuration, started on a [`Scheduler`] and stopped explicitly; two
//! sessions (two tests, say) never share state.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::common::channels::create_health_channel;
use crate::common::clock::{SharedClock, SystemClock};
use crate::common::errors::Result;
use crate::common::scheduler::{CancelHandle, Scheduler};
use crate::common::store::{FileSnapshotStore, SharedStore};
use crate::common::traits::{AlertSink, WatchdogHandler};
use crate::common::types::HealthEvent;
use crate::config::AppConfig;
use crate::profit::{ProfitEngine, ProfitVerdict, TradeContext};
use crate::sandbox::{PaperTestRunner, SandboxEngine};
use crate::telemetry::{ExecutionAlert, ExecutionAlerter, TradeExecutionTiming, WebhookSink};
use crate::watchdog::HealthWatchdog;

type Pump = (oneshot::Sender<()>, JoinHandle<mpsc::Receiver<HealthEvent>>);

pub struct TradingSession {
    config: AppConfig,
    profit: ProfitEngine,
    sandbox: Arc<Mutex<SandboxEngine>>,
    watchdog: HealthWatchdog,
    alerter: Arc<ExecutionAlerter>,
    health_tx: mpsc::Sender<HealthEvent>,
    health_rx: Option<mpsc::Receiver<HealthEvent>>,
    timers: Vec<CancelHandle>,
    pump: Option<Pump>,
}

impl TradingSession {
    /// Build a session from explicit collaborators
    pub fn new(
        config: AppConfig,
        store: SharedStore,
        clock: SharedClock,
        handler: Arc<dyn WatchdogHandler>,
        sink: Option<Arc<dyn AlertSink>>,
    ) -> Self {
        let profit =
            ProfitEngine::new(config.fees.clone()).with_fee_margin(config.profit.fee_margin);
        let sandbox = SandboxEngine::new(&config.sandbox, &config.fees);
        let watchdog = HealthWatchdog::new(
            config.watchdog.clone(),
            store.clone(),
            clock.clone(),
            handler,
        );
        let alerter = ExecutionAlerter::new(config.telemetry.clone(), store, clock, sink);
        let (health_tx, health_rx) = create_health_channel();

        Self {
            config,
            profit,
            sandbox: Arc::new(Mutex::new(sandbox)),
            watchdog,
            alerter: Arc::new(alerter),
            health_tx,
            health_rx: Some(health_rx),
            timers: Vec::new(),
            pump: None,
        }
    }

    /// Build a session persisting to `settings.state_dir` on the system clock,
    /// with a webhook sink when `telemetry.webhook.url` is set
    pub fn from_config(config: AppConfig, handler: Arc<dyn WatchdogHandler>) -> Result<Self> {
        let store: SharedStore = Arc::new(FileSnapshotStore::new(&config.settings.state_dir)?);
        let sink = WebhookSink::from_config(&config.telemetry.webhook)?
            .map(|sink| Arc::new(sink) as Arc<dyn AlertSink>);
        if sink.is_none() {
            info!("No alert webhook configured, alerts stay local");
        }
        Ok(Self::new(config, store, Arc::new(SystemClock), handler, sink))
    }

    /// Start the watchdog, the cooldown pruner and the health-event pump
    ///
    /// No-op if already running. The pump needs a tokio runtime; without one
    /// events queue in the channel until the session is started inside one.
    pub fn start(&mut self, scheduler: &dyn Scheduler) {
        if self.is_running() {
            debug!("Session already running");
            return;
        }

        self.watchdog.start(scheduler);

        let alerter = Arc::downgrade(&self.alerter);
        let prune_every = Duration::from_millis(self.config.telemetry.cooldown_ms.max(1));
        self.timers.push(scheduler.every(
            prune_every,
            Box::new(move || {
                if let Some(alerter) = alerter.upgrade() {
                    let pruned = alerter.prune_cooldowns();
                    if pruned > 0 {
                        debug!(pruned = pruned, "Alert cooldowns expired");
                    }
                }
            }),
        ));

        self.spawn_pump();
        info!("Trading session started");
    }

    fn spawn_pump(&mut self) {
        let Some(mut rx) = self.health_rx.take() else {
            return;
        };
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(e) => {
                error!("Health event pump needs a tokio runtime: {}", e);
                self.health_rx = Some(rx);
                return;
            }
        };

        let watchdog = self.watchdog.clone();
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
        let join = runtime.spawn(async move {
            loop {
                tokio::select! {
                    event = rx.recv() => match event {
                        Some(event) => watchdog.apply(&event),
                        None => break,
                    },
                    _ = &mut shutdown_rx => break,
                }
            }
            // Apply whatever was queued before shutdown
            while let Ok(event) = rx.try_recv() {
                watchdog.apply(&event);
            }
            rx
        });
        self.pump = Some((shutdown_tx, join));
    }

    /// Stop timers, drain queued health events, persist the watchdog and
    /// wait for in-flight alert deliveries
    pub async fn stop(&mut self) {
        for timer in self.timers.drain(..) {
            timer.cancel();
        }

        if let Some((shutdown, join)) = self.pump.take() {
            let _ = shutdown.send(());
            match join.await {
                Ok(rx) => self.health_rx = Some(rx),
                Err(e) => warn!(error = %e, "Health event pump ended abnormally"),
            }
        }

        self.watchdog.stop();
        self.alerter.flush().await;
        info!("Trading session stopped");
    }

    pub fn is_running(&self) -> bool {
        self.watchdog.is_active()
    }

    /// Sender for trading-loop tasks to report heartbeats and errors
    pub fn health_sender(&self) -> mpsc::Sender<HealthEvent> {
        self.health_tx.clone()
    }

    /// The only close gate for live trades
    pub fn evaluate(&self, ctx: &TradeContext) -> ProfitVerdict {
        self.profit.evaluate(ctx)
    }

    /// Check the timing of a completed trade
    pub fn record_execution(&self, timing: &TradeExecutionTiming) -> Vec<ExecutionAlert> {
        self.alerter.check(timing)
    }

    pub fn paper_test_runner(&self) -> PaperTestRunner {
        PaperTestRunner::new(self.config.paper_test.clone(), self.profit.clone())
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn profit_engine(&self) -> &ProfitEngine {
        &self.profit
    }

    pub fn watchdog(&self) -> &HealthWatchdog {
        &self.watchdog
    }

    pub fn alerter(&self) -> &Arc<ExecutionAlerter> {
        &self.alerter
    }

    pub fn sandbox(&self) -> &Arc<Mutex<SandboxEngine>> {
        &self.sandbox
    }
}
