//! Periodic task scheduling
//!
//! Components never own timers directly. A session asks a [`Scheduler`] to run
//! a callback every `period` and keeps the returned [`CancelHandle`]; dropping or
//! cancelling the handle stops future runs. A run that has already started is
//! never interrupted because tasks are synchronous closures.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error};

/// A periodic unit of work
pub type Task = Box<dyn FnMut() + Send + 'static>;

/// Something that can run a task on a fixed period
pub trait Scheduler: Send + Sync {
    /// Run `task` every `period`, starting one period from now
    fn every(&self, period: Duration, task: Task) -> CancelHandle;
}

/// Handle to a scheduled task. Dropping it cancels the task.
#[derive(Debug, Default)]
pub struct CancelHandle {
    shutdown: Option<oneshot::Sender<()>>,
    join: Option<JoinHandle<()>>,
}

impl CancelHandle {
    fn new(shutdown: oneshot::Sender<()>, join: Option<JoinHandle<()>>) -> Self {
        Self {
            shutdown: Some(shutdown),
            join,
        }
    }

    /// A handle attached to nothing
    pub fn inert() -> Self {
        Self::default()
    }

    /// Stop future runs
    pub fn cancel(mut self) {
        self.stop();
    }

    /// Whether the task can still fire
    pub fn is_active(&self) -> bool {
        match (&self.shutdown, &self.join) {
            (Some(tx), Some(join)) => !tx.is_closed() && !join.is_finished(),
            (Some(tx), None) => !tx.is_closed(),
            _ => false,
        }
    }

    fn stop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for CancelHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Scheduler backed by tokio intervals
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioScheduler;

impl Scheduler for TokioScheduler {
    fn every(&self, period: Duration, mut task: Task) -> CancelHandle {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(e) => {
                error!("Cannot schedule periodic task outside a tokio runtime: {}", e);
                return CancelHandle::inert();
            }
        };

        let join = handle.spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => task(),
                    _ = &mut shutdown_rx => {
                        debug!("Periodic task cancelled");
                        break;
                    }
                }
            }
        });

        CancelHandle::new(shutdown_tx, Some(join))
    }
}

/// Scheduler that only runs tasks when told to
///
/// Useful for driving timer-based components deterministically.
#[derive(Clone, Default)]
pub struct ManualScheduler {
    tasks: Arc<Mutex<Vec<ManualEntry>>>,
}

struct ManualEntry {
    period: Duration,
    task: Task,
    shutdown: oneshot::Receiver<()>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run every still-active task once. Returns how many ran.
    pub fn run_pending(&self) -> usize {
        let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        tasks.retain_mut(|entry| {
            !matches!(
                entry.shutdown.try_recv(),
                Ok(()) | Err(oneshot::error::TryRecvError::Closed)
            )
        });
        for entry in tasks.iter_mut() {
            (entry.task)();
        }
        tasks.len()
    }

    /// Periods of the tasks registered so far
    pub fn periods(&self) -> Vec<Duration> {
        let tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        tasks.iter().map(|entry| entry.period).collect()
    }
}

impl Scheduler for ManualScheduler {
    fn every(&self, period: Duration, task: Task) -> CancelHandle {
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        tasks.push(ManualEntry {
            period,
            task,
            shutdown: shutdown_rx,
        });
        CancelHandle::new(shutdown_tx, None)
    }
}
