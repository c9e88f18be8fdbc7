//! Phase timing for live trades
//!
//! A [`PhaseTimer`] follows one trade through its execution phases and
//! produces the [`TradeExecutionTiming`] the alerter checks. Starting a phase
//! closes the one in progress, so a trading loop can simply call `start` at
//! each stage boundary.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tracing::trace;

use super::types::{Phase, TradeExecutionTiming};

#[derive(Debug)]
pub struct PhaseTimer {
    timing: TradeExecutionTiming,
    current: Option<(Phase, Instant)>,
}

impl PhaseTimer {
    pub fn new(trade_id: impl Into<String>, venue: impl Into<String>, pair: impl Into<String>) -> Self {
        Self {
            timing: TradeExecutionTiming::new(trade_id, venue, pair),
            current: None,
        }
    }

    /// Begin timing `phase`, ending the phase in progress
    pub fn start(&mut self, phase: Phase) {
        self.end();
        self.current = Some((phase, Instant::now()));
    }

    /// End the phase in progress and return its duration
    pub fn end(&mut self) -> Option<Duration> {
        let (phase, started) = self.current.take()?;
        let elapsed = started.elapsed();
        self.record(phase, elapsed);
        Some(elapsed)
    }

    /// Add a duration measured elsewhere. Repeated phases accumulate.
    pub fn record(&mut self, phase: Phase, elapsed: Duration) {
        let ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        let slot = self.timing.phase_slot(phase);
        *slot = slot.saturating_add(ms);
        trace!(trade_id = %self.timing.trade_id, phase = %phase, ms = ms, "Phase timed");
    }

    /// Time a synchronous closure as `phase`
    pub fn time<T>(&mut self, phase: Phase, f: impl FnOnce() -> T) -> T {
        self.start(phase);
        let result = f();
        self.end();
        result
    }

    /// Time a future as `phase`
    pub async fn time_async<F: Future>(&mut self, phase: Phase, future: F) -> F::Output {
        self.start(phase);
        let result = future.await;
        self.end();
        result
    }

    /// Phase currently being timed
    pub fn current_phase(&self) -> Option<Phase> {
        self.current.map(|(phase, _)| phase)
    }

    /// Close any open phase and return the measurements
    pub fn finish(mut self) -> TradeExecutionTiming {
        self.end();
        self.timing
    }
}
