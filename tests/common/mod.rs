//! Common test utilities and fixtures

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use rust_decimal_macros::dec;
use scalper_core::common::clock::ManualClock;
use scalper_core::common::store::MemorySnapshotStore;
use scalper_core::telemetry::Phase;
use scalper_core::{Direction, TradeContext, TradeExecutionTiming, WatchdogHandler};

/// Fixed start time for manual clocks
pub const T0: i64 = 1_704_067_200_000;

pub fn manual_clock() -> ManualClock {
    ManualClock::new(T0)
}

pub fn memory_store() -> MemorySnapshotStore {
    MemorySnapshotStore::new()
}

/// Callback observed by [`RecordingHandler`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Callback {
    Restart(String, u32),
    Unhealthy(String),
    ConnectionLost(String, u32),
    ConnectionRestored(String),
}

/// Watchdog handler that records every callback in order
#[derive(Debug, Clone, Default)]
pub struct RecordingHandler {
    calls: Arc<Mutex<Vec<Callback>>>,
}

impl RecordingHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<Callback> {
        self.calls.lock().unwrap().clone()
    }

    pub fn restarts(&self) -> Vec<(String, u32)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Callback::Restart(m, n) => Some((m, n)),
                _ => None,
            })
            .collect()
    }

    fn push(&self, call: Callback) {
        self.calls.lock().unwrap().push(call);
    }
}

impl WatchdogHandler for RecordingHandler {
    fn on_restart(&self, module: &str, restart_count: u32) {
        self.push(Callback::Restart(module.to_string(), restart_count));
    }

    fn on_unhealthy(&self, module: &str, _reason: &str) {
        self.push(Callback::Unhealthy(module.to_string()));
    }

    fn on_connection_lost(&self, venue: &str, reconnect_attempts: u32) {
        self.push(Callback::ConnectionLost(venue.to_string(), reconnect_attempts));
    }

    fn on_connection_restored(&self, venue: &str) {
        self.push(Callback::ConnectionRestored(venue.to_string()));
    }
}

/// Long BTC trade on binance: entry 50000, size 100
pub fn btc_long(current: rust_decimal::Decimal) -> TradeContext {
    TradeContext::new("binance", Direction::Long, dec!(50000), current, dec!(100))
}

/// Trade whose total (6100 ms) and AI analysis phase (4500 ms) are slow
pub fn slow_trade(trade_id: &str) -> TradeExecutionTiming {
    TradeExecutionTiming::new(trade_id, "binance", "BTC/USDT")
        .with_phase(Phase::PairSelection, 500)
        .with_phase(Phase::AiAnalysis, 4_500)
        .with_phase(Phase::OrderPlacement, 800)
        .with_phase(Phase::Confirmation, 300)
}

/// Trade well inside every default threshold
pub fn fast_trade(trade_id: &str) -> TradeExecutionTiming {
    TradeExecutionTiming::new(trade_id, "bybit", "ETH/USDT")
        .with_phase(Phase::PairSelection, 200)
        .with_phase(Phase::AiAnalysis, 900)
        .with_phase(Phase::OrderPlacement, 150)
        .with_phase(Phase::Confirmation, 100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_handler_keeps_order() {
        let handler = RecordingHandler::new();
        handler.on_restart("pair-scanner", 1);
        handler.on_connection_lost("binance", 1);
        assert_eq!(
            handler.calls(),
            vec![
                Callback::Restart("pair-scanner".into(), 1),
                Callback::ConnectionLost("binance".into(), 1)
            ]
        );
    }

    #[test]
    fn test_trade_fixtures() {
        assert_eq!(slow_trade("t").total_ms(), 6_100);
        assert_eq!(fast_trade("t").total_ms(), 1_350);
    }
}
