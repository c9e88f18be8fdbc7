use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::SeedableRng;
use rust_decimal::Decimal;
use tracing::info;

use super::exchange::SandboxExchange;
use super::types::{CloseResult, OrderResult, SandboxBalance, SandboxOrder};
use crate::common::errors::{CoreError, Result};
use crate::config::SandboxConfig;
use crate::profit::{FeeKind, FeeSchedule};

/// Registry of simulated venues
///
/// Only venues present in [`SandboxConfig::venues`] exist; every call naming
/// another venue fails with [`CoreError::UnknownVenue`].
#[derive(Debug)]
pub struct SandboxEngine {
    exchanges: HashMap<String, SandboxExchange>,
}

impl SandboxEngine {
    pub fn new(config: &SandboxConfig, fees: &FeeSchedule) -> Self {
        let mut names: Vec<&String> = config.venues.keys().collect();
        names.sort();

        let exchanges = names
            .into_iter()
            .enumerate()
            .map(|(i, name)| {
                let venue = name.to_lowercase();
                let rng = match config.seed {
                    Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(i as u64)),
                    None => StdRng::from_entropy(),
                };
                let taker_rate = fees.rate_or_fallback(&venue, FeeKind::Taker);
                let exchange = SandboxExchange::new(
                    venue.clone(),
                    &config.venues[name],
                    taker_rate,
                    (config.min_slippage, config.max_slippage),
                    rng,
                );
                info!(
                    venue = %venue,
                    balance = %exchange.get_balance().available,
                    leverage = %exchange.leverage(),
                    taker_rate = %taker_rate,
                    "Sandbox venue initialized"
                );
                (venue, exchange)
            })
            .collect();

        Self { exchanges }
    }

    /// Configured venue names, sorted
    pub fn venues(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.exchanges.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn exchange(&self, venue: &str) -> Option<&SandboxExchange> {
        self.exchanges.get(&venue.to_lowercase())
    }

    fn exchange_mut(&mut self, venue: &str) -> Result<&mut SandboxExchange> {
        self.exchanges
            .get_mut(&venue.to_lowercase())
            .ok_or_else(|| CoreError::UnknownVenue(venue.to_string()))
    }

    pub fn place_order(&mut self, venue: &str, order: &SandboxOrder) -> Result<OrderResult> {
        Ok(self.exchange_mut(venue)?.place_order(order))
    }

    pub fn close_position(
        &mut self,
        venue: &str,
        pair: &str,
        exit_price: Decimal,
    ) -> Result<Option<CloseResult>> {
        Ok(self.exchange_mut(venue)?.close_position(pair, exit_price))
    }

    /// Balance of one venue; see [`SandboxExchange::get_balance`] for how
    /// leverage affects `in_position`
    pub fn get_balance(&self, venue: &str) -> Result<SandboxBalance> {
        self.exchange(venue)
            .map(SandboxExchange::get_balance)
            .ok_or_else(|| CoreError::UnknownVenue(venue.to_string()))
    }

    pub fn reset_balance(&mut self, venue: &str) -> Result<()> {
        self.exchange_mut(venue)?.reset_balance();
        Ok(())
    }

    pub fn reset_all(&mut self) {
        for exchange in self.exchanges.values_mut() {
            exchange.reset_balance();
        }
    }
}
