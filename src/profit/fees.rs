use std::collections::HashMap;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Which side of the book an order takes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeeKind {
    /// Resting order that provides liquidity
    Maker,
    /// Order that takes liquidity (market orders, crossing limits)
    Taker,
}

/// Fee rates for one venue, as fractions of notional (0.001 = 0.1%)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VenueFees {
    pub maker: Decimal,
    pub taker: Decimal,
}

impl VenueFees {
    pub fn new(maker: Decimal, taker: Decimal) -> Self {
        Self { maker, taker }
    }

    /// Same rate for both sides
    pub fn flat(rate: Decimal) -> Self {
        Self::new(rate, rate)
    }

    pub fn rate(&self, kind: FeeKind) -> Decimal {
        match kind {
            FeeKind::Maker => self.maker,
            FeeKind::Taker => self.taker,
        }
    }
}

/// Immutable per-venue fee table
///
/// Venue names are matched case-insensitively. Built once from configuration
/// and handed to every component that needs it, so tests can swap schedules
/// freely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeSchedule {
    /// Rates keyed by lowercase venue name
    #[serde(default = "default_venue_fees")]
    pub venues: HashMap<String, VenueFees>,
    /// Rate used by callers that must price an unknown venue conservatively
    #[serde(default = "default_fallback_rate")]
    pub fallback_rate: Decimal,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self {
            venues: default_venue_fees(),
            fallback_rate: default_fallback_rate(),
        }
    }
}

/// Standard spot tier rates for the supported venues
fn default_venue_fees() -> HashMap<String, VenueFees> {
    HashMap::from([
        ("binance".to_string(), VenueFees::new(dec!(0.001), dec!(0.001))),
        ("bybit".to_string(), VenueFees::new(dec!(0.001), dec!(0.001))),
        ("okx".to_string(), VenueFees::new(dec!(0.0008), dec!(0.001))),
        ("kucoin".to_string(), VenueFees::new(dec!(0.001), dec!(0.001))),
        ("kraken".to_string(), VenueFees::new(dec!(0.0025), dec!(0.004))),
        ("coinbase".to_string(), VenueFees::new(dec!(0.004), dec!(0.006))),
    ])
}

fn default_fallback_rate() -> Decimal {
    dec!(0.001)
}

impl FeeSchedule {
    /// Empty schedule; every lookup falls back
    pub fn empty(fallback_rate: Decimal) -> Self {
        Self {
            venues: HashMap::new(),
            fallback_rate,
        }
    }

    /// Add or replace a venue's rates
    pub fn with_venue(mut self, venue: &str, fees: VenueFees) -> Self {
        self.venues.insert(venue.to_ascii_lowercase(), fees);
        self
    }

    /// Rates for a venue, if configured
    pub fn get(&self, venue: &str) -> Option<&VenueFees> {
        self.venues
            .get(venue)
            .or_else(|| self.venues.get(&venue.to_ascii_lowercase()))
    }

    /// Whether the venue has an entry
    pub fn contains(&self, venue: &str) -> bool {
        self.get(venue).is_some()
    }

    /// Rate for a venue and order kind, if configured
    pub fn rate(&self, venue: &str, kind: FeeKind) -> Option<Decimal> {
        self.get(venue).map(|fees| fees.rate(kind))
    }

    /// Rate for a venue and order kind, falling back to `fallback_rate`
    pub fn rate_or_fallback(&self, venue: &str, kind: FeeKind) -> Decimal {
        self.rate(venue, kind).unwrap_or(self.fallback_rate)
    }

    /// Fee charged on `notional` at this venue
    pub fn fee_for(&self, venue: &str, notional: Decimal, kind: FeeKind) -> Decimal {
        notional.abs() * self.rate_or_fallback(venue, kind)
    }

    /// Taker rate paid on entry plus taker rate paid on exit
    pub fn round_trip_rate(&self, venue: &str) -> Decimal {
        self.rate_or_fallback(venue, FeeKind::Taker) * dec!(2)
    }

    /// Configured venue names, sorted
    pub fn venue_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.venues.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
