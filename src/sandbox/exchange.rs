use rand::rngs::StdRng;
use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::types::{CloseResult, OrderResult, SandboxBalance, SandboxOrder, SandboxPosition};
use crate::config::SandboxVenueConfig;

/// Resolution of the uniform slippage draw inside its band
const SLIPPAGE_STEPS: u32 = 10_000;

/// Cash amounts are kept to this many decimal places so ledger sums stay exact
const CASH_DP: u32 = 8;

/// Cash state of one simulated venue
///
/// `available` never goes negative: orders that would overdraw it are
/// rejected before any mutation, and closes are capped at the committed
/// margin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SandboxLedger {
    pub initial_balance: Decimal,
    pub available: Decimal,
    pub open_positions: Vec<SandboxPosition>,
    /// Sum of realized PnL since the last reset
    pub realized_pnl: Decimal,
    /// Sum of entry and exit fees since the last reset
    pub fees_paid: Decimal,
}

impl SandboxLedger {
    pub fn new(initial_balance: Decimal) -> Self {
        Self {
            initial_balance,
            available: initial_balance,
            open_positions: Vec::new(),
            realized_pnl: Decimal::ZERO,
            fees_paid: Decimal::ZERO,
        }
    }

    pub fn in_position(&self) -> Decimal {
        self.open_positions.iter().map(|p| p.margin).sum()
    }

    pub fn balance(&self) -> SandboxBalance {
        let in_position = self.in_position();
        SandboxBalance {
            available: self.available,
            in_position,
            total: self.available + in_position,
        }
    }

    /// `available + in_position == initial + realized_pnl - fees_paid`
    pub fn reconciles(&self) -> bool {
        self.available + self.in_position()
            == self.initial_balance + self.realized_pnl - self.fees_paid
    }
}

/// One simulated venue
///
/// Market orders fill immediately at the reference price worsened by a
/// random slippage drawn from `[min_slippage, max_slippage]`. Entry and exit
/// both pay the venue taker rate.
#[derive(Debug)]
pub struct SandboxExchange {
    venue: String,
    taker_rate: Decimal,
    leverage: Decimal,
    min_slippage: Decimal,
    max_slippage: Decimal,
    rng: StdRng,
    ledger: SandboxLedger,
    order_seq: u64,
}

impl SandboxExchange {
    pub fn new(
        venue: impl Into<String>,
        config: &SandboxVenueConfig,
        taker_rate: Decimal,
        slippage_band: (Decimal, Decimal),
        rng: StdRng,
    ) -> Self {
        let venue = venue.into();
        let leverage = if config.leverage > Decimal::ZERO {
            config.leverage
        } else {
            warn!(venue = %venue, leverage = %config.leverage, "Non-positive leverage, using 1x");
            Decimal::ONE
        };
        let (lo, hi) = slippage_band;

        Self {
            venue,
            taker_rate,
            leverage,
            min_slippage: lo.min(hi),
            max_slippage: lo.max(hi),
            rng,
            ledger: SandboxLedger::new(config.initial_balance),
            order_seq: 0,
        }
    }

    pub fn venue(&self) -> &str {
        &self.venue
    }

    pub fn taker_rate(&self) -> Decimal {
        self.taker_rate
    }

    pub fn leverage(&self) -> Decimal {
        self.leverage
    }

    pub fn ledger(&self) -> &SandboxLedger {
        &self.ledger
    }

    pub fn open_positions(&self) -> &[SandboxPosition] {
        &self.ledger.open_positions
    }

    /// Available cash, committed margin and their total
    ///
    /// `in_position` is the margin held by open positions. It equals their
    /// notional only at leverage 1; at leverage `L` it is notional / `L`.
    pub fn get_balance(&self) -> SandboxBalance {
        self.ledger.balance()
    }

    /// Drop all positions and restore the initial balance
    pub fn reset_balance(&mut self) {
        let initial = self.ledger.initial_balance;
        self.ledger = SandboxLedger::new(initial);
        info!(venue = %self.venue, balance = %initial, "Sandbox balance reset");
    }

    fn draw_slippage(&mut self) -> Decimal {
        let step = self.rng.gen_range(0..=SLIPPAGE_STEPS);
        let span = self.max_slippage - self.min_slippage;
        self.min_slippage + span * Decimal::from(step) / Decimal::from(SLIPPAGE_STEPS)
    }

    /// Fill a market order or reject it without touching the ledger
    pub fn place_order(&mut self, order: &SandboxOrder) -> OrderResult {
        if order.price <= Decimal::ZERO {
            return OrderResult::rejected(format!("Invalid price {}", order.price));
        }
        if order.amount <= Decimal::ZERO {
            return OrderResult::rejected(format!("Invalid amount {}", order.amount));
        }

        let margin = (order.amount / self.leverage).round_dp(CASH_DP);
        let fee = order.amount * self.taker_rate;
        let required = margin + fee;
        if required > self.ledger.available {
            warn!(
                venue = %self.venue,
                pair = %order.pair,
                required = %required,
                available = %self.ledger.available,
                "Sandbox order rejected: insufficient balance"
            );
            return OrderResult::rejected(format!(
                "Insufficient balance: required {} (margin {} + fee {}), available {}",
                required, margin, fee, self.ledger.available
            ));
        }

        let slippage = self.draw_slippage();
        let sign = Decimal::from(order.direction.sign());
        // Prices keep full precision; only cash amounts are rounded
        let fill_price = match order.price.checked_mul(Decimal::ONE + sign * slippage) {
            Some(fill) if fill > Decimal::ZERO => fill,
            _ => {
                warn!(
                    venue = %self.venue,
                    pair = %order.pair,
                    price = %order.price,
                    slippage = %slippage,
                    "Sandbox order rejected: no positive fill price"
                );
                return OrderResult::rejected(format!(
                    "No positive fill price for {} at slippage {}",
                    order.price, slippage
                ));
            }
        };

        self.order_seq += 1;
        let order_id = format!("sandbox-{}-{}", self.venue, self.order_seq);

        self.ledger.available -= required;
        self.ledger.fees_paid += fee;
        self.ledger.open_positions.push(SandboxPosition {
            order_id: order_id.clone(),
            pair: order.pair.clone(),
            direction: order.direction,
            entry_price: fill_price,
            amount: order.amount,
            margin,
            venue: self.venue.clone(),
        });

        debug!(
            venue = %self.venue,
            order_id = %order_id,
            pair = %order.pair,
            direction = %order.direction,
            fill_price = %fill_price,
            slippage = %slippage,
            fee = %fee,
            "Sandbox order filled"
        );

        OrderResult {
            success: true,
            order_id: Some(order_id),
            fill_price,
            slippage,
            fee,
            error: None,
        }
    }

    /// Close the oldest open position on `pair` at `exit_price`
    ///
    /// Returns `None` when no position is open on the pair. A loss never
    /// exceeds the committed margin, and the exit fee is capped so the
    /// available balance stays non-negative.
    pub fn close_position(&mut self, pair: &str, exit_price: Decimal) -> Option<CloseResult> {
        if exit_price <= Decimal::ZERO {
            warn!(venue = %self.venue, pair = pair, exit_price = %exit_price, "Invalid exit price");
            return None;
        }
        let index = self
            .ledger
            .open_positions
            .iter()
            .position(|p| p.pair == pair)?;

        let position = &self.ledger.open_positions[index];
        let sign = Decimal::from(position.direction.sign());
        let raw_pnl = exit_price
            .checked_sub(position.entry_price)
            .and_then(|diff| diff.checked_div(position.entry_price))
            .and_then(|ratio| ratio.checked_mul(position.amount))
            .map(|pnl| (sign * pnl).round_dp(CASH_DP));
        let Some(raw_pnl) = raw_pnl else {
            warn!(
                venue = %self.venue,
                pair = pair,
                entry_price = %position.entry_price,
                exit_price = %exit_price,
                "PnL out of range, position left open"
            );
            return None;
        };
        let position = self.ledger.open_positions.remove(index);

        let pnl = raw_pnl.max(-position.margin);
        if pnl != raw_pnl {
            warn!(
                venue = %self.venue,
                pair = pair,
                loss = %raw_pnl,
                margin = %position.margin,
                "Position liquidated, loss capped at margin"
            );
        }

        let exit_notional = position.amount + pnl.max(Decimal::ZERO);
        let returned = position.margin + pnl;
        let fee = (exit_notional * self.taker_rate).min(self.ledger.available + returned);

        self.ledger.available += returned - fee;
        self.ledger.realized_pnl += pnl;
        self.ledger.fees_paid += fee;

        debug!(
            venue = %self.venue,
            order_id = %position.order_id,
            pair = pair,
            exit_price = %exit_price,
            pnl = %pnl,
            fee = %fee,
            "Sandbox position closed"
        );

        Some(CloseResult { pnl, fee })
    }
}
