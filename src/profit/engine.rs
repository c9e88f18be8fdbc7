use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::fees::{FeeKind, FeeSchedule};
use crate::common::types::Direction;

/// Default safety margin applied to round-trip fees before a close is allowed
pub const DEFAULT_FEE_MARGIN: Decimal = dec!(1.5);

/// Everything needed to decide whether an open trade may close right now
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeContext {
    pub entry_price: Decimal,
    pub current_price: Decimal,
    /// Position size in quote currency (entry notional)
    pub position_size: Decimal,
    pub venue: String,
    pub direction: Direction,
    /// Smallest net profit (quote currency) worth closing for
    pub min_profit_threshold: Decimal,
}

impl TradeContext {
    pub fn new(
        venue: impl Into<String>,
        direction: Direction,
        entry_price: Decimal,
        current_price: Decimal,
        position_size: Decimal,
    ) -> Self {
        Self {
            entry_price,
            current_price,
            position_size,
            venue: venue.into(),
            direction,
            min_profit_threshold: Decimal::ZERO,
        }
    }

    pub fn with_min_profit(mut self, threshold: Decimal) -> Self {
        self.min_profit_threshold = threshold;
        self
    }

    /// Same trade re-priced at a new tick
    pub fn at_price(&self, current_price: Decimal) -> Self {
        Self {
            current_price,
            ..self.clone()
        }
    }
}

/// Outcome of one profit evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfitVerdict {
    pub gross_profit: Decimal,
    pub entry_fee: Decimal,
    pub exit_fee: Decimal,
    pub total_fees: Decimal,
    pub net_profit: Decimal,
    pub net_profit_percent: Decimal,
    /// Net profit required to close: max(threshold, fees × margin)
    pub required_profit: Decimal,
    pub meets_threshold: bool,
    pub should_close: bool,
    pub reason_text: String,
}

impl ProfitVerdict {
    fn rejected(reason: String) -> Self {
        Self {
            gross_profit: Decimal::ZERO,
            entry_fee: Decimal::ZERO,
            exit_fee: Decimal::ZERO,
            total_fees: Decimal::ZERO,
            net_profit: Decimal::ZERO,
            net_profit_percent: Decimal::ZERO,
            required_profit: Decimal::ZERO,
            meets_threshold: false,
            should_close: false,
            reason_text: reason,
        }
    }
}

struct Figures {
    gross_profit: Decimal,
    entry_fee: Decimal,
    exit_fee: Decimal,
    total_fees: Decimal,
    net_profit: Decimal,
    net_profit_percent: Decimal,
    fee_floor: Decimal,
}

/// Fee-aware close gate
///
/// Every exit decision goes through [`ProfitEngine::evaluate`]. The engine is
/// stateless: the same context always produces the same verdict.
#[derive(Debug, Clone)]
pub struct ProfitEngine {
    fees: FeeSchedule,
    fee_margin: Decimal,
}

impl ProfitEngine {
    pub fn new(fees: FeeSchedule) -> Self {
        Self {
            fees,
            fee_margin: DEFAULT_FEE_MARGIN,
        }
    }

    /// Override the fee safety margin (1.5 by default)
    pub fn with_fee_margin(mut self, fee_margin: Decimal) -> Self {
        self.fee_margin = fee_margin;
        self
    }

    pub fn fees(&self) -> &FeeSchedule {
        &self.fees
    }

    pub fn fee_margin(&self) -> Decimal {
        self.fee_margin
    }

    /// Taker rate for the venue; unknown venues pay the fallback rate
    fn fee_rate(&self, venue: &str) -> Decimal {
        match self.fees.rate(venue, FeeKind::Taker) {
            Some(rate) => rate,
            None => {
                debug!(
                    venue = venue,
                    fallback = %self.fees.fallback_rate,
                    "No fee entry for venue, using fallback rate"
                );
                self.fees.fallback_rate
            }
        }
    }

    /// Compute gross/net profit and the close verdict for a trade
    ///
    /// Never fails: non-positive prices or sizes produce a verdict with
    /// `should_close = false` and a diagnostic reason.
    pub fn evaluate(&self, ctx: &TradeContext) -> ProfitVerdict {
        if ctx.entry_price <= Decimal::ZERO {
            return ProfitVerdict::rejected(format!(
                "Invalid entry price {}: must be positive",
                ctx.entry_price
            ));
        }
        if ctx.current_price <= Decimal::ZERO {
            return ProfitVerdict::rejected(format!(
                "Invalid current price {}: must be positive",
                ctx.current_price
            ));
        }
        if ctx.position_size <= Decimal::ZERO {
            return ProfitVerdict::rejected(format!(
                "Invalid position size {}: must be positive",
                ctx.position_size
            ));
        }

        let rate = self.fee_rate(&ctx.venue);
        let Some(figures) = self.figures(ctx, rate) else {
            warn!(
                venue = %ctx.venue,
                entry_price = %ctx.entry_price,
                current_price = %ctx.current_price,
                position_size = %ctx.position_size,
                "Profit evaluation overflowed"
            );
            return ProfitVerdict::rejected(format!(
                "Invalid trade: arithmetic overflow evaluating entry {}, current {}, size {}",
                ctx.entry_price, ctx.current_price, ctx.position_size
            ));
        };
        let Figures {
            gross_profit,
            entry_fee,
            exit_fee,
            total_fees,
            net_profit,
            net_profit_percent,
            fee_floor,
        } = figures;

        let required_profit = ctx.min_profit_threshold.max(fee_floor);
        let meets_threshold = net_profit >= ctx.min_profit_threshold;
        let should_close = net_profit >= required_profit;

        let reason_text = if should_close {
            format!(
                "Close: net profit {} clears required {} (fees {} x {} margin, threshold {})",
                net_profit.round_dp(6),
                required_profit.round_dp(6),
                total_fees.round_dp(6),
                self.fee_margin,
                ctx.min_profit_threshold
            )
        } else if !meets_threshold {
            format!(
                "Hold: net profit {} below minimum threshold {} (gross {}, fees {})",
                net_profit.round_dp(6),
                ctx.min_profit_threshold,
                gross_profit.round_dp(6),
                total_fees.round_dp(6)
            )
        } else {
            format!(
                "Hold: net profit {} does not clear fee margin {} (fees {} x {})",
                net_profit.round_dp(6),
                fee_floor.round_dp(6),
                total_fees.round_dp(6),
                self.fee_margin
            )
        };

        ProfitVerdict {
            gross_profit,
            entry_fee,
            exit_fee,
            total_fees,
            net_profit,
            net_profit_percent,
            required_profit,
            meets_threshold,
            should_close,
            reason_text,
        }
    }

    /// Checked profit and fee arithmetic; `None` on overflow
    fn figures(&self, ctx: &TradeContext, rate: Decimal) -> Option<Figures> {
        let sign = Decimal::from(ctx.direction.sign());
        let gross_profit = ctx
            .current_price
            .checked_sub(ctx.entry_price)?
            .checked_div(ctx.entry_price)?
            .checked_mul(ctx.position_size)?
            .checked_mul(sign)?;

        // Fees are owed on any close, winning or losing.
        let entry_fee = ctx.position_size.checked_mul(rate)?;
        let exit_notional = ctx.position_size.checked_add(gross_profit.max(Decimal::ZERO))?;
        let exit_fee = exit_notional.checked_mul(rate)?;
        let total_fees = entry_fee.checked_add(exit_fee)?;

        let net_profit = gross_profit.checked_sub(total_fees)?;
        let net_profit_percent = net_profit
            .checked_div(ctx.position_size)?
            .checked_mul(Decimal::ONE_HUNDRED)?;
        let fee_floor = total_fees.checked_mul(self.fee_margin)?;

        Some(Figures {
            gross_profit,
            entry_fee,
            exit_fee,
            total_fees,
            net_profit,
            net_profit_percent,
            fee_floor,
        })
    }

    /// Price at which closing yields exactly `target_net_profit` after
    /// round-trip fees
    ///
    /// Increases with the target for longs and decreases with it for shorts.
    /// Returns `None` for non-positive inputs or when no positive price works.
    pub fn minimum_exit_price(
        &self,
        entry_price: Decimal,
        position_size: Decimal,
        venue: &str,
        target_net_profit: Decimal,
        direction: Direction,
    ) -> Option<Decimal> {
        if entry_price <= Decimal::ZERO || position_size <= Decimal::ZERO {
            return None;
        }
        let rate = self.fee_rate(venue);
        if rate >= Decimal::ONE {
            return None;
        }

        // net = gross(1 - r) - 2Sr while gross >= 0, else net = gross - 2Sr
        let fixed_fees = dec!(2).checked_mul(position_size)?.checked_mul(rate)?;
        let shifted = target_net_profit.checked_add(fixed_fees)?;
        let winning_gross = shifted.checked_div(Decimal::ONE.checked_sub(rate)?)?;
        let gross = if winning_gross >= Decimal::ZERO {
            winning_gross
        } else {
            shifted
        };

        let move_fraction = gross
            .checked_div(position_size)?
            .checked_mul(Decimal::from(direction.sign()))?;
        let price = entry_price.checked_mul(Decimal::ONE.checked_add(move_fraction)?)?;
        (price > Decimal::ZERO).then_some(price)
    }

    /// Price at which a close nets exactly zero after fees
    pub fn break_even_price(
        &self,
        entry_price: Decimal,
        position_size: Decimal,
        venue: &str,
        direction: Direction,
    ) -> Option<Decimal> {
        self.minimum_exit_price(entry_price, position_size, venue, Decimal::ZERO, direction)
    }
}

impl Default for ProfitEngine {
    fn default() -> Self {
        Self::new(FeeSchedule::default())
    }
}
