use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::common::types::Direction;

/// Market order submitted to a simulated venue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SandboxOrder {
    pub pair: String,
    pub direction: Direction,
    /// Reference price before slippage
    pub price: Decimal,
    /// Quote notional of the position
    pub amount: Decimal,
}

impl SandboxOrder {
    pub fn new(pair: impl Into<String>, direction: Direction, price: Decimal, amount: Decimal) -> Self {
        Self {
            pair: pair.into(),
            direction,
            price,
            amount,
        }
    }
}

/// Open simulated position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SandboxPosition {
    pub order_id: String,
    pub pair: String,
    pub direction: Direction,
    /// Fill price including slippage
    pub entry_price: Decimal,
    /// Quote notional
    pub amount: Decimal,
    /// Balance committed to the position (`amount / leverage`)
    pub margin: Decimal,
    pub venue: String,
}

/// Outcome of [`place_order`](super::SandboxExchange::place_order)
///
/// A rejected order has `success = false`, an `error` and zero fill fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResult {
    pub success: bool,
    pub order_id: Option<String>,
    pub fill_price: Decimal,
    /// Applied slippage as a fraction of the reference price
    pub slippage: Decimal,
    pub fee: Decimal,
    pub error: Option<String>,
}

impl OrderResult {
    pub(crate) fn rejected(error: impl Into<String>) -> Self {
        Self {
            success: false,
            order_id: None,
            fill_price: Decimal::ZERO,
            slippage: Decimal::ZERO,
            fee: Decimal::ZERO,
            error: Some(error.into()),
        }
    }
}

/// Outcome of closing a position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseResult {
    /// Realized price PnL, before the exit fee
    pub pnl: Decimal,
    /// Exit fee charged
    pub fee: Decimal,
}

/// Balance view of one ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SandboxBalance {
    pub available: Decimal,
    /// Sum of margin committed to open positions (notional at leverage 1)
    pub in_position: Decimal,
    pub total: Decimal,
}
