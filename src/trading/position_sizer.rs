//! Order quantity sizing against balance, leverage, and symbol trading rules.

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;

use crate::models::SymbolTradingRules;

use super::TradingConfig;

/// Legs opened per account: one hedged pair on a single account puts two legs
/// against the same balance; dual-account mode puts one leg on each.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegsPerAccount {
    One,
    Two,
}

impl LegsPerAccount {
    fn divisor(&self) -> Decimal {
        match self {
            LegsPerAccount::One => Decimal::ONE,
            LegsPerAccount::Two => Decimal::TWO,
        }
    }
}

/// Calculator for legal order quantities.
#[derive(Debug, Clone)]
pub struct PositionSizer {
    /// Share of available balance put at risk (1 to 100)
    balance_percentage: Decimal,

    /// Safety factor over the exchange minimum notional
    liquidity_multiplier: Decimal,
}

impl PositionSizer {
    pub fn new(balance_percentage: Decimal, liquidity_multiplier: Decimal) -> Self {
        Self {
            balance_percentage,
            liquidity_multiplier,
        }
    }

    pub fn from_config(config: &TradingConfig) -> Self {
        Self::new(config.balance_percentage, config.liquidity_multiplier)
    }

    /// Calculate the order quantity for one leg.
    ///
    /// budget = balance * pct / 100 / legs, notional = budget * leverage,
    /// raw = notional / price. The result is at least the exchange floor
    /// (`min_qty`, or `min_notional * multiplier / price`) and always an
    /// integer multiple of `step_size`.
    ///
    /// A non-positive price yields zero. Callers reject empty balances before
    /// sizing.
    pub fn size(
        &self,
        rules: &SymbolTradingRules,
        price: Decimal,
        available_balance: Decimal,
        leverage: u32,
        legs: LegsPerAccount,
    ) -> Decimal {
        if price <= Decimal::ZERO {
            return Decimal::ZERO;
        }

        let budget = available_balance * self.balance_percentage / dec!(100) / legs.divisor();
        let notional = budget * Decimal::from(leverage);
        let raw_qty = notional / price;

        let min_required = self.min_required(rules, price);

        round_to_step(raw_qty.max(min_required), rules.step_size, min_required)
    }

    /// Smallest quantity the exchange will accept at `price`, with the
    /// liquidity multiplier applied to the notional floor.
    pub fn min_required(&self, rules: &SymbolTradingRules, price: Decimal) -> Decimal {
        let notional_qty = rules.min_notional * self.liquidity_multiplier / price;
        rules.min_qty.max(notional_qty)
    }
}

/// Round to the nearest multiple of `step` (ties to even), bumping up one step
/// if that would land under `floor`.
pub fn round_to_step(quantity: Decimal, step: Decimal, floor: Decimal) -> Decimal {
    if step <= Decimal::ZERO {
        return quantity;
    }

    let steps = (quantity / step).round_dp_with_strategy(0, RoundingStrategy::MidpointNearestEven);
    let rounded = steps * step;

    if rounded < floor {
        (steps + Decimal::ONE) * step
    } else {
        rounded
    }
}
