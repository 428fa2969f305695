//! Position model: order/position sides, opened legs and live exchange positions.

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::api::PositionRisk;

/// Order side sent to the exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "BUY",
            OrderSide::Sell => "SELL",
        }
    }

    /// Side of the order that flattens a position with the given signed amount.
    pub fn closing(position_amt: Decimal) -> Self {
        if position_amt > Decimal::ZERO {
            OrderSide::Sell
        } else {
            OrderSide::Buy
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Position side. `Both` is what the exchange reports in one-way mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PositionSide {
    Long,
    Short,
    Both,
}

impl PositionSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            PositionSide::Long => "LONG",
            PositionSide::Short => "SHORT",
            PositionSide::Both => "BOTH",
        }
    }

    /// Order side that opens (or adds to) this position side.
    pub fn opening_order(&self) -> OrderSide {
        match self {
            PositionSide::Short => OrderSide::Sell,
            PositionSide::Long | PositionSide::Both => OrderSide::Buy,
        }
    }

    pub fn opposite(&self) -> Self {
        match self {
            PositionSide::Long => PositionSide::Short,
            PositionSide::Short => PositionSide::Long,
            PositionSide::Both => PositionSide::Both,
        }
    }
}

impl fmt::Display for PositionSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// One leg opened by this bot during the current cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionInfo {
    /// LONG or SHORT
    pub side: PositionSide,

    /// Filled quantity in base asset
    pub quantity: Decimal,

    /// Realized average fill price
    pub entry_price: Decimal,
}

impl PositionInfo {
    pub fn new(side: PositionSide, quantity: Decimal, entry_price: Decimal) -> Self {
        Self {
            side,
            quantity,
            entry_price,
        }
    }

    /// Margin committed at open: `quantity * entry_price / leverage`.
    pub fn initial_margin(&self, leverage: u32) -> Decimal {
        if leverage == 0 {
            return Decimal::ZERO;
        }
        self.quantity * self.entry_price / Decimal::from(leverage)
    }
}

/// Both legs of a single-account hedge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HedgedPair {
    pub quantity: Decimal,
    pub long: PositionInfo,
    pub short: PositionInfo,

    /// Which leg was submitted first
    pub first_leg: PositionSide,
}

/// A non-zero position as currently reported by the exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivePosition {
    pub side: PositionSide,

    /// Signed amount (negative for shorts)
    pub amount: Decimal,
    pub entry_price: Decimal,
    pub unrealized_pnl: Decimal,

    /// Isolated wallet if set, otherwise initial margin
    pub margin: Decimal,
}

impl ActivePosition {
    /// Build from a position-risk row. Zero-amount rows yield `None`.
    ///
    /// In one-way mode the exchange reports `BOTH`; the side is then taken from
    /// the sign of the amount.
    pub fn from_risk(risk: &PositionRisk) -> Option<Self> {
        if risk.position_amt.is_zero() {
            return None;
        }

        let side = match risk.position_side {
            PositionSide::Both if risk.position_amt > Decimal::ZERO => PositionSide::Long,
            PositionSide::Both => PositionSide::Short,
            side => side,
        };

        let margin = if risk.isolated_wallet.is_zero() {
            risk.initial_margin
        } else {
            risk.isolated_wallet
        };

        Some(Self {
            side,
            amount: risk.position_amt,
            entry_price: risk.entry_price,
            unrealized_pnl: risk.un_realized_profit,
            margin,
        })
    }

    /// Unrealized PnL as a percentage of `initial_margin`, sign dropped.
    pub fn deviation_pct(&self, initial_margin: Decimal) -> Decimal {
        if initial_margin.is_zero() {
            return Decimal::ZERO;
        }
        (self.unrealized_pnl / initial_margin).abs() * Decimal::ONE_HUNDRED
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn risk(side: PositionSide, amt: Decimal, pnl: Decimal) -> PositionRisk {
        PositionRisk {
            symbol: "BTCUSDT".to_string(),
            position_amt: amt,
            entry_price: dec!(100),
            un_realized_profit: pnl,
            position_side: side,
            isolated_wallet: Decimal::ZERO,
            initial_margin: dec!(10),
        }
    }

    #[test]
    fn test_closing_side() {
        assert_eq!(OrderSide::closing(dec!(0.5)), OrderSide::Sell);
        assert_eq!(OrderSide::closing(dec!(-0.5)), OrderSide::Buy);
    }

    #[test]
    fn test_initial_margin() {
        let leg = PositionInfo::new(PositionSide::Long, dec!(2), dec!(500));
        assert_eq!(leg.initial_margin(10), dec!(100));
    }

    #[test]
    fn test_deviation() {
        let pos = ActivePosition::from_risk(&risk(PositionSide::Long, dec!(1), dec!(-25))).unwrap();
        assert_eq!(pos.deviation_pct(dec!(100)), dec!(25));
        assert_eq!(pos.deviation_pct(Decimal::ZERO), Decimal::ZERO);
    }

    #[test]
    fn test_one_way_side_from_sign() {
        let short = ActivePosition::from_risk(&risk(PositionSide::Both, dec!(-1), dec!(0))).unwrap();
        assert_eq!(short.side, PositionSide::Short);
        assert_eq!(short.margin, dec!(10));

        assert!(ActivePosition::from_risk(&risk(PositionSide::Long, dec!(0), dec!(0))).is_none());
    }
}
