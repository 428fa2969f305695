//! Market model: symbol trading rules and top-of-book snapshots.

use rust_decimal::Decimal;

use crate::api::{ExchangeInfo, OrderBook, SymbolFilter};

/// Exchange-imposed constraints for orders on one symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymbolTradingRules {
    /// Minimum price increment
    pub tick_size: Decimal,

    /// Minimum quantity increment
    pub step_size: Decimal,

    /// Minimum order quantity
    pub min_qty: Decimal,

    /// Minimum order notional in quote currency
    pub min_notional: Decimal,
}

impl SymbolTradingRules {
    /// Extract the rules for `symbol`. Returns `None` if the symbol is unknown
    /// or any of the price, lot-size or min-notional filters is missing.
    pub fn from_exchange_info(info: &ExchangeInfo, symbol: &str) -> Option<Self> {
        let entry = info.symbols.iter().find(|s| s.symbol == symbol)?;

        let mut tick_size = None;
        let mut lot = None;
        let mut min_notional = None;

        for filter in &entry.filters {
            match filter {
                SymbolFilter::PriceFilter { tick_size: t } => tick_size = Some(*t),
                SymbolFilter::LotSize { step_size, min_qty } => lot = Some((*step_size, *min_qty)),
                SymbolFilter::MinNotional { notional } => min_notional = Some(*notional),
                SymbolFilter::Other => {}
            }
        }

        let (step_size, min_qty) = lot?;
        Some(Self {
            tick_size: tick_size?,
            step_size,
            min_qty,
            min_notional: min_notional?,
        })
    }
}

/// Best bid/ask at one instant. Never cached across sizing decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarketSnapshot {
    pub best_bid: Decimal,
    pub best_ask: Decimal,
    pub mid_price: Decimal,
}

impl MarketSnapshot {
    /// Returns `None` when either side of the book is empty.
    pub fn from_order_book(book: &OrderBook) -> Option<Self> {
        let (best_bid, _) = *book.bids.first()?;
        let (best_ask, _) = *book.asks.first()?;
        Some(Self {
            best_bid,
            best_ask,
            mid_price: (best_bid + best_ask) / Decimal::TWO,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn info(json: serde_json::Value) -> ExchangeInfo {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_rules_from_exchange_info() {
        let info = info(serde_json::json!({
            "symbols": [{
                "symbol": "BTCUSDT",
                "filters": [
                    {"filterType": "PRICE_FILTER", "tickSize": "0.10", "minPrice": "1", "maxPrice": "1000000"},
                    {"filterType": "LOT_SIZE", "stepSize": "0.001", "minQty": "0.001", "maxQty": "1000"},
                    {"filterType": "MARKET_LOT_SIZE", "stepSize": "0.001", "minQty": "0.001", "maxQty": "120"},
                    {"filterType": "MIN_NOTIONAL", "notional": "5"}
                ]
            }]
        }));

        let rules = SymbolTradingRules::from_exchange_info(&info, "BTCUSDT").unwrap();
        assert_eq!(rules.tick_size, dec!(0.1));
        assert_eq!(rules.step_size, dec!(0.001));
        assert_eq!(rules.min_qty, dec!(0.001));
        assert_eq!(rules.min_notional, dec!(5));

        assert!(SymbolTradingRules::from_exchange_info(&info, "ETHUSDT").is_none());
    }

    #[test]
    fn test_rules_missing_filter() {
        let info = info(serde_json::json!({
            "symbols": [{
                "symbol": "BTCUSDT",
                "filters": [
                    {"filterType": "PRICE_FILTER", "tickSize": "0.10"},
                    {"filterType": "LOT_SIZE", "stepSize": "0.001", "minQty": "0.001"}
                ]
            }]
        }));

        assert!(SymbolTradingRules::from_exchange_info(&info, "BTCUSDT").is_none());
    }

    #[test]
    fn test_snapshot_mid_price() {
        let book: OrderBook = serde_json::from_value(serde_json::json!({
            "bids": [["99.5", "3"], ["99.0", "1"]],
            "asks": [["100.5", "2"]]
        }))
        .unwrap();

        let snap = MarketSnapshot::from_order_book(&book).unwrap();
        assert_eq!(snap.best_bid, dec!(99.5));
        assert_eq!(snap.best_ask, dec!(100.5));
        assert_eq!(snap.mid_price, dec!(100));

        let empty = OrderBook { bids: vec![], asks: vec![(dec!(1), dec!(1))] };
        assert!(MarketSnapshot::from_order_book(&empty).is_none());
    }
}
