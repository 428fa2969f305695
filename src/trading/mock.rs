//! In-memory exchange and scripted randomness for trading tests.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::api::{
    ApiError, AssetBalance, ExchangeClient, ExchangeInfo, MarketOrder, OrderBook, OrderResponse,
    PositionRisk, SymbolFilter, SymbolInfo,
};
use crate::models::{OrderSide, PositionSide, SymbolTradingRules};

use super::random::RandomSource;
use super::TimeBounds;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockPosition {
    pub amount: Decimal,
    pub entry_price: Decimal,
}

#[derive(Debug)]
pub struct MockState {
    pub symbol: String,
    pub rules: SymbolTradingRules,
    pub mark_price: Decimal,
    pub empty_book: bool,
    pub report_avg_price: bool,

    pub dual_side: bool,
    pub dual_side_enable_calls: u32,
    pub leverage: u32,
    pub leverage_calls: Vec<u32>,
    pub fail_leverage: bool,

    /// Available USDT; `None` means no USDT row at all
    pub balance: Option<Decimal>,
    pub fee_per_order: Decimal,

    /// 1-based index of the order that gets rejected
    pub fail_order_at: Option<usize>,
    pub orders: Vec<MarketOrder>,

    pub positions: HashMap<PositionSide, MockPosition>,
    pub pnl_by_side: HashMap<PositionSide, Decimal>,

    /// Positions vanish once this many position queries have been served
    pub flatten_after_polls: Option<usize>,
    pub position_polls: usize,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            symbol: "BTCUSDT".to_string(),
            rules: SymbolTradingRules {
                tick_size: dec!(0.1),
                step_size: dec!(0.001),
                min_qty: dec!(0.001),
                min_notional: dec!(5),
            },
            mark_price: dec!(100),
            empty_book: false,
            report_avg_price: true,
            dual_side: false,
            dual_side_enable_calls: 0,
            leverage: 1,
            leverage_calls: Vec::new(),
            fail_leverage: false,
            balance: Some(dec!(1000)),
            fee_per_order: Decimal::ZERO,
            fail_order_at: None,
            orders: Vec::new(),
            positions: HashMap::new(),
            pnl_by_side: HashMap::new(),
            flatten_after_polls: None,
            position_polls: 0,
        }
    }
}

/// Exchange double that tracks positions per side and charges a flat fee per
/// order against the balance.
#[derive(Debug, Default)]
pub struct MockExchange {
    state: Mutex<MockState>,
}

impl MockExchange {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, f: impl FnOnce(&mut MockState)) -> Self {
        self.with_state(f);
        self
    }

    pub fn with_state(&self, f: impl FnOnce(&mut MockState)) {
        f(&mut self.state());
    }

    pub fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }
}

#[async_trait]
impl ExchangeClient for MockExchange {
    async fn exchange_info(&self) -> Result<ExchangeInfo, ApiError> {
        let state = self.state();
        Ok(ExchangeInfo {
            symbols: vec![SymbolInfo {
                symbol: state.symbol.clone(),
                filters: vec![
                    SymbolFilter::PriceFilter {
                        tick_size: state.rules.tick_size,
                    },
                    SymbolFilter::LotSize {
                        step_size: state.rules.step_size,
                        min_qty: state.rules.min_qty,
                    },
                    SymbolFilter::MinNotional {
                        notional: state.rules.min_notional,
                    },
                ],
            }],
        })
    }

    async fn order_book(&self, _symbol: &str, _depth: u32) -> Result<OrderBook, ApiError> {
        let state = self.state();
        if state.empty_book {
            return Ok(OrderBook {
                bids: Vec::new(),
                asks: Vec::new(),
            });
        }
        let half_spread = dec!(0.5);
        Ok(OrderBook {
            bids: vec![(state.mark_price - half_spread, Decimal::ONE)],
            asks: vec![(state.mark_price + half_spread, Decimal::ONE)],
        })
    }

    async fn dual_side_position(&self) -> Result<bool, ApiError> {
        Ok(self.state().dual_side)
    }

    async fn set_dual_side_position(&self, enabled: bool) -> Result<(), ApiError> {
        let mut state = self.state();
        state.dual_side = enabled;
        state.dual_side_enable_calls += 1;
        Ok(())
    }

    async fn set_leverage(&self, _symbol: &str, leverage: u32) -> Result<(), ApiError> {
        let mut state = self.state();
        if state.fail_leverage {
            return Err(ApiError::Status {
                status: 400,
                code: Some(-4028),
                msg: "Leverage is not valid".to_string(),
            });
        }
        state.leverage = leverage;
        state.leverage_calls.push(leverage);
        Ok(())
    }

    async fn place_order(&self, order: &MarketOrder) -> Result<OrderResponse, ApiError> {
        let mut state = self.state();
        state.orders.push(order.clone());

        if state.fail_order_at == Some(state.orders.len()) {
            return Err(ApiError::Status {
                status: 400,
                code: Some(-2019),
                msg: "Margin is insufficient.".to_string(),
            });
        }

        let delta = match order.side {
            OrderSide::Buy => order.quantity,
            OrderSide::Sell => -order.quantity,
        };
        let mark = state.mark_price;
        let position = state
            .positions
            .entry(order.position_side)
            .or_insert(MockPosition {
                amount: Decimal::ZERO,
                entry_price: mark,
            });
        position.amount += delta;
        if position.amount.is_zero() {
            state.positions.remove(&order.position_side);
        }

        let fee = state.fee_per_order;
        if let Some(balance) = state.balance.as_mut() {
            *balance -= fee;
        }

        Ok(OrderResponse {
            order_id: Some(state.orders.len() as i64),
            status: Some("FILLED".to_string()),
            executed_qty: Some(order.quantity),
            avg_price: Some(if state.report_avg_price { mark } else { Decimal::ZERO }),
            ..Default::default()
        })
    }

    async fn position_risk(&self, symbol: Option<&str>) -> Result<Vec<PositionRisk>, ApiError> {
        let mut state = self.state();
        state.position_polls += 1;
        if let Some(limit) = state.flatten_after_polls {
            if state.position_polls > limit {
                state.positions.clear();
            }
        }

        if symbol.is_some_and(|s| s != state.symbol) {
            return Ok(Vec::new());
        }

        let leverage = Decimal::from(state.leverage.max(1));
        Ok(state
            .positions
            .iter()
            .map(|(side, position)| PositionRisk {
                symbol: state.symbol.clone(),
                position_amt: position.amount,
                entry_price: position.entry_price,
                un_realized_profit: state.pnl_by_side.get(side).copied().unwrap_or_default(),
                position_side: *side,
                isolated_wallet: Decimal::ZERO,
                initial_margin: position.amount.abs() * position.entry_price / leverage,
            })
            .collect())
    }

    async fn account_balance(&self) -> Result<Vec<AssetBalance>, ApiError> {
        let state = self.state();
        Ok(state
            .balance
            .map(|balance| AssetBalance {
                asset: "USDT".to_string(),
                balance,
                available_balance: balance,
            })
            .into_iter()
            .collect())
    }
}

/// Replays fixed coin flips (then `true`) and always draws the lower bound.
pub struct ScriptedRandom {
    flips: VecDeque<bool>,
}

impl ScriptedRandom {
    pub fn new(flips: &[bool]) -> Self {
        Self {
            flips: flips.iter().copied().collect(),
        }
    }
}

impl RandomSource for ScriptedRandom {
    fn coin_flip(&mut self) -> bool {
        self.flips.pop_front().unwrap_or(true)
    }

    fn duration_within(&mut self, bounds: TimeBounds) -> Duration {
        bounds.min
    }
}
