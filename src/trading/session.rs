//! Single-account controller: environment setup, hedged opens, position
//! queries and closes for one credential pair.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::api::{ExchangeClient, MarketOrder};
use crate::error::{BotError, Result};
use crate::models::{
    ActivePosition, HedgedPair, MarketSnapshot, OrderSide, PositionInfo, PositionSide,
    SymbolTradingRules,
};

use super::position_sizer::{LegsPerAccount, PositionSizer};
use super::random::RandomSource;

const HEDGE_MODE_PROPAGATION: Duration = Duration::from_millis(500);
const ORDER_BOOK_DEPTH: u32 = 5;
const QUOTE_ASSET: &str = "USDT";

/// One exchange account and the trading primitives a cycle needs from it.
pub struct AccountSession {
    label: String,
    client: Arc<dyn ExchangeClient>,
    sizer: PositionSizer,
    random: Box<dyn RandomSource>,

    /// Trading rules per symbol, fetched once
    rules: HashMap<String, SymbolTradingRules>,

    /// Whether the account is in dual-side mode, as of the last setup
    dual_side: bool,
}

impl AccountSession {
    pub fn new(
        label: impl Into<String>,
        client: Arc<dyn ExchangeClient>,
        sizer: PositionSizer,
        random: Box<dyn RandomSource>,
    ) -> Self {
        Self {
            label: label.into(),
            client,
            sizer,
            random,
            rules: HashMap::new(),
            dual_side: false,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Whether orders are sent with `LONG`/`SHORT` position sides.
    pub fn dual_side(&self) -> bool {
        self.dual_side
    }

    /// Prepare the account: switch on dual-side mode if requested and not
    /// already on, then set leverage. Safe to call repeatedly.
    pub async fn setup(&mut self, symbol: &str, leverage: u32, hedge_mode: bool) -> Result<()> {
        let mut dual_side = self.client.dual_side_position().await?;

        if hedge_mode && !dual_side {
            info!(account = %self.label, "Enabling hedge mode");
            self.client.set_dual_side_position(true).await?;
            tokio::time::sleep(HEDGE_MODE_PROPAGATION).await;
            dual_side = true;
        }
        self.dual_side = dual_side;

        self.client.set_leverage(symbol, leverage).await?;

        info!(
            account = %self.label,
            symbol = %symbol,
            leverage = leverage,
            hedge_mode = dual_side,
            "Account ready"
        );
        Ok(())
    }

    /// Trading rules for `symbol`, cached after the first fetch.
    pub async fn symbol_rules(&mut self, symbol: &str) -> Result<SymbolTradingRules> {
        if let Some(rules) = self.rules.get(symbol) {
            return Ok(*rules);
        }

        let info = self.client.exchange_info().await?;
        let rules = SymbolTradingRules::from_exchange_info(&info, symbol)
            .ok_or_else(|| BotError::SymbolInfoUnavailable(symbol.to_string()))?;

        debug!(symbol = %symbol, ?rules, "Loaded trading rules");
        self.rules.insert(symbol.to_string(), rules);
        Ok(rules)
    }

    /// Fresh top-of-book snapshot.
    pub async fn market_snapshot(&self, symbol: &str) -> Result<MarketSnapshot> {
        let book = self.client.order_book(symbol, ORDER_BOOK_DEPTH).await?;
        MarketSnapshot::from_order_book(&book)
            .ok_or_else(|| BotError::MarketDataUnavailable(symbol.to_string()))
    }

    /// Available USDT, zero when the account has no USDT row.
    pub async fn usdt_balance(&self) -> Result<Decimal> {
        let balances = self.client.account_balance().await?;
        Ok(balances
            .iter()
            .find(|b| b.asset == QUOTE_ASSET)
            .map(|b| b.available_balance)
            .unwrap_or(Decimal::ZERO))
    }

    /// Balance guarded against empty accounts.
    async fn tradable_balance(&self) -> Result<Decimal> {
        let balance = self.usdt_balance().await?;
        if balance <= Decimal::ZERO {
            return Err(BotError::InsufficientBalance {
                account: self.label.clone(),
                balance,
            });
        }
        Ok(balance)
    }

    /// Fetch balance, rules and price, then size one leg against this account.
    async fn size_leg(&mut self, symbol: &str, leverage: u32) -> Result<(Decimal, MarketSnapshot)> {
        let balance = self.tradable_balance().await?;
        let rules = self.symbol_rules(symbol).await?;
        let market = self.market_snapshot(symbol).await?;

        let quantity = self
            .sizer
            .size(&rules, market.mid_price, balance, leverage, LegsPerAccount::Two);
        Ok((quantity, market))
    }

    /// Open a LONG and a SHORT of the same size, in random order.
    ///
    /// If either order fails, everything open on the symbol is closed before
    /// the error is returned. Requires dual-side mode: in one-way mode the
    /// second order would net out the first.
    pub async fn open_hedged_pair(&mut self, symbol: &str, leverage: u32) -> Result<HedgedPair> {
        if !self.dual_side {
            return Err(BotError::HedgeModeDisabled {
                account: self.label.clone(),
            });
        }

        let (quantity, market) = self.size_leg(symbol, leverage).await?;

        let first_leg = if self.random.coin_flip() {
            PositionSide::Long
        } else {
            PositionSide::Short
        };

        let legs = async {
            let first = self.place_leg(symbol, first_leg, quantity, market.mid_price).await?;
            let second = self
                .place_leg(symbol, first_leg.opposite(), quantity, market.mid_price)
                .await?;
            Ok::<_, BotError>((first, second))
        }
        .await;

        let (first, second) = match legs {
            Ok(legs) => legs,
            Err(e) => {
                warn!(account = %self.label, error = %e, "Hedge open failed, closing positions");
                self.close_all_silent(symbol).await;
                return Err(BotError::position_open(&self.label, e));
            }
        };

        let (long, short) = if first_leg == PositionSide::Long {
            (first, second)
        } else {
            (second, first)
        };

        info!(
            account = %self.label,
            symbol = %symbol,
            quantity = %quantity,
            long_price = %long.entry_price,
            short_price = %short.entry_price,
            first = %first_leg,
            "Opened hedged pair"
        );

        Ok(HedgedPair {
            quantity,
            long,
            short,
            first_leg,
        })
    }

    /// Open one leg sized as half of a hedged pair.
    pub async fn open_single(
        &mut self,
        symbol: &str,
        side: PositionSide,
        leverage: u32,
    ) -> Result<PositionInfo> {
        let (quantity, market) = self.size_leg(symbol, leverage).await?;

        match self.place_leg(symbol, side, quantity, market.mid_price).await {
            Ok(position) => {
                info!(
                    account = %self.label,
                    symbol = %symbol,
                    side = %side,
                    quantity = %quantity,
                    price = %position.entry_price,
                    "Opened position"
                );
                Ok(position)
            }
            Err(e) => {
                warn!(account = %self.label, side = %side, error = %e, "Open failed, closing positions");
                self.close_all_silent(symbol).await;
                Err(BotError::position_open(&self.label, e))
            }
        }
    }

    /// Submit one opening market order. The entry price is the reported
    /// average fill, or `fallback_price` when none is reported.
    pub async fn place_leg(
        &self,
        symbol: &str,
        side: PositionSide,
        quantity: Decimal,
        fallback_price: Decimal,
    ) -> Result<PositionInfo> {
        let position_side = if self.dual_side { side } else { PositionSide::Both };
        let order = MarketOrder::new(symbol, side.opening_order(), position_side, quantity);

        let response = self.client.place_order(&order).await?;
        let entry_price = response.fill_price_or(fallback_price);

        debug!(
            account = %self.label,
            side = %side,
            order_id = ?response.order_id,
            client_order_id = ?response.client_order_id,
            status = ?response.status,
            executed_qty = ?response.executed_qty,
            "Order accepted"
        );

        Ok(PositionInfo::new(side, quantity, entry_price))
    }

    /// Sum of unrealized PnL over the symbol's open positions.
    pub async fn positions_pnl(&self, symbol: &str) -> Result<Decimal> {
        Ok(self
            .position_details(symbol)
            .await?
            .iter()
            .map(|p| p.unrealized_pnl)
            .sum())
    }

    /// Non-zero positions for the symbol.
    pub async fn position_details(&self, symbol: &str) -> Result<Vec<ActivePosition>> {
        let rows = self.client.position_risk(Some(symbol)).await?;
        Ok(rows
            .iter()
            .filter(|r| r.symbol == symbol)
            .filter_map(ActivePosition::from_risk)
            .collect())
    }

    /// Flatten every open position on the symbol with opposing market orders.
    ///
    /// Every position is attempted; the first failure is returned once all
    /// attempts are done. Returns the number of positions closed.
    pub async fn close_all(&self, symbol: &str) -> Result<usize> {
        let rows = self.client.position_risk(Some(symbol)).await?;

        let mut closed = 0;
        let mut first_error = None;

        for row in rows.iter().filter(|r| r.symbol == symbol && !r.position_amt.is_zero()) {
            let order = MarketOrder::new(
                symbol,
                OrderSide::closing(row.position_amt),
                row.position_side,
                row.position_amt.abs(),
            );

            match self.client.place_order(&order).await {
                Ok(_) => closed += 1,
                Err(e) => {
                    warn!(
                        account = %self.label,
                        side = %row.position_side,
                        error = %e,
                        "Failed to close position"
                    );
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }

        match first_error {
            Some(e) => Err(e.into()),
            None => {
                if closed > 0 {
                    info!(account = %self.label, symbol = %symbol, closed = closed, "Positions closed");
                }
                Ok(closed)
            }
        }
    }

    /// `close_all` for cleanup paths: failures are logged, never returned.
    pub async fn close_all_silent(&self, symbol: &str) {
        if let Err(e) = self.close_all(symbol).await {
            warn!(account = %self.label, symbol = %symbol, error = %e, "Cleanup close failed");
        }
    }
}
