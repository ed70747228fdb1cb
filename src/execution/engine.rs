// Turns an accepted signal into a short position: leverage, sizing,
// market entry with retries, then reduce-only brackets. One engine
// instance handles exactly one signal.

use crate::config::{InstrumentConfig, TradingSettings};
use crate::exchange::{ExchangeApi, OrderAck, OrderKind, OrderRequest, OrderSide};
use crate::execution::position::PositionManager;
use crate::execution::precision::PrecisionResolver;
use crate::execution::ExecutionError;
use crate::models::Position;
use chrono::Utc;
use rust_decimal::prelude::ToPrimitive;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    LeverageSet,
    Sizing,
    EntrySubmitted,
    EntryFilled,
    BracketsSubmitted,
    Done,
    Failed,
}

#[derive(Debug, Clone)]
pub enum EngineOutcome {
    /// Entry filled and recorded. `position.protected` is false when a
    /// bracket leg was rejected.
    Opened(Position),
    /// The guard declined the entry before any order went out.
    Skipped { reason: &'static str },
}

pub struct ExecutionEngine {
    exchange: Arc<dyn ExchangeApi>,
    trading: TradingSettings,
    instrument: InstrumentConfig,
    symbol: String,
    state: EngineState,
}

impl ExecutionEngine {
    pub fn new(
        exchange: Arc<dyn ExchangeApi>,
        trading: TradingSettings,
        instrument: InstrumentConfig,
        symbol: impl Into<String>,
    ) -> Self {
        Self {
            exchange,
            trading,
            instrument,
            symbol: symbol.into(),
            state: EngineState::Idle,
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Drive the trade to completion. Any error leaves the engine in
    /// `Failed`; the caller logs and abandons this signal.
    pub async fn run(
        &mut self,
        positions: &mut PositionManager,
        resolver: &PrecisionResolver,
    ) -> Result<EngineOutcome, ExecutionError> {
        match self.advance(positions, resolver).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                self.state = EngineState::Failed;
                Err(e)
            }
        }
    }

    async fn advance(
        &mut self,
        positions: &mut PositionManager,
        resolver: &PrecisionResolver,
    ) -> Result<EngineOutcome, ExecutionError> {
        // One position per symbol, and the venue decides what is open.
        if positions.has_open_position(&self.symbol).await? {
            tracing::info!(symbol = %self.symbol, "position already open, skipping entry");
            return Ok(EngineOutcome::Skipped {
                reason: "position already open",
            });
        }
        positions.clear_stale_orders(&self.symbol).await;

        // Leverage is best-effort: the venue keeps the last configured
        // value, so a failure here only means a stale but sane setting.
        match self
            .exchange
            .set_leverage(&self.symbol, self.instrument.leverage)
            .await
        {
            Ok(()) => {
                tracing::debug!(
                    symbol = %self.symbol,
                    leverage = self.instrument.leverage,
                    "leverage set"
                )
            }
            Err(e) => {
                tracing::warn!(
                    symbol = %self.symbol,
                    error = %e,
                    "leverage change failed, continuing"
                )
            }
        }
        self.state = EngineState::LeverageSet;

        self.state = EngineState::Sizing;
        let precision = resolver.resolve(&self.symbol).await.map_err(|source| {
            ExecutionError::PrecisionLookup {
                symbol: self.symbol.clone(),
                source,
            }
        })?;
        let mark_price = self.exchange.mark_price(&self.symbol).await?;
        let balance = self
            .exchange
            .account_balance(&self.trading.quote_asset)
            .await?;

        let risk_notional = balance * self.trading.account_risk * self.instrument.leverage as f64;
        let notional = self.instrument.max_notional_usd.min(risk_notional);
        let quantity = precision
            .quantize_quantity(notional / mark_price)
            .filter(|q| !q.is_zero())
            .ok_or_else(|| ExecutionError::ZeroQuantity {
                symbol: self.symbol.clone(),
                notional,
                mark_price,
            })?;

        tracing::info!(
            symbol = %self.symbol,
            %quantity,
            notional,
            mark_price,
            balance,
            "sized short entry"
        );

        self.state = EngineState::EntrySubmitted;
        let entry = OrderRequest::market(&self.symbol, OrderSide::Sell, quantity);
        let ack = self.submit_with_retry(&entry).await?;

        self.state = EngineState::EntryFilled;
        let entry_price = ack.avg_fill_price.unwrap_or(mark_price);
        tracing::info!(
            symbol = %self.symbol,
            order_id = ack.order_id,
            entry_price,
            "✅ short entry filled"
        );

        self.state = EngineState::BracketsSubmitted;
        let take_profit = entry_price * (1.0 - self.instrument.take_profit_pct);
        let stop_loss = entry_price * (1.0 + self.instrument.stop_loss_pct);

        let mut bracket_order_ids = Vec::new();
        let mut protected = true;
        let legs = [
            (OrderKind::TakeProfitMarket, take_profit),
            (OrderKind::StopMarket, stop_loss),
        ];
        for (kind, raw_price) in legs {
            let Some(trigger) = precision.quantize_price(raw_price) else {
                protected = false;
                tracing::error!(
                    symbol = %self.symbol,
                    kind = kind.as_str(),
                    raw_price,
                    "bracket price does not quantize, leg not placed"
                );
                continue;
            };
            let leg = OrderRequest::conditional_close(&self.symbol, OrderSide::Buy, kind, trigger);
            match self.submit_with_retry(&leg).await {
                Ok(leg_ack) => {
                    tracing::info!(
                        symbol = %self.symbol,
                        kind = kind.as_str(),
                        trigger = %trigger,
                        order_id = leg_ack.order_id,
                        "bracket leg placed"
                    );
                    bracket_order_ids.push(leg_ack.order_id);
                }
                Err(e) => {
                    protected = false;
                    tracing::error!(
                        symbol = %self.symbol,
                        kind = kind.as_str(),
                        error = %e,
                        "⚠️  bracket leg rejected, position lacks an exit on this side"
                    );
                }
            }
        }

        self.state = EngineState::Done;
        let position = Position {
            symbol: self.symbol.clone(),
            quantity: quantity.to_f64().unwrap_or(0.0),
            entry_price,
            opened_at: Utc::now(),
            bracket_order_ids,
            protected,
        };
        positions.register_fill(position.clone());

        Ok(EngineOutcome::Opened(position))
    }

    /// Submit with exponential backoff: after the n-th failure (counted
    /// from zero) wait base^n seconds, including after the final one.
    async fn submit_with_retry(&self, order: &OrderRequest) -> Result<OrderAck, ExecutionError> {
        let attempts = self.trading.max_retry_attempts.max(1);
        let mut attempt = 0;
        loop {
            match self.exchange.submit_order(order).await {
                Ok(ack) => return Ok(ack),
                Err(e) => {
                    let delay = Duration::from_secs_f64(
                        self.trading.backoff_base_secs.powi(attempt as i32).max(0.0),
                    );
                    tracing::warn!(
                        symbol = %order.symbol,
                        kind = order.kind.as_str(),
                        error = %e,
                        "order attempt {}/{} failed, backing off {:?}",
                        attempt + 1,
                        attempts,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                    if attempt >= attempts {
                        return Err(ExecutionError::RetriesExhausted { attempts, last: e });
                    }
                }
            }
        }
    }
}
