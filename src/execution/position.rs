// Position tracking. The venue is the source of truth for the entry
// guard; the local book only records what this process opened, for
// logging and the end-of-run summary.

use crate::exchange::{ExchangeApi, ExchangeError};
use crate::models::Position;
use std::collections::HashMap;
use std::sync::Arc;

pub struct PositionManager {
    exchange: Arc<dyn ExchangeApi>,
    open: HashMap<String, Position>,
}

impl PositionManager {
    pub fn new(exchange: Arc<dyn ExchangeApi>) -> Self {
        Self {
            exchange,
            open: HashMap::new(),
        }
    }

    /// Live venue query; local records are never consulted. Brackets
    /// close positions without this process noticing, and a stale
    /// "open" record must never block a fresh entry.
    pub async fn has_open_position(&self, symbol: &str) -> Result<bool, ExchangeError> {
        Ok(self.exchange.position(symbol).await?.is_some())
    }

    /// Cancel resting orders left behind by a position the venue has
    /// since closed. Failures are logged, not propagated: stale
    /// brackets are annoying, a blocked entry is worse.
    pub async fn clear_stale_orders(&self, symbol: &str) {
        if let Err(e) = self.exchange.cancel_open_orders(symbol).await {
            tracing::warn!(symbol, error = %e, "failed to cancel resting orders");
        }
    }

    /// Record a venue-confirmed fill.
    pub fn register_fill(&mut self, position: Position) {
        tracing::info!(
            symbol = %position.symbol,
            quantity = position.quantity,
            entry_price = position.entry_price,
            protected = position.protected,
            "position recorded"
        );
        if let Some(previous) = self.open.insert(position.symbol.clone(), position) {
            tracing::warn!(
                symbol = %previous.symbol,
                "replaced an existing local record, venue likely closed it unobserved"
            );
        }
    }

    pub fn recorded(&self, symbol: &str) -> Option<&Position> {
        self.open.get(symbol)
    }

    pub fn recorded_count(&self) -> usize {
        self.open.len()
    }
}
