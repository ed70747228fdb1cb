// Per-symbol quantization metadata, fetched once and cached for the
// life of the process. Steps and ticks change rarely enough that a
// restart on instrument re-listing is acceptable.

use crate::exchange::{ExchangeApi, ExchangeError, InstrumentPrecision};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

pub struct PrecisionResolver {
    exchange: Arc<dyn ExchangeApi>,
    cache: Mutex<HashMap<String, InstrumentPrecision>>,
}

impl PrecisionResolver {
    pub fn new(exchange: Arc<dyn ExchangeApi>) -> Self {
        Self {
            exchange,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Quantization metadata for a symbol, hitting the venue at most
    /// once per symbol. Unknown symbols propagate as errors and are
    /// never cached.
    pub async fn resolve(&self, symbol: &str) -> Result<InstrumentPrecision, ExchangeError> {
        let mut cache = self.cache.lock().await;
        if let Some(precision) = cache.get(symbol) {
            return Ok(precision.clone());
        }

        let precision = self.exchange.symbol_metadata(symbol).await?;
        tracing::debug!(
            symbol,
            step = %precision.quantity_step,
            tick = %precision.price_tick,
            "cached instrument precision"
        );
        cache.insert(symbol.to_string(), precision.clone());
        Ok(precision)
    }
}
