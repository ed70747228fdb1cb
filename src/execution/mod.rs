// Order execution module
pub mod engine;
pub mod position;
pub mod precision;

pub use engine::{EngineOutcome, EngineState, ExecutionEngine};
pub use position::PositionManager;
pub use precision::PrecisionResolver;

use crate::exchange::ExchangeError;
use thiserror::Error;

/// Failures that abort a single trade attempt. The poll loop logs these
/// and moves on; they never stop the bot.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("precision lookup failed for {symbol}: {source}")]
    PrecisionLookup {
        symbol: String,
        #[source]
        source: ExchangeError,
    },

    #[error("sized quantity rounds to zero for {symbol} (notional {notional:.2} at mark {mark_price})")]
    ZeroQuantity {
        symbol: String,
        notional: f64,
        mark_price: f64,
    },

    #[error("order submission gave up after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last: ExchangeError,
    },

    #[error(transparent)]
    Exchange(#[from] ExchangeError),
}
