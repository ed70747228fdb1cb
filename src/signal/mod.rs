// Decides which parsed transactions are worth shorting

use crate::config::{InstrumentConfig, Settings};
use crate::models::{ParsedTransaction, Signal};
use crate::parser::matchers::UNKNOWN_WALLET;
use std::collections::HashMap;

/// Destinations that count as exchange inflows. Deposits anywhere else
/// (cold storage, bridges, OTC desks) carry no sell pressure signal.
pub const KNOWN_EXCHANGES: &[&str] = &["Binance", "Coinbase", "Bybit", "Kraken", "OKX", "HTX"];

/// Applies the signal gates in order: exchange destination, unknown
/// wallet source, minimum USD notional, configured instrument.
pub struct SignalEvaluator {
    min_notional_usd: f64,
    quote_asset: String,
    instruments: HashMap<String, InstrumentConfig>,
}

impl SignalEvaluator {
    pub fn new(settings: &Settings) -> Self {
        Self {
            min_notional_usd: settings.trading.min_notional_usd,
            quote_asset: settings.trading.quote_asset.clone(),
            instruments: settings.instruments.clone(),
        }
    }

    /// Returns a [`Signal`] when every gate passes, `None` otherwise.
    pub fn evaluate(&self, tx: &ParsedTransaction) -> Option<Signal> {
        let Some(destination) = known_exchange(&tx.to_entity) else {
            tracing::debug!(to = %tx.to_entity, "destination is not a known exchange");
            return None;
        };

        if tx.from_entity != UNKNOWN_WALLET {
            tracing::debug!(from = %tx.from_entity, "source is attributed, not a whale wallet");
            return None;
        }

        let Some(usd_value) = tx.usd_value else {
            tracing::debug!(asset = %tx.asset, "no USD valuation on the transfer");
            return None;
        };

        if usd_value < self.min_notional_usd {
            tracing::info!(
                asset = %tx.asset,
                usd_value,
                min = self.min_notional_usd,
                "transfer below notional threshold"
            );
            return None;
        }

        let symbol = format!("{}{}", tx.asset, self.quote_asset);
        if !self.instruments.contains_key(&symbol) {
            tracing::info!(%symbol, "no instrument configured for this asset");
            return None;
        }

        tracing::info!(
            asset = %tx.asset,
            usd_value,
            destination = %destination,
            %symbol,
            "🐋 whale inflow signal"
        );

        Some(Signal {
            asset: tx.asset.clone(),
            usd_value,
            destination,
            symbol,
        })
    }

    /// Trade parameters for a derived symbol.
    pub fn instrument(&self, symbol: &str) -> Option<&InstrumentConfig> {
        self.instruments.get(symbol)
    }
}

/// Case-insensitive membership test returning the canonical exchange name.
fn known_exchange(entity: &str) -> Option<String> {
    let trimmed = entity.trim();
    KNOWN_EXCHANGES
        .iter()
        .find(|name| name.eq_ignore_ascii_case(trimmed))
        .map(|name| name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn evaluator() -> SignalEvaluator {
        SignalEvaluator::new(&Settings::default())
    }

    fn whale_tx(usd_value: Option<f64>) -> ParsedTransaction {
        ParsedTransaction {
            amount: 30_000_000.0,
            asset: "XRP".to_string(),
            usd_value,
            from_entity: UNKNOWN_WALLET.to_string(),
            to_entity: "Binance".to_string(),
            raw_text: String::new(),
            timestamp_text: None,
            timestamp: None,
            source_link: None,
        }
    }

    #[test]
    fn qualifying_transfer_becomes_a_signal() {
        let signal = evaluator().evaluate(&whale_tx(Some(60_000_000.0))).unwrap();

        assert_eq!(signal.symbol, "XRPUSDT");
        assert_eq!(signal.destination, "Binance");
        assert_eq!(signal.usd_value, 60_000_000.0);
    }

    #[test]
    fn below_threshold_is_rejected() {
        assert!(evaluator().evaluate(&whale_tx(Some(450_000.0))).is_none());
    }

    #[test]
    fn threshold_is_inclusive() {
        assert!(evaluator().evaluate(&whale_tx(Some(50_000_000.0))).is_some());
    }

    #[test]
    fn missing_valuation_is_rejected() {
        assert!(evaluator().evaluate(&whale_tx(None)).is_none());
    }

    #[test]
    fn attributed_source_is_rejected() {
        let mut tx = whale_tx(Some(60_000_000.0));
        tx.from_entity = "Coinbase".to_string();
        assert!(evaluator().evaluate(&tx).is_none());
    }

    #[test]
    fn non_exchange_destination_is_rejected() {
        let mut tx = whale_tx(Some(60_000_000.0));
        tx.to_entity = "unknown wallet".to_string();
        assert!(evaluator().evaluate(&tx).is_none());

        tx.to_entity = "cold storage".to_string();
        assert!(evaluator().evaluate(&tx).is_none());
    }

    #[test]
    fn exchange_match_is_case_insensitive() {
        let mut tx = whale_tx(Some(60_000_000.0));
        tx.to_entity = "binance".to_string();

        let signal = evaluator().evaluate(&tx).unwrap();
        assert_eq!(signal.destination, "Binance", "canonical casing restored");
    }

    #[test]
    fn unconfigured_asset_is_rejected() {
        let mut tx = whale_tx(Some(60_000_000.0));
        tx.asset = "PEPE".to_string();
        assert!(evaluator().evaluate(&tx).is_none());
    }
}
