// Runtime settings, loaded from an optional TOML file plus environment overrides

use anyhow::Context;
use serde::Deserialize;
use std::collections::HashMap;

/// Per-instrument trade parameters, keyed by derived symbol (e.g. "XRPUSDT").
///
/// `take_profit_pct` and `stop_loss_pct` are fractions of the entry price:
/// 0.0035 means the take-profit sits 0.35% below a short entry.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InstrumentConfig {
    pub take_profit_pct: f64,
    pub stop_loss_pct: f64,
    pub leverage: u32,
    /// Hard cap on position notional in USD, before the balance-based cap
    pub max_notional_usd: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FeedSettings {
    /// Timeline page to poll, newest post first
    pub url: String,
    pub poll_interval_secs: u64,
    pub request_timeout_secs: u64,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            url: "https://nitter.net/whale_alert".to_string(),
            poll_interval_secs: 10,
            request_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TradingSettings {
    /// Transfers below this USD valuation never become signals
    pub min_notional_usd: f64,
    /// Fraction of the quote balance put at risk per entry
    pub account_risk: f64,
    /// Quote asset appended to tickers when deriving symbols
    pub quote_asset: String,
    pub max_retry_attempts: u32,
    /// Backoff after the n-th failed order attempt is base^n seconds
    pub backoff_base_secs: f64,
}

impl Default for TradingSettings {
    fn default() -> Self {
        Self {
            min_notional_usd: 50_000_000.0,
            account_risk: 0.05,
            quote_asset: "USDT".to_string(),
            max_retry_attempts: 3,
            backoff_base_secs: 2.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BinanceSettings {
    pub base_url: String,
    pub api_key: String,
    pub api_secret: String,
    pub recv_window_ms: u64,
}

impl Default for BinanceSettings {
    fn default() -> Self {
        Self {
            base_url: "https://fapi.binance.com".to_string(),
            api_key: String::new(),
            api_secret: String::new(),
            recv_window_ms: 5000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub feed: FeedSettings,
    pub trading: TradingSettings,
    pub binance: BinanceSettings,
    /// Tradeable instruments; transfers of any other asset are ignored
    pub instruments: HashMap<String, InstrumentConfig>,
    /// Append-only JSONL report of every parsed transaction, disabled when unset
    pub report_path: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            feed: FeedSettings::default(),
            trading: TradingSettings::default(),
            binance: BinanceSettings::default(),
            instruments: default_instruments(),
            report_path: None,
        }
    }
}

fn instrument(tp: f64, sl: f64, leverage: u32, max_notional: f64) -> InstrumentConfig {
    InstrumentConfig {
        take_profit_pct: tp,
        stop_loss_pct: sl,
        leverage,
        max_notional_usd: max_notional,
    }
}

fn default_instruments() -> HashMap<String, InstrumentConfig> {
    HashMap::from([
        ("XRPUSDT".to_string(), instrument(0.0035, 0.0015, 5, 15_000.0)),
        ("DOGEUSDT".to_string(), instrument(0.0060, 0.0025, 3, 10_000.0)),
        ("TRUMPUSDT".to_string(), instrument(0.0060, 0.0025, 3, 5_000.0)),
        ("SOLUSDT".to_string(), instrument(0.0035, 0.0015, 5, 15_000.0)),
        ("LTCUSDT".to_string(), instrument(0.0035, 0.0015, 5, 12_000.0)),
    ])
}

impl Settings {
    /// Load settings from a TOML file (optional) layered under
    /// `WHALEFLOW_*` environment overrides. Credentials additionally
    /// honor the plain `BINANCE_API_KEY` / `BINANCE_API_SECRET` names.
    pub fn load(path: Option<&str>) -> anyhow::Result<Self> {
        let builder = config::Config::builder();
        let builder = match path {
            Some(p) => builder.add_source(config::File::with_name(p)),
            None => builder.add_source(config::File::with_name("whaleflow").required(false)),
        };
        let loaded = builder
            .add_source(
                config::Environment::with_prefix("WHALEFLOW")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("loading configuration")?;

        let mut settings: Settings = loaded
            .try_deserialize()
            .context("configuration is malformed")?;

        // The config crate folds table keys to lowercase; lookups use the
        // uppercase symbols the evaluator derives.
        let instruments = std::mem::take(&mut settings.instruments);
        settings.instruments = instruments
            .into_iter()
            .map(|(symbol, cfg)| (symbol.to_uppercase(), cfg))
            .collect();

        if let Ok(key) = std::env::var("BINANCE_API_KEY") {
            settings.binance.api_key = key;
        }
        if let Ok(secret) = std::env::var("BINANCE_API_SECRET") {
            settings.binance.api_secret = secret;
        }

        Ok(settings)
    }
}
