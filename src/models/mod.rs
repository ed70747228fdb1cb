// Core data types shared across the pipeline

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single post as observed on the feed timeline, before any parsing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawPost {
    /// Stable per-post identifier (the status id), used for de-duplication
    pub id: String,
    /// Visible post text with markup stripped
    pub text: String,
    /// Human-readable timestamp string as rendered by the feed, if present
    pub timestamp_title: Option<String>,
    /// Permalink to the post
    pub link: Option<String>,
    /// When the poller observed this post
    pub observed_at: DateTime<Utc>,
}

/// Structured transfer extracted from a post's free text.
///
/// `from_entity` / `to_entity` default to `"unknown"` when no matcher
/// resolved that side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedTransaction {
    /// Asset amount, always positive
    pub amount: f64,
    /// Uppercase asset ticker, e.g. "XRP"
    pub asset: String,
    /// USD valuation if the post carried one
    pub usd_value: Option<f64>,
    pub from_entity: String,
    pub to_entity: String,
    /// Original post text, kept for the report trail
    pub raw_text: String,
    /// Raw timestamp string before normalization
    pub timestamp_text: Option<String>,
    /// Normalized UTC timestamp, when the raw string was parseable
    pub timestamp: Option<DateTime<Utc>>,
    pub source_link: Option<String>,
}

/// A transfer that passed every evaluator gate and should be traded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub asset: String,
    /// USD valuation, at or above the configured minimum notional
    pub usd_value: f64,
    /// Canonical name of the destination exchange, e.g. "Binance"
    pub destination: String,
    /// Derived perp symbol, e.g. "XRPUSDT"
    pub symbol: String,
}

/// A live short position, recorded only after the venue confirmed the entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    /// Filled quantity in base asset units
    pub quantity: f64,
    /// Average fill price, or the mark price when the venue omitted it
    pub entry_price: f64,
    pub opened_at: DateTime<Utc>,
    /// Venue order ids of the accepted bracket legs
    pub bracket_order_ids: Vec<i64>,
    /// False when at least one bracket leg was rejected and the position
    /// is missing an exit on that side
    pub protected: bool,
}
