// Turns free-text transfer announcements into structured transactions

pub mod matchers;
pub mod timestamp;

use crate::models::ParsedTransaction;
use once_cell::sync::Lazy;
use regex::Regex;

/// `1,000,000 #XRP` styled amount plus hashtagged ticker. The first
/// such pair in the text is the transfer amount.
static AMOUNT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([\d,]+(?:\.\d+)?)\s+#([A-Za-z0-9]+)").unwrap());

/// USD valuation, e.g. `(450,000 USD)` or `$450,000 USD`. The word
/// boundary keeps this from firing inside stablecoin tickers.
static USD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b([\d,]+(?:\.\d+)?)\s+USD\b").unwrap());

/// Parse one announcement. `None` when the text carries no amount/ticker
/// pair (service notes, replies) or a number fails to parse.
pub fn parse(text: &str) -> Option<ParsedTransaction> {
    let caps = AMOUNT_RE.captures(text)?;

    let Some(amount) = parse_number(&caps[1]) else {
        tracing::warn!(raw = &caps[1], "unparseable amount, dropping post");
        return None;
    };
    if amount <= 0.0 {
        tracing::warn!(amount, "non-positive amount, dropping post");
        return None;
    }
    let asset = caps[2].to_uppercase();

    let usd_value = match USD_RE.captures(text) {
        Some(usd_caps) => match parse_number(&usd_caps[1]) {
            Some(value) => Some(value),
            None => {
                tracing::warn!(raw = &usd_caps[1], "unparseable USD value, dropping post");
                return None;
            }
        },
        None => None,
    };

    let (from_entity, to_entity) = matchers::counterparties(text);

    Some(ParsedTransaction {
        amount,
        asset,
        usd_value,
        from_entity,
        to_entity,
        raw_text: text.to_string(),
        timestamp_text: None,
        timestamp: None,
        source_link: None,
    })
}

fn parse_number(raw: &str) -> Option<f64> {
    raw.replace(',', "").parse().ok()
}
