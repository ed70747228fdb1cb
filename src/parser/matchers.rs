// Counterparty extraction. Three matchers tried in fixed order; the
// first that fires wins, and any side it leaves unresolved stays None.

use once_cell::sync::Lazy;
use regex::Regex;

/// The placeholder the feed uses for unattributed addresses.
pub const UNKNOWN_WALLET: &str = "unknown wallet";

static TAGGED_PAIR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bfrom\s+#([A-Za-z0-9]+)\s+to\s+#([A-Za-z0-9]+)").unwrap());

static UNKNOWN_WALLET_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(from|to)\s+unknown wallet").unwrap());

static TAGGED_FROM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bfrom\s+#([A-Za-z0-9]+)").unwrap());

static TAGGED_TO_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bto\s+#([A-Za-z0-9]+)").unwrap());

static FREE_FROM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bfrom\s+([A-Za-z0-9 ]+)\s+to\b").unwrap());

static FREE_TO_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bto\s+([A-Za-z0-9 ]+)").unwrap());

#[derive(Debug, Default, PartialEq)]
pub struct Counterparties {
    pub from: Option<String>,
    pub to: Option<String>,
}

/// Resolve both sides of a transfer, defaulting unresolved sides to
/// `"unknown"`.
pub fn counterparties(text: &str) -> (String, String) {
    let matched = tagged_pair(text)
        .or_else(|| unknown_wallet(text))
        .or_else(|| free_text(text))
        .unwrap_or_default();

    (
        matched.from.unwrap_or_else(|| "unknown".to_string()),
        matched.to.unwrap_or_else(|| "unknown".to_string()),
    )
}

/// `from #X to #Y`, both sides hashtagged.
fn tagged_pair(text: &str) -> Option<Counterparties> {
    let caps = TAGGED_PAIR_RE.captures(text)?;
    Some(Counterparties {
        from: Some(clean_entity(&caps[1])),
        to: Some(clean_entity(&caps[2])),
    })
}

/// One side is the "unknown wallet" placeholder; the other side is
/// taken from a hashtag match if present.
fn unknown_wallet(text: &str) -> Option<Counterparties> {
    let caps = UNKNOWN_WALLET_RE.captures(text)?;
    let counterparties = match &caps[1] {
        "from" => Counterparties {
            from: Some(UNKNOWN_WALLET.to_string()),
            to: TAGGED_TO_RE.captures(text).map(|c| clean_entity(&c[1])),
        },
        _ => Counterparties {
            from: TAGGED_FROM_RE.captures(text).map(|c| clean_entity(&c[1])),
            to: Some(UNKNOWN_WALLET.to_string()),
        },
    };
    Some(counterparties)
}

/// Plain-word fallback: `from <words> to` and `to <words>`, tried
/// independently per side.
fn free_text(text: &str) -> Option<Counterparties> {
    let from = FREE_FROM_RE.captures(text).map(|c| clean_entity(&c[1]));
    let to = FREE_TO_RE.captures(text).map(|c| clean_entity(&c[1]));

    if from.is_none() && to.is_none() {
        return None;
    }
    Some(Counterparties { from, to })
}

fn clean_entity(raw: &str) -> String {
    raw.trim().trim_end_matches('#').trim().to_string()
}
