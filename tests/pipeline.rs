// End-to-end pipeline runs against scripted fakes: a canned feed and a
// recording venue. No network, no live endpoints.

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use whaleflow::bot::{Bot, CycleOutcome};
use whaleflow::config::Settings;
use whaleflow::exchange::{
    AccountPosition, ExchangeApi, ExchangeError, InstrumentPrecision, OrderAck, OrderKind,
    OrderRequest, OrderSide,
};
use whaleflow::feed::{FeedSource, Poller};
use whaleflow::models::RawPost;

const WHALE_TEXT: &str =
    "🚨 🚨 🚨 30,000,000 #XRP (60,000,000 USD) transferred from unknown wallet to #Binance";
const SMALL_TEXT: &str =
    "🚨 1,000,000 #XRP (450,000 USD) transferred from unknown wallet to #Binance";
const SERVICE_TEXT: &str = "We are migrating servers, alerts may be delayed";

enum Step {
    Post(RawPost),
    Nothing,
    Fail,
}

struct ScriptedFeed {
    steps: Mutex<VecDeque<Step>>,
}

impl ScriptedFeed {
    fn new(steps: Vec<Step>) -> Self {
        Self {
            steps: Mutex::new(steps.into()),
        }
    }
}

#[async_trait]
impl FeedSource for ScriptedFeed {
    async fn fetch_latest(&self) -> anyhow::Result<Option<RawPost>> {
        match self.steps.lock().unwrap().pop_front() {
            Some(Step::Post(post)) => Ok(Some(post)),
            Some(Step::Nothing) | None => Ok(None),
            Some(Step::Fail) => anyhow::bail!("feed responded with status 502"),
        }
    }
}

fn post(id: &str, text: &str) -> RawPost {
    RawPost {
        id: id.to_string(),
        text: text.to_string(),
        timestamp_title: Some("May 21, 2025 · 7:03 PM UTC".to_string()),
        link: Some(format!("https://nitter.net/whale_alert/status/{id}#m")),
        observed_at: Utc::now(),
    }
}

/// Venue fake that records every order it acks. The first `order_failures`
/// submissions are rejected with a 503 instead.
struct RecordingVenue {
    mark: f64,
    balance: f64,
    open_position: Option<AccountPosition>,
    order_failures: AtomicU32,
    orders: Mutex<Vec<OrderRequest>>,
}

impl RecordingVenue {
    fn new() -> Self {
        Self {
            mark: 2.0,
            balance: 100_000.0,
            open_position: None,
            order_failures: AtomicU32::new(0),
            orders: Mutex::new(Vec::new()),
        }
    }

    fn orders(&self) -> Vec<OrderRequest> {
        self.orders.lock().unwrap().clone()
    }
}

#[async_trait]
impl ExchangeApi for RecordingVenue {
    async fn symbol_metadata(&self, _symbol: &str) -> Result<InstrumentPrecision, ExchangeError> {
        Ok(InstrumentPrecision {
            quantity_step: "0.1".parse().unwrap(),
            price_tick: "0.0001".parse().unwrap(),
            quantity_decimals: 1,
            price_decimals: 4,
        })
    }

    async fn mark_price(&self, _symbol: &str) -> Result<f64, ExchangeError> {
        Ok(self.mark)
    }

    async fn account_balance(&self, _asset: &str) -> Result<f64, ExchangeError> {
        Ok(self.balance)
    }

    async fn position(&self, _symbol: &str) -> Result<Option<AccountPosition>, ExchangeError> {
        Ok(self.open_position.clone())
    }

    async fn cancel_open_orders(&self, _symbol: &str) -> Result<(), ExchangeError> {
        Ok(())
    }

    async fn set_leverage(&self, _symbol: &str, _leverage: u32) -> Result<(), ExchangeError> {
        Ok(())
    }

    async fn submit_order(&self, order: &OrderRequest) -> Result<OrderAck, ExchangeError> {
        if self.order_failures.load(Ordering::SeqCst) > 0 {
            self.order_failures.fetch_sub(1, Ordering::SeqCst);
            return Err(ExchangeError::Api {
                status: 503,
                message: "service unavailable".to_string(),
            });
        }
        self.orders.lock().unwrap().push(order.clone());
        let (order_id, avg_fill_price) = match order.kind {
            OrderKind::Market => (1, Some(2.05)),
            OrderKind::TakeProfitMarket => (2, None),
            OrderKind::StopMarket => (3, None),
        };
        Ok(OrderAck {
            order_id,
            client_order_id: order.client_order_id.clone(),
            avg_fill_price,
            status: "NEW".to_string(),
        })
    }
}

fn bot_with(feed: ScriptedFeed, venue: Arc<RecordingVenue>, settings: Settings) -> Bot {
    Bot::new(settings, Poller::new(Box::new(feed)), venue).unwrap()
}

#[tokio::test]
async fn whale_inflow_round_trip() {
    let _ = tracing_subscriber::fmt::try_init();

    let report_path =
        std::env::temp_dir().join(format!("pipeline-{}.jsonl", uuid::Uuid::new_v4()));
    let mut settings = Settings::default();
    settings.report_path = Some(report_path.display().to_string());

    let feed = ScriptedFeed::new(vec![
        Step::Post(post("1001", WHALE_TEXT)),
        Step::Post(post("1001", WHALE_TEXT)), // same id again
        Step::Post(post("1002", SMALL_TEXT)),
        Step::Post(post("1003", SERVICE_TEXT)),
        Step::Nothing,
    ]);
    let venue = Arc::new(RecordingVenue::new());
    let mut bot = bot_with(feed, venue.clone(), settings);

    // 1. qualifying transfer opens a short
    let outcome = bot.run_cycle().await.unwrap();
    assert_eq!(
        outcome,
        CycleOutcome::Opened {
            symbol: "XRPUSDT".to_string()
        }
    );

    let orders = venue.orders();
    assert_eq!(orders.len(), 3, "entry plus two bracket legs");
    assert_eq!(orders[0].kind, OrderKind::Market);
    assert_eq!(orders[0].side, OrderSide::Sell);
    // min(15000 cap, 100000 * 0.05 * 5) / 2.0 mark = 7500
    assert_eq!(orders[0].quantity, Some("7500.0".parse().unwrap()));
    assert!(orders[1].close_position && orders[2].close_position);

    // 2. the same post id is not traded twice
    assert_eq!(bot.run_cycle().await.unwrap(), CycleOutcome::NoNewPost);
    assert_eq!(venue.orders().len(), 3);

    // 3. a small transfer is parsed and reported but rejected
    assert_eq!(bot.run_cycle().await.unwrap(), CycleOutcome::Rejected);
    assert_eq!(venue.orders().len(), 3);

    // 4. service chatter is not a transaction
    assert_eq!(bot.run_cycle().await.unwrap(), CycleOutcome::NotATransaction);

    // 5. quiet feed
    assert_eq!(bot.run_cycle().await.unwrap(), CycleOutcome::NoNewPost);

    // the report holds both parsed transfers, with normalized timestamps
    let contents = std::fs::read_to_string(&report_path).unwrap();
    let rows: Vec<whaleflow::ParsedTransaction> = contents
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].usd_value, Some(60_000_000.0));
    assert_eq!(rows[1].usd_value, Some(450_000.0));
    assert_eq!(
        rows[0].timestamp,
        Some(Utc.with_ymd_and_hms(2025, 5, 21, 19, 3, 0).unwrap())
    );
    assert_eq!(
        rows[0].source_link.as_deref(),
        Some("https://nitter.net/whale_alert/status/1001#m")
    );

    std::fs::remove_file(&report_path).ok();
}

#[tokio::test]
async fn feed_failure_is_contained_to_its_cycle() {
    let feed = ScriptedFeed::new(vec![Step::Fail, Step::Post(post("2001", WHALE_TEXT))]);
    let venue = Arc::new(RecordingVenue::new());
    let mut bot = bot_with(feed, venue.clone(), Settings::default());

    let err = bot.run_cycle().await.unwrap_err();
    assert!(err.to_string().contains("502"));

    // the next cycle proceeds as if nothing happened
    let outcome = bot.run_cycle().await.unwrap();
    assert_eq!(
        outcome,
        CycleOutcome::Opened {
            symbol: "XRPUSDT".to_string()
        }
    );
    assert_eq!(venue.orders().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn execution_failure_is_contained_to_its_cycle() {
    let feed = ScriptedFeed::new(vec![
        Step::Post(post("5001", WHALE_TEXT)),
        Step::Post(post("5002", WHALE_TEXT)),
    ]);
    let venue = Arc::new(RecordingVenue {
        order_failures: AtomicU32::new(3),
        ..RecordingVenue::new()
    });
    let mut bot = bot_with(feed, venue.clone(), Settings::default());

    // the entry retry budget exhausts against the failing venue
    let outcome = bot.run_cycle().await.unwrap();
    assert_eq!(
        outcome,
        CycleOutcome::Failed {
            symbol: "XRPUSDT".to_string()
        }
    );
    assert!(venue.orders().is_empty());

    // the venue recovers and the next post trades normally
    let outcome = bot.run_cycle().await.unwrap();
    assert_eq!(
        outcome,
        CycleOutcome::Opened {
            symbol: "XRPUSDT".to_string()
        }
    );
    assert_eq!(venue.orders().len(), 3);
}

#[tokio::test]
async fn existing_position_blocks_reentry() {
    let feed = ScriptedFeed::new(vec![Step::Post(post("3001", WHALE_TEXT))]);
    let venue = Arc::new(RecordingVenue {
        open_position: Some(AccountPosition {
            symbol: "XRPUSDT".to_string(),
            quantity: -7500.0,
            entry_price: 2.05,
        }),
        ..RecordingVenue::new()
    });
    let mut bot = bot_with(feed, venue.clone(), Settings::default());

    assert_eq!(bot.run_cycle().await.unwrap(), CycleOutcome::Skipped);
    assert!(venue.orders().is_empty());
}

#[tokio::test]
async fn transfers_to_unlisted_destinations_never_trade() {
    let text = "30,000,000 #XRP (60,000,000 USD) transferred from unknown wallet to unknown wallet";
    let feed = ScriptedFeed::new(vec![Step::Post(post("4001", text))]);
    let venue = Arc::new(RecordingVenue::new());
    let mut bot = bot_with(feed, venue.clone(), Settings::default());

    assert_eq!(bot.run_cycle().await.unwrap(), CycleOutcome::Rejected);
    assert!(venue.orders().is_empty());
}
