// Venue abstraction: order types shared across the crate plus the REST client

pub mod binance;

pub use binance::BinanceFuturesClient;

use async_trait::async_trait;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("http transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("venue rejected request (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("symbol {0} not present in venue metadata")]
    UnknownSymbol(String),

    #[error("malformed venue response: {0}")]
    MalformedResponse(String),

    #[error("request signing failed: {0}")]
    Signing(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "BUY",
            OrderSide::Sell => "SELL",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderKind {
    Market,
    TakeProfitMarket,
    StopMarket,
}

impl OrderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderKind::Market => "MARKET",
            OrderKind::TakeProfitMarket => "TAKE_PROFIT_MARKET",
            OrderKind::StopMarket => "STOP_MARKET",
        }
    }
}

/// Price the venue watches when deciding whether a conditional order triggers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkingType {
    ContractPrice,
    MarkPrice,
}

impl WorkingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkingType::ContractPrice => "CONTRACT_PRICE",
            WorkingType::MarkPrice => "MARK_PRICE",
        }
    }
}

/// Parameters for a single order submission.
#[derive(Debug, Clone)]
pub struct OrderRequest {
    pub symbol: String,
    pub side: OrderSide,
    pub kind: OrderKind,
    /// Base asset quantity; absent for close-position conditionals
    pub quantity: Option<Decimal>,
    /// Trigger price for conditional orders
    pub stop_price: Option<Decimal>,
    /// When set the order closes the whole position at trigger,
    /// regardless of quantity
    pub close_position: bool,
    pub working_type: Option<WorkingType>,
    pub client_order_id: Option<String>,
}

impl OrderRequest {
    /// Immediate entry at the current market price.
    pub fn market(symbol: &str, side: OrderSide, quantity: Decimal) -> Self {
        Self {
            symbol: symbol.to_string(),
            side,
            kind: OrderKind::Market,
            quantity: Some(quantity),
            stop_price: None,
            close_position: false,
            working_type: None,
            client_order_id: Some(new_client_order_id()),
        }
    }

    /// Conditional order that flattens the whole position once the last
    /// traded price crosses `stop_price`.
    pub fn conditional_close(
        symbol: &str,
        side: OrderSide,
        kind: OrderKind,
        stop_price: Decimal,
    ) -> Self {
        Self {
            symbol: symbol.to_string(),
            side,
            kind,
            quantity: None,
            stop_price: Some(stop_price),
            close_position: true,
            working_type: Some(WorkingType::ContractPrice),
            client_order_id: Some(new_client_order_id()),
        }
    }
}

fn new_client_order_id() -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("wf-{}", &id[..12])
}

/// Venue acknowledgement for a submitted order.
///
/// `avg_fill_price` is `None` when the venue has not (yet) reported a
/// fill price; a reported price of zero counts as unreported.
#[derive(Debug, Clone)]
pub struct OrderAck {
    pub order_id: i64,
    pub client_order_id: Option<String>,
    pub avg_fill_price: Option<f64>,
    pub status: String,
}

/// Open position as reported by the venue. `quantity` is signed, shorts
/// are negative.
#[derive(Debug, Clone)]
pub struct AccountPosition {
    pub symbol: String,
    pub quantity: f64,
    pub entry_price: f64,
}

/// Per-symbol quantization metadata from venue trading rules.
#[derive(Debug, Clone, PartialEq)]
pub struct InstrumentPrecision {
    /// Smallest tradeable quantity increment
    pub quantity_step: Decimal,
    /// Smallest price increment
    pub price_tick: Decimal,
    pub quantity_decimals: u32,
    pub price_decimals: u32,
}

impl InstrumentPrecision {
    /// Largest multiple of the quantity step not exceeding `raw`.
    /// `None` for non-finite input or a zero step.
    pub fn quantize_quantity(&self, raw: f64) -> Option<Decimal> {
        let value = Decimal::from_f64(raw)?;
        if self.quantity_step <= Decimal::ZERO {
            return None;
        }
        Some((value / self.quantity_step).floor() * self.quantity_step)
    }

    /// `raw` rounded to the nearest price tick.
    pub fn quantize_price(&self, raw: f64) -> Option<Decimal> {
        let value = Decimal::from_f64(raw)?;
        if self.price_tick <= Decimal::ZERO {
            return None;
        }
        Some((value / self.price_tick).round() * self.price_tick)
    }
}

/// Every venue call the bot needs. Implemented by the REST client and by
/// scripted fakes in tests.
#[async_trait]
pub trait ExchangeApi: Send + Sync {
    /// Trading rules for one symbol; errors when the venue does not list it.
    async fn symbol_metadata(&self, symbol: &str) -> Result<InstrumentPrecision, ExchangeError>;

    async fn mark_price(&self, symbol: &str) -> Result<f64, ExchangeError>;

    /// Free balance of one asset; zero when the account does not hold it.
    async fn account_balance(&self, asset: &str) -> Result<f64, ExchangeError>;

    /// Currently open position for the symbol, if any.
    async fn position(&self, symbol: &str) -> Result<Option<AccountPosition>, ExchangeError>;

    /// Cancel every resting order on the symbol.
    async fn cancel_open_orders(&self, symbol: &str) -> Result<(), ExchangeError>;

    async fn set_leverage(&self, symbol: &str, leverage: u32) -> Result<(), ExchangeError>;

    async fn submit_order(&self, order: &OrderRequest) -> Result<OrderAck, ExchangeError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn xrp_precision() -> InstrumentPrecision {
        InstrumentPrecision {
            quantity_step: "0.1".parse().unwrap(),
            price_tick: "0.0001".parse().unwrap(),
            quantity_decimals: 1,
            price_decimals: 4,
        }
    }

    #[test]
    fn quantity_floors_to_step() {
        let precision = xrp_precision();

        let qty = precision.quantize_quantity(7317.118).unwrap();
        assert_eq!(qty, "7317.1".parse::<Decimal>().unwrap());
    }

    #[test]
    fn quantized_quantity_never_exceeds_raw_value() {
        let cases = [
            ("0.001", 123.45678),
            ("0.1", 9.99),
            ("1", 0.4),
            ("1", 17.0),
            ("0.01", 0.019),
        ];

        for (step, raw) in cases {
            let precision = InstrumentPrecision {
                quantity_step: step.parse().unwrap(),
                price_tick: "0.0001".parse().unwrap(),
                quantity_decimals: 3,
                price_decimals: 4,
            };
            let step: Decimal = step.parse().unwrap();
            let qty = precision.quantize_quantity(raw).unwrap();

            assert!(qty <= Decimal::from_f64(raw).unwrap(), "{qty} > {raw}");
            assert_eq!(qty % step, Decimal::ZERO, "{qty} is not a multiple of {step}");
        }
    }

    #[test]
    fn quantity_below_one_step_floors_to_zero() {
        let precision = xrp_precision();

        let qty = precision.quantize_quantity(0.04).unwrap();
        assert!(qty.is_zero());
    }

    #[test]
    fn price_rounds_to_nearest_tick() {
        let precision = xrp_precision();

        let down = precision.quantize_price(2.04281).unwrap();
        assert_eq!(down, "2.0428".parse::<Decimal>().unwrap());

        let up = precision.quantize_price(2.05309).unwrap();
        assert_eq!(up, "2.0531".parse::<Decimal>().unwrap());
    }

    #[test]
    fn non_finite_input_is_rejected() {
        let precision = xrp_precision();

        assert!(precision.quantize_quantity(f64::NAN).is_none());
        assert!(precision.quantize_quantity(f64::INFINITY).is_none());
        assert!(precision.quantize_price(f64::NAN).is_none());
    }

    #[test]
    fn market_order_carries_quantity_but_no_trigger() {
        let order = OrderRequest::market("XRPUSDT", OrderSide::Sell, "7317.1".parse().unwrap());

        assert_eq!(order.kind, OrderKind::Market);
        assert!(order.stop_price.is_none());
        assert!(!order.close_position);
        assert!(order.client_order_id.unwrap().starts_with("wf-"));
    }

    #[test]
    fn conditional_close_has_no_quantity() {
        let order = OrderRequest::conditional_close(
            "XRPUSDT",
            OrderSide::Buy,
            OrderKind::StopMarket,
            "2.0531".parse().unwrap(),
        );

        assert!(order.quantity.is_none());
        assert!(order.close_position);
        assert_eq!(order.working_type, Some(WorkingType::ContractPrice));
    }
}
