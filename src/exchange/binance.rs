// USDⓈ-M futures REST client. Signed endpoints carry an HMAC-SHA256
// signature over the query string, per the venue's API rules.

use super::{
    AccountPosition, ExchangeApi, ExchangeError, InstrumentPrecision, OrderAck, OrderRequest,
};
use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use hmac::{Hmac, Mac};
use reqwest::{Client, Method};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use sha2::Sha256;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

const RATE_LIMIT_RPM: u32 = 1200;
const LOT_SIZE_FILTER: &str = "LOT_SIZE";
const PRICE_FILTER: &str = "PRICE_FILTER";

type BinanceRateLimiter = RateLimiter<
    governor::state::direct::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

type HmacSha256 = Hmac<Sha256>;

/// REST client for the USDⓈ-M futures API.
///
/// Cloneable; all clones share the same rate limiter.
#[derive(Clone)]
pub struct BinanceFuturesClient {
    client: Client,
    base_url: String,
    api_key: String,
    api_secret: String,
    recv_window_ms: u64,
    rate_limiter: Arc<BinanceRateLimiter>,
}

#[derive(Debug, Deserialize)]
struct ExchangeInfo {
    symbols: Vec<SymbolInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SymbolInfo {
    symbol: String,
    quantity_precision: u32,
    price_precision: u32,
    filters: Vec<SymbolFilter>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SymbolFilter {
    filter_type: String,
    #[serde(default)]
    step_size: Option<Decimal>,
    #[serde(default)]
    tick_size: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PremiumIndex {
    mark_price: Decimal,
}

#[derive(Debug, Deserialize)]
struct BalanceEntry {
    asset: String,
    balance: Decimal,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PositionRisk {
    symbol: String,
    position_amt: Decimal,
    entry_price: Decimal,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderResponse {
    order_id: i64,
    #[serde(default)]
    client_order_id: Option<String>,
    #[serde(default)]
    avg_price: Option<Decimal>,
    status: String,
}

impl BinanceFuturesClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
        recv_window_ms: u64,
    ) -> Result<Self, ExchangeError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        let quota = Quota::per_minute(NonZeroU32::new(RATE_LIMIT_RPM).unwrap());
        let rate_limiter = Arc::new(RateLimiter::direct(quota));

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            recv_window_ms,
            rate_limiter,
        })
    }

    pub fn from_settings(settings: &crate::config::BinanceSettings) -> Result<Self, ExchangeError> {
        Self::new(
            &settings.base_url,
            &settings.api_key,
            &settings.api_secret,
            settings.recv_window_ms,
        )
    }

    fn sign(&self, query: &str) -> Result<String, ExchangeError> {
        let mut mac = HmacSha256::new_from_slice(self.api_secret.as_bytes())
            .map_err(|e| ExchangeError::Signing(e.to_string()))?;
        mac.update(query.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    async fn get_public<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, ExchangeError> {
        self.rate_limiter.until_ready().await;

        let mut url = format!("{}{}", self.base_url, path);
        if !params.is_empty() {
            url.push('?');
            url.push_str(&encode_query(params));
        }

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ExchangeError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json().await?)
    }

    async fn send_signed<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        mut params: Vec<(&str, String)>,
    ) -> Result<T, ExchangeError> {
        self.rate_limiter.until_ready().await;

        params.push(("recvWindow", self.recv_window_ms.to_string()));
        params.push((
            "timestamp",
            chrono::Utc::now().timestamp_millis().to_string(),
        ));

        let query = encode_query(&params);
        let signature = self.sign(&query)?;
        let url = format!(
            "{}{}?{}&signature={}",
            self.base_url, path, query, signature
        );

        let response = self
            .client
            .request(method, &url)
            .header("X-MBX-APIKEY", &self.api_key)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ExchangeError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json().await?)
    }
}

/// Values here are plain symbols, enum words and decimal numbers, all of
/// which are URL-safe as-is. The venue signs the literal query string, so
/// the joined form must match what goes on the wire byte for byte.
fn encode_query(params: &[(&str, String)]) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

fn decimal_param(value: Decimal) -> String {
    value.normalize().to_string()
}

#[async_trait]
impl ExchangeApi for BinanceFuturesClient {
    async fn symbol_metadata(&self, symbol: &str) -> Result<InstrumentPrecision, ExchangeError> {
        let info: ExchangeInfo = self.get_public("/fapi/v1/exchangeInfo", &[]).await?;

        let entry = info
            .symbols
            .into_iter()
            .find(|s| s.symbol == symbol)
            .ok_or_else(|| ExchangeError::UnknownSymbol(symbol.to_string()))?;

        let mut quantity_step = None;
        let mut price_tick = None;
        for filter in &entry.filters {
            match filter.filter_type.as_str() {
                LOT_SIZE_FILTER => quantity_step = filter.step_size,
                PRICE_FILTER => price_tick = filter.tick_size,
                _ => {}
            }
        }

        let quantity_step = quantity_step.ok_or_else(|| {
            ExchangeError::MalformedResponse(format!("{symbol}: LOT_SIZE filter missing"))
        })?;
        let price_tick = price_tick.ok_or_else(|| {
            ExchangeError::MalformedResponse(format!("{symbol}: PRICE_FILTER filter missing"))
        })?;

        Ok(InstrumentPrecision {
            quantity_step,
            price_tick,
            quantity_decimals: entry.quantity_precision,
            price_decimals: entry.price_precision,
        })
    }

    async fn mark_price(&self, symbol: &str) -> Result<f64, ExchangeError> {
        let index: PremiumIndex = self
            .get_public("/fapi/v1/premiumIndex", &[("symbol", symbol.to_string())])
            .await?;

        decimal_to_f64(index.mark_price, "markPrice")
    }

    async fn account_balance(&self, asset: &str) -> Result<f64, ExchangeError> {
        let balances: Vec<BalanceEntry> = self
            .send_signed(Method::GET, "/fapi/v2/balance", Vec::new())
            .await?;

        match balances.into_iter().find(|b| b.asset == asset) {
            Some(entry) => decimal_to_f64(entry.balance, "balance"),
            None => {
                tracing::warn!(asset, "asset not present in account balances, treating as zero");
                Ok(0.0)
            }
        }
    }

    async fn position(&self, symbol: &str) -> Result<Option<AccountPosition>, ExchangeError> {
        let positions: Vec<PositionRisk> = self
            .send_signed(
                Method::GET,
                "/fapi/v2/positionRisk",
                vec![("symbol", symbol.to_string())],
            )
            .await?;

        let open = positions
            .into_iter()
            .find(|p| p.symbol == symbol && !p.position_amt.is_zero());

        match open {
            Some(p) => Ok(Some(AccountPosition {
                symbol: p.symbol,
                quantity: decimal_to_f64(p.position_amt, "positionAmt")?,
                entry_price: decimal_to_f64(p.entry_price, "entryPrice")?,
            })),
            None => Ok(None),
        }
    }

    async fn cancel_open_orders(&self, symbol: &str) -> Result<(), ExchangeError> {
        let _: serde_json::Value = self
            .send_signed(
                Method::DELETE,
                "/fapi/v1/allOpenOrders",
                vec![("symbol", symbol.to_string())],
            )
            .await?;
        Ok(())
    }

    async fn set_leverage(&self, symbol: &str, leverage: u32) -> Result<(), ExchangeError> {
        let _: serde_json::Value = self
            .send_signed(
                Method::POST,
                "/fapi/v1/leverage",
                vec![
                    ("symbol", symbol.to_string()),
                    ("leverage", leverage.to_string()),
                ],
            )
            .await?;
        Ok(())
    }

    async fn submit_order(&self, order: &OrderRequest) -> Result<OrderAck, ExchangeError> {
        let mut params: Vec<(&str, String)> = vec![
            ("symbol", order.symbol.clone()),
            ("side", order.side.as_str().to_string()),
            ("type", order.kind.as_str().to_string()),
        ];
        if let Some(quantity) = order.quantity {
            params.push(("quantity", decimal_param(quantity)));
        }
        if let Some(stop_price) = order.stop_price {
            params.push(("stopPrice", decimal_param(stop_price)));
        }
        if order.close_position {
            params.push(("closePosition", "true".to_string()));
        }
        if let Some(working_type) = order.working_type {
            params.push(("workingType", working_type.as_str().to_string()));
        }
        if let Some(client_order_id) = &order.client_order_id {
            params.push(("newClientOrderId", client_order_id.clone()));
        }

        let response: OrderResponse = self
            .send_signed(Method::POST, "/fapi/v1/order", params)
            .await?;

        let avg_fill_price = match response.avg_price {
            Some(price) if !price.is_zero() => Some(decimal_to_f64(price, "avgPrice")?),
            _ => None,
        };

        Ok(OrderAck {
            order_id: response.order_id,
            client_order_id: response.client_order_id,
            avg_fill_price,
            status: response.status,
        })
    }
}

fn decimal_to_f64(value: Decimal, field: &str) -> Result<f64, ExchangeError> {
    use rust_decimal::prelude::ToPrimitive;
    value
        .to_f64()
        .ok_or_else(|| ExchangeError::MalformedResponse(format!("{field} is not representable")))
}
