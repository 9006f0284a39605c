//! Polygon REST reference data.
//!
//! | Data              | Method | Path                                           |
//! |-------------------|--------|------------------------------------------------|
//! | Previous close    | GET    | `/v2/aggs/ticker/{sym}/prev`                   |
//! | Last trade        | GET    | `/v2/last/trade/{sym}`                         |
//! | Company details   | GET    | `/v3/reference/tickers/{sym}`                  |
//! | Intraday bars     | GET    | `/v2/aggs/ticker/{sym}/range/10/minute/{d}/{d}` |
//!
//! Every call is bounded by the configured per-call timeout.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use tw_core::{Aggregate, Result, Ticker, TickerWallError};

use super::ReferenceSource;

/// Minutes per intraday bar.
const AGG_MINUTES: u32 = 10;

pub struct PolygonRest {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    timeout: Duration,
}

impl PolygonRest {
    pub fn new(api_key: String, base_url: &str, timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        debug!("[polygon-rest] GET {url}");

        let request = self.http.get(&url).query(&[("apiKey", self.api_key.as_str())]).query(query).send();
        let resp = tokio::time::timeout(self.timeout, request)
            .await
            .map_err(|_| TickerWallError::Feed(format!("{path}: timed out after {:?}", self.timeout)))?
            .map_err(|e| TickerWallError::Feed(format!("{path}: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(TickerWallError::Feed(format!("{path}: HTTP {status}")));
        }

        let body = tokio::time::timeout(self.timeout, resp.text())
            .await
            .map_err(|_| TickerWallError::Feed(format!("{path}: body timed out")))?
            .map_err(|e| TickerWallError::Feed(format!("{path}: {e}")))?;
        serde_json::from_str(&body).map_err(|e| TickerWallError::Feed(format!("{path}: bad response: {e}")))
    }

    pub async fn previous_close(&self, symbol: &str) -> Result<f64> {
        let res: AggsResponse = self.get_json(&format!("/v2/aggs/ticker/{symbol}/prev"), &[]).await?;
        Ok(res.results.first().map(|bar| bar.close).unwrap_or(0.0))
    }

    pub async fn last_trade_price(&self, symbol: &str) -> Result<f64> {
        let res: LastTradeResponse = self.get_json(&format!("/v2/last/trade/{symbol}"), &[]).await?;
        Ok(res.results.price)
    }

    pub async fn company(&self, symbol: &str) -> Result<Company> {
        let res: CompanyResponse = self.get_json(&format!("/v3/reference/tickers/{symbol}"), &[]).await?;
        Ok(res.results)
    }
}

#[async_trait]
impl ReferenceSource for PolygonRest {
    async fn load_ticker(&self, symbol: &str) -> Result<Ticker> {
        let previous_close = self.previous_close(symbol).await?;
        let price = self.last_trade_price(symbol).await?;
        let company = self.company(symbol).await?;

        let mut ticker = Ticker::new(symbol);
        ticker.company_name = company.name;
        ticker.outstanding_shares = company.outstanding_shares as i64;
        ticker.previous_close_price = previous_close;
        ticker.apply_price(price);
        Ok(ticker)
    }

    async fn today_aggregates(&self, symbol: &str, day: &str) -> Result<Vec<Aggregate>> {
        let path = format!("/v2/aggs/ticker/{symbol}/range/{AGG_MINUTES}/minute/{day}/{day}");
        let res: AggsResponse = self.get_json(&path, &[("sort", "asc")]).await?;
        Ok(res.results.into_iter().map(Aggregate::from).collect())
    }
}

// ---------------------------------------------------------------------------
// Response shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct AggsResponse {
    #[serde(default)]
    results: Vec<AggBar>,
}

#[derive(Debug, Deserialize)]
struct AggBar {
    #[serde(rename = "t", default)]
    timestamp_ms: i64,
    #[serde(rename = "o", default)]
    open: f64,
    #[serde(rename = "h", default)]
    high: f64,
    #[serde(rename = "l", default)]
    low: f64,
    #[serde(rename = "c", default)]
    close: f64,
    #[serde(rename = "v", default)]
    volume: f64,
}

impl From<AggBar> for Aggregate {
    fn from(bar: AggBar) -> Self {
        Aggregate {
            timestamp_ms: bar.timestamp_ms,
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
            volume: bar.volume,
        }
    }
}

#[derive(Debug, Deserialize)]
struct LastTradeResponse {
    results: LastTrade,
}

#[derive(Debug, Deserialize)]
struct LastTrade {
    #[serde(rename = "p")]
    price: f64,
}

#[derive(Debug, Deserialize)]
struct CompanyResponse {
    results: Company,
}

/// Company reference data.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Company {
    #[serde(default)]
    pub name: String,
    #[serde(default, alias = "share_class_shares_outstanding")]
    pub outstanding_shares: f64,
}
