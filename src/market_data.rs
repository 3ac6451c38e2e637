// src/market_data.rs
//! Binance public market-data endpoints: klines and 24h ticker.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use std::time::Duration;
use tracing::{debug, info, instrument};

use crate::config::MarketConfig;
use crate::error::{AppError, Result};

pub const INTERVALS: &[&str] = &[
    "1m", "3m", "5m", "15m", "30m", "1h", "2h", "4h", "6h", "8h", "12h", "1d", "3d", "1w", "1M",
];

pub const MAX_LIMIT: u32 = 1000;

/// One OHLCV bucket. Times are milliseconds since the epoch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candle {
    pub open_time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub close_time: i64,
}

impl Candle {
    pub fn open_datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::<Utc>::from_timestamp_millis(self.open_time)
    }
}

// Binance sends each kline as a positional array with decimals as strings
impl<'de> Deserialize<'de> for Candle {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let arr: Vec<serde_json::Value> = Vec::deserialize(deserializer)?;
        if arr.len() < 7 {
            return Err(D::Error::custom(format!(
                "kline array too short: {} fields",
                arr.len()
            )));
        }

        let num = |v: &serde_json::Value| -> std::result::Result<f64, D::Error> {
            match v {
                serde_json::Value::String(s) => s
                    .parse::<f64>()
                    .map_err(|e| D::Error::custom(format!("invalid decimal {s:?}: {e}"))),
                serde_json::Value::Number(n) => n
                    .as_f64()
                    .ok_or_else(|| D::Error::custom("invalid number")),
                _ => Err(D::Error::custom("expected string or number")),
            }
        };
        let int = |v: &serde_json::Value| -> std::result::Result<i64, D::Error> {
            v.as_i64().ok_or_else(|| D::Error::custom("expected integer"))
        };

        Ok(Candle {
            open_time: int(&arr[0])?,
            open: num(&arr[1])?,
            high: num(&arr[2])?,
            low: num(&arr[3])?,
            close: num(&arr[4])?,
            volume: num(&arr[5])?,
            close_time: int(&arr[6])?,
        })
    }
}

/// Closing-price projection of a candle list.
pub fn closes(candles: &[Candle]) -> Vec<f64> {
    candles.iter().map(|c| c.close).collect()
}

/// Decode a `/api/v3/klines` body and sort it by open time.
pub fn parse_klines(body: &str) -> Result<Vec<Candle>> {
    let mut candles: Vec<Candle> = serde_json::from_str(body)?;
    candles.sort_by_key(|c| c.open_time);
    Ok(candles)
}

fn de_decimal_str<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    s.parse::<f64>()
        .map_err(|e| D::Error::custom(format!("invalid decimal {s:?}: {e}")))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticker24h {
    pub symbol: String,
    #[serde(deserialize_with = "de_decimal_str")]
    pub last_price: f64,
    #[serde(deserialize_with = "de_decimal_str")]
    pub price_change_percent: f64,
    #[serde(deserialize_with = "de_decimal_str")]
    pub high_price: f64,
    #[serde(deserialize_with = "de_decimal_str")]
    pub low_price: f64,
    #[serde(deserialize_with = "de_decimal_str")]
    pub volume: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct KlineQuery {
    pub symbol: String,
    pub interval: String,
    pub limit: u32,
}

impl KlineQuery {
    pub fn new(symbol: &str, interval: &str, limit: u32) -> Result<Self> {
        if symbol.trim().is_empty() {
            return Err(AppError::Validation("symbol must not be empty".into()));
        }
        if !INTERVALS.contains(&interval) {
            return Err(AppError::Validation(format!(
                "unsupported interval {interval:?}"
            )));
        }
        if !(1..=MAX_LIMIT).contains(&limit) {
            return Err(AppError::Validation(format!(
                "limit must be within 1..={MAX_LIMIT}, got {limit}"
            )));
        }
        Ok(KlineQuery {
            symbol: symbol.trim().to_uppercase(),
            interval: interval.to_string(),
            limit,
        })
    }
}

/// Source of time-ordered candles for the indicator pipeline.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait KlineSource: Send + Sync {
    async fn klines(&self, query: &KlineQuery) -> Result<Vec<Candle>>;
}

#[derive(Debug, Clone)]
pub struct BinanceClient {
    http: Client,
    base_url: String,
}

impl BinanceClient {
    pub fn new(cfg: &MarketConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .user_agent("chart-indicators/0.1")
            .build()?;
        Ok(BinanceClient {
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get_text(&self, path: &str, params: &[(&str, String)]) -> Result<String> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, ?params, "GET");

        let resp = self.http.get(&url).query(params).send().await?;
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(AppError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }

    #[instrument(skip(self))]
    pub async fn ticker_24h(&self, symbol: &str) -> Result<Ticker24h> {
        let symbol = symbol.trim().to_uppercase();
        if symbol.is_empty() {
            return Err(AppError::Validation("symbol must not be empty".into()));
        }
        let body = self
            .get_text("/api/v3/ticker/24hr", &[("symbol", symbol)])
            .await?;
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl KlineSource for BinanceClient {
    #[instrument(skip(self))]
    async fn klines(&self, query: &KlineQuery) -> Result<Vec<Candle>> {
        let body = self
            .get_text(
                "/api/v3/klines",
                &[
                    ("symbol", query.symbol.clone()),
                    ("interval", query.interval.clone()),
                    ("limit", query.limit.to_string()),
                ],
            )
            .await?;
        let candles = parse_klines(&body)?;
        info!(symbol = %query.symbol, count = candles.len(), "fetched klines");
        Ok(candles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KLINES: &str = r#"[
        [1700000300000, "101.0", "103.5", "100.5", "102.0", "12.5", 1700000599999, "1275.0", 40, "6.0", "612.0", "0"],
        [1700000000000, "100.0", "101.5", "99.0", "101.0", "10.0", 1700000299999, "1005.0", 31, "5.0", "502.5", "0"]
    ]"#;

    #[test]
    fn parses_and_sorts_klines() {
        let candles = parse_klines(KLINES).unwrap();
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[0].open_time, 1_700_000_000_000);
        assert_eq!(candles[0].close, 101.0);
        assert_eq!(candles[1].high, 103.5);
        assert_eq!(candles[1].close_time, 1_700_000_599_999);
        assert_eq!(closes(&candles), vec![101.0, 102.0]);
        assert_eq!(
            candles[0].open_datetime().unwrap().timestamp(),
            1_700_000_000
        );
    }

    #[test]
    fn short_kline_row_is_an_error() {
        let err = parse_klines(r#"[[1700000000000, "1", "2"]]"#).unwrap_err();
        assert!(matches!(err, AppError::Serialization(_)));
    }

    #[test]
    fn bad_decimal_is_an_error() {
        let err = parse_klines(r#"[[1, "x", "2", "0.5", "1", "3", 2]]"#).unwrap_err();
        assert!(err.to_string().contains("invalid decimal"));
    }

    #[test]
    fn parses_ticker() {
        let t: Ticker24h = serde_json::from_str(
            r#"{"symbol":"BTCUSDT","priceChange":"-94.99","priceChangePercent":"-0.095",
                "lastPrice":"99000.01","highPrice":"100500.00","lowPrice":"98000.00",
                "volume":"1234.5","count":100}"#,
        )
        .unwrap();
        assert_eq!(t.symbol, "BTCUSDT");
        assert_eq!(t.last_price, 99000.01);
        assert_eq!(t.price_change_percent, -0.095);
        assert_eq!(t.volume, 1234.5);
    }

    #[test]
    fn query_validation() {
        let q = KlineQuery::new(" btcusdt ", "5m", 100).unwrap();
        assert_eq!(q.symbol, "BTCUSDT");
        assert!(KlineQuery::new("BTCUSDT", "7m", 100).is_err());
        assert!(KlineQuery::new("BTCUSDT", "1h", 0).is_err());
        assert!(KlineQuery::new("BTCUSDT", "1h", 1001).is_err());
        assert!(KlineQuery::new("  ", "1h", 10).is_err());
    }
}
