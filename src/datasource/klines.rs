//! Kline download over HTTP (Binance-compatible `/api/v3/klines`).

use super::{normalize_candles, CandleSource, DataSourceError};
use crate::domain::{Candle, CandleWidth, Decimal, SymbolPair, TimeMs};
use async_trait::async_trait;
use backoff::future::retry;
use backoff::ExponentialBackoff;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

/// Most exchanges cap one kline request at this many bars.
pub const MAX_CANDLES_PER_REQUEST: i64 = 1000;

#[derive(Debug, Clone)]
pub struct KlinesCandleSource {
    client: Client,
    base_url: String,
    chunk_size: i64,
}

impl KlinesCandleSource {
    pub fn new(base_url: String) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            chunk_size: MAX_CANDLES_PER_REQUEST,
        }
    }

    pub fn default_url() -> Self {
        Self::new("https://api.binance.com".to_string())
    }

    /// Use a preconfigured HTTP client (timeouts, proxy settings).
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    /// Limit the number of candles requested per call (clamped to `1..=1000`).
    pub fn with_chunk_size(mut self, chunk_size: i64) -> Self {
        self.chunk_size = chunk_size.clamp(1, MAX_CANDLES_PER_REQUEST);
        self
    }

    /// Split `[from_ms, to_ms]` into request windows of at most `chunk_size` candles.
    pub fn chunk_ranges(from_ms: i64, to_ms: i64, width: CandleWidth, chunk_size: i64) -> Vec<(i64, i64)> {
        let step = width.as_duration().num_milliseconds() * chunk_size;
        let mut ranges = Vec::new();
        let mut start = from_ms;
        while start <= to_ms {
            let end = start.saturating_add(step - 1).min(to_ms);
            ranges.push((start, end));
            if end == i64::MAX {
                break;
            }
            start = end + 1;
        }
        ranges
    }

    async fn get_klines(
        &self,
        pair: &SymbolPair,
        width: CandleWidth,
        from_ms: i64,
        to_ms: i64,
    ) -> Result<serde_json::Value, DataSourceError> {
        let url = format!("{}/api/v3/klines", self.base_url);
        let query = [
            ("symbol", pair.ticker()),
            ("interval", width.as_interval().to_string()),
            ("startTime", from_ms.to_string()),
            ("endTime", to_ms.to_string()),
            ("limit", self.chunk_size.to_string()),
        ];
        let backoff = ExponentialBackoff {
            max_elapsed_time: Some(Duration::from_secs(30)),
            ..Default::default()
        };

        retry(backoff, || async {
            let response = self
                .client
                .get(&url)
                .query(&query)
                .send()
                .await
                .map_err(|e| {
                    backoff::Error::transient(DataSourceError::NetworkError(e.to_string()))
                })?;

            let status = response.status();
            if status == 429 {
                return Err(backoff::Error::transient(DataSourceError::RateLimited));
            }
            if status.is_server_error() {
                return Err(backoff::Error::transient(DataSourceError::HttpError {
                    status: status.as_u16(),
                    message: "Server error".to_string(),
                }));
            }
            if !status.is_success() {
                return Err(backoff::Error::permanent(DataSourceError::HttpError {
                    status: status.as_u16(),
                    message: "Client error".to_string(),
                }));
            }

            response
                .json::<serde_json::Value>()
                .await
                .map_err(|e| backoff::Error::permanent(DataSourceError::ParseError(e.to_string())))
        })
        .await
    }
}

#[async_trait]
impl CandleSource for KlinesCandleSource {
    async fn fetch_candles(
        &self,
        pair: &SymbolPair,
        width: CandleWidth,
        from_ms: i64,
        to_ms: i64,
    ) -> Result<Vec<Candle>, DataSourceError> {
        let ranges = Self::chunk_ranges(from_ms, to_ms, width, self.chunk_size);
        debug!(
            pair = %pair,
            width = %width,
            from_ms,
            to_ms,
            chunks = ranges.len(),
            "Downloading klines"
        );

        let mut candles = Vec::new();
        for (start, end) in ranges {
            let response = self.get_klines(pair, width, start, end).await?;
            let chunk = parse_klines(&response).map_err(|e| {
                warn!(pair = %pair, from_ms = start, to_ms = end, "Malformed kline response: {}", e);
                e
            })?;
            candles.extend(chunk);
        }

        let (from, to) = (TimeMs::new(from_ms), TimeMs::new(to_ms));
        candles.retain(|c| c.open_time >= from && c.open_time <= to);
        Ok(normalize_candles(candles))
    }
}

/// Parse a whole kline response. Any malformed row fails the response, so
/// the series never silently loses a bar.
fn parse_klines(response: &serde_json::Value) -> Result<Vec<Candle>, DataSourceError> {
    let rows = response
        .as_array()
        .ok_or_else(|| DataSourceError::ParseError("Expected array response".to_string()))?;

    rows.iter()
        .enumerate()
        .map(|(i, row)| {
            parse_kline(row).map_err(|e| DataSourceError::ParseError(format!("row {}: {}", i, e)))
        })
        .collect()
}

/// Parse one kline row:
/// `[openTime, open, high, low, close, volume, closeTime, quoteVolume, ...]`.
fn parse_kline(row: &serde_json::Value) -> Result<Candle, DataSourceError> {
    let fields = row
        .as_array()
        .ok_or_else(|| DataSourceError::ParseError("Expected kline array".to_string()))?;

    let open_time = fields
        .first()
        .and_then(|v| v.as_i64())
        .ok_or_else(|| DataSourceError::ParseError("Missing open time".to_string()))?;

    let decimal_at = |idx: usize, name: &str| -> Result<Decimal, DataSourceError> {
        let raw = fields
            .get(idx)
            .and_then(|v| v.as_str())
            .ok_or_else(|| DataSourceError::ParseError(format!("Missing {} field", name)))?;
        Decimal::from_str_canonical(raw)
            .map_err(|e| DataSourceError::ParseError(format!("Invalid {}: {}", name, e)))
    };

    Ok(Candle::new(
        TimeMs::new(open_time),
        decimal_at(1, "open")?,
        decimal_at(2, "high")?,
        decimal_at(3, "low")?,
        decimal_at(4, "close")?,
    )
    .with_volumes(decimal_at(5, "volume")?, decimal_at(7, "quoteVolume")?))
}
