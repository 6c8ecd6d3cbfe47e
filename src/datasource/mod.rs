//! Candle sources: where the simulator gets its price history from.

use crate::domain::{Candle, CandleWidth, SymbolPair};
use async_trait::async_trait;
use std::fmt;

pub mod csv_file;
pub mod klines;
pub mod mock;

pub use csv_file::CsvCandleSource;
pub use klines::KlinesCandleSource;
pub use mock::MockCandleSource;

/// Supplies candles for a symbol pair over a time range.
///
/// Implementations return candles sorted by `open_time` without duplicates.
#[async_trait]
pub trait CandleSource: Send + Sync + fmt::Debug {
    /// Fetch candles whose open time lies in `[from_ms, to_ms]`.
    async fn fetch_candles(
        &self,
        pair: &SymbolPair,
        width: CandleWidth,
        from_ms: i64,
        to_ms: i64,
    ) -> Result<Vec<Candle>, DataSourceError>;
}

/// Error type for candle source operations.
#[derive(Debug, Clone)]
pub enum DataSourceError {
    /// Network error (e.g., connection timeout, DNS failure)
    NetworkError(String),
    /// HTTP error (e.g., 429 rate limit, 5xx server error)
    HttpError { status: u16, message: String },
    /// Invalid JSON/CSV or malformed rows
    ParseError(String),
    /// Rate limit exceeded
    RateLimited,
    /// Local file could not be read
    Io(String),
    Other(String),
}

impl fmt::Display for DataSourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSourceError::NetworkError(msg) => write!(f, "Network error: {}", msg),
            DataSourceError::HttpError { status, message } => {
                write!(f, "HTTP error {}: {}", status, message)
            }
            DataSourceError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            DataSourceError::RateLimited => write!(f, "Rate limited"),
            DataSourceError::Io(msg) => write!(f, "IO error: {}", msg),
            DataSourceError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for DataSourceError {}

/// Sort by open time and drop repeated open times, keeping the first seen.
pub(crate) fn normalize_candles(mut candles: Vec<Candle>) -> Vec<Candle> {
    candles.sort_by_key(|c| c.open_time);
    candles.dedup_by_key(|c| c.open_time);
    candles
}
