//! Domain primitives: TimeMs, Symbol, SymbolPair, Side.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Time in milliseconds since Unix epoch (UTC).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimeMs(pub i64);

impl TimeMs {
    /// Earliest representable instant; any candle time is `>=` this.
    pub const MIN: TimeMs = TimeMs(i64::MIN);

    pub fn new(ms: i64) -> Self {
        TimeMs(ms)
    }

    pub fn as_ms(&self) -> i64 {
        self.0
    }

    /// Shift forward by `duration`, clamping at the representable range.
    pub fn saturating_add(&self, duration: Duration) -> TimeMs {
        TimeMs(self.0.saturating_add(duration.num_milliseconds()))
    }

    /// Signed distance `self - earlier`.
    pub fn since(&self, earlier: TimeMs) -> Duration {
        // i64::MIN ms is outside the Duration range.
        Duration::milliseconds(self.0.saturating_sub(earlier.0).max(-i64::MAX))
    }

    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::<Utc>::from_timestamp_millis(self.0)
    }
}

impl fmt::Display for TimeMs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_datetime() {
            Some(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S")),
            None => write!(f, "{}ms", self.0),
        }
    }
}

impl From<DateTime<Utc>> for TimeMs {
    fn from(value: DateTime<Utc>) -> Self {
        TimeMs(value.timestamp_millis())
    }
}

/// Asset symbol (e.g., "BTC", "USDT").
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Symbol(pub String);

impl Symbol {
    pub fn new(symbol: impl Into<String>) -> Self {
        Symbol(symbol.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid symbol pair {0:?}, expected BASE/QUOTE")]
pub struct SymbolPairParseError(pub String);

/// Traded pair: the base asset is bought or sold, priced in the quote asset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SymbolPair {
    pub base: Symbol,
    pub quote: Symbol,
}

impl SymbolPair {
    pub fn new(base: impl Into<String>, quote: impl Into<String>) -> Self {
        Self {
            base: Symbol::new(base),
            quote: Symbol::new(quote),
        }
    }

    /// Exchange-style concatenated ticker, e.g. `BTCUSDT`.
    pub fn ticker(&self) -> String {
        format!("{}{}", self.base, self.quote)
    }
}

impl fmt::Display for SymbolPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}

impl FromStr for SymbolPair {
    type Err = SymbolPairParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (base, quote) = s
            .split_once('/')
            .ok_or_else(|| SymbolPairParseError(s.to_string()))?;
        let (base, quote) = (base.trim(), quote.trim());
        if base.is_empty() || quote.is_empty() {
            return Err(SymbolPairParseError(s.to_string()));
        }
        Ok(SymbolPair::new(
            base.to_ascii_uppercase(),
            quote.to_ascii_uppercase(),
        ))
    }
}

/// Order side: Buy (long) or Sell (short).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "buy"),
            Side::Sell => write!(f, "sell"),
        }
    }
}

impl FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "buy" | "long" => Ok(Side::Buy),
            "sell" | "short" => Ok(Side::Sell),
            other => Err(format!("must be buy or sell, got {}", other)),
        }
    }
}
