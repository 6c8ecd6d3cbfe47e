//! OHLCV candles and candle widths.

use crate::domain::{Decimal, TimeMs};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One OHLCV bar. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candle {
    /// Bar open instant; candles in a series are strictly increasing by this.
    pub open_time: TimeMs,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    /// Volume in the base asset.
    pub base_volume: Decimal,
    /// Volume in the quote asset.
    pub quote_volume: Decimal,
}

impl Candle {
    pub fn new(
        open_time: TimeMs,
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
    ) -> Self {
        Self {
            open_time,
            open,
            high,
            low,
            close,
            base_volume: Decimal::zero(),
            quote_volume: Decimal::zero(),
        }
    }

    pub fn with_volumes(mut self, base_volume: Decimal, quote_volume: Decimal) -> Self {
        self.base_volume = base_volume;
        self.quote_volume = quote_volume;
        self
    }

    /// Simulated fill price: midpoint of open and close. `None` on overflow.
    pub fn mid_price(&self) -> Option<Decimal> {
        self.open.checked_add(self.close)?.checked_div(Decimal::two())
    }
}

/// Fixed bar widths supported by candle sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CandleWidth {
    #[serde(rename = "1m")]
    OneMinute,
    #[serde(rename = "5m")]
    FiveMinutes,
    #[serde(rename = "15m")]
    FifteenMinutes,
    #[serde(rename = "30m")]
    ThirtyMinutes,
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "4h")]
    FourHours,
    #[serde(rename = "1d")]
    OneDay,
}

impl CandleWidth {
    pub fn as_duration(&self) -> Duration {
        match self {
            CandleWidth::OneMinute => Duration::minutes(1),
            CandleWidth::FiveMinutes => Duration::minutes(5),
            CandleWidth::FifteenMinutes => Duration::minutes(15),
            CandleWidth::ThirtyMinutes => Duration::minutes(30),
            CandleWidth::OneHour => Duration::hours(1),
            CandleWidth::FourHours => Duration::hours(4),
            CandleWidth::OneDay => Duration::days(1),
        }
    }

    /// Interval code used by kline endpoints.
    pub fn as_interval(&self) -> &'static str {
        match self {
            CandleWidth::OneMinute => "1m",
            CandleWidth::FiveMinutes => "5m",
            CandleWidth::FifteenMinutes => "15m",
            CandleWidth::ThirtyMinutes => "30m",
            CandleWidth::OneHour => "1h",
            CandleWidth::FourHours => "4h",
            CandleWidth::OneDay => "1d",
        }
    }
}

impl fmt::Display for CandleWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_interval())
    }
}

impl FromStr for CandleWidth {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1m" => Ok(CandleWidth::OneMinute),
            "5m" => Ok(CandleWidth::FiveMinutes),
            "15m" => Ok(CandleWidth::FifteenMinutes),
            "30m" => Ok(CandleWidth::ThirtyMinutes),
            "1h" => Ok(CandleWidth::OneHour),
            "4h" => Ok(CandleWidth::FourHours),
            "1d" => Ok(CandleWidth::OneDay),
            other => Err(format!("must be one of 1m,5m,15m,30m,1h,4h,1d, got {}", other)),
        }
    }
}
