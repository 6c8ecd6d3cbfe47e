//! In-memory candle source for tests.

use super::{normalize_candles, CandleSource, DataSourceError};
use crate::domain::{Candle, CandleWidth, SymbolPair, TimeMs};
use async_trait::async_trait;

#[derive(Debug, Clone, Default)]
pub struct MockCandleSource {
    candles: Vec<Candle>,
    failure: Option<DataSourceError>,
}

impl MockCandleSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_candle(mut self, candle: Candle) -> Self {
        self.candles.push(candle);
        self
    }

    pub fn with_candles(mut self, candles: Vec<Candle>) -> Self {
        self.candles.extend(candles);
        self
    }

    /// Make every fetch fail with `error`.
    pub fn failing_with(mut self, error: DataSourceError) -> Self {
        self.failure = Some(error);
        self
    }
}

#[async_trait]
impl CandleSource for MockCandleSource {
    async fn fetch_candles(
        &self,
        _pair: &SymbolPair,
        _width: CandleWidth,
        from_ms: i64,
        to_ms: i64,
    ) -> Result<Vec<Candle>, DataSourceError> {
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }

        let (from, to) = (TimeMs::new(from_ms), TimeMs::new(to_ms));
        Ok(normalize_candles(
            self.candles
                .iter()
                .filter(|c| c.open_time >= from && c.open_time <= to)
                .cloned()
                .collect(),
        ))
    }
}
