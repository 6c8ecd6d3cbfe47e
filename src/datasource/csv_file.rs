//! Candles from a local CSV file.
//!
//! Expected header: `open_time,open,high,low,close,base_volume,quote_volume`
//! with `open_time` in ms since epoch. Volume columns may be left empty.

use super::{normalize_candles, CandleSource, DataSourceError};
use crate::domain::{Candle, CandleWidth, Decimal, SymbolPair, TimeMs};
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::debug;

/// Reads one pair's candles from a CSV file; the pair argument is not checked.
#[derive(Debug, Clone)]
pub struct CsvCandleSource {
    path: PathBuf,
}

impl CsvCandleSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn parse_csv(csv_bytes: &[u8]) -> Result<Vec<Candle>, DataSourceError> {
        #[derive(Debug, serde::Deserialize)]
        struct Row {
            open_time: i64,
            open: String,
            high: String,
            low: String,
            close: String,
            base_volume: Option<String>,
            quote_volume: Option<String>,
        }

        fn price(field: &str, value: &str) -> Result<Decimal, DataSourceError> {
            Decimal::from_str_canonical(value.trim())
                .map_err(|e| DataSourceError::ParseError(format!("invalid {}: {}", field, e)))
        }

        fn volume(field: &str, value: Option<&str>) -> Result<Decimal, DataSourceError> {
            match value.map(str::trim) {
                None | Some("") => Ok(Decimal::zero()),
                Some(v) => price(field, v),
            }
        }

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(csv_bytes);

        let mut candles = Vec::new();
        for record in reader.deserialize::<Row>() {
            let row = record.map_err(|e| DataSourceError::ParseError(e.to_string()))?;
            let candle = Candle::new(
                TimeMs::new(row.open_time),
                price("open", &row.open)?,
                price("high", &row.high)?,
                price("low", &row.low)?,
                price("close", &row.close)?,
            )
            .with_volumes(
                volume("base_volume", row.base_volume.as_deref())?,
                volume("quote_volume", row.quote_volume.as_deref())?,
            );
            candles.push(candle);
        }

        Ok(normalize_candles(candles))
    }
}

#[async_trait]
impl CandleSource for CsvCandleSource {
    async fn fetch_candles(
        &self,
        pair: &SymbolPair,
        width: CandleWidth,
        from_ms: i64,
        to_ms: i64,
    ) -> Result<Vec<Candle>, DataSourceError> {
        debug!(
            path = %self.path.display(),
            pair = %pair,
            width = %width,
            from_ms,
            to_ms,
            "Reading candles from CSV"
        );

        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|e| DataSourceError::Io(format!("{}: {}", self.path.display(), e)))?;

        let (from, to) = (TimeMs::new(from_ms), TimeMs::new(to_ms));
        Ok(Self::parse_csv(&bytes)?
            .into_iter()
            .filter(|c| c.open_time >= from && c.open_time <= to)
            .collect())
    }
}
