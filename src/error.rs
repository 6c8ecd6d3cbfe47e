use crate::config::ConfigError;
use crate::datasource::DataSourceError;
use crate::engine::SimulationError;
use crate::report::ReportError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Candle source error: {0}")]
    DataSource(#[from] DataSourceError),
    #[error("Simulation error: {0}")]
    Simulation(#[from] SimulationError),
    #[error("Report error: {0}")]
    Report(#[from] ReportError),
    #[error("No candle source configured (set CANDLES_CSV_PATH or KLINES_API_URL)")]
    NoCandleSource,
    #[error("No candles returned for {0}")]
    NoCandles(String),
    #[error("IO error: {0}")]
    Io(String),
    #[error("JSON error: {0}")]
    Json(String),
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Json(err.to_string())
    }
}
