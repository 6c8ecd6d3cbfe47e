pub mod config;
pub mod datasource;
pub mod domain;
pub mod engine;
pub mod error;
pub mod orchestration;
pub mod report;

pub use config::Config;
pub use datasource::{CandleSource, CsvCandleSource, DataSourceError, KlinesCandleSource, MockCandleSource};
pub use domain::{
    BudgetReport, BudgetSnapshot, Candle, CandleWidth, Decimal, Side, Symbol, SymbolPair, TimeMs,
};
pub use engine::{simulate, LdcaResult, PositionLedger, SimulationError, SimulationParams};
pub use error::AppError;
pub use report::{render, ReportAccumulator, ReportTable};
