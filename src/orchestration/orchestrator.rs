use crate::config::{CandleSourceConfig, Config, ReportPaths};
use crate::datasource::{CandleSource, CsvCandleSource, KlinesCandleSource};
use crate::domain::BudgetReport;
use crate::engine::{simulate, LdcaResult, SimulationError, StepRounder};
use crate::error::AppError;
use crate::report::{self, ReportTable};
use std::sync::Arc;
use tracing::info;

/// Wires a candle source, the simulator and the report writer together.
#[derive(Clone)]
pub struct Orchestrator {
    config: Config,
    source: Option<Arc<dyn CandleSource>>,
}

impl Orchestrator {
    pub fn new(config: Config, source: Option<Arc<dyn CandleSource>>) -> Self {
        Self { config, source }
    }

    /// Build the candle source described by the configuration.
    pub fn from_config(config: Config) -> Self {
        let source: Option<Arc<dyn CandleSource>> = match &config.candle_source {
            CandleSourceConfig::None => None,
            CandleSourceConfig::CsvFile(path) => Some(Arc::new(CsvCandleSource::new(path.clone()))),
            CandleSourceConfig::Klines { api_url, .. } => {
                Some(Arc::new(KlinesCandleSource::new(api_url.clone())))
            }
        };
        Self::new(config, source)
    }

    pub fn has_candle_source(&self) -> bool {
        self.source.is_some()
    }

    /// Fetch candles, run one simulation and optionally persist the result as JSON.
    pub async fn run_simulation(&self) -> Result<LdcaResult, AppError> {
        let source = self.source.as_ref().ok_or(AppError::NoCandleSource)?;
        let (from_ms, to_ms) = match &self.config.candle_source {
            CandleSourceConfig::Klines { from_ms, to_ms, .. } => (*from_ms, *to_ms),
            _ => (i64::MIN, i64::MAX),
        };

        let pair = &self.config.symbol_pair;
        let candles = source
            .fetch_candles(pair, self.config.candle_width, from_ms, to_ms)
            .await?;
        if candles.is_empty() {
            return Err(AppError::NoCandles(pair.to_string()));
        }
        info!(pair = %pair, candles = candles.len(), "Candles loaded");

        let rounder = StepRounder::new(self.config.lot_size).map_err(SimulationError::from)?;
        let result = simulate(&candles, &rounder, &self.config.simulation_params())?;

        if let Some(path) = &self.config.result_json_path {
            let json = serde_json::to_vec_pretty(&result)?;
            tokio::fs::write(path, json).await?;
            info!(path = %path.display(), "Simulation result written");
        }

        Ok(result)
    }

    /// Render the configured budget report list to CSV.
    pub async fn render_reports(&self) -> Result<Option<ReportTable>, AppError> {
        match &self.config.report {
            Some(paths) => render_report_file(paths).await.map(Some),
            None => Ok(None),
        }
    }
}

/// Load a JSON array of budget reports, render it and write the CSV table.
pub async fn render_report_file(paths: &ReportPaths) -> Result<ReportTable, AppError> {
    let bytes = tokio::fs::read(&paths.reports_json).await?;
    let reports: Vec<BudgetReport> = serde_json::from_slice(&bytes)?;

    let table = report::render(&reports);
    report::write_csv(&table, &paths.output_csv)?;

    info!(
        reports = reports.len(),
        columns = table.header.len(),
        path = %paths.output_csv.display(),
        "Budget report written"
    );
    Ok(table)
}
