use crate::domain::{CandleWidth, Decimal, Side, SymbolPair};
use crate::engine::{SellSizeMode, SimulationParams};
use chrono::Duration;
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Config {
    pub symbol_pair: SymbolPair,
    pub order_side: Side,
    pub quote_size: Decimal,
    pub order_period: Duration,
    pub leverage: Decimal,
    pub trade_fee: Decimal,
    pub rollover_fee: Decimal,
    pub rollover_period: Duration,
    pub sell_size_mode: SellSizeMode,
    pub lot_size: Decimal,
    pub candle_source: CandleSourceConfig,
    pub candle_width: CandleWidth,
    pub result_json_path: Option<PathBuf>,
    pub report: Option<ReportPaths>,
}

/// Where candles come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CandleSourceConfig {
    /// No candle source configured; only report rendering can run.
    None,
    CsvFile(PathBuf),
    Klines {
        api_url: String,
        from_ms: i64,
        to_ms: i64,
    },
}

/// Input JSON list of budget reports and the CSV file to render it to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportPaths {
    pub reports_json: PathBuf,
    pub output_csv: PathBuf,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

fn invalid(key: &str, msg: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue(key.to_string(), msg.into())
}

fn get_or<'a>(env_map: &'a HashMap<String, String>, key: &str, default: &'a str) -> &'a str {
    env_map.get(key).map(|s| s.as_str()).unwrap_or(default)
}

fn parse_decimal(env_map: &HashMap<String, String>, key: &str, default: &str) -> Result<Decimal, ConfigError> {
    Decimal::from_str_canonical(get_or(env_map, key, default).trim())
        .map_err(|_| invalid(key, "must be a decimal number"))
}

fn parse_minutes(env_map: &HashMap<String, String>, key: &str, default: &str) -> Result<Duration, ConfigError> {
    let minutes = get_or(env_map, key, default)
        .trim()
        .parse::<i64>()
        .map_err(|_| invalid(key, "must be a whole number of minutes"))?;
    if minutes <= 0 {
        return Err(invalid(key, "must be positive"));
    }
    Duration::try_minutes(minutes).ok_or_else(|| invalid(key, "out of range"))
}

fn parse_ms(env_map: &HashMap<String, String>, key: &str) -> Result<i64, ConfigError> {
    env_map
        .get(key)
        .ok_or_else(|| ConfigError::MissingEnv(key.to_string()))?
        .trim()
        .parse::<i64>()
        .map_err(|_| invalid(key, "must be a valid i64"))
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let symbol_pair = env_map
            .get("SYMBOL_PAIR")
            .ok_or_else(|| ConfigError::MissingEnv("SYMBOL_PAIR".to_string()))?
            .parse::<SymbolPair>()
            .map_err(|e| invalid("SYMBOL_PAIR", e.to_string()))?;

        let order_side = get_or(&env_map, "ORDER_SIDE", "buy")
            .parse::<Side>()
            .map_err(|e| invalid("ORDER_SIDE", e))?;

        let quote_size = Decimal::from_str_canonical(
            env_map
                .get("QUOTE_SIZE")
                .ok_or_else(|| ConfigError::MissingEnv("QUOTE_SIZE".to_string()))?
                .trim(),
        )
        .map_err(|_| invalid("QUOTE_SIZE", "must be a decimal number"))?;
        if !quote_size.is_positive() {
            return Err(invalid("QUOTE_SIZE", "must be positive"));
        }

        let order_period = parse_minutes(&env_map, "ORDER_PERIOD_MINUTES", "1440")?;

        let leverage = parse_decimal(&env_map, "LEVERAGE", "1")?;
        if leverage < Decimal::one() {
            return Err(invalid("LEVERAGE", "must be >= 1"));
        }

        let trade_fee = parse_decimal(&env_map, "TRADE_FEE", "0.001")?;
        if trade_fee.is_negative() {
            return Err(invalid("TRADE_FEE", "must be >= 0"));
        }

        let rollover_fee = parse_decimal(&env_map, "ROLLOVER_FEE", "0")?;
        if rollover_fee.is_negative() {
            return Err(invalid("ROLLOVER_FEE", "must be >= 0"));
        }

        let rollover_period = parse_minutes(&env_map, "ROLLOVER_PERIOD_MINUTES", "240")?;

        let sell_size_mode = match get_or(&env_map, "SELL_SIZE_MODE", "quote_as_base") {
            "quote_as_base" => SellSizeMode::QuoteAsBase,
            "convert" => SellSizeMode::Convert,
            other => {
                return Err(invalid(
                    "SELL_SIZE_MODE",
                    format!("must be quote_as_base or convert, got {}", other),
                ))
            }
        };

        let lot_size = parse_decimal(&env_map, "LOT_SIZE", "0.00001")?;
        if !lot_size.is_positive() {
            return Err(invalid("LOT_SIZE", "must be positive"));
        }

        let candle_width = get_or(&env_map, "CANDLE_WIDTH", "1m")
            .parse::<CandleWidth>()
            .map_err(|e| invalid("CANDLE_WIDTH", e))?;

        let candle_source = parse_candle_source(&env_map)?;

        let result_json_path = env_map.get("RESULT_JSON_PATH").map(PathBuf::from);

        let report = match (
            env_map.get("BUDGET_REPORTS_PATH"),
            env_map.get("REPORT_CSV_PATH"),
        ) {
            (Some(input), Some(output)) => Some(ReportPaths {
                reports_json: PathBuf::from(input),
                output_csv: PathBuf::from(output),
            }),
            (Some(_), None) => return Err(ConfigError::MissingEnv("REPORT_CSV_PATH".to_string())),
            (None, Some(_)) => {
                return Err(ConfigError::MissingEnv("BUDGET_REPORTS_PATH".to_string()))
            }
            (None, None) => None,
        };

        Ok(Config {
            symbol_pair,
            order_side,
            quote_size,
            order_period,
            leverage,
            trade_fee,
            rollover_fee,
            rollover_period,
            sell_size_mode,
            lot_size,
            candle_source,
            candle_width,
            result_json_path,
            report,
        })
    }

    pub fn simulation_params(&self) -> SimulationParams {
        SimulationParams {
            symbol_pair: self.symbol_pair.clone(),
            side: self.order_side,
            trade_fee: self.trade_fee,
            quote_size: self.quote_size,
            period: self.order_period,
            leverage: self.leverage,
            rollover_fee: self.rollover_fee,
            rollover_period: self.rollover_period,
            sell_size_mode: self.sell_size_mode,
        }
    }
}

fn parse_candle_source(env_map: &HashMap<String, String>) -> Result<CandleSourceConfig, ConfigError> {
    match (env_map.get("CANDLES_CSV_PATH"), env_map.get("KLINES_API_URL")) {
        (Some(_), Some(_)) => Err(invalid(
            "CANDLES_CSV_PATH",
            "cannot be combined with KLINES_API_URL",
        )),
        (Some(path), None) => Ok(CandleSourceConfig::CsvFile(PathBuf::from(path))),
        (None, Some(url)) => {
            let from_ms = parse_ms(env_map, "FROM_MS")?;
            let to_ms = parse_ms(env_map, "TO_MS")?;
            if from_ms > to_ms {
                return Err(invalid("FROM_MS", "must not be after TO_MS"));
            }
            Ok(CandleSourceConfig::Klines {
                api_url: url.clone(),
                from_ms,
                to_ms,
            })
        }
        (None, None) => Ok(CandleSourceConfig::None),
    }
}
