use ldca_sim::orchestration::{render_report_file, Orchestrator};
use ldca_sim::{
    AppError, BudgetReport, BudgetSnapshot, Candle, CandleSource, Config, DataSourceError,
    Decimal, LdcaResult, MockCandleSource, TimeMs,
};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

const MINUTE: i64 = 60_000;

fn d(s: &str) -> Decimal {
    Decimal::from_str_canonical(s).unwrap()
}

fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    let mut map: HashMap<String, String> = [
        ("SYMBOL_PAIR", "BTC/USDT"),
        ("QUOTE_SIZE", "100"),
        ("ORDER_PERIOD_MINUTES", "1"),
        ("TRADE_FEE", "0"),
        ("LOT_SIZE", "0.001"),
    ]
    .iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    for (k, v) in pairs {
        map.insert(k.to_string(), v.to_string());
    }
    map
}

fn flat_candle(minute: i64, price: &str) -> Candle {
    let p = d(price);
    Candle::new(TimeMs::new(minute * MINUTE), p, p, p, p)
}

fn orchestrator(config: Config, source: MockCandleSource) -> Orchestrator {
    let source: Arc<dyn CandleSource> = Arc::new(source);
    Orchestrator::new(config, Some(source))
}

#[tokio::test]
async fn test_run_simulation_with_mock_source() {
    let config = Config::from_env_map(env(&[])).unwrap();
    let source = MockCandleSource::new().with_candles(vec![
        flat_candle(0, "100"),
        flat_candle(1, "100"),
        flat_candle(2, "100"),
    ]);

    let result = orchestrator(config, source).run_simulation().await.unwrap();

    assert_eq!(result.orders_placed(), 3);
    assert_eq!(result.final_base_balance, d("3"));
    assert_eq!(result.final_quote_balance, d("-300"));
    assert_eq!(result.final_price, d("100"));
    assert_eq!(result.average_order_price, d("100"));
    assert!(result.total_trade_fees.is_zero());
}

#[tokio::test]
async fn test_run_simulation_writes_result_json() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("result.json");
    let config =
        Config::from_env_map(env(&[("RESULT_JSON_PATH", path.to_str().unwrap())])).unwrap();
    let source = MockCandleSource::new().with_candles(vec![flat_candle(0, "3"), flat_candle(1, "7")]);

    let result = orchestrator(config, source).run_simulation().await.unwrap();

    let bytes = std::fs::read(&path).unwrap();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["orders"].as_array().map(|o| o.len()), Some(2));
    assert_eq!(json["fee_symbol"], serde_json::json!("BTC"));
    assert_eq!(json["positions_liquidated"], serde_json::json!(0));
    assert!(json["profit_percent"].is_string());

    // Decimals are written as strings, so reading the file back is exact.
    let written: LdcaResult = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(written, result);
}

#[tokio::test]
async fn test_run_simulation_from_csv_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("candles.csv");
    std::fs::write(
        &path,
        "open_time,open,high,low,close,base_volume,quote_volume\n\
         120000,50,50,50,50,1,50\n\
         0,100,100,100,100,1,100\n\
         60000,80,80,80,80,1,80\n",
    )
    .unwrap();
    let config =
        Config::from_env_map(env(&[("CANDLES_CSV_PATH", path.to_str().unwrap())])).unwrap();

    let orchestrator = Orchestrator::from_config(config);
    assert!(orchestrator.has_candle_source());
    let result = orchestrator.run_simulation().await.unwrap();

    let prices: Vec<Decimal> = result.orders.iter().map(|o| o.price).collect();
    assert_eq!(prices, vec![d("100"), d("80"), d("50")]);
    assert_eq!(result.final_price, d("50"));
}

#[tokio::test]
async fn test_run_simulation_without_source_fails() {
    let config = Config::from_env_map(env(&[])).unwrap();
    let orchestrator = Orchestrator::from_config(config);
    assert!(!orchestrator.has_candle_source());

    let err = orchestrator.run_simulation().await.unwrap_err();
    assert!(matches!(err, AppError::NoCandleSource));
}

#[tokio::test]
async fn test_run_simulation_with_no_candles_fails() {
    let config = Config::from_env_map(env(&[])).unwrap();
    let err = orchestrator(config, MockCandleSource::new())
        .run_simulation()
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NoCandles(ref pair) if pair == "BTC/USDT"));
}

#[tokio::test]
async fn test_source_failure_is_propagated() {
    let config = Config::from_env_map(env(&[])).unwrap();
    let source = MockCandleSource::new().failing_with(DataSourceError::RateLimited);

    let err = orchestrator(config, source).run_simulation().await.unwrap_err();
    assert!(matches!(err, AppError::DataSource(DataSourceError::RateLimited)));
}

fn write_reports(path: &Path) {
    let reports = vec![
        BudgetReport {
            start_time: TimeMs::new(0),
            end_time: TimeMs::new(60 * MINUTE),
            primary_asset: ldca_sim::Symbol::new("USDT"),
            initial_value: Decimal::from_i64(1000),
            final_value: Decimal::from_i64(1020),
            total_profit: Decimal::from_i64(20),
            initial_budget: BudgetSnapshot::new().with("USDT", Decimal::from_i64(1000)),
            final_budget: BudgetSnapshot::new()
                .with("BTC", Decimal::from_i64(2))
                .with("USDT", Decimal::from_i64(900)),
            fees_paid: None,
        },
        BudgetReport {
            start_time: TimeMs::new(60 * MINUTE),
            end_time: TimeMs::new(120 * MINUTE),
            primary_asset: ldca_sim::Symbol::new("USDT"),
            initial_value: Decimal::from_i64(1020),
            final_value: Decimal::from_i64(1010),
            total_profit: Decimal::from_i64(10),
            initial_budget: BudgetSnapshot::new()
                .with("BTC", Decimal::from_i64(2))
                .with("USDT", Decimal::from_i64(900)),
            final_budget: BudgetSnapshot::new()
                .with("BTC", Decimal::from_i64(3))
                .with("USDT", Decimal::from_i64(800)),
            fees_paid: None,
        },
    ];
    std::fs::write(path, serde_json::to_vec(&reports).unwrap()).unwrap();
}

#[tokio::test]
async fn test_render_report_file_writes_csv() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("reports.json");
    let output = dir.path().join("report.csv");
    write_reports(&input);

    let config = Config::from_env_map(env(&[
        ("BUDGET_REPORTS_PATH", input.to_str().unwrap()),
        ("REPORT_CSV_PATH", output.to_str().unwrap()),
    ]))
    .unwrap();
    let paths = config.report.clone().unwrap();

    let table = render_report_file(&paths).await.unwrap();
    assert_eq!(table.rows.len(), 3);

    let content = std::fs::read_to_string(&output).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(
        lines,
        vec![
            "time,period,value,delta,profit,BTC,USDT",
            "1970-01-01 00:00:00,0.00:00:00,1000,0,0,,1000",
            "1970-01-01 01:00:00,0.01:00:00,1020,20,20,2,900",
            "1970-01-01 02:00:00,0.02:00:00,1010,-10,10,3,800",
        ]
    );

    let rendered = Orchestrator::from_config(config).render_reports().await.unwrap();
    assert_eq!(rendered, Some(table));
}

#[tokio::test]
async fn test_render_reports_without_paths_is_none() {
    let config = Config::from_env_map(env(&[])).unwrap();
    let rendered = Orchestrator::from_config(config).render_reports().await.unwrap();
    assert!(rendered.is_none());
}

#[tokio::test]
async fn test_render_report_file_missing_input() {
    let dir = TempDir::new().unwrap();
    let paths = ldca_sim::config::ReportPaths {
        reports_json: dir.path().join("missing.json"),
        output_csv: dir.path().join("out.csv"),
    };
    let err = render_report_file(&paths).await.unwrap_err();
    assert!(matches!(err, AppError::Io(_)));
}
