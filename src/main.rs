use anyhow::Context;
use ldca_sim::config::Config;
use ldca_sim::orchestration::Orchestrator;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    // Load configuration
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = run(config).await {
        eprintln!("{:#}", e);
        std::process::exit(1);
    }
}

async fn run(config: Config) -> anyhow::Result<()> {
    let orchestrator = Orchestrator::from_config(config);

    let rendered = orchestrator
        .render_reports()
        .await
        .context("failed to render budget report")?;

    if !orchestrator.has_candle_source() {
        if rendered.is_none() {
            anyhow::bail!("nothing to do: configure a candle source or budget report paths");
        }
        return Ok(());
    }

    let result = orchestrator
        .run_simulation()
        .await
        .context("simulation failed")?;

    tracing::info!(
        final_price = %result.final_price,
        total_value = %result.total_value,
        invested = %result.total_invested_amount,
        profit_percent = %result.profit_percent,
        fees = %result.total_trade_fees,
        fee_symbol = %result.fee_symbol,
        rollover_fees = %result.total_rollover_fees,
        average_order_price = %result.average_order_price,
        "Result"
    );

    Ok(())
}
