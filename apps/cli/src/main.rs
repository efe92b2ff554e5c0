mod config;
mod main_lib;

use config::Config;
use main_lib::{build_service, init_tracing};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    init_tracing();
    let service = build_service(&config).await?;

    let report = service.refresh(&config.account_id).await?;
    tracing::info!(
        "Report ready: {} open positions worth {} {}, {} sales",
        report.positions.len(),
        report.market_value(),
        report.reporting_currency,
        report.gains.sales.len()
    );
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
