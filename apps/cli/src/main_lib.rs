use std::path::Path;
use std::sync::Arc;

use gainbook_connect::{CsvFileLedger, LedgerApiClient};
use gainbook_core::fx::CurrencyNormalizer;
use gainbook_core::ledger::LedgerStoreTrait;
use gainbook_core::quotes::{QuoteProviderTrait, StaticQuoteProvider};
use gainbook_core::PortfolioService;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::{Config, LedgerSource};

pub fn init_tracing() {
    let log_format = std::env::var("GB_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    // Logs go to stderr; stdout carries the report.
    if log_format.eq_ignore_ascii_case("json") {
        registry
            .with(fmt::layer().json().with_current_span(false).with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_line_number(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

pub fn build_ledger(config: &Config) -> anyhow::Result<Arc<dyn LedgerStoreTrait>> {
    let ledger: Arc<dyn LedgerStoreTrait> = match &config.ledger {
        LedgerSource::Api(ledger_config) => {
            tracing::info!("Using ledger API at {}", ledger_config.endpoint);
            Arc::new(LedgerApiClient::new(ledger_config)?)
        }
        LedgerSource::File { path, parse } => {
            tracing::info!("Using ledger file {}", path.display());
            Arc::new(CsvFileLedger::new(path, parse.clone()))
        }
    };
    Ok(ledger)
}

pub async fn load_quotes(path: Option<&Path>) -> anyhow::Result<StaticQuoteProvider> {
    let Some(path) = path else {
        tracing::info!("No prices file configured; holdings are marked at average cost");
        return Ok(StaticQuoteProvider::default());
    };
    let json = tokio::fs::read_to_string(path).await?;
    let provider = StaticQuoteProvider::from_json_str(&json)?;
    tracing::info!("Loaded {} quotes from {}", provider.len(), path.display());
    Ok(provider)
}

pub async fn build_service(config: &Config) -> anyhow::Result<PortfolioService> {
    let ledger = build_ledger(config)?;
    let quotes: Arc<dyn QuoteProviderTrait> =
        Arc::new(load_quotes(config.prices_file.as_deref()).await?);
    let normalizer = CurrencyNormalizer::new(config.rate_table());
    tracing::info!(
        "Reporting in {} with {} configured rates",
        normalizer.reporting_currency(),
        normalizer.table().rates.len()
    );
    Ok(PortfolioService::new(ledger, quotes, normalizer))
}
