use super::*;
use crate::activities::RawTransactionRecord;
use crate::errors::{Error, LedgerError};
use crate::fx::{CurrencyNormalizer, RateTable};
use crate::ledger::LedgerStoreTrait;
use crate::quotes::{LatestQuote, PriceSource, StaticQuoteProvider};
use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

// --- Mock collaborators ---

struct MockLedger {
    records: Vec<RawTransactionRecord>,
    calls: AtomicUsize,
}

impl MockLedger {
    fn new(records: Vec<RawTransactionRecord>) -> Self {
        MockLedger {
            records,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl LedgerStoreTrait for MockLedger {
    async fn fetch_records(&self, _account_id: &str) -> Result<Vec<RawTransactionRecord>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.records.clone())
    }
}

struct UnreachableLedger;

#[async_trait]
impl LedgerStoreTrait for UnreachableLedger {
    async fn fetch_records(&self, _account_id: &str) -> Result<Vec<RawTransactionRecord>> {
        Err(LedgerError::Unreachable("connection refused".to_string()).into())
    }
}

// --- Fixtures ---

fn date(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
}

fn as_of() -> DateTime<Utc> {
    date(2024, 6, 1)
}

fn record(
    symbol: &str,
    asset_type: &str,
    transaction_type: &str,
    quantity: Decimal,
    price: Decimal,
    currency: &str,
    at: DateTime<Utc>,
) -> RawTransactionRecord {
    RawTransactionRecord::new(symbol, asset_type, transaction_type, quantity, price, currency, at)
}

fn sample_ledger() -> Vec<RawTransactionRecord> {
    vec![
        // Deliberately out of order.
        record("AAPL", "stock", "sell", dec!(15), dec!(150), "EUR", date(2024, 3, 1)),
        record("AAPL", "stock", "buy", dec!(10), dec!(100), "EUR", date(2024, 1, 1)),
        record("AAPL", "stock", "buy", dec!(10), dec!(120), "EUR", date(2024, 2, 1)),
        record("VOD:LSE", "equity", "buy", dec!(100), dec!(1), "GBP", date(2024, 1, 5)),
        record("VOD:LSE", "dividend", "", dec!(0), dec!(50), "GBP", date(2024, 4, 1)),
        record("VOD:LSE", "", "withholding tax", dec!(0), dec!(7.5), "GBP", date(2024, 4, 1)),
        record("fee", "", "", dec!(0), dec!(-2.5), "EUR", date(2024, 3, 1)),
        record("cash", "cash", "deposit", dec!(1000), dec!(1), "EUR", date(2023, 12, 31)),
        record("XYZ", "bond", "coupon", dec!(1), dec!(3), "EUR", date(2024, 2, 2)),
    ]
}

fn normalizer() -> CurrencyNormalizer {
    CurrencyNormalizer::new(RateTable::new("EUR").with_rate("GBP", dec!(1.17)))
}

// --- compute_portfolio ---

#[test]
fn test_compute_portfolio_end_to_end() {
    let report = compute_portfolio(&sample_ledger(), &HashMap::new(), &normalizer(), as_of());

    assert_eq!(report.reporting_currency, "EUR");
    assert_eq!(report.trades.len(), 4);
    assert_eq!(report.trades[0].date, date(2024, 1, 1));

    let aapl = report.position("AAPL").unwrap();
    assert_eq!(aapl.position.share_count, dec!(5));
    assert_eq!(aapl.position.average_cost, dec!(110));
    assert_eq!(aapl.price_source, PriceSource::AverageCost);
    assert_eq!(aapl.current_price, dec!(110));

    let vod = report.position("VOD").unwrap();
    assert_eq!(vod.position.currency, "GBP");
    assert_eq!(vod.cost_basis, dec!(117));

    let aapl_gains = report.gains.symbol("AAPL").unwrap();
    assert_eq!(aapl_gains.realized, dec!(650));
    assert_eq!(aapl_gains.cost_basis_sold, dec!(1600));
    assert_eq!(aapl_gains.proceeds, dec!(2250));

    assert_eq!(report.dividends.len(), 1);
    assert_eq!(report.dividends[0].amount, dec!(50));
    assert_eq!(report.totals.dividends.total, dec!(58.5));
    assert_eq!(report.totals.fees.total, dec!(2.5));
    assert_eq!(report.totals.taxes.total, dec!(8.775));
    assert_eq!(report.totals.taxes.by_symbol.get("VOD"), Some(&dec!(8.775)));
    assert_eq!(report.totals.net_income, dec!(47.225));

    let stats = &report.diagnostics.classification;
    assert_eq!(stats.total, 9);
    assert_eq!(stats.cash, 1);
    assert_eq!(stats.skipped, 1);
    assert_eq!(stats.trades, 4);
    assert!(report.diagnostics.unknown_currencies.is_empty());
    assert_eq!(report.diagnostics.unmatched_sells, 0);
}

#[test]
fn test_quote_in_other_currency_is_converted() {
    let mut quotes = HashMap::new();
    // 2 GBP = 2.34 EUR, held in EUR.
    quotes.insert("AAPL".to_string(), LatestQuote::new(dec!(200), "GBP"));

    let report = compute_portfolio(&sample_ledger(), &quotes, &normalizer(), as_of());
    let aapl = report.position("AAPL").unwrap();

    assert_eq!(aapl.price_source, PriceSource::Quote);
    assert_eq!(aapl.current_price, dec!(234));
    assert_eq!(aapl.market_value, dec!(1170));
    assert_eq!(aapl.unrealized_gain, dec!(620));
    assert_eq!(report.gains.symbol("AAPL").unwrap().unrealized, dec!(570));
}

#[test]
fn test_non_positive_quote_falls_back_to_average_cost() {
    let mut quotes = HashMap::new();
    quotes.insert("AAPL".to_string(), LatestQuote::new(dec!(0), "EUR"));

    let report = compute_portfolio(&sample_ledger(), &quotes, &normalizer(), as_of());

    assert_eq!(report.position("AAPL").unwrap().price_source, PriceSource::AverageCost);
    assert!(report
        .diagnostics
        .average_cost_priced
        .contains(&"AAPL".to_string()));
}

#[test]
fn test_closed_positions_are_not_average_cost_priced() {
    let records = vec![
        record("MSFT", "stock", "buy", dec!(1), dec!(10), "EUR", date(2024, 1, 1)),
        record("MSFT", "stock", "sell", dec!(1), dec!(12), "EUR", date(2024, 2, 1)),
        record("AAPL", "stock", "buy", dec!(1), dec!(100), "EUR", date(2024, 1, 1)),
    ];

    let report = compute_portfolio(&records, &HashMap::new(), &normalizer(), as_of());

    assert_eq!(report.diagnostics.average_cost_priced, vec!["AAPL".to_string()]);
    assert_eq!(report.gains.symbol("MSFT").unwrap().realized, dec!(2));
}

#[test]
fn test_symbol_listed_on_two_exchanges_converts_each_trade() {
    let normalizer = CurrencyNormalizer::new(
        RateTable::new("EUR")
            .with_rate("USD", dec!(0.92))
            .with_rate("GBP", dec!(1.17)),
    );
    let records = vec![
        record("VOD:NASDAQ", "stock", "buy", dec!(10), dec!(100), "USD", date(2024, 1, 1)),
        record("VOD:LSE", "stock", "sell", dec!(10), dec!(100), "GBP", date(2024, 2, 1)),
    ];

    let report = compute_portfolio(&records, &HashMap::new(), &normalizer, as_of());
    let vod = report.gains.symbol("VOD").unwrap();

    assert_eq!(vod.proceeds, dec!(1170));
    assert_eq!(vod.cost_basis_sold, dec!(920));
    assert_eq!(vod.realized, dec!(250));
    assert!(report.positions.is_empty());
}

#[test]
fn test_overflowing_trade_is_skipped_without_failing_the_report() {
    let huge = dec!(100000000000000000);
    let records = vec![
        record("AAPL", "stock", "buy", huge, huge, "EUR", date(2024, 1, 1)),
        record("MSFT", "stock", "buy", dec!(2), dec!(300), "EUR", date(2024, 1, 1)),
    ];

    let report = compute_portfolio(&records, &HashMap::new(), &normalizer(), as_of());

    assert!(report.position("AAPL").is_none());
    assert_eq!(report.position("MSFT").unwrap().cost_basis, dec!(600));
    assert_eq!(report.diagnostics.classification.skipped, 1);
}

#[test]
fn test_unknown_currency_is_reported() {
    let records = vec![record("BHP", "stock", "buy", dec!(10), dec!(5), "ZAR", date(2024, 1, 1))];

    let report = compute_portfolio(&records, &HashMap::new(), &normalizer(), as_of());

    assert_eq!(report.diagnostics.unknown_currencies, vec!["ZAR".to_string()]);
    assert_eq!(report.position("BHP").unwrap().cost_basis, dec!(50));
}

#[test]
fn test_empty_ledger_yields_empty_report() {
    let report = compute_portfolio(&[], &HashMap::new(), &normalizer(), as_of());

    assert!(report.positions.is_empty());
    assert!(report.gains.symbols.is_empty());
    assert_eq!(report.gains.totals.realized, dec!(0));
    assert_eq!(report.totals.net_income, dec!(0));
}

#[test]
fn test_compute_is_idempotent() {
    let records = sample_ledger();
    let first = compute_portfolio(&records, &HashMap::new(), &normalizer(), as_of());
    let second = compute_portfolio(&records, &HashMap::new(), &normalizer(), as_of());
    assert_eq!(first, second);
}

// --- PortfolioService ---

#[tokio::test]
async fn test_refresh_fetches_and_uses_quotes() {
    let ledger = Arc::new(MockLedger::new(sample_ledger()));
    let quotes = StaticQuoteProvider::default().with_quote("AAPL", LatestQuote::new(dec!(130), "EUR"));
    let service = PortfolioService::new(ledger.clone(), Arc::new(quotes), normalizer());

    let report = service.refresh_as_of("acc-1", as_of()).await.unwrap();

    assert_eq!(ledger.calls.load(Ordering::SeqCst), 1);
    let aapl = report.position("AAPL").unwrap();
    assert_eq!(aapl.price_source, PriceSource::Quote);
    assert_eq!(aapl.market_value, dec!(650));
    // VOD has no quote and is marked at its average cost.
    assert_eq!(report.position("VOD").unwrap().price_source, PriceSource::AverageCost);
    assert_eq!(report.gains.symbol("AAPL").unwrap().unrealized, dec!(50));
}

#[tokio::test]
async fn test_refresh_recomputes_every_time() {
    let ledger = Arc::new(MockLedger::new(sample_ledger()));
    let service = PortfolioService::new(
        ledger.clone(),
        Arc::new(StaticQuoteProvider::default()),
        normalizer(),
    );

    let first = service.refresh_as_of("acc-1", as_of()).await.unwrap();
    let second = service.refresh_as_of("acc-1", as_of()).await.unwrap();

    assert_eq!(ledger.calls.load(Ordering::SeqCst), 2);
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_refresh_propagates_ledger_failure() {
    let service = PortfolioService::new(
        Arc::new(UnreachableLedger),
        Arc::new(StaticQuoteProvider::default()),
        normalizer(),
    );

    let result = service.refresh("acc-1").await;

    assert!(matches!(result, Err(Error::Ledger(LedgerError::Unreachable(_)))));
}
