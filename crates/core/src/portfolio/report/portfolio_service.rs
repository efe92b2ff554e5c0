use chrono::{DateTime, Utc};
use futures::future::join_all;
use log::{debug, info, warn};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use super::report_model::{
    FlowSummary, IncomeExpenseTotals, PortfolioReport, ReportDiagnostics, ValuedPosition,
};
use crate::activities::{
    classify_record, ClassifiedLedger, ClassifiedRecord, Classifier, RawTransactionRecord,
};
use crate::fx::CurrencyNormalizer;
use crate::ledger::LedgerStoreTrait;
use crate::portfolio::gains::{round_money, FifoGainsEngine, SymbolPricing};
use crate::portfolio::positions::{PositionBook, PositionBuilder};
use crate::quotes::{LatestQuote, PriceSource, QuoteProviderTrait};
use crate::Result;

/// Runs the whole pipeline over a complete record set.
///
/// Pure: the same records, quotes, rate table and `as_of` always produce the
/// same report. `quotes` is keyed by clean symbol.
pub fn compute_portfolio(
    records: &[RawTransactionRecord],
    quotes: &HashMap<String, LatestQuote>,
    normalizer: &CurrencyNormalizer,
    as_of: DateTime<Utc>,
) -> PortfolioReport {
    let ledger = Classifier::classify_all(records);
    let book = PositionBuilder::build(&ledger.trades, normalizer);
    let pricing = resolve_pricing(&ledger, &book, quotes, normalizer);

    let gains = FifoGainsEngine::new(normalizer, as_of).compute(&ledger.trades, &pricing);

    let positions: Vec<ValuedPosition> = book
        .open_positions()
        .into_iter()
        .map(|position| {
            let pricing = pricing
                .get(&position.symbol)
                .copied()
                .unwrap_or_else(|| SymbolPricing::average_cost(position.average_cost));
            let market_value =
                normalizer.to_reporting(position.market_value(pricing.current_price), &position.currency);
            let cost_basis = normalizer.to_reporting(position.total_cost, &position.currency);
            ValuedPosition {
                current_price: pricing.current_price,
                price_source: pricing.source,
                market_value: round_money(market_value),
                cost_basis: round_money(cost_basis),
                unrealized_gain: round_money(market_value - cost_basis),
                position,
            }
        })
        .collect();

    let totals = income_expense_totals(&ledger, normalizer);

    let mut average_cost_priced: Vec<String> = pricing
        .iter()
        .filter(|(_, p)| p.source == PriceSource::AverageCost)
        .map(|(symbol, _)| symbol.clone())
        .collect();
    average_cost_priced.sort();

    let diagnostics = ReportDiagnostics {
        classification: ledger.stats.clone(),
        unknown_currencies: unknown_currencies(&ledger, normalizer),
        average_cost_priced,
        unmatched_sells: gains.unmatched.len(),
    };

    info!(
        "Portfolio as of {}: {} open positions, realized {} {}, net income {} {}",
        as_of.format("%Y-%m-%d"),
        positions.len(),
        gains.totals.realized,
        normalizer.reporting_currency(),
        totals.net_income,
        normalizer.reporting_currency()
    );

    PortfolioReport {
        reporting_currency: normalizer.reporting_currency().to_string(),
        as_of,
        positions,
        trades: ledger.trades,
        fees: ledger.fees,
        taxes: ledger.taxes,
        dividends: ledger.dividends,
        gains,
        totals,
        diagnostics,
    }
}

/// Picks the marking price of every traded symbol, in its position currency.
///
/// A usable quote wins, converted when quoted in another currency. Otherwise
/// an open position's average cost stands in. Closed or never-opened symbols
/// are left out so the gains engine falls back to its own lot average.
fn resolve_pricing(
    ledger: &ClassifiedLedger,
    book: &PositionBook,
    quotes: &HashMap<String, LatestQuote>,
    normalizer: &CurrencyNormalizer,
) -> HashMap<String, SymbolPricing> {
    let mut pricing = HashMap::new();
    for trade in &ledger.trades {
        if pricing.contains_key(&trade.symbol) {
            continue;
        }
        let position = book.get(&trade.symbol);
        let currency = position.map(|p| p.currency.as_str()).unwrap_or(trade.currency.as_str());

        match quotes.get(&trade.symbol).filter(|q| q.is_usable()) {
            Some(quote) => {
                let price = normalizer.convert(quote.price, &quote.currency, currency);
                pricing.insert(trade.symbol.clone(), SymbolPricing::quoted(price));
            }
            None => {
                if let Some(position) = position.filter(|p| p.is_open()) {
                    debug!(
                        "No usable quote for {}, marking at average cost {}",
                        trade.symbol, position.average_cost
                    );
                    pricing.insert(
                        trade.symbol.clone(),
                        SymbolPricing::average_cost(position.average_cost),
                    );
                }
            }
        }
    }
    pricing
}

fn income_expense_totals(ledger: &ClassifiedLedger, normalizer: &CurrencyNormalizer) -> IncomeExpenseTotals {
    let mut dividends = FlowSummary::default();
    for dividend in &ledger.dividends {
        let converted = normalizer.to_reporting(dividend.amount, &dividend.currency);
        dividends.add(Some(dividend.symbol.as_str()), &dividend.currency, dividend.amount, converted);
    }

    let mut fees = FlowSummary::default();
    for fee in &ledger.fees {
        let converted = normalizer.to_reporting(fee.amount, &fee.currency);
        fees.add(fee.symbol.as_deref(), &fee.currency, fee.amount, converted);
    }

    let mut taxes = FlowSummary::default();
    for tax in &ledger.taxes {
        let converted = normalizer.to_reporting(tax.amount, &tax.currency);
        taxes.add(tax.symbol.as_deref(), &tax.currency, tax.amount, converted);
    }

    let net_income = round_money(dividends.total - fees.total - taxes.total);
    IncomeExpenseTotals {
        dividends,
        fees,
        taxes,
        net_income,
    }
}

fn unknown_currencies(ledger: &ClassifiedLedger, normalizer: &CurrencyNormalizer) -> Vec<String> {
    let codes: BTreeSet<String> = ledger
        .trades
        .iter()
        .map(|t| t.currency.as_str())
        .chain(ledger.fees.iter().map(|f| f.currency.as_str()))
        .chain(ledger.taxes.iter().map(|t| t.currency.as_str()))
        .chain(ledger.dividends.iter().map(|d| d.currency.as_str()))
        .filter(|code| !normalizer.is_recognized(code))
        .map(|code| code.trim().to_uppercase())
        .collect();
    codes.into_iter().collect()
}

/// Fetches the ledger and quotes, then runs [`compute_portfolio`].
///
/// Each refresh is a full recompute over a freshly fetched record set.
pub struct PortfolioService {
    ledger: Arc<dyn LedgerStoreTrait>,
    quote_provider: Arc<dyn QuoteProviderTrait>,
    normalizer: CurrencyNormalizer,
}

impl PortfolioService {
    pub fn new(
        ledger: Arc<dyn LedgerStoreTrait>,
        quote_provider: Arc<dyn QuoteProviderTrait>,
        normalizer: CurrencyNormalizer,
    ) -> Self {
        PortfolioService {
            ledger,
            quote_provider,
            normalizer,
        }
    }

    pub async fn refresh(&self, account_id: &str) -> Result<PortfolioReport> {
        self.refresh_as_of(account_id, Utc::now()).await
    }

    /// Ledger failures abort the run; quote failures only degrade pricing.
    pub async fn refresh_as_of(&self, account_id: &str, as_of: DateTime<Utc>) -> Result<PortfolioReport> {
        let records = self.ledger.fetch_records(account_id).await?;
        debug!("Fetched {} ledger records for account {}", records.len(), account_id);

        let symbols: BTreeSet<String> = records
            .iter()
            .filter_map(|record| match classify_record(record) {
                ClassifiedRecord::Trade(trade) => Some(trade.symbol),
                _ => None,
            })
            .collect();
        let quotes = self.fetch_quotes(&symbols).await;

        Ok(compute_portfolio(&records, &quotes, &self.normalizer, as_of))
    }

    async fn fetch_quotes(&self, symbols: &BTreeSet<String>) -> HashMap<String, LatestQuote> {
        let lookups = symbols.iter().map(|symbol| async move {
            (symbol.clone(), self.quote_provider.get_latest_quote(symbol).await)
        });

        let mut quotes = HashMap::new();
        for (symbol, result) in join_all(lookups).await {
            match result {
                Ok(quote) if quote.is_usable() => {
                    quotes.insert(symbol, quote);
                }
                Ok(quote) => warn!(
                    "Ignoring non-positive quote {} {} for {}",
                    quote.price, quote.currency, symbol
                ),
                Err(e) => warn!("Quote lookup failed for {}: {}. Using average cost.", symbol, e),
            }
        }
        quotes
    }
}
