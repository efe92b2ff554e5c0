use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::activities::{ClassificationStats, DividendRecord, FeeRecord, NormalizedTrade};
use crate::portfolio::gains::GainsReport;
use crate::portfolio::positions::Position;
use crate::quotes::PriceSource;

/// An open position marked to its current price.
///
/// `current_price` stays in the position currency; the valuation fields are
/// in the reporting currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValuedPosition {
    #[serde(flatten)]
    pub position: Position,
    pub current_price: Decimal,
    pub price_source: PriceSource,
    pub market_value: Decimal,
    pub cost_basis: Decimal,
    pub unrealized_gain: Decimal,
}

/// Totals of one cash-flow stream (dividends, fees or taxes).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowSummary {
    /// In the reporting currency.
    pub total: Decimal,
    pub count: usize,
    /// Reporting-currency amounts keyed by clean symbol. Flows without a
    /// symbol are not listed here.
    pub by_symbol: BTreeMap<String, Decimal>,
    /// Unconverted amounts keyed by original currency.
    pub by_currency: BTreeMap<String, Decimal>,
}

impl FlowSummary {
    pub fn add(&mut self, symbol: Option<&str>, currency: &str, amount: Decimal, converted: Decimal) {
        self.total += converted;
        self.count += 1;
        if let Some(symbol) = symbol.filter(|s| !s.is_empty()) {
            *self.by_symbol.entry(symbol.to_string()).or_insert(Decimal::ZERO) += converted;
        }
        *self
            .by_currency
            .entry(currency.trim().to_uppercase())
            .or_insert(Decimal::ZERO) += amount;
    }
}

/// Income and expense totals in the reporting currency.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomeExpenseTotals {
    pub dividends: FlowSummary,
    pub fees: FlowSummary,
    pub taxes: FlowSummary,
    /// Dividends less fees and taxes.
    pub net_income: Decimal,
}

/// Non-fatal findings from one pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportDiagnostics {
    pub classification: ClassificationStats,
    /// Currency codes converted with the fallback factor.
    pub unknown_currencies: Vec<String>,
    /// Symbols marked at average cost for lack of a usable quote.
    pub average_cost_priced: Vec<String>,
    pub unmatched_sells: usize,
}

/// Everything one pipeline run produces. Plain data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioReport {
    pub reporting_currency: String,
    pub as_of: DateTime<Utc>,
    /// Open positions ordered by symbol.
    pub positions: Vec<ValuedPosition>,
    pub trades: Vec<NormalizedTrade>,
    pub fees: Vec<FeeRecord>,
    pub taxes: Vec<FeeRecord>,
    pub dividends: Vec<DividendRecord>,
    pub gains: GainsReport,
    pub totals: IncomeExpenseTotals,
    pub diagnostics: ReportDiagnostics,
}

impl PortfolioReport {
    pub fn position(&self, symbol: &str) -> Option<&ValuedPosition> {
        self.positions.iter().find(|p| p.position.symbol == symbol)
    }

    /// Market value of all open positions in the reporting currency.
    pub fn market_value(&self) -> Decimal {
        self.positions.iter().map(|p| p.market_value).sum()
    }
}
