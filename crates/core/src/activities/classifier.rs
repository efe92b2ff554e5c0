//! Rule-based classification of raw ledger records.
//!
//! Each record is matched against an ordered rule list (cash, fee, tax,
//! dividend, trade); the first rule that matches decides its variant and
//! anything left over is skipped.

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::activities_constants::*;
use super::activities_model::{multiply_tolerant, split_symbol, RawTransactionRecord};
use crate::constants::{CURRENCY_EPSILON, DIVIDEND_QUANTITY_THRESHOLD, SHARE_EPSILON};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TradeDirection {
    Buy,
    Sell,
}

/// A Buy or Sell derived from a raw record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedTrade {
    /// Symbol with the exchange suffix stripped.
    pub symbol: String,
    pub full_symbol: String,
    pub exchange: Option<String>,
    pub direction: TradeDirection,
    /// Always a positive magnitude; the direction carries the sign.
    pub share_count: Decimal,
    pub unit_price: Decimal,
    pub currency: String,
    pub date: DateTime<Utc>,
}

impl NormalizedTrade {
    pub fn is_buy(&self) -> bool {
        self.direction == TradeDirection::Buy
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FeeKind {
    TransactionFee,
    WithholdingTax,
}

impl FeeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeeKind::TransactionFee => "Transaction Fee",
            FeeKind::WithholdingTax => "Withholding Tax",
        }
    }
}

impl fmt::Display for FeeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fee or tax deduction. `amount` is a magnitude.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeRecord {
    pub kind: FeeKind,
    pub amount: Decimal,
    pub currency: String,
    pub date: DateTime<Utc>,
    pub symbol: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DividendRecord {
    pub symbol: String,
    pub amount: Decimal,
    pub currency: String,
    pub date: DateTime<Utc>,
}

/// Outcome of classifying one raw record.
#[derive(Debug, Clone, PartialEq)]
pub enum ClassifiedRecord {
    Cash,
    Fee(FeeRecord),
    Tax(FeeRecord),
    Dividend(DividendRecord),
    /// Matched the dividend rule but the amount is too small to record.
    NegligibleDividend,
    Trade(NormalizedTrade),
    Skipped,
}

/// Classifies one record. Pure; first matching rule wins.
pub fn classify_record(record: &RawTransactionRecord) -> ClassifiedRecord {
    let symbol = record.symbol.trim();
    let symbol_key = symbol.to_lowercase();
    let asset_type = normalize_keyword(&record.asset_type);
    let transaction_type = normalize_keyword(&record.transaction_type);

    if symbol_key == SYMBOL_CASH || asset_type == ASSET_TYPE_CASH {
        return ClassifiedRecord::Cash;
    }

    if symbol_key == SYMBOL_FEE || asset_type == ASSET_TYPE_EXPENSE {
        return ClassifiedRecord::Fee(FeeRecord {
            kind: FeeKind::TransactionFee,
            amount: record.price_per_unit.abs(),
            currency: record.currency.clone(),
            date: record.date,
            symbol: None,
        });
    }

    if asset_type == ASSET_TYPE_TAX || transaction_type == TRANSACTION_TYPE_WITHHOLDING_TAX {
        let (clean_symbol, _) = split_symbol(symbol);
        return ClassifiedRecord::Tax(FeeRecord {
            kind: FeeKind::WithholdingTax,
            amount: record.price_per_unit.abs(),
            currency: record.currency.clone(),
            date: record.date,
            symbol: (!clean_symbol.is_empty()).then_some(clean_symbol),
        });
    }

    if is_dividend_type(&asset_type) || is_dividend_type(&transaction_type) {
        let (clean_symbol, _) = split_symbol(symbol);
        let amount = if record.quantity.abs() < DIVIDEND_QUANTITY_THRESHOLD {
            record.price_per_unit.abs()
        } else {
            multiply_tolerant(record.price_per_unit, record.quantity, "dividend amount").abs()
        };
        if amount <= CURRENCY_EPSILON {
            return ClassifiedRecord::NegligibleDividend;
        }
        return ClassifiedRecord::Dividend(DividendRecord {
            symbol: clean_symbol,
            amount,
            currency: record.currency.clone(),
            date: record.date,
        });
    }

    let looks_like_trade =
        is_trade_asset_type(&asset_type) || is_trade_transaction_type(&transaction_type);
    if looks_like_trade
        && record.quantity.abs() > SHARE_EPSILON
        && record.price_per_unit > Decimal::ZERO
    {
        if record.quantity.checked_mul(record.price_per_unit).is_none() {
            warn!(
                "Skipping trade {}: {} * {} overflows",
                record.label(),
                record.quantity,
                record.price_per_unit
            );
            return ClassifiedRecord::Skipped;
        }
        let direction = match transaction_type.as_str() {
            TRANSACTION_TYPE_SELL | TRANSACTION_TYPE_TRANSFER_OUT => TradeDirection::Sell,
            TRANSACTION_TYPE_BUY | TRANSACTION_TYPE_TRANSFER_IN => TradeDirection::Buy,
            _ if record.quantity.is_sign_negative() => TradeDirection::Sell,
            _ => TradeDirection::Buy,
        };
        let (clean_symbol, exchange) = split_symbol(symbol);
        return ClassifiedRecord::Trade(NormalizedTrade {
            symbol: clean_symbol,
            full_symbol: symbol.to_string(),
            exchange,
            direction,
            share_count: record.quantity.abs(),
            unit_price: record.price_per_unit,
            currency: record.currency.clone(),
            date: record.date,
        });
    }

    ClassifiedRecord::Skipped
}

/// Records processed per category, for diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationStats {
    pub total: usize,
    pub cash: usize,
    pub fees: usize,
    pub taxes: usize,
    pub dividends: usize,
    pub negligible_dividends: usize,
    pub trades: usize,
    pub skipped: usize,
}

impl ClassificationStats {
    pub fn record(&mut self, outcome: &ClassifiedRecord) {
        self.total += 1;
        match outcome {
            ClassifiedRecord::Cash => self.cash += 1,
            ClassifiedRecord::Fee(_) => self.fees += 1,
            ClassifiedRecord::Tax(_) => self.taxes += 1,
            ClassifiedRecord::Dividend(_) => self.dividends += 1,
            ClassifiedRecord::NegligibleDividend => self.negligible_dividends += 1,
            ClassifiedRecord::Trade(_) => self.trades += 1,
            ClassifiedRecord::Skipped => self.skipped += 1,
        }
    }
}

/// The classified streams of a whole ledger.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifiedLedger {
    /// Sorted ascending by date; ties keep ledger order.
    pub trades: Vec<NormalizedTrade>,
    pub fees: Vec<FeeRecord>,
    pub taxes: Vec<FeeRecord>,
    pub dividends: Vec<DividendRecord>,
    pub stats: ClassificationStats,
}

/// Stateful wrapper around [`classify_record`] that keeps the counters.
#[derive(Debug, Default)]
pub struct Classifier {
    stats: ClassificationStats,
}

impl Classifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn classify(&mut self, record: &RawTransactionRecord) -> ClassifiedRecord {
        let outcome = classify_record(record);
        if outcome == ClassifiedRecord::Skipped {
            debug!(
                "Skipping record {}: asset type '{}', transaction type '{}', quantity {}, price {}",
                record.label(),
                record.asset_type,
                record.transaction_type,
                record.quantity,
                record.price_per_unit
            );
        }
        self.stats.record(&outcome);
        outcome
    }

    pub fn stats(&self) -> &ClassificationStats {
        &self.stats
    }

    /// Classifies every record and splits the outcome into typed streams.
    pub fn classify_all(records: &[RawTransactionRecord]) -> ClassifiedLedger {
        let mut classifier = Classifier::new();
        let mut ledger = ClassifiedLedger::default();

        // Sort first so every stream comes out in date order.
        let mut ordered: Vec<&RawTransactionRecord> = records.iter().collect();
        ordered.sort_by_key(|record| record.date);

        for record in ordered {
            match classifier.classify(record) {
                ClassifiedRecord::Fee(fee) => ledger.fees.push(fee),
                ClassifiedRecord::Tax(tax) => ledger.taxes.push(tax),
                ClassifiedRecord::Dividend(dividend) => ledger.dividends.push(dividend),
                ClassifiedRecord::Trade(trade) => ledger.trades.push(trade),
                ClassifiedRecord::Cash
                | ClassifiedRecord::NegligibleDividend
                | ClassifiedRecord::Skipped => {}
            }
        }

        ledger.stats = classifier.stats;
        info!(
            "Classified {} records: {} trades, {} fees, {} taxes, {} dividends, {} cash, {} skipped",
            ledger.stats.total,
            ledger.stats.trades,
            ledger.stats.fees,
            ledger.stats.taxes,
            ledger.stats.dividends,
            ledger.stats.cash,
            ledger.stats.skipped
        );
        ledger
    }
}
