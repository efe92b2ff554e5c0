use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::activities::multiply_tolerant;
use crate::constants::{CURRENCY_EPSILON, LONG_TERM_HOLDING_DAYS, SHARE_EPSILON};
use crate::quotes::PriceSource;

const SECONDS_PER_DAY: i64 = 86_400;

/// Holding-period bucket of a sale or an unrealized lot.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HoldingTerm {
    ShortTerm,
    LongTerm,
}

impl HoldingTerm {
    /// Long-term only strictly beyond the threshold; exactly 365 days is short-term.
    pub fn from_days(days: i64) -> Self {
        if days > LONG_TERM_HOLDING_DAYS {
            HoldingTerm::LongTerm
        } else {
            HoldingTerm::ShortTerm
        }
    }
}

impl fmt::Display for HoldingTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HoldingTerm::ShortTerm => write!(f, "Short-term"),
            HoldingTerm::LongTerm => write!(f, "Long-term"),
        }
    }
}

/// Whole days between two instants, any started day counting as a full one.
pub fn holding_days(from: DateTime<Utc>, to: DateTime<Utc>) -> i64 {
    let seconds = (to - from).num_seconds();
    if seconds <= 0 {
        return 0;
    }
    (seconds + SECONDS_PER_DAY - 1) / SECONDS_PER_DAY
}

/// Zeroes money values below reporting precision.
pub fn round_money(value: Decimal) -> Decimal {
    if value.abs() < CURRENCY_EPSILON {
        Decimal::ZERO
    } else {
        value
    }
}

/// One acquisition awaiting disposal.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaxLot {
    pub acquisition_date: DateTime<Utc>,
    pub original_share_count: Decimal,
    pub remaining_share_count: Decimal,
    /// Cost per share in `currency`.
    pub unit_cost: Decimal,
    /// Currency of the acquiring trade.
    pub currency: String,
}

impl TaxLot {
    pub fn new(
        acquisition_date: DateTime<Utc>,
        share_count: Decimal,
        unit_cost: Decimal,
        currency: &str,
    ) -> Self {
        TaxLot {
            acquisition_date,
            original_share_count: share_count,
            remaining_share_count: share_count,
            unit_cost,
            currency: currency.to_string(),
        }
    }

    /// Takes up to `wanted` shares from the lot and returns how many were taken.
    pub fn consume(&mut self, wanted: Decimal) -> Decimal {
        let taken = wanted.min(self.remaining_share_count);
        self.remaining_share_count -= taken;
        taken
    }

    /// Dust at or below the share epsilon counts as drained.
    pub fn is_drained(&self) -> bool {
        self.remaining_share_count <= SHARE_EPSILON
    }

    /// Cost of the shares left, in the lot currency.
    pub fn remaining_cost(&self) -> Decimal {
        multiply_tolerant(self.remaining_share_count, self.unit_cost, "lot cost")
    }
}

/// Audit record of one lot consumed by one sale.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SellMatch {
    pub symbol: String,
    pub sell_date: DateTime<Utc>,
    pub matched_share_count: Decimal,
    pub lot_date: DateTime<Utc>,
    pub lot_unit_cost: Decimal,
    pub lot_currency: String,
}

/// A sale that found fewer lot shares than it sold.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UnmatchedSell {
    pub symbol: String,
    pub sell_date: DateTime<Utc>,
    pub requested_share_count: Decimal,
    pub unmatched_share_count: Decimal,
}

/// Outcome of one sale. Money fields are in the reporting currency.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SaleRecord {
    pub symbol: String,
    pub sell_date: DateTime<Utc>,
    pub shares_sold: Decimal,
    pub matched_shares: Decimal,
    pub unmatched_shares: Decimal,
    pub proceeds: Decimal,
    pub cost_basis: Decimal,
    pub realized_gain: Decimal,
    pub holding_days: i64,
    pub term: HoldingTerm,
}

/// Price used to mark a symbol's remaining lots, in the symbol currency
/// (the currency of its first acquisition).
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SymbolPricing {
    pub current_price: Decimal,
    pub source: PriceSource,
}

impl SymbolPricing {
    pub fn quoted(current_price: Decimal) -> Self {
        SymbolPricing {
            current_price,
            source: PriceSource::Quote,
        }
    }

    pub fn average_cost(current_price: Decimal) -> Self {
        SymbolPricing {
            current_price,
            source: PriceSource::AverageCost,
        }
    }
}

/// Per-symbol gains. Money fields are in the reporting currency except
/// `current_price`, which is in `currency`, and the lot unit costs, which
/// stay in each lot's own currency.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SymbolGains {
    pub symbol: String,
    pub currency: String,
    pub realized: Decimal,
    pub unrealized: Decimal,
    pub total: Decimal,
    pub proceeds: Decimal,
    pub cost_basis_sold: Decimal,
    pub sell_count: usize,
    pub buy_count: usize,
    pub remaining_shares: Decimal,
    pub remaining_cost: Decimal,
    pub current_value: Decimal,
    pub current_price: Decimal,
    pub price_source: PriceSource,
    pub short_term_realized: Decimal,
    pub long_term_realized: Decimal,
    pub short_term_unrealized: Decimal,
    pub long_term_unrealized: Decimal,
    pub unmatched_shares: Decimal,
    pub remaining_lots: Vec<TaxLot>,
}

/// Portfolio-level sums of the per-symbol figures.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GainsTotals {
    pub realized: Decimal,
    pub unrealized: Decimal,
    pub total: Decimal,
    pub proceeds: Decimal,
    pub cost_basis_sold: Decimal,
    pub current_value: Decimal,
    pub remaining_cost: Decimal,
    pub short_term_realized: Decimal,
    pub long_term_realized: Decimal,
    pub short_term_unrealized: Decimal,
    pub long_term_unrealized: Decimal,
}

impl GainsTotals {
    pub fn add(&mut self, symbol: &SymbolGains) {
        self.realized += symbol.realized;
        self.unrealized += symbol.unrealized;
        self.total += symbol.total;
        self.proceeds += symbol.proceeds;
        self.cost_basis_sold += symbol.cost_basis_sold;
        self.current_value += symbol.current_value;
        self.remaining_cost += symbol.remaining_cost;
        self.short_term_realized += symbol.short_term_realized;
        self.long_term_realized += symbol.long_term_realized;
        self.short_term_unrealized += symbol.short_term_unrealized;
        self.long_term_unrealized += symbol.long_term_unrealized;
    }

    pub fn rounded(self) -> Self {
        GainsTotals {
            realized: round_money(self.realized),
            unrealized: round_money(self.unrealized),
            total: round_money(self.total),
            proceeds: round_money(self.proceeds),
            cost_basis_sold: round_money(self.cost_basis_sold),
            current_value: round_money(self.current_value),
            remaining_cost: round_money(self.remaining_cost),
            short_term_realized: round_money(self.short_term_realized),
            long_term_realized: round_money(self.long_term_realized),
            short_term_unrealized: round_money(self.short_term_unrealized),
            long_term_unrealized: round_money(self.long_term_unrealized),
        }
    }
}

/// Output of a FIFO replay over the full trade history.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GainsReport {
    pub reporting_currency: String,
    pub as_of: DateTime<Utc>,
    /// Ordered by symbol.
    pub symbols: Vec<SymbolGains>,
    pub totals: GainsTotals,
    pub sales: Vec<SaleRecord>,
    pub matches: Vec<SellMatch>,
    pub unmatched: Vec<UnmatchedSell>,
}

impl GainsReport {
    pub fn symbol(&self, symbol: &str) -> Option<&SymbolGains> {
        self.symbols.iter().find(|s| s.symbol == symbol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use rust_decimal_macros::dec;

    #[test]
    fn test_holding_days_rounds_up_partial_days() {
        let start = Utc.with_ymd_and_hms(2023, 1, 1, 12, 0, 0).unwrap();
        assert_eq!(holding_days(start, start), 0);
        assert_eq!(holding_days(start, start + Duration::hours(1)), 1);
        assert_eq!(holding_days(start, start + Duration::days(365)), 365);
        assert_eq!(
            holding_days(start, start + Duration::days(365) + Duration::seconds(1)),
            366
        );
        assert_eq!(holding_days(start + Duration::days(2), start), 0);
    }

    #[test]
    fn test_term_boundary() {
        assert_eq!(HoldingTerm::from_days(0), HoldingTerm::ShortTerm);
        assert_eq!(HoldingTerm::from_days(365), HoldingTerm::ShortTerm);
        assert_eq!(HoldingTerm::from_days(366), HoldingTerm::LongTerm);
        assert_eq!(HoldingTerm::LongTerm.to_string(), "Long-term");
    }

    #[test]
    fn test_lot_consume_partial_then_drain() {
        let date = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
        let mut lot = TaxLot::new(date, dec!(10), dec!(120), "USD");

        assert_eq!(lot.consume(dec!(4)), dec!(4));
        assert_eq!(lot.remaining_share_count, dec!(6));
        assert_eq!(lot.remaining_cost(), dec!(720));
        assert!(!lot.is_drained());

        assert_eq!(lot.consume(dec!(10)), dec!(6));
        assert!(lot.is_drained());
        assert_eq!(lot.original_share_count, dec!(10));
    }

    #[test]
    fn test_lot_at_share_epsilon_is_drained() {
        let date = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
        let mut lot = TaxLot::new(date, dec!(1), dec!(50), "EUR");

        lot.consume(dec!(0.99999));
        assert_eq!(lot.remaining_share_count, SHARE_EPSILON);
        assert!(lot.is_drained());

        let fresh = TaxLot::new(date, dec!(0.00002), dec!(50), "EUR");
        assert!(!fresh.is_drained());
    }

    #[test]
    fn test_round_money_zeroes_dust() {
        assert_eq!(round_money(dec!(0.0009)), dec!(0));
        assert_eq!(round_money(dec!(-0.0009)), dec!(0));
        assert_eq!(round_money(dec!(0.001)), dec!(0.001));
    }
}
