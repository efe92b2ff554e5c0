use chrono::{DateTime, Utc};
use log::warn;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::activities::multiply_tolerant;
use crate::constants::SHARE_EPSILON;

/// True when a share quantity is above dust level.
pub fn is_quantity_significant(quantity: &Decimal) -> bool {
    quantity.abs() > SHARE_EPSILON
}

/// Weighted-average-cost holding of one instrument.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub symbol: String,
    pub share_count: Decimal,
    /// Total cost of the shares held, in the position's currency.
    pub total_cost: Decimal,
    /// Cost per share. Recomputed on acquisitions only.
    pub average_cost: Decimal,
    /// Set by the first acquisition.
    pub currency: String,
    pub first_acquisition_date: DateTime<Utc>,
}

impl Position {
    pub fn new(symbol: &str, currency: &str, date: DateTime<Utc>) -> Self {
        Position {
            symbol: symbol.to_string(),
            share_count: Decimal::ZERO,
            total_cost: Decimal::ZERO,
            average_cost: Decimal::ZERO,
            currency: currency.to_string(),
            first_acquisition_date: date,
        }
    }

    pub fn is_open(&self) -> bool {
        is_quantity_significant(&self.share_count)
    }

    /// Adds shares and re-weights the average cost.
    ///
    /// An acquisition cost that overflows is booked as zero.
    pub fn apply_buy(&mut self, share_count: Decimal, unit_price: Decimal) {
        self.share_count = self.share_count.saturating_add(share_count);
        self.total_cost = self
            .total_cost
            .saturating_add(multiply_tolerant(share_count, unit_price, &self.symbol));
        if self.share_count > Decimal::ZERO {
            self.average_cost = self
                .total_cost
                .checked_div(self.share_count)
                .unwrap_or(Decimal::ZERO);
        }
    }

    /// Removes shares at the current average cost and returns the cost removed.
    ///
    /// The average cost itself is left untouched. Selling more than is held
    /// empties the position instead of going negative.
    pub fn apply_sell(&mut self, share_count: Decimal) -> Decimal {
        if share_count > self.share_count && is_quantity_significant(&(share_count - self.share_count)) {
            warn!(
                "Sell of {} {} exceeds the {} shares held. Clamping position to zero.",
                share_count, self.symbol, self.share_count
            );
        }
        let cost_removed =
            multiply_tolerant(share_count.min(self.share_count), self.average_cost, &self.symbol);
        self.share_count = (self.share_count - share_count).max(Decimal::ZERO);
        self.total_cost = (self.total_cost - cost_removed).max(Decimal::ZERO);
        cost_removed
    }

    /// Market value at `price`, in the position's currency.
    pub fn market_value(&self, price: Decimal) -> Decimal {
        multiply_tolerant(self.share_count, price, &self.symbol)
    }
}
