use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Latest price of an instrument as reported by a quote provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LatestQuote {
    pub price: Decimal,
    pub currency: String,
    #[serde(default)]
    pub change_percent: Decimal,
}

impl LatestQuote {
    pub fn new(price: Decimal, currency: &str) -> Self {
        LatestQuote {
            price,
            currency: currency.to_string(),
            change_percent: Decimal::ZERO,
        }
    }

    /// A quote is usable only with a strictly positive price.
    pub fn is_usable(&self) -> bool {
        self.price > Decimal::ZERO
    }
}

/// Where the price used for marking a holding came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PriceSource {
    Quote,
    /// No usable quote; the position's weighted-average cost stands in.
    AverageCost,
}
