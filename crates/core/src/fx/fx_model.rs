use log::warn;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

use crate::constants::DEFAULT_REPORTING_CURRENCY;

/// Static conversion table into one reporting currency.
///
/// `rates[code]` is the number of reporting-currency units per unit of `code`.
/// Codes are stored upper-cased.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RateTable {
    pub reporting_currency: String,
    pub rates: HashMap<String, Decimal>,
    /// Factor applied to codes missing from `rates`.
    pub fallback_rate: Decimal,
}

impl RateTable {
    /// An empty table for `reporting_currency` with parity fallback.
    pub fn new(reporting_currency: &str) -> Self {
        RateTable {
            reporting_currency: reporting_currency.trim().to_uppercase(),
            rates: HashMap::new(),
            fallback_rate: Decimal::ONE,
        }
    }

    pub fn with_rate(mut self, code: &str, rate: Decimal) -> Self {
        self.set_rate(code, rate);
        self
    }

    pub fn with_fallback_rate(mut self, rate: Decimal) -> Self {
        self.fallback_rate = rate;
        self
    }

    pub fn set_rate(&mut self, code: &str, rate: Decimal) {
        self.rates.insert(code.trim().to_uppercase(), rate);
    }

    pub fn rate(&self, code: &str) -> Option<Decimal> {
        self.rates.get(&code.trim().to_uppercase()).copied()
    }

    /// Parses `"GBP=1.17,USD=0.92"`. Malformed pairs are logged and skipped.
    pub fn parse_overrides(raw: &str) -> Vec<(String, Decimal)> {
        raw.split([',', ';'])
            .map(str::trim)
            .filter(|pair| !pair.is_empty())
            .filter_map(|pair| {
                let parsed = pair.split_once('=').and_then(|(code, rate)| {
                    let code = code.trim().to_uppercase();
                    let rate = Decimal::from_str(rate.trim()).ok()?;
                    (!code.is_empty() && rate > Decimal::ZERO).then_some((code, rate))
                });
                if parsed.is_none() {
                    warn!("Ignoring malformed exchange rate override '{}'", pair);
                }
                parsed
            })
            .collect()
    }

    /// Applies overrides from a configuration string, returning how many were set.
    pub fn apply_overrides(&mut self, raw: &str) -> usize {
        let overrides = Self::parse_overrides(raw);
        let count = overrides.len();
        for (code, rate) in overrides {
            self.rates.insert(code, rate);
        }
        count
    }
}

impl Default for RateTable {
    /// Fixed EUR table.
    fn default() -> Self {
        RateTable::new(DEFAULT_REPORTING_CURRENCY)
            .with_rate("USD", dec!(0.92))
            .with_rate("GBP", dec!(1.17))
            .with_rate("CHF", dec!(1.05))
            .with_rate("JPY", dec!(0.0062))
            .with_rate("CAD", dec!(0.68))
            .with_rate("AUD", dec!(0.61))
            .with_rate("SEK", dec!(0.088))
            .with_rate("NOK", dec!(0.087))
            .with_rate("DKK", dec!(0.134))
    }
}
