use crate::activities::multiply_tolerant;
use crate::fx::fx_model::RateTable;
use log::warn;
use rust_decimal::Decimal;

/// Converts transaction-currency amounts into the reporting currency.
///
/// Backed by a static [`RateTable`]; callers wanting fresher rates build a new
/// normalizer from an updated table.
#[derive(Debug, Clone, Default)]
pub struct CurrencyNormalizer {
    table: RateTable,
}

impl CurrencyNormalizer {
    pub fn new(table: RateTable) -> Self {
        CurrencyNormalizer { table }
    }

    pub fn reporting_currency(&self) -> &str {
        &self.table.reporting_currency
    }

    pub fn table(&self) -> &RateTable {
        &self.table
    }

    fn is_reporting(&self, code: &str) -> bool {
        code.trim().eq_ignore_ascii_case(&self.table.reporting_currency)
    }

    /// True when `code` is the reporting currency or has an entry in the table.
    pub fn is_recognized(&self, code: &str) -> bool {
        self.is_reporting(code) || self.table.rate(code).is_some()
    }

    /// Reporting-currency units per unit of `code`, falling back to the default factor.
    pub fn rate_for(&self, code: &str) -> Decimal {
        if self.is_reporting(code) {
            return Decimal::ONE;
        }
        match self.table.rate(code) {
            Some(rate) => rate,
            None => {
                warn!(
                    "No rate for '{}' into {}, using fallback factor {}",
                    code, self.table.reporting_currency, self.table.fallback_rate
                );
                self.table.fallback_rate
            }
        }
    }

    /// Converts `amount` in `code` into the reporting currency.
    pub fn to_reporting(&self, amount: Decimal, code: &str) -> Decimal {
        if self.is_reporting(code) {
            return amount;
        }
        multiply_tolerant(amount, self.rate_for(code), "currency conversion")
    }

    /// Converts an amount between two currencies through the reporting currency.
    pub fn convert(&self, amount: Decimal, from_currency: &str, to_currency: &str) -> Decimal {
        if from_currency.trim().eq_ignore_ascii_case(to_currency.trim()) {
            return amount;
        }
        let target_rate = self.rate_for(to_currency);
        if target_rate.is_zero() {
            return Decimal::ZERO;
        }
        self.to_reporting(amount, from_currency)
            .checked_div(target_rate)
            .unwrap_or_else(|| {
                warn!(
                    "Converting {} {} into {} overflows. Falling back to ZERO.",
                    amount, from_currency, to_currency
                );
                Decimal::ZERO
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_reporting_currency_is_unchanged() {
        let normalizer = CurrencyNormalizer::default();
        assert_eq!(normalizer.reporting_currency(), "EUR");
        assert_eq!(normalizer.to_reporting(dec!(42.5), "EUR"), dec!(42.5));
        assert_eq!(normalizer.to_reporting(dec!(42.5), "eur"), dec!(42.5));
    }

    #[test]
    fn test_known_code_uses_table_rate() {
        let normalizer = CurrencyNormalizer::new(RateTable::new("EUR").with_rate("GBP", dec!(1.17)));
        assert!(normalizer.is_recognized("GBP"));
        assert_eq!(normalizer.to_reporting(dec!(100), "GBP"), dec!(117));
    }

    #[test]
    fn test_unknown_code_uses_fallback_factor() {
        let normalizer = CurrencyNormalizer::default();
        assert!(!normalizer.is_recognized("XYZ"));
        assert_eq!(normalizer.rate_for("XYZ"), dec!(1));
        assert_eq!(normalizer.to_reporting(dec!(100), "XYZ"), dec!(100));

        let strict = CurrencyNormalizer::new(RateTable::new("EUR").with_fallback_rate(dec!(0)));
        assert_eq!(strict.to_reporting(dec!(100), "XYZ"), dec!(0));
    }

    #[test]
    fn test_convert_through_reporting_currency() {
        let normalizer = CurrencyNormalizer::new(
            RateTable::new("EUR")
                .with_rate("USD", dec!(0.5))
                .with_rate("GBP", dec!(1.25)),
        );
        // 10 GBP = 12.5 EUR = 25 USD
        assert_eq!(normalizer.convert(dec!(10), "GBP", "USD"), dec!(25));
        assert_eq!(normalizer.convert(dec!(10), "USD", "usd"), dec!(10));
        assert_eq!(normalizer.convert(dec!(25), "USD", "EUR"), dec!(12.5));
    }

    #[test]
    fn test_rate_table_overrides() {
        let mut table = RateTable::new("eur");
        let applied = table.apply_overrides("gbp=1.17; USD = 0.92, bogus, CHF=-1, =3");

        assert_eq!(applied, 2);
        assert_eq!(table.reporting_currency, "EUR");
        assert_eq!(table.rate("GBP"), Some(dec!(1.17)));
        assert_eq!(table.rate("usd"), Some(dec!(0.92)));
        assert_eq!(table.rate("CHF"), None);
    }
}
