use rust_decimal::Decimal;
use std::path::PathBuf;
use std::str::FromStr;

use gainbook_core::activities::ParseConfig;
use gainbook_core::constants::DEFAULT_REPORTING_CURRENCY;
use gainbook_core::fx::RateTable;
use gainbook_core::ledger::{LedgerConfig, DEFAULT_LEDGER_TIMEOUT_SECS};
use gainbook_core::{Error, Result};

const DEFAULT_ACCOUNT_ID: &str = "default";

/// Where the raw ledger comes from.
#[derive(Debug, Clone)]
pub enum LedgerSource {
    Api(LedgerConfig),
    File { path: PathBuf, parse: ParseConfig },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub ledger: LedgerSource,
    pub account_id: String,
    pub reporting_currency: String,
    pub fx_rates: Option<String>,
    pub fallback_rate: Option<Decimal>,
    pub prices_file: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads settings through `lookup`. Blank values count as unset.
    ///
    /// An HTTP endpoint takes precedence over a ledger file.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let ledger = if let Some(endpoint) = var("GB_LEDGER_ENDPOINT") {
            let timeout_secs = match var("GB_LEDGER_TIMEOUT_SECS") {
                Some(raw) => raw.parse::<u64>().map_err(|_| {
                    Error::Configuration(format!("GB_LEDGER_TIMEOUT_SECS '{}' is not a number", raw))
                })?,
                None => DEFAULT_LEDGER_TIMEOUT_SECS,
            };
            let config = LedgerConfig {
                endpoint,
                api_key: var("GB_LEDGER_API_KEY"),
                table: var("GB_LEDGER_TABLE").unwrap_or_default(),
                timeout_secs,
            };
            config.validate()?;
            LedgerSource::Api(config)
        } else if let Some(path) = var("GB_LEDGER_FILE") {
            LedgerSource::File {
                path: PathBuf::from(path),
                parse: ParseConfig {
                    delimiter: var("GB_CSV_DELIMITER"),
                    decimal_separator: var("GB_DECIMAL_SEPARATOR"),
                    ..ParseConfig::default()
                },
            }
        } else {
            return Err(Error::Configuration(
                "No ledger configured: set GB_LEDGER_ENDPOINT or GB_LEDGER_FILE".to_string(),
            ));
        };

        let fallback_rate = match var("GB_FALLBACK_RATE") {
            Some(raw) => Some(Decimal::from_str(&raw).map_err(|_| {
                Error::Configuration(format!("GB_FALLBACK_RATE '{}' is not a decimal", raw))
            })?),
            None => None,
        };

        Ok(Config {
            ledger,
            account_id: var("GB_ACCOUNT_ID").unwrap_or_else(|| DEFAULT_ACCOUNT_ID.to_string()),
            reporting_currency: var("GB_REPORTING_CURRENCY")
                .map(|c| c.to_uppercase())
                .unwrap_or_else(|| DEFAULT_REPORTING_CURRENCY.to_string()),
            fx_rates: var("GB_FX_RATES"),
            fallback_rate,
            prices_file: var("GB_PRICES_FILE").map(PathBuf::from),
        })
    }

    /// Rate table for the configured reporting currency, overrides applied.
    ///
    /// The built-in rates are keyed to EUR, so another reporting currency
    /// starts from an empty table.
    pub fn rate_table(&self) -> RateTable {
        let mut table = if self.reporting_currency == DEFAULT_REPORTING_CURRENCY {
            RateTable::default()
        } else {
            RateTable::new(&self.reporting_currency)
        };
        if let Some(overrides) = &self.fx_rates {
            table.apply_overrides(overrides);
        }
        if let Some(rate) = self.fallback_rate {
            table.fallback_rate = rate;
        }
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_missing_ledger_is_configuration_error() {
        let result = config_from(&[("GB_ACCOUNT_ID", "acc-1")]);
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[test]
    fn test_api_ledger_requires_table() {
        let result = config_from(&[("GB_LEDGER_ENDPOINT", "https://ledger.example.com")]);
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[test]
    fn test_api_ledger_settings() {
        let config = config_from(&[
            ("GB_LEDGER_ENDPOINT", "https://ledger.example.com"),
            ("GB_LEDGER_TABLE", "transactions"),
            ("GB_LEDGER_API_KEY", "secret"),
            ("GB_LEDGER_TIMEOUT_SECS", "5"),
            ("GB_LEDGER_FILE", "ignored.csv"),
        ])
        .unwrap();

        match config.ledger {
            LedgerSource::Api(ledger) => {
                assert_eq!(ledger.table, "transactions");
                assert_eq!(ledger.api_key.as_deref(), Some("secret"));
                assert_eq!(ledger.timeout_secs, 5);
            }
            other => panic!("expected API ledger, got {:?}", other),
        }
        assert_eq!(config.account_id, "default");
        assert_eq!(config.reporting_currency, "EUR");
    }

    #[test]
    fn test_file_ledger_settings() {
        let config = config_from(&[
            ("GB_LEDGER_FILE", "ledger.csv"),
            ("GB_CSV_DELIMITER", ";"),
            ("GB_DECIMAL_SEPARATOR", ","),
            ("GB_REPORTING_CURRENCY", "usd"),
        ])
        .unwrap();

        match &config.ledger {
            LedgerSource::File { path, parse } => {
                assert_eq!(path, &PathBuf::from("ledger.csv"));
                assert_eq!(parse.delimiter.as_deref(), Some(";"));
                assert_eq!(parse.decimal_separator.as_deref(), Some(","));
            }
            other => panic!("expected file ledger, got {:?}", other),
        }
        assert_eq!(config.reporting_currency, "USD");
    }

    #[test]
    fn test_rate_table_applies_overrides_and_fallback() {
        let config = config_from(&[
            ("GB_LEDGER_FILE", "ledger.csv"),
            ("GB_FX_RATES", "GBP=1.2"),
            ("GB_FALLBACK_RATE", "0"),
        ])
        .unwrap();

        let table = config.rate_table();
        assert_eq!(table.reporting_currency, "EUR");
        assert_eq!(table.rate("GBP"), Some(dec!(1.2)));
        assert_eq!(table.rate("USD"), Some(dec!(0.92)));
        assert_eq!(table.fallback_rate, dec!(0));
    }

    #[test]
    fn test_non_default_reporting_currency_starts_empty() {
        let config = config_from(&[
            ("GB_LEDGER_FILE", "ledger.csv"),
            ("GB_REPORTING_CURRENCY", "USD"),
        ])
        .unwrap();

        let table = config.rate_table();
        assert_eq!(table.reporting_currency, "USD");
        assert!(table.rates.is_empty());
    }

    #[test]
    fn test_invalid_fallback_rate_is_rejected() {
        let result = config_from(&[("GB_LEDGER_FILE", "ledger.csv"), ("GB_FALLBACK_RATE", "abc")]);
        assert!(matches!(result, Err(Error::Configuration(_))));
    }
}
