use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Default request timeout for remote ledger stores.
pub const DEFAULT_LEDGER_TIMEOUT_SECS: u64 = 30;

/// Connection settings for a remote ledger store.
///
/// Passed explicitly to the client constructor; there is no process-wide client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerConfig {
    /// Base URL of the ledger API
    pub endpoint: String,
    /// Bearer credential, if the store requires one
    pub api_key: Option<String>,
    /// Table (or collection) holding the transaction rows
    pub table: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    DEFAULT_LEDGER_TIMEOUT_SECS
}

impl LedgerConfig {
    pub fn new(endpoint: &str, table: &str) -> Self {
        LedgerConfig {
            endpoint: endpoint.to_string(),
            api_key: None,
            table: table.to_string(),
            timeout_secs: DEFAULT_LEDGER_TIMEOUT_SECS,
        }
    }

    pub fn with_api_key(mut self, api_key: &str) -> Self {
        self.api_key = Some(api_key.to_string());
        self
    }

    /// Checks that the store is configured well enough to be contacted.
    pub fn validate(&self) -> Result<()> {
        let endpoint = self.endpoint.trim();
        if endpoint.is_empty() {
            return Err(Error::Configuration(
                "Ledger endpoint is not configured".to_string(),
            ));
        }
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(Error::Configuration(format!(
                "Ledger endpoint '{}' must be an http(s) URL",
                endpoint
            )));
        }
        if self.table.trim().is_empty() {
            return Err(Error::Configuration(
                "Ledger table identifier is not configured".to_string(),
            ));
        }
        if self.timeout_secs == 0 {
            return Err(Error::Configuration(
                "Ledger timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
