//! Ledger store backed by a delimited-text export on disk.

use async_trait::async_trait;
use log::{debug, warn};
use std::path::{Path, PathBuf};

use gainbook_core::activities::{parse_ledger_csv, ParseConfig, RawTransactionRecord};
use gainbook_core::errors::{LedgerError, Result};
use gainbook_core::ledger::LedgerStoreTrait;

/// Reads the whole ledger from one CSV file on every fetch.
///
/// A file export holds a single account, so the account id is only logged.
#[derive(Debug, Clone)]
pub struct CsvFileLedger {
    path: PathBuf,
    config: ParseConfig,
}

impl CsvFileLedger {
    pub fn new(path: impl AsRef<Path>, config: ParseConfig) -> Self {
        CsvFileLedger {
            path: path.as_ref().to_path_buf(),
            config,
        }
    }
}

#[async_trait]
impl LedgerStoreTrait for CsvFileLedger {
    async fn fetch_records(&self, account_id: &str) -> Result<Vec<RawTransactionRecord>> {
        debug!(
            "Reading ledger for account {} from {}",
            account_id,
            self.path.display()
        );
        let content = tokio::fs::read(&self.path).await.map_err(|e| {
            LedgerError::Io(format!("Failed to read {}: {}", self.path.display(), e))
        })?;

        let parsed = parse_ledger_csv(&content, &self.config)?;
        for error in &parsed.errors {
            match error.row_index {
                Some(row) => warn!("{} row {}: {}", self.path.display(), row, error.message),
                None => warn!("{}: {}", self.path.display(), error.message),
            }
        }
        Ok(parsed.records)
    }
}
