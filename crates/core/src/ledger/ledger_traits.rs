use async_trait::async_trait;

use crate::activities::RawTransactionRecord;
use crate::Result;

/// Trait for the ledger store collaborator.
///
/// Read-only. Records come back in no particular order; the pipeline sorts
/// them by date itself. Implementations report transport or storage failures
/// as a single error and never retry.
#[async_trait]
pub trait LedgerStoreTrait: Send + Sync {
    async fn fetch_records(&self, account_id: &str) -> Result<Vec<RawTransactionRecord>>;
}
