//! Ledger module - ledger store collaborator seam and its configuration.

mod ledger_model;
mod ledger_traits;

pub use ledger_model::{LedgerConfig, DEFAULT_LEDGER_TIMEOUT_SECS};
pub use ledger_traits::LedgerStoreTrait;
