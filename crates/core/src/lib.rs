//! Gainbook Core - transaction classification, cost basis and gains.
//!
//! The crate turns a ledger of raw transaction records into open positions,
//! fee/tax/dividend streams and a FIFO gains report. Everything here is a
//! pure batch transform; the only I/O seams are the [`LedgerStoreTrait`] and
//! [`QuoteProviderTrait`] collaborators.
//!
//! [`LedgerStoreTrait`]: ledger::LedgerStoreTrait
//! [`QuoteProviderTrait`]: quotes::QuoteProviderTrait

pub mod activities;
pub mod constants;
pub mod errors;
pub mod fx;
pub mod ledger;
pub mod portfolio;
pub mod quotes;

pub use portfolio::*;

// Re-export error types
pub use errors::Error;
pub use errors::Result;
