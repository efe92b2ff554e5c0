//! Gainbook Connect - ledger store collaborators.
//!
//! Implementations of [`LedgerStoreTrait`] for a remote HTTP ledger API and
//! for a delimited-text export on disk.
//!
//! [`LedgerStoreTrait`]: gainbook_core::ledger::LedgerStoreTrait

pub mod client;
pub mod csv_ledger;

// Re-export commonly used types
pub use client::LedgerApiClient;
pub use csv_ledger::CsvFileLedger;
