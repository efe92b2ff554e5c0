//! Core error types for Gainbook.
//!
//! Collaborator-specific failures (HTTP, file system, payload decoding) are
//! converted into these types at the collaborator boundary.

use chrono::ParseError as ChronoParseError;
use thiserror::Error;

/// Type alias for Result using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Root error type for the gains pipeline.
///
/// Only collaborator and configuration failures surface here. Malformed
/// numbers are coerced to zero and oversold positions are clamped, so neither
/// produces an `Error`.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Ledger operation failed: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Quote lookup failed: {0}")]
    Quote(String),

    #[error("Input validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

/// Failures reported by a ledger store collaborator.
#[derive(Error, Debug)]
pub enum LedgerError {
    /// The store could not be reached at all (DNS, connect, timeout).
    #[error("Ledger store is unreachable: {0}")]
    Unreachable(String),

    /// The store answered with a non-success status.
    #[error("Ledger store returned HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// The payload could not be decoded into transaction records.
    #[error("Malformed ledger payload: {0}")]
    Malformed(String),

    /// A local ledger file could not be read.
    #[error("Failed to read ledger file: {0}")]
    Io(String),
}

/// Validation errors for ingested rows.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Required field '{0}' is missing")]
    MissingField(String),

    #[error("Failed to parse date/time: {0}")]
    DateTimeParse(#[from] ChronoParseError),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Ledger(LedgerError::Io(err.to_string()))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Validation(ValidationError::InvalidInput(err.to_string()))
    }
}

impl From<csv::Error> for Error {
    fn from(err: csv::Error) -> Self {
        Error::Validation(ValidationError::InvalidInput(err.to_string()))
    }
}

impl From<Error> for String {
    fn from(err: Error) -> Self {
        err.to_string()
    }
}
