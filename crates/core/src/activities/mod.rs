//! Activities module - raw ledger records, ingestion and classification.

mod activities_constants;
mod activities_model;
mod classifier;
mod csv_parser;


pub use activities_constants::*;
pub use activities_model::{
    multiply_tolerant, parse_decimal_string_tolerant, parse_localized_decimal,
    parse_transaction_date, split_symbol, CanonicalField, DecimalSeparator, FieldMapping,
    ImportSummary, IngestOptions, RawFieldValues, RawTransactionRecord,
};
pub use classifier::{
    classify_record, ClassificationStats, ClassifiedLedger, ClassifiedRecord, Classifier,
    DividendRecord, FeeKind, FeeRecord, NormalizedTrade, TradeDirection,
};
pub use csv_parser::{parse_ledger_csv, ParseConfig, ParseError, ParsedLedger};
