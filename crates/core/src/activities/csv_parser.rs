//! Delimited-text ledger import.
//!
//! Parses comma- or semicolon-separated ledger exports into
//! [`RawTransactionRecord`]s. The delimiter is auto-detected unless forced,
//! headers are resolved once through the field alias table, and numbers may
//! use a comma as decimal mark.

use csv::{ReaderBuilder, Terminator};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use super::activities_model::{
    DecimalSeparator, FieldMapping, ImportSummary, IngestOptions, RawTransactionRecord,
};
use crate::constants::DEFAULT_REPORTING_CURRENCY;
use crate::errors::{Error, ValidationError};
use crate::Result;

/// Configuration for ledger CSV parsing.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ParseConfig {
    /// Delimiter character: ",", ";", or "auto" (default: "auto")
    pub delimiter: Option<String>,
    /// Quote character (default: "\"")
    pub quote_char: Option<String>,
    /// Number of rows to skip above the header (default: 0)
    pub skip_top_rows: Option<usize>,
    /// Number of rows to skip at the bottom, e.g. broker totals (default: 0)
    pub skip_bottom_rows: Option<usize>,
    /// Decimal separator: "auto", ".", or "," (default: "auto")
    pub decimal_separator: Option<String>,
    /// Currency used when a row has none
    pub default_currency: Option<String>,
}

impl ParseConfig {
    /// Returns the effective delimiter, defaulting to "auto"
    pub fn effective_delimiter(&self) -> &str {
        self.delimiter.as_deref().unwrap_or("auto")
    }

    /// Returns the number of rows to skip at the top
    pub fn top_skip(&self) -> usize {
        self.skip_top_rows.unwrap_or(0)
    }

    /// Returns the number of rows to skip at the bottom
    pub fn bottom_skip(&self) -> usize {
        self.skip_bottom_rows.unwrap_or(0)
    }

    /// Returns the quote character as a byte
    pub fn quote_byte(&self) -> u8 {
        self.quote_char
            .as_ref()
            .and_then(|s| s.chars().next())
            .map(|c| c as u8)
            .unwrap_or(b'"')
    }

    pub fn ingest_options(&self) -> IngestOptions {
        IngestOptions {
            decimal_separator: DecimalSeparator::from_config(self.decimal_separator.as_deref()),
            default_currency: self
                .default_currency
                .clone()
                .filter(|c| !c.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_REPORTING_CURRENCY.to_string()),
        }
    }
}

/// Result of parsing a ledger file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedLedger {
    pub records: Vec<RawTransactionRecord>,
    /// The delimiter actually used
    pub delimiter: String,
    pub summary: ImportSummary,
    /// Rows that were rejected or malformed
    pub errors: Vec<ParseError>,
}

/// Error encountered during CSV parsing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseError {
    /// Row index where the error occurred (if applicable)
    pub row_index: Option<usize>,
    /// Human-readable error message
    pub message: String,
    /// Error type: "parse", "encoding", "row"
    pub error_type: String,
}

impl ParseError {
    fn new_parse(row: Option<usize>, message: impl Into<String>) -> Self {
        Self {
            row_index: row,
            message: message.into(),
            error_type: "parse".to_string(),
        }
    }

    fn encoding_error(message: impl Into<String>) -> Self {
        Self {
            row_index: None,
            message: message.into(),
            error_type: "encoding".to_string(),
        }
    }

    fn row_error(row: usize, message: impl Into<String>) -> Self {
        Self {
            row_index: Some(row),
            message: message.into(),
            error_type: "row".to_string(),
        }
    }
}

/// Parses ledger CSV content into raw transaction records.
///
/// Rows without a usable date are rejected and reported in `errors`; every
/// other row is kept, with malformed numbers read as zero.
pub fn parse_ledger_csv(content: &[u8], config: &ParseConfig) -> Result<ParsedLedger> {
    let mut errors = Vec::new();

    // Handle UTF-8 BOM and convert to string
    let content_str = decode_content(content, &mut errors);

    let delimiter = detect_delimiter(&content_str, config);
    let delimiter_byte = delimiter.chars().next().unwrap_or(',') as u8;
    let (headers, rows) = read_rows(&content_str, delimiter_byte, config, &mut errors)?;

    let mapping = FieldMapping::resolve(headers.as_slice());
    let options = config.ingest_options();

    let mut records = Vec::with_capacity(rows.len());
    let mut summary = ImportSummary::default();
    for (row_index, row) in rows.iter().enumerate() {
        let values = mapping.values_for_row(row.as_slice());
        let row_id = format!("row-{}", row_index + 1);
        match RawTransactionRecord::from_values(Some(row_id), &values, &options) {
            Ok(record) => {
                summary.imported += 1;
                records.push(record);
            }
            Err(e) => {
                warn!("Rejecting ledger row {}: {}", row_index + 1, e);
                summary.rejected += 1;
                errors.push(ParseError::row_error(row_index, e.to_string()));
            }
        }
    }

    debug!(
        "Parsed ledger CSV with delimiter '{}': {} imported, {} rejected",
        delimiter, summary.imported, summary.rejected
    );

    Ok(ParsedLedger {
        records,
        delimiter: delimiter.to_string(),
        summary,
        errors,
    })
}

/// Decodes content bytes to UTF-8 string, handling BOM if present.
fn decode_content(content: &[u8], errors: &mut Vec<ParseError>) -> String {
    let content_without_bom = content.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(content);

    match std::str::from_utf8(content_without_bom) {
        Ok(s) => s.to_string(),
        Err(e) => {
            errors.push(ParseError::encoding_error(format!(
                "Invalid UTF-8 encoding at byte {}: {}. Some characters may be replaced.",
                e.valid_up_to(),
                e
            )));
            String::from_utf8_lossy(content_without_bom).into_owned()
        }
    }
}

/// Picks the configured delimiter, or the one producing the most consistent columns.
fn detect_delimiter<'a>(content: &str, config: &'a ParseConfig) -> &'a str {
    let delimiter_setting = config.effective_delimiter();

    if delimiter_setting != "auto" && !delimiter_setting.is_empty() {
        return delimiter_setting;
    }

    let mut best_delimiter = ",";
    let mut best_score = 0usize;
    for delim in [",", ";"] {
        let score = score_delimiter(content, delim, config.top_skip());
        if score > best_score {
            best_score = score;
            best_delimiter = delim;
        }
    }

    best_delimiter
}

/// Scores a delimiter by counting consistent column counts across lines.
fn score_delimiter(content: &str, delimiter: &str, skip_top: usize) -> usize {
    let delimiter_char = delimiter.chars().next().unwrap_or(',');
    let counts: Vec<usize> = content
        .lines()
        .skip(skip_top)
        .filter(|line| !line.trim().is_empty())
        .take(10)
        .map(|line| line.matches(delimiter_char).count())
        .collect();

    let Some(&first_count) = counts.first() else {
        return 0;
    };
    if first_count == 0 {
        return 0;
    }
    let consistent_count = counts.iter().filter(|&&c| c == first_count).count();
    first_count * consistent_count
}

/// Reads headers and non-empty data rows.
fn read_rows(
    content: &str,
    delimiter: u8,
    config: &ParseConfig,
    errors: &mut Vec<ParseError>,
) -> Result<(Vec<String>, Vec<Vec<String>>)> {
    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .quote(config.quote_byte())
        .has_headers(false)
        .flexible(true)
        .terminator(Terminator::Any(b'\n'))
        .from_reader(content.as_bytes());

    let mut all_records: Vec<Vec<String>> = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        match result {
            Ok(record) => {
                let row: Vec<String> = record
                    .iter()
                    .map(|s| s.trim_end_matches('\r').to_string())
                    .collect();
                all_records.push(row);
            }
            Err(e) => {
                errors.push(ParseError::new_parse(
                    Some(idx),
                    format!("Failed to parse row {}: {}", idx + 1, e),
                ));
            }
        }
    }

    let start_index = config.top_skip();
    let end_index = all_records.len().saturating_sub(config.bottom_skip());
    if start_index >= end_index {
        return Err(Error::Validation(ValidationError::InvalidInput(
            "Ledger file contains no rows after applying skip settings".to_string(),
        )));
    }

    let mut rows = all_records
        .drain(start_index..end_index)
        .filter(|row| !row.iter().all(|cell| cell.trim().is_empty()));

    let headers: Vec<String> = rows
        .next()
        .map(|row| row.iter().map(|h| h.trim().to_string()).collect())
        .ok_or_else(|| {
            Error::Validation(ValidationError::InvalidInput(
                "Ledger file has no header row".to_string(),
            ))
        })?;

    Ok((headers, rows.collect()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_comma_ledger() {
        let content = b"symbol,quantity,price,type,side,date,ccy\n\
AAPL,10,100.5,stock,buy,2024-01-02,usd\n\
AAPL,-4,120,stock,sell,2024-02-02,USD";

        let parsed = parse_ledger_csv(content, &ParseConfig::default()).unwrap();

        assert_eq!(parsed.delimiter, ",");
        assert_eq!(parsed.summary, ImportSummary { imported: 2, rejected: 0 });
        let first = &parsed.records[0];
        assert_eq!(first.symbol, "AAPL");
        assert_eq!(first.quantity, dec!(10));
        assert_eq!(first.price_per_unit, dec!(100.5));
        assert_eq!(first.asset_type, "stock");
        assert_eq!(first.transaction_type, "buy");
        assert_eq!(first.currency, "USD");
        assert_eq!(first.date, Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap());
        assert_eq!(parsed.records[1].quantity, dec!(-4));
    }

    #[test]
    fn test_parse_semicolon_ledger_with_comma_decimals() {
        let content = b"Symbol;Quantity;Price_Per_Unit;Asset_Type;Action;Transaction_Date;Currency\n\
SAP:XETRA;3;1.234,56;Equity;Buy;15.03.2024;EUR\n\
SAP:XETRA;1;130,5;Equity;Sell;20.03.2024;EUR\n";

        let parsed = parse_ledger_csv(content, &ParseConfig::default()).unwrap();

        assert_eq!(parsed.delimiter, ";");
        assert_eq!(parsed.records.len(), 2);
        assert_eq!(parsed.records[0].price_per_unit, dec!(1234.56));
        assert_eq!(parsed.records[1].price_per_unit, dec!(130.5));
        assert_eq!(parsed.records[0].symbol, "SAP:XETRA");
    }

    #[test]
    fn test_forced_delimiter_and_separator() {
        let content = b"symbol;quantity;price;date\nAAPL;1.000;2,5;2024-01-01";
        let config = ParseConfig {
            delimiter: Some(";".to_string()),
            decimal_separator: Some(",".to_string()),
            ..Default::default()
        };

        let parsed = parse_ledger_csv(content, &config).unwrap();

        assert_eq!(parsed.records[0].quantity, dec!(1000));
        assert_eq!(parsed.records[0].price_per_unit, dec!(2.5));
    }

    #[test]
    fn test_rows_without_date_are_rejected() {
        let content = b"symbol,quantity,price,date\nAAPL,1,2,2024-01-01\nMSFT,1,2,\nTSLA,1,2,someday";

        let parsed = parse_ledger_csv(content, &ParseConfig::default()).unwrap();

        assert_eq!(parsed.summary, ImportSummary { imported: 1, rejected: 2 });
        assert_eq!(parsed.errors.iter().filter(|e| e.error_type == "row").count(), 2);
    }

    #[test]
    fn test_default_currency_applies() {
        let content = b"symbol,quantity,price,date\nAAPL,1,2,2024-01-01";
        let config = ParseConfig {
            default_currency: Some("chf".to_string()),
            ..Default::default()
        };

        let parsed = parse_ledger_csv(content, &config).unwrap();
        assert_eq!(parsed.records[0].currency, "CHF");
    }

    #[test]
    fn test_skip_rows_and_blank_lines() {
        let content = b"Broker export\nsymbol,quantity,price,date\n\nAAPL,1,2,2024-01-01\nTotal,,,";
        let config = ParseConfig {
            skip_top_rows: Some(1),
            skip_bottom_rows: Some(1),
            ..Default::default()
        };

        let parsed = parse_ledger_csv(content, &config).unwrap();
        assert_eq!(parsed.records.len(), 1);
        assert_eq!(parsed.summary.rejected, 0);
    }

    #[test]
    fn test_utf8_bom() {
        let content = b"\xEF\xBB\xBFsymbol,quantity,price,date\nAAPL,1,2,2024-01-01";

        let parsed = parse_ledger_csv(content, &ParseConfig::default()).unwrap();
        assert_eq!(parsed.records[0].symbol, "AAPL");
    }

    #[test]
    fn test_quoted_fields() {
        let content = b"symbol,quantity,price,date\nAAPL,\"1,5\",\"1,234.50\",2024-01-01";

        let parsed = parse_ledger_csv(content, &ParseConfig::default()).unwrap();
        assert_eq!(parsed.records[0].quantity, dec!(1.5));
        assert_eq!(parsed.records[0].price_per_unit, dec!(1234.50));
    }

    #[test]
    fn test_empty_content_is_an_error() {
        assert!(parse_ledger_csv(b"", &ParseConfig::default()).is_err());
    }
}
