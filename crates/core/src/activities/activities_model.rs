use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

use crate::constants::{DEFAULT_REPORTING_CURRENCY, EXCHANGE_SEPARATOR};
use crate::errors::ValidationError;

/// Parses a decimal value, logging and falling back to ZERO on failure.
pub fn parse_decimal_string_tolerant(value_str: &str, field_name: &str) -> Decimal {
    let trimmed = value_str.trim().trim_start_matches('+');
    if trimmed.is_empty() {
        return Decimal::ZERO;
    }
    // Attempt to parse directly as Decimal
    match Decimal::from_str(trimmed) {
        Ok(d) => d,
        Err(e_decimal) => {
            // If direct parsing fails, try scientific notation parsing
            match Decimal::from_scientific(trimmed) {
                Ok(d) => d,
                Err(e_scientific) => {
                    log::warn!(
                        "Failed to parse {} '{}': as Decimal (err: {}), and as scientific (err: {}). Falling back to ZERO.",
                        field_name, value_str, e_decimal, e_scientific
                    );
                    Decimal::ZERO
                }
            }
        }
    }
}

/// Multiplies two amounts, logging and falling back to ZERO on overflow.
pub fn multiply_tolerant(left: Decimal, right: Decimal, context: &str) -> Decimal {
    match left.checked_mul(right) {
        Some(product) => product,
        None => {
            log::warn!(
                "{}: {} * {} overflows. Falling back to ZERO.",
                context,
                left,
                right
            );
            Decimal::ZERO
        }
    }
}

/// Decimal separator convention of an import source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecimalSeparator {
    /// Guess per value: the right-most of `.`/`,` is the decimal mark.
    #[default]
    Auto,
    Dot,
    Comma,
}

impl DecimalSeparator {
    /// Reads a configuration value: "auto", "." or ",". Anything else is `Auto`.
    pub fn from_config(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(".") | Some("dot") => DecimalSeparator::Dot,
            Some(",") | Some("comma") => DecimalSeparator::Comma,
            _ => DecimalSeparator::Auto,
        }
    }
}

/// Parses a localized number such as `1.234,56`, `1,234.56` or `12,5`.
///
/// Never fails: malformed input becomes ZERO.
pub fn parse_localized_decimal(raw: &str, separator: DecimalSeparator, field_name: &str) -> Decimal {
    let cleaned: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '\'')
        .collect();
    if cleaned.is_empty() {
        return Decimal::ZERO;
    }

    let normalized = match separator {
        DecimalSeparator::Dot => cleaned.replace(',', ""),
        DecimalSeparator::Comma => cleaned.replace('.', "").replace(',', "."),
        DecimalSeparator::Auto => match (cleaned.rfind('.'), cleaned.rfind(',')) {
            (Some(dot), Some(comma)) if comma > dot => cleaned.replace('.', "").replace(',', "."),
            (Some(_), Some(_)) => cleaned.replace(',', ""),
            // A lone comma is a decimal mark; several commas group thousands.
            (None, Some(_)) if cleaned.matches(',').count() == 1 => cleaned.replace(',', "."),
            (None, Some(_)) => cleaned.replace(',', ""),
            _ => cleaned,
        },
    };

    parse_decimal_string_tolerant(&normalized, field_name)
}

const DATE_TIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];
const DATE_FORMATS: [&str; 3] = ["%Y/%m/%d", "%d.%m.%Y", "%d/%m/%Y"];

/// Parses a transaction date in any of the accepted ledger formats.
///
/// Date-only values are placed at midnight UTC.
pub fn parse_transaction_date(value: &str) -> Result<DateTime<Utc>, ValidationError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ValidationError::MissingField("transaction_date".to_string()));
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }
    for format in DATE_TIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(naive.and_utc());
        }
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(value, format) {
            return Ok(date_at_midnight(date));
        }
    }

    // ISO dates go last so the chrono error describes the canonical format.
    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d")?;
    Ok(date_at_midnight(date))
}

fn date_at_midnight(date: NaiveDate) -> DateTime<Utc> {
    date.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc()
}

/// Splits `VOD:LSE` into (`VOD`, Some(`LSE`)).
pub fn split_symbol(full_symbol: &str) -> (String, Option<String>) {
    match full_symbol.split_once(EXCHANGE_SEPARATOR) {
        Some((symbol, exchange)) => {
            let exchange = exchange.trim();
            (
                symbol.trim().to_string(),
                (!exchange.is_empty()).then(|| exchange.to_string()),
            )
        }
        None => (full_symbol.trim().to_string(), None),
    }
}

/// Canonical field of a raw transaction record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CanonicalField {
    Symbol,
    Quantity,
    PricePerUnit,
    AssetType,
    TransactionType,
    TransactionDate,
    Currency,
}

/// Accepted source names per canonical field. Keys are compared after
/// lower-casing and turning spaces/dashes into underscores.
const FIELD_ALIASES: [(&str, CanonicalField); 13] = [
    ("symbol", CanonicalField::Symbol),
    ("quantity", CanonicalField::Quantity),
    ("price_per_unit", CanonicalField::PricePerUnit),
    ("price", CanonicalField::PricePerUnit),
    ("asset_type", CanonicalField::AssetType),
    ("type", CanonicalField::AssetType),
    ("transaction_type", CanonicalField::TransactionType),
    ("side", CanonicalField::TransactionType),
    ("action", CanonicalField::TransactionType),
    ("transaction_date", CanonicalField::TransactionDate),
    ("date", CanonicalField::TransactionDate),
    ("currency", CanonicalField::Currency),
    ("ccy", CanonicalField::Currency),
];

impl CanonicalField {
    /// Resolves a column header or JSON key to its canonical field.
    pub fn from_alias(name: &str) -> Option<Self> {
        let key = name
            .trim()
            .trim_start_matches('\u{feff}')
            .to_lowercase()
            .replace([' ', '-'], "_");
        FIELD_ALIASES
            .iter()
            .find(|(alias, _)| *alias == key)
            .map(|(_, field)| *field)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CanonicalField::Symbol => "symbol",
            CanonicalField::Quantity => "quantity",
            CanonicalField::PricePerUnit => "price_per_unit",
            CanonicalField::AssetType => "asset_type",
            CanonicalField::TransactionType => "transaction_type",
            CanonicalField::TransactionDate => "transaction_date",
            CanonicalField::Currency => "currency",
        }
    }
}

/// Column positions of the canonical fields, resolved once per header row.
#[derive(Debug, Clone, Default)]
pub struct FieldMapping {
    columns: HashMap<CanonicalField, usize>,
}

impl FieldMapping {
    /// Maps headers to canonical fields. The first column claiming a field wins.
    pub fn resolve<S: AsRef<str>>(headers: &[S]) -> Self {
        let mut columns = HashMap::new();
        for (index, header) in headers.iter().enumerate() {
            match CanonicalField::from_alias(header.as_ref()) {
                Some(field) => {
                    columns.entry(field).or_insert(index);
                }
                None => log::debug!("Ignoring unmapped column '{}'", header.as_ref()),
            }
        }
        FieldMapping { columns }
    }

    pub fn column(&self, field: CanonicalField) -> Option<usize> {
        self.columns.get(&field).copied()
    }

    /// Extracts the mapped values of one data row.
    pub fn values_for_row<S: AsRef<str>>(&self, row: &[S]) -> RawFieldValues {
        let mut values = RawFieldValues::default();
        for (field, index) in &self.columns {
            if let Some(cell) = row.get(*index) {
                values.insert(*field, cell.as_ref());
            }
        }
        values
    }
}

/// String values of one source row keyed by canonical field.
#[derive(Debug, Clone, Default)]
pub struct RawFieldValues {
    values: HashMap<CanonicalField, String>,
}

impl RawFieldValues {
    /// Stores a value unless a non-empty value is already present for the field.
    pub fn insert(&mut self, field: CanonicalField, value: &str) {
        let value = value.trim();
        match self.values.get(&field) {
            Some(existing) if !existing.is_empty() => {}
            _ => {
                self.values.insert(field, value.to_string());
            }
        }
    }

    pub fn get(&self, field: CanonicalField) -> Option<&str> {
        self.values
            .get(&field)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }
}

/// Options applied while turning source rows into records.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestOptions {
    pub decimal_separator: DecimalSeparator,
    /// Currency assigned to rows that do not carry one.
    pub default_currency: String,
}

impl Default for IngestOptions {
    fn default() -> Self {
        IngestOptions {
            decimal_separator: DecimalSeparator::Auto,
            default_currency: DEFAULT_REPORTING_CURRENCY.to_string(),
        }
    }
}

/// One ledger row after alias resolution. Immutable input to the classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTransactionRecord {
    /// Source row identifier, used in log messages only.
    #[serde(default)]
    pub id: Option<String>,
    pub symbol: String,
    pub asset_type: String,
    pub transaction_type: String,
    pub quantity: Decimal,
    pub price_per_unit: Decimal,
    pub currency: String,
    pub date: DateTime<Utc>,
}

impl RawTransactionRecord {
    pub fn new(
        symbol: &str,
        asset_type: &str,
        transaction_type: &str,
        quantity: Decimal,
        price_per_unit: Decimal,
        currency: &str,
        date: DateTime<Utc>,
    ) -> Self {
        RawTransactionRecord {
            id: None,
            symbol: symbol.to_string(),
            asset_type: asset_type.to_string(),
            transaction_type: transaction_type.to_string(),
            quantity,
            price_per_unit,
            currency: currency.to_string(),
            date,
        }
    }

    /// Builds a record from resolved field values.
    ///
    /// Numeric fields are parsed tolerantly; only a missing or unparseable
    /// date rejects the row.
    pub fn from_values(
        id: Option<String>,
        values: &RawFieldValues,
        options: &IngestOptions,
    ) -> Result<Self, ValidationError> {
        let date = match values.get(CanonicalField::TransactionDate) {
            Some(raw) => parse_transaction_date(raw)?,
            None => {
                return Err(ValidationError::MissingField(
                    CanonicalField::TransactionDate.as_str().to_string(),
                ))
            }
        };

        let number = |field: CanonicalField| {
            values
                .get(field)
                .map(|raw| parse_localized_decimal(raw, options.decimal_separator, field.as_str()))
                .unwrap_or(Decimal::ZERO)
        };
        let text = |field: CanonicalField| values.get(field).unwrap_or_default().to_string();

        let currency = values
            .get(CanonicalField::Currency)
            .map(|c| c.to_uppercase())
            .unwrap_or_else(|| options.default_currency.to_uppercase());

        Ok(RawTransactionRecord {
            id,
            symbol: text(CanonicalField::Symbol),
            asset_type: text(CanonicalField::AssetType),
            transaction_type: text(CanonicalField::TransactionType),
            quantity: number(CanonicalField::Quantity),
            price_per_unit: number(CanonicalField::PricePerUnit),
            currency,
            date,
        })
    }

    /// Short label for log messages.
    pub fn label(&self) -> String {
        match &self.id {
            Some(id) => format!("{} ({})", id, self.symbol),
            None => format!("{} @ {}", self.symbol, self.date.format("%Y-%m-%d")),
        }
    }
}

/// Counts of rows accepted and rejected during ingestion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub imported: usize,
    pub rejected: usize,
}
