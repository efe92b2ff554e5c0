//! HTTP client for a remote ledger store.
//!
//! The store exposes transaction rows as loosely typed JSON objects. Column
//! names go through the same alias table as delimited-text imports, so the
//! records handed to the pipeline are identical whatever the source.

use async_trait::async_trait;
use log::{debug, info, warn};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::time::Duration;

use gainbook_core::activities::{CanonicalField, IngestOptions, RawFieldValues, RawTransactionRecord};
use gainbook_core::errors::{Error, LedgerError, Result};
use gainbook_core::ledger::{LedgerConfig, LedgerStoreTrait};

// ─────────────────────────────────────────────────────────────────────────────
// API Response Types
// ─────────────────────────────────────────────────────────────────────────────

/// The records endpoint answers either with a bare array or with an envelope.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ApiRecordsResponse {
    Rows(Vec<Map<String, Value>>),
    Envelope {
        #[serde(default)]
        records: Vec<Map<String, Value>>,
    },
}

impl ApiRecordsResponse {
    fn into_rows(self) -> Vec<Map<String, Value>> {
        match self {
            ApiRecordsResponse::Rows(rows) => rows,
            ApiRecordsResponse::Envelope { records } => records,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Ledger API Client
// ─────────────────────────────────────────────────────────────────────────────

/// Read-only client for `GET {endpoint}/tables/{table}/records?account={id}`.
///
/// # Example
///
/// ```ignore
/// let config = LedgerConfig::new("https://ledger.example.com", "transactions");
/// let client = LedgerApiClient::new(&config)?;
/// let records = client.fetch_records("acc-1").await?;
/// ```
#[derive(Debug, Clone)]
pub struct LedgerApiClient {
    client: reqwest::Client,
    base_url: String,
    table: String,
    auth_header: Option<HeaderValue>,
    options: IngestOptions,
}

impl LedgerApiClient {
    /// Builds a client from an explicit configuration.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the endpoint or table is missing,
    /// or when the API key cannot be used as a header value.
    pub fn new(config: &LedgerConfig) -> Result<Self> {
        config.validate()?;

        let auth_header = match config.api_key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() => Some(
                HeaderValue::from_str(&format!("Bearer {}", key))
                    .map_err(|e| Error::Configuration(format!("Invalid ledger API key: {}", e)))?,
            ),
            _ => None,
        };

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Unexpected(format!("Failed to initialize HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.endpoint.trim().trim_end_matches('/').to_string(),
            table: config.table.trim().to_string(),
            auth_header,
            options: IngestOptions::default(),
        })
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if let Some(auth) = &self.auth_header {
            headers.insert(AUTHORIZATION, auth.clone());
        }
        headers
    }

    fn records_url(&self, account_id: &str) -> String {
        format!(
            "{}/tables/{}/records?account={}",
            self.base_url,
            urlencoding::encode(&self.table),
            urlencoding::encode(account_id)
        )
    }

    /// Parses an HTTP response body into raw JSON rows.
    async fn parse_response(&self, response: reqwest::Response) -> Result<Vec<Map<String, Value>>> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| LedgerError::Unreachable(format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            let message = serde_json::from_str::<ApiErrorResponse>(&body)
                .ok()
                .and_then(|err| err.message.or(err.error))
                .unwrap_or_else(|| body.chars().take(200).collect());
            return Err(LedgerError::Http {
                status: status.as_u16(),
                message,
            }
            .into());
        }

        parse_records_body(&body)
    }
}

/// Parses a records payload, either `[...]` or `{ "records": [...] }`.
pub(crate) fn parse_records_body(body: &str) -> Result<Vec<Map<String, Value>>> {
    serde_json::from_str::<ApiRecordsResponse>(body)
        .map(ApiRecordsResponse::into_rows)
        .map_err(|e| LedgerError::Malformed(format!("Unexpected ledger payload: {}", e)).into())
}

/// Renders a JSON scalar the way a delimited file would carry it.
fn value_as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Maps JSON rows onto records, skipping rows that cannot be dated.
pub(crate) fn rows_to_records(
    rows: Vec<Map<String, Value>>,
    options: &IngestOptions,
) -> Vec<RawTransactionRecord> {
    let total = rows.len();
    let mut records = Vec::with_capacity(total);

    for (index, row) in rows.into_iter().enumerate() {
        let id = row.get("id").and_then(value_as_text);
        let mut values = RawFieldValues::default();
        for (key, value) in &row {
            if let (Some(field), Some(text)) = (CanonicalField::from_alias(key), value_as_text(value)) {
                values.insert(field, &text);
            }
        }

        match RawTransactionRecord::from_values(id, &values, options) {
            Ok(record) => records.push(record),
            Err(e) => warn!("Skipping ledger row {}: {}", index, e),
        }
    }

    if records.len() < total {
        info!(
            "Ledger rows mapped: {} imported, {} rejected",
            records.len(),
            total - records.len()
        );
    }
    records
}

#[async_trait]
impl LedgerStoreTrait for LedgerApiClient {
    async fn fetch_records(&self, account_id: &str) -> Result<Vec<RawTransactionRecord>> {
        let url = self.records_url(account_id);
        debug!("[LedgerApi] GET {}", url);

        let response = self
            .client
            .get(&url)
            .headers(self.headers())
            .send()
            .await
            .map_err(|e| LedgerError::Unreachable(format!("Request to {} failed: {}", url, e)))?;

        let rows = self.parse_response(response).await?;
        debug!("[LedgerApi] Received {} rows", rows.len());
        Ok(rows_to_records(rows, &self.options))
    }
}
