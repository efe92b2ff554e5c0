use async_trait::async_trait;
use std::collections::HashMap;

use super::quotes_model::LatestQuote;
use super::quotes_traits::QuoteProviderTrait;
use crate::{Error, Result};

/// In-memory quote provider, e.g. loaded from a prices file.
#[derive(Debug, Clone, Default)]
pub struct StaticQuoteProvider {
    quotes: HashMap<String, LatestQuote>,
}

impl StaticQuoteProvider {
    pub fn new(quotes: HashMap<String, LatestQuote>) -> Self {
        StaticQuoteProvider { quotes }
    }

    pub fn with_quote(mut self, symbol: &str, quote: LatestQuote) -> Self {
        self.quotes.insert(symbol.to_string(), quote);
        self
    }

    /// Reads a JSON object of `symbol -> {price, currency, changePercent}`.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let quotes: HashMap<String, LatestQuote> = serde_json::from_str(json)?;
        Ok(StaticQuoteProvider { quotes })
    }

    pub fn len(&self) -> usize {
        self.quotes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }
}

#[async_trait]
impl QuoteProviderTrait for StaticQuoteProvider {
    async fn get_latest_quote(&self, symbol: &str) -> Result<LatestQuote> {
        self.quotes
            .get(symbol)
            .cloned()
            .ok_or_else(|| Error::Quote(format!("No quote available for {}", symbol)))
    }
}
