use async_trait::async_trait;

use super::quotes_model::LatestQuote;
use crate::Result;

/// Trait for the price collaborator.
///
/// Implementations own their transport, caching and timeouts. The gains
/// pipeline treats any error, a missing quote or a non-positive price the
/// same way: it marks the holding at its average cost instead.
#[async_trait]
pub trait QuoteProviderTrait: Send + Sync {
    async fn get_latest_quote(&self, symbol: &str) -> Result<LatestQuote>;
}
