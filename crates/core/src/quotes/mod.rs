//! Quotes module - latest-price collaborator seam.

mod quotes_model;
mod quotes_traits;
mod static_provider;

pub use quotes_model::{LatestQuote, PriceSource};
pub use quotes_traits::QuoteProviderTrait;
pub use static_provider::StaticQuoteProvider;
