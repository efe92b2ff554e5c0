//! FX module - static rate table and reporting-currency normalization.

pub mod currency_converter;
mod fx_model;

pub use currency_converter::CurrencyNormalizer;
pub use fx_model::RateTable;
