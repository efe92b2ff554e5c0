//! FIFO tax-lot matching and realized/unrealized gains.

mod fifo_engine;
mod gains_model;


pub use fifo_engine::{FifoGainsEngine, SymbolReplay};
pub use gains_model::{
    holding_days, round_money, GainsReport, GainsTotals, HoldingTerm, SaleRecord, SellMatch,
    SymbolGains, SymbolPricing, TaxLot, UnmatchedSell,
};
