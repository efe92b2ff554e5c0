//! Weighted-average-cost positions.

mod position_builder;
mod positions_model;

pub use position_builder::{PositionBook, PositionBuilder};
pub use positions_model::{is_quantity_significant, Position};
