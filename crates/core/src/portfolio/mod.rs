pub mod gains;
pub mod positions;
pub mod report;

pub use gains::*;
pub use positions::*;
pub use report::*;
