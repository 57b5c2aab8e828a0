//! Order-book depth model and cost-curve evaluation.

pub mod curve;
pub mod types;

pub use curve::{total_depth, walk_cost, LadderFill, SIZE_EPSILON};
pub use types::{Orderbook, PriceLevel};
