//! Opportunity detection.
//!
//! Detection is pure: it reads orderbook snapshots and produces candidate
//! opportunities without touching venues, clocks, or any mutable state.
//! Evaluating the same snapshots twice yields identical results.

pub mod detector;
pub mod sizer;

use std::collections::HashMap;

use rust_decimal::Decimal;
use time::OffsetDateTime;

use crate::basket::Basket;
use crate::depth::Orderbook;

pub use detector::Detector;
pub use sizer::{solve_size, LegPlan, SizeBounds, SizedPlan};

/// Orderbook snapshots for one detection cycle, keyed by (venue, instrument).
pub type BookMap = HashMap<(String, String), Orderbook>;

/// A basket whose top-of-book cost is below its guaranteed payout.
#[derive(Debug, Clone)]
pub struct Opportunity {
    /// Market the basket belongs to.
    pub market_id: String,
    /// The profitable direction.
    pub basket: Basket,
    /// Snapshots used, aligned index-for-index with the basket's legs.
    pub books: Vec<Orderbook>,
    /// Fee-inclusive cost of one unit of payout at top of book.
    pub unit_cost: Decimal,
    /// Guaranteed profit per unit of payout, `1 - unit_cost`.
    pub profit_rate: Decimal,
    /// Smallest size every venue minimum notional admits at top of book,
    /// the maximum of `min_notional / best_price` across legs.
    pub min_size: Decimal,
    /// Largest size the relevant ladders can fill, the minimum of total
    /// depth across legs.
    pub max_size: Decimal,
    /// Evaluation timestamp, as passed by the caller.
    pub detected_at: OffsetDateTime,
}
