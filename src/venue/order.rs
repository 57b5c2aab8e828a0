//! Order types shared by all venue adapters.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::basket::Side;

/// Time-in-force for an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
pub enum TimeInForce {
    /// Fill completely and immediately, or cancel.
    #[strum(serialize = "fok", serialize = "fill_or_kill")]
    FillOrKill,
    /// Rest on the book until filled or cancelled.
    #[strum(serialize = "gtc", serialize = "good_til_cancelled")]
    GoodTilCancelled,
}

/// Venue-reported order status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Accepted but not yet on the book.
    Pending,
    /// Resting on the book.
    Open,
    /// Partially filled, remainder still open.
    PartiallyFilled,
    /// Completely filled.
    Filled,
    /// Cancelled; any prior partial fills stand.
    Cancelled,
    /// Rejected by the venue.
    Rejected,
    /// Expired without filling.
    Expired,
}

impl OrderStatus {
    /// Whether this status is final and will not change.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Filled
                | OrderStatus::Cancelled
                | OrderStatus::Rejected
                | OrderStatus::Expired
        )
    }
}

/// An order to submit to a venue. All orders are priced limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRequest {
    /// Instrument to trade.
    pub instrument: String,
    /// Buy or sell.
    pub side: Side,
    /// Limit price.
    pub price: Decimal,
    /// Size in outcome units.
    pub size: Decimal,
    /// Time-in-force.
    pub tif: TimeInForce,
}

impl OrderRequest {
    /// Notional value of the order at its limit price.
    pub fn notional(&self) -> Decimal {
        self.price * self.size
    }
}

/// Venue-reported state of an order, returned by placement and by status
/// queries alike.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderState {
    /// Venue-assigned order id.
    pub order_id: String,
    /// Current status.
    pub status: OrderStatus,
    /// Size filled so far.
    pub filled_size: Decimal,
    /// Average fill price, if anything filled.
    pub avg_fill_price: Option<Decimal>,
}

impl OrderState {
    /// Whether any quantity filled.
    pub fn has_fills(&self) -> bool {
        self.filled_size > Decimal::ZERO
    }
}
