//! Venue adapter trait.

use async_trait::async_trait;
use rust_decimal::Decimal;

use super::order::{OrderRequest, OrderState};
use crate::depth::Orderbook;
use crate::error::VenueError;

/// Uniform interface over venue REST/CLOB clients.
///
/// Adapters are stateless beyond their connection; every call is a fresh
/// round-trip. Implementations must be cheap to clone behind an `Arc`.
#[async_trait]
pub trait VenueAdapter: Send + Sync {
    /// Venue name, matching the topology file.
    fn name(&self) -> &str;

    /// Establish the venue session. Adapters without session state keep the
    /// default no-op.
    async fn connect(&self) -> Result<(), VenueError> {
        Ok(())
    }

    /// Tear down the venue session.
    async fn close(&self) -> Result<(), VenueError> {
        Ok(())
    }

    /// Fetch a fresh L2 snapshot for one instrument.
    async fn fetch_orderbook(&self, instrument: &str) -> Result<Orderbook, VenueError>;

    /// Available settlement-currency balance.
    async fn balance(&self) -> Result<Decimal, VenueError>;

    /// Size of the position currently held in an instrument.
    async fn get_position(&self, instrument: &str) -> Result<Decimal, VenueError>;

    /// Submit an order. The returned state may already be terminal for
    /// fill-or-kill orders.
    async fn place_order(&self, request: &OrderRequest) -> Result<OrderState, VenueError>;

    /// Query the current state of an order.
    async fn order_status(&self, order_id: &str) -> Result<OrderState, VenueError>;

    /// Cancel an open order. Cancelling an already-terminal order is not an
    /// error; the follow-up status query reports what actually happened.
    async fn cancel_order(&self, order_id: &str) -> Result<(), VenueError>;
}
