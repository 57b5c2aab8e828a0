//! Scripted in-memory venue for tests and paper trading.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use rust_decimal::Decimal;
use time::OffsetDateTime;

use super::adapter::VenueAdapter;
use super::order::{OrderRequest, OrderState, OrderStatus};
use crate::depth::{Orderbook, PriceLevel};
use crate::error::VenueError;

/// Fluent builder for orderbook snapshots.
pub struct BookBuilder {
    venue: String,
    instrument: String,
    bids: Vec<PriceLevel>,
    asks: Vec<PriceLevel>,
    fetched_at: OffsetDateTime,
}

impl BookBuilder {
    /// Start a snapshot for one venue/instrument, timestamped now.
    pub fn new(venue: &str, instrument: &str) -> Self {
        Self {
            venue: venue.to_string(),
            instrument: instrument.to_string(),
            bids: Vec::new(),
            asks: Vec::new(),
            fetched_at: OffsetDateTime::now_utc(),
        }
    }

    /// Append a bid level. Callers add bids best-first.
    pub fn bid(mut self, price: Decimal, size: Decimal) -> Self {
        self.bids.push(PriceLevel::new(price, size));
        self
    }

    /// Append an ask level. Callers add asks best-first.
    pub fn ask(mut self, price: Decimal, size: Decimal) -> Self {
        self.asks.push(PriceLevel::new(price, size));
        self
    }

    /// Override the snapshot timestamp.
    pub fn fetched_at(mut self, at: OffsetDateTime) -> Self {
        self.fetched_at = at;
        self
    }

    /// Finish the snapshot.
    pub fn build(self) -> Orderbook {
        Orderbook {
            venue: self.venue,
            instrument: self.instrument,
            bids: self.bids,
            asks: self.asks,
            fetched_at: self.fetched_at,
        }
    }
}

/// Scripted behavior for the next order placed on an instrument.
#[derive(Debug, Clone)]
pub enum OrderScript {
    /// Fill completely at the request's limit price.
    Fill,
    /// Fill completely at the given average price.
    FillAt(Decimal),
    /// Return a terminal rejection.
    Reject(String),
    /// Rest open, then report filled after this many status polls.
    RestThenFill {
        /// Status polls before the order reports filled.
        polls: u32,
    },
    /// Rest open and never fill; cancellation succeeds with zero filled.
    RestUnfilled,
    /// Rest open with a partial fill; cancellation keeps the partial.
    PartialThenCancel {
        /// Size filled before cancellation.
        filled: Decimal,
    },
    /// Fail the placement call itself with a network error.
    FailPlacement(String),
}

#[derive(Debug)]
struct MockOrder {
    state: OrderState,
    limit_price: Decimal,
    size: Decimal,
    polls_until_fill: Option<u32>,
    fill_on_cancel: Decimal,
}

/// In-memory venue with scripted books, balances, and order outcomes.
///
/// Unscripted orders fill completely at their limit price, which is the
/// behavior paper-trading mode wants.
pub struct MockVenue {
    name: String,
    books: Mutex<HashMap<String, Orderbook>>,
    balance: Mutex<Decimal>,
    positions: Mutex<HashMap<String, Decimal>>,
    scripts: Mutex<HashMap<String, VecDeque<OrderScript>>>,
    orders: Mutex<HashMap<String, MockOrder>>,
    placed: Mutex<Vec<OrderRequest>>,
    cancelled: Mutex<Vec<String>>,
    fetch_failures: Mutex<HashMap<String, String>>,
    next_id: AtomicU64,
}

impl MockVenue {
    /// Create a mock venue with a large default balance.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            books: Mutex::new(HashMap::new()),
            balance: Mutex::new(Decimal::new(1_000_000, 0)),
            positions: Mutex::new(HashMap::new()),
            scripts: Mutex::new(HashMap::new()),
            orders: Mutex::new(HashMap::new()),
            placed: Mutex::new(Vec::new()),
            cancelled: Mutex::new(Vec::new()),
            fetch_failures: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Install or replace the book for an instrument.
    pub fn set_book(&self, book: Orderbook) {
        self.books
            .lock()
            .unwrap()
            .insert(book.instrument.clone(), book);
    }

    /// Set the available balance.
    pub fn set_balance(&self, balance: Decimal) {
        *self.balance.lock().unwrap() = balance;
    }

    /// Set the position held in an instrument.
    pub fn set_position(&self, instrument: &str, size: Decimal) {
        self.positions
            .lock()
            .unwrap()
            .insert(instrument.to_string(), size);
    }

    /// Queue a scripted outcome for the next order on `instrument`.
    pub fn script_order(&self, instrument: &str, script: OrderScript) {
        self.scripts
            .lock()
            .unwrap()
            .entry(instrument.to_string())
            .or_default()
            .push_back(script);
    }

    /// Make the next fetch for `instrument` fail with a network error.
    pub fn fail_fetch(&self, instrument: &str, message: &str) {
        self.fetch_failures
            .lock()
            .unwrap()
            .insert(instrument.to_string(), message.to_string());
    }

    /// All order requests placed so far, in order.
    pub fn placed_orders(&self) -> Vec<OrderRequest> {
        self.placed.lock().unwrap().clone()
    }

    /// Order ids cancelled so far, in order.
    pub fn cancelled_orders(&self) -> Vec<String> {
        self.cancelled.lock().unwrap().clone()
    }

    fn next_order_id(&self) -> String {
        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        format!("{}-{}", self.name, n)
    }
}

#[async_trait]
impl VenueAdapter for MockVenue {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch_orderbook(&self, instrument: &str) -> Result<Orderbook, VenueError> {
        if let Some(message) = self.fetch_failures.lock().unwrap().remove(instrument) {
            return Err(VenueError::Network(message));
        }
        self.books
            .lock()
            .unwrap()
            .get(instrument)
            .cloned()
            .ok_or_else(|| VenueError::Protocol(format!("no book for {instrument}")))
    }

    async fn balance(&self) -> Result<Decimal, VenueError> {
        Ok(*self.balance.lock().unwrap())
    }

    async fn get_position(&self, instrument: &str) -> Result<Decimal, VenueError> {
        Ok(self
            .positions
            .lock()
            .unwrap()
            .get(instrument)
            .copied()
            .unwrap_or(Decimal::ZERO))
    }

    async fn place_order(&self, request: &OrderRequest) -> Result<OrderState, VenueError> {
        self.placed.lock().unwrap().push(request.clone());

        let script = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&request.instrument)
            .and_then(|queue| queue.pop_front())
            .unwrap_or(OrderScript::Fill);

        let order_id = self.next_order_id();
        let (state, polls_until_fill, fill_on_cancel) = match script {
            OrderScript::Fill => (
                OrderState {
                    order_id: order_id.clone(),
                    status: OrderStatus::Filled,
                    filled_size: request.size,
                    avg_fill_price: Some(request.price),
                },
                None,
                Decimal::ZERO,
            ),
            OrderScript::FillAt(price) => (
                OrderState {
                    order_id: order_id.clone(),
                    status: OrderStatus::Filled,
                    filled_size: request.size,
                    avg_fill_price: Some(price),
                },
                None,
                Decimal::ZERO,
            ),
            OrderScript::Reject(_) => (
                OrderState {
                    order_id: order_id.clone(),
                    status: OrderStatus::Rejected,
                    filled_size: Decimal::ZERO,
                    avg_fill_price: None,
                },
                None,
                Decimal::ZERO,
            ),
            OrderScript::RestThenFill { polls } => (
                OrderState {
                    order_id: order_id.clone(),
                    status: OrderStatus::Open,
                    filled_size: Decimal::ZERO,
                    avg_fill_price: None,
                },
                Some(polls),
                Decimal::ZERO,
            ),
            OrderScript::RestUnfilled => (
                OrderState {
                    order_id: order_id.clone(),
                    status: OrderStatus::Open,
                    filled_size: Decimal::ZERO,
                    avg_fill_price: None,
                },
                None,
                Decimal::ZERO,
            ),
            OrderScript::PartialThenCancel { filled } => (
                OrderState {
                    order_id: order_id.clone(),
                    status: OrderStatus::PartiallyFilled,
                    filled_size: filled,
                    avg_fill_price: Some(request.price),
                },
                None,
                filled,
            ),
            OrderScript::FailPlacement(message) => {
                return Err(VenueError::Network(message));
            }
        };

        self.orders.lock().unwrap().insert(
            order_id,
            MockOrder {
                state: state.clone(),
                limit_price: request.price,
                size: request.size,
                polls_until_fill,
                fill_on_cancel,
            },
        );

        Ok(state)
    }

    async fn order_status(&self, order_id: &str) -> Result<OrderState, VenueError> {
        let mut orders = self.orders.lock().unwrap();
        let order = orders
            .get_mut(order_id)
            .ok_or_else(|| VenueError::Protocol(format!("unknown order {order_id}")))?;

        if let Some(polls) = order.polls_until_fill {
            if polls == 0 {
                order.state.status = OrderStatus::Filled;
                order.state.filled_size = order.size;
                order.state.avg_fill_price = Some(order.limit_price);
                order.polls_until_fill = None;
            } else {
                order.polls_until_fill = Some(polls - 1);
            }
        }

        Ok(order.state.clone())
    }

    async fn cancel_order(&self, order_id: &str) -> Result<(), VenueError> {
        self.cancelled.lock().unwrap().push(order_id.to_string());

        let mut orders = self.orders.lock().unwrap();
        let order = orders
            .get_mut(order_id)
            .ok_or_else(|| VenueError::Protocol(format!("unknown order {order_id}")))?;

        if !order.state.status.is_terminal() {
            order.state.status = OrderStatus::Cancelled;
            order.state.filled_size = order.fill_on_cancel;
            if order.fill_on_cancel > Decimal::ZERO {
                order.state.avg_fill_price = Some(order.limit_price);
            }
        }

        Ok(())
    }
}
