//! Venue adapters and order plumbing.

pub mod adapter;
pub mod mock;
pub mod order;
pub mod retry;

use std::collections::HashMap;
use std::sync::Arc;

pub use adapter::VenueAdapter;
pub use mock::{BookBuilder, MockVenue, OrderScript};
pub use order::{OrderRequest, OrderState, OrderStatus, TimeInForce};
pub use retry::{with_retry, RetryPolicy};

/// Shared registry of venue adapters keyed by name.
pub type VenueMap = HashMap<String, Arc<dyn VenueAdapter>>;
