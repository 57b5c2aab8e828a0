//! Cross-venue basket arbitrage engine for complementary-outcome markets.
//!
//! The engine buys a basket of outcome instruments whose payouts are mutually
//! exclusive and collectively exhaustive. Exactly one leg pays out one unit
//! at settlement, so whenever the fee-inclusive cost of the basket is below
//! one unit the profit is locked in at fill time, regardless of which outcome
//! occurs.
//!
//! # Pipeline
//!
//! ```text
//! poll books -> evaluate directions -> solve size -> execute legs -> record
//! ```
//!
//! Detection is pure and depth-aware: it walks each leg's ladder rather than
//! trusting top-of-book size. Execution submits fill-or-kill legs first, then
//! aggressive limits, and unwinds any partial fills with compensating trades.
//! Every terminal attempt appends exactly one entry to the exposure ledger.
//!
//! # Modules
//!
//! - [`config`]: Configuration loading from environment
//! - [`error`]: Unified error types
//! - [`basket`]: Baskets, legs, and topology loading
//! - [`depth`]: Orderbook snapshots and cost curves
//! - [`detect`]: Opportunity detection and sizing
//! - [`venue`]: Venue adapters and order plumbing
//! - [`exec`]: Execution coordination and unwinding
//! - [`ledger`]: Append-only exposure ledger
//! - [`notify`]: Operator alerts
//! - [`scheduler`]: The engine poll loop
//! - [`api`]: HTTP API for health/status
//! - [`utils`]: Utility functions

pub mod api;
pub mod basket;
pub mod config;
pub mod depth;
pub mod detect;
pub mod error;
pub mod exec;
pub mod ledger;
pub mod metrics;
pub mod notify;
pub mod scheduler;
pub mod utils;
pub mod venue;

pub use config::Config;
pub use error::{EngineError, Result};
