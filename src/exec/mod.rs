//! Multi-leg execution.

pub mod attempt;
pub mod coordinator;

use std::sync::{Arc, RwLock};

use rust_decimal::Decimal;
use serde::Serialize;

pub use attempt::{Attempt, AttemptState, FillClassification, LegOutcome};
pub use coordinator::Coordinator;

/// Running counters exposed over the status endpoint.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EngineStats {
    /// Detection cycles completed.
    pub detection_cycles: u64,
    /// Cycles abandoned on fetch failure or stale books.
    pub cycles_abandoned: u64,
    /// Opportunities priced below payout.
    pub opportunities_detected: u64,
    /// Execution attempts started.
    pub attempts_started: u64,
    /// Attempts where every leg filled.
    pub settled: u64,
    /// Attempts where no leg filled.
    pub all_failed: u64,
    /// Partially filled attempts closed by compensating trades.
    pub unwound: u64,
    /// Partially filled attempts with residual exposure.
    pub unwind_failed: u64,
    /// Triggers skipped because an attempt was in flight.
    pub skipped_in_flight: u64,
    /// Triggers skipped because the market was cooling down.
    pub skipped_cooldown: u64,
    /// Sum of expected profit across settled attempts.
    pub expected_profit_settled: Decimal,
    /// Approximate notional of residual exposure from failed unwinds.
    pub open_exposure_notional: Decimal,
}

/// Stats handle shared between the engine loop, coordinator, and HTTP API.
pub type SharedStats = Arc<RwLock<EngineStats>>;

/// Create a fresh shared stats handle.
pub fn shared_stats() -> SharedStats {
    Arc::new(RwLock::new(EngineStats::default()))
}
