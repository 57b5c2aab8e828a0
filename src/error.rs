//! Unified error types for the arbitrage engine.

use rust_decimal::Decimal;
use thiserror::Error;

/// Unified error type for the engine.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Configuration loading or validation error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Venue adapter error.
    #[error("venue error: {0}")]
    Venue(#[from] VenueError),

    /// Opportunity detection error.
    #[error("detection error: {0}")]
    Detect(#[from] DetectError),

    /// Execution coordination error.
    #[error("execution error: {0}")]
    Execution(#[from] ExecutionError),

    /// Ledger persistence error.
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// JSON parsing error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration loading and validation errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Environment variable parsing failed.
    #[error("environment error: {0}")]
    Env(#[from] envy::Error),

    /// Topology file could not be read.
    #[error("failed to read topology file {path}: {source}")]
    TopologyRead {
        /// Path that failed.
        path: String,
        /// Underlying IO error.
        source: std::io::Error,
    },

    /// Topology file could not be parsed.
    #[error("failed to parse topology file: {0}")]
    TopologyParse(#[from] serde_json::Error),

    /// A validation rule was violated.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Venue adapter errors. Every adapter call is fallible and potentially slow.
#[derive(Error, Debug)]
pub enum VenueError {
    /// Transient network failure; safe to retry with backoff.
    #[error("network error: {0}")]
    Network(String),

    /// A call exceeded its deadline.
    #[error("{operation} timed out after {timeout_ms}ms")]
    Timeout {
        /// Operation that timed out.
        operation: String,
        /// Deadline in milliseconds.
        timeout_ms: u64,
    },

    /// Order rejected by the venue.
    #[error("order rejected: {reason}")]
    Rejected {
        /// Rejection reason from the venue.
        reason: String,
    },

    /// Rate limited by the venue.
    #[error("rate limited: retry after {retry_after_seconds}s")]
    RateLimited {
        /// Seconds to wait before retrying.
        retry_after_seconds: u64,
    },

    /// Venue reports insufficient funds.
    #[error("insufficient balance: need {required}, have {available}")]
    InsufficientBalance {
        /// Required amount.
        required: Decimal,
        /// Available amount.
        available: Decimal,
    },

    /// Adapter used before connect() or after close().
    #[error("venue not connected")]
    NotConnected,

    /// Malformed or unexpected venue response.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl VenueError {
    /// Whether the error class is safe to retry at the adapter boundary.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            VenueError::Network(_) | VenueError::Timeout { .. } | VenueError::RateLimited { .. }
        )
    }
}

/// Opportunity detection errors.
#[derive(Error, Debug)]
pub enum DetectError {
    /// Orderbook older than the freshness window; the cycle must be abandoned.
    #[error("stale orderbook for {venue}/{instrument}: {age_ms}ms > {max_age_ms}ms")]
    StaleBook {
        /// Venue identifier.
        venue: String,
        /// Instrument identifier.
        instrument: String,
        /// Snapshot age in milliseconds.
        age_ms: i128,
        /// Configured freshness window in milliseconds.
        max_age_ms: u64,
    },

    /// A leg's snapshot was not fetched this cycle; the cycle must be
    /// abandoned.
    #[error("missing orderbook for {venue}/{instrument}")]
    MissingBook {
        /// Venue identifier.
        venue: String,
        /// Instrument identifier.
        instrument: String,
    },

    /// Not enough depth on a ladder to fill the requested size.
    #[error("insufficient liquidity: need {required}, available {available}")]
    InsufficientLiquidity {
        /// Required size.
        required: Decimal,
        /// Available size.
        available: Decimal,
    },

    /// Invalid target size.
    #[error("invalid size: {0}")]
    InvalidSize(Decimal),
}

/// Execution coordination errors. Slot acquisition failures fire before an
/// attempt starts; leg-level failures are captured in the attempt's ledger
/// entry instead.
#[derive(Error, Debug)]
pub enum ExecutionError {
    /// An attempt for this basket is already in flight.
    #[error("attempt already in flight for {market}")]
    AttemptInFlight {
        /// Market with the active attempt.
        market: String,
    },

    /// Cooldown window has not elapsed since the last terminal attempt.
    #[error("cooldown active for {market}: {remaining_seconds}s remaining")]
    CooldownActive {
        /// Market in cooldown.
        market: String,
        /// Seconds remaining.
        remaining_seconds: u64,
    },

    /// An attempt reached the ledger boundary in a non-recordable state.
    #[error("attempt state {state} is not recordable")]
    NotRecordable {
        /// State the attempt was in.
        state: String,
    },
}

/// Ledger persistence errors.
#[derive(Error, Debug)]
pub enum LedgerError {
    /// IO failure while appending or reading.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Entry could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenient Result type alias.
pub type Result<T> = std::result::Result<T, EngineError>;
