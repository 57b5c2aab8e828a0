//! Application configuration loaded from environment variables.

use std::time::Duration;

use rust_decimal::Decimal;
use serde::Deserialize;

use crate::error::ConfigError;

/// Engine configuration loaded from environment variables.
///
/// Validated once at startup; passed into constructors explicitly. No
/// package-level mutable state.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // === Detection Parameters ===
    /// Minimum profit rate (fraction of guaranteed payout) to act on.
    #[serde(default = "default_min_profit_threshold")]
    pub min_profit_threshold: Decimal,

    /// Smallest position size the engine will trade.
    #[serde(default = "default_min_position_size")]
    pub min_position_size: Decimal,

    /// Largest position size the engine will trade.
    #[serde(default = "default_max_position_size")]
    pub max_position_size: Decimal,

    /// Maximum notional spent per execution attempt.
    #[serde(default = "default_max_notional_per_attempt")]
    pub max_notional_per_attempt: Decimal,

    /// Orderbook snapshots older than this are stale (milliseconds).
    #[serde(default = "default_freshness_window_ms")]
    pub freshness_window_ms: u64,

    // === Execution Parameters ===
    /// Balance safety margin (1.2 = 20% extra).
    #[serde(default = "default_balance_margin")]
    pub balance_margin: Decimal,

    /// Markup applied to aggressive-limit leg prices (0.01 = 1% above limit).
    #[serde(default = "default_aggressive_markup")]
    pub aggressive_markup: Decimal,

    /// Per-leg order fill timeout in milliseconds.
    #[serde(default = "default_order_timeout_ms")]
    pub order_timeout_ms: u64,

    /// Interval between order status polls in milliseconds.
    #[serde(default = "default_status_poll_interval_ms")]
    pub status_poll_interval_ms: u64,

    /// Deadline for any single venue call in milliseconds.
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,

    /// Minimum seconds between attempts on the same market.
    #[serde(default = "default_cooldown_seconds")]
    pub cooldown_seconds: u64,

    /// Bounded retry count for compensating trades.
    #[serde(default = "default_unwind_retry_count")]
    pub unwind_retry_count: u32,

    /// Alert when total unresolved unhedged notional exceeds this.
    #[serde(default = "default_max_unhedged_notional")]
    pub max_unhedged_notional: Decimal,

    // === Scheduling ===
    /// Detection poll interval in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    // === Files ===
    /// Path to the basket topology file.
    #[serde(default = "default_topology_file")]
    pub topology_file: String,

    /// Path to the append-only exposure ledger.
    #[serde(default = "default_ledger_file")]
    pub ledger_file: String,

    // === Server Configuration ===
    /// HTTP server port for health/status endpoints.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Enable verbose logging.
    #[serde(default)]
    pub verbose: bool,
}

fn default_min_profit_threshold() -> Decimal {
    Decimal::new(5, 3) // 0.005
}

fn default_min_position_size() -> Decimal {
    Decimal::new(5, 0)
}

fn default_max_position_size() -> Decimal {
    Decimal::new(1000, 0)
}

fn default_max_notional_per_attempt() -> Decimal {
    Decimal::new(250, 0)
}

fn default_freshness_window_ms() -> u64 {
    2_000
}

fn default_balance_margin() -> Decimal {
    Decimal::new(12, 1) // 1.2
}

fn default_aggressive_markup() -> Decimal {
    Decimal::new(1, 2) // 0.01
}

fn default_order_timeout_ms() -> u64 {
    3_000
}

fn default_status_poll_interval_ms() -> u64 {
    250
}

fn default_call_timeout_ms() -> u64 {
    5_000
}

fn default_cooldown_seconds() -> u64 {
    30
}

fn default_unwind_retry_count() -> u32 {
    3
}

fn default_max_unhedged_notional() -> Decimal {
    Decimal::new(100, 0)
}

fn default_poll_interval_ms() -> u64 {
    1_000
}

fn default_topology_file() -> String {
    "baskets.json".to_string()
}

fn default_ledger_file() -> String {
    "ledger.jsonl".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Config {
    /// Load configuration from environment, reading .env file first.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Ok(envy::from_env::<Self>()?)
    }

    /// Check that the configuration is internally consistent.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_profit_threshold <= Decimal::ZERO {
            return Err(ConfigError::Invalid(
                "MIN_PROFIT_THRESHOLD must be positive".to_string(),
            ));
        }
        if self.min_position_size <= Decimal::ZERO {
            return Err(ConfigError::Invalid(
                "MIN_POSITION_SIZE must be positive".to_string(),
            ));
        }
        if self.max_position_size < self.min_position_size {
            return Err(ConfigError::Invalid(
                "MAX_POSITION_SIZE must be >= MIN_POSITION_SIZE".to_string(),
            ));
        }
        if self.max_notional_per_attempt <= Decimal::ZERO {
            return Err(ConfigError::Invalid(
                "MAX_NOTIONAL_PER_ATTEMPT must be positive".to_string(),
            ));
        }
        if self.balance_margin < Decimal::ONE {
            return Err(ConfigError::Invalid(
                "BALANCE_MARGIN must be at least 1.0".to_string(),
            ));
        }
        if self.aggressive_markup < Decimal::ZERO {
            return Err(ConfigError::Invalid(
                "AGGRESSIVE_MARKUP must be non-negative".to_string(),
            ));
        }
        if self.unwind_retry_count == 0 {
            return Err(ConfigError::Invalid(
                "UNWIND_RETRY_COUNT must be at least 1".to_string(),
            ));
        }
        if self.order_timeout_ms == 0 || self.call_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "timeouts must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Detection poll interval.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Per-leg order fill timeout.
    pub fn order_timeout(&self) -> Duration {
        Duration::from_millis(self.order_timeout_ms)
    }

    /// Order status poll interval.
    pub fn status_poll_interval(&self) -> Duration {
        Duration::from_millis(self.status_poll_interval_ms)
    }

    /// Deadline for any single venue call.
    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    /// Cooldown window between attempts on one market.
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_seconds)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            min_profit_threshold: default_min_profit_threshold(),
            min_position_size: default_min_position_size(),
            max_position_size: default_max_position_size(),
            max_notional_per_attempt: default_max_notional_per_attempt(),
            freshness_window_ms: default_freshness_window_ms(),
            balance_margin: default_balance_margin(),
            aggressive_markup: default_aggressive_markup(),
            order_timeout_ms: default_order_timeout_ms(),
            status_poll_interval_ms: default_status_poll_interval_ms(),
            call_timeout_ms: default_call_timeout_ms(),
            cooldown_seconds: default_cooldown_seconds(),
            unwind_retry_count: default_unwind_retry_count(),
            max_unhedged_notional: default_max_unhedged_notional(),
            poll_interval_ms: default_poll_interval_ms(),
            topology_file: default_topology_file(),
            ledger_file: default_ledger_file(),
            port: default_port(),
            verbose: false,
        }
    }
}
