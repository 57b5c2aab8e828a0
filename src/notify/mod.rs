//! Operator alerts.
//!
//! Alerts fire for conditions that need a human: exposure the engine could
//! not close on its own, or aggregate exposure past the configured limit.

use std::sync::Mutex;

use rust_decimal::Decimal;
use tracing::error;

/// An operator-facing alert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Alert {
    /// Compensating trades failed; residual exposure is open.
    UnwindFailed {
        /// Market whose attempt failed to unwind.
        market_id: String,
        /// Venue holding the exposure.
        venue: String,
        /// Instrument held.
        instrument: String,
        /// Residual size.
        size: Decimal,
    },
    /// Total residual notional exceeds the configured limit.
    ExposureLimitExceeded {
        /// Current residual notional.
        notional: Decimal,
        /// Configured limit.
        limit: Decimal,
    },
}

/// Alert sink.
pub trait Notifier: Send + Sync {
    /// Deliver one alert. Delivery failures must not propagate into the
    /// execution path.
    fn notify(&self, alert: Alert);
}

/// Emits alerts as error-level log lines.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, alert: Alert) {
        match alert {
            Alert::UnwindFailed {
                market_id,
                venue,
                instrument,
                size,
            } => {
                error!(
                    market = %market_id,
                    venue = %venue,
                    instrument = %instrument,
                    %size,
                    "ALERT: unwind failed, manual intervention required"
                );
            }
            Alert::ExposureLimitExceeded { notional, limit } => {
                error!(
                    %notional,
                    %limit,
                    "ALERT: residual exposure exceeds limit"
                );
            }
        }
    }
}

/// Captures alerts for assertions.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    alerts: Mutex<Vec<Alert>>,
}

impl RecordingNotifier {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Alerts delivered so far.
    pub fn alerts(&self) -> Vec<Alert> {
        self.alerts.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, alert: Alert) {
        self.alerts.lock().unwrap().push(alert);
    }
}
