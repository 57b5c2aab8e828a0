//! Ledger entry types.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::Display;
use uuid::Uuid;

use crate::basket::Side;
use crate::venue::OrderStatus;

/// Terminal resolution of an execution attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    /// Every leg filled completely; the basket settles risk-free.
    Settled,
    /// No leg filled anything; nothing to hedge.
    AllFailed,
    /// Some legs filled, and compensating trades closed the exposure.
    Unwound,
    /// Some legs filled and compensating trades could not close the
    /// exposure. Residual positions remain open.
    UnwindFailed,
}

/// Outcome of one leg within an attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegRecord {
    /// Venue the leg traded on.
    pub venue: String,
    /// Instrument traded.
    pub instrument: String,
    /// Order side.
    pub side: Side,
    /// Venue order id, if the order was accepted.
    pub order_id: Option<String>,
    /// Size requested.
    pub requested_size: Decimal,
    /// Size actually filled.
    pub filled_size: Decimal,
    /// Average fill price, if anything filled.
    pub avg_price: Option<Decimal>,
    /// Final venue-reported status.
    pub status: OrderStatus,
}

/// Outcome of one compensating trade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnwindRecord {
    /// Venue holding the exposure.
    pub venue: String,
    /// Instrument unwound.
    pub instrument: String,
    /// Side of the compensating order.
    pub side: Side,
    /// Size the unwind targeted.
    pub size: Decimal,
    /// Size the unwind actually closed.
    pub closed_size: Decimal,
    /// Average price of the compensating fill, if any.
    pub avg_price: Option<Decimal>,
    /// Placement attempts made.
    pub attempts: u32,
}

/// One terminal execution attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Unique attempt id.
    pub attempt_id: Uuid,
    /// Market the attempt traded.
    pub market_id: String,
    /// Basket direction the attempt traded.
    pub basket_id: String,
    /// Terminal resolution.
    pub resolution: Resolution,
    /// Planned size in payout units.
    pub size: Decimal,
    /// Profit expected at sizing time.
    pub expected_profit: Decimal,
    /// Per-leg outcomes.
    pub legs: Vec<LegRecord>,
    /// Compensating trades, if any were needed.
    pub unwinds: Vec<UnwindRecord>,
    /// Human-readable failure context for non-settled attempts.
    pub failure_reason: Option<String>,
    /// Unix timestamp in milliseconds.
    pub recorded_at_ms: i64,
}

impl LedgerEntry {
    /// Signed residual exposure this entry leaves open, per (venue,
    /// instrument). Buys add, sells subtract, successful unwinds reverse.
    /// Settled entries net to their filled positions, which settlement
    /// extinguishes; callers filtering for residual risk look at
    /// [`Resolution::UnwindFailed`].
    pub fn net_exposure(&self) -> HashMap<(String, String), Decimal> {
        let mut positions: HashMap<(String, String), Decimal> = HashMap::new();

        for leg in &self.legs {
            if leg.filled_size > Decimal::ZERO {
                let key = (leg.venue.clone(), leg.instrument.clone());
                let signed = match leg.side {
                    Side::Buy => leg.filled_size,
                    Side::Sell => -leg.filled_size,
                };
                *positions.entry(key).or_default() += signed;
            }
        }
        for unwind in &self.unwinds {
            if unwind.closed_size > Decimal::ZERO {
                let key = (unwind.venue.clone(), unwind.instrument.clone());
                let signed = match unwind.side {
                    Side::Buy => unwind.closed_size,
                    Side::Sell => -unwind.closed_size,
                };
                *positions.entry(key).or_default() += signed;
            }
        }

        positions.retain(|_, size| size.abs() > Decimal::ZERO);
        positions
    }
}

/// Residual exposure across entries whose unwind failed.
pub fn open_exposure(entries: &[LedgerEntry]) -> HashMap<(String, String), Decimal> {
    let mut positions: HashMap<(String, String), Decimal> = HashMap::new();
    for entry in entries {
        if entry.resolution != Resolution::UnwindFailed {
            continue;
        }
        for (key, size) in entry.net_exposure() {
            *positions.entry(key).or_default() += size;
        }
    }
    positions.retain(|_, size| size.abs() > Decimal::ZERO);
    positions
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn filled_leg(venue: &str, instrument: &str, filled: Decimal) -> LegRecord {
        LegRecord {
            venue: venue.to_string(),
            instrument: instrument.to_string(),
            side: Side::Buy,
            order_id: Some("o-1".to_string()),
            requested_size: dec!(50),
            filled_size: filled,
            avg_price: Some(dec!(0.40)),
            status: OrderStatus::Filled,
        }
    }

    fn entry(resolution: Resolution, legs: Vec<LegRecord>, unwinds: Vec<UnwindRecord>) -> LedgerEntry {
        LedgerEntry {
            attempt_id: Uuid::new_v4(),
            market_id: "event-1".to_string(),
            basket_id: "event-1/a".to_string(),
            resolution,
            size: dec!(50),
            expected_profit: dec!(5),
            legs,
            unwinds,
            failure_reason: None,
            recorded_at_ms: 1_700_000_000_000,
        }
    }

    #[test]
    fn successful_unwind_nets_to_zero() {
        let entry = entry(
            Resolution::Unwound,
            vec![filled_leg("alpha", "yes", dec!(50))],
            vec![UnwindRecord {
                venue: "alpha".to_string(),
                instrument: "yes".to_string(),
                side: Side::Sell,
                size: dec!(50),
                closed_size: dec!(50),
                avg_price: Some(dec!(0.39)),
                attempts: 1,
            }],
        );

        assert!(entry.net_exposure().is_empty());
    }

    #[test]
    fn failed_unwind_leaves_residual() {
        let entry = entry(
            Resolution::UnwindFailed,
            vec![filled_leg("alpha", "yes", dec!(50))],
            vec![UnwindRecord {
                venue: "alpha".to_string(),
                instrument: "yes".to_string(),
                side: Side::Sell,
                size: dec!(50),
                closed_size: dec!(0),
                avg_price: None,
                attempts: 3,
            }],
        );

        let exposure = entry.net_exposure();
        assert_eq!(
            exposure.get(&("alpha".to_string(), "yes".to_string())),
            Some(&dec!(50))
        );
    }

    #[test]
    fn open_exposure_counts_only_failed_unwinds() {
        let settled = entry(
            Resolution::Settled,
            vec![filled_leg("alpha", "yes", dec!(50))],
            vec![],
        );
        let stuck = entry(
            Resolution::UnwindFailed,
            vec![filled_leg("beta", "no", dec!(30))],
            vec![],
        );

        let exposure = open_exposure(&[settled, stuck]);
        assert_eq!(exposure.len(), 1);
        assert_eq!(
            exposure.get(&("beta".to_string(), "no".to_string())),
            Some(&dec!(30))
        );
    }
}
