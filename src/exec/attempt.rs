//! Execution attempt state machine.

use rust_decimal::Decimal;
use strum::Display;
use uuid::Uuid;

use crate::basket::Basket;
use crate::depth::SIZE_EPSILON;
use crate::detect::SizedPlan;
use crate::ledger::{LedgerEntry, LegRecord, Resolution, UnwindRecord};
use crate::venue::OrderStatus;

/// Lifecycle of one execution attempt.
///
/// Legal transitions:
/// `Sizing -> Submitting -> AwaitingFills -> {Settled, PartiallyFilled,
/// AllFailed}`, `PartiallyFilled -> Unwinding -> {Unwound, UnwindFailed}`,
/// and every terminal fill state `-> Recorded`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum AttemptState {
    /// Solving for size and checking preconditions.
    Sizing,
    /// Submitting leg orders.
    Submitting,
    /// Waiting for resting legs to resolve.
    AwaitingFills,
    /// Every leg filled completely.
    Settled,
    /// Some legs filled, some did not.
    PartiallyFilled,
    /// No leg filled anything.
    AllFailed,
    /// Compensating trades in flight.
    Unwinding,
    /// Compensating trades closed all exposure.
    Unwound,
    /// Compensating trades exhausted; exposure remains.
    UnwindFailed,
    /// Ledger entry written; the attempt is finished.
    Recorded,
}

impl AttemptState {
    /// Whether `next` is a legal successor of `self`.
    pub fn permits(self, next: AttemptState) -> bool {
        use AttemptState::*;
        matches!(
            (self, next),
            (Sizing, Submitting)
                | (Sizing, AllFailed)
                | (Submitting, AwaitingFills)
                | (Submitting, Settled)
                | (Submitting, PartiallyFilled)
                | (Submitting, AllFailed)
                | (AwaitingFills, Settled)
                | (AwaitingFills, PartiallyFilled)
                | (AwaitingFills, AllFailed)
                | (PartiallyFilled, Unwinding)
                | (Unwinding, Unwound)
                | (Unwinding, UnwindFailed)
                | (Settled, Recorded)
                | (AllFailed, Recorded)
                | (Unwound, Recorded)
                | (UnwindFailed, Recorded)
        )
    }

    /// Ledger resolution for a recordable state, if this state is one.
    pub fn resolution(self) -> Option<Resolution> {
        match self {
            AttemptState::Settled => Some(Resolution::Settled),
            AttemptState::AllFailed => Some(Resolution::AllFailed),
            AttemptState::Unwound => Some(Resolution::Unwound),
            AttemptState::UnwindFailed => Some(Resolution::UnwindFailed),
            _ => None,
        }
    }
}

/// Result of one leg's order flow.
#[derive(Debug, Clone)]
pub struct LegOutcome {
    /// Index into the basket's legs.
    pub leg_index: usize,
    /// Venue order id, if the order was accepted.
    pub order_id: Option<String>,
    /// Final status.
    pub status: OrderStatus,
    /// Size filled.
    pub filled_size: Decimal,
    /// Average fill price, if anything filled.
    pub avg_price: Option<Decimal>,
}

/// How an attempt's fills classify once all legs have resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillClassification {
    /// Every leg filled the full planned size.
    AllFilled,
    /// No leg filled anything.
    NoneFilled,
    /// Anything in between.
    Partial,
}

/// One execution attempt in progress.
#[derive(Debug)]
pub struct Attempt {
    /// Unique attempt id.
    pub id: Uuid,
    /// Market being traded.
    pub market_id: String,
    /// Direction being traded.
    pub basket: Basket,
    /// Sized plan being executed.
    pub plan: SizedPlan,
    /// Current state.
    pub state: AttemptState,
    /// Leg outcomes accumulated so far.
    pub legs: Vec<LegOutcome>,
    /// Compensating trades made.
    pub unwinds: Vec<UnwindRecord>,
    /// Failure context for the ledger.
    pub failure_reason: Option<String>,
}

impl Attempt {
    /// Start a new attempt in the `Sizing` state.
    pub fn new(market_id: &str, basket: Basket, plan: SizedPlan) -> Self {
        Self {
            id: Uuid::new_v4(),
            market_id: market_id.to_string(),
            basket,
            plan,
            state: AttemptState::Sizing,
            legs: Vec::new(),
            unwinds: Vec::new(),
            failure_reason: None,
        }
    }

    /// Move to `next`. Illegal transitions panic in debug builds and are
    /// clamped in release builds, since the coordinator is the only caller.
    pub fn transition(&mut self, next: AttemptState) {
        debug_assert!(
            self.state.permits(next),
            "illegal attempt transition {} -> {}",
            self.state,
            next
        );
        if self.state.permits(next) {
            self.state = next;
        }
    }

    /// Classify the accumulated leg outcomes against the planned size.
    pub fn classify_fills(&self) -> FillClassification {
        let full = self.plan.size - SIZE_EPSILON;
        let all_filled = self.legs.len() == self.basket.legs.len()
            && self.legs.iter().all(|leg| leg.filled_size >= full);
        if all_filled {
            return FillClassification::AllFilled;
        }
        if self.legs.iter().all(|leg| leg.filled_size <= SIZE_EPSILON) {
            return FillClassification::NoneFilled;
        }
        FillClassification::Partial
    }

    /// Build the ledger entry for a recordable state.
    pub fn to_ledger_entry(&self, recorded_at_ms: i64) -> Option<LedgerEntry> {
        let resolution = self.state.resolution()?;
        let legs = self
            .legs
            .iter()
            .map(|outcome| {
                let leg = &self.basket.legs[outcome.leg_index];
                LegRecord {
                    venue: leg.venue.clone(),
                    instrument: leg.instrument.clone(),
                    side: leg.side,
                    order_id: outcome.order_id.clone(),
                    requested_size: self.plan.size,
                    filled_size: outcome.filled_size,
                    avg_price: outcome.avg_price,
                    status: outcome.status,
                }
            })
            .collect();

        Some(LedgerEntry {
            attempt_id: self.id,
            market_id: self.market_id.clone(),
            basket_id: self.basket.id.clone(),
            resolution,
            size: self.plan.size,
            expected_profit: self.plan.expected_profit,
            legs,
            unwinds: self.unwinds.clone(),
            failure_reason: self.failure_reason.clone(),
            recorded_at_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basket::{FillMode, Leg, Side};
    use rust_decimal_macros::dec;

    fn plan(size: Decimal) -> SizedPlan {
        SizedPlan {
            size,
            total_cost: dec!(40),
            expected_profit: dec!(10),
            profit_rate: dec!(0.2),
            legs: vec![],
        }
    }

    fn basket() -> Basket {
        let leg = |instrument: &str| Leg {
            venue: "alpha".to_string(),
            instrument: instrument.to_string(),
            side: Side::Buy,
            fee_rate: dec!(0),
            min_notional: dec!(0),
            fill_mode: FillMode::FillOrKill,
        };
        Basket {
            id: "event-1/a".to_string(),
            legs: vec![leg("yes"), leg("no")],
        }
    }

    fn outcome(index: usize, filled: Decimal) -> LegOutcome {
        LegOutcome {
            leg_index: index,
            order_id: Some(format!("o-{index}")),
            status: if filled > Decimal::ZERO {
                OrderStatus::Filled
            } else {
                OrderStatus::Rejected
            },
            filled_size: filled,
            avg_price: (filled > Decimal::ZERO).then(|| dec!(0.40)),
        }
    }

    #[test]
    fn happy_path_transitions_are_legal() {
        use AttemptState::*;
        for (from, to) in [
            (Sizing, Submitting),
            (Submitting, AwaitingFills),
            (AwaitingFills, Settled),
            (Settled, Recorded),
        ] {
            assert!(from.permits(to), "{from} -> {to}");
        }
    }

    #[test]
    fn partial_fill_path_transitions_are_legal() {
        use AttemptState::*;
        for (from, to) in [
            (AwaitingFills, PartiallyFilled),
            (PartiallyFilled, Unwinding),
            (Unwinding, Unwound),
            (Unwinding, UnwindFailed),
            (UnwindFailed, Recorded),
        ] {
            assert!(from.permits(to), "{from} -> {to}");
        }
    }

    #[test]
    fn illegal_transitions_are_rejected() {
        use AttemptState::*;
        assert!(!Sizing.permits(Settled));
        assert!(!Settled.permits(Unwinding));
        assert!(!Recorded.permits(Sizing));
        assert!(!PartiallyFilled.permits(Recorded));
    }

    #[test]
    fn classifies_fills() {
        let mut attempt = Attempt::new("event-1", basket(), plan(dec!(50)));

        attempt.legs = vec![outcome(0, dec!(50)), outcome(1, dec!(50))];
        assert_eq!(attempt.classify_fills(), FillClassification::AllFilled);

        attempt.legs = vec![outcome(0, dec!(0)), outcome(1, dec!(0))];
        assert_eq!(attempt.classify_fills(), FillClassification::NoneFilled);

        attempt.legs = vec![outcome(0, dec!(50)), outcome(1, dec!(0))];
        assert_eq!(attempt.classify_fills(), FillClassification::Partial);

        // A leg never submitted counts as unfilled.
        attempt.legs = vec![outcome(0, dec!(50))];
        assert_eq!(attempt.classify_fills(), FillClassification::Partial);
    }

    #[test]
    fn ledger_entry_only_from_recordable_states() {
        let mut attempt = Attempt::new("event-1", basket(), plan(dec!(50)));
        assert!(attempt.to_ledger_entry(0).is_none());

        attempt.transition(AttemptState::Submitting);
        attempt.legs = vec![outcome(0, dec!(50)), outcome(1, dec!(50))];
        attempt.transition(AttemptState::Settled);

        let entry = attempt.to_ledger_entry(1_700_000_000_000).unwrap();
        assert_eq!(entry.resolution, Resolution::Settled);
        assert_eq!(entry.legs.len(), 2);
        assert_eq!(entry.recorded_at_ms, 1_700_000_000_000);
    }
}
