//! Basket, leg, and market definitions.
//!
//! A basket is an ordered list of legs whose outcomes are mutually exclusive
//! and collectively exhaustive, so the combined payout normalizes to exactly
//! one unit regardless of how the underlying event resolves. Mutual
//! exclusivity is a configuration-time invariant; the engine does not
//! re-verify it at runtime.

pub mod topology;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

pub use topology::load_topology;

/// Order side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Buy order.
    #[strum(serialize = "BUY", serialize = "buy")]
    Buy,
    /// Sell order.
    #[strum(serialize = "SELL", serialize = "sell")]
    Sell,
}

impl Side {
    /// The opposite side, used for compensating trades.
    pub fn opposite(self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

/// How a leg's orders resolve.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum FillMode {
    /// Fill-or-kill: synchronous fill-or-nothing signal.
    #[default]
    #[strum(serialize = "fok", serialize = "fill_or_kill")]
    FillOrKill,
    /// Aggressive limit plus timeout: rests briefly, then cancelled.
    #[strum(serialize = "aggressive_limit")]
    AggressiveLimit,
}

/// One venue-side order within a basket. Immutable, defined at configuration
/// time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Leg {
    /// Venue this leg trades on.
    pub venue: String,
    /// Instrument to trade.
    pub instrument: String,
    /// Side of the order.
    pub side: Side,
    /// Taker fee rate charged by the venue (e.g. 0.02 for 2%).
    pub fee_rate: Decimal,
    /// Minimum notional the venue accepts.
    pub min_notional: Decimal,
    /// Order resolution semantics for this leg.
    pub fill_mode: FillMode,
}

impl Leg {
    /// Key identifying the book this leg trades against.
    pub fn book_key(&self) -> (String, String) {
        (self.venue.clone(), self.instrument.clone())
    }
}

/// An ordered list of legs guaranteeing one unit of payout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Basket {
    /// Unique basket identifier.
    pub id: String,
    /// Legs in submission order.
    pub legs: Vec<Leg>,
}

/// A tradable market: one economic event with one or more candidate basket
/// directions (e.g. a two-leg instrument pair tradable either as
/// "A + complement(B)" or "B + complement(A)").
///
/// Directions are evaluated in declaration order; ties on profit keep the
/// earliest index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Market {
    /// Unique market identifier. Locks and cooldowns key on this.
    pub id: String,
    /// Candidate basket directions, in evaluation order.
    pub directions: Vec<Basket>,
}

impl Market {
    /// Unique (venue, instrument) pairs across all directions, in first-seen
    /// order. One detection cycle fetches each exactly once.
    pub fn book_keys(&self) -> Vec<(String, String)> {
        let mut keys: Vec<(String, String)> = Vec::new();
        for basket in &self.directions {
            for leg in &basket.legs {
                let key = leg.book_key();
                if !keys.contains(&key) {
                    keys.push(key);
                }
            }
        }
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn leg(venue: &str, instrument: &str) -> Leg {
        Leg {
            venue: venue.to_string(),
            instrument: instrument.to_string(),
            side: Side::Buy,
            fee_rate: dec!(0),
            min_notional: dec!(1),
            fill_mode: FillMode::FillOrKill,
        }
    }

    #[test]
    fn side_opposite() {
        assert_eq!(Side::Buy.opposite(), Side::Sell);
        assert_eq!(Side::Sell.opposite(), Side::Buy);
    }

    #[test]
    fn book_keys_deduplicate_across_directions() {
        let market = Market {
            id: "event-1".to_string(),
            directions: vec![
                Basket {
                    id: "event-1/a".to_string(),
                    legs: vec![leg("alpha", "yes"), leg("beta", "no")],
                },
                Basket {
                    id: "event-1/b".to_string(),
                    legs: vec![leg("alpha", "no"), leg("beta", "yes")],
                },
            ],
        };

        let keys = market.book_keys();
        assert_eq!(keys.len(), 4);
        assert_eq!(keys[0], ("alpha".to_string(), "yes".to_string()));
        assert_eq!(keys[1], ("beta".to_string(), "no".to_string()));
    }

    #[test]
    fn fill_mode_from_string() {
        use std::str::FromStr;
        assert_eq!(FillMode::from_str("fok").unwrap(), FillMode::FillOrKill);
        assert_eq!(
            FillMode::from_str("aggressive_limit").unwrap(),
            FillMode::AggressiveLimit
        );
    }
}
