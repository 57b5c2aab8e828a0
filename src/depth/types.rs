//! Order book types and data structures.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Single price level in an order book.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PriceLevel {
    /// Price at this level.
    pub price: Decimal,
    /// Total size available at this price.
    pub size: Decimal,
}

impl PriceLevel {
    /// Create a new price level.
    pub fn new(price: Decimal, size: Decimal) -> Self {
        Self { price, size }
    }
}

/// Immutable L2 order book snapshot for one instrument on one venue.
///
/// Each poll produces a fresh snapshot; books are never mutated in place.
#[derive(Debug, Clone)]
pub struct Orderbook {
    /// Venue that produced this snapshot.
    pub venue: String,
    /// Instrument this book represents.
    pub instrument: String,
    /// Bid levels sorted by price descending.
    pub bids: Vec<PriceLevel>,
    /// Ask levels sorted by price ascending.
    pub asks: Vec<PriceLevel>,
    /// When this snapshot was taken.
    pub fetched_at: OffsetDateTime,
}

impl Orderbook {
    /// Get the best bid price.
    pub fn best_bid(&self) -> Option<Decimal> {
        self.bids.first().map(|l| l.price)
    }

    /// Get the best ask price.
    pub fn best_ask(&self) -> Option<Decimal> {
        self.asks.first().map(|l| l.price)
    }

    /// Get the spread between best bid and ask.
    pub fn spread(&self) -> Option<Decimal> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some(ask - bid),
            _ => None,
        }
    }

    /// Check if the book is inverted (best_ask < best_bid).
    pub fn is_inverted(&self) -> bool {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => ask < bid,
            _ => false,
        }
    }

    /// Get total liquidity on the bid side.
    pub fn total_bid_depth(&self) -> Decimal {
        self.bids.iter().map(|l| l.size).sum()
    }

    /// Get total liquidity on the ask side.
    pub fn total_ask_depth(&self) -> Decimal {
        self.asks.iter().map(|l| l.size).sum()
    }

    /// Snapshot age in milliseconds relative to `now`.
    pub fn age_ms(&self, now: OffsetDateTime) -> i128 {
        (now - self.fetched_at).whole_milliseconds()
    }

    /// Whether the snapshot is younger than the freshness window.
    pub fn is_fresh(&self, now: OffsetDateTime, max_age_ms: u64) -> bool {
        self.age_ms(now) < max_age_ms as i128
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use time::Duration;

    fn book(bids: Vec<(Decimal, Decimal)>, asks: Vec<(Decimal, Decimal)>) -> Orderbook {
        Orderbook {
            venue: "alpha".to_string(),
            instrument: "outcome-yes".to_string(),
            bids: bids.into_iter().map(|(p, s)| PriceLevel::new(p, s)).collect(),
            asks: asks.into_iter().map(|(p, s)| PriceLevel::new(p, s)).collect(),
            fetched_at: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn best_prices_and_spread() {
        let book = book(
            vec![(dec!(0.48), dec!(50)), (dec!(0.47), dec!(100))],
            vec![(dec!(0.50), dec!(50)), (dec!(0.51), dec!(100))],
        );

        assert_eq!(book.best_bid(), Some(dec!(0.48)));
        assert_eq!(book.best_ask(), Some(dec!(0.50)));
        assert_eq!(book.spread(), Some(dec!(0.02)));
    }

    #[test]
    fn detects_inverted_book() {
        let inverted = book(vec![(dec!(0.52), dec!(50))], vec![(dec!(0.50), dec!(50))]);
        assert!(inverted.is_inverted());

        let normal = book(vec![(dec!(0.48), dec!(50))], vec![(dec!(0.50), dec!(50))]);
        assert!(!normal.is_inverted());
    }

    #[test]
    fn total_depth() {
        let book = book(
            vec![(dec!(0.48), dec!(50)), (dec!(0.47), dec!(100))],
            vec![(dec!(0.50), dec!(50)), (dec!(0.51), dec!(100))],
        );

        assert_eq!(book.total_bid_depth(), dec!(150));
        assert_eq!(book.total_ask_depth(), dec!(150));
    }

    #[test]
    fn freshness_window() {
        let now = OffsetDateTime::now_utc();
        let mut book = book(vec![], vec![(dec!(0.50), dec!(50))]);
        book.fetched_at = now - Duration::milliseconds(100);

        assert!(book.is_fresh(now, 500));
        assert!(!book.is_fresh(now, 50));
    }
}
