//! Basket evaluation over orderbook snapshots.

use rust_decimal::Decimal;
use time::OffsetDateTime;
use tracing::debug;

use super::{BookMap, Opportunity};
use crate::basket::{Basket, Market, Side};
use crate::depth::total_depth;
use crate::error::DetectError;

/// Evaluates markets against snapshots. Holds only configuration; all inputs
/// arrive per call, including the clock.
#[derive(Debug, Clone)]
pub struct Detector {
    min_profit_threshold: Decimal,
    freshness_window_ms: u64,
}

impl Detector {
    /// Create a detector.
    pub fn new(min_profit_threshold: Decimal, freshness_window_ms: u64) -> Self {
        Self {
            min_profit_threshold,
            freshness_window_ms,
        }
    }

    /// Evaluate every direction of a market and return the most profitable
    /// opportunity above the threshold, if any.
    ///
    /// Ties on profit keep the earliest direction. A stale snapshot fails the
    /// whole evaluation so the caller abandons the cycle rather than trade on
    /// a book of unknown age.
    pub fn evaluate_market(
        &self,
        market: &Market,
        books: &BookMap,
        now: OffsetDateTime,
    ) -> Result<Option<Opportunity>, DetectError> {
        let mut best: Option<Opportunity> = None;

        for basket in &market.directions {
            let Some(candidate) = self.evaluate_basket(&market.id, basket, books, now)? else {
                continue;
            };

            let replace = match &best {
                Some(current) => candidate.profit_rate > current.profit_rate,
                None => true,
            };
            if replace {
                best = Some(candidate);
            }
        }

        Ok(best)
    }

    /// Evaluate a single basket direction at top of book.
    ///
    /// Returns `Ok(None)` when the basket is priced at or above payout, below
    /// the threshold, or has no quote on a relevant side. Returns an error
    /// only for stale or missing snapshots, which invalidate the cycle.
    pub fn evaluate_basket(
        &self,
        market_id: &str,
        basket: &Basket,
        books: &BookMap,
        now: OffsetDateTime,
    ) -> Result<Option<Opportunity>, DetectError> {
        let mut unit_cost = Decimal::ZERO;
        let mut min_size = Decimal::ZERO;
        let mut max_size = Decimal::MAX;
        let mut snapshot_refs = Vec::with_capacity(basket.legs.len());

        for leg in &basket.legs {
            let book = books
                .get(&leg.book_key())
                .ok_or_else(|| DetectError::MissingBook {
                    venue: leg.venue.clone(),
                    instrument: leg.instrument.clone(),
                })?;

            if !book.is_fresh(now, self.freshness_window_ms) {
                return Err(DetectError::StaleBook {
                    venue: leg.venue.clone(),
                    instrument: leg.instrument.clone(),
                    age_ms: book.age_ms(now),
                    max_age_ms: self.freshness_window_ms,
                });
            }

            let best_price = match leg.side {
                Side::Buy => book.best_ask(),
                Side::Sell => book.best_bid(),
            };
            let Some(price) = best_price else {
                return Ok(None);
            };

            unit_cost += match leg.side {
                Side::Buy => price * (Decimal::ONE + leg.fee_rate),
                Side::Sell => -(price * (Decimal::ONE - leg.fee_rate)),
            };

            let ladder = match leg.side {
                Side::Buy => &book.asks,
                Side::Sell => &book.bids,
            };
            max_size = max_size.min(total_depth(ladder));
            if price > Decimal::ZERO {
                min_size = min_size.max(leg.min_notional / price);
            }
            snapshot_refs.push(book);
        }

        let profit_rate = profit_rate(unit_cost);
        if profit_rate < self.min_profit_threshold || profit_rate <= Decimal::ZERO {
            return Ok(None);
        }

        debug!(
            market = market_id,
            basket = %basket.id,
            %unit_cost,
            %profit_rate,
            "basket priced below payout"
        );

        Ok(Some(Opportunity {
            market_id: market_id.to_string(),
            basket: basket.clone(),
            books: snapshot_refs.into_iter().cloned().collect(),
            unit_cost,
            profit_rate,
            min_size,
            max_size,
            detected_at: now,
        }))
    }
}

/// Guaranteed profit per unit of payout. Zero when the basket costs at least
/// its payout.
pub fn profit_rate(unit_cost: Decimal) -> Decimal {
    (Decimal::ONE - unit_cost).max(Decimal::ZERO)
}
