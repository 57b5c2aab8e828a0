//! Execution coordination across venues.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rust_decimal::Decimal;
use time::OffsetDateTime;
use tracing::{error, info, warn};

use super::attempt::{Attempt, AttemptState, FillClassification, LegOutcome};
use super::SharedStats;
use crate::basket::{FillMode, Side};
use crate::config::Config;
use crate::depth::SIZE_EPSILON;
use crate::detect::{Opportunity, SizedPlan};
use crate::error::{EngineError, ExecutionError, VenueError};
use crate::ledger::{Ledger, Resolution, UnwindRecord};
use crate::metrics;
use crate::notify::{Alert, Notifier};
use crate::venue::{
    with_retry, OrderRequest, OrderState, OrderStatus, RetryPolicy, TimeInForce, VenueAdapter,
    VenueMap,
};

/// Floor and ceiling for outcome prices when walking an unwind price
/// aggressively.
const MIN_PRICE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);
const MAX_PRICE: Decimal = Decimal::from_parts(99, 0, 0, false, 2);

/// Releases the per-market in-flight slot when dropped, so a panic or early
/// return cannot leave a market locked forever.
struct InFlightGuard {
    in_flight: Arc<DashMap<String, ()>>,
    market_id: String,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.in_flight.remove(&self.market_id);
    }
}

/// Drives sized plans through submission, fill resolution, unwinding, and
/// ledger recording. One instance serves all markets; per-market serialization
/// happens through the in-flight map.
pub struct Coordinator {
    config: Config,
    venues: VenueMap,
    ledger: Arc<dyn Ledger>,
    notifier: Arc<dyn Notifier>,
    stats: SharedStats,
    retry: RetryPolicy,
    in_flight: Arc<DashMap<String, ()>>,
    cooldowns: DashMap<String, Instant>,
}

impl Coordinator {
    /// Create a coordinator.
    pub fn new(
        config: Config,
        venues: VenueMap,
        ledger: Arc<dyn Ledger>,
        notifier: Arc<dyn Notifier>,
        stats: SharedStats,
    ) -> Self {
        Self {
            config,
            venues,
            ledger,
            notifier,
            stats,
            retry: RetryPolicy::default(),
            in_flight: Arc::new(DashMap::new()),
            cooldowns: DashMap::new(),
        }
    }

    /// Whether a market can start an attempt right now. Used by the engine
    /// loop to skip fetching books for markets that cannot trade anyway.
    pub fn market_available(&self, market_id: &str) -> bool {
        !self.in_flight.contains_key(market_id) && self.cooldown_remaining(market_id).is_none()
    }

    /// Execute a sized plan end to end. Exactly one ledger entry is written
    /// for every attempt that acquires the market slot.
    #[tracing::instrument(skip_all, fields(market = %opportunity.market_id))]
    pub async fn execute(
        &self,
        opportunity: &Opportunity,
        plan: &SizedPlan,
    ) -> Result<Resolution, EngineError> {
        let _guard = self.acquire(&opportunity.market_id)?;
        let _timer = metrics::timer_attempt();
        metrics::inc_attempts_started();
        self.stats.write().unwrap().attempts_started += 1;

        let mut attempt = Attempt::new(
            &opportunity.market_id,
            opportunity.basket.clone(),
            plan.clone(),
        );
        info!(
            attempt = %attempt.id,
            market = %attempt.market_id,
            basket = %attempt.basket.id,
            size = %plan.size,
            expected_profit = %plan.expected_profit,
            "starting execution attempt"
        );

        if let Err(reason) = self.check_preconditions(&attempt).await {
            warn!(attempt = %attempt.id, reason, "precondition failed");
            attempt.failure_reason = Some(reason);
            attempt.transition(AttemptState::AllFailed);
            return self.record(attempt);
        }

        attempt.transition(AttemptState::Submitting);
        self.submit_legs(&mut attempt).await;

        match attempt.classify_fills() {
            FillClassification::AllFilled => {
                attempt.transition(AttemptState::Settled);
            }
            FillClassification::NoneFilled => {
                attempt.transition(AttemptState::AllFailed);
            }
            FillClassification::Partial => {
                attempt.transition(AttemptState::PartiallyFilled);
                attempt.transition(AttemptState::Unwinding);
                self.unwind(&mut attempt).await;
            }
        }

        self.record(attempt)
    }

    fn acquire(&self, market_id: &str) -> Result<InFlightGuard, ExecutionError> {
        if let Some(remaining) = self.cooldown_remaining(market_id) {
            self.stats.write().unwrap().skipped_cooldown += 1;
            return Err(ExecutionError::CooldownActive {
                market: market_id.to_string(),
                remaining_seconds: remaining,
            });
        }

        match self.in_flight.entry(market_id.to_string()) {
            Entry::Occupied(_) => {
                self.stats.write().unwrap().skipped_in_flight += 1;
                Err(ExecutionError::AttemptInFlight {
                    market: market_id.to_string(),
                })
            }
            Entry::Vacant(slot) => {
                slot.insert(());
                Ok(InFlightGuard {
                    in_flight: Arc::clone(&self.in_flight),
                    market_id: market_id.to_string(),
                })
            }
        }
    }

    fn cooldown_remaining(&self, market_id: &str) -> Option<u64> {
        let last = self.cooldowns.get(market_id)?;
        let cooldown = self.config.cooldown();
        let elapsed = last.elapsed();
        if elapsed < cooldown {
            Some((cooldown - elapsed).as_secs().max(1))
        } else {
            None
        }
    }

    fn venue(&self, name: &str) -> Result<Arc<dyn VenueAdapter>, VenueError> {
        self.venues
            .get(name)
            .cloned()
            .ok_or(VenueError::NotConnected)
    }

    async fn call<T>(
        &self,
        operation: &str,
        fut: impl Future<Output = Result<T, VenueError>>,
    ) -> Result<T, VenueError> {
        tokio::time::timeout(self.config.call_timeout(), fut)
            .await
            .map_err(|_| VenueError::Timeout {
                operation: operation.to_string(),
                timeout_ms: self.config.call_timeout_ms,
            })?
    }

    /// Verify every buying venue holds its leg notional plus margin, and
    /// every selling venue holds the position backing the sale, before
    /// anything is submitted.
    async fn check_preconditions(&self, attempt: &Attempt) -> Result<(), String> {
        let mut required: HashMap<&str, Decimal> = HashMap::new();
        let mut held: HashMap<(&str, &str), Decimal> = HashMap::new();
        for leg_plan in &attempt.plan.legs {
            let leg = &attempt.basket.legs[leg_plan.leg_index];
            match leg.side {
                Side::Buy => {
                    *required.entry(leg.venue.as_str()).or_default() +=
                        leg_plan.fill_cost + leg_plan.fee;
                }
                Side::Sell => {
                    *held
                        .entry((leg.venue.as_str(), leg.instrument.as_str()))
                        .or_default() += attempt.plan.size;
                }
            }
        }

        for (venue_name, notional) in required {
            let need = notional * self.config.balance_margin;
            let adapter = self
                .venue(venue_name)
                .map_err(|e| format!("venue {venue_name}: {e}"))?;
            let available = self
                .call("balance", adapter.balance())
                .await
                .map_err(|e| format!("balance check on {venue_name} failed: {e}"))?;
            if available < need {
                return Err(format!(
                    "insufficient balance on {venue_name}: need {need}, have {available}"
                ));
            }
        }

        for ((venue_name, instrument), size) in held {
            let adapter = self
                .venue(venue_name)
                .map_err(|e| format!("venue {venue_name}: {e}"))?;
            let position = self
                .call("get_position", adapter.get_position(instrument))
                .await
                .map_err(|e| format!("position check on {venue_name}/{instrument} failed: {e}"))?;
            if position < size {
                return Err(format!(
                    "insufficient position on {venue_name}/{instrument}: need {size}, have {position}"
                ));
            }
        }
        Ok(())
    }

    /// Submit legs in fill-certainty order: fill-or-kill legs first, then
    /// aggressive-limit legs once the certain fills are confirmed. Stops at
    /// the first failed leg so no avoidable exposure is added.
    async fn submit_legs(&self, attempt: &mut Attempt) {
        let mut order: Vec<usize> = (0..attempt.basket.legs.len()).collect();
        order.sort_by_key(|&i| match attempt.basket.legs[i].fill_mode {
            FillMode::FillOrKill => 0,
            FillMode::AggressiveLimit => 1,
        });

        let mut awaiting = false;
        for index in order {
            let mode = attempt.basket.legs[index].fill_mode;
            if mode == FillMode::AggressiveLimit && !awaiting {
                attempt.transition(AttemptState::AwaitingFills);
                awaiting = true;
            }

            let filled = match mode {
                FillMode::FillOrKill => self.submit_fok_leg(attempt, index).await,
                FillMode::AggressiveLimit => self.submit_aggressive_leg(attempt, index).await,
            };
            if !filled {
                break;
            }
        }
    }

    async fn submit_fok_leg(&self, attempt: &mut Attempt, index: usize) -> bool {
        let leg = attempt.basket.legs[index].clone();
        let request = OrderRequest {
            instrument: leg.instrument.clone(),
            side: leg.side,
            price: attempt.plan.legs[index].limit_price,
            size: attempt.plan.size,
            tif: TimeInForce::FillOrKill,
        };

        let state = self.place(attempt, &leg.venue, &request).await;
        let Some(state) = state else {
            attempt.legs.push(LegOutcome {
                leg_index: index,
                order_id: None,
                status: OrderStatus::Rejected,
                filled_size: Decimal::ZERO,
                avg_price: None,
            });
            return false;
        };

        let filled = state.status == OrderStatus::Filled
            && state.filled_size >= attempt.plan.size - SIZE_EPSILON;
        if !filled && attempt.failure_reason.is_none() {
            attempt.failure_reason = Some(format!(
                "fok leg {}/{} did not fill: {}",
                leg.venue, leg.instrument, state.status
            ));
        }
        attempt.legs.push(LegOutcome {
            leg_index: index,
            order_id: Some(state.order_id),
            status: state.status,
            filled_size: state.filled_size,
            avg_price: state.avg_fill_price,
        });
        filled
    }

    /// Place an aggressive limit, poll until terminal or timeout, cancel on
    /// timeout, then resolve the true final state by query. A timed-out order
    /// is never assumed unfilled; it may have filled while we waited.
    async fn submit_aggressive_leg(&self, attempt: &mut Attempt, index: usize) -> bool {
        let leg = attempt.basket.legs[index].clone();
        let markup = self.config.aggressive_markup;
        let limit_price = attempt.plan.legs[index].limit_price;
        let price = match leg.side {
            Side::Buy => limit_price * (Decimal::ONE + markup),
            Side::Sell => limit_price * (Decimal::ONE - markup),
        };
        let request = OrderRequest {
            instrument: leg.instrument.clone(),
            side: leg.side,
            price: clamp_price(price),
            size: attempt.plan.size,
            tif: TimeInForce::GoodTilCancelled,
        };

        let placed = self.place(attempt, &leg.venue, &request).await;
        let (Some(mut state), Ok(adapter)) = (placed, self.venue(&leg.venue)) else {
            attempt.legs.push(LegOutcome {
                leg_index: index,
                order_id: None,
                status: OrderStatus::Rejected,
                filled_size: Decimal::ZERO,
                avg_price: None,
            });
            return false;
        };

        let deadline = Instant::now() + self.config.order_timeout();
        while !state.status.is_terminal() && Instant::now() < deadline {
            tokio::time::sleep(self.config.status_poll_interval()).await;
            let polled = self
                .call("order_status", adapter.order_status(&state.order_id))
                .await;
            match polled {
                Ok(fresh) => state = fresh,
                Err(err) if err.is_transient() => continue,
                Err(err) => {
                    warn!(order_id = %state.order_id, error = %err, "status poll failed");
                    break;
                }
            }
        }

        if !state.status.is_terminal() {
            if let Err(err) = self
                .call("cancel_order", adapter.cancel_order(&state.order_id))
                .await
            {
                warn!(order_id = %state.order_id, error = %err, "cancel failed");
            }
            let order_id = state.order_id.clone();
            let resolved = with_retry(&self.retry, "order_status", || {
                self.call("order_status", adapter.order_status(&order_id))
            })
            .await;
            match resolved {
                Ok(fresh) => state = fresh,
                Err(err) => {
                    error!(
                        order_id = %state.order_id,
                        error = %err,
                        "could not resolve final order state"
                    );
                    attempt.failure_reason = Some(format!(
                        "unresolved final state for order {}",
                        state.order_id
                    ));
                }
            }
        }

        let filled = state.status == OrderStatus::Filled
            && state.filled_size >= attempt.plan.size - SIZE_EPSILON;
        if !filled && attempt.failure_reason.is_none() {
            attempt.failure_reason = Some(format!(
                "aggressive leg {}/{} resolved {} with {} filled",
                leg.venue, leg.instrument, state.status, state.filled_size
            ));
        }
        attempt.legs.push(LegOutcome {
            leg_index: index,
            order_id: Some(state.order_id),
            status: state.status,
            filled_size: state.filled_size,
            avg_price: state.avg_fill_price,
        });
        filled
    }

    async fn place(
        &self,
        attempt: &mut Attempt,
        venue_name: &str,
        request: &OrderRequest,
    ) -> Option<OrderState> {
        let adapter = match self.venue(venue_name) {
            Ok(adapter) => adapter,
            Err(err) => {
                attempt.failure_reason = Some(format!("venue {venue_name}: {err}"));
                return None;
            }
        };

        metrics::inc_orders_submitted();
        match self
            .call("place_order", adapter.place_order(request))
            .await
        {
            Ok(state) => Some(state),
            Err(err) => {
                warn!(
                    venue = venue_name,
                    instrument = %request.instrument,
                    error = %err,
                    "order placement failed"
                );
                if attempt.failure_reason.is_none() {
                    attempt.failure_reason =
                        Some(format!("placement on {venue_name} failed: {err}"));
                }
                None
            }
        }
    }

    /// Close every filled leg with a compensating fill-or-kill order on the
    /// opposite side. Each round refetches the book and prices off the
    /// current best opposite price, escalating the markup; the recorded fill
    /// price is only a fallback when the book cannot be read.
    async fn unwind(&self, attempt: &mut Attempt) {
        let filled: Vec<(usize, Decimal, Decimal)> = attempt
            .legs
            .iter()
            .filter(|o| o.filled_size > SIZE_EPSILON)
            .map(|o| {
                let fallback = attempt.plan.legs[o.leg_index].limit_price;
                (o.leg_index, o.filled_size, o.avg_price.unwrap_or(fallback))
            })
            .collect();

        let mut all_closed = true;
        for (index, size, fill_price) in filled {
            let leg = attempt.basket.legs[index].clone();
            let side = leg.side.opposite();
            let adapter = self.venue(&leg.venue).ok();
            let mut closed = Decimal::ZERO;
            let mut avg_price = None;
            let mut attempts_used = 0;

            for round in 1..=self.config.unwind_retry_count {
                attempts_used = round;
                let base_price = match &adapter {
                    Some(adapter) => self
                        .call("fetch_orderbook", adapter.fetch_orderbook(&leg.instrument))
                        .await
                        .map_err(|err| {
                            warn!(
                                venue = %leg.venue,
                                instrument = %leg.instrument,
                                error = %err,
                                "unwind book fetch failed"
                            );
                        })
                        .ok()
                        .and_then(|book| match side {
                            Side::Sell => book.best_bid(),
                            Side::Buy => book.best_ask(),
                        })
                        .unwrap_or(fill_price),
                    None => fill_price,
                };
                let slip = self.config.aggressive_markup * Decimal::from(round);
                let price = match side {
                    Side::Sell => base_price * (Decimal::ONE - slip),
                    Side::Buy => base_price * (Decimal::ONE + slip),
                };
                let request = OrderRequest {
                    instrument: leg.instrument.clone(),
                    side,
                    price: clamp_price(price),
                    size,
                    tif: TimeInForce::FillOrKill,
                };

                match self.place(attempt, &leg.venue, &request).await {
                    Some(state)
                        if state.status == OrderStatus::Filled
                            && state.filled_size >= size - SIZE_EPSILON =>
                    {
                        closed = state.filled_size;
                        avg_price = state.avg_fill_price;
                        break;
                    }
                    _ => {
                        if round < self.config.unwind_retry_count {
                            tokio::time::sleep(self.retry.delay_for(round)).await;
                        }
                    }
                }
            }

            if closed < size - SIZE_EPSILON {
                all_closed = false;
                self.notifier.notify(Alert::UnwindFailed {
                    market_id: attempt.market_id.clone(),
                    venue: leg.venue.clone(),
                    instrument: leg.instrument.clone(),
                    size: size - closed,
                });
            }
            attempt.unwinds.push(UnwindRecord {
                venue: leg.venue,
                instrument: leg.instrument,
                side,
                size,
                closed_size: closed,
                avg_price,
                attempts: attempts_used,
            });
        }

        attempt.transition(if all_closed {
            AttemptState::Unwound
        } else {
            AttemptState::UnwindFailed
        });
    }

    /// Write the single ledger entry for this attempt and arm the cooldown.
    fn record(&self, mut attempt: Attempt) -> Result<Resolution, EngineError> {
        let recorded_at_ms =
            (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64;
        let Some(entry) = attempt.to_ledger_entry(recorded_at_ms) else {
            return Err(ExecutionError::NotRecordable {
                state: attempt.state.to_string(),
            }
            .into());
        };
        let resolution = entry.resolution;

        self.ledger.append(&entry)?;
        attempt.transition(AttemptState::Recorded);
        self.cooldowns
            .insert(attempt.market_id.clone(), Instant::now());
        metrics::inc_resolution(resolution);

        let residual_notional: Decimal = if resolution == Resolution::UnwindFailed {
            entry
                .net_exposure()
                .iter()
                .map(|((venue, instrument), size)| {
                    let price = entry
                        .legs
                        .iter()
                        .find(|l| &l.venue == venue && &l.instrument == instrument)
                        .and_then(|l| l.avg_price)
                        .unwrap_or(Decimal::ONE);
                    size.abs() * price
                })
                .sum()
        } else {
            Decimal::ZERO
        };

        {
            let mut stats = self.stats.write().unwrap();
            match resolution {
                Resolution::Settled => {
                    stats.settled += 1;
                    stats.expected_profit_settled += attempt.plan.expected_profit;
                }
                Resolution::AllFailed => stats.all_failed += 1,
                Resolution::Unwound => stats.unwound += 1,
                Resolution::UnwindFailed => stats.unwind_failed += 1,
            }
            stats.open_exposure_notional += residual_notional;
            if stats.open_exposure_notional > self.config.max_unhedged_notional {
                self.notifier.notify(Alert::ExposureLimitExceeded {
                    notional: stats.open_exposure_notional,
                    limit: self.config.max_unhedged_notional,
                });
            }
        }

        info!(
            attempt = %attempt.id,
            market = %attempt.market_id,
            %resolution,
            "attempt recorded"
        );
        Ok(resolution)
    }
}

/// Clamp an outcome price into the venue-acceptable (0, 1) band.
fn clamp_price(price: Decimal) -> Decimal {
    price.clamp(MIN_PRICE, MAX_PRICE)
}
