//! Detection and execution loop.

use std::sync::Arc;
use std::time::Instant;

use futures::future::try_join_all;
use time::OffsetDateTime;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::basket::Market;
use crate::config::Config;
use crate::detect::{solve_size, BookMap, Detector, Opportunity, SizeBounds, SizedPlan};
use crate::error::{ConfigError, EngineError, ExecutionError, VenueError};
use crate::exec::{Coordinator, SharedStats};
use crate::metrics;
use crate::venue::VenueMap;

/// Polls venue books on an interval, evaluates every market, and hands sized
/// plans to the coordinator.
pub struct Engine {
    config: Config,
    markets: Vec<Market>,
    venues: VenueMap,
    detector: Detector,
    coordinator: Arc<Coordinator>,
    stats: SharedStats,
    attempts: tokio::sync::Mutex<JoinSet<()>>,
}

impl Engine {
    /// Build an engine, verifying every venue named in the topology has an
    /// adapter.
    pub fn new(
        config: Config,
        markets: Vec<Market>,
        venues: VenueMap,
        coordinator: Arc<Coordinator>,
        stats: SharedStats,
    ) -> Result<Self, ConfigError> {
        for market in &markets {
            for (venue, _) in market.book_keys() {
                if !venues.contains_key(&venue) {
                    return Err(ConfigError::Invalid(format!(
                        "market {}: no adapter for venue {venue}",
                        market.id
                    )));
                }
            }
        }

        let detector = Detector::new(config.min_profit_threshold, config.freshness_window_ms);
        Ok(Self {
            config,
            markets,
            venues,
            detector,
            coordinator,
            stats,
            attempts: tokio::sync::Mutex::new(JoinSet::new()),
        })
    }

    /// Run the poll loop until `shutdown` resolves, then drain in-flight
    /// attempts so every started attempt still reaches the ledger.
    pub async fn run(&self, shutdown: impl std::future::Future<Output = ()>) {
        for (name, adapter) in &self.venues {
            if let Err(err) = adapter.connect().await {
                error!(venue = %name, error = %err, "venue connect failed");
            }
        }

        info!(
            markets = self.markets.len(),
            poll_interval_ms = self.config.poll_interval_ms,
            "engine started"
        );

        let mut interval = tokio::time::interval(self.config.poll_interval());
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.run_cycle().await;
                }
                _ = &mut shutdown => {
                    info!("shutdown signal received, stopping engine");
                    break;
                }
            }
        }

        self.drain().await;
        for (name, adapter) in &self.venues {
            if let Err(err) = adapter.close().await {
                warn!(venue = %name, error = %err, "venue close failed");
            }
        }
    }

    /// One detection pass over every market. Each execution attempt runs on
    /// its own task; a slow attempt on one market never stalls detection on
    /// the rest. The coordinator's in-flight map serializes per market.
    pub async fn run_cycle(&self) {
        metrics::inc_detection_cycles();
        self.stats.write().unwrap().detection_cycles += 1;

        let mut attempts = self.attempts.lock().await;
        while attempts.try_join_next().is_some() {}

        for market in &self.markets {
            if !self.coordinator.market_available(&market.id) {
                debug!(market = %market.id, "in flight or cooling down, skipped");
                continue;
            }

            let Some((opportunity, plan)) = self.detect_for_market(market).await else {
                continue;
            };

            let coordinator = Arc::clone(&self.coordinator);
            let market_id = market.id.clone();
            attempts.spawn(async move {
                match coordinator.execute(&opportunity, &plan).await {
                    Ok(resolution) => {
                        info!(market = %market_id, %resolution, "attempt finished");
                    }
                    Err(EngineError::Execution(
                        ExecutionError::AttemptInFlight { .. }
                        | ExecutionError::CooldownActive { .. },
                    )) => {
                        debug!(market = %market_id, "market busy, skipped");
                    }
                    Err(err) => {
                        error!(market = %market_id, error = %err, "attempt failed");
                    }
                }
            });
        }
    }

    /// Wait for every in-flight attempt to finish.
    pub async fn drain(&self) {
        let mut attempts = self.attempts.lock().await;
        while attempts.join_next().await.is_some() {}
    }

    /// Fetch, evaluate, and size one market. Any venue failure or stale book
    /// abandons the market for this cycle; a fresh snapshot set comes next
    /// tick.
    async fn detect_for_market(&self, market: &Market) -> Option<(Opportunity, SizedPlan)> {
        let books = match self.fetch_books(market).await {
            Ok(books) => books,
            Err(err) => {
                warn!(market = %market.id, error = %err, "cycle abandoned on fetch failure");
                metrics::inc_cycles_abandoned();
                self.stats.write().unwrap().cycles_abandoned += 1;
                return None;
            }
        };

        let now = OffsetDateTime::now_utc();
        let opportunity = match self.detector.evaluate_market(market, &books, now) {
            Ok(Some(opportunity)) => opportunity,
            Ok(None) => return None,
            Err(err) => {
                warn!(market = %market.id, error = %err, "cycle abandoned");
                metrics::inc_cycles_abandoned();
                self.stats.write().unwrap().cycles_abandoned += 1;
                return None;
            }
        };

        metrics::inc_opportunities_detected();
        self.stats.write().unwrap().opportunities_detected += 1;
        info!(
            market = %market.id,
            basket = %opportunity.basket.id,
            unit_cost = %opportunity.unit_cost,
            profit_rate = %opportunity.profit_rate,
            "opportunity detected"
        );

        let bounds = SizeBounds {
            min_size: self.config.min_position_size,
            max_size: self.config.max_position_size,
            max_notional: self.config.max_notional_per_attempt,
            min_profit_rate: self.config.min_profit_threshold,
        };
        match solve_size(&opportunity, &bounds) {
            Ok(Some(plan)) => Some((opportunity, plan)),
            Ok(None) => {
                debug!(market = %market.id, "no viable size");
                None
            }
            Err(err) => {
                warn!(market = %market.id, error = %err, "sizing failed");
                None
            }
        }
    }

    /// Fetch every book a market needs, concurrently. Fails whole if any
    /// single fetch fails; a partial snapshot set is worthless.
    async fn fetch_books(&self, market: &Market) -> Result<BookMap, VenueError> {
        let fetches = market.book_keys().into_iter().map(|(venue, instrument)| {
            let adapter = self.venues.get(&venue).cloned();
            let timeout = self.config.call_timeout();
            let timeout_ms = self.config.call_timeout_ms;
            async move {
                let adapter = adapter.ok_or(VenueError::NotConnected)?;
                let start = Instant::now();
                let book = tokio::time::timeout(timeout, adapter.fetch_orderbook(&instrument))
                    .await
                    .map_err(|_| VenueError::Timeout {
                        operation: format!("fetch_orderbook {venue}/{instrument}"),
                        timeout_ms,
                    })??;
                metrics::record_book_fetch_latency(start, &venue);
                Ok::<_, VenueError>(((venue, instrument), book))
            }
        });

        let books = try_join_all(fetches).await?;
        Ok(books.into_iter().collect())
    }

    /// Evaluate every market once without executing. Used by the scan
    /// subcommand.
    pub async fn scan_once(&self) -> Vec<(String, Option<Opportunity>)> {
        let mut results = Vec::with_capacity(self.markets.len());
        for market in &self.markets {
            let outcome = match self.fetch_books(market).await {
                Ok(books) => {
                    let now = OffsetDateTime::now_utc();
                    self.detector
                        .evaluate_market(market, &books, now)
                        .unwrap_or_else(|err| {
                            warn!(market = %market.id, error = %err, "scan evaluation failed");
                            None
                        })
                }
                Err(err) => {
                    warn!(market = %market.id, error = %err, "scan fetch failed");
                    None
                }
            };
            results.push((market.id.clone(), outcome));
        }
        results
    }
}
