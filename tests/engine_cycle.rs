//! Engine loop tests: fetch fan-out, cycle abandonment, and execution wiring.

mod common;

use std::sync::Arc;

use pretty_assertions::assert_eq;
use rust_decimal_macros::dec;
use time::{Duration, OffsetDateTime};

use basket_arb::basket::FillMode;
use basket_arb::ledger::Resolution;
use basket_arb::scheduler::Engine;
use basket_arb::venue::{BookBuilder, OrderScript};

use common::{rig, seeded_venues, test_config, two_leg_market};

fn engine_with(
    config: basket_arb::config::Config,
    venues: basket_arb::venue::VenueMap,
) -> (Engine, common::Rig) {
    let market = two_leg_market(FillMode::FillOrKill);
    let rig = rig(config.clone(), venues.clone());
    let engine = Engine::new(
        config,
        vec![market],
        venues,
        rig.coordinator.clone(),
        rig.stats.clone(),
    )
    .unwrap();
    (engine, rig)
}

#[tokio::test]
async fn cycle_detects_sizes_and_settles() {
    let config = test_config();
    let (alpha, beta, venues) = seeded_venues(dec!(50));
    let (engine, rig) = engine_with(config, venues);

    engine.run_cycle().await;
    engine.drain().await;

    assert_eq!(alpha.placed_orders().len(), 1);
    assert_eq!(beta.placed_orders().len(), 1);
    assert_eq!(alpha.placed_orders()[0].size, dec!(50));

    let entries = rig.ledger.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].resolution, Resolution::Settled);

    let stats = rig.stats.read().unwrap().clone();
    assert_eq!(stats.detection_cycles, 1);
    assert_eq!(stats.opportunities_detected, 1);
    assert_eq!(stats.attempts_started, 1);
    assert_eq!(stats.settled, 1);
}

#[tokio::test]
async fn fetch_failure_abandons_the_cycle_without_trading() {
    let config = test_config();
    let (alpha, beta, venues) = seeded_venues(dec!(50));
    alpha.fail_fetch("yes", "connection reset");
    let (engine, rig) = engine_with(config, venues);

    engine.run_cycle().await;

    assert!(alpha.placed_orders().is_empty());
    assert!(beta.placed_orders().is_empty());
    assert!(rig.ledger.entries().is_empty());
    assert_eq!(rig.stats.read().unwrap().cycles_abandoned, 1);

    // The failure is one-shot; the next tick trades on fresh books.
    engine.run_cycle().await;
    engine.drain().await;
    assert_eq!(rig.ledger.entries().len(), 1);
}

#[tokio::test]
async fn stale_snapshot_abandons_the_cycle() {
    let config = test_config();
    let (alpha, _beta, venues) = seeded_venues(dec!(50));
    alpha.set_book(
        BookBuilder::new("alpha", "yes")
            .ask(dec!(0.40), dec!(50))
            .fetched_at(OffsetDateTime::now_utc() - Duration::seconds(10))
            .build(),
    );
    let (engine, rig) = engine_with(config, venues);

    engine.run_cycle().await;

    assert!(rig.ledger.entries().is_empty());
    assert_eq!(rig.stats.read().unwrap().cycles_abandoned, 1);
}

#[tokio::test]
async fn priced_out_market_trades_nothing() {
    let config = test_config();
    let (alpha, beta, venues) = seeded_venues(dec!(50));
    alpha.set_book(BookBuilder::new("alpha", "yes").ask(dec!(0.55), dec!(50)).build());
    beta.set_book(BookBuilder::new("beta", "no").ask(dec!(0.55), dec!(50)).build());
    let (engine, rig) = engine_with(config, venues);

    engine.run_cycle().await;

    assert!(alpha.placed_orders().is_empty());
    assert!(rig.ledger.entries().is_empty());
    let stats = rig.stats.read().unwrap().clone();
    assert_eq!(stats.detection_cycles, 1);
    assert_eq!(stats.opportunities_detected, 0);
    assert_eq!(stats.cycles_abandoned, 0);
}

#[tokio::test]
async fn cooling_market_is_skipped_without_fetching() {
    let config = test_config();
    let (alpha, _beta, venues) = seeded_venues(dec!(50));
    let (engine, rig) = engine_with(config, venues);

    engine.run_cycle().await;
    engine.drain().await;
    assert_eq!(rig.ledger.entries().len(), 1);

    // Market is cooling down; the next cycle must not even fetch books. If
    // it did, the armed fetch failure would show up as an abandoned cycle.
    alpha.fail_fetch("yes", "connection reset");
    engine.run_cycle().await;
    engine.drain().await;
    assert_eq!(rig.ledger.entries().len(), 1);
    assert_eq!(rig.stats.read().unwrap().cycles_abandoned, 0);
}

#[tokio::test]
async fn slow_attempt_does_not_stall_the_cycle() {
    let config = test_config();
    let market = two_leg_market(FillMode::AggressiveLimit);
    let (_alpha, beta, venues) = seeded_venues(dec!(50));
    // The resting leg keeps the attempt in flight across several poll
    // intervals.
    beta.script_order("no", OrderScript::RestThenFill { polls: 2 });
    let rig = rig(config.clone(), venues.clone());
    let engine = Engine::new(
        config,
        vec![market],
        venues,
        rig.coordinator.clone(),
        rig.stats.clone(),
    )
    .unwrap();

    engine.run_cycle().await;
    // Give the spawned attempt a moment to start without letting it finish.
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;

    // The cycle has already returned while the attempt is mid-flight.
    assert_eq!(rig.stats.read().unwrap().attempts_started, 1);
    assert!(rig.ledger.entries().is_empty());

    engine.drain().await;
    let entries = rig.ledger.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].resolution, Resolution::Settled);
}

#[tokio::test]
async fn scan_reports_without_trading() {
    let config = test_config();
    let (alpha, _beta, venues) = seeded_venues(dec!(50));
    let (engine, rig) = engine_with(config, venues);

    let results = engine.scan_once().await;
    assert_eq!(results.len(), 1);
    let (market_id, opportunity) = &results[0];
    assert_eq!(market_id, "event-1");
    let opportunity = opportunity.as_ref().unwrap();
    assert_eq!(opportunity.unit_cost, dec!(0.80));

    assert!(alpha.placed_orders().is_empty());
    assert!(rig.ledger.entries().is_empty());
}
