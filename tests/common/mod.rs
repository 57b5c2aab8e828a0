//! Shared harness for integration tests.

use std::sync::Arc;

use rust_decimal_macros::dec;
use time::OffsetDateTime;

use basket_arb::basket::{Basket, FillMode, Leg, Market, Side};
use basket_arb::config::Config;
use basket_arb::detect::{solve_size, BookMap, Detector, Opportunity, SizeBounds, SizedPlan};
use basket_arb::exec::{shared_stats, Coordinator, SharedStats};
use basket_arb::ledger::MemoryLedger;
use basket_arb::notify::RecordingNotifier;
use basket_arb::venue::{BookBuilder, MockVenue, VenueAdapter, VenueMap};

/// Config with timeouts short enough for fast tests.
pub fn test_config() -> Config {
    Config {
        min_profit_threshold: dec!(0.005),
        min_position_size: dec!(5),
        max_position_size: dec!(1000),
        max_notional_per_attempt: dec!(100000),
        freshness_window_ms: 2_000,
        balance_margin: dec!(1.2),
        aggressive_markup: dec!(0.01),
        order_timeout_ms: 60,
        status_poll_interval_ms: 10,
        call_timeout_ms: 500,
        cooldown_seconds: 30,
        unwind_retry_count: 3,
        max_unhedged_notional: dec!(100),
        poll_interval_ms: 50,
        topology_file: "baskets.json".to_string(),
        ledger_file: "ledger.jsonl".to_string(),
        port: 0,
        verbose: false,
    }
}

/// Two-leg market: buy `yes` on alpha, buy `no` on beta.
pub fn two_leg_market(beta_mode: FillMode) -> Market {
    let leg = |venue: &str, instrument: &str, fill_mode: FillMode| Leg {
        venue: venue.to_string(),
        instrument: instrument.to_string(),
        side: Side::Buy,
        fee_rate: dec!(0),
        min_notional: dec!(1),
        fill_mode,
    };

    Market {
        id: "event-1".to_string(),
        directions: vec![Basket {
            id: "event-1/a".to_string(),
            legs: vec![
                leg("alpha", "yes", FillMode::FillOrKill),
                leg("beta", "no", beta_mode),
            ],
        }],
    }
}

/// Mock venues seeded with 0.40-priced books of the given depth on both legs.
pub fn seeded_venues(depth: rust_decimal::Decimal) -> (Arc<MockVenue>, Arc<MockVenue>, VenueMap) {
    let alpha = Arc::new(MockVenue::new("alpha"));
    alpha.set_book(BookBuilder::new("alpha", "yes").ask(dec!(0.40), depth).build());
    let beta = Arc::new(MockVenue::new("beta"));
    beta.set_book(BookBuilder::new("beta", "no").ask(dec!(0.40), depth).build());

    let mut venues = VenueMap::new();
    venues.insert(
        "alpha".to_string(),
        Arc::clone(&alpha) as Arc<dyn VenueAdapter>,
    );
    venues.insert(
        "beta".to_string(),
        Arc::clone(&beta) as Arc<dyn VenueAdapter>,
    );
    (alpha, beta, venues)
}

/// Snapshot map matching [`seeded_venues`].
pub fn seeded_books(depth: rust_decimal::Decimal) -> BookMap {
    let mut books = BookMap::new();
    books.insert(
        ("alpha".to_string(), "yes".to_string()),
        BookBuilder::new("alpha", "yes").ask(dec!(0.40), depth).build(),
    );
    books.insert(
        ("beta".to_string(), "no".to_string()),
        BookBuilder::new("beta", "no").ask(dec!(0.40), depth).build(),
    );
    books
}

/// Run detection and sizing the way the engine loop does.
pub fn detect_and_size(market: &Market, books: &BookMap, config: &Config) -> (Opportunity, SizedPlan) {
    let detector = Detector::new(config.min_profit_threshold, config.freshness_window_ms);
    let opportunity = detector
        .evaluate_market(market, books, OffsetDateTime::now_utc())
        .expect("evaluation succeeds")
        .expect("opportunity exists");

    let bounds = SizeBounds {
        min_size: config.min_position_size,
        max_size: config.max_position_size,
        max_notional: config.max_notional_per_attempt,
        min_profit_rate: config.min_profit_threshold,
    };
    let plan = solve_size(&opportunity, &bounds)
        .expect("sizing succeeds")
        .expect("viable size exists");
    (opportunity, plan)
}

/// Test rig around a coordinator with recording ledger and notifier.
pub struct Rig {
    pub coordinator: Arc<Coordinator>,
    pub ledger: Arc<MemoryLedger>,
    pub notifier: Arc<RecordingNotifier>,
    pub stats: SharedStats,
}

/// Build a coordinator over the given venues.
pub fn rig(config: Config, venues: VenueMap) -> Rig {
    let ledger = Arc::new(MemoryLedger::new());
    let notifier = Arc::new(RecordingNotifier::new());
    let stats = shared_stats();
    let coordinator = Arc::new(Coordinator::new(
        config,
        venues,
        ledger.clone(),
        notifier.clone(),
        stats.clone(),
    ));
    Rig {
        coordinator,
        ledger,
        notifier,
        stats,
    }
}
