//! Basket arbitrage engine entry point.

use std::net::SocketAddr;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use basket_arb::api::{create_router, AppState};
use basket_arb::basket::load_topology;
use basket_arb::config::Config;
use basket_arb::exec::{shared_stats, Coordinator};
use basket_arb::ledger::{open_exposure, read_entries, JsonlLedger, MemoryLedger, Resolution};
use basket_arb::metrics;
use basket_arb::notify::LogNotifier;
use basket_arb::scheduler::Engine;
use basket_arb::utils::shutdown_signal;
use basket_arb::venue::{MockVenue, VenueMap};

/// Cross-venue basket arbitrage engine.
#[derive(Parser, Debug)]
#[command(name = "basket-arb")]
#[command(about = "Risk-free basket arbitrage across complementary-outcome venues")]
#[command(version)]
struct Args {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the engine loop (default). Trades against in-memory paper venues
    /// until real adapters are wired in.
    Run {
        /// HTTP server port for health/status.
        #[arg(short, long)]
        port: Option<u16>,

        /// Prometheus scrape port. Disabled when omitted.
        #[arg(long)]
        metrics_port: Option<u16>,
    },

    /// Check configuration and topology validity.
    CheckConfig,

    /// Evaluate every market once and print the results without trading.
    Scan,

    /// Summarize the exposure ledger.
    ShowLedger {
        /// Ledger file to read; defaults to the configured path.
        #[arg(long)]
        file: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = if args.verbose {
        EnvFilter::new("basket_arb=debug,info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    metrics::init_metrics();

    match args.command {
        Some(Command::CheckConfig) => cmd_check_config().await,
        Some(Command::Scan) => cmd_scan().await,
        Some(Command::ShowLedger { file }) => cmd_show_ledger(file).await,
        Some(Command::Run { port, metrics_port }) => cmd_run(port, metrics_port).await,
        None => cmd_run(None, None).await,
    }
}

/// Check configuration and topology validity.
async fn cmd_check_config() -> anyhow::Result<()> {
    println!("======================================================================");
    println!("BASKET ARB ENGINE - CONFIGURATION CHECK");
    println!("======================================================================");

    print!("Loading configuration... ");
    let config = match Config::load() {
        Ok(c) => {
            println!("OK");
            c
        }
        Err(e) => {
            println!("FAILED");
            println!("  Error: {}", e);
            return Err(anyhow::anyhow!("Configuration load failed"));
        }
    };

    print!("Validating configuration... ");
    match config.validate() {
        Ok(()) => println!("OK"),
        Err(e) => {
            println!("FAILED");
            println!("  Error: {}", e);
            return Err(anyhow::anyhow!("Configuration validation failed"));
        }
    }

    print!("Loading topology {} ... ", config.topology_file);
    let markets = match load_topology(&config.topology_file) {
        Ok(markets) => {
            println!("OK");
            markets
        }
        Err(e) => {
            println!("FAILED");
            println!("  Error: {}", e);
            return Err(anyhow::anyhow!("Topology load failed"));
        }
    };

    println!("----------------------------------------------------------------------");
    println!("Configuration Summary:");
    println!("  Min Profit Threshold: {}", config.min_profit_threshold);
    println!(
        "  Position Size: {} - {} units",
        config.min_position_size, config.max_position_size
    );
    println!("  Max Notional/Attempt: {}", config.max_notional_per_attempt);
    println!("  Freshness Window: {}ms", config.freshness_window_ms);
    println!("  Order Timeout: {}ms", config.order_timeout_ms);
    println!("  Cooldown: {}s", config.cooldown_seconds);
    println!("  Unwind Retries: {}", config.unwind_retry_count);
    println!("  Ledger File: {}", config.ledger_file);
    println!("  Markets: {}", markets.len());
    for market in &markets {
        println!(
            "    {} ({} directions, {} books)",
            market.id,
            market.directions.len(),
            market.book_keys().len()
        );
    }
    println!("======================================================================");
    println!("CONFIGURATION CHECK PASSED");
    println!("======================================================================");

    Ok(())
}

/// Evaluate every market once and print the results.
async fn cmd_scan() -> anyhow::Result<()> {
    let config = Config::load()?;
    config.validate()?;
    let markets = load_topology(&config.topology_file)?;
    let venues = build_paper_venues(&markets);

    let stats = shared_stats();
    let ledger = Arc::new(MemoryLedger::new());
    let notifier = Arc::new(LogNotifier);
    let coordinator = Arc::new(Coordinator::new(
        config.clone(),
        venues.clone(),
        ledger,
        notifier,
        stats.clone(),
    ));
    let engine = Engine::new(config, markets, venues, coordinator, stats)?;

    println!("Scanning markets...");
    for (market_id, opportunity) in engine.scan_once().await {
        match opportunity {
            Some(opp) => println!(
                "  {}: {} unit_cost={} profit_rate={}",
                market_id, opp.basket.id, opp.unit_cost, opp.profit_rate
            ),
            None => println!("  {}: no opportunity", market_id),
        }
    }

    Ok(())
}

/// Summarize the exposure ledger.
async fn cmd_show_ledger(file: Option<String>) -> anyhow::Result<()> {
    let path = match file {
        Some(path) => path,
        None => Config::load()?.ledger_file,
    };

    let entries = read_entries(&path)?;
    println!("======================================================================");
    println!("EXPOSURE LEDGER - {}", path);
    println!("======================================================================");
    println!("Entries: {}", entries.len());

    let count = |r: Resolution| entries.iter().filter(|e| e.resolution == r).count();
    println!("  Settled:       {}", count(Resolution::Settled));
    println!("  All failed:    {}", count(Resolution::AllFailed));
    println!("  Unwound:       {}", count(Resolution::Unwound));
    println!("  Unwind failed: {}", count(Resolution::UnwindFailed));

    let exposure = open_exposure(&entries);
    if exposure.is_empty() {
        println!("No residual exposure.");
    } else {
        println!("Residual exposure:");
        for ((venue, instrument), size) in exposure {
            println!("  {}/{}: {}", venue, instrument, size);
        }
    }
    println!("======================================================================");

    Ok(())
}

/// Run the engine loop.
async fn cmd_run(port: Option<u16>, metrics_port: Option<u16>) -> anyhow::Result<()> {
    info!("Loading configuration...");
    let config = Config::load().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Configuration validation failed: {}", e))?;

    let markets = load_topology(&config.topology_file)?;
    info!(
        markets = markets.len(),
        topology = %config.topology_file,
        "topology loaded"
    );

    if let Some(metrics_port) = metrics_port {
        let addr = SocketAddr::from(([0, 0, 0, 0], metrics_port));
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()?;
        info!("Prometheus exporter listening on {}", addr);
    }

    let stats = shared_stats();
    let app_state = AppState::new(markets.len(), stats.clone());

    let http_port = port.unwrap_or(config.port);
    let addr = SocketAddr::from(([0, 0, 0, 0], http_port));
    let listener = TcpListener::bind(addr).await?;
    info!("HTTP server listening on {}", addr);

    let router = create_router(app_state.clone());
    let _server_handle = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await
    });

    let venues = build_paper_venues(&markets);
    let ledger = Arc::new(JsonlLedger::open(&config.ledger_file)?);
    info!(ledger = %config.ledger_file, "exposure ledger open");

    let notifier = Arc::new(LogNotifier);
    let coordinator = Arc::new(Coordinator::new(
        config.clone(),
        venues.clone(),
        ledger,
        notifier,
        stats.clone(),
    ));
    let engine = Engine::new(config, markets, venues, coordinator, stats.clone())?;

    app_state.set_ready(true);
    engine.run(shutdown_signal()).await;
    app_state.set_ready(false);

    let final_stats = stats.read().unwrap().clone();
    info!("========================================");
    info!("ENGINE STOPPED - FINAL SUMMARY");
    info!("========================================");
    info!("Detection cycles: {}", final_stats.detection_cycles);
    info!("Opportunities: {}", final_stats.opportunities_detected);
    info!("Attempts: {}", final_stats.attempts_started);
    info!("  Settled: {}", final_stats.settled);
    info!("  All failed: {}", final_stats.all_failed);
    info!("  Unwound: {}", final_stats.unwound);
    info!("  Unwind failed: {}", final_stats.unwind_failed);
    info!(
        "Expected profit (settled): {}",
        final_stats.expected_profit_settled
    );
    info!(
        "Open exposure notional: {}",
        final_stats.open_exposure_notional
    );
    info!("========================================");

    Ok(())
}

/// One in-memory paper venue per venue named in the topology.
fn build_paper_venues(markets: &[basket_arb::basket::Market]) -> VenueMap {
    let mut venues = VenueMap::new();
    for market in markets {
        for (venue, _) in market.book_keys() {
            venues
                .entry(venue.clone())
                .or_insert_with(|| {
                    Arc::new(MockVenue::new(&venue)) as Arc<dyn basket_arb::venue::VenueAdapter>
                });
        }
    }
    venues
}
