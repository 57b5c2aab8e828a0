//! HTTP API handlers.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::exec::{shared_stats, EngineStats, SharedStats};

/// Application state shared with handlers.
#[derive(Clone)]
pub struct AppState {
    /// Whether the engine is ready to trade.
    pub ready: Arc<std::sync::atomic::AtomicBool>,
    /// Number of markets under watch.
    pub market_count: usize,
    /// Engine stats.
    pub stats: SharedStats,
}

impl AppState {
    /// Create new app state.
    pub fn new(market_count: usize, stats: SharedStats) -> Self {
        Self {
            ready: Arc::new(std::sync::atomic::AtomicBool::new(false)),
            market_count,
            stats,
        }
    }

    /// Set ready state.
    pub fn set_ready(&self, ready: bool) {
        self.ready
            .store(ready, std::sync::atomic::Ordering::SeqCst);
    }

    /// Check if ready.
    pub fn is_ready(&self) -> bool {
        self.ready.load(std::sync::atomic::Ordering::SeqCst)
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(0, shared_stats())
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Status: "ok".
    pub status: &'static str,
}

/// Readiness check response.
#[derive(Debug, Serialize)]
pub struct ReadyResponse {
    /// Whether the engine is ready.
    pub ready: bool,
    /// Number of markets under watch.
    pub markets: usize,
}

/// Status response.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    /// Service status.
    pub status: &'static str,
    /// Number of markets under watch.
    pub markets: usize,
    /// Engine statistics.
    pub stats: EngineStats,
}

/// Health check handler - always returns 200.
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse { status: "ok" })
}

/// Readiness check handler - returns 200 if ready, 503 otherwise.
pub async fn ready(State(state): State<AppState>) -> impl IntoResponse {
    let is_ready = state.is_ready();
    let response = ReadyResponse {
        ready: is_ready,
        markets: state.market_count,
    };

    if is_ready {
        (StatusCode::OK, Json(response))
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(response))
    }
}

/// Status handler - returns engine status and statistics.
pub async fn status(State(state): State<AppState>) -> impl IntoResponse {
    let stats = state.stats.read().unwrap().clone();
    let status = if state.is_ready() { "running" } else { "starting" };

    Json(StatusResponse {
        status,
        markets: state.market_count,
        stats,
    })
}
