//! Health and status endpoints for the Room Coordinator.
//!
//! - `GET /health` - Liveness probe
//! - `GET /ready` - Readiness probe (503 while starting up or draining)
//! - `GET /status` - JSON room and participant counts
//!
//! The `/metrics` endpoint is merged in by `main` from the Prometheus handle.

use crate::actors::metrics::CoordinatorMetrics;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Liveness and readiness flags for Kubernetes probes.
#[derive(Debug)]
pub struct HealthState {
    live: AtomicBool,
    /// True while the coordinator accepts new rooms.
    ready: AtomicBool,
}

impl Default for HealthState {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthState {
    /// Create a new health state (live=true, ready=false).
    #[must_use]
    pub fn new() -> Self {
        Self {
            live: AtomicBool::new(true),
            ready: AtomicBool::new(false),
        }
    }

    pub fn set_ready(&self) {
        self.ready.store(true, Ordering::SeqCst);
    }

    /// Mark the service as not ready (e.g., during shutdown).
    pub fn set_not_ready(&self) {
        self.ready.store(false, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }
}

/// Shared state behind the health router.
#[derive(Clone)]
pub struct HealthContext {
    pub health: Arc<HealthState>,
    pub metrics: Arc<CoordinatorMetrics>,
}

/// Body of `GET /status`.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct StatusBody {
    pub ready: bool,
    pub rooms: u32,
    pub participants: u32,
}

/// Create the health router with liveness, readiness and status endpoints.
pub fn health_router(health: Arc<HealthState>, metrics: Arc<CoordinatorMetrics>) -> Router {
    Router::new()
        .route("/health", get(liveness_handler))
        .route("/ready", get(readiness_handler))
        .route("/status", get(status_handler))
        .with_state(HealthContext { health, metrics })
}

async fn liveness_handler(State(ctx): State<HealthContext>) -> StatusCode {
    if ctx.health.is_live() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

async fn readiness_handler(State(ctx): State<HealthContext>) -> StatusCode {
    if ctx.health.is_ready() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

async fn status_handler(State(ctx): State<HealthContext>) -> Json<StatusBody> {
    let snapshot = ctx.metrics.snapshot();
    Json(StatusBody {
        ready: ctx.health.is_ready(),
        rooms: snapshot.rooms,
        participants: snapshot.participants,
    })
}
