//! Room Coordinator
//!
//! Hosts room actors and serves health and metrics endpoints.
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment
//! 2. Initialize tracing (plain or JSON)
//! 3. Initialize Prometheus metrics recorder
//! 4. Build registry, message bus and collaborators
//! 5. Initialize actor system (`CoordinatorActorHandle`)
//! 6. Start health HTTP server (liveness, readiness, status, metrics)
//! 7. Wait for shutdown signal

#![warn(clippy::pedantic)]
#![allow(clippy::too_many_lines)] // main.rs orchestrates startup, naturally longer

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use room_coordinator::actors::{
    ActorMetrics, CoordinatorActorHandle, CoordinatorMetrics, CoordinatorSettings, RoomServices,
    RoomSettings,
};
use room_coordinator::bus::ChannelMessageBus;
use room_coordinator::collaborators::standalone::{EmptyAppointments, NoCollaboration, NoRecording};
use room_coordinator::config::Config;
use room_coordinator::observability::{health_router, init_metrics_recorder, HealthState};
use room_coordinator::policy::DefaultRightsPolicy;
use room_coordinator::registry::InMemoryClientRegistry;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// How long room actors get to stop on shutdown.
const SHUTDOWN_DEADLINE: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env()?;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "room_coordinator={},tower_http=debug",
            config.observability.log_level
        )
        .into()
    });
    if config.observability.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    info!(
        coordinator_id = %config.coordinator_id,
        health_bind_address = %config.health_bind_address,
        max_rooms = config.max_rooms,
        rights_request_ttl_secs = config.rights_request_ttl.map(|ttl| ttl.as_secs()),
        "Starting Room Coordinator"
    );

    // Must happen before any metrics are recorded
    let prometheus_handle = init_metrics_recorder().map_err(|e| {
        error!(error = %e, "Failed to install Prometheus metrics recorder");
        e
    })?;

    let health_state = Arc::new(HealthState::new());
    let coordinator_metrics = CoordinatorMetrics::new();
    let actor_metrics = ActorMetrics::new();

    let services = RoomServices {
        registry: Arc::new(InMemoryClientRegistry::new()),
        bus: Arc::new(ChannelMessageBus::default()),
        recording: Arc::new(NoRecording),
        appointments: Arc::new(EmptyAppointments),
        oracle: Arc::new(DefaultRightsPolicy),
        collaboration: Arc::new(NoCollaboration),
    };
    let settings = CoordinatorSettings {
        coordinator_id: config.coordinator_id.clone(),
        max_rooms: config.max_rooms,
        room: RoomSettings {
            date_format: config.date_format.clone(),
            rights_request_ttl: config.rights_request_ttl,
        },
    };

    let coordinator = CoordinatorActorHandle::new(
        settings,
        services,
        Arc::clone(&actor_metrics),
        Arc::clone(&coordinator_metrics),
    );
    info!("Actor system initialized");

    let shutdown_token = coordinator.child_token();

    let health_addr: SocketAddr = config.health_bind_address.parse().map_err(|e| {
        error!(error = %e, addr = %config.health_bind_address, "Invalid health bind address");
        format!("Invalid health bind address: {e}")
    })?;

    let metrics_router = Router::new().route(
        "/metrics",
        axum::routing::get(move || {
            let handle = prometheus_handle.clone();
            async move { handle.render() }
        }),
    );
    let app = health_router(Arc::clone(&health_state), Arc::clone(&coordinator_metrics))
        .merge(metrics_router)
        .layer(TraceLayer::new_for_http());

    // Bind before spawning to fail fast on bind errors
    let listener = tokio::net::TcpListener::bind(health_addr)
        .await
        .map_err(|e| {
            error!(error = %e, addr = %health_addr, "Failed to bind health server");
            format!("Failed to bind health server to {health_addr}: {e}")
        })?;

    let health_shutdown_token = shutdown_token.child_token();
    tokio::spawn(async move {
        info!(addr = %health_addr, "Health server starting");
        let server = axum::serve(listener, app).with_graceful_shutdown(async move {
            health_shutdown_token.cancelled().await;
            info!("Health server shutting down");
        });
        if let Err(e) = server.await {
            error!(error = %e, "Health server failed");
        }
    });

    health_state.set_ready();
    info!("Room Coordinator running - press Ctrl+C to shutdown");
    shutdown_signal().await;

    info!("Shutdown signal received, initiating graceful shutdown...");

    // Stop receiving traffic before rooms go away
    health_state.set_not_ready();

    match coordinator.get_status().await {
        Ok(status) => info!(
            rooms = status.room_count,
            participants = status.participant_count,
            "Draining rooms"
        ),
        Err(e) => warn!(error = %e, "Failed to read coordinator status"),
    }

    if let Err(e) = coordinator.shutdown(SHUTDOWN_DEADLINE).await {
        warn!(error = %e, "Actor system shutdown error");
    }
    shutdown_token.cancel();

    info!(
        rooms_left_open = actor_metrics.room_count(),
        messages_processed = actor_metrics.messages_processed(),
        dispatch_drops = actor_metrics.dispatch_drop_count(),
        "Room Coordinator shutdown complete"
    );
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
///
/// # Panics
///
/// Panics if signal handlers cannot be installed. This is acceptable because
/// without signal handlers, we cannot gracefully shut down the service.
async fn shutdown_signal() {
    let ctrl_c = async {
        #[expect(
            clippy::expect_used,
            reason = "Signal handler installation is critical - panic is appropriate if it fails"
        )]
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        #[expect(
            clippy::expect_used,
            reason = "Signal handler installation is critical - panic is appropriate if it fails"
        )]
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
