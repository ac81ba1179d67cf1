//! Metrics definitions for the Room Coordinator.
//!
//! All metrics follow Prometheus naming conventions:
//! - `rc_` prefix for Room Coordinator
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded to prevent cardinality explosion:
//! - `actor_type`: 2 values (coordinator, room)
//! - `event`: bounded by `RoomEvent` variants (~19 values)
//! - `outcome`: 3 values (admitted, gated, denied)
//! - `reason`: bounded by `DropReason` and `DenialReason` variants

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize Prometheus metrics recorder and return the handle
/// for serving metrics via HTTP.
///
/// Must be called before any metrics are recorded. Dispatch latency
/// buckets target a p99 under 10ms since dispatch never leaves the process.
///
/// # Errors
///
/// Returns error if Prometheus recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Prefix("rc_dispatch".to_string()),
            &[
                0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.010, 0.025, 0.050, 0.100,
            ],
        )
        .map_err(|e| format!("Failed to set dispatch latency buckets: {e}"))?
        .set_buckets_for_metric(
            Matcher::Prefix("rc_admission".to_string()),
            &[
                0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000,
            ],
        )
        .map_err(|e| format!("Failed to set admission latency buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus metrics recorder: {e}"))
}

// ============================================================================
// Room & Participant Metrics (Gauges)
// ============================================================================

/// Set the number of open rooms.
///
/// Metric: `rc_rooms_active`
/// Labels: none
pub fn set_rooms_active(count: u64) {
    // u64 to f64 conversion is safe for realistic room counts (< 2^53)
    #[allow(clippy::cast_precision_loss)]
    gauge!("rc_rooms_active").set(count as f64);
}

/// Set the number of registered participants across all rooms.
///
/// Metric: `rc_participants_active`
/// Labels: none
pub fn set_participants_active(count: u64) {
    #[allow(clippy::cast_precision_loss)]
    gauge!("rc_participants_active").set(count as f64);
}

/// Set the mailbox depth for an actor type.
///
/// Metric: `rc_actor_mailbox_depth`
/// Labels: `actor_type` (coordinator, room)
pub fn set_actor_mailbox_depth(actor_type: &str, depth: usize) {
    #[allow(clippy::cast_precision_loss)]
    gauge!("rc_actor_mailbox_depth", "actor_type" => actor_type.to_string()).set(depth as f64);
}

// ============================================================================
// Admission & Dispatch
// ============================================================================

/// Record the result of an admission attempt.
///
/// Metric: `rc_admissions_total`
/// Labels: `outcome` (admitted, gated, denied), `reason` (denial reason or "none")
pub fn record_admission(outcome: &str, reason: &str) {
    counter!("rc_admissions_total",
        "outcome" => outcome.to_string(),
        "reason" => reason.to_string()
    )
    .increment(1);
}

/// Record admission latency, including appointment lookup.
///
/// Metric: `rc_admission_duration_seconds`
/// Labels: none
pub fn record_admission_duration(duration: Duration) {
    histogram!("rc_admission_duration_seconds").record(duration.as_secs_f64());
}

/// Record how long one room message took to dispatch and deliver.
///
/// Metric: `rc_dispatch_latency_seconds`
/// Labels: `event`
pub fn record_dispatch_latency(event: &str, duration: Duration) {
    histogram!("rc_dispatch_latency_seconds", "event" => event.to_string())
        .record(duration.as_secs_f64());
}

/// Record a room message dropped by the dispatcher.
///
/// Metric: `rc_messages_dropped_total`
/// Labels: `reason`
///
/// Unknown-participant drops are expected during disconnect races;
/// sustained `wrong_room` drops indicate a routing bug.
pub fn record_message_dropped(reason: &str) {
    counter!("rc_messages_dropped_total", "reason" => reason.to_string()).increment(1);
}

/// Record a failed message bus delivery.
///
/// Metric: `rc_bus_delivery_failures_total`
/// Labels: `audience` (room, room_except, participant, moderators)
pub fn record_bus_failure(audience: &str) {
    counter!("rc_bus_delivery_failures_total", "audience" => audience.to_string()).increment(1);
}

// ============================================================================
// Rights
// ============================================================================

/// Record a rights request outcome.
///
/// Metric: `rc_rights_requests_total`
/// Labels: `right`, `outcome` (auto_granted, requested, no_moderator, already_held,
/// already_pending, expired)
///
/// Cardinality: 9 rights x 6 outcomes
pub fn record_rights_request(right: &str, outcome: &str) {
    counter!("rc_rights_requests_total",
        "right" => right.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Record an actor panic event.
///
/// Metric: `rc_actor_panics_total`
/// Labels: `actor_type`
///
/// ALERT: Any non-zero value indicates a bug and should trigger investigation.
pub fn record_actor_panic(actor_type: &str) {
    counter!("rc_actor_panics_total", "actor_type" => actor_type.to_string()).increment(1);
}
