//! Observability for the Room Coordinator.
//!
//! All instrumentation uses `#[instrument(skip_all)]` with explicit field
//! allow-listing. Display names never appear in spans or metric labels.
//!
//! | Metric | Type | Labels |
//! |--------|------|--------|
//! | `rc_rooms_active` | Gauge | none |
//! | `rc_participants_active` | Gauge | none |
//! | `rc_actor_mailbox_depth` | Gauge | `actor_type` |
//! | `rc_admissions_total` | Counter | `outcome`, `reason` |
//! | `rc_admission_duration_seconds` | Histogram | none |
//! | `rc_dispatch_latency_seconds` | Histogram | `event` |
//! | `rc_messages_dropped_total` | Counter | `reason` |
//! | `rc_bus_delivery_failures_total` | Counter | `audience` |
//! | `rc_rights_requests_total` | Counter | `right`, `outcome` |
//! | `rc_actor_panics_total` | Counter | `actor_type` |

pub mod health;
pub mod metrics;

pub use health::{health_router, HealthState};
pub use metrics::init_metrics_recorder;
