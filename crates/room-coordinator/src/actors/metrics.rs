//! Actor metrics and mailbox monitoring.
//!
//! Mailbox depth is the number of messages still queued when an actor takes
//! the next one off its channel. Thresholds per actor type:
//!
//! | Actor Type  | Capacity | Normal | Warning | Critical |
//! |-------------|----------|--------|---------|----------|
//! | Room        | 500      | < 100  | 100-400 | > 400    |
//! | Coordinator | 1000     | < 50   | 50-200  | > 200    |
//!
//! Depth changes are mirrored to `rc_actor_mailbox_depth`.

use crate::observability::metrics as prom;

use std::sync::atomic::{AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Mailbox depth thresholds for room actors.
pub const ROOM_MAILBOX_NORMAL: usize = 100;
pub const ROOM_MAILBOX_WARNING: usize = 400;

/// Mailbox depth thresholds for the coordinator actor.
pub const COORDINATOR_MAILBOX_NORMAL: usize = 50;
pub const COORDINATOR_MAILBOX_WARNING: usize = 200;

/// Actor type for metrics labeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorType {
    /// `CoordinatorActor` (singleton).
    Coordinator,
    /// `RoomActor` (one per open room).
    Room,
}

impl ActorType {
    /// Returns the actor type as a string for metric labels.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            ActorType::Coordinator => "coordinator",
            ActorType::Room => "room",
        }
    }

    /// Returns the warning threshold for this actor type.
    #[must_use]
    pub const fn warning_threshold(&self) -> usize {
        match self {
            ActorType::Coordinator => COORDINATOR_MAILBOX_WARNING,
            ActorType::Room => ROOM_MAILBOX_WARNING,
        }
    }

    /// Returns the normal threshold for this actor type.
    #[must_use]
    pub const fn normal_threshold(&self) -> usize {
        match self {
            ActorType::Coordinator => COORDINATOR_MAILBOX_NORMAL,
            ActorType::Room => ROOM_MAILBOX_NORMAL,
        }
    }

    const fn level_for(&self, depth: usize) -> MailboxLevel {
        if depth > self.warning_threshold() {
            MailboxLevel::Critical
        } else if depth > self.normal_threshold() {
            MailboxLevel::Warning
        } else {
            MailboxLevel::Normal
        }
    }
}

/// Mailbox depth level for alerting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MailboxLevel {
    /// Below normal threshold.
    Normal,
    /// Between normal and warning thresholds.
    Warning,
    /// Above warning threshold.
    Critical,
}

/// Mailbox monitor for tracking queue depth and emitting metrics.
#[derive(Debug)]
pub struct MailboxMonitor {
    actor_type: ActorType,
    /// Actor identifier (room id, coordinator id).
    actor_id: String,
    depth: AtomicUsize,
    /// Highest depth observed over the actor's lifetime.
    peak_depth: AtomicUsize,
    messages_processed: AtomicU64,
}

impl MailboxMonitor {
    /// Create a new mailbox monitor for the given actor.
    #[must_use]
    pub fn new(actor_type: ActorType, actor_id: impl Into<String>) -> Self {
        Self {
            actor_type,
            actor_id: actor_id.into(),
            depth: AtomicUsize::new(0),
            peak_depth: AtomicUsize::new(0),
            messages_processed: AtomicU64::new(0),
        }
    }

    /// Record the backlog seen when a message is taken off the mailbox.
    ///
    /// `queued` is the channel length after the receive.
    pub fn record_receive(&self, queued: usize) {
        let previous = self.depth.swap(queued, Ordering::Relaxed);
        self.peak_depth.fetch_max(queued, Ordering::Relaxed);
        prom::set_actor_mailbox_depth(self.actor_type.as_str(), queued);

        let level = self.actor_type.level_for(queued);
        if level == self.actor_type.level_for(previous) {
            return;
        }
        match level {
            MailboxLevel::Critical => warn!(
                target: "rc.actor.mailbox",
                actor_type = self.actor_type.as_str(),
                actor_id = %self.actor_id,
                depth = queued,
                threshold = self.actor_type.warning_threshold(),
                "Mailbox depth critical"
            ),
            MailboxLevel::Warning => debug!(
                target: "rc.actor.mailbox",
                actor_type = self.actor_type.as_str(),
                actor_id = %self.actor_id,
                depth = queued,
                "Mailbox depth elevated"
            ),
            MailboxLevel::Normal => debug!(
                target: "rc.actor.mailbox",
                actor_type = self.actor_type.as_str(),
                actor_id = %self.actor_id,
                depth = queued,
                "Mailbox depth back to normal"
            ),
        }
    }

    /// Record a processed message and the backlog left behind it.
    pub fn record_processed(&self, queued: usize) {
        self.messages_processed.fetch_add(1, Ordering::Relaxed);
        self.depth.store(queued, Ordering::Relaxed);
        prom::set_actor_mailbox_depth(self.actor_type.as_str(), queued);
    }

    #[must_use]
    pub fn current_depth(&self) -> usize {
        self.depth.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn peak_depth(&self) -> usize {
        self.peak_depth.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn messages_processed(&self) -> u64 {
        self.messages_processed.load(Ordering::Relaxed)
    }
}

/// Room and participant gauges shared between room actors and the
/// coordinator status report.
///
/// All fields are atomic for lock-free concurrent access.
#[derive(Debug, Default)]
pub struct CoordinatorMetrics {
    current_rooms: AtomicU32,
    current_participants: AtomicU32,
}

/// Snapshot of coordinator metrics at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinatorMetricsSnapshot {
    pub rooms: u32,
    pub participants: u32,
}

impl CoordinatorMetrics {
    /// Create a new shared metrics instance.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_rooms(&self, count: u32) {
        self.current_rooms.store(count, Ordering::SeqCst);
        prom::set_rooms_active(u64::from(count));
    }

    #[must_use]
    pub fn participants(&self) -> u32 {
        self.current_participants.load(Ordering::SeqCst)
    }

    /// Increment the participant count atomically.
    pub fn increment_participants(&self) {
        let count = self.current_participants.fetch_add(1, Ordering::SeqCst) + 1;
        prom::set_participants_active(u64::from(count));
    }

    /// Decrement the participant count atomically, saturating at zero.
    pub fn decrement_participants(&self) {
        let previous = self
            .current_participants
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                Some(n.saturating_sub(1))
            })
            .unwrap_or(0);
        prom::set_participants_active(u64::from(previous.saturating_sub(1)));
    }

    /// Take a snapshot of current metrics.
    #[must_use]
    pub fn snapshot(&self) -> CoordinatorMetricsSnapshot {
        CoordinatorMetricsSnapshot {
            rooms: self.current_rooms.load(Ordering::SeqCst),
            participants: self.current_participants.load(Ordering::SeqCst),
        }
    }
}

/// Aggregated metrics for the actor system.
#[derive(Debug, Default)]
pub struct ActorMetrics {
    /// Total rooms currently open.
    pub active_rooms: AtomicUsize,
    /// Total actor panics (indicates bugs).
    pub actor_panics: AtomicU64,
    /// Total messages processed across all actors.
    pub total_messages_processed: AtomicU64,
    /// Room messages the dispatcher dropped.
    pub dispatch_drops: AtomicU64,
}

impl ActorMetrics {
    /// Create a new shared metrics instance.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn room_opened(&self) {
        self.active_rooms.fetch_add(1, Ordering::Relaxed);
    }

    pub fn room_removed(&self) {
        self.active_rooms.fetch_sub(1, Ordering::Relaxed);
    }

    /// Record an actor panic.
    pub fn record_panic(&self, actor_type: ActorType) {
        self.actor_panics.fetch_add(1, Ordering::Relaxed);
        prom::record_actor_panic(actor_type.as_str());
        tracing::error!(
            target: "rc.actor.panic",
            actor_type = actor_type.as_str(),
            total_panics = self.actor_panics.load(Ordering::Relaxed),
            "Actor panic detected - indicates bug, investigation required"
        );
    }

    pub fn record_message_processed(&self) {
        self.total_messages_processed
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dispatch_drop(&self) {
        self.dispatch_drops.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn room_count(&self) -> usize {
        self.active_rooms.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn messages_processed(&self) -> u64 {
        self.total_messages_processed.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn dispatch_drop_count(&self) -> u64 {
        self.dispatch_drops.load(Ordering::Relaxed)
    }
}
