//! Mock collaborators for testing.

use super::{
    AppointmentDirectory, BusError, CollaborationHub, MessageBus, RecordingService,
};
use crate::errors::RoomError;
use crate::events::Notification;
use crate::participant::Participant;
use crate::room::Appointment;

use common::types::{AppointmentId, ParticipantUid, RoomId};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

/// One captured bus call.
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    Room(RoomId, Notification),
    Participant(ParticipantUid, Notification),
}

impl Delivery {
    #[must_use]
    pub fn notification(&self) -> &Notification {
        match self {
            Delivery::Room(_, n) | Delivery::Participant(_, n) => n,
        }
    }
}

/// Message bus that records every send in order.
#[derive(Debug, Default)]
pub struct CapturingBus {
    sent: Mutex<Vec<Delivery>>,
    unreachable: Mutex<HashSet<ParticipantUid>>,
}

impl CapturingBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make sends to `uid` fail with `BusError::Closed`.
    pub fn disconnect(&self, uid: ParticipantUid) {
        self.unreachable
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(uid);
    }

    #[must_use]
    pub fn deliveries(&self) -> Vec<Delivery> {
        self.sent
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// Notifications addressed directly to `uid`, in send order.
    #[must_use]
    pub fn sent_to(&self, uid: ParticipantUid) -> Vec<Notification> {
        self.deliveries()
            .into_iter()
            .filter_map(|d| match d {
                Delivery::Participant(to, n) if to == uid => Some(n),
                _ => None,
            })
            .collect()
    }

    /// Take and clear everything captured so far.
    pub fn drain(&self) -> Vec<Delivery> {
        std::mem::take(
            &mut *self
                .sent
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner),
        )
    }
}

impl MessageBus for CapturingBus {
    fn send_to_room(&self, room_id: RoomId, notification: &Notification) -> Result<(), BusError> {
        self.sent
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(Delivery::Room(room_id, notification.clone()));
        Ok(())
    }

    fn send_to_participant(
        &self,
        uid: ParticipantUid,
        notification: &Notification,
    ) -> Result<(), BusError> {
        if self
            .unreachable
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .contains(&uid)
        {
            return Err(BusError::Closed(uid.to_string()));
        }
        self.sent
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(Delivery::Participant(uid, notification.clone()));
        Ok(())
    }
}

/// Recording service with fixed answers and call counting.
#[derive(Debug)]
pub struct MockRecordingService {
    recording: AtomicBool,
    recording_allowed: bool,
    screen_share_allowed: bool,
    rights_updated_calls: AtomicUsize,
}

impl Default for MockRecordingService {
    fn default() -> Self {
        Self::idle()
    }
}

impl MockRecordingService {
    /// Not recording; nobody may record or share.
    #[must_use]
    pub fn idle() -> Self {
        Self {
            recording: AtomicBool::new(false),
            recording_allowed: false,
            screen_share_allowed: false,
            rights_updated_calls: AtomicUsize::new(0),
        }
    }

    /// Not recording; everyone may record and share.
    #[must_use]
    pub fn permissive() -> Self {
        Self {
            recording_allowed: true,
            screen_share_allowed: true,
            ..Self::idle()
        }
    }

    pub fn set_recording(&self, recording: bool) {
        self.recording.store(recording, Ordering::SeqCst);
    }

    #[must_use]
    pub fn rights_updated_calls(&self) -> usize {
        self.rights_updated_calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl RecordingService for MockRecordingService {
    async fn is_recording(&self, _room_id: RoomId) -> bool {
        self.recording.load(Ordering::SeqCst)
    }

    async fn recording_allowed(&self, participant: &Participant) -> bool {
        self.recording_allowed && participant.is_moderator()
    }

    async fn screen_share_allowed(&self, _participant: &Participant) -> bool {
        self.screen_share_allowed
    }

    async fn rights_updated(&self, _participant: &Participant) {
        self.rights_updated_calls.fetch_add(1, Ordering::SeqCst);
    }
}

/// In-memory appointment directory.
#[derive(Debug, Default)]
pub struct MockAppointments {
    appointments: Mutex<HashMap<AppointmentId, Appointment>>,
    failing: bool,
}

impl MockAppointments {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Directory whose lookups always fail.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with(self, appointment: Appointment) -> Self {
        self.appointments
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(appointment.id, appointment);
        self
    }
}

#[async_trait::async_trait]
impl AppointmentDirectory for MockAppointments {
    async fn find(&self, id: AppointmentId) -> Result<Option<Appointment>, RoomError> {
        if self.failing {
            return Err(RoomError::Collaborator(
                "mock appointment directory unavailable".to_string(),
            ));
        }
        Ok(self
            .appointments
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(&id)
            .cloned())
    }
}

/// Collaboration hub with a fixed poll summary that records resyncs.
#[derive(Debug, Default)]
pub struct MockCollaboration {
    poll: Option<serde_json::Value>,
    resyncs: Mutex<Vec<(RoomId, ParticipantUid)>>,
}

impl MockCollaboration {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_poll(poll: serde_json::Value) -> Self {
        Self {
            poll: Some(poll),
            resyncs: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn resyncs(&self) -> Vec<(RoomId, ParticipantUid)> {
        self.resyncs
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

impl CollaborationHub for MockCollaboration {
    fn quick_poll_summary(&self, _room_id: RoomId) -> Option<serde_json::Value> {
        self.poll.clone()
    }

    fn resync(&self, room_id: RoomId, uid: ParticipantUid) {
        self.resyncs
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push((room_id, uid));
    }
}
