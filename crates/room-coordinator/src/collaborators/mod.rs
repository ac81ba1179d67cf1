//! Interfaces of the services the coordinator talks to.
//!
//! Synchronous traits are in-process stores; async traits front services
//! that may sit across the network.

#[cfg(any(test, feature = "test-utils"))]
pub mod mock;
pub mod standalone;

use crate::errors::RoomError;
use crate::events::Notification;
use crate::participant::{Participant, User};
use crate::rights::Right;
use crate::room::{Appointment, Room};

use common::types::{AppointmentId, ParticipantUid, RoomId, SessionId};
use std::collections::BTreeSet;
use thiserror::Error;

/// Authoritative store of connected participants.
///
/// The registry owns canonical participant records. Callers edit a copy and
/// write it back with [`ClientRegistry::update`].
pub trait ClientRegistry: Send + Sync {
    /// Register a participant. Returns the number of participants in its
    /// room afterwards.
    fn add(&self, participant: Participant) -> usize;

    /// Replace the stored record. Returns `false` if the uid is unknown.
    fn update(&self, participant: &Participant) -> bool;

    fn remove(&self, uid: ParticipantUid) -> Option<Participant>;

    fn get(&self, uid: ParticipantUid) -> Option<Participant>;

    fn get_by_session_id(&self, session_id: &SessionId) -> Option<Participant>;

    /// Participants of a room in registration order.
    fn list_by_room(&self, room_id: RoomId) -> Vec<Participant>;

    /// Participants of a room matching `predicate`, in registration order.
    fn list_by_room_where(
        &self,
        room_id: RoomId,
        predicate: &dyn Fn(&Participant) -> bool,
    ) -> Vec<Participant> {
        self.list_by_room(room_id)
            .into_iter()
            .filter(|p| predicate(p))
            .collect()
    }

    fn count_in_room(&self, room_id: RoomId) -> usize {
        self.list_by_room(room_id).len()
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BusError {
    #[error("No subscriber for {0}")]
    NoSubscriber(String),

    #[error("Subscriber channel closed: {0}")]
    Closed(String),

    #[error("Subscriber channel full: {0}")]
    Full(String),

    #[error("Failed to encode notification: {0}")]
    Encode(String),
}

/// Delivers notifications to room subscribers.
pub trait MessageBus: Send + Sync {
    fn send_to_room(&self, room_id: RoomId, notification: &Notification) -> Result<(), BusError>;

    fn send_to_participant(
        &self,
        uid: ParticipantUid,
        notification: &Notification,
    ) -> Result<(), BusError>;
}

/// Recording and stream processing service.
#[async_trait::async_trait]
pub trait RecordingService: Send + Sync {
    async fn is_recording(&self, room_id: RoomId) -> bool;

    async fn recording_allowed(&self, participant: &Participant) -> bool;

    async fn screen_share_allowed(&self, participant: &Participant) -> bool;

    /// Called after a participant's rights changed so streams can be
    /// re-evaluated.
    async fn rights_updated(&self, participant: &Participant);
}

/// Lookup of scheduled appointments.
#[async_trait::async_trait]
pub trait AppointmentDirectory: Send + Sync {
    async fn find(&self, id: AppointmentId) -> Result<Option<Appointment>, RoomError>;
}

/// Decides the rights a participant starts with.
pub trait RightsOracle: Send + Sync {
    /// `participant_count` includes the entrant.
    fn derive_initial_rights(
        &self,
        user: &User,
        room: &Room,
        appointment: Option<&Appointment>,
        participant_count: usize,
    ) -> BTreeSet<Right>;
}

/// Whiteboard and poll subsystems. They own their state; the coordinator
/// only reads summaries and asks for resyncs.
pub trait CollaborationHub: Send + Sync {
    fn quick_poll_summary(&self, room_id: RoomId) -> Option<serde_json::Value>;

    /// Push whiteboard and poll state to a participant whose view changed.
    fn resync(&self, room_id: RoomId, uid: ParticipantUid);
}
