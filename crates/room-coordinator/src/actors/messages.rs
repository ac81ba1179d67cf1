//! Message types for actor communication.
//!
//! All inter-actor communication uses strongly-typed message passing via `tokio::sync::mpsc`.
//! Response patterns use `tokio::sync::oneshot` for request-reply semantics.

use super::room::RoomActorHandle;
use crate::admission::AdmissionOutcome;
use crate::errors::RoomError;
use crate::events::RoomMessage;
use crate::participant::{Participant, StreamDesc};
use crate::rights::Right;
use crate::rights_request::RequestOutcome;
use crate::room::Room;

use common::types::{ParticipantUid, RoomId, SessionId, StreamId, UserId};
use std::time::Duration;
use tokio::sync::oneshot;

/// Messages sent to `CoordinatorActor`.
#[derive(Debug)]
pub enum CoordinatorMessage {
    /// Spawn a room actor for the given room.
    OpenRoom {
        room: Box<Room>,
        respond_to: oneshot::Sender<Result<RoomActorHandle, RoomError>>,
    },

    /// Get a handle to an open room.
    GetRoom {
        room_id: RoomId,
        respond_to: oneshot::Sender<Result<RoomActorHandle, RoomError>>,
    },

    /// Stop and forget a room actor.
    RemoveRoom {
        room_id: RoomId,
        respond_to: oneshot::Sender<Result<(), RoomError>>,
    },

    /// Get current status (for health checks).
    GetStatus {
        respond_to: oneshot::Sender<CoordinatorStatus>,
    },

    /// Stop accepting rooms and cancel all room actors.
    Shutdown {
        /// How long to wait for room actors to finish.
        deadline: Duration,
        respond_to: oneshot::Sender<Result<(), RoomError>>,
    },
}

/// Messages sent to `RoomActor`.
#[derive(Debug)]
pub enum RoomActorMessage {
    /// Admit a participant and announce it.
    Enter {
        participant: Box<Participant>,
        respond_to: oneshot::Sender<Result<AdmissionOutcome, RoomError>>,
    },

    /// A participant left or disconnected.
    Exit {
        uid: ParticipantUid,
        respond_to: oneshot::Sender<Result<(), RoomError>>,
    },

    /// A moderator removes another participant.
    Kick {
        actor: ParticipantUid,
        target: ParticipantUid,
        respond_to: oneshot::Sender<Result<(), RoomError>>,
    },

    /// A participant asks for a right.
    RequestRight {
        uid: ParticipantUid,
        right: Right,
        respond_to: oneshot::Sender<Result<RequestOutcome, RoomError>>,
    },

    /// A moderator grants rights.
    AllowRight {
        moderator: ParticipantUid,
        target: ParticipantUid,
        rights: Vec<Right>,
        respond_to: oneshot::Sender<Result<(), RoomError>>,
    },

    /// A moderator revokes rights.
    DenyRight {
        moderator: ParticipantUid,
        target: ParticipantUid,
        rights: Vec<Right>,
        respond_to: oneshot::Sender<Result<(), RoomError>>,
    },

    /// Mute hint for the participant behind a transport session.
    Mute {
        actor: ParticipantUid,
        session_id: SessionId,
        mute: bool,
        respond_to: oneshot::Sender<Result<(), RoomError>>,
    },

    /// Ask everyone except `actor` to mute.
    MuteOthers {
        actor: ParticipantUid,
        respond_to: oneshot::Sender<Result<(), RoomError>>,
    },

    AttachStream {
        uid: ParticipantUid,
        stream: StreamDesc,
        respond_to: oneshot::Sender<Result<(), RoomError>>,
    },

    DetachStream {
        uid: ParticipantUid,
        stream_id: StreamId,
        respond_to: oneshot::Sender<Result<(), RoomError>>,
    },

    /// Close the room for everyone.
    Close {
        respond_to: oneshot::Sender<Result<(), RoomError>>,
    },

    /// Fire-and-forget event from a collaborating subsystem.
    Post { message: Box<RoomMessage> },

    GetState {
        respond_to: oneshot::Sender<RoomStatus>,
    },

    /// Whether any connection of the user holds `MODERATOR`.
    IsModerator {
        user_id: UserId,
        respond_to: oneshot::Sender<bool>,
    },

    /// Whether any connection of the user holds `right`.
    HasRight {
        user_id: UserId,
        right: Right,
        respond_to: oneshot::Sender<bool>,
    },
}

// ----------------------------------------------------------------------------
// Response types
// ----------------------------------------------------------------------------

/// Status of the `CoordinatorActor`.
#[derive(Debug, Clone)]
pub struct CoordinatorStatus {
    pub coordinator_id: String,
    /// Open rooms.
    pub room_count: usize,
    /// Registered participants across all rooms.
    pub participant_count: u32,
    /// Whether the coordinator is draining.
    pub is_draining: bool,
    /// Current mailbox depth.
    pub mailbox_depth: usize,
}

/// State of one room actor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomStatus {
    pub room_id: RoomId,
    /// Registered participants, hidden ones included.
    pub participants: usize,
    /// Participants not hidden by the moderator gate.
    pub visible: usize,
    pub closed: bool,
    pub moderator_present: bool,
    /// Rights requests waiting for a moderator.
    pub pending_requests: usize,
    /// Entries in the activity log.
    pub activities: usize,
}
