//! Inbound room events and outbound notifications.
//!
//! A [`RoomMessage`] is what participants and collaborating subsystems post
//! into a room. A [`Notification`] is what the room sends back out, always
//! paired with an [`Audience`].

use crate::activity::{ActivityEntry, ActivityId};
use crate::participant::{ParticipantSummary, StreamDesc};
use crate::rights::Right;

use chrono::{DateTime, Utc};
use common::types::{ParticipantUid, RoomId, SessionId, UserId};
use serde::Serialize;

/// Envelope for one event addressed to one room.
#[derive(Debug, Clone, PartialEq)]
pub struct RoomMessage {
    pub room_id: RoomId,
    /// Participant that originated the event, if any.
    pub sender: Option<ParticipantUid>,
    pub event: RoomEvent,
    pub timestamp: DateTime<Utc>,
}

impl RoomMessage {
    #[must_use]
    pub fn new(room_id: RoomId, event: RoomEvent) -> Self {
        Self {
            room_id,
            sender: None,
            event,
            timestamp: Utc::now(),
        }
    }

    #[must_use]
    pub fn from_participant(mut self, sender: ParticipantUid) -> Self {
        self.sender = Some(sender);
        self
    }
}

/// Everything that can happen in a room.
#[derive(Debug, Clone, PartialEq)]
pub enum RoomEvent {
    // Lifecycle
    Enter { uid: ParticipantUid },
    Exit { uid: ParticipantUid },
    Closed,
    Kick { uid: ParticipantUid },

    // Rights
    RightUpdated { uid: ParticipantUid },
    RequestRight { uid: ParticipantUid, right: Right },

    // Media
    /// Resolved by transport session, not uid.
    Mute { session_id: SessionId, mute: bool },
    MuteOthers { uid: ParticipantUid },

    // Collaboration
    WbReload,
    QuickPollUpdated,
    PollCreated { creator: UserId },
    PollUpdated,

    // Recording
    RecordingToggled,
    SharingToggled,
    MediaServerStatus { available: bool },

    // Moderation gate
    ModeratorInRoom { present: bool },

    HaveQuestion { uid: ParticipantUid },
    ActivityRemove { id: ActivityId },
}

impl RoomEvent {
    /// Bounded label for logs and metrics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            RoomEvent::Enter { .. } => "enter",
            RoomEvent::Exit { .. } => "exit",
            RoomEvent::Closed => "closed",
            RoomEvent::Kick { .. } => "kick",
            RoomEvent::RightUpdated { .. } => "right_updated",
            RoomEvent::RequestRight { .. } => "request_right",
            RoomEvent::Mute { .. } => "mute",
            RoomEvent::MuteOthers { .. } => "mute_others",
            RoomEvent::WbReload => "wb_reload",
            RoomEvent::QuickPollUpdated => "quick_poll_updated",
            RoomEvent::PollCreated { .. } => "poll_created",
            RoomEvent::PollUpdated => "poll_updated",
            RoomEvent::RecordingToggled => "recording_toggled",
            RoomEvent::SharingToggled => "sharing_toggled",
            RoomEvent::MediaServerStatus { .. } => "media_server_status",
            RoomEvent::ModeratorInRoom { .. } => "moderator_in_room",
            RoomEvent::HaveQuestion { .. } => "have_question",
            RoomEvent::ActivityRemove { .. } => "activity_remove",
        }
    }

    /// Whether dispatching this event reads recording state.
    #[must_use]
    pub const fn needs_recording_view(&self) -> bool {
        matches!(
            self,
            RoomEvent::Enter { .. }
                | RoomEvent::RecordingToggled
                | RoomEvent::RightUpdated { .. }
                | RoomEvent::ModeratorInRoom { .. }
        )
    }
}

/// Who receives a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    Room,
    RoomExcept(ParticipantUid),
    Participant(ParticipantUid),
    Moderators,
}

impl Audience {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Audience::Room => "room",
            Audience::RoomExcept(_) => "room_except",
            Audience::Participant(_) => "participant",
            Audience::Moderators => "moderators",
        }
    }
}

/// Interview recording control state shown to moderators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum RecordingButtons {
    Started,
    NotStarted { enabled: bool },
}

/// Informational banners shown on entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Notice {
    /// Nobody with moderator rights is present.
    NoModerator { moderated: bool },
    /// The room is recorded.
    WaitRecording,
}

/// Directed alerts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Alert {
    /// A right was requested in a moderated room with no moderator present.
    NoModeratorForRequest,
    /// Admitted but hidden until a moderator arrives.
    AwaitingModerator,
}

/// Options the entrant's client is initialized with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoomOptions {
    pub uid: ParticipantUid,
    pub user_id: UserId,
    pub rights: Vec<Right>,
    pub interview: bool,
    pub audio_only: bool,
    pub questions: bool,
    pub show_mic_status: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reload_url: Option<String>,
}

/// A stream together with the participant publishing it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RosterStream {
    pub uid: ParticipantUid,
    pub stream: StreamDesc,
}

/// Everything an entrant needs to render the room.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoomSnapshot {
    pub options: RoomOptions,
    /// `None` when the roster is hidden from this entrant.
    pub roster: Option<Vec<ParticipantSummary>>,
    pub streams: Vec<RosterStream>,
    pub quick_poll: Option<serde_json::Value>,
    pub recording: Option<RecordingButtons>,
    pub notices: Vec<Notice>,
}

/// Outbound message to room members.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    RoomSnapshot(Box<RoomSnapshot>),
    ParticipantAdded { client: ParticipantSummary },
    ParticipantUpdated { client: ParticipantSummary },
    ParticipantRemoved { uid: ParticipantUid },
    Kicked { uid: ParticipantUid },
    RoomClosed { redirect_url: Option<String> },
    ActivityAdded { entry: ActivityEntry },
    ActivityRemoved { id: ActivityId },
    /// Recipients mute playback of `uid` locally.
    LocalMute { uid: ParticipantUid, mute: bool },
    /// Recipients mute their own microphones unless they are `except`.
    MuteOthers { except: ParticipantUid },
    WhiteboardReload,
    QuickPoll { summary: Option<serde_json::Value> },
    PollCreated { creator: UserId },
    PollUpdated,
    RecordingButtons { buttons: RecordingButtons },
    /// Generic "refresh room controls" nudge.
    Refresh { event: &'static str },
    Visibility { visible: bool },
    Alert { alert: Alert },
    RightRequestExpired { right: Right },
}
