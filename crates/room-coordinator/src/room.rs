//! Room and appointment metadata.
//!
//! Rooms are loaded by the hosting service and handed to the coordinator
//! when the room actor opens. The coordinator never persists them.

use chrono::{DateTime, Utc};
use common::types::{AppointmentId, GroupId, RoomId, UserId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Kind of room. Fixed for the lifetime of the room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomType {
    Conference,
    Presentation,
    Interview,
}

/// Room UI elements that can be hidden by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoomElement {
    /// Hides the roster from non-moderators.
    UserCount,
    /// Hides per-participant microphone indicators.
    MicrophoneStatus,
    Chat,
    Activities,
    Whiteboard,
    ScreenSharing,
}

/// A user configured as moderator of a specific room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomModerator {
    pub user_id: UserId,
    pub super_moderator: bool,
}

/// Room configuration.
#[derive(Debug, Clone)]
pub struct Room {
    pub id: RoomId,
    pub name: String,
    room_type: RoomType,
    /// Maximum participants registered at once.
    pub capacity: usize,
    closed: bool,
    pub moderated: bool,
    /// Only meaningful when `moderated` is set.
    pub wait_for_moderator: bool,
    pub audio_only: bool,
    pub hidden_elements: BTreeSet<RoomElement>,
    pub allow_user_questions: bool,
    pub appointment: Option<AppointmentId>,
    /// Where participants are sent when the room is closed.
    pub redirect_url: Option<String>,
    pub groups: Vec<GroupId>,
    pub public: bool,
    pub owner_id: Option<UserId>,
    pub moderators: Vec<RoomModerator>,
    /// Show a notice that the room is recorded.
    pub wait_recording: bool,
}

impl Room {
    /// A new open, unmoderated, non-public room.
    #[must_use]
    pub fn new(id: RoomId, room_type: RoomType, capacity: usize) -> Self {
        Self {
            id,
            name: String::new(),
            room_type,
            capacity,
            closed: false,
            moderated: false,
            wait_for_moderator: false,
            audio_only: false,
            hidden_elements: BTreeSet::new(),
            allow_user_questions: true,
            appointment: None,
            redirect_url: None,
            groups: Vec::new(),
            public: false,
            owner_id: None,
            moderators: Vec::new(),
            wait_recording: false,
        }
    }

    #[must_use]
    pub fn room_type(&self) -> RoomType {
        self.room_type
    }

    #[must_use]
    pub fn is_interview(&self) -> bool {
        self.room_type == RoomType::Interview
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Close the room. Returns `false` if it was already closed.
    pub fn close(&mut self) -> bool {
        if self.closed {
            return false;
        }
        self.closed = true;
        true
    }

    #[must_use]
    pub fn is_hidden(&self, element: RoomElement) -> bool {
        self.hidden_elements.contains(&element)
    }

    /// Whether participants must wait until a moderator is present.
    #[must_use]
    pub fn gates_on_moderator(&self) -> bool {
        self.moderated && self.wait_for_moderator
    }

    #[must_use]
    pub fn is_owner(&self, user_id: UserId) -> bool {
        self.owner_id == Some(user_id)
    }
}

/// A scheduled appointment backing an appointment room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: AppointmentId,
    pub owner_id: UserId,
    pub members: Vec<UserId>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub deleted: bool,
}

impl Appointment {
    #[must_use]
    pub fn is_owner(&self, user_id: UserId) -> bool {
        self.owner_id == user_id
    }

    #[must_use]
    pub fn is_member(&self, user_id: UserId) -> bool {
        self.members.contains(&user_id)
    }

    /// Half-open window check: `start <= now < end`.
    #[must_use]
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.start <= now && now < self.end
    }
}
