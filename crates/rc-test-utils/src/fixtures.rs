//! Pre-configured test data fixtures for RC testing.

use chrono::{DateTime, Utc};
use common::types::{AppointmentId, GroupId, RoomId, SessionId, UserId};
use room_coordinator::participant::{GroupMembership, Participant, User};
use room_coordinator::room::{Appointment, Room, RoomElement, RoomModerator, RoomType};

/// Test user fixture.
#[derive(Debug, Clone)]
pub struct TestUser {
    user: User,
}

impl TestUser {
    /// Create a user named after its ID.
    #[must_use]
    pub fn new(id: u64) -> Self {
        Self {
            user: User::new(UserId(id), format!("User {id}")),
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.user.display_name = name.into();
        self
    }

    /// Make the user a platform administrator.
    #[must_use]
    pub fn admin(mut self) -> Self {
        self.user.admin = true;
        self
    }

    #[must_use]
    pub fn member_of(mut self, group: u64) -> Self {
        self.user.groups.push(GroupMembership {
            group_id: GroupId(group),
            moderator: false,
        });
        self
    }

    #[must_use]
    pub fn moderator_of(mut self, group: u64) -> Self {
        self.user.groups.push(GroupMembership {
            group_id: GroupId(group),
            moderator: true,
        });
        self
    }

    #[must_use]
    pub fn build(self) -> User {
        self.user
    }
}

/// Test room fixture. Defaults to an open, public, unmoderated conference
/// room for 10 participants.
#[derive(Debug, Clone)]
pub struct TestRoom {
    room: Room,
}

impl TestRoom {
    #[must_use]
    pub fn new(id: u64) -> Self {
        let mut room = Room::new(RoomId(id), RoomType::Conference, 10);
        room.name = format!("Room {id}");
        room.public = true;
        Self { room }
    }

    /// Same settings with a different room type.
    #[must_use]
    pub fn with_type(self, room_type: RoomType) -> Self {
        let mut room = Room::new(self.room.id, room_type, self.room.capacity);
        room.name = self.room.name;
        room.moderated = self.room.moderated;
        room.wait_for_moderator = self.room.wait_for_moderator;
        room.audio_only = self.room.audio_only;
        room.hidden_elements = self.room.hidden_elements;
        room.allow_user_questions = self.room.allow_user_questions;
        room.appointment = self.room.appointment;
        room.redirect_url = self.room.redirect_url;
        room.groups = self.room.groups;
        room.public = self.room.public;
        room.owner_id = self.room.owner_id;
        room.moderators = self.room.moderators;
        room.wait_recording = self.room.wait_recording;
        Self { room }
    }

    #[must_use]
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.room.capacity = capacity;
        self
    }

    #[must_use]
    pub fn moderated(mut self) -> Self {
        self.room.moderated = true;
        self
    }

    /// Moderated and gated until a moderator is present.
    #[must_use]
    pub fn wait_for_moderator(mut self) -> Self {
        self.room.moderated = true;
        self.room.wait_for_moderator = true;
        self
    }

    #[must_use]
    pub fn with_moderator(mut self, user_id: u64) -> Self {
        self.room.moderators.push(RoomModerator {
            user_id: UserId(user_id),
            super_moderator: false,
        });
        self
    }

    #[must_use]
    pub fn with_owner(mut self, user_id: u64) -> Self {
        self.room.owner_id = Some(UserId(user_id));
        self
    }

    /// Restrict entry to members of `group`.
    #[must_use]
    pub fn for_group(mut self, group: u64) -> Self {
        self.room.public = false;
        self.room.groups.push(GroupId(group));
        self
    }

    /// Restrict entry to an appointment's owner and members.
    #[must_use]
    pub fn for_appointment(mut self, id: u64) -> Self {
        self.room.public = false;
        self.room.appointment = Some(AppointmentId(id));
        self
    }

    #[must_use]
    pub fn with_redirect(mut self, url: impl Into<String>) -> Self {
        self.room.redirect_url = Some(url.into());
        self
    }

    #[must_use]
    pub fn hide(mut self, element: RoomElement) -> Self {
        self.room.hidden_elements.insert(element);
        self
    }

    #[must_use]
    pub fn without_questions(mut self) -> Self {
        self.room.allow_user_questions = false;
        self
    }

    #[must_use]
    pub fn build(self) -> Room {
        self.room
    }
}

/// Test participant fixture.
#[derive(Debug, Clone)]
pub struct TestParticipant {
    participant: Participant,
}

impl TestParticipant {
    /// A participant for a plain user with the given ID.
    #[must_use]
    pub fn new(user_id: u64) -> Self {
        Self::for_user(TestUser::new(user_id).build())
    }

    #[must_use]
    pub fn for_user(user: User) -> Self {
        let session_id = SessionId(format!("session-{}-{}", user.id.0, uuid_suffix()));
        Self {
            participant: Participant::new(user, session_id),
        }
    }

    #[must_use]
    pub fn with_session(mut self, session_id: &str) -> Self {
        self.participant.session_id = SessionId::from(session_id);
        self
    }

    /// Carry an invitation for `room_id`.
    #[must_use]
    pub fn pre_authorized(mut self, room_id: u64) -> Self {
        self.participant.login.pre_authorized_room = Some(RoomId(room_id));
        self
    }

    /// Logged in by an external system that asserted moderator rights.
    #[must_use]
    pub fn external_moderator(mut self) -> Self {
        self.participant.login.external_moderator = true;
        self.participant.login.external_login = true;
        self
    }

    #[must_use]
    pub fn build(self) -> Participant {
        self.participant
    }
}

/// Test appointment fixture.
#[derive(Debug, Clone)]
pub struct TestAppointment {
    appointment: Appointment,
}

impl TestAppointment {
    #[must_use]
    pub fn new(id: u64, owner: u64, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            appointment: Appointment {
                id: AppointmentId(id),
                owner_id: UserId(owner),
                members: Vec::new(),
                start,
                end,
                deleted: false,
            },
        }
    }

    #[must_use]
    pub fn with_member(mut self, user_id: u64) -> Self {
        self.appointment.members.push(UserId(user_id));
        self
    }

    #[must_use]
    pub fn deleted(mut self) -> Self {
        self.appointment.deleted = true;
        self
    }

    #[must_use]
    pub fn build(self) -> Appointment {
        self.appointment
    }
}

fn uuid_suffix() -> String {
    common::types::ParticipantUid::new()
        .0
        .simple()
        .to_string()
        .chars()
        .take(8)
        .collect()
}
