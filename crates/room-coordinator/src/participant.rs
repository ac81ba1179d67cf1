//! Participants (client connections) and the summaries sent about them.

use crate::rights::{Activity, Grants, Right};

use chrono::{DateTime, Utc};
use common::types::{GroupId, ParticipantUid, RoomId, SessionId, StreamId, UserId};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Membership of a user in a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMembership {
    pub group_id: GroupId,
    /// Group moderators moderate every room attached to the group.
    pub moderator: bool,
}

/// The account behind a participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub display_name: String,
    pub admin: bool,
    pub groups: Vec<GroupMembership>,
}

impl User {
    #[must_use]
    pub fn new(id: UserId, display_name: impl Into<String>) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            admin: false,
            groups: Vec::new(),
        }
    }

    /// Whether the user belongs to any of the given groups.
    #[must_use]
    pub fn in_any_group(&self, groups: &[GroupId]) -> bool {
        self.groups.iter().any(|m| groups.contains(&m.group_id))
    }

    /// Whether the user moderates any of the given groups.
    #[must_use]
    pub fn moderates_any_group(&self, groups: &[GroupId]) -> bool {
        self.groups
            .iter()
            .any(|m| m.moderator && groups.contains(&m.group_id))
    }
}

/// How the participant logged in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginContext {
    /// Room the session was pre-authorized for (invitation or hash link).
    pub pre_authorized_room: Option<RoomId>,
    /// External integration vouched for this user as moderator.
    pub external_moderator: bool,
    /// Logged in through an external integration; gets a reload URL.
    pub external_login: bool,
}

/// Kind of media stream a participant publishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamKind {
    Webcam,
    Screen,
}

/// A media stream attached to a participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamDesc {
    pub id: StreamId,
    pub kind: StreamKind,
    pub activities: Vec<Activity>,
}

/// One connection of a user to a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub uid: ParticipantUid,
    pub user: User,
    pub session_id: SessionId,
    pub room_id: Option<RoomId>,
    pub grants: Grants,
    pub streams: Vec<StreamDesc>,
    /// False while gated behind the moderator quorum.
    pub visible: bool,
    pub login: LoginContext,
    pub connected_at: DateTime<Utc>,
}

impl Participant {
    /// A fresh participant with no rights, not yet in a room.
    #[must_use]
    pub fn new(user: User, session_id: SessionId) -> Self {
        Self {
            uid: ParticipantUid::new(),
            user,
            session_id,
            room_id: None,
            grants: Grants::new(),
            streams: Vec::new(),
            visible: true,
            login: LoginContext::default(),
            connected_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user.id
    }

    pub fn allow(&mut self, rights: impl IntoIterator<Item = Right>) {
        self.grants.allow(rights);
    }

    /// See [`Grants::deny`].
    pub fn deny(&mut self, rights: impl IntoIterator<Item = Right>) -> Vec<Activity> {
        self.grants.deny(rights)
    }

    #[must_use]
    pub fn has(&self, right: Right) -> bool {
        self.grants.has(right)
    }

    #[must_use]
    pub fn is_moderator(&self) -> bool {
        self.grants.is_moderator()
    }

    #[must_use]
    pub fn has_streams(&self) -> bool {
        !self.streams.is_empty()
    }

    /// Summary as seen by the participant itself (`self_view`) or by others.
    ///
    /// Only the self view carries the participant's own streams.
    #[must_use]
    pub fn summary(&self, self_view: bool) -> ParticipantSummary {
        ParticipantSummary {
            uid: self.uid,
            user_id: self.user.id,
            display_name: self.user.display_name.clone(),
            rights: self.grants.rights().collect(),
            activities: self.grants.activities().collect(),
            streams: if self_view {
                self.streams.clone()
            } else {
                Vec::new()
            },
            is_self: self_view,
        }
    }

    /// Roster rank: moderators first, then presenters, then everyone else.
    fn roster_rank(&self) -> u8 {
        if self.is_moderator() {
            0
        } else if self.has(Right::Presenter) {
            1
        } else {
            5
        }
    }
}

/// Roster ordering: rank, then display name ignoring case.
#[must_use]
pub fn roster_order(a: &Participant, b: &Participant) -> Ordering {
    a.roster_rank().cmp(&b.roster_rank()).then_with(|| {
        a.user
            .display_name
            .to_lowercase()
            .cmp(&b.user.display_name.to_lowercase())
    })
}

/// Serialized view of a participant sent to room members.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantSummary {
    pub uid: ParticipantUid,
    pub user_id: UserId,
    pub display_name: String,
    pub rights: Vec<Right>,
    pub activities: Vec<Activity>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub streams: Vec<StreamDesc>,
    #[serde(rename = "self")]
    pub is_self: bool,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn participant(name: &str, rights: &[Right]) -> Participant {
        let mut p = Participant::new(User::new(UserId(1), name), SessionId::from("s"));
        p.allow(rights.iter().copied());
        p
    }

    #[test]
    fn test_summary_redacts_streams_for_others() {
        let mut p = participant("Ann", &[Right::Video]);
        p.streams.push(StreamDesc {
            id: StreamId::new(),
            kind: StreamKind::Webcam,
            activities: vec![Activity::Video],
        });

        let own = p.summary(true);
        assert!(own.is_self);
        assert_eq!(own.streams.len(), 1);

        let other = p.summary(false);
        assert!(!other.is_self);
        assert!(other.streams.is_empty());
        assert_eq!(other.rights, vec![Right::Video]);
    }

    #[test]
    fn test_summary_json_uses_self_key() {
        let p = participant("Ann", &[]);
        let json = serde_json::to_value(p.summary(true)).unwrap();
        assert_eq!(json["self"], serde_json::Value::Bool(true));
        assert!(json.get("streams").is_none());
    }

    #[test]
    fn test_roster_order() {
        let mut roster = vec![
            participant("zed", &[]),
            participant("Bob", &[Right::Presenter]),
            participant("amy", &[]),
            participant("Yan", &[Right::SuperModerator]),
            participant("Carl", &[Right::Moderator]),
        ];
        roster.sort_by(roster_order);

        let names: Vec<&str> = roster
            .iter()
            .map(|p| p.user.display_name.as_str())
            .collect();
        assert_eq!(names, vec!["Carl", "Yan", "Bob", "amy", "zed"]);
    }

    #[test]
    fn test_group_helpers() {
        let mut user = User::new(UserId(9), "Gus");
        user.groups.push(GroupMembership {
            group_id: GroupId(4),
            moderator: true,
        });
        user.groups.push(GroupMembership {
            group_id: GroupId(5),
            moderator: false,
        });

        assert!(user.in_any_group(&[GroupId(5)]));
        assert!(!user.moderates_any_group(&[GroupId(5)]));
        assert!(user.moderates_any_group(&[GroupId(4), GroupId(6)]));
        assert!(!user.in_any_group(&[]));
    }
}
