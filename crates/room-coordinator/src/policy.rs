//! Default initial-rights policy.

use crate::collaborators::RightsOracle;
use crate::participant::User;
use crate::rights::Right;
use crate::room::{Appointment, Room, RoomType};

use std::collections::BTreeSet;

/// Rights derivation used when the hosting service supplies no oracle.
///
/// - Admins and appointment owners get `SUPER_MODERATOR`.
/// - Configured room moderators get `MODERATOR` or `SUPER_MODERATOR`.
/// - The first participant of an unmoderated room gets `MODERATOR`.
/// - Moderators of a group attached to the room get `MODERATOR`.
/// - In conference rooms everyone else gets `AUDIO` and `VIDEO`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultRightsPolicy;

impl RightsOracle for DefaultRightsPolicy {
    fn derive_initial_rights(
        &self,
        user: &User,
        room: &Room,
        appointment: Option<&Appointment>,
        participant_count: usize,
    ) -> BTreeSet<Right> {
        let mut rights = BTreeSet::new();

        if user.admin || appointment.is_some_and(|a| a.is_owner(user.id)) {
            rights.insert(Right::SuperModerator);
        } else if let Some(configured) = room.moderators.iter().find(|m| m.user_id == user.id) {
            rights.insert(if configured.super_moderator {
                Right::SuperModerator
            } else {
                Right::Moderator
            });
        } else if (!room.moderated && participant_count <= 1)
            || user.moderates_any_group(&room.groups)
        {
            rights.insert(Right::Moderator);
        }

        if rights.is_empty() && room.room_type() == RoomType::Conference {
            rights.extend([Right::Audio, Right::Video]);
        }
        rights
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::participant::GroupMembership;
    use crate::room::RoomModerator;
    use chrono::{TimeZone, Utc};
    use common::types::{AppointmentId, GroupId, RoomId, UserId};

    fn conference() -> Room {
        Room::new(RoomId(1), RoomType::Conference, 10)
    }

    #[test]
    fn test_admin_is_super_moderator() {
        let mut user = User::new(UserId(1), "Ada");
        user.admin = true;
        let rights = DefaultRightsPolicy.derive_initial_rights(&user, &conference(), None, 3);
        assert_eq!(rights, BTreeSet::from([Right::SuperModerator]));
    }

    #[test]
    fn test_appointment_owner_is_super_moderator() {
        let user = User::new(UserId(7), "Owen");
        let appointment = Appointment {
            id: AppointmentId(1),
            owner_id: UserId(7),
            members: vec![],
            start: Utc.with_ymd_and_hms(2026, 1, 1, 10, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2026, 1, 1, 11, 0, 0).unwrap(),
            deleted: false,
        };
        let rights =
            DefaultRightsPolicy.derive_initial_rights(&user, &conference(), Some(&appointment), 4);
        assert!(rights.contains(&Right::SuperModerator));
    }

    #[test]
    fn test_configured_moderator() {
        let mut room = conference();
        room.moderated = true;
        room.moderators.push(RoomModerator {
            user_id: UserId(2),
            super_moderator: false,
        });
        let rights =
            DefaultRightsPolicy.derive_initial_rights(&User::new(UserId(2), "Mo"), &room, None, 5);
        assert_eq!(rights, BTreeSet::from([Right::Moderator]));
    }

    #[test]
    fn test_first_in_unmoderated_room_moderates() {
        let room = conference();
        let user = User::new(UserId(3), "Fay");

        let first = DefaultRightsPolicy.derive_initial_rights(&user, &room, None, 1);
        assert_eq!(first, BTreeSet::from([Right::Moderator]));

        let second = DefaultRightsPolicy.derive_initial_rights(&user, &room, None, 2);
        assert_eq!(second, BTreeSet::from([Right::Audio, Right::Video]));
    }

    #[test]
    fn test_first_in_moderated_room_gets_nothing_special() {
        let mut room = Room::new(RoomId(1), RoomType::Presentation, 10);
        room.moderated = true;
        let rights =
            DefaultRightsPolicy.derive_initial_rights(&User::new(UserId(3), "Fay"), &room, None, 1);
        assert!(rights.is_empty());
    }

    #[test]
    fn test_group_moderator() {
        let mut room = conference();
        room.moderated = true;
        room.groups.push(GroupId(9));
        let mut user = User::new(UserId(4), "Gil");
        user.groups.push(GroupMembership {
            group_id: GroupId(9),
            moderator: true,
        });
        let rights = DefaultRightsPolicy.derive_initial_rights(&user, &room, None, 6);
        assert_eq!(rights, BTreeSet::from([Right::Moderator]));
    }
}
