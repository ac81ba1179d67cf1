//! Collaborators for a coordinator running without external services.
//!
//! The binary wires these when no recording service, appointment store or
//! whiteboard/poll subsystem is attached.

use super::{AppointmentDirectory, CollaborationHub, RecordingService};
use crate::errors::RoomError;
use crate::participant::Participant;
use crate::room::Appointment;

use common::types::{AppointmentId, ParticipantUid, RoomId};
use tracing::debug;

/// Nothing is ever recorded; screen sharing is left to room rights.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoRecording;

#[async_trait::async_trait]
impl RecordingService for NoRecording {
    async fn is_recording(&self, _room_id: RoomId) -> bool {
        false
    }

    async fn recording_allowed(&self, _participant: &Participant) -> bool {
        false
    }

    async fn screen_share_allowed(&self, participant: &Participant) -> bool {
        participant.is_moderator() || participant.has(crate::rights::Right::Share)
    }

    async fn rights_updated(&self, participant: &Participant) {
        debug!(
            target: "rc.collaborators",
            uid = %participant.uid,
            "Rights updated, no recording service attached"
        );
    }
}

/// Appointment store with no appointments; appointment rooms deny entry.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyAppointments;

#[async_trait::async_trait]
impl AppointmentDirectory for EmptyAppointments {
    async fn find(&self, _id: AppointmentId) -> Result<Option<Appointment>, RoomError> {
        Ok(None)
    }
}

/// No whiteboard or poll subsystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCollaboration;

impl CollaborationHub for NoCollaboration {
    fn quick_poll_summary(&self, _room_id: RoomId) -> Option<serde_json::Value> {
        None
    }

    fn resync(&self, _room_id: RoomId, _uid: ParticipantUid) {}
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::participant::User;
    use crate::rights::Right;
    use common::types::{SessionId, UserId};

    #[tokio::test]
    async fn test_screen_share_follows_rights() {
        let mut participant = Participant::new(User::new(UserId(1), "Ann"), SessionId::from("s"));
        assert!(!NoRecording.screen_share_allowed(&participant).await);

        participant.allow([Right::Share]);
        assert!(NoRecording.screen_share_allowed(&participant).await);
        assert!(!NoRecording.is_recording(RoomId(1)).await);
    }

    #[tokio::test]
    async fn test_empty_appointments_finds_nothing() {
        let found = EmptyAppointments.find(AppointmentId(3)).await.unwrap();
        assert!(found.is_none());
    }
}
