//! Admission of participants into a room.
//!
//! Admission runs inside the room actor, so the capacity check and the
//! registration that follows it are one transaction with respect to the room.
//!
//! # Order of checks
//!
//! First match wins:
//! 1. Closed room: denied, carrying the redirect URL.
//! 2. Room at capacity: denied.
//! 3. Session pre-authorized for this room: admitted.
//! 4. Appointment room: owner admitted at any time; members admitted only
//!    inside `[start, end)`; everyone else denied.
//! 5. Other rooms: admitted if public, owned by the caller, or sharing a group.
//! 6. Otherwise denied.
//!
//! An admitted non-moderator entering a room that waits for a moderator is
//! registered hidden ([`AdmissionOutcome::Gated`]).

use crate::collaborators::{AppointmentDirectory, ClientRegistry, RightsOracle};
use crate::observability::metrics as prom;
use crate::participant::Participant;
use crate::quorum;
use crate::rights::Right;
use crate::room::{Appointment, Room};

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Why a participant was turned away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenialReason {
    RoomClosed,
    Capacity,
    AppointmentMissing,
    OutsidePeriod,
    NotAuthorized,
}

impl DenialReason {
    /// Metric label.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            DenialReason::RoomClosed => "room_closed",
            DenialReason::Capacity => "capacity",
            DenialReason::AppointmentMissing => "appointment_missing",
            DenialReason::OutsidePeriod => "outside_period",
            DenialReason::NotAuthorized => "not_authorized",
        }
    }
}

/// A user-visible denial.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Denial {
    pub reason: DenialReason,
    /// Formatted explanation, when the reason needs one.
    pub message: Option<String>,
    /// Where to send the user instead. Set for closed rooms.
    pub redirect_url: Option<String>,
}

impl Denial {
    fn new(reason: DenialReason) -> Self {
        Self {
            reason,
            message: None,
            redirect_url: None,
        }
    }
}

/// Result of [`AdmissionController::try_admit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdmissionOutcome {
    /// Registered and visible.
    Admitted(Participant),
    /// Registered but hidden until a moderator is present.
    Gated(Participant),
    Denied(Denial),
}

impl AdmissionOutcome {
    /// Metric label.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            AdmissionOutcome::Admitted(_) => "admitted",
            AdmissionOutcome::Gated(_) => "gated",
            AdmissionOutcome::Denied(_) => "denied",
        }
    }

    /// The registered participant, unless denied.
    #[must_use]
    pub fn participant(&self) -> Option<&Participant> {
        match self {
            AdmissionOutcome::Admitted(p) | AdmissionOutcome::Gated(p) => Some(p),
            AdmissionOutcome::Denied(_) => None,
        }
    }
}

/// Authorization checks only; nothing is registered.
///
/// `present` is the number of participants already registered in the room.
///
/// # Errors
///
/// Returns the [`Denial`] of the first failing check.
pub fn authorize(
    participant: &Participant,
    room: &Room,
    present: usize,
    appointment: Option<&Appointment>,
    now: DateTime<Utc>,
    date_format: &str,
) -> Result<(), Denial> {
    if room.is_closed() {
        return Err(Denial {
            redirect_url: room.redirect_url.clone(),
            ..Denial::new(DenialReason::RoomClosed)
        });
    }

    if present >= room.capacity {
        return Err(Denial::new(DenialReason::Capacity));
    }

    if participant.login.pre_authorized_room == Some(room.id) {
        return Ok(());
    }

    let user_id = participant.user_id();

    if room.appointment.is_some() {
        let Some(appointment) = appointment.filter(|a| !a.deleted) else {
            return Err(Denial::new(DenialReason::AppointmentMissing));
        };
        if appointment.is_owner(user_id) {
            return Ok(());
        }
        if appointment.is_member(user_id) {
            if appointment.is_active_at(now) {
                return Ok(());
            }
            return Err(Denial {
                message: Some(format!(
                    "This appointment is only accessible in its scheduled period: {} - {}",
                    appointment.start.format(date_format),
                    appointment.end.format(date_format)
                )),
                ..Denial::new(DenialReason::OutsidePeriod)
            });
        }
        return Err(Denial::new(DenialReason::NotAuthorized));
    }

    if room.public || room.is_owner(user_id) || participant.user.in_any_group(&room.groups) {
        return Ok(());
    }

    Err(Denial::new(DenialReason::NotAuthorized))
}

/// Authorizes, assigns initial rights and registers entrants.
pub struct AdmissionController {
    registry: Arc<dyn ClientRegistry>,
    appointments: Arc<dyn AppointmentDirectory>,
    oracle: Arc<dyn RightsOracle>,
    date_format: String,
}

impl AdmissionController {
    #[must_use]
    pub fn new(
        registry: Arc<dyn ClientRegistry>,
        appointments: Arc<dyn AppointmentDirectory>,
        oracle: Arc<dyn RightsOracle>,
        date_format: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            appointments,
            oracle,
            date_format: date_format.into(),
        }
    }

    /// Try to admit `participant` into `room` at time `now`.
    ///
    /// On success the participant is registered with its room, initial
    /// rights and visibility set, and the registered copy is returned.
    /// Denials never touch the registry.
    pub async fn try_admit(
        &self,
        mut participant: Participant,
        room: &Room,
        now: DateTime<Utc>,
    ) -> AdmissionOutcome {
        let start = Instant::now();
        let appointment = self.fetch_appointment(room).await;
        let present = self.registry.list_by_room(room.id);

        let outcome = match authorize(
            &participant,
            room,
            present.len(),
            appointment.as_ref(),
            now,
            &self.date_format,
        ) {
            Err(denial) => {
                info!(
                    target: "rc.admission",
                    room_id = %room.id,
                    user_id = %participant.user_id(),
                    reason = denial.reason.as_str(),
                    "Admission denied"
                );
                AdmissionOutcome::Denied(denial)
            }
            Ok(()) => {
                participant.room_id = Some(room.id);
                if participant.login.external_moderator {
                    participant.allow([Right::SuperModerator]);
                } else {
                    participant.allow(self.oracle.derive_initial_rights(
                        &participant.user,
                        room,
                        appointment.as_ref(),
                        present.len() + 1,
                    ));
                }

                let gated =
                    !participant.is_moderator() && quorum::requires_wait_among(room, &present);
                participant.visible = !gated;

                let count = self.registry.add(participant.clone());
                debug!(
                    target: "rc.admission",
                    room_id = %room.id,
                    uid = %participant.uid,
                    gated,
                    participants = count,
                    "Participant registered"
                );

                if gated {
                    AdmissionOutcome::Gated(participant)
                } else {
                    AdmissionOutcome::Admitted(participant)
                }
            }
        };

        let reason = match &outcome {
            AdmissionOutcome::Denied(denial) => denial.reason.as_str(),
            _ => "none",
        };
        prom::record_admission(outcome.as_str(), reason);
        prom::record_admission_duration(start.elapsed());
        outcome
    }

    async fn fetch_appointment(&self, room: &Room) -> Option<Appointment> {
        let id = room.appointment?;
        match self.appointments.find(id).await {
            Ok(appointment) => appointment,
            Err(e) => {
                warn!(
                    target: "rc.admission",
                    room_id = %room.id,
                    error = %e,
                    "Appointment lookup failed, treating as missing"
                );
                None
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::collaborators::mock::MockAppointments;
    use crate::participant::{GroupMembership, User};
    use crate::policy::DefaultRightsPolicy;
    use crate::registry::InMemoryClientRegistry;
    use crate::room::RoomType;
    use chrono::TimeZone;
    use common::types::{AppointmentId, GroupId, RoomId, SessionId, UserId};

    const FORMAT: &str = "%Y-%m-%d %H:%M";

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 4, hour, minute, 0).unwrap()
    }

    fn entrant(user: u64) -> Participant {
        Participant::new(
            User::new(UserId(user), format!("user-{user}")),
            SessionId::from(format!("session-{user}").as_str()),
        )
    }

    fn public_room(capacity: usize) -> Room {
        let mut room = Room::new(RoomId(1), RoomType::Conference, capacity);
        room.public = true;
        room
    }

    fn appointment_room() -> (Room, Appointment) {
        let mut room = Room::new(RoomId(2), RoomType::Conference, 10);
        room.appointment = Some(AppointmentId(8));
        let appointment = Appointment {
            id: AppointmentId(8),
            owner_id: UserId(1),
            members: vec![UserId(2)],
            start: at(10, 0),
            end: at(11, 0),
            deleted: false,
        };
        (room, appointment)
    }

    fn controller(
        registry: Arc<InMemoryClientRegistry>,
        appointments: MockAppointments,
    ) -> AdmissionController {
        AdmissionController::new(
            registry,
            Arc::new(appointments),
            Arc::new(DefaultRightsPolicy),
            FORMAT,
        )
    }

    #[test]
    fn test_closed_room_passes_redirect() {
        let mut room = public_room(5);
        room.redirect_url = Some("https://example.org/bye".to_string());
        room.close();

        let denial = authorize(&entrant(1), &room, 0, None, at(10, 0), FORMAT).unwrap_err();
        assert_eq!(denial.reason, DenialReason::RoomClosed);
        assert_eq!(denial.redirect_url.as_deref(), Some("https://example.org/bye"));
    }

    #[test]
    fn test_capacity_checked_before_pre_authorization() {
        let room = public_room(2);
        let mut p = entrant(1);
        p.login.pre_authorized_room = Some(room.id);

        let denial = authorize(&p, &room, 2, None, at(10, 0), FORMAT).unwrap_err();
        assert_eq!(denial.reason, DenialReason::Capacity);
        assert!(authorize(&p, &room, 1, None, at(10, 0), FORMAT).is_ok());
    }

    #[test]
    fn test_pre_authorized_session_bypasses_group_check() {
        let room = Room::new(RoomId(3), RoomType::Conference, 5);
        let mut p = entrant(1);
        assert_eq!(
            authorize(&p, &room, 0, None, at(10, 0), FORMAT)
                .unwrap_err()
                .reason,
            DenialReason::NotAuthorized
        );

        p.login.pre_authorized_room = Some(RoomId(3));
        assert!(authorize(&p, &room, 0, None, at(10, 0), FORMAT).is_ok());
    }

    #[test]
    fn test_appointment_owner_ignores_window() {
        let (room, appointment) = appointment_room();
        let owner = entrant(1);
        assert!(authorize(&owner, &room, 0, Some(&appointment), at(9, 0), FORMAT).is_ok());
        assert!(authorize(&owner, &room, 0, Some(&appointment), at(10, 30), FORMAT).is_ok());
    }

    #[test]
    fn test_appointment_member_only_inside_window() {
        let (room, appointment) = appointment_room();
        let member = entrant(2);

        let denial =
            authorize(&member, &room, 0, Some(&appointment), at(9, 0), FORMAT).unwrap_err();
        assert_eq!(denial.reason, DenialReason::OutsidePeriod);
        let message = denial.message.unwrap();
        assert!(message.contains("2026-05-04 10:00 - 2026-05-04 11:00"), "{message}");

        assert!(authorize(&member, &room, 0, Some(&appointment), at(10, 30), FORMAT).is_ok());
    }

    #[test]
    fn test_appointment_stranger_and_missing() {
        let (room, mut appointment) = appointment_room();
        let denial =
            authorize(&entrant(3), &room, 0, Some(&appointment), at(10, 30), FORMAT).unwrap_err();
        assert_eq!(denial.reason, DenialReason::NotAuthorized);

        let denial = authorize(&entrant(1), &room, 0, None, at(10, 30), FORMAT).unwrap_err();
        assert_eq!(denial.reason, DenialReason::AppointmentMissing);

        appointment.deleted = true;
        let denial =
            authorize(&entrant(1), &room, 0, Some(&appointment), at(10, 30), FORMAT).unwrap_err();
        assert_eq!(denial.reason, DenialReason::AppointmentMissing);
    }

    #[test]
    fn test_owner_and_group_members_admitted() {
        let mut room = Room::new(RoomId(4), RoomType::Conference, 5);
        room.owner_id = Some(UserId(1));
        room.groups.push(GroupId(7));

        assert!(authorize(&entrant(1), &room, 0, None, at(10, 0), FORMAT).is_ok());

        let mut member = entrant(2);
        member.user.groups.push(GroupMembership {
            group_id: GroupId(7),
            moderator: false,
        });
        assert!(authorize(&member, &room, 0, None, at(10, 0), FORMAT).is_ok());
        assert!(authorize(&entrant(3), &room, 0, None, at(10, 0), FORMAT).is_err());
    }

    #[tokio::test]
    async fn test_capacity_frees_after_exit() {
        let registry = Arc::new(InMemoryClientRegistry::new());
        let admission = controller(Arc::clone(&registry), MockAppointments::new());
        let room = public_room(2);

        let first = admission.try_admit(entrant(1), &room, at(10, 0)).await;
        let second = admission.try_admit(entrant(2), &room, at(10, 0)).await;
        assert!(matches!(first, AdmissionOutcome::Admitted(_)));
        assert!(matches!(second, AdmissionOutcome::Admitted(_)));

        let third = admission.try_admit(entrant(3), &room, at(10, 0)).await;
        assert!(matches!(
            third,
            AdmissionOutcome::Denied(Denial {
                reason: DenialReason::Capacity,
                ..
            })
        ));
        assert_eq!(registry.count_in_room(room.id), 2);

        registry.remove(first.participant().unwrap().uid);
        let retry = admission.try_admit(entrant(3), &room, at(10, 0)).await;
        assert!(matches!(retry, AdmissionOutcome::Admitted(_)));
    }

    #[tokio::test]
    async fn test_gated_until_moderator_present() {
        let registry = Arc::new(InMemoryClientRegistry::new());
        let admission = controller(Arc::clone(&registry), MockAppointments::new());
        let mut room = public_room(10);
        room.moderated = true;
        room.wait_for_moderator = true;

        let outcome = admission.try_admit(entrant(5), &room, at(10, 0)).await;
        let AdmissionOutcome::Gated(gated) = outcome else {
            panic!("expected gated, got {outcome:?}");
        };
        assert!(!gated.visible);
        assert!(!registry.get(gated.uid).unwrap().visible);

        let mut moderator = entrant(6);
        moderator.login.external_moderator = true;
        let outcome = admission.try_admit(moderator, &room, at(10, 0)).await;
        let AdmissionOutcome::Admitted(admitted) = outcome else {
            panic!("expected admitted, got {outcome:?}");
        };
        assert!(admitted.has(Right::SuperModerator));
        assert!(admitted.visible);

        let outcome = admission.try_admit(entrant(7), &room, at(10, 0)).await;
        assert!(matches!(outcome, AdmissionOutcome::Admitted(_)));
    }

    #[tokio::test]
    async fn test_moderated_room_without_wait_never_gates() {
        let registry = Arc::new(InMemoryClientRegistry::new());
        let admission = controller(registry, MockAppointments::new());
        let mut room = public_room(10);
        room.moderated = true;

        let outcome = admission.try_admit(entrant(5), &room, at(10, 0)).await;
        assert!(matches!(outcome, AdmissionOutcome::Admitted(_)));
    }

    #[tokio::test]
    async fn test_rights_come_from_oracle() {
        let registry = Arc::new(InMemoryClientRegistry::new());
        let admission = controller(registry, MockAppointments::new());
        let room = public_room(10);

        let first = admission.try_admit(entrant(1), &room, at(10, 0)).await;
        assert!(first.participant().unwrap().is_moderator());

        let second = admission.try_admit(entrant(2), &room, at(10, 0)).await;
        let second = second.participant().unwrap();
        assert!(!second.is_moderator());
        assert!(second.has(Right::Audio));
        assert_eq!(second.room_id, Some(room.id));
    }

    #[tokio::test]
    async fn test_failing_directory_denies_appointment_room() {
        let registry = Arc::new(InMemoryClientRegistry::new());
        let admission = controller(Arc::clone(&registry), MockAppointments::failing());
        let (room, _) = appointment_room();

        let outcome = admission.try_admit(entrant(1), &room, at(10, 30)).await;
        assert!(matches!(
            outcome,
            AdmissionOutcome::Denied(Denial {
                reason: DenialReason::AppointmentMissing,
                ..
            })
        ));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_directory_lookup_used_for_members() {
        let (room, appointment) = appointment_room();
        let registry = Arc::new(InMemoryClientRegistry::new());
        let admission = controller(registry, MockAppointments::new().with(appointment));

        let outcome = admission.try_admit(entrant(2), &room, at(9, 0)).await;
        assert!(matches!(
            outcome,
            AdmissionOutcome::Denied(Denial {
                reason: DenialReason::OutsidePeriod,
                ..
            })
        ));
        let outcome = admission.try_admit(entrant(2), &room, at(10, 30)).await;
        assert!(matches!(outcome, AdmissionOutcome::Admitted(_)));
    }
}
