//! Broadcast facade: the single path from a room message to registry
//! mutations and bus deliveries.
//!
//! For each message the facade builds a [`DispatchContext`] from the
//! registry and collaborators, runs the pure dispatcher, applies the
//! returned mutations in order and only then delivers the notifications in
//! order. Delivery failures are logged per recipient and never abort the
//! remaining deliveries.
//!
//! Room-wide notifications go through [`MessageBus::send_to_room`] and reach
//! every subscriber. Audiences that address a subset of the room
//! (`RoomExcept`, `Moderators`) skip participants hidden by the moderator
//! gate.

use crate::activity::ActivityLog;
use crate::collaborators::{ClientRegistry, CollaborationHub, MessageBus, RecordingService};
use crate::dispatcher::{self, DispatchContext, Mutation, RecordingView, Transition};
use crate::events::{Audience, Notification, RoomEvent, RoomMessage};
use crate::observability::metrics as prom;
use crate::participant::Participant;
use crate::room::Room;

use common::types::{ParticipantUid, RoomId};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Room state owned by the room actor.
#[derive(Debug, Clone)]
pub struct RoomState {
    pub room: Room,
    pub history: ActivityLog,
}

impl RoomState {
    #[must_use]
    pub fn new(room: Room) -> Self {
        Self {
            room,
            history: ActivityLog::default(),
        }
    }
}

pub struct BroadcastFacade {
    registry: Arc<dyn ClientRegistry>,
    bus: Arc<dyn MessageBus>,
    recording: Arc<dyn RecordingService>,
    collaboration: Arc<dyn CollaborationHub>,
}

impl BroadcastFacade {
    #[must_use]
    pub fn new(
        registry: Arc<dyn ClientRegistry>,
        bus: Arc<dyn MessageBus>,
        recording: Arc<dyn RecordingService>,
        collaboration: Arc<dyn CollaborationHub>,
    ) -> Self {
        Self {
            registry,
            bus,
            recording,
            collaboration,
        }
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<dyn ClientRegistry> {
        &self.registry
    }

    #[must_use]
    pub fn recording(&self) -> &Arc<dyn RecordingService> {
        &self.recording
    }

    /// Dispatch one message against `state` and carry out the result.
    pub async fn apply(&self, state: &mut RoomState, message: RoomMessage) -> Transition {
        let start = Instant::now();
        let room_id = state.room.id;
        let event = message.event.kind();

        let participants = self.registry.list_by_room(room_id);
        let recording = if message.event.needs_recording_view() {
            self.recording_view(&state.room, &participants).await
        } else {
            RecordingView::default()
        };
        let quick_poll = match message.event {
            RoomEvent::Enter { .. }
            | RoomEvent::QuickPollUpdated
            | RoomEvent::ModeratorInRoom { .. } => self.collaboration.quick_poll_summary(room_id),
            _ => None,
        };

        let transition = dispatcher::dispatch(
            &DispatchContext {
                room: &state.room,
                participants: &participants,
                history: &state.history,
                quick_poll: quick_poll.as_ref(),
                recording: &recording,
                now: message.timestamp,
            },
            &message,
        );

        if let Some(reason) = transition.dropped {
            prom::record_message_dropped(reason.as_str());
        }
        for mutation in &transition.mutations {
            self.apply_mutation(state, mutation);
        }
        for (audience, notification) in &transition.outbound {
            self.deliver(room_id, *audience, notification);
        }

        prom::record_dispatch_latency(event, start.elapsed());
        transition
    }

    async fn recording_view(&self, room: &Room, participants: &[Participant]) -> RecordingView {
        let active = self.recording.is_recording(room.id).await;
        let mut permitted = BTreeSet::new();
        if room.is_interview() && !active {
            for moderator in participants.iter().filter(|p| p.is_moderator()) {
                if self.recording.recording_allowed(moderator).await {
                    permitted.insert(moderator.uid);
                }
            }
        }
        RecordingView { active, permitted }
    }

    fn apply_mutation(&self, state: &mut RoomState, mutation: &Mutation) {
        match mutation {
            Mutation::RemoveParticipant(uid) => {
                if self.registry.remove(*uid).is_none() {
                    debug!(target: "rc.broadcast", uid = %uid, "Participant already removed");
                }
            }
            Mutation::SetVisible { uid, visible } => {
                let Some(mut participant) = self.registry.get(*uid) else {
                    warn!(
                        target: "rc.broadcast",
                        uid = %uid,
                        "Cannot change visibility of unknown participant"
                    );
                    return;
                };
                participant.visible = *visible;
                self.registry.update(&participant);
            }
            Mutation::AppendActivity(entry) => state.history.push(entry.clone()),
            Mutation::RemoveActivity(id) => {
                state.history.remove(*id);
            }
            Mutation::CloseRoom => {
                state.room.close();
            }
            Mutation::ResyncCollaboration(uid) => {
                self.collaboration.resync(state.room.id, *uid);
            }
        }
    }

    /// Deliver one notification. Returns the number of failed deliveries.
    pub fn deliver(
        &self,
        room_id: RoomId,
        audience: Audience,
        notification: &Notification,
    ) -> usize {
        match audience {
            Audience::Room => match self.bus.send_to_room(room_id, notification) {
                Ok(()) => 0,
                Err(e) => {
                    warn!(
                        target: "rc.broadcast",
                        room_id = %room_id,
                        error = %e,
                        "Room delivery failed"
                    );
                    prom::record_bus_failure(audience.as_str());
                    1
                }
            },
            Audience::Participant(uid) => {
                usize::from(!self.send_one(room_id, audience, uid, notification))
            }
            Audience::RoomExcept(excluded) => {
                let recipients = self
                    .registry
                    .list_by_room_where(room_id, &|p| p.visible && p.uid != excluded);
                self.send_each(room_id, audience, &recipients, notification)
            }
            Audience::Moderators => {
                let recipients = self
                    .registry
                    .list_by_room_where(room_id, &|p| p.visible && p.is_moderator());
                self.send_each(room_id, audience, &recipients, notification)
            }
        }
    }

    fn send_each(
        &self,
        room_id: RoomId,
        audience: Audience,
        recipients: &[Participant],
        notification: &Notification,
    ) -> usize {
        recipients
            .iter()
            .filter(|p| !self.send_one(room_id, audience, p.uid, notification))
            .count()
    }

    fn send_one(
        &self,
        room_id: RoomId,
        audience: Audience,
        uid: ParticipantUid,
        notification: &Notification,
    ) -> bool {
        match self.bus.send_to_participant(uid, notification) {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    target: "rc.broadcast",
                    room_id = %room_id,
                    uid = %uid,
                    audience = audience.as_str(),
                    error = %e,
                    "Participant delivery failed"
                );
                prom::record_bus_failure(audience.as_str());
                false
            }
        }
    }
}
