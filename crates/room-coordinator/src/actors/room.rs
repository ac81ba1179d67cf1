//! `RoomActor` - per-room actor owning room state.
//!
//! Each `RoomActor`:
//! - Owns the room configuration, the activity log and the rights request table
//! - Admits participants and keeps the moderator gate consistent
//! - Routes every event through the [`BroadcastFacade`]
//! - Expires stale rights requests when a TTL is configured
//!
//! Participant records live in the shared [`ClientRegistry`]; the actor is
//! the only writer for participants of its room.

use super::messages::{RoomActorMessage, RoomStatus};
use super::metrics::{ActorMetrics, ActorType, CoordinatorMetrics, MailboxMonitor};
use crate::admission::{AdmissionController, AdmissionOutcome};
use crate::broadcast::{BroadcastFacade, RoomState};
use crate::collaborators::{
    AppointmentDirectory, ClientRegistry, CollaborationHub, MessageBus, RecordingService,
    RightsOracle,
};
use crate::dispatcher::Mutation;
use crate::errors::RoomError;
use crate::events::{Alert, Audience, Notification, RoomEvent, RoomMessage};
use crate::participant::{Participant, StreamDesc, StreamKind};
use crate::quorum;
use crate::rights::Right;
use crate::rights_request::{RequestOutcome, RightsRequests};
use crate::room::Room;

use chrono::Utc;
use common::types::{ParticipantUid, RoomId, SessionId, StreamId, UserId};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// Default channel buffer size for the room actor mailbox.
const ROOM_CHANNEL_BUFFER: usize = 500;

/// How often pending rights requests are checked against the TTL.
const REQUEST_EXPIRY_INTERVAL: Duration = Duration::from_secs(1);

/// Collaborators shared by every room actor.
#[derive(Clone)]
pub struct RoomServices {
    pub registry: Arc<dyn ClientRegistry>,
    pub bus: Arc<dyn MessageBus>,
    pub recording: Arc<dyn RecordingService>,
    pub appointments: Arc<dyn AppointmentDirectory>,
    pub oracle: Arc<dyn RightsOracle>,
    pub collaboration: Arc<dyn CollaborationHub>,
}

/// Per-room tunables taken from the service configuration.
#[derive(Debug, Clone)]
pub struct RoomSettings {
    /// `strftime` pattern for appointment periods in denial messages.
    pub date_format: String,
    /// How long a rights request may wait for a moderator. `None` keeps
    /// requests pending until answered.
    pub rights_request_ttl: Option<Duration>,
}

impl Default for RoomSettings {
    fn default() -> Self {
        Self {
            date_format: crate::config::DEFAULT_DATE_FORMAT.to_string(),
            rights_request_ttl: None,
        }
    }
}

/// Handle to a `RoomActor`.
#[derive(Clone, Debug)]
pub struct RoomActorHandle {
    sender: mpsc::Sender<RoomActorMessage>,
    cancel_token: CancellationToken,
    room_id: RoomId,
}

impl RoomActorHandle {
    #[must_use]
    pub fn room_id(&self) -> RoomId {
        self.room_id
    }

    /// Admit a participant into the room.
    ///
    /// Denials are reported through [`AdmissionOutcome::Denied`]; errors are
    /// reserved for actor failures and duplicate registration.
    pub async fn enter(&self, participant: Participant) -> Result<AdmissionOutcome, RoomError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(RoomActorMessage::Enter {
                participant: Box::new(participant),
                respond_to: tx,
            })
            .await
            .map_err(|e| RoomError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| RoomError::Internal(format!("response receive failed: {e}")))?
    }

    pub async fn exit(&self, uid: ParticipantUid) -> Result<(), RoomError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(RoomActorMessage::Exit {
                uid,
                respond_to: tx,
            })
            .await
            .map_err(|e| RoomError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| RoomError::Internal(format!("response receive failed: {e}")))?
    }

    /// Remove `target` on behalf of the moderator `actor`.
    pub async fn kick(
        &self,
        actor: ParticipantUid,
        target: ParticipantUid,
    ) -> Result<(), RoomError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(RoomActorMessage::Kick {
                actor,
                target,
                respond_to: tx,
            })
            .await
            .map_err(|e| RoomError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| RoomError::Internal(format!("response receive failed: {e}")))?
    }

    pub async fn request_right(
        &self,
        uid: ParticipantUid,
        right: Right,
    ) -> Result<RequestOutcome, RoomError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(RoomActorMessage::RequestRight {
                uid,
                right,
                respond_to: tx,
            })
            .await
            .map_err(|e| RoomError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| RoomError::Internal(format!("response receive failed: {e}")))?
    }

    pub async fn allow_right(
        &self,
        moderator: ParticipantUid,
        target: ParticipantUid,
        rights: Vec<Right>,
    ) -> Result<(), RoomError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(RoomActorMessage::AllowRight {
                moderator,
                target,
                rights,
                respond_to: tx,
            })
            .await
            .map_err(|e| RoomError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| RoomError::Internal(format!("response receive failed: {e}")))?
    }

    pub async fn deny_right(
        &self,
        moderator: ParticipantUid,
        target: ParticipantUid,
        rights: Vec<Right>,
    ) -> Result<(), RoomError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(RoomActorMessage::DenyRight {
                moderator,
                target,
                rights,
                respond_to: tx,
            })
            .await
            .map_err(|e| RoomError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| RoomError::Internal(format!("response receive failed: {e}")))?
    }

    pub async fn mute(
        &self,
        actor: ParticipantUid,
        session_id: SessionId,
        mute: bool,
    ) -> Result<(), RoomError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(RoomActorMessage::Mute {
                actor,
                session_id,
                mute,
                respond_to: tx,
            })
            .await
            .map_err(|e| RoomError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| RoomError::Internal(format!("response receive failed: {e}")))?
    }

    pub async fn mute_others(&self, actor: ParticipantUid) -> Result<(), RoomError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(RoomActorMessage::MuteOthers {
                actor,
                respond_to: tx,
            })
            .await
            .map_err(|e| RoomError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| RoomError::Internal(format!("response receive failed: {e}")))?
    }

    /// Attach a media stream and start its activities.
    pub async fn attach_stream(
        &self,
        uid: ParticipantUid,
        stream: StreamDesc,
    ) -> Result<(), RoomError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(RoomActorMessage::AttachStream {
                uid,
                stream,
                respond_to: tx,
            })
            .await
            .map_err(|e| RoomError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| RoomError::Internal(format!("response receive failed: {e}")))?
    }

    pub async fn detach_stream(
        &self,
        uid: ParticipantUid,
        stream_id: StreamId,
    ) -> Result<(), RoomError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(RoomActorMessage::DetachStream {
                uid,
                stream_id,
                respond_to: tx,
            })
            .await
            .map_err(|e| RoomError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| RoomError::Internal(format!("response receive failed: {e}")))?
    }

    /// Close the room. Closing twice is a no-op.
    pub async fn close(&self) -> Result<(), RoomError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(RoomActorMessage::Close { respond_to: tx })
            .await
            .map_err(|e| RoomError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| RoomError::Internal(format!("response receive failed: {e}")))?
    }

    /// Post an event without waiting for it to be processed.
    pub async fn post(&self, message: RoomMessage) -> Result<(), RoomError> {
        self.sender
            .send(RoomActorMessage::Post {
                message: Box::new(message),
            })
            .await
            .map_err(|e| RoomError::Internal(format!("channel send failed: {e}")))
    }

    pub async fn get_state(&self) -> Result<RoomStatus, RoomError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(RoomActorMessage::GetState { respond_to: tx })
            .await
            .map_err(|e| RoomError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| RoomError::Internal(format!("response receive failed: {e}")))
    }

    pub async fn is_moderator(&self, user_id: UserId) -> Result<bool, RoomError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(RoomActorMessage::IsModerator {
                user_id,
                respond_to: tx,
            })
            .await
            .map_err(|e| RoomError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| RoomError::Internal(format!("response receive failed: {e}")))
    }

    pub async fn has_right(&self, user_id: UserId, right: Right) -> Result<bool, RoomError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(RoomActorMessage::HasRight {
                user_id,
                right,
                respond_to: tx,
            })
            .await
            .map_err(|e| RoomError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| RoomError::Internal(format!("response receive failed: {e}")))
    }

    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }
}

/// The `RoomActor` implementation.
pub struct RoomActor {
    room_id: RoomId,
    receiver: mpsc::Receiver<RoomActorMessage>,
    /// Child of the coordinator token.
    cancel_token: CancellationToken,
    state: RoomState,
    registry: Arc<dyn ClientRegistry>,
    facade: BroadcastFacade,
    admission: AdmissionController,
    requests: RightsRequests,
    metrics: Arc<ActorMetrics>,
    coordinator_metrics: Arc<CoordinatorMetrics>,
    mailbox: MailboxMonitor,
}

impl RoomActor {
    /// Spawn a new room actor.
    ///
    /// Returns the handle and the task's `JoinHandle` for panic detection.
    pub fn spawn(
        room: Room,
        services: RoomServices,
        settings: RoomSettings,
        cancel_token: CancellationToken,
        metrics: Arc<ActorMetrics>,
        coordinator_metrics: Arc<CoordinatorMetrics>,
    ) -> (RoomActorHandle, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(ROOM_CHANNEL_BUFFER);
        let room_id = room.id;

        let actor = Self {
            room_id,
            receiver,
            cancel_token: cancel_token.clone(),
            state: RoomState::new(room),
            registry: Arc::clone(&services.registry),
            facade: BroadcastFacade::new(
                Arc::clone(&services.registry),
                services.bus,
                services.recording,
                services.collaboration,
            ),
            admission: AdmissionController::new(
                services.registry,
                services.appointments,
                services.oracle,
                settings.date_format,
            ),
            requests: RightsRequests::new(settings.rights_request_ttl),
            metrics,
            coordinator_metrics,
            mailbox: MailboxMonitor::new(ActorType::Room, room_id.to_string()),
        };

        let task_handle = tokio::spawn(actor.run());

        let handle = RoomActorHandle {
            sender,
            cancel_token,
            room_id,
        };

        (handle, task_handle)
    }

    #[instrument(skip_all, name = "rc.actor.room", fields(room_id = %self.room_id))]
    async fn run(mut self) {
        info!(
            target: "rc.actor.room",
            room_id = %self.room_id,
            "RoomActor started"
        );

        let mut expiry_check = tokio::time::interval(REQUEST_EXPIRY_INTERVAL);
        expiry_check.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let expires = self.requests.ttl().is_some();

        loop {
            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    info!(
                        target: "rc.actor.room",
                        room_id = %self.room_id,
                        "RoomActor received cancellation signal"
                    );
                    self.graceful_shutdown();
                    break;
                }

                _ = expiry_check.tick(), if expires => {
                    self.expire_requests();
                }

                msg = self.receiver.recv() => {
                    match msg {
                        Some(message) => {
                            self.mailbox.record_receive(self.receiver.len());
                            self.handle_message(message).await;
                            self.mailbox.record_processed(self.receiver.len());
                            self.metrics.record_message_processed();
                        }
                        None => {
                            info!(
                                target: "rc.actor.room",
                                room_id = %self.room_id,
                                "RoomActor channel closed, exiting"
                            );
                            break;
                        }
                    }
                }
            }
        }

        info!(
            target: "rc.actor.room",
            room_id = %self.room_id,
            messages_processed = self.mailbox.messages_processed(),
            peak_mailbox_depth = self.mailbox.peak_depth(),
            "RoomActor stopped"
        );
    }

    async fn handle_message(&mut self, message: RoomActorMessage) {
        match message {
            RoomActorMessage::Enter {
                participant,
                respond_to,
            } => {
                let result = self.handle_enter(*participant).await;
                let _ = respond_to.send(result);
            }

            RoomActorMessage::Exit { uid, respond_to } => {
                let result = self.handle_exit(uid).await;
                let _ = respond_to.send(result);
            }

            RoomActorMessage::Kick {
                actor,
                target,
                respond_to,
            } => {
                let result = self.handle_kick(actor, target).await;
                let _ = respond_to.send(result);
            }

            RoomActorMessage::RequestRight {
                uid,
                right,
                respond_to,
            } => {
                let result = self.handle_request_right(uid, right).await;
                let _ = respond_to.send(result);
            }

            RoomActorMessage::AllowRight {
                moderator,
                target,
                rights,
                respond_to,
            } => {
                let result = self.handle_allow_right(moderator, target, rights).await;
                let _ = respond_to.send(result);
            }

            RoomActorMessage::DenyRight {
                moderator,
                target,
                rights,
                respond_to,
            } => {
                let result = self.handle_deny_right(moderator, target, rights).await;
                let _ = respond_to.send(result);
            }

            RoomActorMessage::Mute {
                actor,
                session_id,
                mute,
                respond_to,
            } => {
                let result = self.handle_mute(actor, session_id, mute).await;
                let _ = respond_to.send(result);
            }

            RoomActorMessage::MuteOthers { actor, respond_to } => {
                let result = self.handle_mute_others(actor).await;
                let _ = respond_to.send(result);
            }

            RoomActorMessage::AttachStream {
                uid,
                stream,
                respond_to,
            } => {
                let result = self.handle_attach_stream(uid, stream).await;
                let _ = respond_to.send(result);
            }

            RoomActorMessage::DetachStream {
                uid,
                stream_id,
                respond_to,
            } => {
                let result = self.handle_detach_stream(uid, stream_id).await;
                let _ = respond_to.send(result);
            }

            RoomActorMessage::Close { respond_to } => {
                self.process(RoomEvent::Closed).await;
                let _ = respond_to.send(Ok(()));
            }

            RoomActorMessage::Post { message } => {
                self.process_message(*message).await;
            }

            RoomActorMessage::GetState { respond_to } => {
                let _ = respond_to.send(self.get_state());
            }

            RoomActorMessage::IsModerator {
                user_id,
                respond_to,
            } => {
                let _ = respond_to.send(self.user_holds(user_id, Right::Moderator));
            }

            RoomActorMessage::HasRight {
                user_id,
                right,
                respond_to,
            } => {
                let _ = respond_to.send(self.user_holds(user_id, right));
            }
        }
    }

    async fn handle_enter(
        &mut self,
        participant: Participant,
    ) -> Result<AdmissionOutcome, RoomError> {
        if self.registry.get(participant.uid).is_some() {
            return Err(RoomError::Conflict(
                "Participant already registered".to_string(),
            ));
        }

        let outcome = self
            .admission
            .try_admit(participant, &self.state.room, Utc::now())
            .await;

        match &outcome {
            AdmissionOutcome::Admitted(admitted) => {
                self.coordinator_metrics.increment_participants();
                self.process(RoomEvent::Enter { uid: admitted.uid }).await;
            }
            AdmissionOutcome::Gated(gated) => {
                self.coordinator_metrics.increment_participants();
                self.facade.deliver(
                    self.room_id,
                    Audience::Participant(gated.uid),
                    &Notification::Alert {
                        alert: Alert::AwaitingModerator,
                    },
                );
            }
            AdmissionOutcome::Denied(_) => {}
        }

        Ok(outcome)
    }

    async fn handle_exit(&mut self, uid: ParticipantUid) -> Result<(), RoomError> {
        self.member(uid)?;
        self.process(RoomEvent::Exit { uid }).await;
        Ok(())
    }

    async fn handle_kick(
        &mut self,
        actor: ParticipantUid,
        target: ParticipantUid,
    ) -> Result<(), RoomError> {
        let actor = self.member(actor)?;
        if !actor.is_moderator() {
            return Err(RoomError::PermissionDenied(
                "Only moderators may remove participants".to_string(),
            ));
        }
        let target = self.member(target)?;
        if target.has(Right::SuperModerator) {
            return Err(RoomError::PermissionDenied(
                "Super moderators cannot be removed".to_string(),
            ));
        }

        info!(
            target: "rc.actor.room",
            room_id = %self.room_id,
            actor = %actor.uid,
            kicked = %target.uid,
            "Participant removed by moderator"
        );
        self.process(RoomEvent::Kick { uid: target.uid }).await;
        Ok(())
    }

    async fn handle_request_right(
        &mut self,
        uid: ParticipantUid,
        right: Right,
    ) -> Result<RequestOutcome, RoomError> {
        let participant = self.member(uid)?;
        let moderator_present = !self
            .registry
            .list_by_room_where(self.room_id, &Participant::is_moderator)
            .is_empty();

        let outcome = self.requests.evaluate(
            uid,
            right,
            participant.has(right),
            self.state.room.moderated,
            moderator_present,
            Instant::now(),
        );

        match outcome {
            RequestOutcome::AutoGranted => {
                self.change_rights(participant, |p| {
                    p.allow([right]);
                })
                .await;
            }
            RequestOutcome::Requested => {
                self.process(RoomEvent::RequestRight { uid, right }).await;
            }
            RequestOutcome::NoModerator => {
                self.facade.deliver(
                    self.room_id,
                    Audience::Participant(uid),
                    &Notification::Alert {
                        alert: Alert::NoModeratorForRequest,
                    },
                );
            }
            RequestOutcome::AlreadyHeld | RequestOutcome::AlreadyPending => {}
        }

        Ok(outcome)
    }

    async fn handle_allow_right(
        &mut self,
        moderator: ParticipantUid,
        target: ParticipantUid,
        rights: Vec<Right>,
    ) -> Result<(), RoomError> {
        self.require_moderator(moderator)?;
        let participant = self.member(target)?;

        for right in &rights {
            self.requests.resolve(target, *right, true);
        }
        self.change_rights(participant, |p| p.allow(rights)).await;
        Ok(())
    }

    async fn handle_deny_right(
        &mut self,
        moderator: ParticipantUid,
        target: ParticipantUid,
        rights: Vec<Right>,
    ) -> Result<(), RoomError> {
        self.require_moderator(moderator)?;
        let participant = self.member(target)?;

        for right in &rights {
            self.requests.resolve(target, *right, false);
        }
        let room_id = self.room_id;
        self.change_rights(participant, |p| {
            let retracted = p.deny(rights);
            if !retracted.is_empty() {
                debug!(
                    target: "rc.actor.room",
                    room_id = %room_id,
                    uid = %p.uid,
                    retracted = ?retracted,
                    "Activities retracted with their rights"
                );
            }
        })
        .await;
        Ok(())
    }

    async fn handle_mute(
        &mut self,
        actor: ParticipantUid,
        session_id: SessionId,
        mute: bool,
    ) -> Result<(), RoomError> {
        let actor = self.member(actor)?;
        if actor.session_id != session_id && !can_mute_others(&actor) {
            return Err(RoomError::PermissionDenied(
                "Muting others requires moderator rights".to_string(),
            ));
        }
        self.process(RoomEvent::Mute { session_id, mute }).await;
        Ok(())
    }

    async fn handle_mute_others(&mut self, actor: ParticipantUid) -> Result<(), RoomError> {
        let actor = self.member(actor)?;
        if !can_mute_others(&actor) {
            return Err(RoomError::PermissionDenied(
                "Muting others requires moderator rights".to_string(),
            ));
        }
        self.process(RoomEvent::MuteOthers { uid: actor.uid }).await;
        Ok(())
    }

    async fn handle_attach_stream(
        &mut self,
        uid: ParticipantUid,
        stream: StreamDesc,
    ) -> Result<(), RoomError> {
        let mut participant = self.member(uid)?;
        if participant.streams.iter().any(|s| s.id == stream.id) {
            return Err(RoomError::Conflict("Stream already attached".to_string()));
        }
        if stream.kind == StreamKind::Screen
            && !self
                .facade
                .recording()
                .screen_share_allowed(&participant)
                .await
        {
            return Err(RoomError::PermissionDenied(
                "Screen sharing is not allowed".to_string(),
            ));
        }
        for activity in &stream.activities {
            if !participant.grants.set_activity(*activity, true) {
                return Err(RoomError::PermissionDenied(format!(
                    "Missing right for activity {activity:?}"
                )));
            }
        }

        participant.streams.push(stream);
        self.registry.update(&participant);
        self.process(RoomEvent::RightUpdated { uid }).await;
        Ok(())
    }

    async fn handle_detach_stream(
        &mut self,
        uid: ParticipantUid,
        stream_id: StreamId,
    ) -> Result<(), RoomError> {
        let mut participant = self.member(uid)?;
        let Some(index) = participant.streams.iter().position(|s| s.id == stream_id) else {
            return Err(RoomError::Conflict("Stream not attached".to_string()));
        };

        let removed = participant.streams.remove(index);
        for activity in removed.activities {
            let still_carried = participant
                .streams
                .iter()
                .any(|s| s.activities.contains(&activity));
            if !still_carried {
                participant.grants.set_activity(activity, false);
            }
        }

        self.registry.update(&participant);
        self.process(RoomEvent::RightUpdated { uid }).await;
        Ok(())
    }

    /// Edit a participant's grants, write them back and announce the change.
    async fn change_rights(
        &mut self,
        mut participant: Participant,
        edit: impl FnOnce(&mut Participant),
    ) {
        edit(&mut participant);
        if !self.registry.update(&participant) {
            warn!(
                target: "rc.actor.room",
                room_id = %self.room_id,
                uid = %participant.uid,
                "Participant vanished before rights update"
            );
            return;
        }
        self.facade.recording().rights_updated(&participant).await;
        self.process(RoomEvent::RightUpdated {
            uid: participant.uid,
        })
        .await;
    }

    async fn process(&mut self, event: RoomEvent) {
        self.process_message(RoomMessage::new(self.room_id, event))
            .await
    }

    /// Route a message through the facade and settle the room's bookkeeping.
    async fn process_message(&mut self, message: RoomMessage) {
        let reconcile = !matches!(message.event, RoomEvent::ModeratorInRoom { .. });
        let transition = self.facade.apply(&mut self.state, message).await;

        if transition.dropped.is_some() {
            self.metrics.record_dispatch_drop();
        }
        for mutation in &transition.mutations {
            if let Mutation::RemoveParticipant(uid) = mutation {
                self.requests.forget(*uid);
                self.coordinator_metrics.decrement_participants();
            }
        }
        if reconcile {
            self.reconcile_gate().await;
        }
    }

    /// Reveal or hide gated participants when moderator presence changed.
    async fn reconcile_gate(&mut self) {
        let participants = self.registry.list_by_room(self.room_id);
        let Some(present) = quorum::pending_visibility(&self.state.room, &participants) else {
            return;
        };

        info!(
            target: "rc.actor.room",
            room_id = %self.room_id,
            moderator_present = present,
            "Moderator presence changed"
        );
        let message = RoomMessage::new(self.room_id, RoomEvent::ModeratorInRoom { present });
        let transition = self.facade.apply(&mut self.state, message).await;
        if transition.dropped.is_some() {
            self.metrics.record_dispatch_drop();
        }
    }

    fn expire_requests(&mut self) {
        for (uid, right) in self.requests.expire(Instant::now()) {
            info!(
                target: "rc.actor.room",
                room_id = %self.room_id,
                uid = %uid,
                right = right.as_str(),
                "Rights request expired"
            );
            self.facade.deliver(
                self.room_id,
                Audience::Participant(uid),
                &Notification::RightRequestExpired { right },
            );
        }
    }

    fn get_state(&self) -> RoomStatus {
        let participants = self.registry.list_by_room(self.room_id);
        RoomStatus {
            room_id: self.room_id,
            participants: participants.len(),
            visible: participants.iter().filter(|p| p.visible).count(),
            closed: self.state.room.is_closed(),
            moderator_present: quorum::has_moderator(&participants),
            pending_requests: self.requests.pending(),
            activities: self.state.history.len(),
        }
    }

    /// Whether any connection of `user_id` in this room holds `right`.
    fn user_holds(&self, user_id: UserId, right: Right) -> bool {
        !self
            .registry
            .list_by_room_where(self.room_id, &|p| p.user_id() == user_id && p.has(right))
            .is_empty()
    }

    /// Registry copy of a participant of this room.
    fn member(&self, uid: ParticipantUid) -> Result<Participant, RoomError> {
        self.registry
            .get(uid)
            .filter(|p| p.room_id == Some(self.room_id))
            .ok_or_else(|| RoomError::ParticipantNotFound("Participant not in room".to_string()))
    }

    fn require_moderator(&self, uid: ParticipantUid) -> Result<Participant, RoomError> {
        let participant = self.member(uid)?;
        if participant.is_moderator() {
            Ok(participant)
        } else {
            Err(RoomError::PermissionDenied(
                "Only moderators may change rights".to_string(),
            ))
        }
    }

    /// Unregister everyone still in the room.
    fn graceful_shutdown(&mut self) {
        let remaining = self.registry.list_by_room(self.room_id);
        for participant in &remaining {
            if self.registry.remove(participant.uid).is_some() {
                self.coordinator_metrics.decrement_participants();
            }
        }
        if !self.receiver.is_empty() {
            error!(
                target: "rc.actor.room",
                room_id = %self.room_id,
                pending = self.receiver.len(),
                "RoomActor stopping with queued messages"
            );
        }
        info!(
            target: "rc.actor.room",
            room_id = %self.room_id,
            unregistered = remaining.len(),
            "RoomActor released participants"
        );
    }
}

fn can_mute_others(participant: &Participant) -> bool {
    participant.is_moderator() || participant.has(Right::MuteOthers)
}
