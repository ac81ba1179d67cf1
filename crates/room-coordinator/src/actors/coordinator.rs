//! `CoordinatorActor` - singleton supervisor for room actors.
//!
//! - Singleton per coordinator instance
//! - Opens and removes `RoomActor`s
//! - Owns the root `CancellationToken` for graceful shutdown
//! - Monitors child actor health (panic detection via `JoinHandle`)
//!
//! # Graceful Shutdown
//!
//! On shutdown the coordinator stops opening rooms, cancels the root token
//! (which reaches every room actor) and waits for room tasks up to the
//! requested deadline.

use super::messages::{CoordinatorMessage, CoordinatorStatus};
use super::metrics::{ActorMetrics, ActorType, CoordinatorMetrics, MailboxMonitor};
use super::room::{RoomActor, RoomActorHandle, RoomServices, RoomSettings};
use crate::errors::RoomError;
use crate::room::Room;

use common::types::RoomId;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// Default channel buffer size for the coordinator mailbox.
const COORDINATOR_CHANNEL_BUFFER: usize = 1000;

/// Wait for a removed room task before giving up on it.
const ROOM_REMOVAL_TIMEOUT: Duration = Duration::from_secs(5);

/// Wait for room tasks on shutdown when no deadline was requested.
const DEFAULT_SHUTDOWN_DEADLINE: Duration = Duration::from_secs(30);

/// Static coordinator configuration.
#[derive(Debug, Clone)]
pub struct CoordinatorSettings {
    pub coordinator_id: String,
    /// Open rooms allowed at once.
    pub max_rooms: u32,
    pub room: RoomSettings,
}

/// Handle to the `CoordinatorActor`.
#[derive(Clone)]
pub struct CoordinatorActorHandle {
    sender: mpsc::Sender<CoordinatorMessage>,
    cancel_token: CancellationToken,
}

impl CoordinatorActorHandle {
    /// Spawn the coordinator actor and return a handle to it.
    #[must_use]
    pub fn new(
        settings: CoordinatorSettings,
        services: RoomServices,
        metrics: Arc<ActorMetrics>,
        coordinator_metrics: Arc<CoordinatorMetrics>,
    ) -> Self {
        let (sender, receiver) = mpsc::channel(COORDINATOR_CHANNEL_BUFFER);
        let cancel_token = CancellationToken::new();

        let actor = CoordinatorActor::new(
            settings,
            services,
            receiver,
            cancel_token.clone(),
            metrics,
            coordinator_metrics,
        );

        tokio::spawn(actor.run());

        Self {
            sender,
            cancel_token,
        }
    }

    /// Spawn a room actor for `room`.
    pub async fn open_room(&self, room: Room) -> Result<RoomActorHandle, RoomError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(CoordinatorMessage::OpenRoom {
                room: Box::new(room),
                respond_to: tx,
            })
            .await
            .map_err(|e| RoomError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| RoomError::Internal(format!("response receive failed: {e}")))?
    }

    pub async fn get_room(&self, room_id: RoomId) -> Result<RoomActorHandle, RoomError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(CoordinatorMessage::GetRoom {
                room_id,
                respond_to: tx,
            })
            .await
            .map_err(|e| RoomError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| RoomError::Internal(format!("response receive failed: {e}")))?
    }

    /// Stop a room actor and forget it.
    pub async fn remove_room(&self, room_id: RoomId) -> Result<(), RoomError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(CoordinatorMessage::RemoveRoom {
                room_id,
                respond_to: tx,
            })
            .await
            .map_err(|e| RoomError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| RoomError::Internal(format!("response receive failed: {e}")))?
    }

    pub async fn get_status(&self) -> Result<CoordinatorStatus, RoomError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(CoordinatorMessage::GetStatus { respond_to: tx })
            .await
            .map_err(|e| RoomError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| RoomError::Internal(format!("response receive failed: {e}")))
    }

    /// Initiate graceful shutdown.
    pub async fn shutdown(&self, deadline: Duration) -> Result<(), RoomError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(CoordinatorMessage::Shutdown {
                deadline,
                respond_to: tx,
            })
            .await
            .map_err(|e| RoomError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| RoomError::Internal(format!("response receive failed: {e}")))?
    }

    /// Cancel the actor (for immediate shutdown).
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// Get a child token for spawning child tasks.
    #[must_use]
    pub fn child_token(&self) -> CancellationToken {
        self.cancel_token.child_token()
    }
}

struct ManagedRoom {
    handle: RoomActorHandle,
    task_handle: JoinHandle<()>,
}

/// The `CoordinatorActor` implementation.
pub struct CoordinatorActor {
    settings: CoordinatorSettings,
    services: RoomServices,
    receiver: mpsc::Receiver<CoordinatorMessage>,
    /// Root token; room actors get children of it.
    cancel_token: CancellationToken,
    rooms: HashMap<RoomId, ManagedRoom>,
    accepting_new: bool,
    shutdown_deadline: Duration,
    metrics: Arc<ActorMetrics>,
    coordinator_metrics: Arc<CoordinatorMetrics>,
    mailbox: MailboxMonitor,
}

impl CoordinatorActor {
    fn new(
        settings: CoordinatorSettings,
        services: RoomServices,
        receiver: mpsc::Receiver<CoordinatorMessage>,
        cancel_token: CancellationToken,
        metrics: Arc<ActorMetrics>,
        coordinator_metrics: Arc<CoordinatorMetrics>,
    ) -> Self {
        let mailbox = MailboxMonitor::new(ActorType::Coordinator, settings.coordinator_id.clone());

        Self {
            settings,
            services,
            receiver,
            cancel_token,
            rooms: HashMap::new(),
            accepting_new: true,
            shutdown_deadline: DEFAULT_SHUTDOWN_DEADLINE,
            metrics,
            coordinator_metrics,
            mailbox,
        }
    }

    #[instrument(
        skip_all,
        name = "rc.actor.coordinator",
        fields(coordinator_id = %self.settings.coordinator_id)
    )]
    async fn run(mut self) {
        info!(
            target: "rc.actor.coordinator",
            coordinator_id = %self.settings.coordinator_id,
            max_rooms = self.settings.max_rooms,
            "CoordinatorActor started"
        );

        loop {
            self.check_room_health().await;

            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    info!(
                        target: "rc.actor.coordinator",
                        coordinator_id = %self.settings.coordinator_id,
                        "CoordinatorActor received cancellation signal"
                    );
                    self.graceful_shutdown().await;
                    break;
                }

                msg = self.receiver.recv() => {
                    match msg {
                        Some(message) => {
                            self.mailbox.record_receive(self.receiver.len());
                            self.handle_message(message);
                            self.mailbox.record_processed(self.receiver.len());
                            self.metrics.record_message_processed();
                        }
                        None => {
                            info!(
                                target: "rc.actor.coordinator",
                                coordinator_id = %self.settings.coordinator_id,
                                "CoordinatorActor channel closed, exiting"
                            );
                            break;
                        }
                    }
                }
            }
        }

        info!(
            target: "rc.actor.coordinator",
            coordinator_id = %self.settings.coordinator_id,
            rooms_remaining = self.rooms.len(),
            messages_processed = self.mailbox.messages_processed(),
            peak_mailbox_depth = self.mailbox.peak_depth(),
            "CoordinatorActor stopped"
        );
    }

    fn handle_message(&mut self, message: CoordinatorMessage) {
        match message {
            CoordinatorMessage::OpenRoom { room, respond_to } => {
                let result = self.open_room(*room);
                let _ = respond_to.send(result);
            }

            CoordinatorMessage::GetRoom {
                room_id,
                respond_to,
            } => {
                let result = self.get_room(room_id);
                let _ = respond_to.send(result);
            }

            CoordinatorMessage::RemoveRoom {
                room_id,
                respond_to,
            } => {
                let result = self.remove_room(room_id);
                let _ = respond_to.send(result);
            }

            CoordinatorMessage::GetStatus { respond_to } => {
                let _ = respond_to.send(self.get_status());
            }

            CoordinatorMessage::Shutdown {
                deadline,
                respond_to,
            } => {
                let result = self.initiate_shutdown(deadline);
                let _ = respond_to.send(result);
            }
        }
    }

    fn open_room(&mut self, room: Room) -> Result<RoomActorHandle, RoomError> {
        if !self.accepting_new {
            return Err(RoomError::Draining);
        }
        if self.rooms.contains_key(&room.id) {
            return Err(RoomError::Conflict("Room already open".to_string()));
        }
        if self.rooms.len() >= self.settings.max_rooms as usize {
            warn!(
                target: "rc.actor.coordinator",
                coordinator_id = %self.settings.coordinator_id,
                max_rooms = self.settings.max_rooms,
                "Room capacity reached"
            );
            return Err(RoomError::CoordinatorCapacityExceeded);
        }

        let room_id = room.id;
        debug!(
            target: "rc.actor.coordinator",
            coordinator_id = %self.settings.coordinator_id,
            room_id = %room_id,
            "Opening room actor"
        );

        let (handle, task_handle) = RoomActor::spawn(
            room,
            self.services.clone(),
            self.settings.room.clone(),
            self.cancel_token.child_token(),
            Arc::clone(&self.metrics),
            Arc::clone(&self.coordinator_metrics),
        );

        self.rooms.insert(
            room_id,
            ManagedRoom {
                handle: handle.clone(),
                task_handle,
            },
        );
        self.metrics.room_opened();
        self.publish_room_count();

        info!(
            target: "rc.actor.coordinator",
            coordinator_id = %self.settings.coordinator_id,
            room_id = %room_id,
            total_rooms = self.rooms.len(),
            "Room actor opened"
        );

        Ok(handle)
    }

    fn get_room(&self, room_id: RoomId) -> Result<RoomActorHandle, RoomError> {
        self.rooms
            .get(&room_id)
            .map(|managed| managed.handle.clone())
            .ok_or_else(|| RoomError::RoomNotFound(room_id.to_string()))
    }

    /// Cancel a room actor and wait for it in the background so the
    /// coordinator loop is never blocked on a room.
    fn remove_room(&mut self, room_id: RoomId) -> Result<(), RoomError> {
        let Some(managed) = self.rooms.remove(&room_id) else {
            return Err(RoomError::RoomNotFound(room_id.to_string()));
        };

        managed.handle.cancel();

        let coordinator_id = self.settings.coordinator_id.clone();
        tokio::spawn(async move {
            match tokio::time::timeout(ROOM_REMOVAL_TIMEOUT, managed.task_handle).await {
                Ok(Ok(())) => {
                    debug!(
                        target: "rc.actor.coordinator",
                        coordinator_id = %coordinator_id,
                        room_id = %room_id,
                        "Room actor task completed cleanly"
                    );
                }
                Ok(Err(e)) => {
                    warn!(
                        target: "rc.actor.coordinator",
                        coordinator_id = %coordinator_id,
                        room_id = %room_id,
                        error = ?e,
                        "Room actor task panicked during removal"
                    );
                }
                Err(_) => {
                    warn!(
                        target: "rc.actor.coordinator",
                        coordinator_id = %coordinator_id,
                        room_id = %room_id,
                        "Room actor task cleanup timed out"
                    );
                }
            }
        });

        self.metrics.room_removed();
        self.publish_room_count();

        info!(
            target: "rc.actor.coordinator",
            coordinator_id = %self.settings.coordinator_id,
            room_id = %room_id,
            total_rooms = self.rooms.len(),
            "Room actor removed"
        );

        Ok(())
    }

    fn get_status(&self) -> CoordinatorStatus {
        CoordinatorStatus {
            coordinator_id: self.settings.coordinator_id.clone(),
            room_count: self.rooms.len(),
            participant_count: self.coordinator_metrics.participants(),
            is_draining: !self.accepting_new,
            mailbox_depth: self.mailbox.current_depth(),
        }
    }

    fn initiate_shutdown(&mut self, deadline: Duration) -> Result<(), RoomError> {
        info!(
            target: "rc.actor.coordinator",
            coordinator_id = %self.settings.coordinator_id,
            room_count = self.rooms.len(),
            deadline_secs = deadline.as_secs(),
            "Initiating graceful shutdown"
        );

        self.accepting_new = false;
        self.shutdown_deadline = deadline;
        self.cancel_token.cancel();

        Ok(())
    }

    async fn graceful_shutdown(&mut self) {
        self.accepting_new = false;
        info!(
            target: "rc.actor.coordinator",
            coordinator_id = %self.settings.coordinator_id,
            room_count = self.rooms.len(),
            "Performing graceful shutdown"
        );

        for managed in self.rooms.values() {
            managed.handle.cancel();
        }

        let deadline = tokio::time::Instant::now() + self.shutdown_deadline;
        for (room_id, managed) in self.rooms.drain() {
            match tokio::time::timeout_at(deadline, managed.task_handle).await {
                Ok(Ok(())) => {
                    debug!(
                        target: "rc.actor.coordinator",
                        coordinator_id = %self.settings.coordinator_id,
                        room_id = %room_id,
                        "Room actor completed cleanly"
                    );
                }
                Ok(Err(e)) => {
                    warn!(
                        target: "rc.actor.coordinator",
                        coordinator_id = %self.settings.coordinator_id,
                        room_id = %room_id,
                        error = ?e,
                        "Room actor task panicked during shutdown"
                    );
                }
                Err(_) => {
                    warn!(
                        target: "rc.actor.coordinator",
                        coordinator_id = %self.settings.coordinator_id,
                        room_id = %room_id,
                        "Room actor shutdown timed out"
                    );
                }
            }
            self.metrics.room_removed();
        }
        self.publish_room_count();

        info!(
            target: "rc.actor.coordinator",
            coordinator_id = %self.settings.coordinator_id,
            "Graceful shutdown complete"
        );
    }

    /// Reap room actors whose task ended without being removed.
    async fn check_room_health(&mut self) {
        let finished: Vec<RoomId> = self
            .rooms
            .iter()
            .filter(|(_, managed)| managed.task_handle.is_finished())
            .map(|(room_id, _)| *room_id)
            .collect();

        for room_id in finished {
            let Some(managed) = self.rooms.remove(&room_id) else {
                continue;
            };
            warn!(
                target: "rc.actor.coordinator",
                coordinator_id = %self.settings.coordinator_id,
                room_id = %room_id,
                "Room actor task finished unexpectedly"
            );

            match managed.task_handle.await {
                Ok(()) => {
                    info!(
                        target: "rc.actor.coordinator",
                        coordinator_id = %self.settings.coordinator_id,
                        room_id = %room_id,
                        "Room actor exited cleanly"
                    );
                }
                Err(join_error) => {
                    if join_error.is_panic() {
                        error!(
                            target: "rc.actor.coordinator",
                            coordinator_id = %self.settings.coordinator_id,
                            room_id = %room_id,
                            error = ?join_error,
                            "Room actor panicked"
                        );
                        self.metrics.record_panic(ActorType::Room);
                    }
                }
            }

            self.metrics.room_removed();
            self.publish_room_count();
        }
    }

    fn publish_room_count(&self) {
        self.coordinator_metrics
            .set_rooms(u32::try_from(self.rooms.len()).unwrap_or(u32::MAX));
    }
}
