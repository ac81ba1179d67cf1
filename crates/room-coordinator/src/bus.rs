//! In-process [`MessageBus`] delivering JSON frames over per-participant
//! channels.
//!
//! Each subscriber gets a bounded channel; a full channel drops the frame
//! for that subscriber only. Frames are serialized once per send and shared.

use crate::collaborators::{BusError, MessageBus};
use crate::events::Notification;

use common::types::{ParticipantUid, RoomId};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Default per-subscriber channel capacity.
pub const DEFAULT_SUBSCRIBER_BUFFER: usize = 256;

/// Serialized notification as handed to the transport.
pub type Frame = Arc<str>;

#[derive(Debug)]
struct Subscriber {
    room_id: RoomId,
    sender: mpsc::Sender<Frame>,
}

/// Message bus backed by tokio channels.
#[derive(Debug)]
pub struct ChannelMessageBus {
    subscribers: RwLock<HashMap<ParticipantUid, Subscriber>>,
    buffer: usize,
}

impl Default for ChannelMessageBus {
    fn default() -> Self {
        Self::new(DEFAULT_SUBSCRIBER_BUFFER)
    }
}

impl ChannelMessageBus {
    #[must_use]
    pub fn new(buffer: usize) -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            buffer: buffer.max(1),
        }
    }

    /// Subscribe a participant to a room. Replaces any earlier subscription
    /// of the same uid.
    pub fn subscribe(&self, room_id: RoomId, uid: ParticipantUid) -> mpsc::Receiver<Frame> {
        let (sender, receiver) = mpsc::channel(self.buffer);
        self.subscribers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(uid, Subscriber { room_id, sender });
        receiver
    }

    /// Returns `false` if the uid had no subscription.
    pub fn unsubscribe(&self, uid: ParticipantUid) -> bool {
        self.subscribers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&uid)
            .is_some()
    }

    #[must_use]
    pub fn subscriber_count(&self, room_id: RoomId) -> usize {
        self.subscribers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .filter(|s| s.room_id == room_id)
            .count()
    }

    fn encode(notification: &Notification) -> Result<Frame, BusError> {
        serde_json::to_string(notification)
            .map(Frame::from)
            .map_err(|e| BusError::Encode(e.to_string()))
    }

    fn try_deliver(
        uid: ParticipantUid,
        sender: &mpsc::Sender<Frame>,
        frame: Frame,
    ) -> Result<(), BusError> {
        match sender.try_send(frame) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(target: "rc.bus", uid = %uid, "Channel full, dropping frame");
                Err(BusError::Full(uid.to_string()))
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!(target: "rc.bus", uid = %uid, "Channel closed (disconnected)");
                Err(BusError::Closed(uid.to_string()))
            }
        }
    }
}

impl MessageBus for ChannelMessageBus {
    fn send_to_room(&self, room_id: RoomId, notification: &Notification) -> Result<(), BusError> {
        let frame = Self::encode(notification)?;
        let subscribers = self.subscribers.read().unwrap_or_else(|e| e.into_inner());

        let mut first_error = None;
        for (uid, subscriber) in subscribers.iter().filter(|(_, s)| s.room_id == room_id) {
            if let Err(e) = Self::try_deliver(*uid, &subscriber.sender, Arc::clone(&frame)) {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn send_to_participant(
        &self,
        uid: ParticipantUid,
        notification: &Notification,
    ) -> Result<(), BusError> {
        let frame = Self::encode(notification)?;
        let subscribers = self.subscribers.read().unwrap_or_else(|e| e.into_inner());
        let subscriber = subscribers
            .get(&uid)
            .ok_or_else(|| BusError::NoSubscriber(uid.to_string()))?;
        Self::try_deliver(uid, &subscriber.sender, frame)
    }
}
