//! Room activity log: joins, leaves, kicks, rights requests and questions.

use crate::participant::Participant;
use crate::rights::Right;

use chrono::{DateTime, Utc};
use common::types::{ParticipantUid, UserId};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use uuid::Uuid;

/// Entries kept per room before the oldest are discarded.
pub const DEFAULT_HISTORY_LIMIT: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActivityId(pub Uuid);

impl ActivityId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ActivityId {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    RoomEnter,
    RoomExit,
    Kicked,
    RequestRight(Right),
    HaveQuestion,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub id: ActivityId,
    pub kind: ActivityKind,
    pub uid: ParticipantUid,
    pub user_id: UserId,
    pub display_name: String,
    pub at: DateTime<Utc>,
}

impl ActivityEntry {
    #[must_use]
    pub fn new(kind: ActivityKind, subject: &Participant, at: DateTime<Utc>) -> Self {
        Self {
            id: ActivityId::new(),
            kind,
            uid: subject.uid,
            user_id: subject.user.id,
            display_name: subject.user.display_name.clone(),
            at,
        }
    }
}

/// Bounded, insertion-ordered activity history of one room.
#[derive(Debug, Clone)]
pub struct ActivityLog {
    entries: VecDeque<ActivityEntry>,
    limit: usize,
}

impl Default for ActivityLog {
    fn default() -> Self {
        Self::with_limit(DEFAULT_HISTORY_LIMIT)
    }
}

impl ActivityLog {
    #[must_use]
    pub fn with_limit(limit: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            limit: limit.max(1),
        }
    }

    pub fn push(&mut self, entry: ActivityEntry) {
        if self.entries.len() >= self.limit {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    /// Returns `false` if no entry had the id.
    pub fn remove(&mut self, id: ActivityId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.id != id);
        self.entries.len() != before
    }

    #[must_use]
    pub fn contains(&self, id: ActivityId) -> bool {
        self.entries.iter().any(|e| e.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ActivityEntry> {
        self.entries.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
