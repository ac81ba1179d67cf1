//! In-process [`ClientRegistry`] backed by a lock-protected map.

use crate::collaborators::ClientRegistry;
use crate::participant::Participant;

use common::types::{ParticipantUid, RoomId, SessionId};
use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Debug)]
struct Entry {
    /// Registration sequence, used for stable listing order.
    seq: u64,
    participant: Participant,
}

#[derive(Debug, Default)]
struct Inner {
    next_seq: u64,
    by_uid: HashMap<ParticipantUid, Entry>,
    by_session: HashMap<SessionId, ParticipantUid>,
}

/// Registry shared by every room actor in the process.
#[derive(Debug, Default)]
pub struct InMemoryClientRegistry {
    inner: RwLock<Inner>,
}

impl InMemoryClientRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total participants across all rooms.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .by_uid
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ClientRegistry for InMemoryClientRegistry {
    fn add(&self, participant: Participant) -> usize {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        let room_id = participant.room_id;
        let seq = inner.next_seq;
        inner.next_seq += 1;

        let session_id = participant.session_id.clone();
        let uid = participant.uid;
        if let Some(previous) = inner.by_uid.insert(uid, Entry { seq, participant }) {
            // Re-adding a uid keeps the latest session mapping only
            inner.by_session.remove(&previous.participant.session_id);
        }
        inner.by_session.insert(session_id, uid);

        inner
            .by_uid
            .values()
            .filter(|e| e.participant.room_id.is_some() && e.participant.room_id == room_id)
            .count()
    }

    fn update(&self, participant: &Participant) -> bool {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        let Some(entry) = inner.by_uid.get_mut(&participant.uid) else {
            return false;
        };
        let old_session = std::mem::replace(&mut entry.participant, participant.clone()).session_id;
        if old_session != participant.session_id {
            inner.by_session.remove(&old_session);
            inner
                .by_session
                .insert(participant.session_id.clone(), participant.uid);
        }
        true
    }

    fn remove(&self, uid: ParticipantUid) -> Option<Participant> {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        let entry = inner.by_uid.remove(&uid)?;
        if inner.by_session.get(&entry.participant.session_id) == Some(&uid) {
            inner.by_session.remove(&entry.participant.session_id);
        }
        Some(entry.participant)
    }

    fn get(&self, uid: ParticipantUid) -> Option<Participant> {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .by_uid
            .get(&uid)
            .map(|e| e.participant.clone())
    }

    fn get_by_session_id(&self, session_id: &SessionId) -> Option<Participant> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        let uid = inner.by_session.get(session_id)?;
        inner.by_uid.get(uid).map(|e| e.participant.clone())
    }

    fn list_by_room(&self, room_id: RoomId) -> Vec<Participant> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        let mut entries: Vec<&Entry> = inner
            .by_uid
            .values()
            .filter(|e| e.participant.room_id == Some(room_id))
            .collect();
        entries.sort_by_key(|e| e.seq);
        entries.into_iter().map(|e| e.participant.clone()).collect()
    }

    fn count_in_room(&self, room_id: RoomId) -> usize {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .by_uid
            .values()
            .filter(|e| e.participant.room_id == Some(room_id))
            .count()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::participant::User;
    use crate::rights::Right;
    use common::types::UserId;

    fn participant(room: u64, user: u64, session: &str) -> Participant {
        let mut p = Participant::new(
            User::new(UserId(user), format!("user-{user}")),
            SessionId::from(session),
        );
        p.room_id = Some(RoomId(room));
        p
    }

    #[test]
    fn test_add_returns_room_count() {
        let registry = InMemoryClientRegistry::new();
        assert_eq!(registry.add(participant(1, 1, "a")), 1);
        assert_eq!(registry.add(participant(1, 2, "b")), 2);
        assert_eq!(registry.add(participant(2, 3, "c")), 1);
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_list_preserves_registration_order() {
        let registry = InMemoryClientRegistry::new();
        let uids: Vec<_> = (0..5)
            .map(|i| {
                let p = participant(1, i, &format!("s{i}"));
                let uid = p.uid;
                registry.add(p);
                uid
            })
            .collect();

        let listed: Vec<_> = registry
            .list_by_room(RoomId(1))
            .iter()
            .map(|p| p.uid)
            .collect();
        assert_eq!(listed, uids);
    }

    #[test]
    fn test_update_replaces_record_and_session_index() {
        let registry = InMemoryClientRegistry::new();
        let mut p = participant(1, 1, "old");
        registry.add(p.clone());

        p.allow([Right::Presenter]);
        p.session_id = SessionId::from("new");
        assert!(registry.update(&p));

        assert!(registry.get(p.uid).unwrap().has(Right::Presenter));
        assert!(registry.get_by_session_id(&SessionId::from("old")).is_none());
        assert_eq!(
            registry
                .get_by_session_id(&SessionId::from("new"))
                .unwrap()
                .uid,
            p.uid
        );
    }

    #[test]
    fn test_update_unknown_is_false() {
        let registry = InMemoryClientRegistry::new();
        assert!(!registry.update(&participant(1, 1, "a")));
    }

    #[test]
    fn test_remove_clears_indexes() {
        let registry = InMemoryClientRegistry::new();
        let p = participant(1, 1, "a");
        registry.add(p.clone());

        assert_eq!(registry.remove(p.uid).unwrap().uid, p.uid);
        assert!(registry.remove(p.uid).is_none());
        assert!(registry.get_by_session_id(&SessionId::from("a")).is_none());
        assert_eq!(registry.count_in_room(RoomId(1)), 0);
    }

    #[test]
    fn test_list_where_filters() {
        let registry = InMemoryClientRegistry::new();
        let mut moderator = participant(1, 1, "a");
        moderator.allow([Right::Moderator]);
        registry.add(moderator.clone());
        registry.add(participant(1, 2, "b"));

        let moderators = registry.list_by_room_where(RoomId(1), &|p| p.is_moderator());
        assert_eq!(moderators.len(), 1);
        assert_eq!(moderators.first().unwrap().uid, moderator.uid);
    }
}
