//! Request/grant protocol for elevated rights.
//!
//! Each `(participant, right)` pair moves through
//! `Idle -> Requested -> {Granted | Denied | Expired}`:
//!
//! - Unmoderated room with no moderator present: granted immediately.
//! - Moderated room with no moderator present: nobody can answer, the
//!   requester is told so and the pair stays idle.
//! - Moderators present: the pair waits for a moderator's allow or deny.
//!
//! Pending requests expire only when a TTL is configured.

use crate::observability::metrics as prom;
use crate::rights::Right;

use common::types::ParticipantUid;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    Idle,
    Requested { at: Instant },
    Granted,
    Denied,
    Expired,
}

/// What happened to a new request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    /// Granted without a moderator; the caller applies the right.
    AutoGranted,
    /// Forwarded to moderators.
    Requested,
    /// Moderated room without a moderator; nothing changes.
    NoModerator,
    AlreadyHeld,
    AlreadyPending,
}

impl RequestOutcome {
    /// Metric label.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            RequestOutcome::AutoGranted => "auto_granted",
            RequestOutcome::Requested => "requested",
            RequestOutcome::NoModerator => "no_moderator",
            RequestOutcome::AlreadyHeld => "already_held",
            RequestOutcome::AlreadyPending => "already_pending",
        }
    }
}

/// Per-room rights request table.
#[derive(Debug, Default)]
pub struct RightsRequests {
    entries: HashMap<(ParticipantUid, Right), RequestState>,
    ttl: Option<Duration>,
}

impl RightsRequests {
    #[must_use]
    pub fn new(ttl: Option<Duration>) -> Self {
        Self {
            entries: HashMap::new(),
            ttl,
        }
    }

    #[must_use]
    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    /// Current state of a pair.
    #[must_use]
    pub fn state(&self, uid: ParticipantUid, right: Right) -> RequestState {
        self.entries
            .get(&(uid, right))
            .copied()
            .unwrap_or(RequestState::Idle)
    }

    /// Requests still waiting for a moderator.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.entries
            .values()
            .filter(|s| matches!(s, RequestState::Requested { .. }))
            .count()
    }

    /// Record a request and decide how it proceeds.
    ///
    /// `already_held` is whether the requester holds the right now;
    /// `moderated` and `moderator_present` describe the room.
    pub fn evaluate(
        &mut self,
        uid: ParticipantUid,
        right: Right,
        already_held: bool,
        moderated: bool,
        moderator_present: bool,
        now: Instant,
    ) -> RequestOutcome {
        let outcome = if already_held {
            RequestOutcome::AlreadyHeld
        } else if matches!(self.state(uid, right), RequestState::Requested { .. }) {
            RequestOutcome::AlreadyPending
        } else if moderator_present {
            self.entries
                .insert((uid, right), RequestState::Requested { at: now });
            RequestOutcome::Requested
        } else if moderated {
            RequestOutcome::NoModerator
        } else {
            self.entries.insert((uid, right), RequestState::Granted);
            RequestOutcome::AutoGranted
        };

        debug!(
            target: "rc.rights",
            uid = %uid,
            right = right.as_str(),
            outcome = outcome.as_str(),
            "Rights request evaluated"
        );
        prom::record_rights_request(right.as_str(), outcome.as_str());
        outcome
    }

    /// Settle a pending request. Returns `false` if none was pending.
    pub fn resolve(&mut self, uid: ParticipantUid, right: Right, granted: bool) -> bool {
        match self.entries.get_mut(&(uid, right)) {
            Some(state @ RequestState::Requested { .. }) => {
                *state = if granted {
                    RequestState::Granted
                } else {
                    RequestState::Denied
                };
                true
            }
            _ => false,
        }
    }

    /// Expire requests pending for at least the TTL. Returns the expired
    /// pairs; always empty when no TTL is configured.
    pub fn expire(&mut self, now: Instant) -> Vec<(ParticipantUid, Right)> {
        let Some(ttl) = self.ttl else {
            return Vec::new();
        };

        let mut expired = Vec::new();
        for (&(uid, right), state) in &mut self.entries {
            if let RequestState::Requested { at } = *state {
                if now.saturating_duration_since(at) >= ttl {
                    *state = RequestState::Expired;
                    expired.push((uid, right));
                }
            }
        }
        for (_, right) in &expired {
            prom::record_rights_request(right.as_str(), "expired");
        }
        expired
    }

    /// Drop all state of a participant that left.
    pub fn forget(&mut self, uid: ParticipantUid) {
        self.entries.retain(|(owner, _), _| *owner != uid);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_unmoderated_without_moderator_auto_grants() {
        let mut requests = RightsRequests::default();
        let uid = ParticipantUid::new();

        let outcome = requests.evaluate(uid, Right::Whiteboard, false, false, false, Instant::now());
        assert_eq!(outcome, RequestOutcome::AutoGranted);
        assert_eq!(requests.state(uid, Right::Whiteboard), RequestState::Granted);
    }

    #[test]
    fn test_moderated_without_moderator_stays_idle() {
        let mut requests = RightsRequests::default();
        let uid = ParticipantUid::new();

        let outcome = requests.evaluate(uid, Right::Presenter, false, true, false, Instant::now());
        assert_eq!(outcome, RequestOutcome::NoModerator);
        assert_eq!(requests.state(uid, Right::Presenter), RequestState::Idle);
    }

    #[test]
    fn test_request_then_grant() {
        let mut requests = RightsRequests::default();
        let uid = ParticipantUid::new();

        let outcome = requests.evaluate(uid, Right::Share, false, true, true, Instant::now());
        assert_eq!(outcome, RequestOutcome::Requested);
        assert_eq!(requests.pending(), 1);

        let again = requests.evaluate(uid, Right::Share, false, true, true, Instant::now());
        assert_eq!(again, RequestOutcome::AlreadyPending);

        assert!(requests.resolve(uid, Right::Share, true));
        assert_eq!(requests.state(uid, Right::Share), RequestState::Granted);
        assert!(!requests.resolve(uid, Right::Share, false));
        assert_eq!(requests.pending(), 0);
    }

    #[test]
    fn test_request_then_deny_allows_new_request() {
        let mut requests = RightsRequests::default();
        let uid = ParticipantUid::new();

        requests.evaluate(uid, Right::Audio, false, false, true, Instant::now());
        assert!(requests.resolve(uid, Right::Audio, false));
        assert_eq!(requests.state(uid, Right::Audio), RequestState::Denied);

        let outcome = requests.evaluate(uid, Right::Audio, false, false, true, Instant::now());
        assert_eq!(outcome, RequestOutcome::Requested);
    }

    #[test]
    fn test_held_right_not_requested() {
        let mut requests = RightsRequests::default();
        let uid = ParticipantUid::new();
        let outcome = requests.evaluate(uid, Right::Video, true, true, true, Instant::now());
        assert_eq!(outcome, RequestOutcome::AlreadyHeld);
        assert_eq!(requests.pending(), 0);
    }

    #[test]
    fn test_no_expiry_without_ttl() {
        let mut requests = RightsRequests::new(None);
        let uid = ParticipantUid::new();
        let start = Instant::now();
        requests.evaluate(uid, Right::Share, false, true, true, start);

        assert!(requests.expire(start + Duration::from_secs(3600)).is_empty());
        assert_eq!(requests.pending(), 1);
    }

    #[test]
    fn test_expiry_after_ttl() {
        let mut requests = RightsRequests::new(Some(Duration::from_secs(30)));
        let uid = ParticipantUid::new();
        let start = Instant::now();
        requests.evaluate(uid, Right::Share, false, true, true, start);

        assert!(requests.expire(start + Duration::from_secs(29)).is_empty());
        let expired = requests.expire(start + Duration::from_secs(30));
        assert_eq!(expired, vec![(uid, Right::Share)]);
        assert_eq!(requests.state(uid, Right::Share), RequestState::Expired);
        assert!(!requests.resolve(uid, Right::Share, true));
    }

    #[test]
    fn test_forget_drops_participant_state() {
        let mut requests = RightsRequests::default();
        let a = ParticipantUid::new();
        let b = ParticipantUid::new();
        requests.evaluate(a, Right::Share, false, true, true, Instant::now());
        requests.evaluate(b, Right::Share, false, true, true, Instant::now());

        requests.forget(a);
        assert_eq!(requests.state(a, Right::Share), RequestState::Idle);
        assert_eq!(requests.pending(), 1);
    }
}
