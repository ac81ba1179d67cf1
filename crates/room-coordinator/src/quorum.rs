//! Moderator quorum gate.
//!
//! A room gates entry only when it is both moderated and configured to wait
//! for a moderator. While gated, non-moderators are registered but hidden.

use crate::collaborators::ClientRegistry;
use crate::participant::Participant;
use crate::room::Room;

/// Whether anyone in `participants` holds `MODERATOR` (or `SUPER_MODERATOR`).
#[must_use]
pub fn has_moderator(participants: &[Participant]) -> bool {
    participants.iter().any(Participant::is_moderator)
}

/// Whether new non-moderator participants must wait, judged against the
/// registry's current view of the room.
#[must_use]
pub fn requires_wait(room: &Room, registry: &dyn ClientRegistry) -> bool {
    room.gates_on_moderator()
        && registry
            .list_by_room_where(room.id, &Participant::is_moderator)
            .is_empty()
}

/// Same as [`requires_wait`] over an already-fetched participant list.
#[must_use]
pub fn requires_wait_among(room: &Room, participants: &[Participant]) -> bool {
    room.gates_on_moderator() && !has_moderator(participants)
}

/// Visibility the gate currently demands, if any participant disagrees.
///
/// Returns `Some(moderator_present)` when the room gates and at least one
/// non-moderator's visibility differs from it, `None` when nothing needs to
/// change.
#[must_use]
pub fn pending_visibility(room: &Room, participants: &[Participant]) -> Option<bool> {
    if !room.gates_on_moderator() {
        return None;
    }
    let present = has_moderator(participants);
    participants
        .iter()
        .any(|p| !p.is_moderator() && p.visible != present)
        .then_some(present)
}
