//! Pure event dispatch.
//!
//! [`dispatch`] maps one [`RoomMessage`] against a read-only view of the room
//! to a [`Transition`]: the state mutations to apply and the notifications to
//! send, in order. It performs no I/O; the broadcast facade applies the
//! result.
//!
//! Dispatch never fails. Messages that cannot be processed (unknown
//! participant, wrong room, disabled gate) are logged and reported through
//! [`Transition::dropped`] with no mutations and no notifications.

use crate::activity::{ActivityEntry, ActivityId, ActivityKind, ActivityLog};
use crate::events::{
    Audience, Notice, Notification, RecordingButtons, RoomEvent, RoomMessage, RoomOptions,
    RoomSnapshot, RosterStream,
};
use crate::participant::{roster_order, Participant};
use crate::quorum;
use crate::room::{Room, RoomElement, RoomType};

use chrono::{DateTime, Utc};
use common::types::{ParticipantUid, SessionId};
use std::collections::BTreeSet;
use tracing::{debug, error, warn};

/// Recording state needed to render interview recording controls.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordingView {
    /// The room is being recorded.
    pub active: bool,
    /// Participants the recording service lets start a recording.
    pub permitted: BTreeSet<ParticipantUid>,
}

/// Read-only room state for one dispatch.
#[derive(Debug, Clone, Copy)]
pub struct DispatchContext<'a> {
    pub room: &'a Room,
    /// Registered participants of the room in registration order.
    pub participants: &'a [Participant],
    pub history: &'a ActivityLog,
    pub quick_poll: Option<&'a serde_json::Value>,
    pub recording: &'a RecordingView,
    pub now: DateTime<Utc>,
}

impl<'a> DispatchContext<'a> {
    fn participant(&self, uid: ParticipantUid) -> Option<&'a Participant> {
        self.participants.iter().find(|p| p.uid == uid)
    }

    fn by_session(&self, session_id: &SessionId) -> Option<&'a Participant> {
        self.participants.iter().find(|p| &p.session_id == session_id)
    }

    fn moderators(&self) -> impl Iterator<Item = &'a Participant> {
        self.participants.iter().filter(|p| p.is_moderator())
    }
}

/// A state change requested by the dispatcher.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    RemoveParticipant(ParticipantUid),
    SetVisible { uid: ParticipantUid, visible: bool },
    AppendActivity(ActivityEntry),
    RemoveActivity(ActivityId),
    CloseRoom,
    /// Ask the whiteboard and poll subsystems to resync this participant.
    ResyncCollaboration(ParticipantUid),
}

/// Why a message produced no effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    WrongRoom,
    UnknownParticipant,
    UnknownSession,
    UnknownActivity,
    /// Enter for a participant still hidden behind the moderator gate.
    NotVisible,
    AlreadyClosed,
    /// Moderator presence reported for a room that does not gate.
    GateDisabled,
    IgnoredForRoomType,
}

impl DropReason {
    /// Metric label.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            DropReason::WrongRoom => "wrong_room",
            DropReason::UnknownParticipant => "unknown_participant",
            DropReason::UnknownSession => "unknown_session",
            DropReason::UnknownActivity => "unknown_activity",
            DropReason::NotVisible => "not_visible",
            DropReason::AlreadyClosed => "already_closed",
            DropReason::GateDisabled => "gate_disabled",
            DropReason::IgnoredForRoomType => "ignored_for_room_type",
        }
    }
}

/// Effects of one dispatched message.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transition {
    /// Applied in order before any notification is sent.
    pub mutations: Vec<Mutation>,
    /// Sent in order.
    pub outbound: Vec<(Audience, Notification)>,
    pub dropped: Option<DropReason>,
}

impl Transition {
    fn dropped(reason: DropReason) -> Self {
        Self {
            dropped: Some(reason),
            ..Self::default()
        }
    }

    fn mutate(&mut self, mutation: Mutation) {
        self.mutations.push(mutation);
    }

    fn send(&mut self, audience: Audience, notification: Notification) {
        self.outbound.push((audience, notification));
    }

    /// Whether the participant is removed by this transition.
    #[must_use]
    pub fn removes(&self, uid: ParticipantUid) -> bool {
        self.mutations
            .iter()
            .any(|m| matches!(m, Mutation::RemoveParticipant(removed) if *removed == uid))
    }
}

/// Map one message to its effects.
#[must_use]
pub fn dispatch(ctx: &DispatchContext<'_>, message: &RoomMessage) -> Transition {
    let room_id = ctx.room.id;
    if message.room_id != room_id {
        warn!(
            target: "rc.dispatch",
            room_id = %room_id,
            message_room_id = %message.room_id,
            event = message.event.kind(),
            "Dropping message addressed to another room"
        );
        return Transition::dropped(DropReason::WrongRoom);
    }

    debug!(
        target: "rc.dispatch",
        room_id = %room_id,
        event = message.event.kind(),
        "Dispatching room event"
    );

    match &message.event {
        RoomEvent::Enter { uid } => on_enter(ctx, *uid),
        RoomEvent::Exit { uid } => on_leave(ctx, *uid, ActivityKind::RoomExit),
        RoomEvent::Kick { uid } => on_leave(ctx, *uid, ActivityKind::Kicked),
        RoomEvent::Closed => on_closed(ctx),
        RoomEvent::RightUpdated { uid } => on_right_updated(ctx, *uid),
        RoomEvent::RequestRight { uid, right } => {
            on_moderator_activity(ctx, *uid, ActivityKind::RequestRight(*right), false)
        }
        RoomEvent::HaveQuestion { uid } => {
            on_moderator_activity(ctx, *uid, ActivityKind::HaveQuestion, true)
        }
        RoomEvent::Mute { session_id, mute } => on_mute(ctx, session_id, *mute),
        RoomEvent::MuteOthers { uid } => on_mute_others(ctx, *uid),
        RoomEvent::WbReload => {
            if ctx.room.is_interview() {
                debug!(
                    target: "rc.dispatch",
                    room_id = %room_id,
                    "Whiteboard reload ignored in interview room"
                );
                return Transition::dropped(DropReason::IgnoredForRoomType);
            }
            broadcast(Notification::WhiteboardReload)
        }
        RoomEvent::QuickPollUpdated => broadcast(Notification::QuickPoll {
            summary: ctx.quick_poll.cloned(),
        }),
        RoomEvent::PollCreated { creator } => {
            broadcast(Notification::PollCreated { creator: *creator })
        }
        RoomEvent::PollUpdated => broadcast(Notification::PollUpdated),
        RoomEvent::RecordingToggled => on_recording_toggled(ctx, &message.event),
        RoomEvent::SharingToggled | RoomEvent::MediaServerStatus { .. } => {
            broadcast(Notification::Refresh {
                event: message.event.kind(),
            })
        }
        RoomEvent::ModeratorInRoom { present } => on_moderator_in_room(ctx, *present),
        RoomEvent::ActivityRemove { id } => on_activity_remove(ctx, *id),
    }
}

fn broadcast(notification: Notification) -> Transition {
    let mut transition = Transition::default();
    transition.send(Audience::Room, notification);
    transition
}

fn unknown_participant(ctx: &DispatchContext<'_>, uid: ParticipantUid, event: &str) -> Transition {
    warn!(
        target: "rc.dispatch",
        room_id = %ctx.room.id,
        uid = %uid,
        event,
        "Participant not found, dropping message"
    );
    Transition::dropped(DropReason::UnknownParticipant)
}

fn on_enter(ctx: &DispatchContext<'_>, uid: ParticipantUid) -> Transition {
    let Some(entrant) = ctx.participant(uid) else {
        return unknown_participant(ctx, uid, "enter");
    };
    if !entrant.visible {
        debug!(
            target: "rc.dispatch",
            room_id = %ctx.room.id,
            uid = %uid,
            "Entrant is waiting for a moderator, deferring announcement"
        );
        return Transition::dropped(DropReason::NotVisible);
    }

    let mut transition = Transition::default();
    enter_sequence(ctx, entrant, &mut transition);
    transition
}

/// Snapshot and self summary to the entrant, announcement to the rest of
/// the room, activity log entry and collaboration resync.
fn enter_sequence(ctx: &DispatchContext<'_>, entrant: &Participant, transition: &mut Transition) {
    let uid = entrant.uid;

    transition.send(
        Audience::Participant(uid),
        Notification::RoomSnapshot(Box::new(snapshot(ctx, entrant))),
    );
    transition.send(
        Audience::Participant(uid),
        Notification::ParticipantAdded {
            client: entrant.summary(true),
        },
    );
    if entrant.is_moderator() || !ctx.room.is_hidden(RoomElement::UserCount) {
        transition.send(
            Audience::RoomExcept(uid),
            Notification::ParticipantAdded {
                client: entrant.summary(false),
            },
        );
    }

    let entry = ActivityEntry::new(ActivityKind::RoomEnter, entrant, ctx.now);
    transition.mutate(Mutation::AppendActivity(entry.clone()));
    transition.send(Audience::Room, Notification::ActivityAdded { entry });

    transition.mutate(Mutation::ResyncCollaboration(uid));
}

/// Everything the entrant needs to render the room.
fn snapshot(ctx: &DispatchContext<'_>, entrant: &Participant) -> RoomSnapshot {
    let room = ctx.room;
    let others = || {
        ctx.participants
            .iter()
            .filter(move |p| p.visible && p.uid != entrant.uid)
    };

    let roster = (entrant.is_moderator() || !room.is_hidden(RoomElement::UserCount)).then(|| {
        let mut members: Vec<&Participant> = others().collect();
        members.sort_by(|a, b| roster_order(a, b));
        members.into_iter().map(|p| p.summary(false)).collect()
    });

    let streams = others()
        .flat_map(|p| {
            p.streams.iter().map(|stream| RosterStream {
                uid: p.uid,
                stream: stream.clone(),
            })
        })
        .collect();

    let recording = (room.is_interview() && entrant.is_moderator())
        .then(|| interview_buttons(ctx, entrant));

    let mut notices = Vec::new();
    if room.room_type() != RoomType::Presentation && !quorum::has_moderator(ctx.participants) {
        notices.push(Notice::NoModerator {
            moderated: room.moderated,
        });
    }
    if room.wait_recording {
        notices.push(Notice::WaitRecording);
    }

    let reload_url = (entrant.login.external_login
        || entrant.login.pre_authorized_room == Some(room.id))
    .then(|| room.redirect_url.clone())
    .flatten();

    RoomSnapshot {
        options: RoomOptions {
            uid: entrant.uid,
            user_id: entrant.user_id(),
            rights: entrant.grants.rights().collect(),
            interview: room.is_interview(),
            audio_only: room.audio_only,
            questions: room.allow_user_questions,
            show_mic_status: !room.is_hidden(RoomElement::MicrophoneStatus),
            reload_url,
        },
        roster,
        streams,
        quick_poll: ctx.quick_poll.cloned(),
        recording,
        notices,
    }
}

/// Interview recording controls as shown to `moderator`.
fn interview_buttons(ctx: &DispatchContext<'_>, moderator: &Participant) -> RecordingButtons {
    if ctx.recording.active {
        return RecordingButtons::Started;
    }
    RecordingButtons::NotStarted {
        enabled: ctx.recording.permitted.contains(&moderator.uid)
            && ctx.participants.iter().any(Participant::has_streams),
    }
}

fn on_leave(ctx: &DispatchContext<'_>, uid: ParticipantUid, kind: ActivityKind) -> Transition {
    let Some(leaving) = ctx.participant(uid) else {
        let event = if kind == ActivityKind::Kicked {
            "kick"
        } else {
            "exit"
        };
        return unknown_participant(ctx, uid, event);
    };

    let mut transition = Transition::default();
    if kind == ActivityKind::Kicked {
        transition.send(Audience::Participant(uid), Notification::Kicked { uid });
    }

    let entry = ActivityEntry::new(kind, leaving, ctx.now);
    transition.mutate(Mutation::RemoveParticipant(uid));
    transition.mutate(Mutation::AppendActivity(entry.clone()));
    transition.send(Audience::RoomExcept(uid), Notification::ParticipantRemoved { uid });
    transition.send(Audience::RoomExcept(uid), Notification::ActivityAdded { entry });
    transition
}

fn on_closed(ctx: &DispatchContext<'_>) -> Transition {
    if ctx.room.is_closed() {
        debug!(target: "rc.dispatch", room_id = %ctx.room.id, "Room already closed");
        return Transition::dropped(DropReason::AlreadyClosed);
    }
    let mut transition = Transition::default();
    transition.mutate(Mutation::CloseRoom);
    transition.send(
        Audience::Room,
        Notification::RoomClosed {
            redirect_url: ctx.room.redirect_url.clone(),
        },
    );
    transition
}

fn on_right_updated(ctx: &DispatchContext<'_>, uid: ParticipantUid) -> Transition {
    let Some(updated) = ctx.participant(uid) else {
        error!(
            target: "rc.dispatch",
            room_id = %ctx.room.id,
            uid = %uid,
            "Rights updated for unknown participant, dropping"
        );
        return Transition::dropped(DropReason::UnknownParticipant);
    };

    let mut transition = Transition::default();
    transition.send(
        Audience::RoomExcept(uid),
        Notification::ParticipantUpdated {
            client: updated.summary(false),
        },
    );
    transition.send(
        Audience::Participant(uid),
        Notification::ParticipantUpdated {
            client: updated.summary(true),
        },
    );
    transition.mutate(Mutation::ResyncCollaboration(uid));
    if ctx.room.is_interview() {
        // Any stream change can flip the record button for every moderator.
        for moderator in ctx.moderators() {
            transition.send(
                Audience::Participant(moderator.uid),
                Notification::RecordingButtons {
                    buttons: interview_buttons(ctx, moderator),
                },
            );
        }
    }
    transition
}

/// Log entry surfaced to moderators, and with `echo` set also to every
/// visible non-moderator connection of the subject's user.
fn on_moderator_activity(
    ctx: &DispatchContext<'_>,
    uid: ParticipantUid,
    kind: ActivityKind,
    echo: bool,
) -> Transition {
    let Some(subject) = ctx.participant(uid) else {
        return unknown_participant(ctx, uid, "moderator_activity");
    };

    let entry = ActivityEntry::new(kind, subject, ctx.now);
    let mut transition = Transition::default();
    transition.mutate(Mutation::AppendActivity(entry.clone()));
    transition.send(
        Audience::Moderators,
        Notification::ActivityAdded {
            entry: entry.clone(),
        },
    );
    if echo {
        let own = ctx
            .participants
            .iter()
            .filter(|p| p.user_id() == subject.user_id() && !p.is_moderator())
            .filter(|p| p.visible || p.uid == uid);
        for connection in own {
            transition.send(
                Audience::Participant(connection.uid),
                Notification::ActivityAdded {
                    entry: entry.clone(),
                },
            );
        }
    }
    transition
}

fn on_mute(ctx: &DispatchContext<'_>, session_id: &SessionId, mute: bool) -> Transition {
    let Some(target) = ctx.by_session(session_id) else {
        error!(
            target: "rc.dispatch",
            room_id = %ctx.room.id,
            session_id = %session_id,
            "Mute for unknown session, dropping"
        );
        return Transition::dropped(DropReason::UnknownSession);
    };

    let mut transition = Transition::default();
    transition.send(
        Audience::RoomExcept(target.uid),
        Notification::LocalMute {
            uid: target.uid,
            mute,
        },
    );
    transition
}

fn on_mute_others(ctx: &DispatchContext<'_>, uid: ParticipantUid) -> Transition {
    if ctx.participant(uid).is_none() {
        return Transition::dropped(DropReason::UnknownParticipant);
    }
    let mut transition = Transition::default();
    transition.send(Audience::RoomExcept(uid), Notification::MuteOthers { except: uid });
    transition
}

fn on_recording_toggled(ctx: &DispatchContext<'_>, event: &RoomEvent) -> Transition {
    let mut transition = broadcast(Notification::Refresh { event: event.kind() });
    if ctx.room.is_interview() {
        for moderator in ctx.moderators() {
            transition.send(
                Audience::Participant(moderator.uid),
                Notification::RecordingButtons {
                    buttons: interview_buttons(ctx, moderator),
                },
            );
        }
    }
    transition
}

fn on_moderator_in_room(ctx: &DispatchContext<'_>, present: bool) -> Transition {
    if !ctx.room.gates_on_moderator() {
        warn!(
            target: "rc.dispatch",
            room_id = %ctx.room.id,
            present,
            "Moderator presence reported for a room that does not wait for moderators"
        );
        return Transition::dropped(DropReason::GateDisabled);
    }

    let mut transition = Transition::default();
    let mut flipped = 0usize;
    for participant in ctx
        .participants
        .iter()
        .filter(|p| !p.is_moderator() && p.visible != present)
    {
        flipped += 1;
        transition.mutate(Mutation::SetVisible {
            uid: participant.uid,
            visible: present,
        });
        transition.send(
            Audience::Participant(participant.uid),
            Notification::Visibility { visible: present },
        );
        if present {
            let mut revealed = participant.clone();
            revealed.visible = true;
            enter_sequence(ctx, &revealed, &mut transition);
        }
    }

    debug!(
        target: "rc.dispatch",
        room_id = %ctx.room.id,
        present,
        flipped,
        "Moderator gate evaluated"
    );
    transition
}

fn on_activity_remove(ctx: &DispatchContext<'_>, id: ActivityId) -> Transition {
    if !ctx.history.contains(id) {
        debug!(
            target: "rc.dispatch",
            room_id = %ctx.room.id,
            "Activity not in history, dropping removal"
        );
        return Transition::dropped(DropReason::UnknownActivity);
    }
    let mut transition = Transition::default();
    transition.mutate(Mutation::RemoveActivity(id));
    transition.send(Audience::Room, Notification::ActivityRemoved { id });
    transition
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::participant::{StreamDesc, StreamKind, User};
    use crate::rights::{Activity, Right};
    use common::types::{RoomId, StreamId, UserId};

    struct Fixture {
        room: Room,
        participants: Vec<Participant>,
        history: ActivityLog,
        recording: RecordingView,
        poll: Option<serde_json::Value>,
    }

    impl Fixture {
        fn new(room_type: RoomType) -> Self {
            Self {
                room: Room::new(RoomId(1), room_type, 20),
                participants: Vec::new(),
                history: ActivityLog::default(),
                recording: RecordingView::default(),
                poll: None,
            }
        }

        fn add(&mut self, name: &str, rights: &[Right]) -> ParticipantUid {
            let user_id = UserId(self.participants.len() as u64 + 1);
            let mut p = Participant::new(
                User::new(user_id, name),
                SessionId::from(format!("sid-{name}").as_str()),
            );
            p.room_id = Some(self.room.id);
            p.allow(rights.iter().copied());
            let uid = p.uid;
            self.participants.push(p);
            uid
        }

        fn get_mut(&mut self, uid: ParticipantUid) -> &mut Participant {
            self.participants.iter_mut().find(|p| p.uid == uid).unwrap()
        }

        fn run(&self, event: RoomEvent) -> Transition {
            let ctx = DispatchContext {
                room: &self.room,
                participants: &self.participants,
                history: &self.history,
                quick_poll: self.poll.as_ref(),
                recording: &self.recording,
                now: Utc::now(),
            };
            dispatch(&ctx, &RoomMessage::new(self.room.id, event))
        }
    }

    fn snapshot_of(transition: &Transition) -> &RoomSnapshot {
        transition
            .outbound
            .iter()
            .find_map(|(_, n)| match n {
                Notification::RoomSnapshot(s) => Some(s.as_ref()),
                _ => None,
            })
            .expect("snapshot sent")
    }

    #[test]
    fn test_wrong_room_dropped() {
        let fixture = Fixture::new(RoomType::Conference);
        let ctx = DispatchContext {
            room: &fixture.room,
            participants: &fixture.participants,
            history: &fixture.history,
            quick_poll: None,
            recording: &fixture.recording,
            now: Utc::now(),
        };
        let transition = dispatch(&ctx, &RoomMessage::new(RoomId(99), RoomEvent::WbReload));
        assert_eq!(transition.dropped, Some(DropReason::WrongRoom));
        assert!(transition.outbound.is_empty());
    }

    #[test]
    fn test_enter_sends_full_self_and_redacted_others() {
        let mut fixture = Fixture::new(RoomType::Conference);
        fixture.add("Mod", &[Right::Moderator]);
        let ann = fixture.add("Ann", &[Right::Video]);
        fixture.get_mut(ann).streams.push(StreamDesc {
            id: StreamId::new(),
            kind: StreamKind::Webcam,
            activities: vec![Activity::Video],
        });

        let transition = fixture.run(RoomEvent::Enter { uid: ann });
        assert_eq!(transition.dropped, None);

        let (audience, Notification::RoomSnapshot(_)) = &transition.outbound[0] else {
            unreachable!("first notification is the snapshot");
        };
        assert_eq!(*audience, Audience::Participant(ann));

        let added: Vec<_> = transition
            .outbound
            .iter()
            .filter_map(|(a, n)| match n {
                Notification::ParticipantAdded { client } => Some((*a, client.clone())),
                _ => None,
            })
            .collect();
        assert_eq!(added.len(), 2);
        assert_eq!(added[0].0, Audience::Participant(ann));
        assert!(added[0].1.is_self);
        assert_eq!(added[0].1.streams.len(), 1);
        assert_eq!(added[1].0, Audience::RoomExcept(ann));
        assert!(!added[1].1.is_self);
        assert!(added[1].1.streams.is_empty());

        // The entrant sees its own enter entry too.
        let logged: Vec<_> = transition
            .outbound
            .iter()
            .filter(|(_, n)| matches!(n, Notification::ActivityAdded { entry } if entry.kind == ActivityKind::RoomEnter))
            .map(|(a, _)| *a)
            .collect();
        assert_eq!(logged, vec![Audience::Room]);

        assert!(matches!(
            transition.mutations.as_slice(),
            [
                Mutation::AppendActivity(ActivityEntry {
                    kind: ActivityKind::RoomEnter,
                    ..
                }),
                Mutation::ResyncCollaboration(uid)
            ] if *uid == ann
        ));
    }

    #[test]
    fn test_enter_snapshot_contents() {
        let mut fixture = Fixture::new(RoomType::Conference);
        fixture.room.wait_recording = true;
        fixture.poll = Some(serde_json::json!({"yes": 2, "no": 1}));
        let zed = fixture.add("zed", &[]);
        fixture.add("Bob", &[Right::Presenter]);
        fixture.get_mut(zed).streams.push(StreamDesc {
            id: StreamId::new(),
            kind: StreamKind::Screen,
            activities: vec![Activity::Screen],
        });
        let amy = fixture.add("amy", &[]);

        let transition = fixture.run(RoomEvent::Enter { uid: amy });
        let snapshot = snapshot_of(&transition);

        let roster: Vec<&str> = snapshot
            .roster
            .as_ref()
            .unwrap()
            .iter()
            .map(|s| s.display_name.as_str())
            .collect();
        assert_eq!(roster, vec!["Bob", "zed"]);
        assert_eq!(snapshot.streams.len(), 1);
        assert_eq!(snapshot.streams[0].uid, zed);
        assert_eq!(snapshot.quick_poll, fixture.poll);
        assert_eq!(snapshot.recording, None);
        assert_eq!(
            snapshot.notices,
            vec![Notice::NoModerator { moderated: false }, Notice::WaitRecording]
        );
        assert!(snapshot.options.questions);
        assert!(snapshot.options.show_mic_status);
    }

    #[test]
    fn test_hidden_user_count_hides_roster_from_non_moderators() {
        let mut fixture = Fixture::new(RoomType::Conference);
        fixture.room.hidden_elements.insert(RoomElement::UserCount);
        fixture.add("Mod", &[Right::Moderator]);
        let guest = fixture.add("Guest", &[]);
        let second_mod = fixture.add("Mod2", &[Right::Moderator]);

        let transition = fixture.run(RoomEvent::Enter { uid: guest });
        assert!(snapshot_of(&transition).roster.is_none());
        assert!(!transition.outbound.iter().any(|(a, n)| {
            *a == Audience::RoomExcept(guest) && matches!(n, Notification::ParticipantAdded { .. })
        }));

        let transition = fixture.run(RoomEvent::Enter { uid: second_mod });
        assert_eq!(snapshot_of(&transition).roster.as_ref().unwrap().len(), 2);
        assert!(transition.outbound.iter().any(|(a, n)| {
            *a == Audience::RoomExcept(second_mod)
                && matches!(n, Notification::ParticipantAdded { .. })
        }));
    }

    #[test]
    fn test_presentation_room_has_no_moderator_notice() {
        let mut fixture = Fixture::new(RoomType::Presentation);
        let uid = fixture.add("Ann", &[]);
        let transition = fixture.run(RoomEvent::Enter { uid });
        assert!(snapshot_of(&transition).notices.is_empty());
    }

    #[test]
    fn test_reload_url_only_for_external_login() {
        let mut fixture = Fixture::new(RoomType::Conference);
        fixture.room.redirect_url = Some("https://lms.example/course".to_string());
        let plain = fixture.add("Ann", &[]);
        let external = fixture.add("Ext", &[]);
        fixture.get_mut(external).login.external_login = true;

        let transition = fixture.run(RoomEvent::Enter { uid: plain });
        assert_eq!(snapshot_of(&transition).options.reload_url, None);

        let transition = fixture.run(RoomEvent::Enter { uid: external });
        assert_eq!(
            snapshot_of(&transition).options.reload_url.as_deref(),
            Some("https://lms.example/course")
        );
    }

    #[test]
    fn test_enter_of_gated_participant_deferred() {
        let mut fixture = Fixture::new(RoomType::Conference);
        let uid = fixture.add("Ann", &[]);
        fixture.get_mut(uid).visible = false;

        let transition = fixture.run(RoomEvent::Enter { uid });
        assert_eq!(transition.dropped, Some(DropReason::NotVisible));
        assert!(transition.outbound.is_empty());
    }

    #[test]
    fn test_kick_affects_only_target() {
        let mut fixture = Fixture::new(RoomType::Conference);
        fixture.add("Mod", &[Right::Moderator]);
        let x = fixture.add("X", &[]);
        fixture.add("Y", &[]);

        let transition = fixture.run(RoomEvent::Kick { uid: x });

        let removed: Vec<_> = transition
            .mutations
            .iter()
            .filter_map(|m| match m {
                Mutation::RemoveParticipant(uid) => Some(*uid),
                _ => None,
            })
            .collect();
        assert_eq!(removed, vec![x]);
        assert!(transition.removes(x));

        assert_eq!(
            transition.outbound[0],
            (Audience::Participant(x), Notification::Kicked { uid: x })
        );
        assert_eq!(
            transition.outbound[1],
            (
                Audience::RoomExcept(x),
                Notification::ParticipantRemoved { uid: x }
            )
        );
        let (audience, Notification::ActivityAdded { entry }) = &transition.outbound[2] else {
            unreachable!("third notification is the activity entry");
        };
        assert_eq!(*audience, Audience::RoomExcept(x));
        assert_eq!(entry.kind, ActivityKind::Kicked);
        assert_eq!(transition.outbound.len(), 3);
    }

    #[test]
    fn test_exit_logs_room_exit() {
        let mut fixture = Fixture::new(RoomType::Conference);
        let uid = fixture.add("Ann", &[]);
        let transition = fixture.run(RoomEvent::Exit { uid });

        assert!(transition.removes(uid));
        assert!(transition.mutations.iter().any(|m| matches!(
            m,
            Mutation::AppendActivity(ActivityEntry {
                kind: ActivityKind::RoomExit,
                ..
            })
        )));
        assert!(!transition
            .outbound
            .iter()
            .any(|(_, n)| matches!(n, Notification::Kicked { .. })));
    }

    #[test]
    fn test_right_updated_unknown_uid_zero_broadcasts() {
        let fixture = Fixture::new(RoomType::Conference);
        let transition = fixture.run(RoomEvent::RightUpdated {
            uid: ParticipantUid::new(),
        });
        assert_eq!(transition.dropped, Some(DropReason::UnknownParticipant));
        assert!(transition.outbound.is_empty());
        assert!(transition.mutations.is_empty());
    }

    #[test]
    fn test_right_updated_refreshes_room_and_self() {
        let mut fixture = Fixture::new(RoomType::Conference);
        let uid = fixture.add("Ann", &[Right::Whiteboard]);
        let transition = fixture.run(RoomEvent::RightUpdated { uid });

        assert_eq!(transition.outbound.len(), 2);
        assert!(matches!(
            &transition.outbound[0],
            (Audience::RoomExcept(u), Notification::ParticipantUpdated { client })
                if *u == uid && !client.is_self && client.rights == vec![Right::Whiteboard]
        ));
        assert!(matches!(
            &transition.outbound[1],
            (Audience::Participant(u), Notification::ParticipantUpdated { client })
                if *u == uid && client.is_self
        ));
        assert_eq!(transition.mutations, vec![Mutation::ResyncCollaboration(uid)]);
    }

    #[test]
    fn test_interview_right_update_resyncs_recording_buttons() {
        let mut fixture = Fixture::new(RoomType::Interview);
        let moderator = fixture.add("Mod", &[Right::Moderator]);
        let guest = fixture.add("Guest", &[Right::Video]);
        fixture.get_mut(guest).streams.push(StreamDesc {
            id: StreamId::new(),
            kind: StreamKind::Webcam,
            activities: vec![Activity::Video],
        });
        fixture.recording.permitted.insert(moderator);

        let transition = fixture.run(RoomEvent::RightUpdated { uid: moderator });
        assert!(transition.outbound.contains(&(
            Audience::Participant(moderator),
            Notification::RecordingButtons {
                buttons: RecordingButtons::NotStarted { enabled: true }
            }
        )));
    }

    #[test]
    fn test_guest_stream_change_refreshes_every_moderators_buttons() {
        let mut fixture = Fixture::new(RoomType::Interview);
        let host = fixture.add("Host", &[Right::Moderator]);
        let cohost = fixture.add("Cohost", &[Right::Moderator]);
        let guest = fixture.add("Guest", &[Right::Video]);
        fixture.get_mut(guest).streams.push(StreamDesc {
            id: StreamId::new(),
            kind: StreamKind::Webcam,
            activities: vec![Activity::Video],
        });
        fixture.recording.permitted.insert(host);

        let transition = fixture.run(RoomEvent::RightUpdated { uid: guest });
        let buttons: Vec<_> = transition
            .outbound
            .iter()
            .filter_map(|(a, n)| match n {
                Notification::RecordingButtons { buttons } => Some((*a, *buttons)),
                _ => None,
            })
            .collect();
        assert_eq!(
            buttons,
            vec![
                (
                    Audience::Participant(host),
                    RecordingButtons::NotStarted { enabled: true }
                ),
                (
                    Audience::Participant(cohost),
                    RecordingButtons::NotStarted { enabled: false }
                ),
            ]
        );
    }

    #[test]
    fn test_request_right_visible_to_moderators_only() {
        let mut fixture = Fixture::new(RoomType::Conference);
        fixture.add("Mod", &[Right::Moderator]);
        let ann = fixture.add("Ann", &[]);

        let transition = fixture.run(RoomEvent::RequestRight {
            uid: ann,
            right: Right::Presenter,
        });
        assert_eq!(transition.outbound.len(), 1);
        assert!(matches!(
            &transition.outbound[0],
            (Audience::Moderators, Notification::ActivityAdded { entry })
                if entry.kind == ActivityKind::RequestRight(Right::Presenter)
        ));
        // No rights change
        assert!(!fixture.participants[1].has(Right::Presenter));
    }

    #[test]
    fn test_have_question_to_moderators_and_asker() {
        let mut fixture = Fixture::new(RoomType::Conference);
        fixture.add("Mod", &[Right::Moderator]);
        let ann = fixture.add("Ann", &[]);

        let transition = fixture.run(RoomEvent::HaveQuestion { uid: ann });
        let audiences: Vec<_> = transition.outbound.iter().map(|(a, _)| *a).collect();
        assert_eq!(audiences, vec![Audience::Moderators, Audience::Participant(ann)]);
    }

    #[test]
    fn test_have_question_reaches_every_connection_of_the_asker() {
        let mut fixture = Fixture::new(RoomType::Conference);
        fixture.room.allow_user_questions = false;
        fixture.add("Mod", &[Right::Moderator]);
        let laptop = fixture.add("Ann", &[]);
        fixture.add("Bob", &[]);

        let ann = fixture.get_mut(laptop).user.clone();
        let mut phone = Participant::new(ann.clone(), SessionId::from("sid-ann-phone"));
        phone.room_id = Some(fixture.room.id);
        let phone_uid = phone.uid;
        fixture.participants.push(phone);
        // Hidden connections are left out.
        let mut tablet = Participant::new(ann, SessionId::from("sid-ann-tablet"));
        tablet.visible = false;
        fixture.participants.push(tablet);

        let transition = fixture.run(RoomEvent::HaveQuestion { uid: phone_uid });
        assert_eq!(transition.dropped, None);
        let audiences: Vec<_> = transition.outbound.iter().map(|(a, _)| *a).collect();
        assert_eq!(
            audiences,
            vec![
                Audience::Moderators,
                Audience::Participant(laptop),
                Audience::Participant(phone_uid),
            ]
        );
    }

    #[test]
    fn test_mute_resolves_session() {
        let mut fixture = Fixture::new(RoomType::Conference);
        let ann = fixture.add("Ann", &[]);

        let transition = fixture.run(RoomEvent::Mute {
            session_id: SessionId::from("sid-Ann"),
            mute: true,
        });
        assert_eq!(
            transition.outbound,
            vec![(
                Audience::RoomExcept(ann),
                Notification::LocalMute { uid: ann, mute: true }
            )]
        );

        let transition = fixture.run(RoomEvent::Mute {
            session_id: SessionId::from("sid-nobody"),
            mute: true,
        });
        assert_eq!(transition.dropped, Some(DropReason::UnknownSession));
        assert!(transition.outbound.is_empty());
    }

    #[test]
    fn test_mute_others() {
        let mut fixture = Fixture::new(RoomType::Conference);
        let ann = fixture.add("Ann", &[Right::MuteOthers]);

        let transition = fixture.run(RoomEvent::MuteOthers { uid: ann });
        assert_eq!(
            transition.outbound,
            vec![(Audience::RoomExcept(ann), Notification::MuteOthers { except: ann })]
        );

        let transition = fixture.run(RoomEvent::MuteOthers {
            uid: ParticipantUid::new(),
        });
        assert_eq!(transition.dropped, Some(DropReason::UnknownParticipant));
    }

    #[test]
    fn test_whiteboard_reload_ignored_in_interview() {
        let fixture = Fixture::new(RoomType::Interview);
        let transition = fixture.run(RoomEvent::WbReload);
        assert_eq!(transition.dropped, Some(DropReason::IgnoredForRoomType));

        let fixture = Fixture::new(RoomType::Conference);
        let transition = fixture.run(RoomEvent::WbReload);
        assert_eq!(
            transition.outbound,
            vec![(Audience::Room, Notification::WhiteboardReload)]
        );
    }

    #[test]
    fn test_other_events_refresh_room() {
        let fixture = Fixture::new(RoomType::Conference);
        let transition = fixture.run(RoomEvent::SharingToggled);
        assert_eq!(
            transition.outbound,
            vec![(
                Audience::Room,
                Notification::Refresh {
                    event: "sharing_toggled"
                }
            )]
        );

        let transition = fixture.run(RoomEvent::PollCreated { creator: UserId(4) });
        assert_eq!(
            transition.outbound,
            vec![(
                Audience::Room,
                Notification::PollCreated { creator: UserId(4) }
            )]
        );
    }

    #[test]
    fn test_recording_toggled_in_interview_updates_moderator_buttons() {
        let mut fixture = Fixture::new(RoomType::Interview);
        let moderator = fixture.add("Mod", &[Right::Moderator]);
        fixture.add("Guest", &[]);
        fixture.recording.active = true;

        let transition = fixture.run(RoomEvent::RecordingToggled);
        assert_eq!(
            transition.outbound,
            vec![
                (
                    Audience::Room,
                    Notification::Refresh {
                        event: "recording_toggled"
                    }
                ),
                (
                    Audience::Participant(moderator),
                    Notification::RecordingButtons {
                        buttons: RecordingButtons::Started
                    }
                ),
            ]
        );
    }

    #[test]
    fn test_close_once() {
        let mut fixture = Fixture::new(RoomType::Conference);
        fixture.room.redirect_url = Some("https://example.org".to_string());

        let transition = fixture.run(RoomEvent::Closed);
        assert_eq!(transition.mutations, vec![Mutation::CloseRoom]);
        assert_eq!(
            transition.outbound,
            vec![(
                Audience::Room,
                Notification::RoomClosed {
                    redirect_url: Some("https://example.org".to_string())
                }
            )]
        );

        fixture.room.close();
        let transition = fixture.run(RoomEvent::Closed);
        assert_eq!(transition.dropped, Some(DropReason::AlreadyClosed));
    }

    #[test]
    fn test_moderator_in_room_ignored_without_gate() {
        let mut fixture = Fixture::new(RoomType::Conference);
        fixture.room.moderated = true;
        let uid = fixture.add("Ann", &[]);
        fixture.get_mut(uid).visible = false;

        let transition = fixture.run(RoomEvent::ModeratorInRoom { present: true });
        assert_eq!(transition.dropped, Some(DropReason::GateDisabled));
        assert!(transition.mutations.is_empty());
    }

    #[test]
    fn test_moderator_in_room_reveals_and_replays_enter() {
        let mut fixture = Fixture::new(RoomType::Conference);
        fixture.room.moderated = true;
        fixture.room.wait_for_moderator = true;
        let a = fixture.add("A", &[]);
        let b = fixture.add("B", &[]);
        fixture.get_mut(a).visible = false;
        fixture.get_mut(b).visible = false;
        fixture.add("Mod", &[Right::Moderator]);

        let transition = fixture.run(RoomEvent::ModeratorInRoom { present: true });

        let revealed: Vec<_> = transition
            .mutations
            .iter()
            .filter_map(|m| match m {
                Mutation::SetVisible { uid, visible: true } => Some(*uid),
                _ => None,
            })
            .collect();
        assert_eq!(revealed, vec![a, b]);

        for uid in [a, b] {
            assert!(transition.outbound.contains(&(
                Audience::Participant(uid),
                Notification::Visibility { visible: true }
            )));
            assert!(transition.outbound.iter().any(|(aud, n)| *aud == Audience::Participant(uid)
                && matches!(n, Notification::RoomSnapshot(_))));
            assert!(transition
                .mutations
                .contains(&Mutation::ResyncCollaboration(uid)));
        }
    }

    #[test]
    fn test_moderator_leaving_hides_non_moderators() {
        let mut fixture = Fixture::new(RoomType::Conference);
        fixture.room.moderated = true;
        fixture.room.wait_for_moderator = true;
        let a = fixture.add("A", &[]);

        let transition = fixture.run(RoomEvent::ModeratorInRoom { present: false });
        assert_eq!(
            transition.mutations,
            vec![Mutation::SetVisible {
                uid: a,
                visible: false
            }]
        );
        assert_eq!(
            transition.outbound,
            vec![(
                Audience::Participant(a),
                Notification::Visibility { visible: false }
            )]
        );
    }

    #[test]
    fn test_activity_remove() {
        let mut fixture = Fixture::new(RoomType::Conference);
        let uid = fixture.add("Ann", &[]);
        let entry = ActivityEntry::new(
            ActivityKind::HaveQuestion,
            &fixture.participants[0],
            Utc::now(),
        );
        let id = entry.id;
        fixture.history.push(entry);
        assert_eq!(fixture.participants[0].uid, uid);

        let transition = fixture.run(RoomEvent::ActivityRemove { id });
        assert_eq!(transition.mutations, vec![Mutation::RemoveActivity(id)]);
        assert_eq!(
            transition.outbound,
            vec![(Audience::Room, Notification::ActivityRemoved { id })]
        );

        let transition = fixture.run(RoomEvent::ActivityRemove {
            id: ActivityId::new(),
        });
        assert_eq!(transition.dropped, Some(DropReason::UnknownActivity));
    }
}
