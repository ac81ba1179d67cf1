//! Per-participant rights and the activities they back.
//!
//! A [`Grants`] value is the capability set of one participant. Mutations
//! are local to the value; other participants learn about them only through
//! an explicit `RightUpdated` broadcast.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// A privilege a participant may hold in a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Right {
    Moderator,
    /// Satisfies every `Moderator` check and cannot be kicked.
    SuperModerator,
    Presenter,
    Whiteboard,
    Share,
    Audio,
    Video,
    MuteOthers,
    RemoteControl,
}

impl Right {
    pub const ALL: [Right; 9] = [
        Right::Moderator,
        Right::SuperModerator,
        Right::Presenter,
        Right::Whiteboard,
        Right::Share,
        Right::Audio,
        Right::Video,
        Right::MuteOthers,
        Right::RemoteControl,
    ];

    /// Wire and metric label name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Right::Moderator => "MODERATOR",
            Right::SuperModerator => "SUPER_MODERATOR",
            Right::Presenter => "PRESENTER",
            Right::Whiteboard => "WHITEBOARD",
            Right::Share => "SHARE",
            Right::Audio => "AUDIO",
            Right::Video => "VIDEO",
            Right::MuteOthers => "MUTE_OTHERS",
            Right::RemoteControl => "REMOTE_CONTROL",
        }
    }
}

impl fmt::Display for Right {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Something a participant is actively doing with their media.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Activity {
    Audio,
    Video,
    Screen,
    Record,
}

impl Activity {
    /// The right that must be held for this activity to stay active.
    #[must_use]
    pub const fn backing_right(&self) -> Option<Right> {
        match self {
            Activity::Audio => Some(Right::Audio),
            Activity::Video => Some(Right::Video),
            Activity::Screen | Activity::Record => None,
        }
    }
}

/// Rights and active activities of one participant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grants {
    rights: BTreeSet<Right>,
    activities: BTreeSet<Activity>,
}

impl Grants {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Grants built from an initial rights set, with no activities.
    #[must_use]
    pub fn with_rights(rights: impl IntoIterator<Item = Right>) -> Self {
        let mut grants = Self::new();
        grants.allow(rights);
        grants
    }

    /// Add rights. Already-held rights are ignored.
    pub fn allow(&mut self, rights: impl IntoIterator<Item = Right>) {
        self.rights.extend(rights);
    }

    /// Remove rights and retract any activity whose backing right is gone.
    ///
    /// Returns the retracted activities.
    pub fn deny(&mut self, rights: impl IntoIterator<Item = Right>) -> Vec<Activity> {
        for right in rights {
            self.rights.remove(&right);
        }

        let retracted: Vec<Activity> = self
            .activities
            .iter()
            .copied()
            .filter(|a| a.backing_right().is_some_and(|r| !self.rights.contains(&r)))
            .collect();
        for activity in &retracted {
            self.activities.remove(activity);
        }
        retracted
    }

    /// Whether the right is held. `SuperModerator` implies `Moderator`.
    #[must_use]
    pub fn has(&self, right: Right) -> bool {
        self.rights.contains(&right)
            || (right == Right::Moderator && self.rights.contains(&Right::SuperModerator))
    }

    #[must_use]
    pub fn is_moderator(&self) -> bool {
        self.has(Right::Moderator)
    }

    /// Rights in canonical order.
    pub fn rights(&self) -> impl Iterator<Item = Right> + '_ {
        self.rights.iter().copied()
    }

    /// Active activities in canonical order.
    pub fn activities(&self) -> impl Iterator<Item = Activity> + '_ {
        self.activities.iter().copied()
    }

    #[must_use]
    pub fn has_activity(&self, activity: Activity) -> bool {
        self.activities.contains(&activity)
    }

    /// Start or stop an activity.
    ///
    /// Starting fails (returns `false`) when the backing right is missing.
    pub fn set_activity(&mut self, activity: Activity, active: bool) -> bool {
        if !active {
            self.activities.remove(&activity);
            return true;
        }
        if activity.backing_right().is_some_and(|r| !self.has(r)) {
            return false;
        }
        self.activities.insert(activity);
        true
    }
}
