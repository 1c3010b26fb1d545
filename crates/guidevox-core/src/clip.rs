//! Playable clip variants.
//!
//! A [`Clip`] is anything the mixer can queue: a regular or priority spoken
//! announcement, a notification sound, or one of the two interruption
//! markers used while a lower-priority clip is parked behind an interrupting
//! one. The markers forward their track number to the wrapped clip, so the
//! mixer can treat every entry uniformly.

use serde::{Deserialize, Serialize};

use crate::announcement::Announcement;

/// Default track for regular (queued, non-interrupting) announcements.
pub const REGULAR_TRACK: u32 = 2;

/// Default track for priority announcements.
pub const PRIORITY_TRACK: u32 = 5;

/// Fixed track for notification sounds.
pub const NOTIFICATION_TRACK: u32 = 8;

/// Identifier of a bundled notification sound.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SoundId(String);

impl SoundId {
    /// Create a sound id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw id.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// One playable unit with a numeric priority track (higher = more urgent).
#[derive(Debug, Clone, PartialEq)]
pub enum Clip {
    /// A queued announcement that never interrupts.
    Regular {
        /// The spoken message.
        announcement: Announcement,
        /// Priority track.
        track: u32,
    },

    /// An announcement that interrupts lower tracks.
    Priority {
        /// The spoken message.
        announcement: Announcement,
        /// Priority track.
        track: u32,
    },

    /// A short notification sound; always on [`NOTIFICATION_TRACK`].
    NotificationSound {
        /// Which sound to play.
        sound: SoundId,
    },

    /// Head-of-track wrapper shown as "current" while `priority` interrupts
    /// `deferred`. Exists only at the head of the interrupting track.
    InterruptionStart {
        /// The clip that was interrupted.
        deferred: Box<Clip>,
        /// The interrupting clip.
        priority: Box<Clip>,
    },

    /// Placeholder left in the interrupted track's queue slot; removing it
    /// swaps the deferred clip back in.
    InterruptionEnd {
        /// The clip that will resume here.
        deferred: Box<Clip>,
    },
}

impl Clip {
    /// A regular announcement on the default regular track.
    #[must_use]
    pub const fn regular(announcement: Announcement) -> Self {
        Self::Regular {
            announcement,
            track: REGULAR_TRACK,
        }
    }

    /// A regular announcement on a caller-chosen track.
    #[must_use]
    pub const fn regular_on(announcement: Announcement, track: u32) -> Self {
        Self::Regular {
            announcement,
            track,
        }
    }

    /// A priority announcement on the default priority track.
    #[must_use]
    pub const fn priority(announcement: Announcement) -> Self {
        Self::Priority {
            announcement,
            track: PRIORITY_TRACK,
        }
    }

    /// A priority announcement on a caller-chosen track.
    #[must_use]
    pub const fn priority_on(announcement: Announcement, track: u32) -> Self {
        Self::Priority {
            announcement,
            track,
        }
    }

    /// A notification sound.
    #[must_use]
    pub const fn notification(sound: SoundId) -> Self {
        Self::NotificationSound { sound }
    }

    /// The clip's priority track. Interruption markers forward to the clip
    /// they stand in for, so they sort into the correct track.
    #[must_use]
    pub fn track(&self) -> u32 {
        match self {
            Self::Regular { track, .. } | Self::Priority { track, .. } => *track,
            Self::NotificationSound { .. } => NOTIFICATION_TRACK,
            Self::InterruptionStart { priority, .. } => priority.track(),
            Self::InterruptionEnd { deferred } => deferred.track(),
        }
    }

    /// The announcement carried by this clip, if any, looking through
    /// interruption wrappers.
    #[must_use]
    pub fn announcement(&self) -> Option<&Announcement> {
        match self {
            Self::Regular { announcement, .. } | Self::Priority { announcement, .. } => {
                Some(announcement)
            }
            Self::NotificationSound { .. } => None,
            Self::InterruptionStart { priority, .. } => priority.announcement(),
            Self::InterruptionEnd { deferred } => deferred.announcement(),
        }
    }

    /// Whether a queue entry stands for `target` when removing clips.
    ///
    /// An `InterruptionStart` entry answers for the priority clip it wraps;
    /// everything else matches by equality only.
    #[must_use]
    pub fn matches(&self, target: &Self) -> bool {
        if self == target {
            return true;
        }
        match self {
            Self::InterruptionStart { priority, .. } => priority.as_ref() == target,
            _ => false,
        }
    }
}
