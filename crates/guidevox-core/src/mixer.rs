//! Priority track mixer.
//!
//! One FIFO queue per numeric track; the "current" clip is always the head
//! of the numerically-highest non-empty track. Interruption parks the
//! current clip behind an [`Clip::InterruptionEnd`] marker in its own slot
//! and surfaces an [`Clip::InterruptionStart`] wrapper at the head of the
//! interrupting track, so the interrupted track keeps its position and the
//! clip resumes when the marker is removed.
//!
//! # Design
//!
//! - Pure in-memory state machine: no I/O, no internal locking. A single
//!   owner performs mutations; observers read the current clip through a
//!   `watch` channel.
//! - In-track replacement is done by index, never by scanning for an equal
//!   clip, so clips that happen to compare equal cannot alias each other.
//! - None of the operations fail: "not found" is a signaled outcome.

use std::collections::BTreeMap;

use tokio::sync::watch;

use crate::clip::Clip;

/// Priority track mixer. See the module docs for the queueing model.
#[derive(Debug)]
pub struct TrackMixer {
    /// Track number → FIFO queue (index 0 is the head). Empty tracks are
    /// removed eagerly so the max key is always playable.
    tracks: BTreeMap<u32, Vec<Clip>>,
    current_tx: watch::Sender<Option<Clip>>,
}

impl Default for TrackMixer {
    fn default() -> Self {
        Self::new()
    }
}

impl TrackMixer {
    /// Create an empty mixer.
    #[must_use]
    pub fn new() -> Self {
        let (current_tx, _) = watch::channel(None);
        Self {
            tracks: BTreeMap::new(),
            current_tx,
        }
    }

    /// Insert a clip at the tail of its track.
    ///
    /// With `interrupts` set, and a current clip on a strictly lower track,
    /// the current clip is parked: its queue slot is replaced in place by an
    /// `InterruptionEnd` marker and the new clip surfaces wrapped in an
    /// `InterruptionStart` at the head of its own track.
    pub fn insert(&mut self, clip: Clip, interrupts: bool) {
        let interruptee = self
            .peek_current()
            .filter(|current| interrupts && current.track() < clip.track())
            .cloned();

        match interruptee {
            Some(current) => self.insert_interruption(clip, &current),
            None => self.tracks.entry(clip.track()).or_default().push(clip),
        }
        self.update_current();
    }

    /// Park `interrupted` behind a marker and surface `clip` wrapped in an
    /// `InterruptionStart`. Falls back to a plain insert when the clip to
    /// interrupt is no longer where it was observed (stale reference).
    fn insert_interruption(&mut self, clip: Clip, interrupted: &Clip) {
        let slot = self
            .tracks
            .get_mut(&interrupted.track())
            .and_then(|queue| {
                let index = queue.iter().position(|entry| entry == interrupted)?;
                Some(&mut queue[index])
            });

        let Some(slot) = slot else {
            tracing::debug!(track = clip.track(), "stale interruption target, inserting plainly");
            self.tracks.entry(clip.track()).or_default().push(clip);
            return;
        };

        *slot = Clip::InterruptionEnd {
            deferred: Box::new(interrupted.clone()),
        };

        let wrapped = Clip::InterruptionStart {
            deferred: Box::new(interrupted.clone()),
            priority: Box::new(clip),
        };
        self.tracks
            .entry(wrapped.track())
            .or_default()
            .insert(0, wrapped);
    }

    /// Remove the first entry on `clip`'s track that stands for `clip`.
    ///
    /// An `InterruptionStart` entry matches the priority clip it wraps.
    /// Removing an `InterruptionEnd` marker swaps the deferred clip back
    /// into the slot (the resume point) instead of shrinking the queue.
    ///
    /// Returns the removed entry, or `None` if nothing matched.
    pub fn remove_clip(&mut self, clip: &Clip) -> Option<Clip> {
        let track = clip.track();
        let queue = self.tracks.get_mut(&track)?;
        let index = queue.iter().position(|entry| entry.matches(clip))?;

        let removed = if let Clip::InterruptionEnd { deferred } = &queue[index] {
            let resumed = deferred.as_ref().clone();
            std::mem::replace(&mut queue[index], resumed)
        } else {
            queue.remove(index)
        };

        if queue.is_empty() {
            self.tracks.remove(&track);
        }
        self.update_current();
        Some(removed)
    }

    /// Remove and return every clip on a track, in queue order.
    pub fn remove_track(&mut self, track: u32) -> Vec<Clip> {
        let removed = self.tracks.remove(&track).unwrap_or_default();
        self.update_current();
        removed
    }

    /// Clear every track; returns everything removed, highest track first.
    pub fn remove_all(&mut self) -> Vec<Clip> {
        let mut removed: Vec<Clip> = Vec::with_capacity(self.size());
        while let Some((_, queue)) = self.tracks.pop_last() {
            removed.extend(queue);
        }
        self.update_current();
        removed
    }

    /// The current clip: head of the numerically-highest non-empty track.
    #[must_use]
    pub fn current(&self) -> Option<Clip> {
        self.peek_current().cloned()
    }

    /// Subscribe to current-clip changes.
    #[must_use]
    pub fn current_rx(&self) -> watch::Receiver<Option<Clip>> {
        self.current_tx.subscribe()
    }

    /// Recompute and publish the current clip. Every mutating operation
    /// calls this; it only needs to be called directly after poking the
    /// returned snapshots of [`Self::clips`] back in through `insert`.
    pub fn update_current(&mut self) {
        let current = self.peek_current().cloned();
        self.current_tx.send_if_modified(|published| {
            if *published == current {
                false
            } else {
                *published = current;
                true
            }
        });
    }

    /// Per-track element counts.
    #[must_use]
    pub fn tracks_size(&self) -> BTreeMap<u32, usize> {
        self.tracks
            .iter()
            .map(|(track, queue)| (*track, queue.len()))
            .collect()
    }

    /// Total number of queued clips across all tracks.
    #[must_use]
    pub fn size(&self) -> usize {
        self.tracks.values().map(Vec::len).sum()
    }

    /// Snapshot of a track's contents in queue order.
    #[must_use]
    pub fn clips(&self, track: u32) -> Vec<Clip> {
        self.tracks.get(&track).cloned().unwrap_or_default()
    }

    fn peek_current(&self) -> Option<&Clip> {
        self.tracks
            .last_key_value()
            .and_then(|(_, queue)| queue.first())
    }
}
