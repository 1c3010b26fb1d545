//! Prefetch scheduling: which upcoming announcements to warm, and when to
//! re-plan.
//!
//! The provider is a pure function over the caller's upcoming segments
//! (route steps, queued instructions — anything with a travel-time
//! estimate). The scheduler throttles progress-driven re-planning to a
//! fraction of the observable window; route changes always re-plan
//! immediately.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

use guidevox_core::announcement::Announcement;
use guidevox_core::config::PrefetchConfig;

use crate::loader::RemoteSpeechLoader;

/// One upcoming stretch of travel and the announcements spoken during it.
#[derive(Debug, Clone)]
pub struct UpcomingSegment {
    /// Remaining travel time of this segment.
    pub duration: Duration,
    /// Announcements attached to this segment, in speaking order.
    pub announcements: Vec<Announcement>,
}

/// Selects the announcements within the observable time window.
#[derive(Debug, Clone)]
pub struct NextAnnouncementsProvider {
    window: Duration,
}

impl NextAnnouncementsProvider {
    /// Provider with the given look-ahead window.
    #[must_use]
    pub const fn new(window: Duration) -> Self {
        Self { window }
    }

    /// Announcements to pre-download: everything on the current segment,
    /// plus following segments for as long as the accumulated travel time
    /// stays inside the window.
    #[must_use]
    pub fn upcoming(&self, segments: &[UpcomingSegment]) -> Vec<Announcement> {
        let mut selected = Vec::new();
        let mut accumulated = Duration::ZERO;

        for (index, segment) in segments.iter().enumerate() {
            if index > 0 && accumulated >= self.window {
                break;
            }
            selected.extend(segment.announcements.iter().cloned());
            accumulated += segment.duration;
        }
        selected
    }
}

/// Drives the loader from navigation progress.
pub struct PrefetchScheduler {
    loader: Arc<RemoteSpeechLoader>,
    provider: NextAnnouncementsProvider,
    retrigger_after: Duration,
    last_plan: Mutex<Option<Instant>>,
}

impl PrefetchScheduler {
    /// Scheduler over a loader, configured by [`PrefetchConfig`].
    #[must_use]
    pub fn new(loader: Arc<RemoteSpeechLoader>, config: &PrefetchConfig) -> Self {
        Self {
            loader,
            provider: NextAnnouncementsProvider::new(config.observable_window),
            retrigger_after: config.retrigger_after(),
            last_plan: Mutex::new(None),
        }
    }

    /// Progress tick: re-plan only once enough of the window has elapsed
    /// since the last plan.
    pub async fn on_progress(&self, segments: &[UpcomingSegment]) {
        {
            let last_plan = self.last_plan.lock().await;
            if let Some(planned_at) = *last_plan {
                if planned_at.elapsed() < self.retrigger_after {
                    return;
                }
            }
        }
        self.plan(segments).await;
    }

    /// Route change: re-plan immediately.
    pub async fn on_route_changed(&self, segments: &[UpcomingSegment]) {
        self.plan(segments).await;
    }

    async fn plan(&self, segments: &[UpcomingSegment]) {
        *self.last_plan.lock().await = Some(Instant::now());

        let announcements = self.provider.upcoming(segments);
        tracing::debug!(count = announcements.len(), "prefetching upcoming announcements");
        for announcement in &announcements {
            self.loader.prefetch(announcement).await;
        }
    }
}
