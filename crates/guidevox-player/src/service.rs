//! End-to-end facade over the loader and the player.

use std::sync::Arc;

use tokio::sync::mpsc;

use guidevox_cache::SpeechFileCache;
use guidevox_core::announcement::{Announcement, SpeechVolume};
use guidevox_core::config::PlayerConfig;
use guidevox_core::errors::SpeechResult;
use guidevox_core::ports::{AudioRenderPort, ReachabilityPort, SpeechFetcherPort};

use crate::loader::RemoteSpeechLoader;
use crate::playback::{PlaybackEvent, StreamingSpeechPlayer};

/// The public end-to-end surface: prefetch, prepare, play, stop, volume,
/// release. A higher-level dispatch policy decides *what* to enqueue and
/// drives this service for each clip that becomes current.
pub struct SpeechService {
    loader: Arc<RemoteSpeechLoader>,
    player: Arc<StreamingSpeechPlayer>,
}

impl SpeechService {
    /// Wire a service from its ports and an opened cache.
    ///
    /// Returns the service and the receiver for [`PlaybackEvent`]s.
    #[must_use]
    pub fn new(
        fetcher: Arc<dyn SpeechFetcherPort>,
        reachability: Arc<dyn ReachabilityPort>,
        render: Arc<dyn AudioRenderPort>,
        cache: Arc<SpeechFileCache>,
        config: PlayerConfig,
    ) -> (Self, mpsc::UnboundedReceiver<PlaybackEvent>) {
        let loader = Arc::new(RemoteSpeechLoader::new(
            fetcher,
            reachability,
            Arc::clone(&cache),
            config.clone(),
        ));
        let (player, event_rx) = StreamingSpeechPlayer::new(render, cache, config);
        (
            Self {
                loader,
                player: Arc::new(player),
            },
            event_rx,
        )
    }

    /// The fetch coordinator.
    #[must_use]
    pub fn loader(&self) -> &Arc<RemoteSpeechLoader> {
        &self.loader
    }

    /// The playback engine.
    #[must_use]
    pub fn player(&self) -> &Arc<StreamingSpeechPlayer> {
        &self.player
    }

    /// Warm the cache for an upcoming announcement.
    pub async fn prefetch(&self, announcement: &Announcement) {
        self.loader.prefetch(announcement).await;
    }

    /// Resolve the playable file for an announcement, waiting (bounded)
    /// for first bytes when it is still downloading.
    pub async fn prepare(&self, announcement: &Announcement) -> SpeechResult<std::path::PathBuf> {
        self.loader.prepare(announcement).await
    }

    /// Play an announcement.
    pub async fn play(&self, announcement: &Announcement) -> SpeechResult<()> {
        self.player.play(announcement).await
    }

    /// Play an announcement with a fade-in ramp.
    pub async fn fade_play(&self, announcement: &Announcement) -> SpeechResult<()> {
        self.player.fade_play(announcement).await
    }

    /// Stop playback, reporting last known progress.
    pub async fn stop(&self) {
        self.player.stop().await;
    }

    /// Fade out, then stop.
    pub async fn fade_stop(&self) {
        self.player.fade_stop().await;
    }

    /// Set playback volume. Out-of-range levels are ignored with a log.
    pub async fn set_volume_level(&self, level: f32) {
        match SpeechVolume::try_new(level) {
            Some(volume) => self.player.set_volume(volume).await,
            None => tracing::warn!(level, "ignoring out-of-range volume"),
        }
    }

    /// Stop playback, cancel all in-flight work, clear outstanding
    /// interest and run cache eviction.
    pub async fn release(&self) {
        self.player.release().await;
        self.loader.release().await;
    }
}
