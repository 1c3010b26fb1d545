//! Remote fetch coordinator.
//!
//! Drives the speech file cache against the abstract fetcher: `prefetch`
//! warms the cache ahead of time, `prepare` waits (bounded) for the first
//! usable bytes of an announcement that is cached or being downloaded, and
//! `release` detaches all coordinator interest without aborting transfers
//! other callers may still want.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{Mutex, watch};
use tokio_util::sync::CancellationToken;

use guidevox_cache::SpeechFileCache;
use guidevox_core::announcement::{Announcement, CacheKey};
use guidevox_core::config::PlayerConfig;
use guidevox_core::errors::{SpeechError, SpeechResult};
use guidevox_core::ports::{ReachabilityPort, SpeechFetcherPort};

use crate::wait;

/// Coordinates prefetch and preparation of remote speech files.
pub struct RemoteSpeechLoader {
    fetcher: Arc<dyn SpeechFetcherPort>,
    reachability: Arc<dyn ReachabilityPort>,
    cache: Arc<SpeechFileCache>,
    config: PlayerConfig,
    /// Keys with an active coordinator-level download interest. The watch
    /// value flips to `false` when the interest ends, which wakes any
    /// `prepare` blocked on it.
    outstanding: Arc<Mutex<HashMap<CacheKey, watch::Sender<bool>>>>,
    /// Root token for coordinator-owned tasks; replaced on `release`.
    cancel: Mutex<CancellationToken>,
}

impl RemoteSpeechLoader {
    /// Create a loader over a cache and its ports.
    #[must_use]
    pub fn new(
        fetcher: Arc<dyn SpeechFetcherPort>,
        reachability: Arc<dyn ReachabilityPort>,
        cache: Arc<SpeechFileCache>,
        config: PlayerConfig,
    ) -> Self {
        Self {
            fetcher,
            reachability,
            cache,
            config,
            outstanding: Arc::new(Mutex::new(HashMap::new())),
            cancel: Mutex::new(CancellationToken::new()),
        }
    }

    /// The cache this loader coordinates.
    #[must_use]
    pub fn cache(&self) -> &Arc<SpeechFileCache> {
        &self.cache
    }

    /// Warm the cache for an announcement.
    ///
    /// No-op while offline. Otherwise marks the key outstanding, starts (or
    /// joins) the cache download in the background, and clears the flag on
    /// completion or failure alike.
    pub async fn prefetch(&self, announcement: &Announcement) {
        if !self.reachability.is_reachable() {
            tracing::debug!(
                utterance = %announcement.utterance_id(),
                "offline, skipping speech prefetch"
            );
            return;
        }

        let key = announcement.cache_key();
        {
            let mut outstanding = self.outstanding.lock().await;
            if outstanding.contains_key(&key) {
                tracing::debug!(key = %key, "prefetch already outstanding");
                return;
            }
            outstanding.insert(key.clone(), watch::channel(true).0);
        }

        let fetcher = Arc::clone(&self.fetcher);
        let cache = Arc::clone(&self.cache);
        let outstanding = Arc::clone(&self.outstanding);
        let cancel = self.cancel.lock().await.clone();
        let announcement = announcement.clone();

        tokio::spawn(async move {
            let key = announcement.cache_key();
            tokio::select! {
                () = cancel.cancelled() => {
                    // The transfer itself is detached inside the cache and
                    // keeps running; only our interest in it ends here.
                    tracing::debug!(key = %key, "prefetch detached by release");
                }
                result = cache.request_speech_file(fetcher, &announcement) => {
                    if let Err(err) = result {
                        tracing::warn!(key = %key, error = %err, "speech prefetch failed");
                    }
                }
            }

            if let Some(flag) = outstanding.lock().await.remove(&key) {
                flag.send_replace(false);
            }
        });
    }

    /// Resolve the playable file path for an announcement.
    ///
    /// Returns immediately for any cached or in-progress file (playback can
    /// start from a partial file), fails fast when nothing is downloading,
    /// and otherwise waits — bounded — on three events: enough bytes
    /// arriving, the timeout, or the outstanding interest being cleared.
    pub async fn prepare(&self, announcement: &Announcement) -> SpeechResult<PathBuf> {
        let key = announcement.cache_key();

        if let Some(progress) = self.cache.get_progress(&key).await {
            return Ok(progress.file_path);
        }

        let flag_rx = self
            .outstanding
            .lock()
            .await
            .get(&key)
            .map(watch::Sender::subscribe);
        let Some(mut flag_rx) = flag_rx else {
            tracing::debug!(key = %key, "prepare: file is not downloading");
            return Err(SpeechError::not_downloading(key.as_str()));
        };

        let mut progress_rx = self.cache.observe_progress(&key).await;
        let deadline = tokio::time::sleep(self.config.prepare_timeout);
        tokio::pin!(deadline);

        loop {
            if let Some(progress) = progress_rx.borrow_and_update().clone() {
                if wait::is_data_available(&progress, self.config.min_start_bytes) {
                    return Ok(progress.file_path);
                }
            }

            tokio::select! {
                () = &mut deadline => {
                    tracing::warn!(key = %key, "timed out waiting for speech data");
                    return Err(SpeechError::Timeout);
                }
                changed = progress_rx.changed() => {
                    changed.map_err(|_| SpeechError::internal("cache index dropped"))?;
                }
                result = flag_rx.changed() => {
                    if result.is_err() || !*flag_rx.borrow() {
                        // The download may have just finished; prefer its result.
                        if let Some(progress) = self.cache.get_progress(&key).await {
                            if wait::is_data_available(&progress, self.config.min_start_bytes) {
                                return Ok(progress.file_path);
                            }
                        }
                        tracing::debug!(key = %key, "outstanding interest cleared while preparing");
                        return Err(SpeechError::not_downloading(key.as_str()));
                    }
                }
            }
        }
    }

    /// Detach every coordinator task, clear the outstanding set, and run
    /// cache eviction. In-flight cache transfers keep running — release
    /// only ends this coordinator's interest in them.
    pub async fn release(&self) {
        let token = {
            let mut guard = self.cancel.lock().await;
            std::mem::replace(&mut *guard, CancellationToken::new())
        };
        token.cancel();

        let flags: Vec<(CacheKey, watch::Sender<bool>)> =
            self.outstanding.lock().await.drain().collect();
        for (key, flag) in flags {
            tracing::debug!(key = %key, "cleared outstanding request");
            flag.send_replace(false);
        }

        self.cache.clear().await;
    }
}
