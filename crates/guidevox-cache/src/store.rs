//! The speech file cache.
//!
//! Maps a cache key to on-disk audio bytes plus a persisted progress
//! record, deduplicates concurrent downloads (at most one per key),
//! evicts completed files by size, and discards incomplete files at
//! startup.
//!
//! # Concurrency model
//!
//! The index mutex is the only lock: the check-existing-or-claim step of
//! [`SpeechFileCache::request_speech_file`] is atomic across concurrent
//! callers, and the lock is released before any network I/O. Everything
//! else is observed through per-key `watch` channels whose values are only
//! written by the single transfer that won the claim.
//!
//! Transfers run detached: the claiming caller merely awaits a completion
//! channel, so cancelling it (or any joiner) never aborts a download that
//! other callers may still want.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;

use tokio::sync::{Mutex, watch};

use guidevox_core::announcement::{Announcement, CacheKey};
use guidevox_core::config::CacheConfig;
use guidevox_core::errors::{SpeechError, SpeechResult};
use guidevox_core::paths::ensure_directory;
use guidevox_core::ports::SpeechFetcherPort;
use guidevox_core::progress::SpeechFileProgress;

use crate::paths::{MEDIA_EXT, RECORD_EXT, media_path, record_path};
use crate::throttle::BitrateThrottle;
use crate::transfer;

/// In-memory cache index. Values live in `watch` senders so observers see
/// every update; a `None` value means "no file and no active download".
#[derive(Default)]
struct CacheIndex {
    entries: HashMap<CacheKey, watch::Sender<Option<SpeechFileProgress>>>,
    /// Keys whose transfer task is currently running.
    active: HashSet<CacheKey>,
}

impl CacheIndex {
    fn sender(&mut self, key: &CacheKey) -> &watch::Sender<Option<SpeechFileProgress>> {
        self.entries
            .entry(key.clone())
            .or_insert_with(|| watch::channel(None).0)
    }

    fn snapshot(&self, key: &CacheKey) -> Option<SpeechFileProgress> {
        self.entries.get(key).and_then(|tx| tx.borrow().clone())
    }
}

/// Content-addressed on-disk store for synthesized speech files.
pub struct SpeechFileCache {
    config: CacheConfig,
    index: Arc<Mutex<CacheIndex>>,
}

impl SpeechFileCache {
    /// Open the cache, running startup recovery on its directory.
    ///
    /// Recovery rebuilds the index from persisted records; a single
    /// malformed record discards the whole cache directory (availability
    /// over salvaging possibly-corrupt state), and every record left
    /// not-done by a crash is deleted together with its partial media file.
    pub async fn open(config: CacheConfig) -> SpeechResult<Self> {
        config
            .validate()
            .map_err(|e| SpeechError::internal(e.to_string()))?;
        ensure_directory(&config.cache_dir)
            .map_err(|e| SpeechError::internal(e.to_string()))?;

        let recovered = recover(&config).await?;
        let mut index = CacheIndex::default();
        for (key, record) in recovered {
            index.sender(&key).send_replace(Some(record));
        }

        Ok(Self {
            config,
            index: Arc::new(Mutex::new(index)),
        })
    }

    /// The cache directory in use.
    #[must_use]
    pub fn cache_dir(&self) -> &std::path::Path {
        &self.config.cache_dir
    }

    /// Observe a key's progress: a lazily-updating view that starts at the
    /// current value (`None` = no file and no active download) and updates
    /// until the observer drops the receiver.
    pub async fn observe_progress(
        &self,
        key: &CacheKey,
    ) -> watch::Receiver<Option<SpeechFileProgress>> {
        self.index.lock().await.sender(key).subscribe()
    }

    /// Point-in-time snapshot of a key's progress.
    pub async fn get_progress(&self, key: &CacheKey) -> Option<SpeechFileProgress> {
        self.index.lock().await.snapshot(key)
    }

    /// Start or join the download of an announcement's audio.
    ///
    /// At most one transfer runs per cache key: the caller that wins the
    /// claim awaits the (detached) transfer; every concurrent caller gets
    /// the media path back immediately and can follow progress through
    /// [`Self::observe_progress`].
    ///
    /// A record that is neither done nor owned by a running transfer is a
    /// stale leftover from a failed attempt; it is discarded and the
    /// download restarts.
    pub async fn request_speech_file(
        &self,
        fetcher: Arc<dyn SpeechFetcherPort>,
        announcement: &Announcement,
    ) -> SpeechResult<PathBuf> {
        let key = announcement.cache_key();
        let media = media_path(&self.config.cache_dir, &key);

        let mut done_rx = {
            let mut index = self.index.lock().await;

            if let Some(existing) = index.snapshot(&key) {
                if existing.is_done || index.active.contains(&key) {
                    tracing::debug!(
                        target: "guidevox.cache",
                        key = %key,
                        done = existing.is_done,
                        "joining existing speech file"
                    );
                    return Ok(existing.file_path);
                }
                tracing::warn!(
                    target: "guidevox.cache",
                    key = %key,
                    bytes = existing.bytes_read,
                    "discarding stale partial download before retry"
                );
                let _ = tokio::fs::remove_file(&media).await;
                let _ = tokio::fs::remove_file(record_path(&self.config.cache_dir, &key)).await;
            }

            let record = SpeechFileProgress::started(
                key.clone(),
                announcement.text().as_str().to_string(),
                media.clone(),
            );
            let progress_tx = index.sender(&key).clone();
            progress_tx.send_replace(Some(record.clone()));
            index.active.insert(key.clone());

            let (done_tx, done_rx) = watch::channel::<Option<SpeechResult<()>>>(None);
            let task_index = Arc::clone(&self.index);
            let task_key = key.clone();
            let text = announcement.text().clone();
            let voice = announcement.voice().clone();
            let record_file = record_path(&self.config.cache_dir, &key);
            let throttle = BitrateThrottle::new(self.config.max_bitrate);

            tokio::spawn(async move {
                let result = transfer::run(
                    fetcher.as_ref(),
                    &text,
                    &voice,
                    record,
                    &record_file,
                    &progress_tx,
                    throttle,
                )
                .await;

                if let Err(err) = &result {
                    tracing::warn!(
                        target: "guidevox.cache",
                        key = %task_key,
                        error = %err,
                        "speech file transfer failed"
                    );
                }

                task_index.lock().await.active.remove(&task_key);
                let _ = done_tx.send(Some(result));
            });

            done_rx
        };

        let outcome = done_rx
            .wait_for(Option::is_some)
            .await
            .map_err(|_| SpeechError::internal("transfer task dropped its completion channel"))?
            .clone()
            .expect("wait_for guarantees a value");

        outcome.map(|()| media)
    }

    /// Delete a completed entry: media file, record file and index value.
    ///
    /// Refuses to delete while a download is still in progress — breaking
    /// an active transfer's file out from under it is never recoverable.
    pub async fn delete(&self, key: &CacheKey) {
        let mut index = self.index.lock().await;
        let Some(progress) = index.snapshot(key) else {
            tracing::debug!(target: "guidevox.cache", key = %key, "delete: no cache entry");
            return;
        };
        if !progress.is_done {
            tracing::warn!(
                target: "guidevox.cache",
                key = %key,
                "refusing to delete a speech file that is still downloading"
            );
            return;
        }

        let _ = tokio::fs::remove_file(&progress.file_path).await;
        let _ = tokio::fs::remove_file(record_path(&self.config.cache_dir, key)).await;
        index.sender(key).send_replace(None);
        tracing::debug!(target: "guidevox.cache", key = %key, "deleted cached speech file");
    }

    /// Run eviction: trim completed files back under the byte budget,
    /// least-recently-modified first. In-progress downloads are never
    /// touched. This is not a wipe — under-budget caches are left as-is.
    pub async fn clear(&self) {
        let mut index = self.index.lock().await;

        let done: Vec<SpeechFileProgress> = index
            .entries
            .values()
            .filter_map(|tx| tx.borrow().clone())
            .filter(|p| p.is_done)
            .collect();
        let mut total: u64 = done.iter().map(|p| p.bytes_read).sum();
        if total <= self.config.max_cache_bytes {
            tracing::debug!(
                target: "guidevox.cache",
                total_bytes = total,
                budget = self.config.max_cache_bytes,
                "cache within budget, nothing to evict"
            );
            return;
        }

        // Most-recently-modified first; evict from the tail.
        let mut by_recency: Vec<(SpeechFileProgress, SystemTime)> = Vec::with_capacity(done.len());
        for record in done {
            let modified = tokio::fs::metadata(&record.file_path)
                .await
                .and_then(|m| m.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            by_recency.push((record, modified));
        }
        by_recency.sort_by(|a, b| b.1.cmp(&a.1));

        while total > self.config.max_cache_bytes {
            let Some((victim, _)) = by_recency.pop() else {
                break;
            };
            let _ = tokio::fs::remove_file(&victim.file_path).await;
            let _ =
                tokio::fs::remove_file(record_path(&self.config.cache_dir, &victim.cache_key))
                    .await;
            index.sender(&victim.cache_key).send_replace(None);
            total = total.saturating_sub(victim.bytes_read);
            tracing::info!(
                target: "guidevox.cache",
                key = %victim.cache_key,
                bytes = victim.bytes_read,
                "evicted cached speech file"
            );
        }
    }
}

/// Startup recovery: scan the cache dir, rebuild the record set, wipe on
/// malformed data, drop incomplete downloads and orphan media files.
async fn recover(config: &CacheConfig) -> SpeechResult<HashMap<CacheKey, SpeechFileProgress>> {
    let cache_dir = &config.cache_dir;
    let mut record_files = Vec::new();
    let mut media_files = Vec::new();

    let mut entries = tokio::fs::read_dir(cache_dir)
        .await
        .map_err(|e| SpeechError::from_io_error(&e))?;
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| SpeechError::from_io_error(&e))?
    {
        let path = entry.path();
        match path.extension().and_then(|e| e.to_str()) {
            Some(RECORD_EXT) => record_files.push(path),
            Some(MEDIA_EXT) => media_files.push(path),
            _ => {}
        }
    }

    let mut records: HashMap<CacheKey, SpeechFileProgress> = HashMap::new();
    for path in &record_files {
        let parsed = tokio::fs::read(path)
            .await
            .map_err(|e| SpeechError::from_io_error(&e))
            .and_then(|bytes| {
                serde_json::from_slice::<SpeechFileProgress>(&bytes)
                    .map_err(|e| SpeechError::cache_corrupt(e.to_string()))
            });

        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("");
        match parsed {
            Ok(record) if record.cache_key.as_str() == stem => {
                records.insert(record.cache_key.clone(), record);
            }
            Ok(record) => {
                tracing::warn!(
                    target: "guidevox.cache",
                    file = %path.display(),
                    key = %record.cache_key,
                    "progress record does not match its file name, discarding cache"
                );
                wipe(config).await?;
                return Ok(HashMap::new());
            }
            Err(err) => {
                tracing::warn!(
                    target: "guidevox.cache",
                    file = %path.display(),
                    error = %err,
                    "malformed progress record, discarding cache"
                );
                wipe(config).await?;
                return Ok(HashMap::new());
            }
        }
    }

    // Interrupted downloads cannot be resumed: drop them with their files.
    let mut kept = HashMap::new();
    for (key, mut record) in records {
        let media = media_path(cache_dir, &key);
        if !record.is_done || !media.exists() {
            tracing::info!(
                target: "guidevox.cache",
                key = %key,
                bytes = record.bytes_read,
                "removing incomplete cached download"
            );
            let _ = tokio::fs::remove_file(&media).await;
            let _ = tokio::fs::remove_file(record_path(cache_dir, &key)).await;
            continue;
        }
        // Re-home the path in case the cache directory moved.
        record.file_path = media;
        kept.insert(key, record);
    }

    // Media files without a surviving record are unreadable leftovers.
    for media in media_files {
        let stem = media.file_stem().and_then(|s| s.to_str()).unwrap_or("");
        if !kept.keys().any(|key| key.as_str() == stem) {
            tracing::debug!(
                target: "guidevox.cache",
                file = %media.display(),
                "removing orphan media file"
            );
            let _ = tokio::fs::remove_file(&media).await;
        }
    }

    Ok(kept)
}

/// Delete every file in the cache directory, keeping the directory itself.
async fn wipe(config: &CacheConfig) -> SpeechResult<()> {
    let mut entries = tokio::fs::read_dir(&config.cache_dir)
        .await
        .map_err(|e| SpeechError::from_io_error(&e))?;
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| SpeechError::from_io_error(&e))?
    {
        let path = entry.path();
        if path.is_file() {
            let _ = tokio::fs::remove_file(&path).await;
        }
    }
    tracing::warn!(
        target: "guidevox.cache",
        dir = %config.cache_dir.display(),
        "cache directory wiped"
    );
    Ok(())
}
