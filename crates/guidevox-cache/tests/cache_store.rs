//! Integration tests for the speech file cache.
//!
//! Fake fetchers drive the cache without any network: a scripted fetcher
//! returns canned chunk sequences instantly, a live fetcher hands out a
//! channel-fed stream so tests control exactly when bytes "arrive".

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use guidevox_cache::SpeechFileCache;
use guidevox_cache::paths::{media_path, record_path};
use guidevox_core::announcement::{Announcement, VoiceIdentity};
use guidevox_core::config::CacheConfig;
use guidevox_core::errors::SpeechError;
use guidevox_core::ports::{FetchError, SpeechFetcherPort, SpeechStream};
use guidevox_core::progress::SpeechFileProgress;

// ── Fake fetchers ──────────────────────────────────────────────────

type ChunkScript = Vec<Result<Bytes, FetchError>>;

/// Returns one scripted chunk sequence per call, instantly.
struct ScriptedFetcher {
    scripts: std::sync::Mutex<Vec<ChunkScript>>,
    calls: AtomicUsize,
}

impl ScriptedFetcher {
    fn new(scripts: Vec<ChunkScript>) -> Arc<Self> {
        Arc::new(Self {
            scripts: std::sync::Mutex::new(scripts),
            calls: AtomicUsize::new(0),
        })
    }

    fn single(chunks: &[&[u8]]) -> Arc<Self> {
        Self::new(vec![
            chunks.iter().map(|c| Ok(Bytes::copy_from_slice(c))).collect(),
        ])
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SpeechFetcherPort for ScriptedFetcher {
    async fn request_audio(
        &self,
        _text: &guidevox_core::announcement::AnnouncementText,
        _voice: &VoiceIdentity,
    ) -> Result<SpeechStream, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut scripts = self.scripts.lock().expect("scripts lock");
        if scripts.is_empty() {
            return Err(FetchError::transport("no script left"));
        }
        let script = scripts.remove(0);
        Ok(Box::pin(futures_util::stream::iter(script)))
    }
}

/// Hands out a channel-fed stream; the test feeds bytes when it wants.
struct LiveFetcher {
    feed: std::sync::Mutex<Option<mpsc::UnboundedReceiver<Result<Bytes, FetchError>>>>,
    calls: AtomicUsize,
}

impl LiveFetcher {
    fn new() -> (Arc<Self>, mpsc::UnboundedSender<Result<Bytes, FetchError>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Arc::new(Self {
                feed: std::sync::Mutex::new(Some(rx)),
                calls: AtomicUsize::new(0),
            }),
            tx,
        )
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SpeechFetcherPort for LiveFetcher {
    async fn request_audio(
        &self,
        _text: &guidevox_core::announcement::AnnouncementText,
        _voice: &VoiceIdentity,
    ) -> Result<SpeechStream, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let rx = self
            .feed
            .lock()
            .expect("feed lock")
            .take()
            .ok_or_else(|| FetchError::transport("stream already taken"))?;
        Ok(Box::pin(futures_util::stream::unfold(rx, |mut rx| async {
            rx.recv().await.map(|item| (item, rx))
        })))
    }
}

// ── Helpers ────────────────────────────────────────────────────────

fn voice() -> VoiceIdentity {
    VoiceIdentity::new("en-US", "joanna")
}

fn announcement(text: &str) -> Announcement {
    Announcement::plain(text, voice())
}

async fn open_cache(dir: &Path) -> SpeechFileCache {
    SpeechFileCache::open(CacheConfig::in_dir(dir))
        .await
        .expect("cache opens")
}

/// Poll until a progress record exists for the key.
async fn wait_for_record(cache: &SpeechFileCache, announcement: &Announcement) {
    let mut rx = cache.observe_progress(&announcement.cache_key()).await;
    while rx.borrow().is_none() {
        rx.changed().await.expect("cache alive");
    }
}

// ── Tests ──────────────────────────────────────────────────────────

#[tokio::test]
async fn concurrent_requests_trigger_exactly_one_fetch() {
    let dir = tempfile::tempdir().expect("tempdir");
    let cache = Arc::new(open_cache(dir.path()).await);
    let (fetcher, feed) = LiveFetcher::new();
    let ann = announcement("Turn left onto Pine Street");

    // Winner claims the key and awaits the transfer.
    let winner = {
        let cache = Arc::clone(&cache);
        let fetcher = Arc::clone(&fetcher);
        let ann = ann.clone();
        tokio::spawn(async move {
            cache
                .request_speech_file(fetcher as Arc<dyn SpeechFetcherPort>, &ann)
                .await
        })
    };
    wait_for_record(&cache, &ann).await;

    // A second caller with the same key joins instantly, before any bytes.
    let joined = cache
        .request_speech_file(Arc::clone(&fetcher) as Arc<dyn SpeechFetcherPort>, &ann)
        .await
        .expect("joiner gets the path");

    feed.send(Ok(Bytes::from_static(b"audio-bytes"))).expect("feed");
    drop(feed);

    let won = winner.await.expect("join").expect("winner gets the path");
    assert_eq!(won, joined);
    assert_eq!(fetcher.calls(), 1, "exactly one network fetch per key");

    let progress = cache.get_progress(&ann.cache_key()).await.expect("record");
    assert!(progress.is_done);
    assert_eq!(progress.bytes_read, b"audio-bytes".len() as u64);
    assert_eq!(
        tokio::fs::read(&won).await.expect("media readable"),
        b"audio-bytes"
    );
}

#[tokio::test]
async fn completed_file_is_reused_without_refetching() {
    let dir = tempfile::tempdir().expect("tempdir");
    let cache = open_cache(dir.path()).await;
    let fetcher = ScriptedFetcher::single(&[b"first".as_slice()]);
    let ann = announcement("Continue for two miles");

    let first = cache
        .request_speech_file(Arc::clone(&fetcher) as Arc<dyn SpeechFetcherPort>, &ann)
        .await
        .expect("first request");
    let second = cache
        .request_speech_file(Arc::clone(&fetcher) as Arc<dyn SpeechFetcherPort>, &ann)
        .await
        .expect("second request");

    assert_eq!(first, second);
    assert_eq!(fetcher.calls(), 1);
}

#[tokio::test]
async fn transport_failure_surfaces_and_retry_restarts_the_download() {
    let dir = tempfile::tempdir().expect("tempdir");
    let cache = open_cache(dir.path()).await;
    let ann = announcement("Rerouting");

    let failing = ScriptedFetcher::new(vec![vec![
        Ok(Bytes::from_static(b"ab")),
        Err(FetchError::transport("connection reset")),
    ]]);
    let err = cache
        .request_speech_file(Arc::clone(&failing) as Arc<dyn SpeechFetcherPort>, &ann)
        .await
        .expect_err("transport failure surfaces");
    assert!(matches!(err, SpeechError::Transport { .. }));

    // The partial record is left in place, not marked done.
    let stuck = cache.get_progress(&ann.cache_key()).await.expect("record");
    assert!(!stuck.is_done);
    assert_eq!(stuck.bytes_read, 2);

    // A fresh request discards the stale partial state and re-downloads.
    let fetcher = ScriptedFetcher::single(&[b"hello!".as_slice()]);
    let path = cache
        .request_speech_file(Arc::clone(&fetcher) as Arc<dyn SpeechFetcherPort>, &ann)
        .await
        .expect("retry succeeds");
    assert_eq!(fetcher.calls(), 1);

    let progress = cache.get_progress(&ann.cache_key()).await.expect("record");
    assert!(progress.is_done);
    assert_eq!(progress.bytes_read, 6);
    assert_eq!(tokio::fs::read(&path).await.expect("media"), b"hello!");
}

#[tokio::test]
async fn delete_refuses_active_downloads_and_removes_done_entries() {
    let dir = tempfile::tempdir().expect("tempdir");
    let cache = Arc::new(open_cache(dir.path()).await);
    let (fetcher, feed) = LiveFetcher::new();
    let ann = announcement("Exit 12");
    let key = ann.cache_key();

    let winner = {
        let cache = Arc::clone(&cache);
        let fetcher = Arc::clone(&fetcher);
        let ann = ann.clone();
        tokio::spawn(async move {
            cache
                .request_speech_file(fetcher as Arc<dyn SpeechFetcherPort>, &ann)
                .await
        })
    };
    wait_for_record(&cache, &ann).await;

    // Active download: delete is a logged no-op.
    cache.delete(&key).await;
    assert!(cache.get_progress(&key).await.is_some());

    feed.send(Ok(Bytes::from_static(b"ding"))).expect("feed");
    drop(feed);
    winner.await.expect("join").expect("completes");

    cache.delete(&key).await;
    assert!(cache.get_progress(&key).await.is_none());
    assert!(!media_path(cache.cache_dir(), &key).exists());
    assert!(!record_path(cache.cache_dir(), &key).exists());
}

#[tokio::test]
async fn eviction_trims_least_recently_modified_and_spares_active_downloads() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut config = CacheConfig::in_dir(dir.path());
    config.max_cache_bytes = 10;
    let cache = Arc::new(SpeechFileCache::open(config).await.expect("cache opens"));

    let oldest = announcement("oldest");
    let middle = announcement("middle");
    let newest = announcement("newest");

    // Three 4-byte files; mtime order = insertion order.
    for ann in [&oldest, &middle, &newest] {
        let fetcher = ScriptedFetcher::single(&[b"beep".as_slice()]);
        cache
            .request_speech_file(fetcher as Arc<dyn SpeechFetcherPort>, ann)
            .await
            .expect("download");
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    // Plus one in-flight download that must never be evicted.
    let (live, _feed) = LiveFetcher::new();
    let pending = announcement("pending");
    let pending_task = {
        let cache = Arc::clone(&cache);
        let ann = pending.clone();
        tokio::spawn(async move {
            cache
                .request_speech_file(live as Arc<dyn SpeechFetcherPort>, &ann)
                .await
        })
    };
    wait_for_record(&cache, &pending).await;

    cache.clear().await;

    // 12 bytes of done files against a 10-byte budget: one eviction, the
    // least recently modified one.
    assert!(cache.get_progress(&oldest.cache_key()).await.is_none());
    assert!(cache.get_progress(&middle.cache_key()).await.is_some());
    assert!(cache.get_progress(&newest.cache_key()).await.is_some());
    assert!(cache.get_progress(&pending.cache_key()).await.is_some());

    assert!(!media_path(cache.cache_dir(), &oldest.cache_key()).exists());
    assert!(media_path(cache.cache_dir(), &middle.cache_key()).exists());
    assert!(media_path(cache.cache_dir(), &newest.cache_key()).exists());

    pending_task.abort();
}

#[tokio::test]
async fn startup_recovery_deletes_only_the_incomplete_record() {
    let dir = tempfile::tempdir().expect("tempdir");

    let complete = announcement("complete");
    let incomplete = announcement("incomplete");
    seed_entry(dir.path(), &complete, b"done-bytes", true).await;
    seed_entry(dir.path(), &incomplete, b"half", false).await;

    let cache = open_cache(dir.path()).await;

    let kept = cache
        .get_progress(&complete.cache_key())
        .await
        .expect("complete entry survives");
    assert!(kept.is_done);
    assert_eq!(kept.bytes_read, b"done-bytes".len() as u64);

    assert!(cache.get_progress(&incomplete.cache_key()).await.is_none());
    assert!(!media_path(dir.path(), &incomplete.cache_key()).exists());
    assert!(!record_path(dir.path(), &incomplete.cache_key()).exists());
}

#[tokio::test]
async fn malformed_record_discards_the_whole_cache() {
    let dir = tempfile::tempdir().expect("tempdir");

    let valid = announcement("valid entry");
    seed_entry(dir.path(), &valid, b"fine", true).await;
    tokio::fs::write(dir.path().join("not-a-record.json"), b"{ nope")
        .await
        .expect("write garbage");

    let cache = open_cache(dir.path()).await;

    // Availability over salvage: everything is gone, the cache is fresh.
    assert!(cache.get_progress(&valid.cache_key()).await.is_none());
    assert!(!media_path(dir.path(), &valid.cache_key()).exists());
    assert!(!dir.path().join("not-a-record.json").exists());
}

#[tokio::test]
async fn observers_see_monotonic_progress_updates() {
    let dir = tempfile::tempdir().expect("tempdir");
    let cache = Arc::new(open_cache(dir.path()).await);
    let (fetcher, feed) = LiveFetcher::new();
    let ann = announcement("Keep right");

    let mut rx = cache.observe_progress(&ann.cache_key()).await;
    assert!(rx.borrow().is_none(), "no record before any request");

    let winner = {
        let cache = Arc::clone(&cache);
        let ann = ann.clone();
        tokio::spawn(async move {
            cache
                .request_speech_file(fetcher as Arc<dyn SpeechFetcherPort>, &ann)
                .await
        })
    };

    feed.send(Ok(Bytes::from_static(b"aa"))).expect("feed");
    feed.send(Ok(Bytes::from_static(b"bbb"))).expect("feed");
    drop(feed);
    winner.await.expect("join").expect("completes");

    let mut seen = Vec::new();
    loop {
        if let Some(progress) = rx.borrow_and_update().clone() {
            seen.push((progress.bytes_read, progress.is_done));
            if progress.is_done {
                break;
            }
        }
        rx.changed().await.expect("cache alive");
    }

    assert_eq!(seen.last(), Some(&(5, true)));
    let bytes_seen: Vec<u64> = seen.iter().map(|(b, _)| *b).collect();
    let mut sorted = bytes_seen.clone();
    sorted.sort_unstable();
    assert_eq!(bytes_seen, sorted, "observed bytes_read never regresses");
}

/// Write a media file + progress record pair directly, as a previous
/// process run would have left them.
async fn seed_entry(dir: &Path, ann: &Announcement, body: &[u8], is_done: bool) {
    let key = ann.cache_key();
    let media = media_path(dir, &key);
    tokio::fs::write(&media, body).await.expect("seed media");

    let record = SpeechFileProgress {
        cache_key: key.clone(),
        text: ann.text().as_str().to_string(),
        file_path: media,
        bytes_read: body.len() as u64,
        is_done,
    };
    tokio::fs::write(
        record_path(dir, &key),
        serde_json::to_vec(&record).expect("serialize record"),
    )
    .await
    .expect("seed record");
}
