//! Integration tests for the remote fetch coordinator.

mod common;

use std::sync::Arc;

use bytes::Bytes;
use common::{LiveFetcher, ScriptedFetcher};

use guidevox_cache::SpeechFileCache;
use guidevox_core::announcement::{Announcement, VoiceIdentity};
use guidevox_core::config::{CacheConfig, PlayerConfig};
use guidevox_core::errors::SpeechError;
use guidevox_core::ports::{AlwaysReachable, ReachabilityPort, SpeechFetcherPort};
use guidevox_player::RemoteSpeechLoader;

fn announcement(text: &str) -> Announcement {
    Announcement::plain(text, VoiceIdentity::new("en-US", "joanna"))
}

async fn open_cache(dir: &std::path::Path) -> Arc<SpeechFileCache> {
    Arc::new(
        SpeechFileCache::open(CacheConfig::in_dir(dir))
            .await
            .expect("cache opens"),
    )
}

fn loader(
    fetcher: Arc<dyn SpeechFetcherPort>,
    cache: Arc<SpeechFileCache>,
) -> Arc<RemoteSpeechLoader> {
    Arc::new(RemoteSpeechLoader::new(
        fetcher,
        Arc::new(AlwaysReachable),
        cache,
        PlayerConfig::default(),
    ))
}

/// Let spawned tasks make progress without advancing the paused clock.
async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn prepare_returns_immediately_for_a_cached_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let cache = open_cache(dir.path()).await;
    let ann = announcement("Turn left");

    let fetcher = ScriptedFetcher::single(&[b"audio".as_slice()]);
    cache
        .request_speech_file(Arc::clone(&fetcher) as Arc<dyn SpeechFetcherPort>, &ann)
        .await
        .expect("download");

    let loader = loader(fetcher, cache);
    let path = loader.prepare(&ann).await.expect("prepared");
    assert!(path.exists());
}

#[tokio::test]
async fn prepare_fails_fast_when_nothing_is_downloading() {
    let dir = tempfile::tempdir().expect("tempdir");
    let cache = open_cache(dir.path()).await;
    let fetcher = ScriptedFetcher::single(&[b"unused".as_slice()]);
    let loader = loader(fetcher, cache);

    let err = loader
        .prepare(&announcement("Nothing here"))
        .await
        .expect_err("fail fast");
    assert!(matches!(err, SpeechError::NotDownloading { .. }));
}

#[tokio::test(start_paused = true)]
async fn prepare_resolves_once_first_bytes_arrive() {
    let dir = tempfile::tempdir().expect("tempdir");
    let cache = open_cache(dir.path()).await;
    let (fetcher, feed) = LiveFetcher::new();
    let ann = announcement("Keep right at the fork");

    let loader = loader(fetcher, cache);
    loader.prefetch(&ann).await;
    settle().await;

    let prepare = {
        let loader = Arc::clone(&loader);
        let ann = ann.clone();
        tokio::spawn(async move { loader.prepare(&ann).await })
    };
    settle().await;

    // Four bytes are enough to prove the file exists and is being written.
    feed.send(Ok(Bytes::from_static(b"RIFF"))).expect("feed");
    let path = prepare.await.expect("join").expect("prepare resolves");
    assert!(path.ends_with(format!("{}.mp3", ann.cache_key())));

    drop(feed);
}

#[tokio::test(start_paused = true)]
async fn prepare_times_out_when_no_bytes_arrive() {
    let dir = tempfile::tempdir().expect("tempdir");
    let cache = open_cache(dir.path()).await;
    let (fetcher, feed) = LiveFetcher::new();
    let ann = announcement("Silent download");

    let loader = loader(fetcher, cache);
    loader.prefetch(&ann).await;
    settle().await;

    // Nothing is ever fed; the 10-second budget expires on the paused clock.
    let err = loader.prepare(&ann).await.expect_err("times out");
    assert_eq!(err, SpeechError::Timeout);

    drop(feed);
}

#[tokio::test(start_paused = true)]
async fn release_fails_pending_prepares_and_clears_outstanding() {
    let dir = tempfile::tempdir().expect("tempdir");
    let cache = open_cache(dir.path()).await;
    let (fetcher, feed) = LiveFetcher::new();
    let ann = announcement("Released mid-wait");

    let loader = loader(fetcher, cache);
    loader.prefetch(&ann).await;
    settle().await;

    let prepare = {
        let loader = Arc::clone(&loader);
        let ann = ann.clone();
        tokio::spawn(async move { loader.prepare(&ann).await })
    };
    settle().await;

    loader.release().await;
    settle().await;

    let err = prepare.await.expect("join").expect_err("prepare fails");
    assert!(matches!(err, SpeechError::NotDownloading { .. }));

    // The cache transfer itself was not aborted: its zero-byte record is
    // still there, so a fresh prepare resolves to the path immediately.
    let path = loader.prepare(&ann).await.expect("record still exists");
    assert!(path.ends_with(format!("{}.mp3", ann.cache_key())));

    drop(feed);
}

#[tokio::test]
async fn prefetch_is_skipped_while_offline() {
    mockall::mock! {
        Offline {}
        impl ReachabilityPort for Offline {
            fn is_reachable(&self) -> bool;
        }
    }

    let dir = tempfile::tempdir().expect("tempdir");
    let cache = open_cache(dir.path()).await;
    let fetcher = ScriptedFetcher::single(&[b"unused".as_slice()]);

    let mut offline = MockOffline::new();
    offline.expect_is_reachable().return_const(false);

    let loader = Arc::new(RemoteSpeechLoader::new(
        Arc::clone(&fetcher) as Arc<dyn SpeechFetcherPort>,
        Arc::new(offline),
        cache,
        PlayerConfig::default(),
    ));

    let ann = announcement("Offline attempt");
    loader.prefetch(&ann).await;
    settle().await;

    assert_eq!(fetcher.calls(), 0, "no fetch while offline");
    assert!(matches!(
        loader.prepare(&ann).await,
        Err(SpeechError::NotDownloading { .. })
    ));
}

#[tokio::test]
async fn duplicate_prefetch_joins_the_outstanding_request() {
    let dir = tempfile::tempdir().expect("tempdir");
    let cache = open_cache(dir.path()).await;
    let (fetcher, feed) = LiveFetcher::new();
    let ann = announcement("Prefetch twice");

    let loader = loader(Arc::clone(&fetcher) as Arc<dyn SpeechFetcherPort>, cache);
    loader.prefetch(&ann).await;
    settle().await;
    loader.prefetch(&ann).await;
    settle().await;

    assert_eq!(fetcher.calls(), 1, "second prefetch joins the first");

    feed.send(Ok(Bytes::from_static(b"dingdong"))).expect("feed");
    drop(feed);
    settle().await;

    let path = loader.prepare(&ann).await.expect("cached after prefetch");
    assert!(path.exists());
}
