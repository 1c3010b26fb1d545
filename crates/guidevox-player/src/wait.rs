//! The shared "is data available" predicate and its bounded wait.
//!
//! Both `prepare` and `play` gate on the same condition: the cached file
//! has at least the minimum byte threshold, or is already complete.

use std::time::Duration;

use guidevox_core::announcement::CacheKey;
use guidevox_core::errors::{SpeechError, SpeechResult};
use guidevox_core::progress::SpeechFileProgress;
use guidevox_cache::SpeechFileCache;

/// Whether playback may start from this progress record.
pub(crate) fn is_data_available(progress: &SpeechFileProgress, min_start_bytes: u64) -> bool {
    progress.is_done || progress.bytes_read >= min_start_bytes
}

/// Wait until a key's progress satisfies [`is_data_available`], bounded by
/// `timeout`. Resolves with the satisfying snapshot.
pub(crate) async fn await_data_available(
    cache: &SpeechFileCache,
    key: &CacheKey,
    min_start_bytes: u64,
    timeout: Duration,
) -> SpeechResult<SpeechFileProgress> {
    let mut progress_rx = cache.observe_progress(key).await;
    let deadline = tokio::time::sleep(timeout);
    tokio::pin!(deadline);

    loop {
        if let Some(progress) = progress_rx.borrow_and_update().clone() {
            if is_data_available(&progress, min_start_bytes) {
                return Ok(progress);
            }
        }

        tokio::select! {
            () = &mut deadline => return Err(SpeechError::Timeout),
            changed = progress_rx.changed() => {
                changed.map_err(|_| SpeechError::internal("cache index dropped"))?;
            }
        }
    }
}
