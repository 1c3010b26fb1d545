//! The byte-transfer loop: fetcher stream → media file, with the progress
//! record updated and persisted after every chunk.
//!
//! Runs detached from the caller that started it (see `store`), so a
//! cancelled waiter never aborts a download other callers may join.

use std::path::Path;

use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio::sync::watch;

use guidevox_core::announcement::{AnnouncementText, VoiceIdentity};
use guidevox_core::errors::{SpeechError, SpeechResult};
use guidevox_core::ports::SpeechFetcherPort;
use guidevox_core::progress::SpeechFileProgress;

use crate::throttle::BitrateThrottle;

/// Transfer one announcement's audio into the cache.
///
/// On success the record is marked done and persisted. On failure the
/// partial media file and its not-done record are left in place; the next
/// request for the key (or startup recovery) cleans them up.
pub(crate) async fn run(
    fetcher: &dyn SpeechFetcherPort,
    text: &AnnouncementText,
    voice: &VoiceIdentity,
    mut record: SpeechFileProgress,
    record_file: &Path,
    progress_tx: &watch::Sender<Option<SpeechFileProgress>>,
    mut throttle: BitrateThrottle,
) -> SpeechResult<()> {
    let mut stream = fetcher
        .request_audio(text, voice)
        .await
        .map_err(SpeechError::from)?;

    let mut file = tokio::fs::File::create(&record.file_path)
        .await
        .map_err(|e| SpeechError::from_io_error(&e))?;
    persist(record_file, &record).await?;
    progress_tx.send_replace(Some(record.clone()));

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(SpeechError::from)?;
        if chunk.is_empty() {
            continue;
        }
        throttle.admit(chunk.len()).await;

        file.write_all(&chunk)
            .await
            .map_err(|e| SpeechError::from_io_error(&e))?;
        // Flush before advancing bytes_read: readers may only consume bytes
        // the record already accounts for.
        file.flush()
            .await
            .map_err(|e| SpeechError::from_io_error(&e))?;

        record.bytes_read += chunk.len() as u64;
        persist(record_file, &record).await?;
        progress_tx.send_replace(Some(record.clone()));
    }

    record.is_done = true;
    persist(record_file, &record).await?;
    progress_tx.send_replace(Some(record.clone()));

    tracing::debug!(
        target: "guidevox.cache",
        key = %record.cache_key,
        bytes = record.bytes_read,
        "speech file complete"
    );
    Ok(())
}

/// Persist the progress record next to the media file.
async fn persist(record_file: &Path, record: &SpeechFileProgress) -> SpeechResult<()> {
    let json = serde_json::to_vec(record)
        .map_err(|e| SpeechError::internal(format!("progress record serialization: {e}")))?;
    tokio::fs::write(record_file, json)
        .await
        .map_err(|e| SpeechError::from_io_error(&e))
}
