//! Partial-read data source over a cache file that is still downloading.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt, SeekFrom};
use tokio::sync::watch;

use guidevox_core::ports::{RenderError, SpeechSource};
use guidevox_core::progress::SpeechFileProgress;

/// Reads a cached media file while its download is in flight.
///
/// `read_at` serves only bytes the progress record already accounts for —
/// the transfer flushes before advancing `bytes_read`, so anything at or
/// below that mark is safely on disk. When the requested range is not
/// available yet, the read poll-waits on a short interval until either the
/// range fills in or the record reports done.
pub struct CachedFileSource {
    file: File,
    progress_rx: watch::Receiver<Option<SpeechFileProgress>>,
    poll_interval: Duration,
}

impl CachedFileSource {
    /// Open the media file for partial reads.
    pub async fn open(
        path: &Path,
        progress_rx: watch::Receiver<Option<SpeechFileProgress>>,
        poll_interval: Duration,
    ) -> std::io::Result<Self> {
        let file = File::open(path).await?;
        Ok(Self {
            file,
            progress_rx,
            poll_interval,
        })
    }
}

#[async_trait]
impl SpeechSource for CachedFileSource {
    async fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<usize, RenderError> {
        if buf.is_empty() {
            return Ok(0);
        }

        loop {
            let snapshot = self.progress_rx.borrow().clone();
            let Some(progress) = snapshot else {
                return Err(RenderError::Io(
                    "no progress record for streamed file".into(),
                ));
            };

            let wanted_end = offset + buf.len() as u64;
            if progress.bytes_read >= wanted_end || progress.is_done {
                // End of stream only once the download is done and every
                // byte has been consumed.
                if progress.is_done && offset >= progress.bytes_read {
                    return Ok(0);
                }

                let available = (progress.bytes_read.min(wanted_end) - offset) as usize;
                self.file
                    .seek(SeekFrom::Start(offset))
                    .await
                    .map_err(|e| RenderError::Io(e.to_string()))?;
                self.file
                    .read_exact(&mut buf[..available])
                    .await
                    .map_err(|e| RenderError::Io(e.to_string()))?;
                return Ok(available);
            }

            tokio::time::sleep(self.poll_interval).await;
        }
    }

    fn len_hint(&self) -> Option<u64> {
        self.progress_rx
            .borrow()
            .as_ref()
            .filter(|p| p.is_done)
            .map(|p| p.bytes_read)
    }
}
