//! Byte-rate admission for the transfer loop.

use std::time::Duration;

use tokio::time::Instant;

/// Caps how many bytes each read iteration may transfer, at
/// `max_bitrate * elapsed_seconds_since_last_read / 8`.
///
/// Unbounded by default. Uses the tokio clock so paused-time tests are
/// fully deterministic.
pub struct BitrateThrottle {
    max_bitrate: Option<u64>,
    last_read: Instant,
}

impl BitrateThrottle {
    /// Create a throttle; `None` means unbounded.
    #[must_use]
    pub fn new(max_bitrate: Option<u64>) -> Self {
        Self {
            max_bitrate,
            last_read: Instant::now(),
        }
    }

    /// Admit `bytes` for transfer, sleeping until the configured bitrate
    /// allows them through. Returns immediately when unbounded.
    pub async fn admit(&mut self, bytes: usize) {
        let Some(rate) = self.max_bitrate else {
            return;
        };

        #[allow(clippy::cast_precision_loss)]
        let allowed = rate as f64 * self.last_read.elapsed().as_secs_f64() / 8.0;
        #[allow(clippy::cast_precision_loss)]
        let needed = bytes as f64;
        if needed > allowed {
            #[allow(clippy::cast_precision_loss)]
            let wait = (needed - allowed) * 8.0 / rate as f64;
            tokio::time::sleep(Duration::from_secs_f64(wait)).await;
        }

        self.last_read = Instant::now();
    }
}
