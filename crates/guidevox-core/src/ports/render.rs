//! Platform audio render port.
//!
//! The engine never touches codecs or audio devices itself; it hands a
//! complete file (or a partial-read source) to the platform render and
//! drives it through [`RenderControls`]. Completion is reported out-of-band
//! through the session's `finished` channel so playback control and
//! completion watching can live on different tasks.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::oneshot;

/// Errors reported by the platform render.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RenderError {
    /// The render does not support the requested capability
    /// (streaming sources, volume ramps on older platforms).
    #[error("Operation not supported by this render")]
    Unsupported,

    /// The render was in the wrong state for the requested action; expected
    /// in races between stop and asynchronous preparation callbacks.
    #[error("Render in wrong state: {0}")]
    WrongState(String),

    /// The underlying audio device failed.
    #[error("Audio device error: {0}")]
    Device(String),

    /// Reading media data failed.
    #[error("Media read error: {0}")]
    Io(String),
}

/// A data source the render can read from while the backing file is still
/// being downloaded.
#[async_trait]
pub trait SpeechSource: Send {
    /// Read up to `buf.len()` bytes at `offset`.
    ///
    /// Suspends until the range can be served or the backing download is
    /// done; returns `Ok(0)` (end of stream) only once the download is done
    /// and all bytes are consumed.
    async fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<usize, RenderError>;

    /// Total size, if already known (i.e. the download finished).
    fn len_hint(&self) -> Option<u64>;
}

/// Control half of an active render.
#[async_trait]
pub trait RenderControls: Send {
    /// Begin rendering prepared media.
    async fn start(&mut self) -> Result<(), RenderError>;

    /// Halt rendering; returns the elapsed playback time at the stop point.
    /// Valid in any state — a pending (never-started) render stops at zero.
    async fn stop(&mut self) -> Result<Duration, RenderError>;

    /// Apply a volume level in `[0.0, 1.0]` immediately.
    fn set_volume(&mut self, level: f32);

    /// Ramp volume from `from` to `to` over `over`.
    ///
    /// May fail with [`RenderError::Unsupported`] or
    /// [`RenderError::WrongState`]; callers fall back to an immediate
    /// `set_volume`.
    fn ramp_volume(&mut self, from: f32, to: f32, over: Duration)
    -> Result<(), RenderError>;

    /// Elapsed playback time of the current media.
    fn elapsed(&self) -> Duration;
}

/// One prepared render: controls plus a completion channel.
///
/// `finished` resolves with the total elapsed time on natural completion or
/// with the failure that ended rendering. If the session is stopped or
/// dropped first, the channel closes without a value.
pub struct RenderSession {
    /// Start/stop/volume control surface.
    pub controls: Box<dyn RenderControls>,
    /// Resolves when rendering ends on its own.
    pub finished: oneshot::Receiver<Result<Duration, RenderError>>,
}

/// Port trait for the platform playback primitive.
#[async_trait]
pub trait AudioRenderPort: Send + Sync {
    /// Whether [`Self::prepare_source`] is available.
    fn supports_streaming(&self) -> bool {
        false
    }

    /// Prepare a complete local media file for rendering.
    async fn prepare_file(&self, path: &Path) -> Result<RenderSession, RenderError>;

    /// Prepare a partial-read source for rendering while its backing file
    /// is still downloading.
    async fn prepare_source(
        &self,
        source: Box<dyn SpeechSource>,
    ) -> Result<RenderSession, RenderError> {
        let _ = source;
        Err(RenderError::Unsupported)
    }
}
