//! Streaming speech playback.
//!
//! Renders one announcement at a time through the platform render port,
//! starting from a partially-downloaded file when streaming is enabled and
//! the render supports it. Fade variants ramp volume over a fixed window
//! and fall back to an immediate start/stop when the render cannot ramp.
//!
//! Per-utterance state machine:
//!
//! ```text
//!   Idle → (data available?) → Preparing → Speaking → {Done | Stopped | Error}
//! ```
//!
//! `Done` and `Error` are terminal per utterance; `Stopped` may be followed
//! by a new `play`. Every utterance resolves to exactly one terminal
//! [`PlaybackEvent`] — a failed attempt is never silent.

mod source;

pub use source::CachedFileSource;

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use guidevox_cache::SpeechFileCache;
use guidevox_core::announcement::{Announcement, CacheKey, SpeechVolume};
use guidevox_core::config::PlayerConfig;
use guidevox_core::errors::{SpeechError, SpeechResult};
use guidevox_core::ports::{AudioRenderPort, RenderControls, RenderError, RenderSession};

use crate::wait;

// ── State machine ──────────────────────────────────────────────────

/// Current state of the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaybackState {
    /// Nothing queued or playing.
    Idle,
    /// Waiting for data / configuring the render.
    Preparing,
    /// Audio is being rendered.
    Speaking,
    /// The last utterance finished naturally.
    Done,
    /// The last utterance was stopped.
    Stopped,
    /// The last utterance failed.
    Error,
}

// ── Events ─────────────────────────────────────────────────────────

/// Events emitted to the dispatch layer driving the player.
#[derive(Debug, Clone)]
pub enum PlaybackEvent {
    /// The render is configured and about to start.
    Prepared {
        /// Utterance being played.
        utterance_id: Uuid,
    },
    /// Audio started.
    Started {
        /// Utterance being played.
        utterance_id: Uuid,
    },
    /// The utterance finished naturally.
    Done {
        /// Utterance that finished.
        utterance_id: Uuid,
        /// Total rendered time.
        elapsed: Duration,
    },
    /// Playback was stopped; reported even for a pending-state stop with
    /// no utterance configured.
    Stopped {
        /// Utterance that was stopped, if any.
        utterance_id: Option<Uuid>,
        /// Last known elapsed playback time.
        elapsed: Duration,
    },
    /// The utterance failed; terminal.
    Error {
        /// Utterance that failed.
        utterance_id: Uuid,
        /// What went wrong.
        message: String,
    },
}

// ── Player ─────────────────────────────────────────────────────────

struct CurrentPlay {
    utterance_id: Uuid,
    controls: Box<dyn RenderControls>,
}

struct PlayerInner {
    state: PlaybackState,
    current: Option<CurrentPlay>,
    last_elapsed: Duration,
    volume: f32,
}

/// Plays announcements from the speech file cache, streaming from partial
/// files when possible.
pub struct StreamingSpeechPlayer {
    render: Arc<dyn AudioRenderPort>,
    cache: Arc<SpeechFileCache>,
    config: PlayerConfig,
    event_tx: mpsc::UnboundedSender<PlaybackEvent>,
    inner: Arc<Mutex<PlayerInner>>,
    /// Cancels in-flight `play` waits; replaced on `release`.
    cancel: Mutex<CancellationToken>,
}

impl StreamingSpeechPlayer {
    /// Create a player over a render port and cache.
    ///
    /// Returns the player and the receiver for [`PlaybackEvent`]s.
    #[must_use]
    pub fn new(
        render: Arc<dyn AudioRenderPort>,
        cache: Arc<SpeechFileCache>,
        config: PlayerConfig,
    ) -> (Self, mpsc::UnboundedReceiver<PlaybackEvent>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let player = Self {
            render,
            cache,
            config,
            event_tx,
            inner: Arc::new(Mutex::new(PlayerInner {
                state: PlaybackState::Idle,
                current: None,
                last_elapsed: Duration::ZERO,
                volume: 1.0,
            })),
            cancel: Mutex::new(CancellationToken::new()),
        };
        (player, event_rx)
    }

    /// Current player state.
    pub async fn state(&self) -> PlaybackState {
        self.inner.lock().await.state
    }

    /// Play an announcement at the current volume.
    pub async fn play(&self, announcement: &Announcement) -> SpeechResult<()> {
        self.play_inner(announcement, false).await
    }

    /// Play an announcement, ramping volume up over the fade window.
    pub async fn fade_play(&self, announcement: &Announcement) -> SpeechResult<()> {
        self.play_inner(announcement, true).await
    }

    async fn play_inner(&self, announcement: &Announcement, fade: bool) -> SpeechResult<()> {
        let utterance_id = announcement.utterance_id();
        {
            let mut inner = self.inner.lock().await;
            if inner.current.is_some() {
                return Err(SpeechError::playback_state(
                    "another announcement is already playing",
                ));
            }
            inner.state = PlaybackState::Preparing;
        }

        let cancel = self.cancel.lock().await.clone();
        match self.run_attempt(announcement, fade, &cancel).await {
            Ok(()) => Ok(()),
            Err(SpeechError::Cancelled) => {
                let mut inner = self.inner.lock().await;
                inner.state = PlaybackState::Stopped;
                let _ = self.event_tx.send(PlaybackEvent::Stopped {
                    utterance_id: Some(utterance_id),
                    elapsed: inner.last_elapsed,
                });
                Err(SpeechError::Cancelled)
            }
            Err(err) => {
                let mut inner = self.inner.lock().await;
                inner.state = PlaybackState::Error;
                let _ = self.event_tx.send(PlaybackEvent::Error {
                    utterance_id,
                    message: err.to_string(),
                });
                Err(err)
            }
        }
    }

    async fn run_attempt(
        &self,
        announcement: &Announcement,
        fade: bool,
        cancel: &CancellationToken,
    ) -> SpeechResult<()> {
        let utterance_id = announcement.utterance_id();
        let key = announcement.cache_key();

        let progress = tokio::select! {
            () = cancel.cancelled() => return Err(SpeechError::Cancelled),
            result = wait::await_data_available(
                &self.cache,
                &key,
                self.config.min_start_bytes,
                self.config.prepare_timeout,
            ) => result?,
        };

        let session = if self.config.streaming && self.render.supports_streaming() {
            let source = CachedFileSource::open(
                &progress.file_path,
                self.cache.observe_progress(&key).await,
                self.config.source_poll_interval,
            )
            .await
            .map_err(|e| SpeechError::from_io_error(&e))?;

            match self.render.prepare_source(Box::new(source)).await {
                Ok(session) => session,
                Err(RenderError::Unsupported) => {
                    tracing::debug!(
                        key = %key,
                        "render rejected the streaming source, waiting for the complete file"
                    );
                    self.prepare_complete_file(&key, cancel).await?
                }
                Err(err) => return Err(map_render_error(&err)),
            }
        } else {
            self.prepare_complete_file(&key, cancel).await?
        };

        let RenderSession {
            mut controls,
            finished,
        } = session;
        let volume = self.inner.lock().await.volume;
        let _ = self.event_tx.send(PlaybackEvent::Prepared { utterance_id });

        if fade {
            controls.set_volume(0.0);
            controls
                .start()
                .await
                .map_err(|e| map_render_error(&e))?;
            if let Err(err) = controls.ramp_volume(0.0, volume, self.config.fade_duration) {
                // Expected on older platforms or in stop races; not an error.
                tracing::debug!(error = %err, "fade-in ramp unavailable, starting at volume");
                controls.set_volume(volume);
            }
        } else {
            controls.set_volume(volume);
            controls
                .start()
                .await
                .map_err(|e| map_render_error(&e))?;
        }

        {
            let mut inner = self.inner.lock().await;
            inner.state = PlaybackState::Speaking;
            inner.current = Some(CurrentPlay {
                utterance_id,
                controls,
            });
        }
        let _ = self.event_tx.send(PlaybackEvent::Started { utterance_id });

        // Completion watcher: resolves this utterance to Done or Error.
        let inner = Arc::clone(&self.inner);
        let event_tx = self.event_tx.clone();
        tokio::spawn(async move {
            match finished.await {
                Ok(Ok(elapsed)) => {
                    let mut inner = inner.lock().await;
                    let still_current = inner
                        .current
                        .as_ref()
                        .is_some_and(|c| c.utterance_id == utterance_id);
                    if still_current {
                        inner.current = None;
                        inner.state = PlaybackState::Done;
                        inner.last_elapsed = elapsed;
                        let _ = event_tx.send(PlaybackEvent::Done {
                            utterance_id,
                            elapsed,
                        });
                    }
                }
                Ok(Err(err)) => {
                    let mut inner = inner.lock().await;
                    let still_current = inner
                        .current
                        .as_ref()
                        .is_some_and(|c| c.utterance_id == utterance_id);
                    if still_current {
                        inner.current = None;
                        inner.state = PlaybackState::Error;
                        let _ = event_tx.send(PlaybackEvent::Error {
                            utterance_id,
                            message: err.to_string(),
                        });
                    } else {
                        // A stop for this utterance was already reported;
                        // late render errors from the race are expected.
                        tracing::debug!(error = %err, "render error after stop, swallowing");
                    }
                }
                Err(_) => {
                    // Session torn down by stop/release; the stop path
                    // already reported the terminal event.
                }
            }
        });

        Ok(())
    }

    /// Wait for the full download, then hand the complete file to the
    /// render. Used when streaming is off or unsupported.
    async fn prepare_complete_file(
        &self,
        key: &CacheKey,
        cancel: &CancellationToken,
    ) -> SpeechResult<RenderSession> {
        let mut progress_rx = self.cache.observe_progress(key).await;
        let path = loop {
            let snapshot = progress_rx.borrow_and_update().clone();
            match snapshot {
                Some(progress) if progress.is_done => break progress.file_path,
                Some(_) => {}
                None => return Err(SpeechError::not_downloading(key.as_str())),
            }

            tokio::select! {
                () = cancel.cancelled() => return Err(SpeechError::Cancelled),
                changed = progress_rx.changed() => {
                    changed.map_err(|_| SpeechError::internal("cache index dropped"))?;
                }
            }
        };

        self.render
            .prepare_file(&path)
            .await
            .map_err(|e| map_render_error(&e))
    }

    /// Halt playback and report the last known elapsed progress — even
    /// when no media is configured, the stop is still reported.
    pub async fn stop(&self) {
        let mut inner = self.inner.lock().await;
        if let Some(mut current) = inner.current.take() {
            let elapsed = match current.controls.stop().await {
                Ok(elapsed) => elapsed,
                Err(err) => {
                    tracing::debug!(error = %err, "render stop failed, reporting last progress");
                    inner.last_elapsed
                }
            };
            inner.last_elapsed = elapsed;
            inner.state = PlaybackState::Stopped;
            let _ = self.event_tx.send(PlaybackEvent::Stopped {
                utterance_id: Some(current.utterance_id),
                elapsed,
            });
        } else {
            inner.state = PlaybackState::Stopped;
            let _ = self.event_tx.send(PlaybackEvent::Stopped {
                utterance_id: None,
                elapsed: inner.last_elapsed,
            });
        }
    }

    /// Ramp volume down over the fade window, then stop. Falls back to an
    /// immediate stop when the render cannot ramp.
    pub async fn fade_stop(&self) {
        let ramped = {
            let mut inner = self.inner.lock().await;
            let volume = inner.volume;
            match inner.current.as_mut() {
                Some(current) => current
                    .controls
                    .ramp_volume(volume, 0.0, self.config.fade_duration)
                    .is_ok(),
                None => false,
            }
        };

        if ramped {
            tokio::time::sleep(self.config.fade_duration).await;
        } else {
            tracing::debug!("fade-out ramp unavailable, stopping immediately");
        }
        self.stop().await;
    }

    /// Set the playback volume; applied immediately to an active render.
    pub async fn set_volume(&self, volume: SpeechVolume) {
        let mut inner = self.inner.lock().await;
        inner.volume = volume.level();
        if let Some(current) = inner.current.as_mut() {
            current.controls.set_volume(volume.level());
        }
    }

    /// Tear down the active render and cancel any in-flight `play`.
    pub async fn release(&self) {
        let token = {
            let mut guard = self.cancel.lock().await;
            std::mem::replace(&mut *guard, CancellationToken::new())
        };
        token.cancel();
        self.stop().await;
        self.inner.lock().await.state = PlaybackState::Idle;
    }
}

/// Render failures surface in the playback-state error class.
fn map_render_error(err: &RenderError) -> SpeechError {
    SpeechError::playback_state(err.to_string())
}
