//! Shared fakes for player integration tests: channel-fed fetchers and a
//! scripted render port. No audio hardware or network involved.

// Not every test binary uses every fake.
#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};

use guidevox_core::announcement::{AnnouncementText, VoiceIdentity};
use guidevox_core::ports::{
    AudioRenderPort, FetchError, RenderControls, RenderError, RenderSession, SpeechFetcherPort,
    SpeechSource, SpeechStream,
};

// ── Fetchers ───────────────────────────────────────────────────────

/// Returns one scripted chunk sequence per call, instantly.
pub struct ScriptedFetcher {
    scripts: std::sync::Mutex<Vec<Vec<Result<Bytes, FetchError>>>>,
    calls: AtomicUsize,
}

impl ScriptedFetcher {
    pub fn single(chunks: &[&[u8]]) -> Arc<Self> {
        Arc::new(Self {
            scripts: std::sync::Mutex::new(vec![
                chunks.iter().map(|c| Ok(Bytes::copy_from_slice(c))).collect(),
            ]),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SpeechFetcherPort for ScriptedFetcher {
    async fn request_audio(
        &self,
        _text: &AnnouncementText,
        _voice: &VoiceIdentity,
    ) -> Result<SpeechStream, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut scripts = self.scripts.lock().expect("scripts lock");
        if scripts.is_empty() {
            return Err(FetchError::transport("no script left"));
        }
        Ok(Box::pin(futures_util::stream::iter(scripts.remove(0))))
    }
}

/// Hands out a channel-fed stream; the test feeds bytes when it wants.
pub struct LiveFetcher {
    feed: std::sync::Mutex<Option<mpsc::UnboundedReceiver<Result<Bytes, FetchError>>>>,
    calls: AtomicUsize,
}

impl LiveFetcher {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedSender<Result<Bytes, FetchError>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Arc::new(Self {
                feed: std::sync::Mutex::new(Some(rx)),
                calls: AtomicUsize::new(0),
            }),
            tx,
        )
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SpeechFetcherPort for LiveFetcher {
    async fn request_audio(
        &self,
        _text: &AnnouncementText,
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

// ── Fake render ────────────────────────────────────────────────────

/// What one fake session saw, plus the handle the test uses to end it.
pub struct SessionDriver {
    /// Completes the session as the platform render would.
    pub finish: oneshot::Sender<Result<Duration, RenderError>>,
    /// Call log of the session's controls.
    pub log: Arc<std::sync::Mutex<Vec<String>>>,
    /// The streaming source, when the session was prepared from one.
    pub source: Option<Box<dyn SpeechSource>>,
}

struct FakeControls {
    log: Arc<std::sync::Mutex<Vec<String>>>,
    ramp_works: bool,
    elapsed: Duration,
}

#[async_trait]
impl RenderControls for FakeControls {
    async fn start(&mut self) -> Result<(), RenderError> {
        self.log.lock().expect("log lock").push("start".into());
        Ok(())
    }

    async fn stop(&mut self) -> Result<Duration, RenderError> {
        self.log.lock().expect("log lock").push("stop".into());
        Ok(self.elapsed)
    }

    fn set_volume(&mut self, level: f32) {
        self.log
            .lock()
            .expect("log lock")
            .push(format!("volume {level:.2}"));
    }

    fn ramp_volume(
        &mut self,
        from: f32,
        to: f32,
        _over: Duration,
    ) -> Result<(), RenderError> {
        if self.ramp_works {
            self.log
                .lock()
                .expect("log lock")
                .push(format!("ramp {from:.2}->{to:.2}"));
            Ok(())
        } else {
            Err(RenderError::Unsupported)
        }
    }

    fn elapsed(&self) -> Duration {
        self.elapsed
    }
}

/// Scripted render port: every prepared session is parked in `sessions`
/// for the test to complete or inspect.
pub struct FakeRender {
    pub streaming: bool,
    pub ramp_works: bool,
    pub elapsed: Duration,
    sessions: std::sync::Mutex<Vec<SessionDriver>>,
}

impl FakeRender {
    pub fn new(streaming: bool, ramp_works: bool) -> Arc<Self> {
        Arc::new(Self {
            streaming,
            ramp_works,
            elapsed: Duration::from_millis(250),
            sessions: std::sync::Mutex::new(Vec::new()),
        })
    }

    fn make_session(&self, source: Option<Box<dyn SpeechSource>>) -> RenderSession {
        let log = Arc::new(std::sync::Mutex::new(Vec::new()));
        let (finish_tx, finish_rx) = oneshot::channel();
        self.sessions.lock().expect("sessions lock").push(SessionDriver {
            finish: finish_tx,
            log: Arc::clone(&log),
            source,
        });
        RenderSession {
            controls: Box::new(FakeControls {
                log,
                ramp_works: self.ramp_works,
                elapsed: self.elapsed,
            }),
            finished: finish_rx,
        }
    }

    /// Take the most recently prepared session's driver.
    pub fn take_session(&self) -> SessionDriver {
        self.sessions
            .lock()
            .expect("sessions lock")
            .pop()
            .expect("a session was prepared")
    }

    pub fn session_count(&self) -> usize {
        self.sessions.lock().expect("sessions lock").len()
    }
}

#[async_trait]
impl AudioRenderPort for FakeRender {
    fn supports_streaming(&self) -> bool {
        self.streaming
    }

    async fn prepare_file(&self, _path: &std::path::Path) -> Result<RenderSession, RenderError> {
        Ok(self.make_session(None))
    }

    async fn prepare_source(
        &self,
        source: Box<dyn SpeechSource>,
    ) -> Result<RenderSession, RenderError> {
        if !self.streaming {
            return Err(RenderError::Unsupported);
        }
        Ok(self.make_session(Some(source)))
    }
}
