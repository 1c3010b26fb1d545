//! Fetch coordination and streaming playback for guidevox.
//!
//! Sits between the speech file cache and the platform render port:
//! [`RemoteSpeechLoader`] warms and prepares cached speech files,
//! [`StreamingSpeechPlayer`] renders them (streaming from partial files
//! where supported) with fade ramps and clean cancellation, and
//! [`SpeechService`] bundles both behind the end-to-end surface.

pub mod loader;
pub mod playback;
pub mod prefetch;
pub mod service;
mod wait;

pub use loader::RemoteSpeechLoader;
pub use playback::{CachedFileSource, PlaybackEvent, PlaybackState, StreamingSpeechPlayer};
pub use prefetch::{NextAnnouncementsProvider, PrefetchScheduler, UpcomingSegment};
pub use service::SpeechService;

// Silence unused dev-dependency warnings (used by integration tests)
#[cfg(test)]
use tokio_test as _;
#[cfg(test)]
use tracing_subscriber as _;
