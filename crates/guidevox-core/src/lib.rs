//! Core domain types and port definitions for guidevox, the voice-guidance
//! playback engine: the clip model, the priority track mixer, download
//! progress records, configuration, and the port traits for the synthesis
//! fetcher, reachability signal, and platform audio render.

pub mod announcement;
pub mod clip;
pub mod config;
pub mod errors;
pub mod mixer;
pub mod paths;
pub mod ports;
pub mod progress;

// Re-export commonly used types for convenience
pub use announcement::{
    Announcement, AnnouncementText, CacheKey, SpeechVolume, VoiceIdentity,
};
pub use clip::{Clip, NOTIFICATION_TRACK, PRIORITY_TRACK, REGULAR_TRACK, SoundId};
pub use config::{
    CacheConfig, ConfigError, DEFAULT_CACHE_BUDGET_BYTES, DEFAULT_FADE_DURATION,
    DEFAULT_MIN_START_BYTES, DEFAULT_PREPARE_TIMEOUT, PlayerConfig, PrefetchConfig,
};
pub use errors::{SpeechError, SpeechResult};
pub use mixer::TrackMixer;
pub use ports::{
    AlwaysReachable, AudioRenderPort, FetchError, ReachabilityPort, RenderControls,
    RenderError, RenderSession, SpeechFetcherPort, SpeechSource, SpeechStream,
};
pub use progress::SpeechFileProgress;

// Silence unused dev-dependency warnings until we add runtime-driven tests here
#[cfg(test)]
use tokio_test as _;
