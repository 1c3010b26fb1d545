//! Engine configuration types and validation.
//!
//! Pure domain types with no infrastructure dependencies. Durations are
//! plain `std::time::Duration`s so tests can shrink them freely.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default on-disk budget for completed speech files.
pub const DEFAULT_CACHE_BUDGET_BYTES: u64 = 50 * 1024 * 1024;

/// Minimum bytes that must exist before playback may start. Four bytes are
/// enough to prove the media file was created and is being written.
pub const DEFAULT_MIN_START_BYTES: u64 = 4;

/// Hard ceiling on `prepare`'s wait for first usable bytes.
pub const DEFAULT_PREPARE_TIMEOUT: Duration = Duration::from_secs(10);

/// Length of the fade-in / fade-out volume ramp.
pub const DEFAULT_FADE_DURATION: Duration = Duration::from_millis(1500);

/// Sleep between polls while a streaming read waits for more bytes.
pub const DEFAULT_SOURCE_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// How far ahead (in travel time) announcements are pre-downloaded.
pub const DEFAULT_OBSERVABLE_WINDOW: Duration = Duration::from_secs(180);

/// Fraction of the observable window that must elapse before a progress
/// tick triggers another prefetch pass.
pub const DEFAULT_RETRIGGER_FRACTION: f64 = 0.5;

/// Configuration error with the offending field named.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("Invalid config: {field}: {reason}")]
pub struct ConfigError {
    /// Which field failed validation.
    pub field: &'static str,
    /// Why it was rejected.
    pub reason: String,
}

impl ConfigError {
    fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

// ── Cache ─────────────────────────────────────────────────────────────────────

/// Speech file cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CacheConfig {
    /// Directory holding media files and their progress records.
    pub cache_dir: PathBuf,

    /// Byte budget for completed files; eviction trims back under this.
    pub max_cache_bytes: u64,

    /// Transfer throttle in bits per second; `None` = unbounded. Exists to
    /// make streaming-while-downloading deterministic in tests and to
    /// simulate slow networks.
    pub max_bitrate: Option<u64>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_dir: crate::paths::default_cache_dir().unwrap_or_else(|_| {
                std::env::temp_dir().join("guidevox").join("speech-cache")
            }),
            max_cache_bytes: DEFAULT_CACHE_BUDGET_BYTES,
            max_bitrate: None,
        }
    }
}

impl CacheConfig {
    /// Cache config rooted at a specific directory, other fields default.
    #[must_use]
    pub fn in_dir(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            ..Self::default()
        }
    }

    /// Validate field ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_cache_bytes == 0 {
            return Err(ConfigError::new("max_cache_bytes", "must be non-zero"));
        }
        if self.max_bitrate == Some(0) {
            return Err(ConfigError::new(
                "max_bitrate",
                "must be non-zero when set; use None for unbounded",
            ));
        }
        Ok(())
    }
}

// ── Player ────────────────────────────────────────────────────────────────────

/// Fetch-coordination and playback configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PlayerConfig {
    /// Bytes that must exist before playback/preparation resolves.
    pub min_start_bytes: u64,

    /// Bounded wait for first usable bytes in `prepare` and `play`.
    pub prepare_timeout: Duration,

    /// Volume ramp window for `fade_play` / `fade_stop`.
    pub fade_duration: Duration,

    /// Whether playback may start from a partially-downloaded file when the
    /// render supports it. When off, playback waits for the full download.
    pub streaming: bool,

    /// Poll interval of the partial-read wait loop.
    pub source_poll_interval: Duration,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            min_start_bytes: DEFAULT_MIN_START_BYTES,
            prepare_timeout: DEFAULT_PREPARE_TIMEOUT,
            fade_duration: DEFAULT_FADE_DURATION,
            streaming: true,
            source_poll_interval: DEFAULT_SOURCE_POLL_INTERVAL,
        }
    }
}

impl PlayerConfig {
    /// Validate field ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_start_bytes == 0 {
            return Err(ConfigError::new("min_start_bytes", "must be non-zero"));
        }
        if self.prepare_timeout.is_zero() {
            return Err(ConfigError::new("prepare_timeout", "must be non-zero"));
        }
        if self.source_poll_interval.is_zero() {
            return Err(ConfigError::new(
                "source_poll_interval",
                "must be non-zero",
            ));
        }
        Ok(())
    }
}

// ── Prefetch ──────────────────────────────────────────────────────────────────

/// Prefetch-scheduling configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PrefetchConfig {
    /// How far ahead (in travel time) to pre-download announcements.
    pub observable_window: Duration,

    /// Fraction of the window that must elapse before a progress tick
    /// re-plans; route changes always re-plan immediately.
    pub retrigger_fraction: f64,
}

impl Default for PrefetchConfig {
    fn default() -> Self {
        Self {
            observable_window: DEFAULT_OBSERVABLE_WINDOW,
            retrigger_fraction: DEFAULT_RETRIGGER_FRACTION,
        }
    }
}

impl PrefetchConfig {
    /// Validate field ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.observable_window.is_zero() {
            return Err(ConfigError::new("observable_window", "must be non-zero"));
        }
        if !(self.retrigger_fraction > 0.0 && self.retrigger_fraction <= 1.0) {
            return Err(ConfigError::new(
                "retrigger_fraction",
                "must be in (0, 1]",
            ));
        }
        Ok(())
    }

    /// The delay a progress tick must respect before re-planning.
    #[must_use]
    pub fn retrigger_after(&self) -> Duration {
        self.observable_window.mul_f64(self.retrigger_fraction)
    }
}
