//! Speech engine error taxonomy.
//!
//! These errors are designed to be serializable and not depend on external
//! error types like `std::io::Error`; I/O failures capture the kind and
//! message as strings. Conditions that change what audio can be played
//! (timeouts, transport failures) carry distinct variants because callers
//! choose different fallbacks for each.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ports::FetchError;

/// Error type for speech fetch, cache and playback operations.
#[derive(Clone, Debug, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum SpeechError {
    /// Network/HTTP failure while fetching synthesized audio.
    #[error("Transport error: {message}")]
    Transport {
        /// Detailed error message.
        message: String,
        /// HTTP status code if available.
        #[serde(skip_serializing_if = "Option::is_none")]
        status_code: Option<u16>,
    },

    /// No synthesis provider is configured; distinct from a provider that
    /// was reached and failed.
    #[error("No speech provider configured")]
    NoProvider,

    /// The bounded wait for first usable bytes expired.
    #[error("Timed out waiting for speech data")]
    Timeout,

    /// Preparation was requested for a file that is neither cached nor
    /// being downloaded.
    #[error("Speech file is not downloading: {cache_key}")]
    NotDownloading {
        /// The cache key that was asked for.
        cache_key: String,
    },

    /// The platform render was in the wrong state for the requested action.
    #[error("Playback state error: {message}")]
    PlaybackState {
        /// What the render reported.
        message: String,
    },

    /// The persisted cache index could not be read back.
    #[error("Cache index corrupt: {reason}")]
    CacheCorrupt {
        /// Why the index was rejected.
        reason: String,
    },

    /// The operation was cancelled by a `release()`.
    #[error("Speech operation cancelled")]
    Cancelled,

    /// I/O error during file operations.
    #[error("I/O error ({kind}): {message}")]
    Io {
        /// The kind of I/O error (e.g. "NotFound", "PermissionDenied").
        kind: String,
        /// Detailed error message.
        message: String,
    },

    /// Unexpected internal error.
    #[error("Internal error: {message}")]
    Internal {
        /// Error message.
        message: String,
    },
}

impl SpeechError {
    /// Create a transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            status_code: None,
        }
    }

    /// Create a not-downloading error for a cache key.
    pub fn not_downloading(cache_key: impl Into<String>) -> Self {
        Self::NotDownloading {
            cache_key: cache_key.into(),
        }
    }

    /// Create a playback-state error.
    pub fn playback_state(message: impl Into<String>) -> Self {
        Self::PlaybackState {
            message: message.into(),
        }
    }

    /// Create a cache-corrupt error.
    pub fn cache_corrupt(reason: impl Into<String>) -> Self {
        Self::CacheCorrupt {
            reason: reason.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Capture a `std::io::Error` as strings for serialization.
    #[must_use]
    pub fn from_io_error(err: &std::io::Error) -> Self {
        Self::Io {
            kind: format!("{:?}", err.kind()),
            message: err.to_string(),
        }
    }

    /// Whether a fresh attempt for the same announcement could succeed.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Transport { .. } | Self::Timeout | Self::Io { .. }
        )
    }
}

impl From<FetchError> for SpeechError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::NoProvider => Self::NoProvider,
            FetchError::Transport {
                message,
                status_code,
            } => Self::Transport {
                message,
                status_code,
            },
        }
    }
}

/// Convenience result type for speech operations.
pub type SpeechResult<T> = Result<T, SpeechError>;
