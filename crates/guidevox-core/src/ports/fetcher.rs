//! Speech fetcher port — the remote text-to-speech provider.

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures_core::Stream;
use thiserror::Error;

use crate::announcement::{AnnouncementText, VoiceIdentity};

/// Chunked synthesized-audio byte stream.
///
/// Chunks arrive in network order; a stream item error aborts the transfer.
pub type SpeechStream = Pin<Box<dyn Stream<Item = Result<Bytes, FetchError>> + Send>>;

/// Errors returned by [`SpeechFetcherPort`].
///
/// "No provider configured" is deliberately distinct from a provider that
/// was reached and failed — callers fall back differently for each.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// No synthesis provider is configured.
    #[error("No speech provider configured")]
    NoProvider,

    /// The provider was reached but the request failed.
    #[error("Speech fetch failed: {message}")]
    Transport {
        /// Detailed error message.
        message: String,
        /// HTTP status code if available.
        status_code: Option<u16>,
    },
}

impl FetchError {
    /// Create a transport error without a status code.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            status_code: None,
        }
    }

    /// Create a transport error with an HTTP status code.
    pub fn transport_with_status(message: impl Into<String>, status_code: u16) -> Self {
        Self::Transport {
            message: message.into(),
            status_code: Some(status_code),
        }
    }
}

/// Port trait for fetching synthesized announcement audio.
///
/// Implementations stream encoded audio bytes for the given text and voice;
/// the engine never interprets the bytes, it only stores and replays them.
#[async_trait]
pub trait SpeechFetcherPort: Send + Sync {
    /// Request synthesized audio for an announcement.
    async fn request_audio(
        &self,
        text: &AnnouncementText,
        voice: &VoiceIdentity,
    ) -> Result<SpeechStream, FetchError>;
}
