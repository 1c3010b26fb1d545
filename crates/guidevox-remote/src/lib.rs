//! HTTP speech fetcher adapter.
//!
//! Implements the fetcher port against a remote synthesis endpoint:
//! builds the speak URL, streams the response body chunk by chunk, and
//! maps failures into the port's error taxonomy. An unconfigured endpoint
//! is reported as [`FetchError::NoProvider`] so callers can tell "no
//! provider" apart from "provider failed".

use async_trait::async_trait;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};

use guidevox_core::announcement::{AnnouncementText, VoiceIdentity};
use guidevox_core::ports::{FetchError, SpeechFetcherPort, SpeechStream};

/// Remote synthesis endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechEndpoint {
    /// Base URL of the synthesis service, e.g. `https://speech.example.com`.
    pub base_url: String,
    /// Bearer token, if the service requires one.
    pub api_key: Option<String>,
}

/// `reqwest`-backed implementation of the speech fetcher port.
pub struct HttpSpeechFetcher {
    client: reqwest::Client,
    endpoint: Option<SpeechEndpoint>,
}

impl HttpSpeechFetcher {
    /// Fetcher over an endpoint; `None` yields [`FetchError::NoProvider`]
    /// on every request.
    #[must_use]
    pub fn new(endpoint: Option<SpeechEndpoint>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
        }
    }

    /// Build the speak URL for an announcement.
    fn synthesis_url(
        endpoint: &SpeechEndpoint,
        text: &AnnouncementText,
        voice: &VoiceIdentity,
    ) -> String {
        let kind = if text.is_ssml() { "ssml" } else { "text" };
        format!(
            "{}/v1/speak?language={}&voice={}&kind={}&text={}",
            endpoint.base_url.trim_end_matches('/'),
            urlencoding::encode(&voice.language),
            urlencoding::encode(&voice.name),
            kind,
            urlencoding::encode(text.as_str()),
        )
    }
}

#[async_trait]
impl SpeechFetcherPort for HttpSpeechFetcher {
    async fn request_audio(
        &self,
        text: &AnnouncementText,
        voice: &VoiceIdentity,
    ) -> Result<SpeechStream, FetchError> {
        let Some(endpoint) = &self.endpoint else {
            return Err(FetchError::NoProvider);
        };

        let url = Self::synthesis_url(endpoint, text, voice);
        let mut request = self.client.get(&url);
        if let Some(api_key) = &endpoint.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| FetchError::transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), voice = %voice, "synthesis request failed");
            let message = if status.as_u16() == 404 {
                format!("no audio for this voice/text: {status}")
            } else {
                format!("synthesis request failed: {status}")
            };
            return Err(FetchError::transport_with_status(message, status.as_u16()));
        }

        let stream = response
            .bytes_stream()
            .map(|item| item.map_err(|e| FetchError::transport(e.to_string())));
        Ok(Box::pin(stream))
    }
}
