//! Announcement value types.
//!
//! An [`Announcement`] is one spoken message: its text (plain or SSML), the
//! voice it should be rendered with, and a process-unique utterance id. The
//! [`CacheKey`] derived from text + voice is deterministic, so the same
//! message spoken by the same voice always maps to the same cached file.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

// ── Announcement text ─────────────────────────────────────────────────────────

/// The spoken body of an announcement.
///
/// SSML and plain text with identical bodies produce different cache keys —
/// the synthesis provider renders them differently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind", content = "body")]
pub enum AnnouncementText {
    /// Plain UTF-8 text.
    Plain(String),
    /// Speech Synthesis Markup Language document.
    Ssml(String),
}

impl AnnouncementText {
    /// The raw text body, regardless of kind.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Plain(body) | Self::Ssml(body) => body,
        }
    }

    /// Whether this is an SSML document.
    #[must_use]
    pub const fn is_ssml(&self) -> bool {
        matches!(self, Self::Ssml(_))
    }

    /// Stable one-byte discriminant used in cache-key derivation.
    const fn kind_tag(&self) -> u8 {
        match self {
            Self::Plain(_) => b'p',
            Self::Ssml(_) => b's',
        }
    }
}

// ── Voice identity ────────────────────────────────────────────────────────────

/// Identifies a synthesis voice: IETF language tag plus a provider voice name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceIdentity {
    /// Language tag, e.g. `"en-US"`.
    pub language: String,
    /// Provider-specific voice name, e.g. `"joanna"`.
    pub name: String,
}

impl VoiceIdentity {
    /// Create a voice identity.
    pub fn new(language: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for VoiceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.language, self.name)
    }
}

// ── Cache key ─────────────────────────────────────────────────────────────────

/// Deterministic identifier for a (text, voice) pair.
///
/// Rendered as lowercase hex of a SHA-256 digest; safe to use directly as a
/// file stem.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    /// Derive the key for an announcement's text + voice.
    #[must_use]
    pub fn derive(text: &AnnouncementText, voice: &VoiceIdentity) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(voice.language.as_bytes());
        hasher.update([0]);
        hasher.update(voice.name.as_bytes());
        hasher.update([0, text.kind_tag()]);
        hasher.update(text.as_str().as_bytes());

        let digest = hasher.finalize();
        let mut hex = String::with_capacity(digest.len() * 2);
        for b in digest {
            use std::fmt::Write;
            write!(&mut hex, "{b:02x}").expect("writing to a String cannot fail");
        }
        Self(hex)
    }

    /// The hex string form of the key.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ── Announcement ──────────────────────────────────────────────────────────────

/// One spoken message, ready to be queued, fetched and played.
///
/// The utterance id is unique per construction, so two announcements with
/// identical text are still distinct queue entries. The cache key is shared —
/// that is what enables cache reuse across repeated instructions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Announcement {
    utterance_id: Uuid,
    text: AnnouncementText,
    voice: VoiceIdentity,
}

impl Announcement {
    /// Create an announcement with a fresh utterance id.
    #[must_use]
    pub fn new(text: AnnouncementText, voice: VoiceIdentity) -> Self {
        Self {
            utterance_id: Uuid::new_v4(),
            text,
            voice,
        }
    }

    /// Convenience constructor for plain text.
    #[must_use]
    pub fn plain(text: impl Into<String>, voice: VoiceIdentity) -> Self {
        Self::new(AnnouncementText::Plain(text.into()), voice)
    }

    /// Process-unique id for this utterance.
    #[must_use]
    pub const fn utterance_id(&self) -> Uuid {
        self.utterance_id
    }

    /// The spoken body.
    #[must_use]
    pub const fn text(&self) -> &AnnouncementText {
        &self.text
    }

    /// The synthesis voice.
    #[must_use]
    pub const fn voice(&self) -> &VoiceIdentity {
        &self.voice
    }

    /// Deterministic cache key for this announcement's text + voice.
    #[must_use]
    pub fn cache_key(&self) -> CacheKey {
        CacheKey::derive(&self.text, &self.voice)
    }
}

// ── Speech volume ─────────────────────────────────────────────────────────────

/// Playback volume level, validated to `[0.0, 1.0]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpeechVolume(f32);

impl SpeechVolume {
    /// Full volume.
    pub const MAX: Self = Self(1.0);
    /// Muted.
    pub const MUTE: Self = Self(0.0);

    /// Create a volume level; returns `None` for values outside `[0.0, 1.0]`.
    #[must_use]
    pub fn try_new(level: f32) -> Option<Self> {
        (0.0..=1.0).contains(&level).then_some(Self(level))
    }

    /// The raw level.
    #[must_use]
    pub const fn level(self) -> f32 {
        self.0
    }
}
