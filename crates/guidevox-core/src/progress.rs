//! Persisted download-progress record for one cached speech file.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::announcement::CacheKey;

/// Download state of one cached speech file.
///
/// Exists from the first byte written until the entry is deleted, and is
/// persisted next to the media file so interrupted downloads can be detected
/// after a crash. `bytes_read` is monotonically non-decreasing until
/// `is_done`; a done record never changes again except by deletion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechFileProgress {
    /// Cache key of the announcement this file belongs to.
    pub cache_key: CacheKey,
    /// The announcement text (kept for diagnostics and cache inspection).
    pub text: String,
    /// Absolute path of the media file.
    pub file_path: PathBuf,
    /// Bytes written and flushed to disk so far.
    pub bytes_read: u64,
    /// Whether the download completed.
    pub is_done: bool,
}

impl SpeechFileProgress {
    /// Fresh zero-byte record for a download that is about to start.
    #[must_use]
    pub const fn started(cache_key: CacheKey, text: String, file_path: PathBuf) -> Self {
        Self {
            cache_key,
            text,
            file_path,
            bytes_read: 0,
            is_done: false,
        }
    }
}
