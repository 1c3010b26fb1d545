//! Cache file layout: per key, a media file and a sibling progress record.

use std::path::{Path, PathBuf};

use guidevox_core::announcement::CacheKey;

/// Extension of cached media files.
pub const MEDIA_EXT: &str = "mp3";

/// Extension of persisted progress records.
pub const RECORD_EXT: &str = "json";

/// Path of the media file for a cache key.
#[must_use]
pub fn media_path(cache_dir: &Path, key: &CacheKey) -> PathBuf {
    cache_dir.join(format!("{key}.{MEDIA_EXT}"))
}

/// Path of the progress record for a cache key.
#[must_use]
pub fn record_path(cache_dir: &Path, key: &CacheKey) -> PathBuf {
    cache_dir.join(format!("{key}.{RECORD_EXT}"))
}
