//! Speech file cache for guidevox.
//!
//! Content-addressed on-disk store for synthesized announcement audio:
//! per-key progress records that survive restarts, at-most-one concurrent
//! download per cache key, byte-rate throttling for deterministic
//! streaming tests, size-bounded LRU-by-mtime eviction, and crash recovery
//! that discards incomplete downloads.

pub mod paths;
pub mod store;
mod throttle;
mod transfer;

pub use store::SpeechFileCache;
pub use throttle::BitrateThrottle;

// Silence unused dev-dependency warnings (used by integration tests)
#[cfg(test)]
use tokio_test as _;
#[cfg(test)]
use tracing_subscriber as _;
