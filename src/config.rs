//! Engine configuration constants and tunables.

use std::time::Duration;

/// Supported image file extensions for scanning directories.
pub const SUPPORTED_IMAGE_EXTENSIONS: [&str; 14] = [
    "jpg", "jpeg", "png", "gif", "bmp", "tiff", "webp", "svg", "heif", "raw", "ico", "apng",
    "jfif", "exi",
];

/// Number of folder panel listings kept in memory.
pub const DEFAULT_LISTING_CACHE_CAPACITY: usize = 32;

/// Upper bound for the outermost-parent walk.
pub const MAX_PARENT_DEPTH: usize = 32;

/// Upper bound for recursive directory indexing.
pub const MAX_SCAN_DEPTH: usize = 16;

/// Poll interval of the directory watcher backend.
pub const WATCH_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Debounce window for directory watcher events.
pub const WATCH_DEBOUNCE: Duration = Duration::from_millis(500);

/// Environment variable overriding the catalog file location.
pub const CATALOG_PATH_ENV: &str = "MANGA_SHELF_DB";

/// Default catalog file name, relative to the working directory.
pub const DEFAULT_CATALOG_FILE: &str = "manga-shelf.json";

/// Runtime configuration for [`crate::services::ReaderEngine`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub listing_cache_capacity: usize,
    pub max_parent_depth: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            listing_cache_capacity: DEFAULT_LISTING_CACHE_CAPACITY,
            max_parent_depth: MAX_PARENT_DEPTH,
        }
    }
}
