//! Library directory watching.
//!
//! A debounced poll watcher evicts the cached panel listings of directories
//! that changed on disk, so the next entry into them reads the store and
//! runs a real staleness check.

use crate::config::{WATCH_DEBOUNCE, WATCH_POLL_INTERVAL};
use crate::error::{EngineError, Result};
use crate::file_utils::{PathExt, is_supported_image};
use crate::listing_cache::ListingCache;
use log::{debug, warn};
use notify_debouncer_mini::notify::{PollWatcher, RecursiveMode};
use notify_debouncer_mini::{Config, DebounceEventResult, Debouncer, new_debouncer_opt};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Keeps watching for as long as it is alive.
pub type WatchDebouncer = Debouncer<PollWatcher>;

pub struct DirectoryWatcher {
    cache: Arc<Mutex<ListingCache>>,
}

impl DirectoryWatcher {
    pub fn new(cache: Arc<Mutex<ListingCache>>) -> Self {
        Self { cache }
    }

    /// Starts watching `root` recursively.
    pub fn start_watching(&self, root: &Path) -> Result<WatchDebouncer> {
        let cache = self.cache.clone();

        let notify_config =
            notify_debouncer_mini::notify::Config::default().with_poll_interval(WATCH_POLL_INTERVAL);
        let debouncer_config = Config::default()
            .with_timeout(WATCH_DEBOUNCE)
            .with_notify_config(notify_config);

        let mut debouncer = new_debouncer_opt::<_, PollWatcher>(
            debouncer_config,
            move |res: DebounceEventResult| match res {
                Ok(events) => {
                    let evicted = invalidate_paths(&cache, events.into_iter().map(|e| e.path));
                    if evicted > 0 {
                        debug!("Watcher evicted {} cached listings", evicted);
                    }
                }
                Err(error) => {
                    let error_msg = error.to_string();
                    if !error_msg.contains(".tmp") {
                        warn!("File watcher error: {}", error);
                    }
                }
            },
        )?;

        debouncer
            .watcher()
            .watch(root, RecursiveMode::Recursive)
            .map_err(|e| {
                EngineError::Io(format!("failed to watch {}: {}", root.format_for_log(), e))
            })?;

        debug!("Watching {}", root.display());
        Ok(debouncer)
    }
}

/// Folder listings affected by changes at `paths`: the parent of a changed
/// image, and a changed directory together with its parent.
fn affected_folders(paths: impl IntoIterator<Item = PathBuf>) -> BTreeSet<String> {
    let mut folders = BTreeSet::new();

    for path in paths {
        let is_image = is_supported_image(&path);
        if !is_image {
            folders.insert(path.to_string_lossy().to_string());
        }
        if let Some(parent) = path.parent() {
            folders.insert(parent.to_string_lossy().to_string());
        }
    }

    folders
}

/// Evicts every cached listing affected by `paths`; returns how many were
/// evicted.
pub fn invalidate_paths(
    cache: &Mutex<ListingCache>,
    paths: impl IntoIterator<Item = PathBuf>,
) -> usize {
    let folders = affected_folders(paths);

    let Ok(mut cache) = cache.lock() else {
        warn!("Listing cache lock poisoned; skipping invalidation");
        return 0;
    };

    folders
        .iter()
        .filter(|folder| cache.invalidate(folder))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Panel;

    fn cache_with(folders: &[&str]) -> Mutex<ListingCache> {
        let mut cache = ListingCache::new(8);
        for folder in folders {
            let panel = Panel::new(
                "1",
                *folder,
                format!("{folder}/p0.png"),
                ("d".to_string(), "t".to_string()),
            )
            .unwrap();
            cache.put(folder.to_string(), vec![panel]);
        }
        Mutex::new(cache)
    }

    #[test]
    fn test_changed_image_evicts_its_folder() {
        let cache = cache_with(&["/lib/vol1", "/lib/vol2"]);

        let evicted = invalidate_paths(&cache, vec![PathBuf::from("/lib/vol1/p9.png")]);

        assert_eq!(evicted, 1);
        let cache = cache.lock().unwrap();
        assert!(!cache.contains("/lib/vol1"));
        assert!(cache.contains("/lib/vol2"));
    }

    #[test]
    fn test_changed_directory_evicts_itself_and_parent() {
        let cache = cache_with(&["/lib", "/lib/vol1", "/lib/vol2"]);

        let evicted = invalidate_paths(&cache, vec![PathBuf::from("/lib/vol1")]);

        assert_eq!(evicted, 2);
        assert!(cache.lock().unwrap().contains("/lib/vol2"));
    }

    #[test]
    fn test_start_watching_library_root() {
        let dir = tempfile::tempdir().unwrap();
        let watcher = DirectoryWatcher::new(Arc::new(cache_with(&[])));
        let debouncer = watcher.start_watching(dir.path());
        assert!(debouncer.is_ok());
    }
}
