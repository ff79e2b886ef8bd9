//! Directory scanning and the staleness-check contract the engine relies on.

pub mod fs_scanner;
pub mod stale;

pub use fs_scanner::FsScanner;
pub use stale::{StaleEntries, find_stale_entries};

use crate::error::Result;
use crate::model::{Folder, Panel, User};
use async_trait::async_trait;

/// Staleness check and upsert for one directory.
#[async_trait]
pub trait DirectoryReconciler: Send + Sync {
    /// Compares the cached listing of `dir` with the filesystem, writes what
    /// changed to storage and reports whether the caller must reload.
    ///
    /// Folder-listing views pass `cached_folders`, reading views pass
    /// `cached_panels`. Passing neither indexes `dir` from scratch.
    async fn reconcile_directory(
        &self,
        dir: &str,
        parent_path: Option<&str>,
        user: &User,
        cached_folders: Option<Vec<Folder>>,
        cached_panels: Option<Vec<Panel>>,
    ) -> Result<bool>;
}
