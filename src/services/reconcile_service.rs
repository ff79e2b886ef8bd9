//! Once-per-entry staleness check of a cached listing.
//!
//! A folder's cached listing is checked against the filesystem before it is
//! shown. The check is best effort: when it fails, the cached listing is
//! used as is.

use crate::error::EngineError;
use crate::model::{Folder, Panel, User};
use crate::scanner::DirectoryReconciler;
use crate::state::HydrationFlag;
use crate::store::LibraryStore;
use log::{debug, warn};

/// The listing a view is about to show.
#[derive(Debug, Clone, PartialEq)]
pub enum CachedListing {
    /// Child folders, from a folder-listing view.
    Folders(Vec<Folder>),
    /// Panels, from a reading view.
    Panels(Vec<Panel>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileOutcome {
    /// The scanner compared the listing with the filesystem.
    Checked,
    /// Already attempted for this folder entry.
    Skipped,
    /// The scanner call failed; cached data stays in use.
    Failed(EngineError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct StalenessVerdict {
    pub needs_refresh: bool,
    pub outcome: ReconcileOutcome,
    /// Listing reloaded from the store after a refresh.
    pub refreshed: Option<CachedListing>,
}

impl StalenessVerdict {
    fn unchanged(outcome: ReconcileOutcome) -> Self {
        Self {
            needs_refresh: false,
            outcome,
            refreshed: None,
        }
    }

    /// Refreshed panels, or `cached` when nothing was reloaded.
    pub fn panels_or(self, cached: Vec<Panel>) -> Vec<Panel> {
        match self.refreshed {
            Some(CachedListing::Panels(panels)) => panels,
            _ => cached,
        }
    }

    /// Refreshed child folders, or `cached` when nothing was reloaded.
    pub fn folders_or(self, cached: Vec<Folder>) -> Vec<Folder> {
        match self.refreshed {
            Some(CachedListing::Folders(folders)) => folders,
            _ => cached,
        }
    }
}

pub struct StaleDirectoryReconciler<S, R> {
    store: S,
    scanner: R,
}

impl<S: LibraryStore, R: DirectoryReconciler> StaleDirectoryReconciler<S, R> {
    pub fn new(store: S, scanner: R) -> Self {
        Self { store, scanner }
    }

    pub fn scanner(&self) -> &R {
        &self.scanner
    }

    /// Checks `folder_path` against the filesystem unless `hydration` says
    /// this entry was already checked. On refresh the listing is reloaded
    /// from the store.
    pub async fn reconcile(
        &self,
        hydration: &mut HydrationFlag,
        folder_path: &str,
        parent_path: Option<&str>,
        user: &User,
        cached: &CachedListing,
    ) -> StalenessVerdict {
        if !hydration.begin() {
            debug!("{} already reconciled for this entry", folder_path);
            return StalenessVerdict::unchanged(ReconcileOutcome::Skipped);
        }

        let (cached_folders, cached_panels) = match cached {
            CachedListing::Folders(folders) => (Some(folders.clone()), None),
            CachedListing::Panels(panels) => (None, Some(panels.clone())),
        };

        let needs_refresh = match self
            .scanner
            .reconcile_directory(folder_path, parent_path, user, cached_folders, cached_panels)
            .await
        {
            Ok(needs_refresh) => needs_refresh,
            Err(e) => {
                warn!(
                    "Staleness check of {} failed, using cached listing: {}",
                    folder_path, e
                );
                return StalenessVerdict::unchanged(ReconcileOutcome::Failed(e));
            }
        };

        if !needs_refresh {
            return StalenessVerdict::unchanged(ReconcileOutcome::Checked);
        }

        debug!("{} was stale, reloading listing", folder_path);
        let refreshed = match cached {
            CachedListing::Folders(_) => self
                .store
                .get_child_folders(folder_path)
                .await
                .map(CachedListing::Folders),
            CachedListing::Panels(_) => self
                .store
                .get_panels(folder_path)
                .await
                .map(CachedListing::Panels),
        };

        let refreshed = match refreshed {
            Ok(listing) => Some(listing),
            Err(e) => {
                warn!("Reloading {} after refresh failed: {}", folder_path, e);
                None
            }
        };

        StalenessVerdict {
            needs_refresh,
            outcome: ReconcileOutcome::Checked,
            refreshed,
        }
    }
}
