//! Filesystem-backed [`DirectoryReconciler`].
//!
//! Blocking directory walks run on `spawn_blocking`; per-entry work (panel
//! metadata, child folders) fans out over rayon.

use crate::config::MAX_SCAN_DEPTH;
use crate::error::{EngineError, Result};
use crate::file_utils::{DirListing, PathExt, list_directory, path_exists};
use crate::model::{Folder, FolderContains, FolderMetadata, Panel, User, date_time_now};
use crate::scanner::DirectoryReconciler;
use crate::scanner::stale::{StaleEntries, find_stale_entries};
use crate::sort;
use crate::store::LibraryStore;
use async_std::task;
use async_trait::async_trait;
use log::{debug, info, warn};
use rayon::prelude::*;
use std::collections::HashSet;
use std::path::Path;
use std::time::Instant;

/// A folder, its indexed descendants and all of their panels.
type FolderGroup = (Folder, Vec<Folder>, Vec<Panel>);

/// Indexes directories into a [`LibraryStore`].
#[derive(Clone, Debug)]
pub struct FsScanner<S> {
    store: S,
    max_depth: usize,
}

impl<S: LibraryStore + Clone + 'static> FsScanner<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            max_depth: MAX_SCAN_DEPTH,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Indexes a library root and everything below it. Reading state of
    /// folders that were already indexed is kept.
    pub async fn index_root(&self, dir: &str, user: &User) -> Result<Folder> {
        self.index_full(dir, None, user).await
    }

    async fn index_full(&self, dir: &str, parent_path: Option<&str>, user: &User) -> Result<Folder> {
        let start = Instant::now();
        let dir_owned = dir.to_string();
        let parent_owned = parent_path.map(str::to_string);
        let user_id = user.id.clone();
        let max_depth = self.max_depth;
        let stamp = date_time_now();

        let (main, children, panels) = task::spawn_blocking(move || {
            index_directory(&dir_owned, &user_id, parent_owned.as_deref(), &stamp, 0, max_depth)
        })
        .await?;

        info!(
            "Indexed {} ({} folders, {} panels) in {:?}",
            Path::new(dir).format_for_log(),
            children.len() + 1,
            panels.len(),
            start.elapsed()
        );

        let mut folders = Vec::with_capacity(children.len() + 1);
        folders.push(main);
        folders.extend(children);
        let folders = self.keep_existing_state(folders).await;

        self.store.upsert_panels(panels).await?;
        self.store.persist_folders(folders, user).await
    }

    /// Applies a partial refresh for the entries that changed.
    async fn apply_stale(
        &self,
        dir: &str,
        user: &User,
        listing: &DirListing,
        stale: StaleEntries,
    ) -> Result<()> {
        if !stale.removed_folders.is_empty() {
            debug!("Removing {} vanished folders", stale.removed_folders.len());
            self.store.delete_folders(stale.removed_folders.clone()).await?;
        }
        if !stale.removed_panels.is_empty() {
            debug!("Removing {} vanished panels", stale.removed_panels.len());
            self.store.delete_panels(stale.removed_panels.clone()).await?;
        }

        if stale.needs_indexing() {
            let dir_owned = dir.to_string();
            let user_id = user.id.clone();
            let max_depth = self.max_depth;
            let stamp = date_time_now();
            let StaleEntries {
                new_folders,
                changed_panels,
                ..
            } = stale;

            let (folders, panels) = task::spawn_blocking(move || {
                index_changed(&dir_owned, &user_id, &stamp, max_depth, new_folders, changed_panels)
            })
            .await;

            if !panels.is_empty() {
                self.store.upsert_panels(panels).await?;
            }
            if !folders.is_empty() {
                let folders = self.keep_existing_state(folders).await;
                self.store.persist_folders(folders, user).await?;
            }
        }

        self.refresh_folder_record(dir, listing, user).await
    }

    /// Updates the counts of `dir` itself and drops a last-read reference
    /// to a panel that no longer exists.
    async fn refresh_folder_record(&self, dir: &str, listing: &DirListing, user: &User) -> Result<()> {
        let mut folder = match self.store.get_folder_by_path(dir).await {
            Ok(folder) => folder,
            Err(e) if e.is_not_found() => {
                debug!("{} is not indexed yet; skipping record refresh", dir);
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        folder.is_manga_folder = !listing.panels.is_empty();
        folder.metadata.contains = FolderContains {
            files: listing.panels.len(),
            folders: listing.child_folders.len(),
        };

        if folder.last_read_path().is_some_and(|p| !path_exists(p)) {
            debug!("Last read panel of {} vanished", dir);
            folder.last_read_panel = None;
            folder.is_read = false;
        }
        if folder.cover_img_path.as_deref().is_some_and(|p| !path_exists(p)) {
            folder.cover_img_path = None;
        }

        self.store.persist_folders(vec![folder], user).await?;
        Ok(())
    }

    async fn keep_existing_state(&self, folders: Vec<Folder>) -> Vec<Folder> {
        let mut merged = Vec::with_capacity(folders.len());
        for folder in folders {
            match self.store.get_folder_by_path(&folder.path).await {
                Ok(existing) => merged.push(folder.keep_reading_state(&existing)),
                Err(_) => merged.push(folder),
            }
        }
        merged
    }
}

#[async_trait]
impl<S: LibraryStore + Clone + 'static> DirectoryReconciler for FsScanner<S> {
    async fn reconcile_directory(
        &self,
        dir: &str,
        parent_path: Option<&str>,
        user: &User,
        cached_folders: Option<Vec<Folder>>,
        cached_panels: Option<Vec<Panel>>,
    ) -> Result<bool> {
        let dir_owned = dir.to_string();
        let listing = task::spawn_blocking(move || list_directory(Path::new(&dir_owned))).await?;

        let Some(stale) =
            find_stale_entries(&listing, cached_folders.as_deref(), cached_panels.as_deref())
        else {
            self.index_full(dir, parent_path, user).await?;
            return Ok(true);
        };

        if stale.is_empty() {
            debug!("{} contains all the same folders & files as it did before", dir);
            return Ok(false);
        }

        info!(
            "{} is stale: +{} folders, ~{} panels, -{} folders, -{} panels",
            Path::new(dir).format_for_log(),
            stale.new_folders.len(),
            stale.changed_panels.len(),
            stale.removed_folders.len(),
            stale.removed_panels.len()
        );

        self.apply_stale(dir, user, &listing, stale).await?;
        Ok(true)
    }
}

/// Recursively indexes `path`. Fails when it holds nothing supported.
fn index_directory(
    path: &str,
    user_id: &str,
    parent_path: Option<&str>,
    stamp: &(String, String),
    depth: usize,
    max_depth: usize,
) -> Result<FolderGroup> {
    let listing = list_directory(Path::new(path))?;

    if listing.is_empty() {
        return Err(EngineError::NotFound(format!(
            "{path} contains 0 supported files."
        )));
    }

    let mut panels: Vec<Panel> = listing
        .panels
        .par_iter()
        .filter_map(|panel_path| new_panel(user_id, path, panel_path, stamp))
        .collect();
    sort::sort_panels(&mut panels);

    let mut child_groups: Vec<FolderGroup> = if depth < max_depth {
        listing
            .child_folders
            .par_iter()
            .filter_map(|child| {
                match index_directory(child, user_id, Some(path), stamp, depth + 1, max_depth) {
                    Ok(group) => Some(group),
                    Err(e) => {
                        warn!("Skipping {}: {}", child, e);
                        None
                    }
                }
            })
            .collect()
    } else {
        warn!("Not descending below {}: depth limit {} reached", path, max_depth);
        Vec::new()
    };
    child_groups.sort_by(|a, b| sort::compare_titles(&a.0.title, &b.0.title));

    let mut folder = Folder::new(user_id, path, parent_path.map(str::to_string))?;
    folder.is_manga_folder = !panels.is_empty();
    folder.cover_img_path = panels.first().map(|p| p.path.clone());
    folder.metadata = FolderMetadata {
        contains: FolderContains {
            files: panels.len(),
            folders: listing.child_folders.len(),
        },
        size: panels
            .iter()
            .filter_map(|p| p.metadata.as_ref().and_then(|m| m.size))
            .sum(),
    };
    folder.update_date = stamp.0.clone();
    folder.update_time = stamp.1.clone();

    let mut descendants = Vec::new();
    for (child, grandchildren, child_panels) in child_groups {
        if folder.cover_img_path.is_none() {
            folder.cover_img_path = child.cover_img_path.clone();
        }
        descendants.push(child);
        descendants.extend(grandchildren);
        panels.extend(child_panels);
    }

    Ok((folder, descendants, panels))
}

/// Indexes new child folders and re-reads changed panels of `dir`.
fn index_changed(
    dir: &str,
    user_id: &str,
    stamp: &(String, String),
    max_depth: usize,
    new_folders: HashSet<String>,
    changed_panels: HashSet<String>,
) -> (Vec<Folder>, Vec<Panel>) {
    let mut panels: Vec<Panel> = changed_panels
        .par_iter()
        .filter_map(|panel_path| new_panel(user_id, dir, panel_path, stamp))
        .collect();

    let groups: Vec<FolderGroup> = new_folders
        .par_iter()
        .filter_map(|child| {
            index_directory(child, user_id, Some(dir), stamp, 1, max_depth)
                .map_err(|e| warn!("Skipping {}: {}", child, e))
                .ok()
        })
        .collect();

    let mut folders = Vec::new();
    for (child, grandchildren, child_panels) in groups {
        folders.push(child);
        folders.extend(grandchildren);
        panels.extend(child_panels);
    }

    (folders, panels)
}

fn new_panel(user_id: &str, parent: &str, path: &str, stamp: &(String, String)) -> Option<Panel> {
    Panel::new(user_id, parent, path, stamp.clone())
        .map_err(|e| warn!("Skipping panel {}: {}", path, e))
        .ok()
}
