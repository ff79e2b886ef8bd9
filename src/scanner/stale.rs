//! Comparison of a cached listing against the directory on disk.

use crate::file_utils::{DirListing, path_exists};
use crate::model::{Folder, HasPath, Panel};
use std::collections::{HashMap, HashSet};

/// Entries that differ between a cached listing and the filesystem.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct StaleEntries {
    /// Child folders on disk that the cache does not know about.
    pub new_folders: HashSet<String>,
    /// Panels that are new on disk or whose file changed since indexing.
    pub changed_panels: HashSet<String>,
    /// Cached folders that vanished or are no longer listed.
    pub removed_folders: Vec<Folder>,
    /// Cached panels that vanished or are no longer listed.
    pub removed_panels: Vec<Panel>,
}

impl StaleEntries {
    pub fn is_empty(&self) -> bool {
        self.new_folders.is_empty()
            && self.changed_panels.is_empty()
            && self.removed_folders.is_empty()
            && self.removed_panels.is_empty()
    }

    /// True when something has to be read from disk again.
    pub fn needs_indexing(&self) -> bool {
        !self.new_folders.is_empty() || !self.changed_panels.is_empty()
    }
}

/// Compares the supplied cached listings with `listing`.
///
/// Only the kinds that were supplied are compared. Returns `None` when no
/// cached listing was supplied at all, which means a fresh scan.
pub fn find_stale_entries(
    listing: &DirListing,
    cached_folders: Option<&[Folder]>,
    cached_panels: Option<&[Panel]>,
) -> Option<StaleEntries> {
    if cached_folders.is_none() && cached_panels.is_none() {
        return None;
    }

    let mut stale = StaleEntries::default();

    if let Some(old) = cached_folders {
        let (kept, removed) = split_removed(old, &listing.child_folders);
        stale.removed_folders = removed;
        stale.new_folders = added_paths(&kept, &listing.child_folders);
    }

    if let Some(old) = cached_panels {
        let (kept, removed) = split_removed(old, &listing.panels);
        stale.removed_panels = removed;
        stale.changed_panels = changed_panels(&kept, &listing.panels);
    }

    Some(stale)
}

/// Splits cached records into those still listed on disk and those that
/// are gone (deleted, or no longer qualifying, e.g. emptied folders).
fn split_removed<O>(old: &[O], listed: &HashSet<String>) -> (Vec<O>, Vec<O>)
where
    O: HasPath + Clone,
{
    old.iter()
        .cloned()
        .partition(|entry| path_exists(entry.path()) && listed.contains(entry.path()))
}

fn added_paths<O: HasPath>(kept: &[O], listed: &HashSet<String>) -> HashSet<String> {
    let known: HashSet<&str> = kept.iter().map(|x| x.path()).collect();

    listed
        .iter()
        .filter(|path| !known.contains(path.as_str()))
        .cloned()
        .collect()
}

fn changed_panels(kept: &[Panel], listed: &HashSet<String>) -> HashSet<String> {
    let known: HashMap<&str, &Panel> = kept.iter().map(|p| (p.path.as_str(), p)).collect();

    listed
        .iter()
        .filter(|path| match known.get(path.as_str()) {
            Some(panel) => panel.is_stale_metadata(),
            None => true,
        })
        .cloned()
        .collect()
}
