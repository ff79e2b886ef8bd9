//! Walk from a folder up to its library root.

use crate::model::Folder;
use crate::store::LibraryStore;
use log::warn;
use std::collections::HashSet;

/// Returns the topmost ancestor of `folder` reachable through the store.
///
/// The walk is bounded by `max_depth` and stops at a repeated path. Either
/// condition, or a failed lookup, ends the walk at the last ancestor found.
pub async fn outermost_parent<S: LibraryStore + ?Sized>(
    store: &S,
    folder: &Folder,
    max_depth: usize,
) -> Folder {
    let mut current = folder.clone();
    let mut visited = HashSet::from([current.path.clone()]);

    for _ in 0..max_depth {
        let Some(parent_path) = current.parent_path.clone() else {
            return current;
        };

        if !visited.insert(parent_path.clone()) {
            warn!("Folder parent chain loops at {}", parent_path);
            return current;
        }

        match store.get_folder_by_path(&parent_path).await {
            Ok(parent) => current = parent,
            Err(e) => {
                warn!("Parent lookup of {} failed: {}", current.path, e);
                return current;
            }
        }
    }

    if current.parent_path.is_some() {
        warn!(
            "Stopped parent walk of {} after {} levels",
            folder.path, max_depth
        );
    }
    current
}
