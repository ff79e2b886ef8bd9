//! Persistent storage of folder and panel records.
//!
//! The reading engine only talks to [`LibraryStore`]. Two implementations
//! ship with the crate: [`MemoryStore`] and the file-backed [`JsonFileStore`].

pub mod json_file;
pub mod memory;

pub use json_file::JsonFileStore;
pub use memory::{Catalog, MemoryStore};

use crate::error::Result;
use crate::model::{Direction, Folder, Panel, User};
use async_trait::async_trait;

/// Storage capability consumed by the engine and the scanner.
#[async_trait]
pub trait LibraryStore: Send + Sync {
    /// Fails with `NotFound` when no folder is indexed at `path`.
    async fn get_folder_by_path(&self, path: &str) -> Result<Folder>;

    /// Folders without a parent belonging to `user_id`, in listing order.
    async fn get_root_folders(&self, user_id: &str) -> Result<Vec<Folder>>;

    /// Direct children of `parent_path`, in listing order.
    async fn get_child_folders(&self, parent_path: &str) -> Result<Vec<Folder>>;

    /// Panels of `folder_path` in their authoritative order. Fails with
    /// `NotFound` when the folder is not indexed.
    async fn get_panels(&self, folder_path: &str) -> Result<Vec<Panel>>;

    /// Sibling immediately before/after `current` among the children of
    /// `parent_path`, or `None` at the boundary.
    async fn get_adjacent_folder(
        &self,
        parent_path: &str,
        current: &Folder,
        direction: Direction,
    ) -> Result<Option<Folder>> {
        let siblings = self.get_child_folders(parent_path).await?;
        Ok(adjacent_in(&siblings, &current.path, direction).cloned())
    }

    /// Upserts a batch of folders in one write and returns the first one as
    /// stored.
    async fn persist_folders(&self, folders: Vec<Folder>, user: &User) -> Result<Folder>;

    async fn upsert_panels(&self, panels: Vec<Panel>) -> Result<()>;

    /// Removes folders together with their descendant folders and panels.
    async fn delete_folders(&self, folders: Vec<Folder>) -> Result<()>;

    async fn delete_panels(&self, panels: Vec<Panel>) -> Result<()>;
}

/// Finds the neighbour of `current_path` in an ordered sibling list.
pub fn adjacent_in<'a>(
    siblings: &'a [Folder],
    current_path: &str,
    direction: Direction,
) -> Option<&'a Folder> {
    let position = siblings.iter().position(|f| f.path == current_path)?;

    match direction {
        Direction::Previous => position.checked_sub(1).and_then(|i| siblings.get(i)),
        Direction::Next => siblings.get(position + 1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn folders(names: &[&str]) -> Vec<Folder> {
        names
            .iter()
            .map(|n| Folder::new("1", format!("/lib/{n}"), Some("/lib".to_string())).unwrap())
            .collect()
    }

    #[test]
    fn test_adjacent_in_both_directions() {
        let siblings = folders(&["vol1", "vol2", "vol3"]);

        let next = adjacent_in(&siblings, "/lib/vol2", Direction::Next).unwrap();
        let prev = adjacent_in(&siblings, "/lib/vol2", Direction::Previous).unwrap();

        assert_eq!(next.path, "/lib/vol3");
        assert_eq!(prev.path, "/lib/vol1");
    }

    #[test]
    fn test_adjacent_in_stops_at_boundaries() {
        let siblings = folders(&["vol1", "vol2"]);

        assert!(adjacent_in(&siblings, "/lib/vol1", Direction::Previous).is_none());
        assert!(adjacent_in(&siblings, "/lib/vol2", Direction::Next).is_none());
        assert!(adjacent_in(&siblings, "/lib/other", Direction::Next).is_none());
    }
}
