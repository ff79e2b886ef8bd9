//! In-memory catalog of folders and panels.

use crate::error::{EngineError, Result};
use crate::model::{Folder, Panel, User, date_time_now};
use crate::sort;
use crate::store::LibraryStore;
use async_trait::async_trait;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Plain record tables, also the on-disk shape of [`super::JsonFileStore`].
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    pub folders: BTreeMap<String, Folder>,
    pub panels: BTreeMap<String, Panel>,
}

/// Cheaply cloneable handle to a shared [`Catalog`].
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Catalog>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_catalog(catalog: Catalog) -> Self {
        Self {
            inner: Arc::new(RwLock::new(catalog)),
        }
    }

    /// Copy of the current tables.
    pub fn snapshot(&self) -> Result<Catalog> {
        Ok(self.read()?.clone())
    }

    /// Inserts or replaces a folder without touching its timestamps.
    pub fn insert_folder(&self, folder: Folder) -> Result<()> {
        self.write()?.folders.insert(folder.path.clone(), folder);
        Ok(())
    }

    pub fn insert_panels(&self, panels: impl IntoIterator<Item = Panel>) -> Result<()> {
        let mut catalog = self.write()?;
        for panel in panels {
            catalog.panels.insert(panel.path.clone(), panel);
        }
        Ok(())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Catalog>> {
        self.inner
            .read()
            .map_err(|_| EngineError::Io("catalog lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Catalog>> {
        self.inner
            .write()
            .map_err(|_| EngineError::Io("catalog lock poisoned".to_string()))
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut s = f.debug_struct("MemoryStore");
        if let Ok(catalog) = self.inner.read() {
            s.field("folders", &catalog.folders.len())
                .field("panels", &catalog.panels.len());
        }
        s.finish()
    }
}

fn is_within(path: &str, root: &str) -> bool {
    Path::new(path).starts_with(Path::new(root))
}

#[async_trait]
impl LibraryStore for MemoryStore {
    async fn get_folder_by_path(&self, path: &str) -> Result<Folder> {
        self.read()?
            .folders
            .get(path)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(format!("folder not indexed: {path}")))
    }

    async fn get_root_folders(&self, user_id: &str) -> Result<Vec<Folder>> {
        let mut folders: Vec<Folder> = self
            .read()?
            .folders
            .values()
            .filter(|f| f.user_id == user_id && f.parent_path.is_none())
            .cloned()
            .collect();

        sort::sort_folders(&mut folders);
        Ok(folders)
    }

    async fn get_child_folders(&self, parent_path: &str) -> Result<Vec<Folder>> {
        let mut folders: Vec<Folder> = self
            .read()?
            .folders
            .values()
            .filter(|f| f.parent_path.as_deref() == Some(parent_path))
            .cloned()
            .collect();

        sort::sort_folders(&mut folders);
        Ok(folders)
    }

    async fn get_panels(&self, folder_path: &str) -> Result<Vec<Panel>> {
        let catalog = self.read()?;
        let mut panels: Vec<Panel> = catalog
            .panels
            .values()
            .filter(|p| p.parent_path == folder_path)
            .cloned()
            .collect();

        if panels.is_empty() && !catalog.folders.contains_key(folder_path) {
            return Err(EngineError::NotFound(format!(
                "0 panels found belonging to: {folder_path}"
            )));
        }
        drop(catalog);

        sort::sort_panels(&mut panels);
        Ok(panels)
    }

    async fn persist_folders(&self, folders: Vec<Folder>, user: &User) -> Result<Folder> {
        let (date, time) = date_time_now();
        let mut catalog = self.write()?;
        let mut first = None;

        for mut folder in folders {
            debug!("user {} updating folder: {}", user.id, folder.path);
            folder.update_date = date.clone();
            folder.update_time = time.clone();
            first.get_or_insert_with(|| folder.clone());
            catalog.folders.insert(folder.path.clone(), folder);
        }

        first.ok_or_else(|| {
            EngineError::Session("persist_folders called with an empty batch".to_string())
        })
    }

    async fn upsert_panels(&self, panels: Vec<Panel>) -> Result<()> {
        let (date, time) = date_time_now();
        let mut catalog = self.write()?;

        for mut panel in panels {
            panel.update_date = date.clone();
            panel.update_time = time.clone();
            catalog.panels.insert(panel.path.clone(), panel);
        }

        Ok(())
    }

    async fn delete_folders(&self, folders: Vec<Folder>) -> Result<()> {
        let mut catalog = self.write()?;

        for folder in folders {
            let root = folder.path.as_str();
            catalog.folders.retain(|path, _| !is_within(path, root));
            catalog
                .panels
                .retain(|_, panel| !is_within(&panel.parent_path, root));
            debug!("deleted folder tree: {}", root);
        }

        Ok(())
    }

    async fn delete_panels(&self, panels: Vec<Panel>) -> Result<()> {
        let mut catalog = self.write()?;
        for panel in panels {
            catalog.panels.remove(&panel.path);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Direction;

    fn stamp() -> (String, String) {
        ("d".to_string(), "t".to_string())
    }

    fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        store
            .insert_folder(Folder::new("1", "/lib", None).unwrap())
            .unwrap();
        for vol in ["vol10", "vol2", "vol1"] {
            let path = format!("/lib/{vol}");
            let mut folder = Folder::new("1", path.clone(), Some("/lib".to_string())).unwrap();
            folder.is_manga_folder = true;
            store.insert_folder(folder).unwrap();
            store
                .insert_panels((0..3).map(|i| {
                    Panel::new("1", path.clone(), format!("{path}/p{i}.png"), stamp()).unwrap()
                }))
                .unwrap();
        }
        store
    }

    #[async_std::test]
    async fn test_child_folders_are_in_listing_order() {
        let store = seeded();
        let children = store.get_child_folders("/lib").await.unwrap();
        let titles: Vec<&str> = children.iter().map(|f| f.title.as_str()).collect();
        assert_eq!(titles, vec!["vol1", "vol2", "vol10"]);
    }

    #[async_std::test]
    async fn test_adjacent_folder_uses_listing_order() {
        let store = seeded();
        let current = store.get_folder_by_path("/lib/vol2").await.unwrap();

        let next = store
            .get_adjacent_folder("/lib", &current, Direction::Next)
            .await
            .unwrap();
        assert_eq!(next.map(|f| f.path), Some("/lib/vol10".to_string()));
    }

    #[async_std::test]
    async fn test_get_panels_of_unknown_folder_is_not_found() {
        let store = seeded();
        let err = store.get_panels("/lib/missing").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[async_std::test]
    async fn test_persist_folders_stamps_and_returns_first() {
        let store = seeded();
        let user = User::default();
        let mut vol1 = store.get_folder_by_path("/lib/vol1").await.unwrap();
        let parent = store.get_folder_by_path("/lib").await.unwrap();
        vol1.is_read = true;

        let stored = store
            .persist_folders(vec![vol1, parent], &user)
            .await
            .unwrap();

        assert_eq!(stored.path, "/lib/vol1");
        assert_ne!(stored.update_date, "");
        assert!(store.get_folder_by_path("/lib/vol1").await.unwrap().is_read);
    }

    #[async_std::test]
    async fn test_empty_persist_batch_is_rejected() {
        let store = seeded();
        let err = store
            .persist_folders(Vec::new(), &User::default())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Session(_)));
    }

    #[async_std::test]
    async fn test_delete_folders_cascades_to_descendants() {
        let store = seeded();
        store
            .insert_folder(Folder::new("1", "/lib2", None).unwrap())
            .unwrap();
        let root = store.get_folder_by_path("/lib").await.unwrap();

        store.delete_folders(vec![root]).await.unwrap();

        let catalog = store.snapshot().unwrap();
        assert_eq!(catalog.folders.len(), 1);
        assert!(catalog.folders.contains_key("/lib2"));
        assert!(catalog.panels.is_empty());
    }

    #[async_std::test]
    async fn test_root_folders_filter_by_user() {
        let store = seeded();
        store
            .insert_folder(Folder::new("2", "/other", None).unwrap())
            .unwrap();

        let roots = store.get_root_folders("1").await.unwrap();
        assert_eq!(roots.len(), 1);
        assert_eq!(roots[0].path, "/lib");
    }
}
