//! Folder-listing view: the child folders of one parent, reconciled once
//! per entry.

use crate::error::Result;
use crate::model::{Folder, User};
use crate::scanner::DirectoryReconciler;
use crate::services::reconcile_service::{CachedListing, StaleDirectoryReconciler};
use crate::state::HydrationFlag;
use crate::store::LibraryStore;
use log::debug;

#[derive(Debug, Clone, Default)]
pub struct FolderBrowser {
    parent_path: Option<String>,
    hydration: HydrationFlag,
    children: Vec<Folder>,
    show_hidden: bool,
}

impl FolderBrowser {
    /// Browser over the children of `parent_path`, or over the library
    /// roots when `None`.
    pub fn new(parent_path: Option<String>) -> Self {
        Self {
            parent_path,
            ..Self::default()
        }
    }

    pub fn parent_path(&self) -> Option<&str> {
        self.parent_path.as_deref()
    }

    pub fn set_show_hidden(&mut self, show_hidden: bool) {
        self.show_hidden = show_hidden;
    }

    /// Loads the listing from the store and reconciles it with the
    /// filesystem. Later calls return the listing loaded by the first one.
    pub async fn hydrate<S, R>(
        &mut self,
        store: &S,
        reconciler: &StaleDirectoryReconciler<S, R>,
        user: &User,
    ) -> Result<&[Folder]>
    where
        S: LibraryStore,
        R: DirectoryReconciler,
    {
        if self.hydration.is_attempted() {
            return Ok(&self.children);
        }

        let Some(parent_path) = self.parent_path.clone() else {
            self.hydration.begin();
            self.children = store.get_root_folders(&user.id).await?;
            debug!("Listing {} library roots", self.children.len());
            return Ok(&self.children);
        };

        let cached = store.get_child_folders(&parent_path).await?;
        let grandparent = match store.get_folder_by_path(&parent_path).await {
            Ok(parent) => parent.parent_path,
            Err(_) => None,
        };

        let listing = CachedListing::Folders(cached.clone());
        let verdict = reconciler
            .reconcile(
                &mut self.hydration,
                &parent_path,
                grandparent.as_deref(),
                user,
                &listing,
            )
            .await;

        self.children = verdict.folders_or(cached);
        debug!("Listing {} folders of {}", self.children.len(), parent_path);
        Ok(&self.children)
    }

    /// Children in listing order, hidden ones only when enabled.
    pub fn visible(&self) -> Vec<&Folder> {
        self.children
            .iter()
            .filter(|f| self.show_hidden || !f.is_hidden)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::FsScanner;
    use crate::store::MemoryStore;
    use std::fs;

    #[async_std::test]
    async fn test_hydrate_picks_up_new_folder_once() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_string_lossy().to_string();
        for vol in ["vol1", "vol2"] {
            fs::create_dir(dir.path().join(vol)).unwrap();
            fs::write(dir.path().join(vol).join("p1.png"), b"x").unwrap();
        }

        let store = MemoryStore::new();
        let scanner = FsScanner::new(store.clone());
        let user = User::default();
        scanner.index_root(&root, &user).await.unwrap();

        fs::create_dir(dir.path().join("vol3")).unwrap();
        fs::write(dir.path().join("vol3").join("p1.png"), b"x").unwrap();

        let reconciler = StaleDirectoryReconciler::new(store.clone(), scanner);
        let mut browser = FolderBrowser::new(Some(root.clone()));
        let children = browser.hydrate(&store, &reconciler, &user).await.unwrap();
        assert_eq!(children.len(), 3);

        fs::create_dir(dir.path().join("vol4")).unwrap();
        fs::write(dir.path().join("vol4").join("p1.png"), b"x").unwrap();
        let children = browser.hydrate(&store, &reconciler, &user).await.unwrap();
        assert_eq!(children.len(), 3);
    }

    #[async_std::test]
    async fn test_hidden_folders_are_filtered() {
        let store = MemoryStore::new();
        store.insert_folder(Folder::new("1", "/lib", None).unwrap()).unwrap();
        let mut hidden = Folder::new("1", "/other", None).unwrap();
        hidden.is_hidden = true;
        store.insert_folder(hidden).unwrap();

        let reconciler = StaleDirectoryReconciler::new(
            store.clone(),
            crate::services::reconcile_service::tests::ScriptedScanner::new(Ok(false)),
        );
        let mut browser = FolderBrowser::new(None);
        browser
            .hydrate(&store, &reconciler, &User::default())
            .await
            .unwrap();

        assert_eq!(browser.visible().len(), 1);
        browser.set_show_hidden(true);
        assert_eq!(browser.visible().len(), 2);
    }
}
