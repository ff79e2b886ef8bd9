//! File-backed catalog: a [`MemoryStore`] mirrored to a JSON snapshot after
//! every mutation.

use crate::error::Result;
use crate::model::{Folder, Panel, User};
use crate::store::{Catalog, LibraryStore, MemoryStore};
use async_std::fs;
use async_std::sync::Mutex;
use async_trait::async_trait;
use log::{debug, info};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Clone, Debug)]
pub struct JsonFileStore {
    memory: MemoryStore,
    path: PathBuf,
    /// Shared by clones; one flush writes and renames the file at a time.
    flush_lock: Arc<Mutex<()>>,
}

impl JsonFileStore {
    /// Opens the catalog at `path`, starting empty if the file does not exist.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let catalog = match fs::read_to_string(&path).await {
            Ok(json) => serde_json::from_str::<Catalog>(&json)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("Creating new catalog at {}", path.display());
                Catalog::default()
            }
            Err(e) => return Err(e.into()),
        };

        info!(
            "Catalog loaded from {} ({} folders, {} panels)",
            path.display(),
            catalog.folders.len(),
            catalog.panels.len()
        );

        Ok(Self {
            memory: MemoryStore::from_catalog(catalog),
            path,
            flush_lock: Arc::new(Mutex::new(())),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn memory(&self) -> &MemoryStore {
        &self.memory
    }

    /// Writes the catalog next to its final location, then renames it over.
    ///
    /// The snapshot is taken under the flush lock, so the last rename always
    /// carries the newest tables.
    pub async fn flush(&self) -> Result<()> {
        let _guard = self.flush_lock.lock().await;
        let json = serde_json::to_string_pretty(&self.memory.snapshot()?)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).await?;
        fs::rename(&tmp, &self.path).await?;

        debug!("Catalog flushed to {}", self.path.display());
        Ok(())
    }
}

#[async_trait]
impl LibraryStore for JsonFileStore {
    async fn get_folder_by_path(&self, path: &str) -> Result<Folder> {
        self.memory.get_folder_by_path(path).await
    }

    async fn get_root_folders(&self, user_id: &str) -> Result<Vec<Folder>> {
        self.memory.get_root_folders(user_id).await
    }

    async fn get_child_folders(&self, parent_path: &str) -> Result<Vec<Folder>> {
        self.memory.get_child_folders(parent_path).await
    }

    async fn get_panels(&self, folder_path: &str) -> Result<Vec<Panel>> {
        self.memory.get_panels(folder_path).await
    }

    async fn persist_folders(&self, folders: Vec<Folder>, user: &User) -> Result<Folder> {
        let stored = self.memory.persist_folders(folders, user).await?;
        self.flush().await?;
        Ok(stored)
    }

    async fn upsert_panels(&self, panels: Vec<Panel>) -> Result<()> {
        self.memory.upsert_panels(panels).await?;
        self.flush().await
    }

    async fn delete_folders(&self, folders: Vec<Folder>) -> Result<()> {
        self.memory.delete_folders(folders).await?;
        self.flush().await
    }

    async fn delete_panels(&self, panels: Vec<Panel>) -> Result<()> {
        self.memory.delete_panels(panels).await?;
        self.flush().await
    }
}
