//! Library records shared by the store, the scanner and the reading engine.

use crate::error::{EngineError, Result};
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::SystemTime;

/// Returns the current local `(date, time)` pair used to stamp records.
pub fn date_time_now() -> (String, String) {
    let now = Local::now();
    (
        now.format("%Y-%m-%d").to_string(),
        now.format("%H:%M:%S").to_string(),
    )
}

/// Records addressed by a filesystem path.
pub trait HasPath {
    fn path(&self) -> &str;
}

/// Direction of a sibling lookup in listing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Previous,
    Next,
}

/// File timestamps and size captured when a panel was indexed.
#[derive(Serialize, Deserialize, Clone, Debug, Default, Eq, Hash, PartialEq)]
pub struct FileMetadata {
    pub created: Option<SystemTime>,
    pub modified: Option<SystemTime>,
    pub accessed: Option<SystemTime>,
    pub size: Option<u64>,
}

impl FileMetadata {
    /// Reads the metadata of `path`, or `None` when the file is unreadable.
    pub fn from_path(path: impl AsRef<Path>) -> Option<Self> {
        let metadata = std::fs::metadata(path).ok()?;

        Some(Self {
            created: metadata.created().ok(),
            modified: metadata.modified().ok(),
            accessed: metadata.accessed().ok(),
            size: Some(metadata.len()),
        })
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct FolderContains {
    pub files: usize,
    pub folders: usize,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct FolderMetadata {
    pub contains: FolderContains,
    /// Sum of indexed panel sizes in bytes.
    pub size: u64,
}

#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq)]
pub struct User {
    pub id: String,
    pub username: String,
}

impl User {
    pub fn new(id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
        }
    }
}

impl Default for User {
    fn default() -> Self {
        Self::new("1", "default")
    }
}

/// A single image file inside a manga folder.
#[derive(Serialize, Deserialize, Clone, Debug, Eq, Hash, PartialEq)]
pub struct Panel {
    pub user_id: String,
    pub path: String,
    pub title: String,
    pub parent_path: String,
    pub metadata: Option<FileMetadata>,
    pub is_read: bool,
    pub update_date: String,
    pub update_time: String,
}

impl Panel {
    /// Builds a panel record for `path`, reading its file metadata.
    pub fn new(
        user_id: impl Into<String>,
        parent_path: impl Into<String>,
        path: impl Into<String>,
        (update_date, update_time): (String, String),
    ) -> Result<Panel> {
        let path = path.into();
        let title = file_title(&path)?;
        let metadata = FileMetadata::from_path(&path);

        Ok(Panel {
            user_id: user_id.into(),
            path,
            title,
            parent_path: parent_path.into(),
            metadata,
            is_read: false,
            update_date,
            update_time,
        })
    }

    /// True when the file changed size or mtime since it was indexed, or
    /// when its metadata can no longer be read.
    pub fn is_stale_metadata(&self) -> bool {
        let Some(ref stored) = self.metadata else {
            return true;
        };

        match FileMetadata::from_path(&self.path) {
            Some(current) => stored.modified != current.modified || stored.size != current.size,
            None => true,
        }
    }
}

/// A directory node of the library tree.
#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq)]
pub struct Folder {
    pub user_id: String,
    pub path: String,
    pub title: String,
    pub parent_path: Option<String>,
    pub last_read_panel: Option<Panel>,
    pub cover_img_path: Option<String>,
    pub metadata: FolderMetadata,
    pub is_manga_folder: bool,
    pub is_double_panels: bool,
    pub is_read: bool,
    pub is_hidden: bool,
    pub update_date: String,
    pub update_time: String,
}

impl Folder {
    /// Builds an unread, visible folder record for `path`.
    pub fn new(
        user_id: impl Into<String>,
        path: impl Into<String>,
        parent_path: Option<String>,
    ) -> Result<Folder> {
        let path = path.into();
        let title = file_title(&path)?;
        let (update_date, update_time) = date_time_now();

        Ok(Folder {
            user_id: user_id.into(),
            path,
            title,
            parent_path,
            last_read_panel: None,
            cover_img_path: None,
            metadata: FolderMetadata::default(),
            is_manga_folder: false,
            is_double_panels: false,
            is_read: false,
            is_hidden: false,
            update_date,
            update_time,
        })
    }

    /// Path of the last read panel, if any.
    pub fn last_read_path(&self) -> Option<&str> {
        self.last_read_panel.as_ref().map(|p| p.path.as_str())
    }

    /// Copies the user-owned state of `existing` onto a freshly scanned record.
    pub fn keep_reading_state(mut self, existing: &Folder) -> Folder {
        self.last_read_panel = existing.last_read_panel.clone();
        self.is_read = existing.is_read;
        self.is_double_panels = existing.is_double_panels;
        self.is_hidden = existing.is_hidden;
        self
    }
}

impl HasPath for Folder {
    fn path(&self) -> &str {
        self.path.as_ref()
    }
}

impl HasPath for Panel {
    fn path(&self) -> &str {
        self.path.as_ref()
    }
}

fn file_title(path: &str) -> Result<String> {
    Path::new(path)
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .ok_or_else(|| EngineError::InvalidPath(format!("'{path}' has no file name")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn stamp() -> (String, String) {
        ("2024-01-01".to_string(), "00:00:00".to_string())
    }

    #[test]
    fn test_panel_title_is_file_name() {
        let panel = Panel::new("1", "/lib/vol1", "/lib/vol1/p01.png", stamp()).unwrap();
        assert_eq!(panel.title, "p01.png");
        assert_eq!(panel.parent_path, "/lib/vol1");
        assert!(panel.metadata.is_none());
    }

    #[test]
    fn test_folder_without_file_name_is_rejected() {
        let err = Folder::new("1", "/", None).unwrap_err();
        assert!(matches!(err, EngineError::InvalidPath(_)));
    }

    #[test]
    fn test_stale_metadata_tracks_file_changes() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("p01.png");
        fs::write(&file, b"abc").unwrap();

        let path = file.to_string_lossy().to_string();
        let parent = dir.path().to_string_lossy().to_string();
        let panel = Panel::new("1", parent.clone(), path.clone(), stamp()).unwrap();
        assert!(!panel.is_stale_metadata());

        fs::write(&file, b"abcdef").unwrap();
        assert!(panel.is_stale_metadata());

        let rescanned = Panel::new("1", parent, path, stamp()).unwrap();
        assert!(!rescanned.is_stale_metadata());

        fs::remove_file(&file).unwrap();
        assert!(panel.is_stale_metadata());
    }

    #[test]
    fn test_keep_reading_state_carries_user_flags() {
        let mut existing = Folder::new("1", "/lib/vol1", Some("/lib".to_string())).unwrap();
        existing.is_hidden = true;
        existing.is_double_panels = true;
        existing.is_read = true;
        existing.last_read_panel =
            Some(Panel::new("1", "/lib/vol1", "/lib/vol1/p09.png", stamp()).unwrap());

        let fresh = Folder::new("1", "/lib/vol1", Some("/lib".to_string())).unwrap();
        let merged = fresh.keep_reading_state(&existing);

        assert!(merged.is_hidden);
        assert!(merged.is_double_panels);
        assert!(merged.is_read);
        assert_eq!(merged.last_read_path(), Some("/lib/vol1/p09.png"));
    }
}
