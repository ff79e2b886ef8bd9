use crate::config::SUPPORTED_IMAGE_EXTENSIONS;
use crate::error::Result;
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// Entries of one directory, split the way the scanner indexes them.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DirListing {
    /// Non-empty child directories.
    pub child_folders: HashSet<String>,
    /// Files with a supported image extension.
    pub panels: HashSet<String>,
}

impl DirListing {
    pub fn is_empty(&self) -> bool {
        self.child_folders.is_empty() && self.panels.is_empty()
    }
}

pub fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext_str| SUPPORTED_IMAGE_EXTENSIONS.contains(&ext_str.to_lowercase().as_str()))
        .unwrap_or(false)
}

pub fn path_exists(path: &str) -> bool {
    Path::new(path).exists()
}

/// Lists `dir` without descending into child folders.
pub fn list_directory(dir: &Path) -> Result<DirListing> {
    let mut listing = DirListing::default();

    for entry in fs::read_dir(dir)? {
        let path = entry?.path();

        if path.is_dir() {
            if fs::read_dir(&path)?.next().is_some() {
                listing
                    .child_folders
                    .insert(path.to_string_lossy().to_string());
            }
        } else if is_supported_image(&path) {
            listing.panels.insert(path.to_string_lossy().to_string());
        }
    }

    Ok(listing)
}

/// Short path rendering for log lines.
pub trait PathExt {
    fn format_for_log(&self) -> String;
}

impl PathExt for Path {
    fn format_for_log(&self) -> String {
        match self.file_name() {
            Some(name) => format!(".../{}", name.to_string_lossy()),
            None => self.display().to_string(),
        }
    }
}
