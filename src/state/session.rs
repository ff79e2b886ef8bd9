//! The live state of one open reader.

use crate::error::{EngineError, Result};
use crate::model::{Folder, Panel, User};
use crate::state::pagination::PaginationController;
use crate::state::sequence::PanelPair;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Tags persistence work so late results of a closed session can be told
/// apart from the active one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
    pub fn next() -> Self {
        SessionId(NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session#{}", self.0)
    }
}

/// Set once the staleness check of a folder entry has been attempted,
/// whether or not it succeeded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HydrationFlag {
    attempted: bool,
}

impl HydrationFlag {
    pub fn is_attempted(&self) -> bool {
        self.attempted
    }

    /// Marks the flag and returns true if this is the first attempt.
    pub fn begin(&mut self) -> bool {
        !std::mem::replace(&mut self.attempted, true)
    }
}

/// Folder, parent, user and pagination of one open reader, created together.
#[derive(Debug, Clone)]
pub struct ReadingSession {
    id: SessionId,
    folder: Folder,
    parent: Option<Folder>,
    user: User,
    pagination: PaginationController,
    hydration: HydrationFlag,
}

impl ReadingSession {
    pub fn new(folder: Folder, parent: Option<Folder>, user: User) -> Self {
        Self {
            id: SessionId::next(),
            folder,
            parent,
            user,
            pagination: PaginationController::new(),
            hydration: HydrationFlag::default(),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn folder(&self) -> &Folder {
        &self.folder
    }

    pub fn parent(&self) -> Option<&Folder> {
        self.parent.as_ref()
    }

    pub fn user(&self) -> &User {
        &self.user
    }

    pub fn pagination(&self) -> &PaginationController {
        &self.pagination
    }

    pub fn pagination_mut(&mut self) -> &mut PaginationController {
        &mut self.pagination
    }

    pub fn hydration(&self) -> HydrationFlag {
        self.hydration
    }

    pub fn hydration_mut(&mut self) -> &mut HydrationFlag {
        &mut self.hydration
    }

    /// Starts pagination from the folder's stored position and page mode.
    /// Refused until the staleness check has been attempted.
    pub fn initialize(&mut self, panels: Vec<Panel>) -> Result<usize> {
        if !self.hydration.is_attempted() {
            return Err(EngineError::Session(format!(
                "{} initialized before its listing was reconciled",
                self.folder.path
            )));
        }

        let last_read = self.folder.last_read_path().map(str::to_string);
        let is_double = self.folder.is_double_panels;
        self.pagination
            .initialize(panels, last_read.as_deref(), is_double)
    }

    /// Swaps in updated folder records ahead of the write that stores them.
    pub fn replace_folders(&mut self, folder: Folder, parent: Option<Folder>) {
        self.folder = folder;
        if parent.is_some() {
            self.parent = parent;
        }
    }

    /// Applies `patch` to the folder or parent record stored at `path`.
    /// Returns false when neither is.
    pub fn patch_record(&mut self, path: &str, patch: impl Fn(&mut Folder)) -> bool {
        let mut patched = false;
        for record in std::iter::once(&mut self.folder).chain(self.parent.as_mut()) {
            if record.path == path {
                patch(record);
                patched = true;
            }
        }
        patched
    }

    pub fn current_pair(&self) -> PanelPair<'_> {
        self.pagination.current_pair()
    }

    /// `(position, total)` with a 1-based position, once ready and non-empty.
    pub fn progress(&self) -> Option<(usize, usize)> {
        let index = self.pagination.index()?;
        let total = self.pagination.sequence().len();
        (total > 0).then_some((index + 1, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::sequence::tests::panels;

    fn session() -> ReadingSession {
        let mut folder = Folder::new("1", "/lib/vol1", Some("/lib".to_string())).unwrap();
        folder.is_manga_folder = true;
        folder.last_read_panel = Some(panels(3)[1].clone());
        folder.is_double_panels = true;
        ReadingSession::new(folder, None, User::default())
    }

    #[test]
    fn test_session_ids_are_unique() {
        assert_ne!(SessionId::next(), SessionId::next());
    }

    #[test]
    fn test_hydration_flag_begins_once() {
        let mut flag = HydrationFlag::default();
        assert!(flag.begin());
        assert!(!flag.begin());
        assert!(flag.is_attempted());
    }

    #[test]
    fn test_initialize_requires_hydration() {
        let mut session = session();
        let err = session.initialize(panels(3)).unwrap_err();
        assert!(matches!(err, EngineError::Session(_)));
        assert!(!session.pagination().is_ready());
    }

    #[test]
    fn test_initialize_uses_folder_state() {
        let mut session = session();
        session.hydration_mut().begin();

        assert_eq!(session.initialize(panels(3)).unwrap(), 1);
        assert_eq!(
            session.current_pair().paths(),
            (Some("/lib/vol1/p1.png"), Some("/lib/vol1/p2.png"))
        );
        assert_eq!(session.progress(), Some((2, 3)));
    }

    #[test]
    fn test_replace_folders_keeps_parent_when_absent() {
        let mut session = session();
        let parent = Folder::new("1", "/lib", None).unwrap();
        session.replace_folders(session.folder().clone(), Some(parent));

        let mut folder = session.folder().clone();
        folder.is_read = true;
        session.replace_folders(folder, None);

        assert!(session.folder().is_read);
        assert_eq!(session.parent().map(|p| p.path.as_str()), Some("/lib"));
    }

    #[test]
    fn test_patch_record_targets_parent_by_path() {
        let mut session = session();
        let parent = Folder::new("1", "/lib", None).unwrap();
        session.replace_folders(session.folder().clone(), Some(parent));

        assert!(session.patch_record("/lib", |f| f.is_hidden = true));
        assert!(session.parent().unwrap().is_hidden);
        assert!(!session.folder().is_hidden);

        assert!(!session.patch_record("/lib/vol9", |f| f.is_hidden = true));
    }
}
