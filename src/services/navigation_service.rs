//! Reading engine: owns the active session and applies reader commands.
//!
//! Opening a folder loads it, its parent and its panels, reconciles the
//! panel listing with the filesystem and only then initializes pagination.
//! Page turns update the session at once; the resulting folder writes go
//! through the [`ReadStateRecorder`] and their outcomes are matched back by
//! session id.

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::listing_cache::ListingCache;
use crate::model::{Direction, Folder, Panel, User};
use crate::scanner::DirectoryReconciler;
use crate::services::browse_service::FolderBrowser;
use crate::services::lineage;
use crate::services::read_state_service::ReadStateRecorder;
use crate::services::reconcile_service::{CachedListing, StaleDirectoryReconciler};
use crate::state::{NavOutcome, PageMode, PanelPair, ReadingSession, SessionId};
use crate::store::LibraryStore;
use log::{debug, info, warn};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Reader input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Advance,
    Retreat,
    /// Moves one panel even in double mode.
    AdvanceSingle,
    RetreatSingle,
    JumpToFirst,
    JumpToLast,
    ToggleDoubleMode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    /// Index settled; `from == index` when clamped at a boundary.
    Moved { from: usize, index: usize },
    ModeChanged(PageMode),
    /// Toggle refused on the last panel.
    ModeLocked,
    /// A new session was opened on the sibling folder.
    BoundaryCrossed { from: String, to: String },
    /// No sibling to move to, or it could not be opened.
    BoundaryBlocked(Direction),
    Idle,
}

/// A read-state write of the active session that failed.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteWarning {
    pub session: SessionId,
    pub folder_paths: Vec<String>,
    pub error: EngineError,
}

pub struct ReaderEngine<S, R> {
    store: S,
    reconciler: StaleDirectoryReconciler<S, R>,
    recorder: ReadStateRecorder,
    listing_cache: Arc<Mutex<ListingCache>>,
    config: EngineConfig,
    user: User,
    session: Option<ReadingSession>,
    warnings: Vec<WriteWarning>,
}

impl<S, R> ReaderEngine<S, R>
where
    S: LibraryStore + Clone + 'static,
    R: DirectoryReconciler,
{
    /// Creates the engine and spawns its read-state writer.
    pub fn new(store: S, scanner: R, config: EngineConfig, user: User) -> Self {
        let listing_cache = Arc::new(Mutex::new(ListingCache::new(
            config.listing_cache_capacity,
        )));

        Self {
            reconciler: StaleDirectoryReconciler::new(store.clone(), scanner),
            recorder: ReadStateRecorder::spawn(store.clone()),
            store,
            listing_cache,
            config,
            user,
            session: None,
            warnings: Vec::new(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn user(&self) -> &User {
        &self.user
    }

    /// Shared with [`crate::services::DirectoryWatcher`].
    pub fn listing_cache(&self) -> Arc<Mutex<ListingCache>> {
        self.listing_cache.clone()
    }

    pub fn session(&self) -> Option<&ReadingSession> {
        self.session.as_ref()
    }

    /// Opens a reader on `folder_path`, replacing the active session.
    ///
    /// Fails when the folder or its panels cannot be loaded; the previous
    /// session stays active in that case. Queued writes land first, so a
    /// folder left a moment ago reopens at its latest position.
    pub async fn open_session(&mut self, folder_path: &str) -> Result<SessionId> {
        self.settle_writes().await;
        let folder = self.store.get_folder_by_path(folder_path).await?;
        let parent = self.load_parent(&folder).await;

        let cached = match self.cached_panels(folder_path) {
            Some(panels) => panels,
            None => self.store.get_panels(folder_path).await?,
        };

        let mut session = ReadingSession::new(folder, parent, self.user.clone());
        let parent_path = session.folder().parent_path.clone();
        let listing = CachedListing::Panels(cached.clone());
        let verdict = self
            .reconciler
            .reconcile(
                session.hydration_mut(),
                folder_path,
                parent_path.as_deref(),
                &self.user,
                &listing,
            )
            .await;

        if verdict.needs_refresh {
            match self.store.get_folder_by_path(folder_path).await {
                Ok(folder) => session.replace_folders(folder, None),
                Err(e) => warn!("Reloading {} after refresh failed: {}", folder_path, e),
            }
        }
        let panels = verdict.panels_or(cached);

        self.with_cache(|cache| cache.put(folder_path.to_string(), panels.clone()));
        let index = session.initialize(panels)?;

        info!(
            "{}: reading {} from panel {}",
            session.id(),
            Path::new(folder_path).display(),
            index + 1
        );

        let id = session.id();
        if let Some(old) = self.session.replace(session) {
            debug!("{} replaced by {}", old.id(), id);
        }
        self.collect_reports();
        Ok(id)
    }

    /// Closes the active session. Pending writes still run; their results
    /// are no longer reported.
    pub fn close_session(&mut self) -> Option<SessionId> {
        self.collect_reports();
        let closed = self.session.take().map(|s| s.id());
        if let Some(id) = closed {
            debug!("{} closed", id);
        }
        closed
    }

    pub async fn dispatch(&mut self, command: Command) -> Result<CommandOutcome> {
        self.collect_reports();

        let Some(session) = self.session.as_mut() else {
            return Err(EngineError::Session(
                "no reading session is open".to_string(),
            ));
        };

        let pagination = session.pagination_mut();
        let nav = match command {
            Command::Advance => pagination.advance(),
            Command::Retreat => pagination.retreat(),
            Command::AdvanceSingle => pagination.advance_single(),
            Command::RetreatSingle => pagination.retreat_single(),
            Command::JumpToFirst => pagination.jump_to_first(),
            Command::JumpToLast => pagination.jump_to_last(),
            Command::ToggleDoubleMode => {
                if !pagination.toggle_double_mode() {
                    return Ok(CommandOutcome::ModeLocked);
                }
                let mode = pagination.mode().unwrap_or_default();
                if let Err(e) = self.recorder.record_mode_toggle(session) {
                    warn!("Page mode of {} not recorded: {}", session.folder().path, e);
                }
                return Ok(CommandOutcome::ModeChanged(mode));
            }
        };

        match nav {
            NavOutcome::Settled { from, index } => {
                if let Err(e) = self.recorder.record_index_change(session) {
                    warn!("Read position of {} not recorded: {}", session.folder().path, e);
                }
                Ok(CommandOutcome::Moved { from, index })
            }
            NavOutcome::Boundary(direction) => Ok(self.cross_boundary(direction).await),
            NavOutcome::Idle => Ok(CommandOutcome::Idle),
        }
    }

    /// Opens the sibling folder in `direction`. Any failure leaves the
    /// current session in place.
    pub async fn cross_boundary(&mut self, direction: Direction) -> CommandOutcome {
        let blocked = CommandOutcome::BoundaryBlocked(direction);
        let Some(current) = self.session.as_ref().map(|s| s.folder().clone()) else {
            return blocked;
        };
        let Some(parent_path) = current.parent_path.as_deref() else {
            debug!("{} has no parent; no sibling to open", current.path);
            return blocked;
        };

        let sibling = match self
            .store
            .get_adjacent_folder(parent_path, &current, direction)
            .await
        {
            Ok(Some(sibling)) => sibling,
            Ok(None) => {
                debug!("No {:?} sibling of {}", direction, current.path);
                return blocked;
            }
            Err(e) => {
                warn!("Sibling lookup of {} failed: {}", current.path, e);
                return blocked;
            }
        };

        match self.open_session(&sibling.path).await {
            Ok(_) => CommandOutcome::BoundaryCrossed {
                from: current.path,
                to: sibling.path,
            },
            Err(e) => {
                warn!("Opening sibling {} failed: {}", sibling.path, e);
                blocked
            }
        }
    }

    pub fn current_pair(&self) -> PanelPair<'_> {
        self.session
            .as_ref()
            .map(|s| s.current_pair())
            .unwrap_or_default()
    }

    /// `(position, total)` of the active session.
    pub fn progress(&self) -> Option<(usize, usize)> {
        self.session.as_ref().and_then(|s| s.progress())
    }

    /// Waits for queued writes and collects their results.
    pub async fn settle(&mut self) -> Result<()> {
        self.recorder.flush().await?;
        self.collect_reports();
        Ok(())
    }

    /// Failed writes of the active session since the last call.
    pub fn take_warnings(&mut self) -> Vec<WriteWarning> {
        self.collect_reports();
        std::mem::take(&mut self.warnings)
    }

    /// Topmost ancestor of `folder_path`.
    pub async fn outermost_parent(&self, folder_path: &str) -> Result<Folder> {
        let folder = self.store.get_folder_by_path(folder_path).await?;
        Ok(lineage::outermost_parent(&self.store, &folder, self.config.max_parent_depth).await)
    }

    /// Folder listing of `parent_path` (library roots for `None`).
    pub async fn browse(&self, parent_path: Option<&str>) -> Result<FolderBrowser> {
        let mut browser = FolderBrowser::new(parent_path.map(str::to_string));
        browser
            .hydrate(&self.store, &self.reconciler, &self.user)
            .await?;
        Ok(browser)
    }

    /// Stores the hidden flag and mirrors it into the session's folder or
    /// parent record, which later page turns write back whole.
    pub async fn set_hidden(&mut self, folder_path: &str, hidden: bool) -> Result<Folder> {
        self.settle_writes().await;
        let mut folder = self.store.get_folder_by_path(folder_path).await?;
        folder.is_hidden = hidden;
        let stored = self.store.persist_folders(vec![folder], &self.user).await?;

        if let Some(session) = self.session.as_mut() {
            session.patch_record(&stored.path, |f| f.is_hidden = hidden);
        }
        Ok(stored)
    }

    /// Deletes a folder with its descendants. Closes the active session if
    /// it reads inside the deleted tree.
    pub async fn delete_folder(&mut self, folder_path: &str) -> Result<()> {
        self.settle_writes().await;
        let folder = self.store.get_folder_by_path(folder_path).await?;
        self.store.delete_folders(vec![folder]).await?;
        info!("Deleted {} from the library", folder_path);

        let root = Path::new(folder_path);
        self.with_cache(|cache| cache.invalidate(folder_path));

        let inside = self
            .session
            .as_ref()
            .is_some_and(|s| Path::new(&s.folder().path).starts_with(root));
        if inside {
            self.close_session();
        }
        Ok(())
    }

    /// Flushes pending writes and stops the writer.
    pub async fn shutdown(mut self) -> Vec<WriteWarning> {
        if let Err(e) = self.settle().await {
            warn!("Final read state flush failed: {}", e);
        }
        std::mem::take(&mut self.warnings)
    }

    /// Waits for queued writes without collecting their reports.
    async fn settle_writes(&self) {
        if let Err(e) = self.recorder.flush().await {
            warn!("Pending read state writes not settled: {}", e);
        }
    }

    async fn load_parent(&self, folder: &Folder) -> Option<Folder> {
        let parent_path = folder.parent_path.as_deref()?;
        match self.store.get_folder_by_path(parent_path).await {
            Ok(parent) => Some(parent),
            Err(e) => {
                warn!("Parent {} of {} unavailable: {}", parent_path, folder.path, e);
                None
            }
        }
    }

    fn cached_panels(&self, folder_path: &str) -> Option<Vec<Panel>> {
        self.with_cache(|cache| cache.get(folder_path)).flatten()
    }

    fn with_cache<T>(&self, f: impl FnOnce(&mut ListingCache) -> T) -> Option<T> {
        match self.listing_cache.lock() {
            Ok(mut cache) => Some(f(&mut cache)),
            Err(_) => {
                warn!("Listing cache lock poisoned");
                None
            }
        }
    }

    /// Moves failed writes of the active session into `warnings` and drops
    /// reports of sessions that are no longer active.
    fn collect_reports(&mut self) {
        let active = self.session.as_ref().map(|s| s.id());

        for report in self.recorder.drain_reports() {
            if Some(report.session) != active {
                debug!("Discarding write result of inactive {}", report.session);
                continue;
            }
            if let Err(error) = report.result {
                self.warnings.push(WriteWarning {
                    session: report.session,
                    folder_paths: report.folder_paths,
                    error,
                });
            }
        }
    }
}
