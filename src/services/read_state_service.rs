//! Read-position persistence.
//!
//! [`ReadStateRecorder`] derives the folder records to write after a page
//! turn and hands them to a writer task. The writer keeps at most one
//! `persist_folders` call in flight; batches that arrive meanwhile are
//! merged per session, so only the latest position is written once the
//! in-flight write settles.

use crate::error::{EngineError, Result};
use crate::model::{Folder, User};
use crate::state::{ReadingSession, SessionId};
use crate::store::LibraryStore;
use async_std::channel::{self, Receiver, Sender};
use async_std::task::{self, JoinHandle};
use log::{debug, warn};
use std::collections::VecDeque;

/// One batched folder write.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistRequest {
    pub session: SessionId,
    pub folders: Vec<Folder>,
    pub user: User,
    /// Index the batch was derived from, `None` for mode toggles.
    pub index: Option<usize>,
}

impl PersistRequest {
    /// Folds a newer batch of the same session into this one. Records are
    /// replaced by path so the newest version of each folder wins.
    fn merge(&mut self, newer: PersistRequest) {
        for folder in newer.folders {
            match self.folders.iter_mut().find(|f| f.path == folder.path) {
                Some(existing) => *existing = folder,
                None => self.folders.push(folder),
            }
        }
        if newer.index.is_some() {
            self.index = newer.index;
        }
        self.user = newer.user;
    }

    pub fn folder_paths(&self) -> Vec<String> {
        self.folders.iter().map(|f| f.path.clone()).collect()
    }
}

/// Outcome of one completed write.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteReport {
    pub session: SessionId,
    pub folder_paths: Vec<String>,
    pub index: Option<usize>,
    pub result: Result<()>,
}

enum WriterMsg {
    Persist(PersistRequest),
    Flush(Sender<()>),
}

/// Builds the write for the session's current index.
///
/// The folder gets the current panel as last read and `is_read` set exactly
/// when that panel is the last one. The parent gets the same last read
/// panel; its own `is_read` is left alone.
pub fn on_index_changed(session: &ReadingSession) -> Option<PersistRequest> {
    let pagination = session.pagination();
    let index = pagination.index()?;
    let panel = pagination.current_panel()?.clone();
    let is_last = pagination.sequence().last_index() == Some(index);

    let mut folder = session.folder().clone();
    folder.last_read_panel = Some(panel.clone());
    folder.is_read = folder.is_manga_folder && is_last;

    let mut folders = vec![folder];
    if let Some(parent) = session.parent() {
        let mut parent = parent.clone();
        parent.last_read_panel = Some(panel);
        folders.push(parent);
    }

    Some(PersistRequest {
        session: session.id(),
        folders,
        user: session.user().clone(),
        index: Some(index),
    })
}

/// Builds the single-folder write storing the session's page mode.
pub fn on_mode_toggled(session: &ReadingSession) -> Option<PersistRequest> {
    let mode = session.pagination().mode()?;

    let mut folder = session.folder().clone();
    folder.is_double_panels = mode.is_double();

    Some(PersistRequest {
        session: session.id(),
        folders: vec![folder],
        user: session.user().clone(),
        index: None,
    })
}

/// Handle to the writer task.
pub struct ReadStateRecorder {
    outbox: Sender<WriterMsg>,
    reports: Receiver<WriteReport>,
    writer: Option<JoinHandle<()>>,
}

impl ReadStateRecorder {
    /// Spawns the writer task on the async-std executor.
    pub fn spawn<S: LibraryStore + 'static>(store: S) -> Self {
        let (outbox, inbox) = channel::unbounded();
        let (report_tx, reports) = channel::unbounded();
        let writer = task::spawn(run_writer(store, inbox, report_tx));

        Self {
            outbox,
            reports,
            writer: Some(writer),
        }
    }

    /// Applies the index change to the session right away and queues the
    /// batched write. Returns false when the session has nothing to record.
    pub fn record_index_change(&self, session: &mut ReadingSession) -> Result<bool> {
        let Some(request) = on_index_changed(session) else {
            return Ok(false);
        };
        self.apply_and_submit(session, request)?;
        Ok(true)
    }

    /// Same as [`Self::record_index_change`] for the page mode flag.
    pub fn record_mode_toggle(&self, session: &mut ReadingSession) -> Result<bool> {
        let Some(request) = on_mode_toggled(session) else {
            return Ok(false);
        };
        self.apply_and_submit(session, request)?;
        Ok(true)
    }

    fn apply_and_submit(&self, session: &mut ReadingSession, request: PersistRequest) -> Result<()> {
        let mut folders = request.folders.iter().cloned();
        if let Some(folder) = folders.next() {
            session.replace_folders(folder, folders.next());
        }
        self.submit(request)
    }

    pub fn submit(&self, request: PersistRequest) -> Result<()> {
        debug!(
            "{}: queueing write of {} folders (index {:?})",
            request.session,
            request.folders.len(),
            request.index
        );
        self.outbox
            .try_send(WriterMsg::Persist(request))
            .map_err(|_| EngineError::Session("read state writer has stopped".to_string()))
    }

    /// Waits until every queued write has been attempted.
    pub async fn flush(&self) -> Result<()> {
        let (done_tx, done_rx) = channel::bounded(1);
        self.outbox
            .send(WriterMsg::Flush(done_tx))
            .await
            .map_err(|_| EngineError::Session("read state writer has stopped".to_string()))?;
        done_rx
            .recv()
            .await
            .map_err(|_| EngineError::Session("read state writer has stopped".to_string()))
    }

    /// Completed writes since the last call, oldest first.
    pub fn drain_reports(&self) -> Vec<WriteReport> {
        let mut reports = Vec::new();
        while let Ok(report) = self.reports.try_recv() {
            reports.push(report);
        }
        reports
    }

    /// Flushes pending writes and stops the writer task.
    pub async fn shutdown(mut self) -> Vec<WriteReport> {
        if let Err(e) = self.flush().await {
            warn!("Read state flush on shutdown failed: {}", e);
        }
        self.outbox.close();
        if let Some(writer) = self.writer.take() {
            writer.await;
        }
        self.drain_reports()
    }
}

fn enqueue(queue: &mut VecDeque<PersistRequest>, waiters: &mut Vec<Sender<()>>, msg: WriterMsg) {
    match msg {
        WriterMsg::Persist(request) => match queue.back_mut() {
            Some(back) if back.session == request.session => {
                debug!("{}: coalescing pending write", request.session);
                back.merge(request);
            }
            _ => queue.push_back(request),
        },
        WriterMsg::Flush(done) => waiters.push(done),
    }
}

async fn run_writer<S: LibraryStore>(
    store: S,
    inbox: Receiver<WriterMsg>,
    reports: Sender<WriteReport>,
) {
    let mut queue: VecDeque<PersistRequest> = VecDeque::new();
    let mut waiters: Vec<Sender<()>> = Vec::new();

    loop {
        if queue.is_empty() {
            for done in waiters.drain(..) {
                let _ = done.send(()).await;
            }
            match inbox.recv().await {
                Ok(msg) => enqueue(&mut queue, &mut waiters, msg),
                Err(_) => break,
            }
        }

        // Everything that arrived while the previous write was in flight.
        while let Ok(msg) = inbox.try_recv() {
            enqueue(&mut queue, &mut waiters, msg);
        }

        let Some(request) = queue.pop_front() else {
            continue;
        };

        let folder_paths = request.folder_paths();
        let result = store
            .persist_folders(request.folders, &request.user)
            .await
            .map(|_| ());

        match &result {
            Ok(()) => debug!("{}: stored {:?}", request.session, folder_paths),
            Err(e) => warn!(
                "{}: failed to store read state of {:?}: {}",
                request.session, folder_paths, e
            ),
        }

        let report = WriteReport {
            session: request.session,
            folder_paths,
            index: request.index,
            result,
        };
        if reports.send(report).await.is_err() {
            debug!("Read state reports dropped: recorder is gone");
        }
    }

    for done in waiters.drain(..) {
        let _ = done.send(()).await;
    }
    debug!("Read state writer stopped");
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::model::Panel;
    use crate::state::sequence::tests::panels;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// Store whose folder writes take `delay` each. Written batches are kept
    /// in call order.
    #[derive(Clone)]
    pub(crate) struct SlowStore {
        inner: MemoryStore,
        delay: Duration,
        writes: Arc<Mutex<Vec<Vec<Folder>>>>,
        in_flight: Arc<AtomicUsize>,
        max_in_flight: Arc<AtomicUsize>,
    }

    impl SlowStore {
        pub(crate) fn new(inner: MemoryStore, delay: Duration) -> Self {
            Self {
                inner,
                delay,
                writes: Arc::new(Mutex::new(Vec::new())),
                in_flight: Arc::new(AtomicUsize::new(0)),
                max_in_flight: Arc::new(AtomicUsize::new(0)),
            }
        }

        pub(crate) fn writes(&self) -> Vec<Vec<Folder>> {
            self.writes.lock().unwrap().clone()
        }

        pub(crate) fn max_in_flight(&self) -> usize {
            self.max_in_flight.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LibraryStore for SlowStore {
        async fn get_folder_by_path(&self, path: &str) -> Result<Folder> {
            self.inner.get_folder_by_path(path).await
        }

        async fn get_root_folders(&self, user_id: &str) -> Result<Vec<Folder>> {
            self.inner.get_root_folders(user_id).await
        }

        async fn get_child_folders(&self, parent_path: &str) -> Result<Vec<Folder>> {
            self.inner.get_child_folders(parent_path).await
        }

        async fn get_panels(&self, folder_path: &str) -> Result<Vec<Panel>> {
            self.inner.get_panels(folder_path).await
        }

        async fn persist_folders(&self, folders: Vec<Folder>, user: &User) -> Result<Folder> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            task::sleep(self.delay).await;
            self.writes.lock().unwrap().push(folders.clone());
            let stored = self.inner.persist_folders(folders, user).await;

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            stored
        }

        async fn upsert_panels(&self, panels: Vec<Panel>) -> Result<()> {
            self.inner.upsert_panels(panels).await
        }

        async fn delete_folders(&self, folders: Vec<Folder>) -> Result<()> {
            self.inner.delete_folders(folders).await
        }

        async fn delete_panels(&self, panels: Vec<Panel>) -> Result<()> {
            self.inner.delete_panels(panels).await
        }
    }

    fn session(parent: bool) -> ReadingSession {
        let mut folder = Folder::new("1", "/lib/vol1", Some("/lib".to_string())).unwrap();
        folder.is_manga_folder = true;
        let parent = parent.then(|| Folder::new("1", "/lib", None).unwrap());
        let mut session = ReadingSession::new(folder, parent, User::default());
        session.hydration_mut().begin();
        session.initialize(panels(4)).unwrap();
        session
    }

    #[test]
    fn test_index_change_writes_folder_and_parent_together() {
        let mut session = session(true);
        session.pagination_mut().advance();

        let request = on_index_changed(&session).unwrap();
        assert_eq!(request.folders.len(), 2);
        assert_eq!(request.index, Some(1));

        let (folder, parent) = (&request.folders[0], &request.folders[1]);
        assert_eq!(folder.last_read_path(), Some("/lib/vol1/p1.png"));
        assert_eq!(parent.last_read_path(), Some("/lib/vol1/p1.png"));
        assert!(!folder.is_read);
    }

    #[test]
    fn test_last_panel_marks_folder_read_and_leaves_parent() {
        let mut session = session(true);
        session.pagination_mut().jump_to_last();

        let request = on_index_changed(&session).unwrap();
        assert!(request.folders[0].is_read);
        assert!(!request.folders[1].is_read);
    }

    #[test]
    fn test_moving_back_clears_is_read() {
        let mut session = session(false);
        let recorder = ReadStateRecorder::spawn(MemoryStore::new());
        session.pagination_mut().jump_to_last();
        recorder.record_index_change(&mut session).unwrap();
        assert!(session.folder().is_read);

        session.pagination_mut().retreat();
        recorder.record_index_change(&mut session).unwrap();
        assert!(!session.folder().is_read);
    }

    #[test]
    fn test_uninitialized_session_records_nothing() {
        let folder = Folder::new("1", "/lib/vol1", None).unwrap();
        let session = ReadingSession::new(folder, None, User::default());
        assert!(on_index_changed(&session).is_none());
        assert!(on_mode_toggled(&session).is_none());
    }

    #[test]
    fn test_merge_keeps_newest_records() {
        let mut older = on_index_changed(&session(true)).unwrap();
        let mut newer_session = session(true);
        newer_session.pagination_mut().advance();
        let mut newer = on_index_changed(&newer_session).unwrap();
        newer.session = older.session;

        older.merge(newer);
        assert_eq!(older.folders.len(), 2);
        assert_eq!(older.index, Some(1));
        assert_eq!(older.folders[0].last_read_path(), Some("/lib/vol1/p1.png"));
    }

    #[async_std::test]
    async fn test_optimistic_update_and_flush() {
        let store = MemoryStore::new();
        let recorder = ReadStateRecorder::spawn(store.clone());
        let mut session = session(true);

        session.pagination_mut().advance();
        assert!(recorder.record_index_change(&mut session).unwrap());
        assert_eq!(session.folder().last_read_path(), Some("/lib/vol1/p1.png"));
        assert_eq!(session.parent().unwrap().last_read_path(), Some("/lib/vol1/p1.png"));

        session.pagination_mut().advance();
        recorder.record_index_change(&mut session).unwrap();
        recorder.flush().await.unwrap();

        let stored = store.get_folder_by_path("/lib/vol1").await.unwrap();
        assert_eq!(stored.last_read_path(), Some("/lib/vol1/p2.png"));
        let parent = store.get_folder_by_path("/lib").await.unwrap();
        assert_eq!(parent.last_read_path(), Some("/lib/vol1/p2.png"));

        let reports = recorder.drain_reports();
        assert!(!reports.is_empty());
        assert!(reports.iter().all(|r| r.result.is_ok()));
        assert_eq!(reports.last().unwrap().index, Some(2));
    }

    #[async_std::test]
    async fn test_mode_toggle_is_persisted() {
        let store = MemoryStore::new();
        let recorder = ReadStateRecorder::spawn(store.clone());
        let mut session = session(true);

        session.pagination_mut().toggle_double_mode();
        recorder.record_mode_toggle(&mut session).unwrap();
        let reports = recorder.shutdown().await;

        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].folder_paths, vec!["/lib/vol1".to_string()]);
        assert!(store.get_folder_by_path("/lib/vol1").await.unwrap().is_double_panels);
    }

    #[async_std::test]
    async fn test_turns_during_a_write_merge_into_one_follow_up() {
        let store = SlowStore::new(MemoryStore::new(), Duration::from_millis(100));
        let recorder = ReadStateRecorder::spawn(store.clone());
        let mut session = session(true);

        session.pagination_mut().advance();
        recorder.record_index_change(&mut session).unwrap();
        task::sleep(Duration::from_millis(20)).await;
        for _ in 0..2 {
            session.pagination_mut().advance();
            recorder.record_index_change(&mut session).unwrap();
        }
        recorder.flush().await.unwrap();

        let writes = store.writes();
        assert!(writes.len() <= 2);
        assert_eq!(store.max_in_flight(), 1);

        let last = writes.last().unwrap();
        assert_eq!(last.len(), 2);
        assert_eq!(last[0].last_read_path(), Some("/lib/vol1/p3.png"));
        assert!(last[0].is_read);
        assert_eq!(last[1].last_read_path(), Some("/lib/vol1/p3.png"));
        assert_eq!(recorder.drain_reports().last().unwrap().index, Some(3));
    }
}
