//! Service layer: the reading engine and the collaborators it drives.

pub mod browse_service;
pub mod lineage;
pub mod navigation_service;
pub mod read_state_service;
pub mod reconcile_service;
pub mod watch_service;

pub use browse_service::FolderBrowser;
pub use navigation_service::{Command, CommandOutcome, ReaderEngine, WriteWarning};
pub use read_state_service::{PersistRequest, ReadStateRecorder, WriteReport};
pub use reconcile_service::{
    CachedListing, ReconcileOutcome, StaleDirectoryReconciler, StalenessVerdict,
};
pub use watch_service::{DirectoryWatcher, WatchDebouncer};
