//! In-memory reading state: panel sequence, pagination and the session
//! aggregate that ties them to a folder.

pub mod pagination;
pub mod sequence;
pub mod session;

pub use pagination::{NavOutcome, PaginationController, PaginationState};
pub use sequence::{PageMode, PanelPair, PanelSequence};
pub use session::{HydrationFlag, ReadingSession, SessionId};
