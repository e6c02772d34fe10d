//! # Review Core
//!
//! The test-case review-and-edit session: a collection store for the active
//! prompt, a draft editor for the one record being edited, and the session
//! controller binding both to the gateway and to whoever displays them.

pub mod editor;
pub mod error;
pub mod metric;
pub mod session;
pub mod store;

pub use editor::{DraftEditor, EditorStatus, SubmitOutcome};
pub use error::{EditorError, SessionError};
pub use metric::{recompute_metric, resolve_metric};
pub use session::{Notice, ReviewSession, SessionConfig, SessionEvent};
pub use store::{CollectionView, LoadOutcome, LoadTicket, TestCaseStore};
