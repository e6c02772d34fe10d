//! Draft editor for a single test case
//!
//! The editor owns a private copy of the record being edited. The stored
//! record is never touched from here; it is replaced only after the server
//! has accepted the draft.
//!
//! ```text
//! Closed --open--> Open --begin_submit--> Submitting --ok--> Closed
//!                   ^  \                       |
//!                   |   discard --> Closed     | err
//!                   +--------------------------+
//! ```

use review_client::{GatewayError, TestCaseGateway};
use review_types::{TestCase, TestCaseField};
use std::str::FromStr;
use strum::Display;
use tracing::{debug, info, warn};

use crate::error::{EditorError, SessionError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum EditorStatus {
    #[strum(to_string = "closed")]
    Closed,
    #[strum(to_string = "open")]
    Open,
    #[strum(to_string = "submitting")]
    Submitting,
}

#[derive(Debug, Clone, Default, PartialEq)]
enum EditorState {
    #[default]
    Closed,
    Open(TestCase),
    Submitting(TestCase),
}

/// Result of resolving an in-flight submission
#[derive(Debug)]
pub enum SubmitOutcome {
    /// The server accepted the draft; this is its canonical record
    Saved(TestCase),
    /// The server call failed; the draft is open again with the edits intact
    Failed(GatewayError),
    /// No submission was pending (the editor was reset meanwhile)
    Ignored,
}

/// Holds at most one draft and applies field-level edits to it
#[derive(Debug, Default)]
pub struct DraftEditor {
    state: EditorState,
}

impl DraftEditor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> EditorStatus {
        match self.state {
            EditorState::Closed => EditorStatus::Closed,
            EditorState::Open(_) => EditorStatus::Open,
            EditorState::Submitting(_) => EditorStatus::Submitting,
        }
    }

    /// The draft being edited or submitted, if any
    pub fn draft(&self) -> Option<&TestCase> {
        match &self.state {
            EditorState::Closed => None,
            EditorState::Open(draft) | EditorState::Submitting(draft) => Some(draft),
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state, EditorState::Open(_))
    }

    /// Start editing a copy of `record`.
    ///
    /// An already open draft is replaced without merging. Opening is refused
    /// while a submission is pending.
    pub fn open(&mut self, record: &TestCase) -> Result<(), EditorError> {
        match self.state {
            EditorState::Submitting(_) => {
                Err(EditorError::invalid_state("open a draft", self.status()))
            }
            EditorState::Open(ref previous) => {
                debug!(previous = ?previous.id, next = ?record.id, "Replacing open draft");
                self.state = EditorState::Open(record.clone());
                Ok(())
            }
            EditorState::Closed => {
                debug!(id = ?record.id, "Opened draft");
                self.state = EditorState::Open(record.clone());
                Ok(())
            }
        }
    }

    /// Set one field of the open draft.
    ///
    /// `is_correct` accepts `true`/`false` (case-insensitive); every other
    /// field stores the text verbatim.
    pub fn set_field(&mut self, field: TestCaseField, value: &str) -> Result<(), EditorError> {
        let status = self.status();
        let EditorState::Open(draft) = &mut self.state else {
            return Err(EditorError::invalid_state("edit a field", status));
        };

        match field {
            TestCaseField::Input => draft.input = value.to_string(),
            TestCaseField::Output => draft.output = value.to_string(),
            TestCaseField::Reason => draft.reason = value.to_string(),
            TestCaseField::IsCorrect => draft.is_correct = parse_flag(field, value)?,
        }
        Ok(())
    }

    /// Set a field addressed by its wire name
    pub fn set_field_by_name(&mut self, name: &str, value: &str) -> Result<(), EditorError> {
        let field = TestCaseField::from_str(name)
            .map_err(|_| EditorError::UnknownField(name.to_string()))?;
        self.set_field(field, value)
    }

    /// Move the open draft to `Submitting` and hand out the complete record
    /// to send.
    pub fn begin_submit(&mut self) -> Result<TestCase, EditorError> {
        match std::mem::take(&mut self.state) {
            EditorState::Open(draft) => {
                info!(id = ?draft.id, "Submitting draft");
                self.state = EditorState::Submitting(draft.clone());
                Ok(draft)
            }
            other => {
                self.state = other;
                Err(EditorError::invalid_state("submit", self.status()))
            }
        }
    }

    /// Resolve the pending submission with the gateway's answer
    pub fn finish_submit(&mut self, result: Result<TestCase, GatewayError>) -> SubmitOutcome {
        let draft = match std::mem::take(&mut self.state) {
            EditorState::Submitting(draft) => draft,
            other => {
                debug!("Dropping submission result, nothing was pending");
                self.state = other;
                return SubmitOutcome::Ignored;
            }
        };

        match result {
            Ok(canonical) => {
                info!(id = ?canonical.id, "Draft saved");
                SubmitOutcome::Saved(canonical)
            }
            Err(err) => {
                warn!(id = ?draft.id, error = %err, "Draft submission failed, keeping edits");
                self.state = EditorState::Open(draft);
                SubmitOutcome::Failed(err)
            }
        }
    }

    /// Submit the open draft and wait for the server's answer
    pub async fn submit(&mut self, gateway: &dyn TestCaseGateway) -> Result<TestCase, SessionError> {
        let draft = self.begin_submit()?;
        match self.finish_submit(gateway.upsert(draft).await) {
            SubmitOutcome::Saved(record) => Ok(record),
            SubmitOutcome::Failed(err) => Err(err.into()),
            SubmitOutcome::Ignored => Err(EditorError::invalid_state("submit", self.status()).into()),
        }
    }

    /// Drop the open draft without any network effect
    pub fn discard(&mut self) -> Result<(), EditorError> {
        match self.state {
            EditorState::Open(ref draft) => {
                debug!(id = ?draft.id, "Discarded draft");
                self.state = EditorState::Closed;
                Ok(())
            }
            _ => Err(EditorError::invalid_state("discard", self.status())),
        }
    }

    /// Close unconditionally, abandoning any pending submission
    pub(crate) fn reset(&mut self) {
        self.state = EditorState::Closed;
    }
}

fn parse_flag(field: TestCaseField, value: &str) -> Result<bool, EditorError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(EditorError::InvalidValue {
            field,
            value: value.to_string(),
        }),
    }
}
