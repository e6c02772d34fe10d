use review_client::{ErrorSeverity, GatewayError};
use review_types::{TestCaseField, TestCaseId};
use thiserror::Error;

use crate::editor::EditorStatus;

/// Misuse of the draft editor
#[derive(Error, Debug, PartialEq)]
pub enum EditorError {
    #[error("Cannot {operation} while the editor is {state}")]
    InvalidState {
        operation: &'static str,
        state: EditorStatus,
    },

    #[error("Invalid value '{value}' for field {field}: expected true or false")]
    InvalidValue { field: TestCaseField, value: String },

    #[error("Unknown test case field: {0}")]
    UnknownField(String),
}

impl EditorError {
    pub fn invalid_state(operation: &'static str, state: EditorStatus) -> Self {
        Self::InvalidState { operation, state }
    }
}

/// Errors returned by [`crate::ReviewSession`] operations
#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Editor(#[from] EditorError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("No prompt is selected")]
    NoActivePrompt,

    #[error("Test case {id} is not in the current collection")]
    RowNotFound { id: TestCaseId },

    #[error("Test cases for the selected prompt have not been loaded")]
    CollectionNotLoaded,
}

impl SessionError {
    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Gateway(err) => err.severity(),
            Self::Editor(_)
            | Self::NoActivePrompt
            | Self::RowNotFound { .. }
            | Self::CollectionNotLoaded => ErrorSeverity::Warning,
        }
    }

    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            Self::Gateway(err) => err.user_message(),
            other => other.to_string(),
        }
    }
}
