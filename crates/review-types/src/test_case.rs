//! Test case records exchanged with the evaluation backend
//!
//! Field names match the wire format exactly. Unknown fields are ignored on
//! decode; a missing required field or a field of the wrong primitive kind
//! is a decode failure.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::PromptId;

/// Server-assigned test case identifier, unique within a prompt's collection
pub type TestCaseId = i64;

/// One evaluated prompt input with its recorded output and verdict
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    /// Absent for a record that has not been created yet
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<TestCaseId>,
    /// The evaluated prompt input
    pub input: String,
    /// The recorded/expected output
    pub output: String,
    /// Whether the output was judged correct
    pub is_correct: bool,
    /// Rationale for the correctness judgement
    pub reason: String,
    /// Owning prompt, sent on create so the backend can attach the record
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_id: Option<PromptId>,
}

impl TestCase {
    /// Create an unsaved test case (no id yet)
    pub fn new(
        input: impl Into<String>,
        output: impl Into<String>,
        is_correct: bool,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            input: input.into(),
            output: output.into(),
            is_correct,
            reason: reason.into(),
            prompt_id: None,
        }
    }

    /// Set the server id
    pub fn with_id(mut self, id: TestCaseId) -> Self {
        self.id = Some(id);
        self
    }

    /// Attach the record to a prompt
    pub fn with_prompt(mut self, prompt_id: PromptId) -> Self {
        self.prompt_id = Some(prompt_id);
        self
    }

    /// Whether the record already exists server-side
    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }

    /// Render a field as the text an operator would edit
    pub fn field_text(&self, field: TestCaseField) -> String {
        match field {
            TestCaseField::Input => self.input.clone(),
            TestCaseField::Output => self.output.clone(),
            TestCaseField::IsCorrect => self.is_correct.to_string(),
            TestCaseField::Reason => self.reason.clone(),
        }
    }
}

/// Editable fields of a [`TestCase`]
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum TestCaseField {
    #[strum(serialize = "input")]
    Input,
    #[strum(serialize = "output")]
    Output,
    #[strum(serialize = "is_correct")]
    IsCorrect,
    #[strum(serialize = "reason")]
    Reason,
}

/// Payload of `GET /prompts/{id}/testcases`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestCaseList {
    /// Test cases in server order
    pub test_cases: Vec<TestCase>,
    /// Server-computed score, preferred over a local recomputation
    #[serde(default)]
    pub percent_correct: Option<f64>,
}
