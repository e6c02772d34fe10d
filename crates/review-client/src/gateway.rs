use async_trait::async_trait;
use review_types::{ImprovedPrompt, Prompt, PromptId, TestCase, TestCaseId, TestCaseList};

use crate::error::Result;

/// Remote test-case collection, one request per call.
///
/// Implementations hold no review state and never retry; the caller decides
/// what a failure means for its own state.
#[async_trait]
pub trait TestCaseGateway: Send + Sync {
    /// `GET /prompts`
    async fn list_prompts(&self) -> Result<Vec<Prompt>>;

    /// `GET /prompts/{id}/testcases`
    ///
    /// Every returned record carries a server id.
    async fn list_for_prompt(&self, prompt_id: PromptId) -> Result<TestCaseList>;

    /// `POST /testcase` with the complete record.
    ///
    /// Creates when `record.id` is absent, updates otherwise, and returns the
    /// server's canonical record.
    async fn upsert(&self, record: TestCase) -> Result<TestCase>;

    /// `DELETE /testcase/{id}`
    async fn remove(&self, id: TestCaseId) -> Result<()>;

    /// `GET /prompts/{id}/improve`
    async fn improve_prompt(&self, prompt_id: PromptId) -> Result<ImprovedPrompt>;
}
