use serde::{Deserialize, Serialize};

/// Prompt identifier as issued by the backend
pub type PromptId = i64;

/// A prompt under evaluation, as listed by `GET /prompts`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prompt {
    pub id: PromptId,
    /// Display name
    #[serde(rename = "prompt_name")]
    pub name: String,
    /// The prompt template text
    #[serde(rename = "prompt")]
    pub prompt_text: String,
    pub model_name: String,
    /// Logging process that produced the prompt's test cases
    #[serde(default)]
    pub process_id: Option<i64>,
}

impl Prompt {
    pub fn new(
        id: PromptId,
        name: impl Into<String>,
        prompt_text: impl Into<String>,
        model_name: impl Into<String>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            prompt_text: prompt_text.into(),
            model_name: model_name.into(),
            process_id: None,
        }
    }
}

/// Payload of `GET /prompts/{id}/improve`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImprovedPrompt {
    pub improved_prompt: String,
}
