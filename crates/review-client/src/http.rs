//! reqwest-backed gateway
//!
//! Bodies are read as text and decoded with `serde_json` so a transport
//! failure and a malformed payload stay distinguishable.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use review_constants::{IMPROVE_SEGMENT, PROMPTS_PATH, TEST_CASES_SEGMENT, TEST_CASE_PATH};
use review_types::{ImprovedPrompt, Prompt, PromptId, TestCase, TestCaseId, TestCaseList};
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument, warn};

use crate::config::ClientConfig;
use crate::error::{GatewayError, Result};
use crate::gateway::TestCaseGateway;

/// Gateway talking to the evaluation backend over HTTP
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: Client,
    base_url: Url,
}

impl HttpGateway {
    /// Create a gateway for the configured backend
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| GatewayError::invalid_url(&config.base_url, e.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(GatewayError::invalid_url(
                &config.base_url,
                "URL cannot carry a path",
            ));
        }

        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| GatewayError::network_with_source("Failed to build HTTP client", e))?;

        info!(base_url = %base_url, "HTTP gateway ready");
        Ok(Self { client, base_url })
    }

    /// Base URL requests are resolved against
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| GatewayError::invalid_url(self.base_url.as_str(), "URL cannot carry a path"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Send a request and return the status with the body text
    async fn send(&self, request: RequestBuilder) -> Result<(StatusCode, String)> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        debug!(%status, body_len = body.len(), "Backend responded");
        Ok((status, body))
    }

    /// Send a request that must succeed and return its body text
    async fn send_ok(&self, request: RequestBuilder) -> Result<String> {
        let (status, body) = self.send(request).await?;
        if !status.is_success() {
            warn!(%status, "Backend returned non-success status");
            return Err(GatewayError::server(status.as_u16(), body));
        }
        Ok(body)
    }
}

fn decode<T: DeserializeOwned>(body: &str, what: &str) -> Result<T> {
    serde_json::from_str(body)
        .map_err(|e| GatewayError::decode_with_source(format!("invalid {what} payload: {e}"), e))
}

/// Records coming back from the server must carry their id
fn require_id(record: &TestCase) -> Result<()> {
    if record.id.is_none() {
        return Err(GatewayError::decode("test case record is missing its id"));
    }
    Ok(())
}

fn is_missing(status: StatusCode) -> bool {
    status == StatusCode::NOT_FOUND || status == StatusCode::GONE
}

#[async_trait]
impl TestCaseGateway for HttpGateway {
    #[instrument(skip(self))]
    async fn list_prompts(&self) -> Result<Vec<Prompt>> {
        let url = self.endpoint(&[PROMPTS_PATH])?;
        let body = self.send_ok(self.client.get(url)).await?;
        let prompts: Vec<Prompt> = decode(&body, "prompt list")?;
        info!(count = prompts.len(), "Fetched prompts");
        Ok(prompts)
    }

    #[instrument(skip(self))]
    async fn list_for_prompt(&self, prompt_id: PromptId) -> Result<TestCaseList> {
        let id = prompt_id.to_string();
        let url = self.endpoint(&[PROMPTS_PATH, &id, TEST_CASES_SEGMENT])?;
        let body = self.send_ok(self.client.get(url)).await?;
        let list: TestCaseList = decode(&body, "test case list")?;
        for record in &list.test_cases {
            require_id(record)?;
        }
        info!(
            count = list.test_cases.len(),
            percent_correct = ?list.percent_correct,
            "Fetched test cases"
        );
        Ok(list)
    }

    #[instrument(skip(self, record), fields(id = ?record.id))]
    async fn upsert(&self, record: TestCase) -> Result<TestCase> {
        let url = self.endpoint(&[TEST_CASE_PATH])?;
        let (status, body) = self.send(self.client.post(url).json(&record)).await?;
        if let (Some(id), true) = (record.id, is_missing(status)) {
            warn!(id, "Update target no longer exists");
            return Err(GatewayError::not_found(id));
        }
        if !status.is_success() {
            warn!(%status, "Backend rejected test case");
            return Err(GatewayError::server(status.as_u16(), body));
        }

        let canonical: TestCase = decode(&body, "test case")?;
        require_id(&canonical)?;
        info!(id = ?canonical.id, created = !record.is_persisted(), "Saved test case");
        Ok(canonical)
    }

    #[instrument(skip(self))]
    async fn remove(&self, id: TestCaseId) -> Result<()> {
        let segment = id.to_string();
        let url = self.endpoint(&[TEST_CASE_PATH, &segment])?;
        let (status, body) = self.send(self.client.delete(url)).await?;
        if is_missing(status) {
            warn!(id, "Delete target no longer exists");
            return Err(GatewayError::not_found(id));
        }
        if !status.is_success() {
            return Err(GatewayError::server(status.as_u16(), body));
        }
        info!(id, "Deleted test case");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn improve_prompt(&self, prompt_id: PromptId) -> Result<ImprovedPrompt> {
        let id = prompt_id.to_string();
        let url = self.endpoint(&[PROMPTS_PATH, &id, IMPROVE_SEGMENT])?;
        let body = self.send_ok(self.client.get(url)).await?;
        decode(&body, "improved prompt")
    }
}
