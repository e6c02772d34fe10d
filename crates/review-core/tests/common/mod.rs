//! Scripted in-memory gateway for session tests.
//!
//! Each prompt can be gated: its listing blocks until [`MockGateway::release`]
//! is called, which lets tests control the order responses arrive in.

use async_trait::async_trait;
use review_client::{GatewayError, Result, TestCaseGateway};
use review_types::{ImprovedPrompt, Prompt, PromptId, TestCase, TestCaseId, TestCaseList};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

#[derive(Debug, Clone, Copy)]
pub enum Fail {
    Network,
    Server(u16),
    Decode,
}

impl Fail {
    fn into_error(self) -> GatewayError {
        match self {
            Fail::Network => GatewayError::network("connection refused"),
            Fail::Server(status) => GatewayError::server(status, "scripted failure"),
            Fail::Decode => GatewayError::decode("scripted bad payload"),
        }
    }
}

#[derive(Default)]
struct MockState {
    prompts: Vec<Prompt>,
    cases: HashMap<PromptId, Vec<TestCase>>,
    server_percent: HashMap<PromptId, f64>,
    gates: HashMap<PromptId, Arc<Notify>>,
    list_failures: HashMap<PromptId, Fail>,
    upsert_failure: Option<Fail>,
    remove_failure: Option<Fail>,
    next_id: TestCaseId,
    calls: Vec<String>,
}

#[derive(Default)]
pub struct MockGateway {
    state: Mutex<MockState>,
}

impl MockGateway {
    pub fn new() -> Self {
        let gateway = Self::default();
        gateway.state.lock().unwrap().next_id = 100;
        gateway
    }

    pub fn with_prompt(self, prompt: Prompt, cases: Vec<TestCase>) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            let cases = cases
                .into_iter()
                .map(|case| case.with_prompt(prompt.id))
                .collect();
            state.cases.insert(prompt.id, cases);
            state.prompts.push(prompt);
        }
        self
    }

    /// Report `percent` as the server metric for `prompt_id`
    pub fn with_server_percent(self, prompt_id: PromptId, percent: f64) -> Self {
        self.state
            .lock()
            .unwrap()
            .server_percent
            .insert(prompt_id, percent);
        self
    }

    /// Hold listings of `prompt_id` until released
    pub fn gate(&self, prompt_id: PromptId) {
        self.state
            .lock()
            .unwrap()
            .gates
            .insert(prompt_id, Arc::new(Notify::new()));
    }

    /// Let one held listing of `prompt_id` through
    pub fn release(&self, prompt_id: PromptId) {
        if let Some(gate) = self.state.lock().unwrap().gates.get(&prompt_id) {
            gate.notify_one();
        }
    }

    pub fn fail_list(&self, prompt_id: PromptId, fail: Option<Fail>) {
        let mut state = self.state.lock().unwrap();
        match fail {
            Some(fail) => state.list_failures.insert(prompt_id, fail),
            None => state.list_failures.remove(&prompt_id),
        };
    }

    pub fn fail_upsert(&self, fail: Option<Fail>) {
        self.state.lock().unwrap().upsert_failure = fail;
    }

    pub fn fail_remove(&self, fail: Option<Fail>) {
        self.state.lock().unwrap().remove_failure = fail;
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn stored(&self, prompt_id: PromptId) -> Vec<TestCase> {
        self.state
            .lock()
            .unwrap()
            .cases
            .get(&prompt_id)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl TestCaseGateway for MockGateway {
    async fn list_prompts(&self) -> Result<Vec<Prompt>> {
        let mut state = self.state.lock().unwrap();
        state.calls.push("list_prompts".to_string());
        Ok(state.prompts.clone())
    }

    async fn list_for_prompt(&self, prompt_id: PromptId) -> Result<TestCaseList> {
        let gate = {
            let mut state = self.state.lock().unwrap();
            state.calls.push(format!("list:{prompt_id}"));
            state.gates.get(&prompt_id).cloned()
        };
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let state = self.state.lock().unwrap();
        if let Some(fail) = state.list_failures.get(&prompt_id) {
            return Err(fail.into_error());
        }
        Ok(TestCaseList {
            test_cases: state.cases.get(&prompt_id).cloned().unwrap_or_default(),
            percent_correct: state.server_percent.get(&prompt_id).copied(),
        })
    }

    async fn upsert(&self, mut record: TestCase) -> Result<TestCase> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("upsert:{:?}", record.id));
        if let Some(fail) = state.upsert_failure {
            return Err(fail.into_error());
        }

        record.reason = record.reason.trim().to_string();
        match record.id {
            Some(id) => {
                let slot = state
                    .cases
                    .values_mut()
                    .flat_map(|cases| cases.iter_mut())
                    .find(|case| case.id == Some(id))
                    .ok_or_else(|| GatewayError::not_found(id))?;
                record.prompt_id = slot.prompt_id;
                *slot = record.clone();
            }
            None => {
                record.id = Some(state.next_id);
                state.next_id += 1;
                let prompt_id = record.prompt_id.unwrap_or_default();
                state.cases.entry(prompt_id).or_default().push(record.clone());
            }
        }
        Ok(record)
    }

    async fn remove(&self, id: TestCaseId) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("remove:{id}"));
        if let Some(fail) = state.remove_failure {
            return Err(fail.into_error());
        }

        let mut removed = false;
        for cases in state.cases.values_mut() {
            let before = cases.len();
            cases.retain(|case| case.id != Some(id));
            removed |= cases.len() != before;
        }
        if removed {
            Ok(())
        } else {
            Err(GatewayError::not_found(id))
        }
    }

    async fn improve_prompt(&self, prompt_id: PromptId) -> Result<ImprovedPrompt> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("improve:{prompt_id}"));
        let prompt = state
            .prompts
            .iter()
            .find(|prompt| prompt.id == prompt_id)
            .ok_or_else(|| GatewayError::server(404, "no such prompt"))?;
        Ok(ImprovedPrompt {
            improved_prompt: format!("{} Show your work.", prompt.prompt_text),
        })
    }
}

pub fn arithmetic_prompt() -> Prompt {
    Prompt::new(1, "arithmetic", "Add the numbers.", "gemini-1.5-flash")
}

pub fn empty_prompt() -> Prompt {
    Prompt::new(2, "empty", "Nothing yet.", "gemini-1.5-pro")
}

pub fn spelling_prompt() -> Prompt {
    Prompt::new(3, "spelling", "Spell the word.", "gemini-1.5-pro")
}

/// The two arithmetic cases: one correct, one wrong
pub fn arithmetic_cases() -> Vec<TestCase> {
    vec![
        TestCase::new("2+2", "4", true, "ok").with_id(1),
        TestCase::new("2+3", "6", false, "wrong").with_id(2),
    ]
}

pub fn spelling_cases() -> Vec<TestCase> {
    vec![TestCase::new("recieve", "receive", true, "ok").with_id(7)]
}

pub fn scripted_gateway() -> MockGateway {
    MockGateway::new()
        .with_prompt(arithmetic_prompt(), arithmetic_cases())
        .with_prompt(empty_prompt(), vec![])
        .with_prompt(spelling_prompt(), spelling_cases())
}
