//! Collection store for the active prompt
//!
//! Loads are tagged with a [`LoadTicket`]. Only the ticket issued last is
//! applied; any other result is dropped when it arrives, whatever order the
//! responses come back in. A load replaces the collection and the metric in
//! one step, and a failed load leaves both untouched.

use review_client::{GatewayError, TestCaseGateway};
use review_types::{PromptId, TestCase, TestCaseId, TestCaseList};
use std::collections::HashSet;
use tracing::{debug, info, instrument, warn};

use crate::metric::resolve_metric;

/// Identifies one issued load request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket {
    prompt_id: PromptId,
    seq: u64,
}

impl LoadTicket {
    pub fn prompt_id(&self) -> PromptId {
        self.prompt_id
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }
}

/// What a display should render for the collection
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CollectionView<'a> {
    /// Nothing loaded for the active prompt yet, or the first load failed
    NoData,
    /// Loaded, and the prompt has no test cases
    Empty,
    /// Loaded test cases in server order
    Rows(&'a [TestCase]),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Applied,
    /// A newer load was issued; the result was dropped
    Stale,
}

/// Owns the test cases of the active prompt and their aggregate metric
#[derive(Debug, Default)]
pub struct TestCaseStore {
    prompt_id: Option<PromptId>,
    items: Option<Vec<TestCase>>,
    percent_correct: Option<f64>,
    latest_seq: u64,
}

impl TestCaseStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prompt_id(&self) -> Option<PromptId> {
        self.prompt_id
    }

    /// Current metric, `None` while unknown
    pub fn percent_correct(&self) -> Option<f64> {
        self.percent_correct
    }

    pub fn items(&self) -> &[TestCase] {
        self.items.as_deref().unwrap_or_default()
    }

    pub fn has_data(&self) -> bool {
        self.items.is_some()
    }

    pub fn view(&self) -> CollectionView<'_> {
        match self.items.as_deref() {
            None => CollectionView::NoData,
            Some([]) => CollectionView::Empty,
            Some(rows) => CollectionView::Rows(rows),
        }
    }

    pub fn get(&self, id: TestCaseId) -> Option<&TestCase> {
        self.items().iter().find(|case| case.id == Some(id))
    }

    /// Forget the collection and metric and bind the store to `prompt_id`.
    ///
    /// Loads issued before the reset become stale.
    pub fn reset(&mut self, prompt_id: Option<PromptId>) {
        debug!(from = ?self.prompt_id, to = ?prompt_id, "Resetting collection");
        self.prompt_id = prompt_id;
        self.items = None;
        self.percent_correct = None;
        self.latest_seq += 1;
    }

    /// Issue a load for `prompt_id`, superseding every earlier ticket.
    ///
    /// Switching to another prompt resets the store first.
    pub fn begin_load(&mut self, prompt_id: PromptId) -> LoadTicket {
        if self.prompt_id != Some(prompt_id) {
            self.reset(Some(prompt_id));
        }
        self.latest_seq += 1;
        let ticket = LoadTicket {
            prompt_id,
            seq: self.latest_seq,
        };
        debug!(prompt_id, seq = ticket.seq, "Issued load");
        ticket
    }

    pub fn is_current(&self, ticket: LoadTicket) -> bool {
        ticket.seq == self.latest_seq && self.prompt_id == Some(ticket.prompt_id)
    }

    /// Apply the gateway's answer for `ticket`.
    ///
    /// Stale answers are dropped, errors included. A current error leaves the
    /// collection and metric as they were and is handed back.
    pub fn finish_load(
        &mut self,
        ticket: LoadTicket,
        result: Result<TestCaseList, GatewayError>,
    ) -> Result<LoadOutcome, GatewayError> {
        if !self.is_current(ticket) {
            debug!(
                prompt_id = ticket.prompt_id,
                seq = ticket.seq,
                latest = self.latest_seq,
                "Dropping stale load result"
            );
            return Ok(LoadOutcome::Stale);
        }

        let list = result.inspect_err(|err| {
            warn!(prompt_id = ticket.prompt_id, error = %err, "Load failed, keeping previous collection");
        })?;

        warn_on_duplicate_ids(&list.test_cases);
        let percent_correct = resolve_metric(list.percent_correct, &list.test_cases);
        info!(
            prompt_id = ticket.prompt_id,
            count = list.test_cases.len(),
            percent_correct,
            server_metric = list.percent_correct.is_some(),
            "Collection loaded"
        );
        self.items = Some(list.test_cases);
        self.percent_correct = Some(percent_correct);
        Ok(LoadOutcome::Applied)
    }

    /// Issue a load and apply its result
    #[instrument(skip(self, gateway))]
    pub async fn load(
        &mut self,
        gateway: &dyn TestCaseGateway,
        prompt_id: PromptId,
    ) -> Result<LoadOutcome, GatewayError> {
        let ticket = self.begin_load(prompt_id);
        let result = gateway.list_for_prompt(prompt_id).await;
        self.finish_load(ticket, result)
    }

    /// Replace the record with the same id in place, or append it.
    ///
    /// `server_percent` is the server's metric when the response carried one.
    /// Nothing is applied while the collection is unknown; returns whether
    /// the record was stored.
    pub fn apply_upsert_result(&mut self, record: TestCase, server_percent: Option<f64>) -> bool {
        let Some(items) = self.items.as_mut() else {
            warn!(id = ?record.id, "No collection loaded, not applying saved test case");
            return false;
        };
        let slot = record
            .id
            .and_then(|id| items.iter().position(|case| case.id == Some(id)));
        match slot {
            Some(index) => {
                debug!(id = ?record.id, index, "Replacing test case");
                items[index] = record;
            }
            None => {
                debug!(id = ?record.id, "Appending test case");
                items.push(record);
            }
        }
        self.refresh_metric(server_percent);
        true
    }

    /// Remove the record with `id`; absent ids are a no-op.
    ///
    /// Returns whether a record was removed.
    pub fn apply_remove_result(&mut self, id: TestCaseId) -> bool {
        let Some(items) = self.items.as_mut() else {
            return false;
        };
        let before = items.len();
        items.retain(|case| case.id != Some(id));
        let removed = items.len() != before;
        debug!(id, removed, "Applied removal");
        self.refresh_metric(None);
        removed
    }

    fn refresh_metric(&mut self, server_percent: Option<f64>) {
        if let Some(items) = self.items.as_deref() {
            self.percent_correct = Some(resolve_metric(server_percent, items));
        }
    }
}

fn warn_on_duplicate_ids(test_cases: &[TestCase]) {
    let mut seen = HashSet::with_capacity(test_cases.len());
    for id in test_cases.iter().filter_map(|case| case.id) {
        if !seen.insert(id) {
            warn!(id, "Server returned duplicate test case id");
        }
    }
}
