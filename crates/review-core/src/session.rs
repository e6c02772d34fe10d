//! Review session controller
//!
//! A [`ReviewSession`] binds the store and the editor to the active prompt.
//! Gateway calls run as spawned tokio tasks; each one sends a
//! [`SessionEvent`] back over a channel and the owner applies it on its own
//! task through [`ReviewSession::handle_event`]. All state mutation therefore
//! happens on a single control task.
//!
//! Results tied to a prompt that is no longer active are dropped: loads by
//! their [`LoadTicket`], mutations by the prompt epoch they were issued in.

use review_client::{ClientConfig, ErrorSeverity, GatewayError, TestCaseGateway};
use review_types::{
    ImprovedPrompt, Prompt, PromptId, TestCase, TestCaseField, TestCaseId, TestCaseList,
};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, error, info, warn, Level};

use crate::editor::{DraftEditor, SubmitOutcome};
use crate::error::SessionError;
use crate::store::{CollectionView, LoadOutcome, LoadTicket, TestCaseStore};

/// Behaviour switches for a session
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionConfig {
    /// Reload the collection after each successful submit/delete so the
    /// server's metric replaces the local recomputation
    pub reload_after_mutation: bool,
}

impl From<&ClientConfig> for SessionConfig {
    fn from(config: &ClientConfig) -> Self {
        Self {
            reload_after_mutation: config.reload_after_mutation,
        }
    }
}

/// Completion of a gateway call issued by the session
#[derive(Debug)]
pub enum SessionEvent {
    CollectionLoaded {
        ticket: LoadTicket,
        result: Result<TestCaseList, GatewayError>,
    },
    DraftSubmitted {
        epoch: u64,
        result: Result<TestCase, GatewayError>,
    },
    RowRemoved {
        epoch: u64,
        id: TestCaseId,
        result: Result<(), GatewayError>,
    },
    PromptImproved {
        prompt_id: PromptId,
        result: Result<ImprovedPrompt, GatewayError>,
    },
}

/// User-visible, non-fatal notification
#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub severity: ErrorSeverity,
    pub message: String,
}

impl Notice {
    fn from_gateway(context: &str, err: &GatewayError) -> Self {
        Self {
            severity: err.severity(),
            message: format!("{context}: {}", err.user_message()),
        }
    }
}

type MetricListener = Box<dyn FnMut(Option<f64>) + Send>;
type CollectionListener = Box<dyn FnMut(&CollectionView<'_>) + Send>;
type NoticeListener = Box<dyn FnMut(&Notice) + Send>;
type ImprovedListener = Box<dyn FnMut(&Prompt, &ImprovedPrompt) + Send>;

/// One operator's review session over the evaluation backend.
///
/// Methods that talk to the backend spawn onto the current tokio runtime and
/// must be called from within one.
pub struct ReviewSession {
    gateway: Arc<dyn TestCaseGateway>,
    config: SessionConfig,
    store: TestCaseStore,
    editor: DraftEditor,
    active_prompt: Option<Prompt>,
    epoch: u64,
    last_metric: Option<f64>,
    improved: Option<ImprovedPrompt>,
    in_flight: usize,
    events_tx: UnboundedSender<SessionEvent>,
    events_rx: UnboundedReceiver<SessionEvent>,
    metric_listeners: Vec<MetricListener>,
    collection_listeners: Vec<CollectionListener>,
    notice_listeners: Vec<NoticeListener>,
    improved_listeners: Vec<ImprovedListener>,
}

impl ReviewSession {
    pub fn new(gateway: Arc<dyn TestCaseGateway>, config: SessionConfig) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            gateway,
            config,
            store: TestCaseStore::new(),
            editor: DraftEditor::new(),
            active_prompt: None,
            epoch: 0,
            last_metric: None,
            improved: None,
            in_flight: 0,
            events_tx,
            events_rx,
            metric_listeners: Vec::new(),
            collection_listeners: Vec::new(),
            notice_listeners: Vec::new(),
            improved_listeners: Vec::new(),
        }
    }

    /// Called with every metric change, including the switch back to unknown
    /// when a prompt is selected
    pub fn on_metric_changed<F>(&mut self, listener: F)
    where
        F: FnMut(Option<f64>) + Send + 'static,
    {
        self.metric_listeners.push(Box::new(listener));
    }

    /// Called whenever the visible collection changes
    pub fn on_collection_changed<F>(&mut self, listener: F)
    where
        F: FnMut(&CollectionView<'_>) + Send + 'static,
    {
        self.collection_listeners.push(Box::new(listener));
    }

    /// Called with each user-visible failure notice
    pub fn on_notice<F>(&mut self, listener: F)
    where
        F: FnMut(&Notice) + Send + 'static,
    {
        self.notice_listeners.push(Box::new(listener));
    }

    /// Called when an improved version of the active prompt arrives
    pub fn on_prompt_improved<F>(&mut self, listener: F)
    where
        F: FnMut(&Prompt, &ImprovedPrompt) + Send + 'static,
    {
        self.improved_listeners.push(Box::new(listener));
    }

    pub fn active_prompt(&self) -> Option<&Prompt> {
        self.active_prompt.as_ref()
    }

    pub fn store(&self) -> &TestCaseStore {
        &self.store
    }

    pub fn editor(&self) -> &DraftEditor {
        &self.editor
    }

    pub fn view(&self) -> CollectionView<'_> {
        self.store.view()
    }

    pub fn percent_correct(&self) -> Option<f64> {
        self.store.percent_correct()
    }

    /// Last improved prompt received for the active prompt
    pub fn improved_prompt(&self) -> Option<&ImprovedPrompt> {
        self.improved.as_ref()
    }

    /// Whether gateway calls are still outstanding
    pub fn has_pending(&self) -> bool {
        self.in_flight > 0
    }

    /// Make `prompt` active and load its test cases.
    ///
    /// Always loads, even when the same prompt is selected again. The draft
    /// is dropped, the collection cleared and the metric reported as unknown
    /// before the load is issued.
    pub fn select_prompt(&mut self, prompt: Prompt) {
        info!(prompt_id = prompt.id, name = %prompt.name, "Selecting prompt");
        self.epoch += 1;
        self.editor.reset();
        self.improved = None;
        self.store.reset(Some(prompt.id));
        let ticket = self.store.begin_load(prompt.id);
        self.active_prompt = Some(prompt);

        self.last_metric = None;
        self.emit_metric(None);
        self.emit_collection();
        self.spawn_load(ticket);
    }

    /// Reload the active prompt's collection, keeping the current rows on
    /// screen until the answer arrives
    pub fn refresh(&mut self) -> Result<(), SessionError> {
        let prompt_id = self.active_prompt_id()?;
        let ticket = self.store.begin_load(prompt_id);
        self.spawn_load(ticket);
        Ok(())
    }

    /// Open `record` in the editor
    pub fn row_clicked(&mut self, record: &TestCase) -> Result<(), SessionError> {
        self.active_prompt_id()?;
        self.editor.open(record)?;
        Ok(())
    }

    /// Open the stored row with `id` in the editor
    pub fn open_row(&mut self, id: TestCaseId) -> Result<(), SessionError> {
        let record = self
            .store
            .get(id)
            .cloned()
            .ok_or(SessionError::RowNotFound { id })?;
        self.row_clicked(&record)
    }

    /// Open a blank draft that will be created under the active prompt.
    ///
    /// Refused until the prompt's collection has loaded.
    pub fn new_row(&mut self) -> Result<(), SessionError> {
        let prompt_id = self.active_prompt_id()?;
        if !self.store.has_data() {
            return Err(SessionError::CollectionNotLoaded);
        }
        self.editor
            .open(&TestCase::default().with_prompt(prompt_id))?;
        Ok(())
    }

    pub fn set_draft_field(&mut self, field: TestCaseField, value: &str) -> Result<(), SessionError> {
        self.editor.set_field(field, value)?;
        Ok(())
    }

    /// Send the draft to the backend; the editor stays `Submitting` until the
    /// answer is handled
    pub fn submit_draft(&mut self) -> Result<(), SessionError> {
        self.active_prompt_id()?;
        let draft = self.editor.begin_submit()?;
        let gateway = Arc::clone(&self.gateway);
        let epoch = self.epoch;
        self.dispatch(async move {
            SessionEvent::DraftSubmitted {
                epoch,
                result: gateway.upsert(draft).await,
            }
        });
        Ok(())
    }

    pub fn discard_draft(&mut self) -> Result<(), SessionError> {
        self.editor.discard()?;
        Ok(())
    }

    /// Delete the row with `id` server-side, then drop it locally
    pub fn row_delete_clicked(&mut self, id: TestCaseId) -> Result<(), SessionError> {
        self.active_prompt_id()?;
        info!(id, "Deleting test case");
        let gateway = Arc::clone(&self.gateway);
        let epoch = self.epoch;
        self.dispatch(async move {
            SessionEvent::RowRemoved {
                epoch,
                id,
                result: gateway.remove(id).await,
            }
        });
        Ok(())
    }

    /// Ask the backend for an improved version of the active prompt
    pub fn improve_prompt(&mut self) -> Result<(), SessionError> {
        let prompt_id = self.active_prompt_id()?;
        let gateway = Arc::clone(&self.gateway);
        self.dispatch(async move {
            SessionEvent::PromptImproved {
                prompt_id,
                result: gateway.improve_prompt(prompt_id).await,
            }
        });
        Ok(())
    }

    /// Wait for the next completed gateway call; `None` when nothing is
    /// outstanding
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        if self.in_flight == 0 {
            return None;
        }
        self.events_rx.recv().await
    }

    /// Apply a completed gateway call to the session state
    pub fn handle_event(&mut self, event: SessionEvent) {
        self.in_flight = self.in_flight.saturating_sub(1);
        match event {
            SessionEvent::CollectionLoaded { ticket, result } => {
                self.handle_loaded(ticket, result)
            }
            SessionEvent::DraftSubmitted { epoch, result } => self.handle_submitted(epoch, result),
            SessionEvent::RowRemoved { epoch, id, result } => {
                self.handle_removed(epoch, id, result)
            }
            SessionEvent::PromptImproved { prompt_id, result } => {
                self.handle_improved(prompt_id, result)
            }
        }
    }

    /// Handle events until no gateway call is outstanding
    pub async fn settle(&mut self) {
        while let Some(event) = self.next_event().await {
            self.handle_event(event);
        }
    }

    /// End the session. Outstanding calls finish but their results are lost.
    pub fn dispose(self) {
        info!(pending = self.in_flight, "Disposing review session");
    }

    fn active_prompt_id(&self) -> Result<PromptId, SessionError> {
        self.active_prompt
            .as_ref()
            .map(|prompt| prompt.id)
            .ok_or(SessionError::NoActivePrompt)
    }

    fn dispatch<F>(&mut self, call: F)
    where
        F: Future<Output = SessionEvent> + Send + 'static,
    {
        self.in_flight += 1;
        let events_tx = self.events_tx.clone();
        tokio::spawn(async move {
            if events_tx.send(call.await).is_err() {
                debug!("Session gone before gateway call completed");
            }
        });
    }

    fn spawn_load(&mut self, ticket: LoadTicket) {
        let gateway = Arc::clone(&self.gateway);
        self.dispatch(async move {
            SessionEvent::CollectionLoaded {
                ticket,
                result: gateway.list_for_prompt(ticket.prompt_id()).await,
            }
        });
    }

    fn reload_after_mutation(&mut self) {
        if !self.config.reload_after_mutation {
            return;
        }
        if let Some(prompt_id) = self.store.prompt_id() {
            let ticket = self.store.begin_load(prompt_id);
            self.spawn_load(ticket);
        }
    }

    fn handle_loaded(&mut self, ticket: LoadTicket, result: Result<TestCaseList, GatewayError>) {
        match self.store.finish_load(ticket, result) {
            Ok(LoadOutcome::Applied) => self.publish(),
            Ok(LoadOutcome::Stale) => {}
            Err(err) => self.notify(Notice::from_gateway("Loading test cases failed", &err)),
        }
    }

    fn handle_submitted(&mut self, epoch: u64, result: Result<TestCase, GatewayError>) {
        if epoch != self.epoch {
            debug!(epoch, current = self.epoch, "Dropping submission for inactive prompt");
            return;
        }
        match self.editor.finish_submit(result) {
            SubmitOutcome::Saved(record) => {
                if self.store.apply_upsert_result(record, None) {
                    self.publish();
                    self.reload_after_mutation();
                } else if let Some(prompt_id) = self.store.prompt_id() {
                    info!(prompt_id, "Saved without a loaded collection, reloading");
                    let ticket = self.store.begin_load(prompt_id);
                    self.spawn_load(ticket);
                }
            }
            SubmitOutcome::Failed(err) => {
                self.notify(Notice::from_gateway("Saving the test case failed", &err))
            }
            SubmitOutcome::Ignored => {}
        }
    }

    fn handle_removed(&mut self, epoch: u64, id: TestCaseId, result: Result<(), GatewayError>) {
        if epoch != self.epoch {
            debug!(epoch, id, "Dropping removal for inactive prompt");
            return;
        }
        match result {
            Ok(()) => {
                self.store.apply_remove_result(id);
                self.publish();
                self.reload_after_mutation();
            }
            Err(err) => self.notify(Notice::from_gateway("Deleting the test case failed", &err)),
        }
    }

    fn handle_improved(&mut self, prompt_id: PromptId, result: Result<ImprovedPrompt, GatewayError>) {
        let Some(prompt) = self.active_prompt.as_ref().filter(|p| p.id == prompt_id) else {
            debug!(prompt_id, "Dropping improvement for inactive prompt");
            return;
        };
        match result {
            Ok(improved) => {
                info!(prompt_id, "Received improved prompt");
                for listener in self.improved_listeners.iter_mut() {
                    listener(prompt, &improved);
                }
                self.improved = Some(improved);
            }
            Err(err) => self.notify(Notice::from_gateway("Improving the prompt failed", &err)),
        }
    }

    /// Push the current collection, and the metric if it moved, to listeners
    fn publish(&mut self) {
        self.emit_collection();
        let metric = self.store.percent_correct();
        if metric != self.last_metric {
            self.last_metric = metric;
            self.emit_metric(metric);
        }
    }

    fn emit_metric(&mut self, metric: Option<f64>) {
        debug!(?metric, "Metric changed");
        for listener in self.metric_listeners.iter_mut() {
            listener(metric);
        }
    }

    fn emit_collection(&mut self) {
        let view = self.store.view();
        for listener in self.collection_listeners.iter_mut() {
            listener(&view);
        }
    }

    fn notify(&mut self, notice: Notice) {
        if notice.severity.log_level() == Level::WARN {
            warn!("{}", notice.message);
        } else {
            error!("{}", notice.message);
        }
        for listener in self.notice_listeners.iter_mut() {
            listener(&notice);
        }
    }
}

impl std::fmt::Debug for ReviewSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReviewSession")
            .field("active_prompt", &self.active_prompt.as_ref().map(|p| p.id))
            .field("epoch", &self.epoch)
            .field("editor", &self.editor.status())
            .field("percent_correct", &self.store.percent_correct())
            .field("in_flight", &self.in_flight)
            .finish()
    }
}

impl Drop for ReviewSession {
    fn drop(&mut self) {
        if self.in_flight > 0 {
            warn!(pending = self.in_flight, "Review session dropped with calls outstanding");
        }
    }
}
