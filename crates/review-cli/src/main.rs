use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use review_client::{ClientConfig, HttpGateway, TestCaseGateway};
use review_constants::DEFAULT_LOG_FILTER;
use review_core::{Notice, ReviewSession, SessionConfig};
use review_types::{Prompt, TestCaseField, TestCaseId};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod renderer;

/// Review and correct evaluation test cases from the terminal.
#[derive(Parser, Debug)]
#[command(name = "review", version, about, long_about = None)]
struct Cli {
    /// Base URL of the evaluation backend (overrides REVIEW_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Reload the collection after each save or delete so the server computes the metric
    #[arg(long, global = true)]
    reload_after_mutation: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the prompts known to the backend
    Prompts,
    /// Show the test cases of a prompt and its percent-correct metric
    Show {
        /// Prompt id or name
        prompt: String,
    },
    /// Edit fields of an existing test case and save it
    Edit {
        prompt: String,
        id: TestCaseId,
        #[command(flatten)]
        fields: FieldArgs,
    },
    /// Create a new test case under a prompt
    Create {
        prompt: String,
        #[command(flatten)]
        fields: FieldArgs,
    },
    /// Delete a test case
    Delete { prompt: String, id: TestCaseId },
    /// Ask the backend for an improved version of a prompt
    Improve { prompt: String },
}

#[derive(clap::Args, Debug, Default)]
struct FieldArgs {
    #[arg(long)]
    input: Option<String>,
    #[arg(long)]
    output: Option<String>,
    /// `true` or `false`
    #[arg(long)]
    is_correct: Option<String>,
    #[arg(long)]
    reason: Option<String>,
}

impl FieldArgs {
    fn edits(&self) -> Vec<(TestCaseField, &str)> {
        [
            (TestCaseField::Input, &self.input),
            (TestCaseField::Output, &self.output),
            (TestCaseField::IsCorrect, &self.is_correct),
            (TestCaseField::Reason, &self.reason),
        ]
        .into_iter()
        .filter_map(|(field, value)| value.as_deref().map(|value| (field, value)))
        .collect()
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let mut config = ClientConfig::from_env();
    if let Some(api_url) = &cli.api_url {
        config = config.with_base_url(api_url.as_str());
    }
    if cli.reload_after_mutation {
        config = config.with_reload_after_mutation(true);
    }
    let http = HttpGateway::new(&config).context("Failed to build gateway")?;
    info!(base_url = %http.base_url(), "Using evaluation backend");
    let gateway: Arc<dyn TestCaseGateway> = Arc::new(http);

    let prompt_ref = match &cli.command {
        Command::Prompts => {
            let prompts = gateway
                .list_prompts()
                .await
                .map_err(|err| anyhow!(err.user_message()))?;
            println!("{}", renderer::render_prompts(&prompts));
            return Ok(());
        }
        Command::Show { prompt }
        | Command::Edit { prompt, .. }
        | Command::Create { prompt, .. }
        | Command::Delete { prompt, .. }
        | Command::Improve { prompt } => prompt.clone(),
    };

    let prompt = resolve_prompt(gateway.as_ref(), &prompt_ref).await?;
    let mut console = Console::new(gateway, SessionConfig::from(&config));
    let load_failures = console.load(prompt.clone()).await?;
    if load_failures > 0 {
        println!("{}", console.render(&prompt)?);
        bail!("Loading test cases for '{}' failed", prompt.name);
    }

    match cli.command {
        Command::Prompts | Command::Show { .. } => {}
        Command::Edit { id, fields, .. } => {
            console.session.open_row(id)?;
            console.save(&fields).await?;
        }
        Command::Create { fields, .. } => {
            console.session.new_row()?;
            console.save(&fields).await?;
        }
        Command::Delete { id, .. } => {
            console.session.row_delete_clicked(id)?;
            console.settle().await?;
        }
        Command::Improve { .. } => {
            console.session.improve_prompt()?;
            console.settle().await?;
            let improved = console
                .session
                .improved_prompt()
                .ok_or_else(|| anyhow!("Backend returned no improved prompt"))?;
            println!("{}", renderer::render_improved(&prompt, improved));
            return Ok(());
        }
    }

    println!("{}", console.render(&prompt)?);
    console.session.dispose();
    Ok(())
}

/// Finds a prompt by numeric id or by name
async fn resolve_prompt(gateway: &dyn TestCaseGateway, reference: &str) -> Result<Prompt> {
    let prompts = gateway
        .list_prompts()
        .await
        .map_err(|err| anyhow!(err.user_message()))?;
    let by_id = reference.parse::<i64>().ok();
    prompts
        .into_iter()
        .find(|prompt| Some(prompt.id) == by_id || prompt.name == reference)
        .ok_or_else(|| anyhow!("No prompt matches '{reference}'"))
}

/// A session bound to one prompt, collecting its notices
struct Console {
    session: ReviewSession,
    notices: Arc<Mutex<Vec<Notice>>>,
}

impl Console {
    fn new(gateway: Arc<dyn TestCaseGateway>, config: SessionConfig) -> Self {
        let mut session = ReviewSession::new(gateway, config);
        let notices: Arc<Mutex<Vec<Notice>>> = Arc::default();
        let sink = Arc::clone(&notices);
        session.on_notice(move |notice| {
            if let Ok(mut notices) = sink.lock() {
                notices.push(notice.clone());
            }
        });
        session.on_metric_changed(|metric| {
            debug!(metric = %renderer::format_metric(metric), "Metric updated");
        });
        Self { session, notices }
    }

    /// Selects `prompt` and waits for its collection; returns how many
    /// notices the load raised
    async fn load(&mut self, prompt: Prompt) -> Result<usize> {
        self.session.select_prompt(prompt);
        self.settle_reporting().await
    }

    /// Applies the given field edits to the open draft and submits it
    async fn save(&mut self, fields: &FieldArgs) -> Result<()> {
        for (field, value) in fields.edits() {
            self.session.set_draft_field(field, value)?;
        }
        self.session.submit_draft()?;
        self.settle().await?;
        if self.session.editor().is_open() {
            bail!("Test case was not saved");
        }
        Ok(())
    }

    /// Waits for outstanding calls and fails on any notice they raised
    async fn settle(&mut self) -> Result<()> {
        match self.settle_reporting().await? {
            0 => Ok(()),
            failed => bail!("{failed} request(s) failed"),
        }
    }

    /// Waits for outstanding calls, prints their notices to stderr and
    /// returns how many there were
    async fn settle_reporting(&mut self) -> Result<usize> {
        self.session.settle().await;
        let notices = self
            .notices
            .lock()
            .map(|mut notices| std::mem::take(&mut *notices))
            .map_err(|_| anyhow!("Notice buffer poisoned"))?;
        for notice in &notices {
            eprintln!("{}", renderer::render_notice(notice));
        }
        Ok(notices.len())
    }

    fn render(&self, prompt: &Prompt) -> Result<String> {
        renderer::render_collection(prompt, &self.session.view(), self.session.percent_correct())
            .context("Failed to render collection")
    }
}
