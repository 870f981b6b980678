use std::collections::HashMap;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use futures::future::BoxFuture;
use tracing::info;
use tracing_subscriber::EnvFilter;

use stayflow_connect::{
    HttpActionInvoker, HttpClassifier, LogAlertSink, NoopClassifier, WebhookTransport,
};
use stayflow_core::config::AppConfig;
use stayflow_core::definition::{ActionDescriptor, WorkflowDefinition};
use stayflow_core::error::{FlowError, Result as FlowResult};
use stayflow_core::state::{GuestIdentity, Position, WorkflowState};
use stayflow_core::traits::{ActionInvoker, ActionOutcome, Classifier, Transport};
use stayflow_engine::{validate, DirectoryDefinitionStore, FlowEngine};

#[derive(Parser)]
#[command(name = "stayflow", version, about = "Guided guest conversation engine")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "stayflow.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a workflow as an interactive console conversation
    Run {
        /// Directory containing workflow definition files
        #[arg(short, long, default_value = "workflows")]
        definitions: PathBuf,
        /// Workflow id to start
        workflow: String,
        /// Guest language
        #[arg(short, long, default_value = "en")]
        language: String,
    },
    /// Check workflow definitions for structural defects
    Lint {
        /// Directory containing workflow definition files
        #[arg(short, long, default_value = "workflows")]
        definitions: PathBuf,
    },
    /// Show the resolved configuration
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("stayflow=info,warn")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let config = if cli.config.exists() {
        AppConfig::load(&cli.config)?
    } else {
        AppConfig::default()
    };

    match cli.command {
        Commands::Run {
            definitions,
            workflow,
            language,
        } => run_console(config, &definitions, &workflow, &language).await,
        Commands::Lint { definitions } => lint(&definitions),
        Commands::Config => {
            println!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

/// Drive one conversation over stdin/stdout, standing in for the chat
/// channel and the state store that a deployment provides.
async fn run_console(
    config: AppConfig,
    definitions: &Path,
    workflow: &str,
    language: &str,
) -> anyhow::Result<()> {
    let store = Arc::new(DirectoryDefinitionStore::load(definitions)?);
    info!(count = store.len(), "Loaded workflow definitions");

    let actions: Arc<dyn ActionInvoker> = match &config.actions {
        Some(actions_config) => Arc::new(HttpActionInvoker::new(actions_config)),
        None => Arc::new(OfflineActions),
    };
    let transport: Arc<dyn Transport> = match &config.transport {
        Some(transport_config) => Arc::new(WebhookTransport::new(transport_config)),
        None => Arc::new(ConsoleTransport),
    };
    let classifier: Arc<dyn Classifier> = match &config.classifier {
        Some(classifier_config) => Arc::new(HttpClassifier::new(classifier_config)),
        None => Arc::new(NoopClassifier),
    };

    let engine = FlowEngine::new(store.clone(), actions, transport, classifier)
        .with_alerts(Arc::new(LogAlertSink))
        .with_config(config.engine.clone());

    let guest = GuestIdentity::new("console").with_name("Console guest");
    let mut state = engine.begin(workflow).await?;
    let mut incoming: Option<String> = None;

    loop {
        let outcome = engine
            .execute_step(state, incoming.as_deref(), language, &guest)
            .await;
        incoming = None;

        if !outcome.reply.is_empty() {
            println!("{}", outcome.reply);
        }
        let Some(next) = outcome.next_state else {
            if let Some(summary) = outcome.summary {
                println!("\n{summary}");
            }
            break;
        };
        state = next;

        // Steps marked auto-advance are re-invoked without waiting for input.
        let wait = store
            .get(workflow)
            .map(|def| should_wait(def, &state))
            .unwrap_or(true);
        if !wait {
            continue;
        }

        print!("> ");
        io::stdout().flush()?;
        let mut line = String::new();
        if io::stdin().lock().read_line(&mut line)? == 0 {
            break;
        }
        incoming = Some(line.trim().to_string());
    }
    Ok(())
}

/// Whether the caller should wait for guest input before re-invoking.
/// Graph suspension always waits; flat steps declare it per step.
fn should_wait(def: &WorkflowDefinition, state: &WorkflowState) -> bool {
    match (def, &state.position) {
        (WorkflowDefinition::Flat { steps, .. }, Position::Step { index }) => {
            if steps.is_empty() {
                return true;
            }
            let executed = (*index - 1).clamp(0, steps.len() as i64 - 1) as usize;
            steps[executed].wait_for_reply
        }
        _ => true,
    }
}

fn lint(definitions: &Path) -> anyhow::Result<()> {
    let store = DirectoryDefinitionStore::load(definitions)?;
    if store.is_empty() {
        println!("No definitions found in {}", definitions.display());
        return Ok(());
    }

    let mut entries: Vec<_> = store.iter().collect();
    entries.sort_by_key(|(id, _)| id.to_string());

    let mut defects = 0;
    for (id, def) in entries {
        match validate(def) {
            Ok(()) => println!("ok    {id}"),
            Err(e) => {
                defects += 1;
                println!("FAIL  {id}: {e}");
            }
        }
    }
    if defects > 0 {
        anyhow::bail!("{defects} definition(s) failed validation");
    }
    Ok(())
}

/// Prints side-channel sends instead of delivering them.
struct ConsoleTransport;

impl Transport for ConsoleTransport {
    fn send(&self, recipient: &str, content: &str) -> BoxFuture<'_, FlowResult<()>> {
        let line = format!("[send -> {recipient}] {content}");
        Box::pin(async move {
            println!("{line}");
            Ok(())
        })
    }
}

/// Fails every action so conversations exercise their degradation paths.
struct OfflineActions;

impl ActionInvoker for OfflineActions {
    fn invoke(
        &self,
        descriptor: &ActionDescriptor,
        _params: HashMap<String, String>,
    ) -> BoxFuture<'_, FlowResult<ActionOutcome>> {
        let kind = descriptor.kind.clone();
        Box::pin(async move {
            Err(FlowError::ActionFailed {
                kind,
                message: "no action service configured".into(),
            })
        })
    }
}
