mod console;

use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use openportal_action::Host;
use openportal_config::{ActionConfig, DatasourceConfig, EngineConfig};
use openportal_datasource::websocket::InMemoryTransport;
use openportal_engine::{PageInputs, PageSession, Services};
use openportal_http::ReqwestClient;

use crate::console::{ConsoleDialogs, ConsoleRouter, ConsoleToaster};

/// OpenPortal - run declarative portal actions and datasources
#[derive(Parser)]
#[command(name = "openportal")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Engine config file (default: ~/.openportal/config.json)
  #[arg(long, global = true)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Execute one action
  Run {
    /// Path to the action file (JSON)
    action_file: PathBuf,

    /// Page context (state, routeParams, queryParams, user, tenant).
    /// Read from stdin when omitted.
    #[arg(long)]
    context: Option<PathBuf>,

    /// Confirm every dialog instead of declining it
    #[arg(long)]
    yes: bool,
  },

  /// Attach a datasource, load it once and print its state
  Fetch {
    /// Path to the datasource file (JSON)
    datasource_file: PathBuf,

    #[arg(long)]
    context: Option<PathBuf>,
  },
}

fn main() -> Result<ExitCode> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .with_writer(io::stderr)
    .init();

  let cli = Cli::parse();
  let config = load_config(cli.config.as_deref())?;

  match cli.command {
    Some(Commands::Run {
      action_file,
      context,
      yes,
    }) => {
      let rt = tokio::runtime::Runtime::new()?;
      rt.block_on(run_action(config, action_file, context, yes))
    }
    Some(Commands::Fetch {
      datasource_file,
      context,
    }) => {
      let rt = tokio::runtime::Runtime::new()?;
      rt.block_on(fetch_datasource(config, datasource_file, context))
    }
    None => {
      println!("openportal - use --help to see available commands");
      Ok(ExitCode::SUCCESS)
    }
  }
}

fn load_config(explicit: Option<&Path>) -> Result<EngineConfig> {
  if let Some(path) = explicit {
    return EngineConfig::load(path)
      .with_context(|| format!("failed to load config: {}", path.display()));
  }

  let default_path = dirs::home_dir().map(|home| home.join(".openportal").join("config.json"));
  match default_path {
    Some(path) if path.exists() => {
      debug!(path = %path.display(), "loading engine config");
      EngineConfig::load(&path).with_context(|| format!("failed to load config: {}", path.display()))
    }
    _ => Ok(EngineConfig::default()),
  }
}

fn build_session(config: &EngineConfig, inputs: PageInputs, confirm: bool) -> Result<PageSession> {
  let http = ReqwestClient::new(config.api_base_url.clone()).with_default_headers(config.default_headers.clone());
  let transport = InMemoryTransport::default();
  transport.connect();

  let host = Host::new(
    Arc::new(ConsoleRouter::new()),
    Arc::new(ConsoleToaster),
    Arc::new(ConsoleDialogs { answer: confirm }),
  );
  let services = Services::new(Arc::new(http), Arc::new(transport), host);
  PageSession::new(config, inputs, services).context("failed to create page session")
}

async fn run_action(
  config: EngineConfig,
  action_file: PathBuf,
  context: Option<PathBuf>,
  confirm: bool,
) -> Result<ExitCode> {
  let action: ActionConfig = read_json_file(&action_file).await?;
  let inputs = read_context(context.as_deref()).await?;
  let session = build_session(&config, inputs, confirm)?;

  info!(action_id = %action.id, action_type = %action.action_type, "running action");

  // Ctrl-C cancels the execution; the cancelled result is still printed
  let cancel = CancellationToken::new();
  let interrupt = cancel.clone();
  tokio::spawn(async move {
    if tokio::signal::ctrl_c().await.is_ok() {
      interrupt.cancel();
    }
  });

  let result = session.trigger_with(&action, cancel).await;

  let output = json!({
    "result": result.to_value(),
    "state": session.state().snapshot(),
  });
  println!("{}", serde_json::to_string_pretty(&output)?);

  Ok(if result.success || result.skipped {
    ExitCode::SUCCESS
  } else {
    ExitCode::FAILURE
  })
}

async fn fetch_datasource(
  config: EngineConfig,
  datasource_file: PathBuf,
  context: Option<PathBuf>,
) -> Result<ExitCode> {
  let datasource: DatasourceConfig = read_json_file(&datasource_file).await?;
  let inputs = read_context(context.as_deref()).await?;
  let session = build_session(&config, inputs, false)?;

  let handle = session
    .attach_datasource(datasource)
    .context("failed to attach datasource")?;
  let state = handle.load().await;
  let state = if state.loading { handle.settled().await } else { state };

  println!("{}", serde_json::to_string_pretty(&state)?);
  session.close();

  Ok(if state.error.is_none() {
    ExitCode::SUCCESS
  } else {
    ExitCode::FAILURE
  })
}

async fn read_json_file<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
  let content = tokio::fs::read_to_string(path)
    .await
    .with_context(|| format!("failed to read file: {}", path.display()))?;
  serde_json::from_str(&content).with_context(|| format!("failed to parse file: {}", path.display()))
}

async fn read_context(path: Option<&Path>) -> Result<PageInputs> {
  match path {
    Some(path) => read_json_file(path).await,
    None => read_context_from_stdin(),
  }
}

fn read_context_from_stdin() -> Result<PageInputs> {
  use std::io::IsTerminal;

  if io::stdin().is_terminal() {
    return Ok(PageInputs::default());
  }

  let mut input = String::new();
  io::stdin()
    .read_to_string(&mut input)
    .context("failed to read context from stdin")?;

  if input.trim().is_empty() {
    Ok(PageInputs::default())
  } else {
    serde_json::from_str(&input).context("failed to parse context JSON from stdin")
  }
}
