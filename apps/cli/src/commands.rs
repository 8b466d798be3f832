//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;
use std::sync::Arc;

use autoservice_agent::{AgentProgress, AgentRun, ReadOnlyDirectory, SilentProgress, WorkshopAgent};
use autoservice_api::AppState;
use autoservice_llm::{CompletionClient, OpenAiClient, TavilyClient, WebSearch};
use autoservice_shared::{AppConfig, init_config, load_config};
use autoservice_storage::Storage;
use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// autoservice: vehicle-service backend with a workshop search assistant.
#[derive(Parser)]
#[command(
    name = "autoservice",
    version,
    about = "Vehicle-service backend: REST API, order intake and a workshop search assistant.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Run the HTTP API server.
    Serve {
        /// Address to bind (overrides config).
        #[arg(long)]
        host: Option<String>,

        /// Port to bind (overrides config).
        #[arg(long)]
        port: Option<u16>,

        /// Database file (overrides config).
        #[arg(long, env = "AUTOSERVICE_DB")]
        db: Option<PathBuf>,
    },

    /// Ask the workshop assistant a single question.
    Ask {
        /// The question, e.g. "Finde eine Werkstatt in Berlin".
        message: String,

        /// Database file (overrides config).
        #[arg(long, env = "AUTOSERVICE_DB")]
        db: Option<PathBuf>,

        /// Print the classification and visited states as JSON.
        #[arg(long)]
        trace: bool,
    },

    /// Fill an empty database with demo data.
    Seed {
        /// Database file (overrides config).
        #[arg(long, env = "AUTOSERVICE_DB")]
        db: Option<PathBuf>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "autoservice=info,tower_http=info",
        1 => "autoservice=debug,tower_http=debug",
        _ => "autoservice=trace,tower_http=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Serve { host, port, db } => cmd_serve(host, port, db).await,
        Command::Ask { message, db, trace } => cmd_ask(&message, db, trace).await,
        Command::Seed { db } => cmd_seed(db).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

// ---------------------------------------------------------------------------
// Shared setup
// ---------------------------------------------------------------------------

/// Open the database named by `--db`, or the configured one.
async fn open_storage(config: &AppConfig, db: Option<PathBuf>) -> Result<Storage> {
    let path = db.unwrap_or_else(|| PathBuf::from(&config.database.path));
    info!(path = %path.display(), "opening database");
    Ok(Storage::open(&path).await?)
}

/// Build the completion and search clients from config.
fn build_clients(
    config: &AppConfig,
) -> Result<(Arc<dyn CompletionClient>, Option<Arc<dyn WebSearch>>)> {
    let completion = OpenAiClient::from_config(&config.completion)?;
    if !completion.has_credential() {
        warn!(
            env = %config.completion.api_key_env,
            "no completion API key set, AI endpoints will fail"
        );
    }

    let search = TavilyClient::from_config(&config.search)?
        .map(|client| Arc::new(client) as Arc<dyn WebSearch>);
    if search.is_none() {
        info!(env = %config.search.api_key_env, "web search disabled");
    }

    Ok((Arc::new(completion), search))
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_serve(host: Option<String>, port: Option<u16>, db: Option<PathBuf>) -> Result<()> {
    let mut config = load_config()?;
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    let storage = open_storage(&config, db).await?;
    let (completion, search) = build_clients(&config)?;
    let state = AppState::new(storage, completion, search, &config);

    let addr = tokio::net::lookup_host((config.server.host.as_str(), config.server.port))
        .await
        .map_err(|e| eyre!("cannot resolve '{}': {e}", config.server.host))?
        .next()
        .ok_or_else(|| eyre!("no address for '{}'", config.server.host))?;

    autoservice_api::serve(state, addr, &config.server.cors_origin).await?;
    Ok(())
}

async fn cmd_ask(message: &str, db: Option<PathBuf>, trace: bool) -> Result<()> {
    let config = load_config()?;
    let storage = open_storage(&config, db).await?;
    let (completion, search) = build_clients(&config)?;
    let agent = WorkshopAgent::new(completion, search, &config.completion, &config.search);

    let directory = ReadOnlyDirectory::new(&storage);
    let run = if trace {
        agent.run(message, &directory, &SilentProgress).await?
    } else {
        let reporter = CliProgress::new();
        agent.run(message, &directory, &reporter).await?
    };

    if trace {
        let diagnostics = serde_json::json!({
            "trace": run.trace,
            "classification": run.classification,
            "enrichment": run.enrichment,
        });
        eprintln!("{}", serde_json::to_string_pretty(&diagnostics)?);
    }

    println!("{}", run.answer);
    Ok(())
}

async fn cmd_seed(db: Option<PathBuf>) -> Result<()> {
    let config = load_config()?;
    let storage = open_storage(&config, db).await?;
    let report = storage.seed_demo_data().await?;

    if report.is_empty() {
        println!("Database already contains data; nothing seeded.");
    } else {
        println!(
            "Seeded {} customers, {} vehicles, {} workshops, {} orders.",
            report.customers, report.vehicles, report.workshops, report.orders
        );
    }
    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl AgentProgress for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn done(&self, _run: &AgentRun) {
        self.spinner.finish_and_clear();
    }
}

impl Drop for CliProgress {
    fn drop(&mut self) {
        if !self.spinner.is_finished() {
            self.spinner.finish_and_clear();
        }
    }
}
