//! CLI command definitions, routing, and tracing setup.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use askdata_core::{AppContext, answer_question};
use askdata_shared::{AppConfig, init_config, load_config, load_config_from};
use askdata_storage::{DataStore, Store, StoreOptions};

use crate::http;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// AskData: natural-language questions over a relational store.
#[derive(Parser)]
#[command(
    name = "askdata",
    version,
    about = "Answer natural-language questions about an e-commerce database.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file (defaults to ~/.askdata/askdata.toml).
    #[arg(long, global = true, env = "ASKDATA_CONFIG")]
    pub config: Option<PathBuf>,

    /// Database file, overriding `store.path`.
    #[arg(long, global = true, env = "ASKDATA_DB")]
    pub db: Option<String>,

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
    /// Start the HTTP server.
    Serve {
        /// Host to bind (overrides `server.host`).
        #[arg(long)]
        host: Option<String>,

        /// Port to bind (overrides `server.port`).
        #[arg(long)]
        port: Option<u16>,
    },

    /// Print the schema description of the store.
    Schema,

    /// Answer one question and print the JSON reply.
    Ask {
        /// The question, in plain language.
        question: String,
    },

    /// Configuration management.
    Config {
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
        0 => "askdata=info,tower_http=info",
        1 => "askdata=debug,tower_http=debug",
        _ => "askdata=trace,tower_http=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

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
    let mut config = resolve_config(&cli)?;

    match cli.command {
        Command::Serve { host, port } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            cmd_serve(&config).await
        }
        Command::Schema => cmd_schema(&config).await,
        Command::Ask { question } => cmd_ask(&config, &question).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(&config),
        },
    }
}

/// File config (explicit path or the default location) with global flag overrides.
fn resolve_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = match &cli.config {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    if let Some(db) = &cli.db {
        config.store.path = db.clone();
    }
    Ok(config)
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_serve(config: &AppConfig) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|e| {
            eyre!(
                "invalid bind address {}:{}: {e}",
                config.server.host,
                config.server.port
            )
        })?;

    let ctx = Arc::new(AppContext::start(config).await?);
    http::serve(Arc::clone(&ctx), addr).await?;

    match Arc::try_unwrap(ctx) {
        Ok(ctx) => ctx.shutdown(),
        Err(_) => info!("context still referenced at shutdown"),
    }
    Ok(())
}

async fn cmd_schema(config: &AppConfig) -> Result<()> {
    let options = StoreOptions {
        read_only: config.store.read_only,
        max_rows: config.store.max_rows,
    };
    let store = Store::open(Path::new(&config.store.path), options).await?;
    let schema = store.describe_schema().await?;

    if schema.is_empty() {
        println!("(no tables in {})", config.store.path);
    } else {
        print!("{}", schema.to_prompt_text());
    }
    Ok(())
}

async fn cmd_ask(config: &AppConfig, question: &str) -> Result<()> {
    let ctx = AppContext::start(config).await?;

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")?
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    spinner.set_message("Thinking...");
    spinner.enable_steady_tick(std::time::Duration::from_millis(80));

    let outcome = answer_question(&ctx, question).await;
    spinner.finish_and_clear();
    ctx.shutdown();

    let answer = outcome?;
    println!("{}", serde_json::to_string_pretty(&answer)?);
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config file created at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config: &AppConfig) -> Result<()> {
    let toml_str = toml::to_string_pretty(config)?;
    println!("{toml_str}");
    Ok(())
}
