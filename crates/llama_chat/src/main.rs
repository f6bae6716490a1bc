use std::io::{self, IsTerminal, Read};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use clap::Parser;
use llm::{ModelClient, OllamaClient};
use ratatui::crossterm::style::Stylize;
use tracing::{info, warn};

use llama_chat::clipboard::ArboardClipboard;
use llama_chat::config::{Config, ImageStyle};
use llama_chat::generate::{combine_prompt, generate};
use llama_chat::logging;
use llama_chat::persistence::ChatStorage;
use llama_chat::session::{NewSession, Session};
use llama_chat::ui::terminal::{run_new_chat_form, tui, ChatSettings, NewChatInput, TerminalChatApp};
use llama_chat::utils::relative_time;

#[derive(Parser)]
#[command(name = "llama-chat")]
#[command(about = "Chat with local language models in the terminal", long_about = None)]
struct Cli {
    /// Model to chat with. Overrides the model of a resumed session.
    #[arg(long)]
    model: Option<String>,

    /// Ollama server URL.
    #[arg(long = "base-url")]
    base_url: Option<String>,

    /// Resume a saved session by id.
    #[arg(long, conflicts_with_all = ["title", "system", "anonymous"])]
    session: Option<String>,

    /// Title of a new session. Without it a form asks for the session details.
    #[arg(long)]
    title: Option<String>,

    /// System message for a new session.
    #[arg(long)]
    system: Option<String>,

    /// Do not save the conversation.
    #[arg(long)]
    anonymous: bool,

    /// Allow image attachments in a new session.
    #[arg(long)]
    multimodal: bool,

    /// Draw attached images with glyphs instead of colored blocks.
    #[arg(long = "ascii-images")]
    ascii_images: bool,

    /// Answer a single prompt on stdout without opening the chat screen.
    /// Text piped on stdin is passed along as context.
    #[arg(long, conflicts_with = "session")]
    prompt: Option<String>,

    /// Images to attach to --prompt, comma separated.
    #[arg(long, value_delimiter = ',', requires = "prompt")]
    images: Vec<String>,

    /// Print saved sessions and installed models, then exit.
    #[arg(long)]
    list: bool,

    /// Delete a saved session, then exit.
    #[arg(long, value_name = "ID")]
    delete: Option<String>,

    /// Log at debug level.
    #[arg(short = 'v', long)]
    verbose: bool,

    /// Config file to use instead of the default location.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        let _ = tui::restore();
        eprintln!("{} {e:#}", "ERROR".red().bold());
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = Config::load(cli.config.as_deref())?;
    config.apply_env(std::env::var("OLLAMA_HOST").ok());
    if let Some(base_url) = &cli.base_url {
        config.base_url = base_url.clone();
    }
    if cli.ascii_images {
        config.image_style = ImageStyle::Ascii;
    }

    let data_dir = config.data_dir()?;
    let log_path = logging::init(&data_dir, cli.verbose)?;
    info!("Logging to {}", log_path.display());

    let mut storage = ChatStorage::open(&data_dir).context("Failed to open chat storage")?;
    let client = OllamaClient::new(config.base_url.clone());

    if cli.list {
        return list(&storage, &client).await;
    }
    if let Some(id) = &cli.delete {
        storage
            .delete_session(id)
            .with_context(|| format!("Failed to delete session {id}"))?;
        println!("Deleted session {id}");
        return Ok(());
    }

    let piped = read_piped_stdin()?;
    if cli.prompt.is_some() || piped.is_some() {
        let model = select_model(&cli, &config)?;
        let prompt = combine_prompt(piped.as_deref(), cli.prompt.as_deref());
        generate(&client, &model, &prompt, &cli.images, io::stdout()).await?;
        return Ok(());
    }

    let Some(mut session) = resolve_session(&cli, &config, &storage).await? else {
        info!("New chat form cancelled");
        return Ok(());
    };
    info!(
        "Starting session '{}' with {} ({} messages)",
        session.meta.title,
        session.meta.model_name,
        session.history.len()
    );

    let settings = ChatSettings::new(&session.meta, &config);
    let client: Arc<dyn ModelClient> = Arc::new(client);
    let app = TerminalChatApp::new(client, Box::new(ArboardClipboard::new()), settings);
    session.history = app.run(std::mem::take(&mut session.history)).await?;

    if !session.is_anonymous() {
        storage
            .save_session(&session)
            .with_context(|| format!("Failed to save session {}", session.id()))?;
        info!("Saved session {}", session.id());
    }
    Ok(())
}

/// Text piped on stdin, if stdin is not a terminal.
fn read_piped_stdin() -> Result<Option<String>> {
    let mut stdin = io::stdin();
    if stdin.is_terminal() {
        return Ok(None);
    }
    let mut text = String::new();
    stdin
        .read_to_string(&mut text)
        .context("Failed to read standard input")?;
    Ok(Some(text).filter(|t| !t.trim().is_empty()))
}

fn select_model(cli: &Cli, config: &Config) -> Result<String> {
    cli.model
        .clone()
        .or_else(|| config.model.clone())
        .ok_or_else(|| anyhow!("No model selected. Pass --model or set \"model\" in the config file"))
}

/// Load the requested session or set up a new one. `None` when the user
/// cancelled the new chat form.
async fn resolve_session(
    cli: &Cli,
    config: &Config,
    storage: &ChatStorage,
) -> Result<Option<Session>> {
    if let Some(id) = &cli.session {
        let mut session = storage
            .load_session(id)
            .with_context(|| format!("Failed to load session {id}"))?;
        if let Some(model) = &cli.model {
            session.meta.model_name = model.clone();
        }
        if cli.multimodal {
            session.meta.is_multi_modal = true;
        }
        return Ok(Some(session));
    }

    let model_name = select_model(cli, config)?;
    let defaults = NewChatInput {
        title: cli.title.clone().unwrap_or_default(),
        system_message: cli.system.clone().unwrap_or_default(),
        is_anonymous: cli.anonymous,
    };
    let input = if defaults.title.trim().is_empty() {
        match run_new_chat_form(defaults).await? {
            Some(input) => input,
            None => return Ok(None),
        }
    } else {
        defaults
    };
    Ok(Some(Session::create(
        NewSession {
            title: input.title.trim().to_string(),
            system_message: input.system_message,
            model_name,
            is_multi_modal: cli.multimodal,
            is_anonymous: input.is_anonymous,
        },
        &storage.index,
    )))
}

async fn list(storage: &ChatStorage, client: &OllamaClient) -> Result<()> {
    let now = Utc::now();
    println!("{}", "Sessions".bold());
    if storage.index.list().is_empty() {
        println!("  (none)");
    }
    for meta in storage.index.list() {
        println!(
            "  {}  {}  ({}, updated {})",
            meta.id,
            meta.title,
            meta.model_name,
            relative_time(meta.updated_at, now)
        );
    }

    println!("{}", "Models".bold());
    match client.list_models().await {
        Ok(models) if models.is_empty() => println!("  (none)"),
        Ok(models) => {
            for model in models {
                println!("  {model}");
            }
        }
        Err(e) => {
            warn!("Failed to list models: {e}");
            println!("  unavailable: {e}");
        }
    }
    Ok(())
}
