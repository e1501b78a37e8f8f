use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use wattchat::app::{App, SPINNER_INTERVAL};
use wattchat::config::Config;
use wattchat::transport::{ChatTransport, HttpTransport};
use wattchat::tui::{self, EventHandler, Tui};
use wattchat::widget::{error_text, ChatWidget, Completion, WidgetOptions, FALLBACK_REPLY};
use wattchat::{format, handler, ui};

#[derive(Parser)]
#[command(name = "wattchat", version)]
#[command(about = "Terminal chat widget for a chat endpoint")]
struct Cli {
    /// Chat endpoint URL
    #[arg(long, env = "WATTCHAT_ENDPOINT", global = true)]
    endpoint: Option<String>,

    /// Log file (the terminal belongs to the UI)
    #[arg(long, env = "WATTCHAT_LOG", global = true)]
    log_file: Option<PathBuf>,

    /// Config file to use instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the interactive chat (default)
    Chat,
    /// Send one message and print the reply
    Ask {
        /// Message to send
        message: String,
    },
    /// Show the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => Config::get_config_path()?,
    };
    let (mut config, config_error) = match Config::load_from(&config_path) {
        Ok(config) => (config, None),
        Err(e) => (Config::new(), Some(e)),
    };

    // Command line and environment win over the config file
    if let Some(endpoint) = cli.endpoint {
        config.endpoint = Some(endpoint);
    }
    if let Some(log_file) = cli.log_file {
        config.log_file = Some(log_file);
    }

    init_logging(&config.log_file()?)?;
    if let Some(e) = config_error {
        warn!(error = %e, "ignoring unreadable config file");
    }
    info!(endpoint = config.endpoint(), "starting");

    match cli.command.unwrap_or(Commands::Chat) {
        Commands::Chat => run_chat(&config).await,
        Commands::Ask { message } => ask(&config, &message).await,
        Commands::Config => show_config(&config, &config_path),
    }
}

fn init_logging(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(path)?;

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .with_target(true),
        )
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    Ok(())
}

async fn run_chat(config: &Config) -> Result<()> {
    let transport = Arc::new(HttpTransport::new(config.endpoint())?);
    let (tx, mut completions) = mpsc::unbounded_channel();
    let options = WidgetOptions {
        allow_overlapping_sends: config.allow_overlapping_sends(),
    };
    let widget = ChatWidget::new(transport, tx, options);
    let mut app = App::new(widget, config.endpoint());

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = EventHandler::new(SPINNER_INTERVAL);

    let result = run_loop(&mut terminal, &mut app, &mut events, &mut completions).await;

    tui::restore()?;
    info!("exiting");
    result
}

async fn run_loop(
    terminal: &mut Tui,
    app: &mut App,
    events: &mut EventHandler,
    completions: &mut mpsc::UnboundedReceiver<Completion>,
) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        tokio::select! {
            Some(event) = events.next() => handler::handle_event(app, event),
            Some(completion) = completions.recv() => app.widget.resolve(completion),
            else => break,
        }
    }
    Ok(())
}

async fn ask(config: &Config, message: &str) -> Result<()> {
    let text = message.trim();
    if text.is_empty() {
        bail!("Message is empty");
    }

    let transport = HttpTransport::new(config.endpoint())?;
    match transport.send(text).await {
        Ok(reply) => {
            let body = reply.response.unwrap_or_else(|| FALLBACK_REPLY.to_string());
            println!("{}", format::format(&body).to_plain());
            Ok(())
        }
        Err(err) => {
            error!(error = ?err, "chat request failed");
            bail!("{}", error_text(&err.reason()))
        }
    }
}

fn show_config(config: &Config, path: &Path) -> Result<()> {
    println!("Config file: {}", path.display());
    println!("{}", serde_json::to_string_pretty(config)?);
    println!("Effective endpoint: {}", config.endpoint());
    Ok(())
}
