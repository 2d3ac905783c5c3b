//! WhatsApp Auto-Reply Bot - Main Entry Point
//!
//! Links to a WhatsApp account through the bridge sidecar and answers
//! incoming messages until logged out or stopped.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use wa_autoreply_bot::config::{BotSettings, BridgeConfig, ReplyConfig};
use wa_autoreply_bot::dispatcher::MessageDispatcher;
use wa_autoreply_bot::supervisor::{SessionSupervisor, SupervisorExit, SupervisorMessage};
use wa_autoreply_bot::whatsapp::{
    BridgeConnector, Connector, CredentialStore, FileCredentialStore, PairingRenderer,
    TerminalQrRenderer,
};

/// WhatsApp auto-reply bot.
#[derive(Parser, Debug)]
#[command(name = "autoreply_bot")]
#[command(about = "Answer greetings and commands on a linked WhatsApp account")]
#[command(version)]
struct Args {
    /// Path to a replies JSON file. Built-in texts are used when omitted.
    #[arg(short, long)]
    replies: Option<String>,

    /// Path to the .env file for environment variables.
    #[arg(long, default_value = ".env")]
    env_file: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Generate an example replies file and exit.
    #[arg(long)]
    generate_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level);

    if args.generate_config {
        return generate_example_config();
    }

    if let Err(e) = dotenvy::from_filename(&args.env_file) {
        debug!("Could not load .env file ({}): {}", args.env_file, e);
    }

    let bridge_config =
        BridgeConfig::from_env().context("Failed to load bridge configuration from environment")?;
    let bot_settings = BotSettings::from_env_with_defaults();

    let replies = match &args.replies {
        Some(path) => ReplyConfig::load_from_file(path)
            .with_context(|| format!("Failed to load replies from {path}"))?,
        None => ReplyConfig::default(),
    };
    replies
        .validate()
        .context("Reply configuration validation failed")?;

    info!("Loaded {} quotes", replies.quotes.len());
    info!("Command prefix: {}", bot_settings.command_prefix);
    info!("Bridge: {}", bridge_config.url);

    let auth_dir = bridge_config.auth_dir.clone();
    let connector: Arc<dyn Connector> = Arc::new(BridgeConnector::new(bridge_config));
    let credentials: Arc<dyn CredentialStore> = Arc::new(FileCredentialStore::new(&auth_dir));
    let renderer: Arc<dyn PairingRenderer> = Arc::new(TerminalQrRenderer::default());
    let dispatcher = Arc::new(MessageDispatcher::from_settings(&bot_settings, replies));

    let mut supervisor = SessionSupervisor::new(
        connector,
        dispatcher,
        credentials,
        renderer,
        bot_settings.retry_policy(),
    );

    let (supervisor_tx, supervisor_rx) = mpsc::channel::<SupervisorMessage>(8);

    info!("Starting auto-reply bot...");
    let mut supervisor_handle = tokio::spawn(async move { supervisor.run(supervisor_rx).await });

    info!("Bot is running. Use Ctrl+C to stop.");

    let finished = tokio::select! {
        result = &mut supervisor_handle => Some(result),
        _ = tokio::signal::ctrl_c() => None,
    };

    let outcome = match finished {
        Some(result) => result,
        None => {
            info!("Received Ctrl+C, shutting down...");
            if supervisor_tx.send(SupervisorMessage::Shutdown).await.is_err() {
                warn!("Supervisor already stopped");
            }
            supervisor_handle.await
        }
    };

    match outcome.context("Supervisor task failed")? {
        Ok(SupervisorExit::Shutdown) => info!("Stopped"),
        Ok(SupervisorExit::LoggedOut(reason)) => {
            error!(
                "Logged out ({}). Delete {} and restart to pair again.",
                reason,
                auth_dir.display()
            );
        }
        Ok(SupervisorExit::RetriesExhausted { attempts }) => {
            anyhow::bail!("Could not reconnect after {attempts} attempts");
        }
        Err(e) => return Err(e).context("Supervisor stopped with an error"),
    }

    Ok(())
}

/// Initializes the logging subsystem.
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Generates an example replies file.
fn generate_example_config() -> Result<()> {
    let example = ReplyConfig::example();
    example.save_to_file("replies.example.json")?;

    println!("✓ Example replies written to: replies.example.json");
    println!("\nTo use this bot:");
    println!("1. Copy replies.example.json to replies.json and edit the texts");
    println!("2. Start the Baileys bridge sidecar (BRIDGE_URL, default ws://127.0.0.1:8790)");
    println!("3. Run: autoreply_bot --replies replies.json");
    println!("4. Scan the QR code from WhatsApp > Linked devices");

    Ok(())
}
