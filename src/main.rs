//! Moderation Bot - Main Entry Point
//!
//! A Telegram bot that bans, mutes and kicks group members on command
//! from chat administrators.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use moderation_bot::commands::CommandHandler;
use moderation_bot::config::{BotSettings, RepoCard, TelegramConfig};
use moderation_bot::telegram::TelegramBot;

/// Telegram bot with group moderation commands.
#[derive(Parser, Debug)]
#[command(name = "moderation_bot")]
#[command(about = "Ban, mute and kick group members from chat commands")]
#[command(version)]
struct Args {
    /// Path to the repo card JSON file shown by /repo.
    #[arg(short, long, default_value = "repo_card.json")]
    repo_card: String,

    /// Path to the .env file for environment variables.
    #[arg(long, default_value = ".env")]
    env_file: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Generate an example repo card file and exit.
    #[arg(long)]
    generate_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    init_logging(&args.log_level);

    // Handle example config generation
    if args.generate_config {
        return generate_example_config();
    }

    // Load environment variables
    if let Err(e) = dotenvy::from_filename(&args.env_file) {
        debug!("Could not load .env file ({}): {}", args.env_file, e);
    }

    // Load configurations
    let tg_config = TelegramConfig::from_env()
        .context("Failed to load Telegram configuration from environment")?;

    let bot_settings = BotSettings::from_env_with_defaults();

    let repo_card = load_repo_card(&args.repo_card)?;

    // Connect to Telegram
    let bot = TelegramBot::connect(&tg_config)
        .await
        .context("Failed to connect to Telegram")?;

    let bot_username = bot
        .username()
        .await
        .context("Failed to fetch bot profile")?;

    info!(
        "Signed in as @{}",
        bot_username.as_deref().unwrap_or("<no username>")
    );

    let bot = Arc::new(bot);
    let handler = Arc::new(CommandHandler::new(
        Arc::clone(&bot),
        &bot_settings,
        repo_card,
        bot_username,
    ));

    info!("Command prefix: {}", bot_settings.command_prefix);
    info!("Bot is running. Use Ctrl+C to stop.");

    loop {
        let message = tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                break;
            }
            message = bot.next_message() => match message {
                Ok(message) => message,
                Err(e) => {
                    error!("Update stream failed: {}", e);
                    break;
                }
            },
        };

        if !handler.recognizes(message.text()) {
            continue;
        }

        let bot = Arc::clone(&bot);
        let handler = Arc::clone(&handler);
        tokio::spawn(async move {
            let Some(invocation) = bot.invocation(&message).await else {
                return;
            };
            let Some(reply) = handler.try_handle(&invocation).await else {
                return;
            };
            if let Err(e) = bot.send_reply(&message, &reply).await {
                warn!("Failed to send reply in chat {}: {}", invocation.chat_id, e);
            }
        });
    }

    // Cleanup
    info!("Shutting down...");
    bot.save_session().context("Failed to save session")?;

    Ok(())
}

/// Initializes the logging subsystem.
fn init_logging(level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Loads and validates the repo card, falling back to the built-in one.
fn load_repo_card(path: &str) -> Result<RepoCard> {
    let card = if Path::new(path).exists() {
        RepoCard::load_from_file(path).context("Failed to load repo card")?
    } else {
        info!("No repo card at {}, using the built-in one", path);
        RepoCard::default()
    };

    card.validate().context("Repo card validation failed")?;
    Ok(card)
}

/// Generates an example repo card file.
fn generate_example_config() -> Result<()> {
    let example = RepoCard::example();
    example.save_to_file("repo_card.example.json")?;

    println!("✓ Example repo card written to: repo_card.example.json");
    println!("\nTo use this bot:");
    println!("1. Copy repo_card.example.json to repo_card.json and edit it");
    println!("2. Create a .env file with TG_API_ID, TG_API_HASH and TG_BOT_TOKEN");
    println!("3. Promote the bot to admin with the ban users right in your group");
    println!("4. Run: moderation_bot");

    Ok(())
}
