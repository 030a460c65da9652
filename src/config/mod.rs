//! Configuration module for the moderation bot.
//!
//! Handles Telegram API credentials, bot settings and the
//! repository card shown by `/repo`.

mod repo_card;
mod settings;

pub use repo_card::{CardButton, RepoCard, RepoCardError, BOT_USERNAME_PLACEHOLDER};
pub use settings::{BotSettings, ConfigError, TelegramConfig};

/// Maximum number of buttons in one inline keyboard row.
pub const MAX_BUTTONS_PER_ROW: usize = 8;
