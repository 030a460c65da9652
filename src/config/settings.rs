//! Application settings and Telegram configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Telegram API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Telegram API ID (obtain from <https://my.telegram.org>).
    pub api_id: i32,

    /// Telegram API hash (obtain from <https://my.telegram.org>).
    pub api_hash: String,

    /// Bot token issued by @BotFather.
    pub bot_token: String,

    /// Path to the session file.
    #[serde(default = "default_session_path")]
    pub session_path: PathBuf,
}

fn default_session_path() -> PathBuf {
    PathBuf::from("bot.session")
}

impl TelegramConfig {
    /// Creates a new Telegram configuration.
    #[must_use]
    pub fn new(api_id: i32, api_hash: String, bot_token: String) -> Self {
        Self {
            api_id,
            api_hash,
            bot_token,
            session_path: default_session_path(),
        }
    }

    /// Creates configuration from environment variables.
    ///
    /// Expects `TG_API_ID`, `TG_API_HASH` and `TG_BOT_TOKEN` to be set.
    ///
    /// # Errors
    ///
    /// Returns an error if environment variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_id: i32 = std::env::var("TG_API_ID")
            .map_err(|_| ConfigError::MissingEnvVar("TG_API_ID"))?
            .parse()
            .map_err(|_| ConfigError::InvalidApiId)?;

        let api_hash = std::env::var("TG_API_HASH")
            .map_err(|_| ConfigError::MissingEnvVar("TG_API_HASH"))?;

        let bot_token = std::env::var("TG_BOT_TOKEN")
            .map_err(|_| ConfigError::MissingEnvVar("TG_BOT_TOKEN"))?;
        if !looks_like_bot_token(&bot_token) {
            return Err(ConfigError::InvalidBotToken);
        }

        let session_path = std::env::var("TG_SESSION_PATH").map_or_else(|_| default_session_path(), PathBuf::from);

        Ok(Self {
            api_id,
            api_hash,
            bot_token,
            session_path,
        })
    }
}

/// Bot tokens look like `123456:ABC-DEF...`.
fn looks_like_bot_token(token: &str) -> bool {
    token.split_once(':').is_some_and(|(id, secret)| {
        !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit()) && !secret.is_empty()
    })
}

/// Bot-specific settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotSettings {
    /// Command prefix for bot commands.
    #[serde(default = "default_command_prefix")]
    pub command_prefix: String,

    /// Pause between the ban and unban halves of a kick, in milliseconds.
    #[serde(default = "default_kick_pause_ms")]
    pub kick_pause_ms: u64,
}

fn default_command_prefix() -> String {
    "/".to_owned()
}

fn default_kick_pause_ms() -> u64 {
    100
}

impl Default for BotSettings {
    fn default() -> Self {
        Self {
            command_prefix: default_command_prefix(),
            kick_pause_ms: default_kick_pause_ms(),
        }
    }
}

impl BotSettings {
    /// Creates bot settings from environment variables with defaults.
    #[must_use]
    pub fn from_env_with_defaults() -> Self {
        Self {
            command_prefix: std::env::var("COMMAND_PREFIX")
                .ok()
                .filter(|p| !p.is_empty())
                .unwrap_or_else(default_command_prefix),
            kick_pause_ms: std::env::var("KICK_PAUSE_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_else(default_kick_pause_ms),
        }
    }

    /// Pause between ban and unban when kicking.
    #[must_use]
    pub const fn kick_pause(&self) -> Duration {
        Duration::from_millis(self.kick_pause_ms)
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Invalid API ID format (must be a positive integer)")]
    InvalidApiId,

    #[error("Invalid bot token format (expected <id>:<secret>)")]
    InvalidBotToken,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = BotSettings::default();
        assert_eq!(settings.command_prefix, "/");
        assert_eq!(settings.kick_pause(), Duration::from_millis(100));
    }

    #[test]
    fn test_telegram_config_new() {
        let config = TelegramConfig::new(12345, "abc123".to_owned(), "1:xyz".to_owned());
        assert_eq!(config.api_id, 12345);
        assert_eq!(config.api_hash, "abc123");
        assert_eq!(config.session_path, PathBuf::from("bot.session"));
    }

    #[test]
    fn test_bot_token_shape() {
        assert!(looks_like_bot_token("123456:ABC-DEF1234ghIkl"));
        assert!(!looks_like_bot_token("123456"));
        assert!(!looks_like_bot_token(":secret"));
        assert!(!looks_like_bot_token("abc:secret"));
        assert!(!looks_like_bot_token("123:"));
    }
}
