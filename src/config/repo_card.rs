//! Repository card shown by `/repo`.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::MAX_BUTTONS_PER_ROW;
use crate::commands::{Reply, UrlButton};

/// Placeholder replaced with the bot's username in button URLs.
pub const BOT_USERNAME_PLACEHOLDER: &str = "{bot_username}";

/// Errors that can occur while loading or validating the repo card.
#[derive(Debug, Error)]
pub enum RepoCardError {
    #[error("Repo card caption is empty")]
    EmptyCaption,

    #[error("Button in row {row}, column {column} has no text")]
    EmptyButtonText { row: usize, column: usize },

    #[error("Button \"{text}\" has an unsupported URL: {url}")]
    InvalidButtonUrl { text: String, url: String },

    #[error("Row {row} has {count} buttons (max: {max})")]
    RowTooWide { row: usize, count: usize, max: usize },

    #[error("Failed to read repo card file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse repo card file: {0}")]
    ParseError(#[from] serde_json::Error),
}

/// A link button on the card.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CardButton {
    pub text: String,
    pub url: String,
}

impl CardButton {
    #[must_use]
    pub fn new(text: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            url: url.into(),
        }
    }
}

/// Video, caption and link keyboard sent in reply to `/repo`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RepoCard {
    /// Caption under the video (markdown).
    pub caption: String,

    /// Video sent with the caption; text only when absent.
    #[serde(default)]
    pub video_url: Option<String>,

    /// Rows of link buttons.
    #[serde(default)]
    pub buttons: Vec<Vec<CardButton>>,
}

impl Default for RepoCard {
    fn default() -> Self {
        Self {
            caption: "**✪ Moderation Bot ✪**\n\nBan, mute and kick helpers for your group.".to_owned(),
            video_url: None,
            buttons: vec![
                vec![CardButton::new(
                    "Add me to your group",
                    format!("https://t.me/{BOT_USERNAME_PLACEHOLDER}?startgroup=true"),
                )],
                vec![CardButton::new("Source", "https://github.com/user/moderation_bot")],
            ],
        }
    }
}

impl RepoCard {
    /// Loads the card from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, RepoCardError> {
        let content = std::fs::read_to_string(path)?;
        let card: Self = serde_json::from_str(&content)?;
        Ok(card)
    }

    /// Saves the card to a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), RepoCardError> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validates caption and buttons.
    ///
    /// # Errors
    ///
    /// Returns the first validation error encountered.
    pub fn validate(&self) -> Result<(), RepoCardError> {
        if self.caption.trim().is_empty() {
            return Err(RepoCardError::EmptyCaption);
        }

        for (row, buttons) in self.buttons.iter().enumerate() {
            if buttons.len() > MAX_BUTTONS_PER_ROW {
                return Err(RepoCardError::RowTooWide {
                    row,
                    count: buttons.len(),
                    max: MAX_BUTTONS_PER_ROW,
                });
            }

            for (column, button) in buttons.iter().enumerate() {
                if button.text.trim().is_empty() {
                    return Err(RepoCardError::EmptyButtonText { row, column });
                }
                if !is_supported_url(&button.url) {
                    return Err(RepoCardError::InvalidButtonUrl {
                        text: button.text.clone(),
                        url: button.url.clone(),
                    });
                }
            }
        }

        Ok(())
    }

    /// Creates an example card with a video and several button rows.
    #[must_use]
    pub fn example() -> Self {
        Self {
            caption: "**✪ Moderation Bot ✪**\n\nKeeps your group tidy.".to_owned(),
            video_url: Some("https://example.com/intro.mp4".to_owned()),
            buttons: vec![
                vec![CardButton::new(
                    "Add me to your group",
                    format!("https://t.me/{BOT_USERNAME_PLACEHOLDER}?startgroup=true"),
                )],
                vec![
                    CardButton::new("Owner", "https://t.me/example_owner"),
                    CardButton::new("Support", "https://t.me/example_support"),
                ],
                vec![CardButton::new("Source", "https://github.com/user/moderation_bot")],
            ],
        }
    }

    /// Renders the card as a reply, filling in the bot username.
    #[must_use]
    pub fn to_reply(&self, bot_username: Option<&str>) -> Reply {
        let username = bot_username.unwrap_or_default();
        Reply {
            text: self.caption.clone(),
            video_url: self.video_url.clone(),
            buttons: self
                .buttons
                .iter()
                .map(|row| {
                    row.iter()
                        .map(|button| UrlButton {
                            text: button.text.clone(),
                            url: button.url.replace(BOT_USERNAME_PLACEHOLDER, username),
                        })
                        .collect()
                })
                .collect(),
        }
    }
}

fn is_supported_url(url: &str) -> bool {
    ["https://", "http://", "tg://"]
        .iter()
        .any(|scheme| url.starts_with(scheme) && url.len() > scheme.len())
}
