//! Command types and definitions.

use std::fmt;

use crate::telegram::UserRef;

/// Available bot commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotCommand {
    /// Show the repository card (video, caption, link buttons).
    Repo,

    /// Permanently ban a user.
    Ban,

    /// Lift a ban.
    Unban,

    /// Remove all send permissions indefinitely.
    Mute,

    /// Restore send permissions.
    Unmute,

    /// Mute until a computed expiry.
    Tmute,

    /// Remove a user without banning them permanently.
    Kick,
}

impl BotCommand {
    /// Parses a command from message text.
    ///
    /// Accepts `/cmd` and `/cmd@bot_username` (case-insensitive). A suffix
    /// addressed to another bot is not ours. Returns the command together
    /// with the text following the command token.
    #[must_use]
    pub fn parse<'a>(text: &'a str, prefix: &str, bot_username: Option<&str>) -> Option<(Self, &'a str)> {
        let text = text.trim_start();
        let after_prefix = text.strip_prefix(prefix)?;

        let (token, args) = match after_prefix.split_once(char::is_whitespace) {
            Some((token, args)) => (token, args.trim()),
            None => (after_prefix, ""),
        };

        let name = match token.split_once('@') {
            Some((name, addressee)) => {
                let ours = bot_username
                    .is_some_and(|username| username.eq_ignore_ascii_case(addressee));
                if !ours {
                    return None;
                }
                name
            }
            None => token,
        };

        let command = match name.to_lowercase().as_str() {
            "repo" => Self::Repo,
            "ban" => Self::Ban,
            "unban" => Self::Unban,
            "mute" => Self::Mute,
            "unmute" => Self::Unmute,
            "tmute" => Self::Tmute,
            "kick" => Self::Kick,
            _ => return None,
        };

        Some((command, args))
    }

    /// Returns the command name as typed by users.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Repo => "repo",
            Self::Ban => "ban",
            Self::Unban => "unban",
            Self::Mute => "mute",
            Self::Unmute => "unmute",
            Self::Tmute => "tmute",
            Self::Kick => "kick",
        }
    }
}

impl fmt::Display for BotCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An incoming command message.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub chat_id: i64,
    pub message_id: i32,

    /// Raw message text, command token included.
    pub text: String,

    /// User who sent the command.
    pub sender: UserRef,

    /// Author of the message being replied to, if any.
    pub reply_to: Option<UserRef>,
}

/// A URL button in an inline keyboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlButton {
    pub text: String,
    pub url: String,
}

/// The single reply produced for an invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Markdown text, or the caption when media is attached.
    pub text: String,

    /// Video sent alongside the text.
    pub video_url: Option<String>,

    /// Rows of URL buttons.
    pub buttons: Vec<Vec<UrlButton>>,
}

impl Reply {
    /// Creates a plain text reply.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            video_url: None,
            buttons: Vec::new(),
        }
    }
}
