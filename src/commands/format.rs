//! Reply text for moderation commands.

use super::resolver::ResolvedTarget;
use crate::telegram::{ApiError, UserRef};

/// Reply sent when the invoker fails the permission gate.
pub const PERMISSION_DENIED: &str = "You don't have permission to perform this action.";

/// A moderation action as it appears in replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModerationAction {
    Ban,
    Unban,
    Mute,
    Unmute,
    TempMute,
    Kick,
}

impl ModerationAction {
    /// Verb used in the confirmation line.
    #[must_use]
    pub const fn past_tense(self) -> &'static str {
        match self {
            Self::Ban => "banned",
            Self::Unban => "unbanned",
            Self::Mute | Self::TempMute => "muted",
            Self::Unmute => "unmuted",
            Self::Kick => "kicked",
        }
    }

    /// Reply when the bot lacks the admin rights for this action.
    #[must_use]
    pub const fn admin_required(self) -> &'static str {
        match self {
            Self::Ban | Self::Unban | Self::Kick => "I need to be an admin with ban permissions.",
            Self::Mute | Self::TempMute => "I need to be an admin with mute permissions.",
            Self::Unmute => "I need to be an admin with unmute permissions.",
        }
    }

    /// Reply when the target is an admin, for actions that report it specifically.
    #[must_use]
    pub const fn target_is_admin(self) -> Option<&'static str> {
        match self {
            Self::Ban => Some("I cannot ban an admin."),
            Self::Mute | Self::TempMute => Some("I cannot mute an admin."),
            Self::Kick => Some("I cannot kick an admin."),
            Self::Unban | Self::Unmute => None,
        }
    }

    /// Maps a failed chat operation to the reply text.
    #[must_use]
    pub fn failure_message(self, error: &ApiError) -> String {
        match error {
            ApiError::AdminRequired => self.admin_required().to_owned(),
            ApiError::TargetIsAdmin => match self.target_is_admin() {
                Some(message) => message.to_owned(),
                None => generic_failure(error),
            },
            ApiError::Other(_) => generic_failure(error),
        }
    }
}

/// Renders a clickable mention of a user.
///
/// Markdown control characters in the name are backslash-escaped.
#[must_use]
pub fn mention(user_id: i64, name: &str) -> String {
    let mut escaped = String::with_capacity(name.len());
    for c in name.chars() {
        if matches!(c, '\\' | '[' | ']' | '*' | '_' | '`') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    format!("[{escaped}](tg://user?id={user_id})")
}

/// Builds the confirmation reply for a completed action.
///
/// `duration` is only given for temporary mutes.
#[must_use]
pub fn confirmation(
    target: &ResolvedTarget,
    admin: &UserRef,
    action: ModerationAction,
    duration: Option<&str>,
) -> String {
    let mut message = format!(
        "{} was {} by {}",
        mention(target.user_id, &target.display_name),
        action.past_tense(),
        mention(admin.id, &admin.display_name),
    );
    if let Some(duration) = duration {
        message.push_str(" for ");
        message.push_str(duration);
    }
    if let Some(reason) = &target.reason {
        message.push_str("\nReason: ");
        message.push_str(reason);
    }
    message
}

fn generic_failure(error: &ApiError) -> String {
    format!("An error occurred: {error}")
}
