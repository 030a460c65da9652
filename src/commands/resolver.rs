//! Target, reason and duration resolution for moderation commands.

use chrono::{DateTime, TimeDelta, Utc};
use thiserror::Error;
use tracing::debug;

use super::types::Invocation;
use crate::telegram::{ChatApi, UserRef};

/// Why a command could not be turned into a target.
///
/// The `Display` text is the reply sent back to the chat.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("Please specify a user or reply to a user's message.")]
    NoTarget,

    #[error("I can't find that user.")]
    UserNotFound,

    #[error("Usage: /tmute <user> <time> [reason]\nTime format: 10m, 1h, 2d")]
    TmuteUsage,

    #[error("Invalid time format. Use s, m, h, or d for seconds, minutes, hours, or days respectively.")]
    InvalidDuration,
}

/// The user a moderation command acts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget {
    pub user_id: i64,
    pub display_name: String,
    pub reason: Option<String>,
}

impl ResolvedTarget {
    fn new(user: UserRef, reason: Option<String>) -> Self {
        Self {
            user_id: user.id,
            display_name: user.display_name,
            reason,
        }
    }
}

/// A target plus the expiry of a temporary mute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimedTarget {
    pub target: ResolvedTarget,

    /// Duration token as typed, e.g. `10m`.
    pub duration_label: String,

    pub until: DateTime<Utc>,
}

/// Resolves the target and optional reason of `/ban`, `/mute` and friends.
///
/// `args` is the text following the command token.
pub async fn resolve_target<C: ChatApi + ?Sized>(
    api: &C,
    invocation: &Invocation,
    args: &str,
) -> Result<ResolvedTarget, ResolveError> {
    if let Some(author) = &invocation.reply_to {
        return Ok(ResolvedTarget::new(author.clone(), non_empty(args)));
    }

    let Some((reference, rest)) = split_first_token(args) else {
        return Err(ResolveError::NoTarget);
    };

    let user = lookup(api, reference).await?;
    Ok(ResolvedTarget::new(user, non_empty(rest)))
}

/// Resolves the target, duration and reason of `/tmute`.
///
/// Replying: `<time> [reason]`. Otherwise: `<user> <time> [reason]`.
pub async fn resolve_timed_target<C: ChatApi + ?Sized>(
    api: &C,
    invocation: &Invocation,
    args: &str,
) -> Result<TimedTarget, ResolveError> {
    let first = split_first_token(args);

    let (user, duration_token, rest) = match (&invocation.reply_to, first) {
        (Some(author), Some((token, rest))) => (author.clone(), token, rest),
        (None, Some((reference, after_user))) => {
            let Some((token, rest)) = split_first_token(after_user) else {
                return Err(ResolveError::TmuteUsage);
            };
            (lookup(api, reference).await?, token, rest)
        }
        _ => return Err(ResolveError::TmuteUsage),
    };

    let seconds = parse_duration(duration_token).ok_or(ResolveError::InvalidDuration)?;
    if seconds == 0 {
        return Err(ResolveError::InvalidDuration);
    }
    let delta = i64::try_from(seconds)
        .ok()
        .and_then(TimeDelta::try_seconds)
        .ok_or(ResolveError::InvalidDuration)?;
    let until = Utc::now()
        .checked_add_signed(delta)
        .ok_or(ResolveError::InvalidDuration)?;

    Ok(TimedTarget {
        target: ResolvedTarget::new(user, non_empty(rest)),
        duration_label: duration_token.to_owned(),
        until,
    })
}

/// Parses a duration token such as `30s`, `10m`, `2h` or `1d` into seconds.
///
/// The amount must be plain ASCII digits; anything else, including an
/// amount that overflows, is rejected.
#[must_use]
pub fn parse_duration(token: &str) -> Option<u64> {
    let mut chars = token.chars();
    let multiplier: u64 = match chars.next_back()? {
        's' => 1,
        'm' => 60,
        'h' => 60 * 60,
        'd' => 60 * 60 * 24,
        _ => return None,
    };

    let amount = chars.as_str();
    if amount.is_empty() || !amount.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    amount.parse::<u64>().ok()?.checked_mul(multiplier)
}

async fn lookup<C: ChatApi + ?Sized>(api: &C, reference: &str) -> Result<UserRef, ResolveError> {
    api.get_user(reference).await.map_err(|e| {
        debug!("User lookup for {:?} failed: {}", reference, e);
        ResolveError::UserNotFound
    })
}

/// Splits off the first whitespace-separated token, returning it and the trimmed rest.
fn split_first_token(text: &str) -> Option<(&str, &str)> {
    let text = text.trim_start();
    if text.is_empty() {
        return None;
    }
    match text.split_once(char::is_whitespace) {
        Some((token, rest)) => Some((token, rest.trim())),
        None => Some((text, "")),
    }
}

fn non_empty(text: &str) -> Option<String> {
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_owned())
}
