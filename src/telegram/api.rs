//! Chat operations the command handlers depend on.
//!
//! Handlers never talk to the Telegram client directly; they receive an
//! implementation of [`ChatApi`] so the moderation flow can be exercised
//! without a live connection.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Failure reported by a chat operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// The bot is not an administrator with the needed rights in this chat.
    #[error("the bot needs admin rights in this chat")]
    AdminRequired,

    /// The target is an administrator and cannot be acted on.
    #[error("the target user is an admin")]
    TargetIsAdmin,

    /// Any other failure, carrying the raw detail.
    #[error("{0}")]
    Other(String),
}

/// A Telegram user as seen by the handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRef {
    pub id: i64,
    pub display_name: String,
}

impl UserRef {
    #[must_use]
    pub fn new(id: i64, display_name: impl Into<String>) -> Self {
        Self {
            id,
            display_name: display_name.into(),
        }
    }
}

/// Membership status of a user in a chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberStatus {
    Owner,
    Administrator,
    Member,
    Restricted,
    Left,
    Banned,
}

impl MemberStatus {
    /// Returns true for owners and administrators.
    #[must_use]
    pub const fn is_privileged(self) -> bool {
        matches!(self, Self::Owner | Self::Administrator)
    }
}

/// A user's membership in a chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChatMember {
    pub status: MemberStatus,

    /// Whether the member may ban, mute and kick other members.
    pub can_restrict_members: bool,
}

/// Send permissions applied by a restrict call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChatPermissions {
    pub can_send_messages: bool,
    pub can_send_media_messages: bool,
    pub can_send_other_messages: bool,
    pub can_add_web_page_previews: bool,
}

impl ChatPermissions {
    /// No send permissions at all (mute).
    #[must_use]
    pub const fn none() -> Self {
        Self {
            can_send_messages: false,
            can_send_media_messages: false,
            can_send_other_messages: false,
            can_add_web_page_previews: false,
        }
    }

    /// Every send permission (unmute).
    #[must_use]
    pub const fn full() -> Self {
        Self {
            can_send_messages: true,
            can_send_media_messages: true,
            can_send_other_messages: true,
            can_add_web_page_previews: true,
        }
    }
}

/// Chat operations consumed by the command handlers.
#[async_trait]
pub trait ChatApi: Send + Sync {
    /// Looks up a user's membership in a chat.
    async fn get_member(&self, chat_id: i64, user_id: i64) -> Result<ChatMember, ApiError>;

    /// Resolves a user reference (numeric ID or username, with or without `@`).
    async fn get_user(&self, reference: &str) -> Result<UserRef, ApiError>;

    async fn ban_chat_member(&self, chat_id: i64, user_id: i64) -> Result<(), ApiError>;

    async fn unban_chat_member(&self, chat_id: i64, user_id: i64) -> Result<(), ApiError>;

    /// Applies `permissions` to the member, until `until` when given.
    async fn restrict_chat_member(
        &self,
        chat_id: i64,
        user_id: i64,
        permissions: ChatPermissions,
        until: Option<DateTime<Utc>>,
    ) -> Result<(), ApiError>;
}
