//! Telegram client wrapper module.
//!
//! Defines the chat operations the command handlers rely on and
//! implements them on top of the grammers MTProto client.

mod api;
mod client;
#[cfg(test)]
pub(crate) mod fake;

pub use api::{ApiError, ChatApi, ChatMember, ChatPermissions, MemberStatus, UserRef};
pub use client::{TelegramBot, TelegramError};
