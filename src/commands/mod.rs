//! Command handling module.
//!
//! Parses `/repo` and the moderation commands (`/ban`, `/unban`, `/mute`,
//! `/unmute`, `/tmute`, `/kick`) and turns each into a single reply.

mod format;
mod handler;
mod resolver;
mod types;

pub use format::{mention, ModerationAction};
pub use handler::CommandHandler;
pub use resolver::{parse_duration, ResolveError, ResolvedTarget, TimedTarget};
pub use types::{BotCommand, Invocation, Reply, UrlButton};
