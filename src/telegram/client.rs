//! Telegram client wrapper for group moderation.

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use grammers_client::client::chats::ParticipantPermissions;
use grammers_client::grammers_tl_types as tl;
use grammers_client::types::{Chat, Message};
use grammers_client::{
    button, reply_markup, Client, Config, InitParams, InputMessage, InvocationError, Update,
};
use grammers_session::{PackedChat, Session};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::api::{ApiError, ChatApi, ChatMember, ChatPermissions, MemberStatus, UserRef};
use crate::commands::{Invocation, Reply};
use crate::config::TelegramConfig;

/// Errors that can occur while connecting or talking to Telegram.
#[derive(Debug, Error)]
pub enum TelegramError {
    #[error("Sign in failed: {0}")]
    SignInFailed(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Session error: {0}")]
    Session(String),

    #[error("API invocation error: {0}")]
    Invocation(#[from] InvocationError),
}

impl From<InvocationError> for ApiError {
    fn from(err: InvocationError) -> Self {
        match &err {
            InvocationError::Rpc(rpc) => classify_rpc_error(&rpc.name).unwrap_or_else(|| Self::Other(err.to_string())),
            _ => Self::Other(err.to_string()),
        }
    }
}

/// Maps the RPC error names that handlers reply to specifically.
fn classify_rpc_error(name: &str) -> Option<ApiError> {
    match name {
        "CHAT_ADMIN_REQUIRED" | "RIGHT_FORBIDDEN" => Some(ApiError::AdminRequired),
        "USER_ADMIN_INVALID" => Some(ApiError::TargetIsAdmin),
        _ => None,
    }
}

/// Upper bound on remembered chats and on remembered users.
const MAX_CACHED_PEERS: usize = 4096;

/// Maps a participant record to the member view handlers work with.
fn member_from_permissions(permissions: &ParticipantPermissions) -> ChatMember {
    use tl::enums::{ChannelParticipant, ChatAdminRights, ChatBannedRights, ChatParticipant};

    let status = match permissions {
        _ if permissions.is_creator() => MemberStatus::Owner,
        _ if permissions.is_admin() => MemberStatus::Administrator,
        _ if permissions.has_left() => MemberStatus::Left,
        ParticipantPermissions::Channel(ChannelParticipant::Banned(banned)) => {
            let ChatBannedRights::Rights(rights) = &banned.banned_rights;
            if rights.view_messages {
                MemberStatus::Banned
            } else {
                MemberStatus::Restricted
            }
        }
        _ => MemberStatus::Member,
    };

    // Basic groups have no per-admin rights; every admin may ban.
    let can_restrict_members = match permissions {
        ParticipantPermissions::Channel(ChannelParticipant::Creator(_))
        | ParticipantPermissions::Chat(ChatParticipant::Creator(_) | ChatParticipant::Admin(_)) => true,
        ParticipantPermissions::Channel(ChannelParticipant::Admin(admin)) => {
            let ChatAdminRights::Rights(rights) = &admin.admin_rights;
            rights.ban_users
        }
        _ => false,
    };

    ChatMember {
        status,
        can_restrict_members,
    }
}

/// Unix time for a restriction expiry, saturated to the range Telegram accepts.
///
/// Telegram treats anything more than a year ahead as permanent.
fn until_date(until: DateTime<Utc>) -> i32 {
    i32::try_from(until.timestamp().max(0)).unwrap_or(i32::MAX)
}

/// Only groups and channels have members to moderate.
fn group_peer(packed: PackedChat) -> Result<PackedChat, ApiError> {
    if packed.is_chat() || packed.is_channel() {
        Ok(packed)
    } else {
        Err(ApiError::Other("this command only works in groups".to_owned()))
    }
}

/// Name shown in mentions: the first name for users.
fn display_name(chat: &Chat) -> String {
    match chat {
        Chat::User(user) => user.first_name().to_owned(),
        other => other.name().to_owned(),
    }
}

/// Insertion-ordered map that forgets its oldest entries past `capacity`.
#[derive(Debug)]
struct BoundedMap<V> {
    entries: HashMap<i64, V>,
    order: VecDeque<i64>,
    capacity: usize,
}

impl<V> BoundedMap<V> {
    fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            capacity,
        }
    }

    fn insert(&mut self, id: i64, value: V) {
        if self.entries.insert(id, value).is_some() {
            return;
        }
        self.order.push_back(id);
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
            }
        }
    }

    fn get(&self, id: i64) -> Option<&V> {
        self.entries.get(&id)
    }
}

/// A user handle remembered from incoming messages.
#[derive(Debug, Clone)]
struct KnownUser {
    packed: PackedChat,
    display_name: String,
}

/// Packed peers seen so far, so handlers can address chats and users by ID.
#[derive(Debug)]
struct PeerCache {
    chats: BoundedMap<PackedChat>,
    users: BoundedMap<KnownUser>,
}

impl Default for PeerCache {
    fn default() -> Self {
        Self {
            chats: BoundedMap::new(MAX_CACHED_PEERS),
            users: BoundedMap::new(MAX_CACHED_PEERS),
        }
    }
}

/// High-level Telegram client wrapper.
pub struct TelegramBot {
    /// The underlying grammers client.
    client: Client,

    /// Where the session is saved after sign-in and on shutdown.
    session_path: PathBuf,

    peers: RwLock<PeerCache>,
}

impl TelegramBot {
    /// Connects to Telegram and signs in with the bot token if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if connection or sign-in fails.
    pub async fn connect(config: &TelegramConfig) -> Result<Self, TelegramError> {
        info!("Connecting to Telegram...");

        let session = Session::load_file_or_create(&config.session_path)
            .map_err(|e| TelegramError::Session(e.to_string()))?;

        let client = Client::connect(Config {
            session,
            api_id: config.api_id,
            api_hash: config.api_hash.clone(),
            params: InitParams {
                catch_up: false,
                ..InitParams::default()
            },
        })
        .await
        .map_err(|e| TelegramError::Connection(e.to_string()))?;

        let bot = Self {
            client,
            session_path: config.session_path.clone(),
            peers: RwLock::new(PeerCache::default()),
        };

        if bot.client.is_authorized().await? {
            info!("Connected to Telegram. Already authorized.");
        } else {
            info!("Signing in with bot token...");
            bot.client
                .bot_sign_in(&config.bot_token)
                .await
                .map_err(|e| TelegramError::SignInFailed(e.to_string()))?;
            bot.save_session()?;
            info!("Successfully signed in!");
        }

        Ok(bot)
    }

    /// Returns the bot's own username.
    ///
    /// # Errors
    ///
    /// Returns an error if the API call fails.
    pub async fn username(&self) -> Result<Option<String>, TelegramError> {
        let me = self.client.get_me().await?;
        Ok(me.username().map(ToOwned::to_owned))
    }

    /// Waits for the next incoming text message.
    ///
    /// # Errors
    ///
    /// Returns an error if the update stream fails.
    pub async fn next_message(&self) -> Result<Message, TelegramError> {
        loop {
            match self.client.next_update().await? {
                Update::NewMessage(message) if !message.outgoing() && !message.text().is_empty() => {
                    return Ok(message);
                }
                _ => {}
            }
        }
    }

    /// Builds an invocation from a message, remembering the peers it mentions.
    ///
    /// Returns `None` when the message was not sent by a user.
    pub async fn invocation(&self, message: &Message) -> Option<Invocation> {
        let chat = message.chat();
        let Some(sender @ Chat::User(_)) = message.sender() else {
            debug!("Ignoring message {} without a user sender", message.id());
            return None;
        };

        let reply_to = match message.get_reply().await {
            Ok(Some(replied)) => match replied.sender() {
                Some(author @ Chat::User(_)) => Some(self.remember_user(&author).await),
                _ => None,
            },
            Ok(None) => None,
            Err(e) => {
                warn!("Failed to fetch replied-to message in chat {}: {}", chat.id(), e);
                None
            }
        };

        self.peers.write().await.chats.insert(chat.id(), chat.pack());
        let sender = self.remember_user(&sender).await;

        Some(Invocation {
            chat_id: chat.id(),
            message_id: message.id(),
            text: message.text().to_owned(),
            sender,
            reply_to,
        })
    }

    /// Sends `reply` as a reply to `message`.
    ///
    /// # Errors
    ///
    /// Returns an error if the message cannot be sent.
    pub async fn send_reply(&self, message: &Message, reply: &Reply) -> Result<(), TelegramError> {
        let mut input = InputMessage::markdown(&reply.text);

        if let Some(url) = &reply.video_url {
            input = input.document_url(url.clone());
        }

        if !reply.buttons.is_empty() {
            let rows: Vec<Vec<_>> = reply
                .buttons
                .iter()
                .map(|row| {
                    row.iter()
                        .map(|b| button::url(b.text.clone(), b.url.clone()))
                        .collect()
                })
                .collect();
            input = input.reply_markup(&reply_markup::inline(rows));
        }

        message.reply(input).await?;
        Ok(())
    }

    /// Saves the session file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save_session(&self) -> Result<(), TelegramError> {
        self.client
            .session()
            .save_to_file(&self.session_path)
            .map_err(|e| TelegramError::Session(e.to_string()))
    }

    async fn remember_user(&self, chat: &Chat) -> UserRef {
        let user = UserRef::new(chat.id(), display_name(chat));
        self.peers.write().await.users.insert(
            user.id,
            KnownUser {
                packed: chat.pack(),
                display_name: user.display_name.clone(),
            },
        );
        user
    }

    async fn packed_chat(&self, chat_id: i64) -> Result<PackedChat, ApiError> {
        self.peers
            .read()
            .await
            .chats
            .get(chat_id)
            .copied()
            .ok_or_else(|| ApiError::Other(format!("unknown chat {chat_id}")))
            .and_then(group_peer)
    }

    async fn packed_user(&self, user_id: i64) -> Result<PackedChat, ApiError> {
        self.peers
            .read()
            .await
            .users
            .get(user_id)
            .map(|u| u.packed)
            .ok_or_else(|| ApiError::Other(format!("unknown user {user_id}")))
    }
}

#[async_trait]
impl ChatApi for TelegramBot {
    async fn get_member(&self, chat_id: i64, user_id: i64) -> Result<ChatMember, ApiError> {
        let chat = self.packed_chat(chat_id).await?;
        let user = self.packed_user(user_id).await?;

        let permissions = self.client.get_permissions(chat, user).await?;
        Ok(member_from_permissions(&permissions))
    }

    async fn get_user(&self, reference: &str) -> Result<UserRef, ApiError> {
        if let Ok(id) = reference.parse::<i64>() {
            return self
                .peers
                .read()
                .await
                .users
                .get(id)
                .map(|u| UserRef::new(id, u.display_name.clone()))
                .ok_or_else(|| ApiError::Other(format!("unknown user {id}")));
        }

        let username = reference.trim_start_matches('@');
        match self.client.resolve_username(username).await? {
            Some(chat @ Chat::User(_)) => Ok(self.remember_user(&chat).await),
            Some(_) => Err(ApiError::Other(format!("@{username} is not a user"))),
            None => Err(ApiError::Other(format!("no user named @{username}"))),
        }
    }

    async fn ban_chat_member(&self, chat_id: i64, user_id: i64) -> Result<(), ApiError> {
        let chat = self.packed_chat(chat_id).await?;
        let user = self.packed_user(user_id).await?;

        self.client
            .set_banned_rights(chat, user)
            .view_messages(false)
            .await?;
        Ok(())
    }

    async fn unban_chat_member(&self, chat_id: i64, user_id: i64) -> Result<(), ApiError> {
        let chat = self.packed_chat(chat_id).await?;
        let user = self.packed_user(user_id).await?;

        // A fresh builder grants every right, which lifts the ban.
        self.client.set_banned_rights(chat, user).await?;
        Ok(())
    }

    async fn restrict_chat_member(
        &self,
        chat_id: i64,
        user_id: i64,
        permissions: ChatPermissions,
        until: Option<DateTime<Utc>>,
    ) -> Result<(), ApiError> {
        let chat = self.packed_chat(chat_id).await?;
        let user = self.packed_user(user_id).await?;

        let mut rights = self
            .client
            .set_banned_rights(chat, user)
            .send_messages(permissions.can_send_messages)
            .send_media(permissions.can_send_media_messages)
            .send_stickers(permissions.can_send_other_messages)
            .send_gifs(permissions.can_send_other_messages)
            .embed_link_previews(permissions.can_add_web_page_previews);

        if let Some(until) = until {
            rights = rights.until(until_date(until));
        }

        rights.await?;
        Ok(())
    }
}

impl std::fmt::Debug for TelegramBot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramBot")
            .field("session_path", &self.session_path)
            .finish_non_exhaustive()
    }
}
