//! In-memory [`ChatApi`] used by the handler tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::api::{ApiError, ChatApi, ChatMember, ChatPermissions, MemberStatus, UserRef};

/// A moderation call recorded by [`FakeChatApi`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Ban { chat_id: i64, user_id: i64 },
    Unban { chat_id: i64, user_id: i64 },
    Restrict {
        chat_id: i64,
        user_id: i64,
        permissions: ChatPermissions,
        until: Option<DateTime<Utc>>,
    },
}

#[derive(Debug, Default)]
pub struct FakeChatApi {
    members: HashMap<i64, ChatMember>,
    users: HashMap<String, UserRef>,
    failure: Option<ApiError>,
    member_failure: Option<ApiError>,
    calls: Mutex<Vec<Call>>,
}

impl FakeChatApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a chat member with the given status.
    pub fn with_member(mut self, user_id: i64, status: MemberStatus, can_restrict: bool) -> Self {
        self.members.insert(
            user_id,
            ChatMember {
                status,
                can_restrict_members: can_restrict,
            },
        );
        self
    }

    /// Registers an admin who may restrict members.
    pub fn with_admin(self, user_id: i64) -> Self {
        self.with_member(user_id, MemberStatus::Administrator, true)
    }

    /// Makes `user` resolvable by its ID and by `username`.
    pub fn with_user(mut self, username: &str, user: UserRef) -> Self {
        self.users.insert(user.id.to_string(), user.clone());
        self.users.insert(username.to_lowercase(), user);
        self
    }

    /// Makes every moderation call fail with `error`.
    pub fn failing_with(mut self, error: ApiError) -> Self {
        self.failure = Some(error);
        self
    }

    /// Makes every member lookup fail with `error`.
    pub fn failing_member_lookup_with(mut self, error: ApiError) -> Self {
        self.member_failure = Some(error);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn record(&self, call: Call) -> Result<(), ApiError> {
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
        Ok(())
    }
}

#[async_trait]
impl ChatApi for FakeChatApi {
    async fn get_member(&self, _chat_id: i64, user_id: i64) -> Result<ChatMember, ApiError> {
        if let Some(err) = &self.member_failure {
            return Err(err.clone());
        }
        Ok(self.members.get(&user_id).copied().unwrap_or(ChatMember {
            status: MemberStatus::Member,
            can_restrict_members: false,
        }))
    }

    async fn get_user(&self, reference: &str) -> Result<UserRef, ApiError> {
        let key = reference.trim_start_matches('@').to_lowercase();
        self.users
            .get(&key)
            .cloned()
            .ok_or_else(|| ApiError::Other(format!("USERNAME_NOT_OCCUPIED: {reference}")))
    }

    async fn ban_chat_member(&self, chat_id: i64, user_id: i64) -> Result<(), ApiError> {
        self.record(Call::Ban { chat_id, user_id })
    }

    async fn unban_chat_member(&self, chat_id: i64, user_id: i64) -> Result<(), ApiError> {
        self.record(Call::Unban { chat_id, user_id })
    }

    async fn restrict_chat_member(
        &self,
        chat_id: i64,
        user_id: i64,
        permissions: ChatPermissions,
        until: Option<DateTime<Utc>>,
    ) -> Result<(), ApiError> {
        self.record(Call::Restrict {
            chat_id,
            user_id,
            permissions,
            until,
        })
    }
}
