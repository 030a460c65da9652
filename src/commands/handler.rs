//! Command handler implementation.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::format::{confirmation, ModerationAction, PERMISSION_DENIED};
use super::resolver::{resolve_target, resolve_timed_target, ResolvedTarget};
use super::types::{BotCommand, Invocation, Reply};
use crate::config::{BotSettings, RepoCard};
use crate::telegram::{ApiError, ChatApi, ChatPermissions};

/// Turns command invocations into replies, calling the chat API on the way.
pub struct CommandHandler<C: ?Sized> {
    /// Command prefix (e.g., "`/`").
    prefix: String,

    /// Username of the bot, for `/cmd@username` addressing and the repo card.
    bot_username: Option<String>,

    /// Pause between ban and unban when kicking.
    kick_pause: Duration,

    /// Card sent in reply to `/repo`.
    repo_card: RepoCard,

    api: Arc<C>,
}

impl<C: ChatApi + ?Sized> CommandHandler<C> {
    /// Creates a new command handler.
    #[must_use]
    pub fn new(
        api: Arc<C>,
        settings: &BotSettings,
        repo_card: RepoCard,
        bot_username: Option<String>,
    ) -> Self {
        Self {
            prefix: settings.command_prefix.clone(),
            bot_username,
            kick_pause: settings.kick_pause(),
            repo_card,
            api,
        }
    }

    /// Whether `text` is one of our commands.
    pub fn recognizes(&self, text: &str) -> bool {
        BotCommand::parse(text, &self.prefix, self.bot_username.as_deref()).is_some()
    }

    /// Tries to parse and execute a command from an invocation.
    ///
    /// Returns `None` if the message is not one of our commands.
    pub async fn try_handle(&self, invocation: &Invocation) -> Option<Reply> {
        let (command, args) =
            BotCommand::parse(&invocation.text, &self.prefix, self.bot_username.as_deref())?;

        debug!("Handling command: {} (args: {:?})", command, args);
        let reply = self.execute(command, invocation, args).await;
        info!(
            "Handled /{} in chat {} from user {}",
            command, invocation.chat_id, invocation.sender.id
        );

        Some(reply)
    }

    /// Executes a parsed command.
    pub async fn execute(&self, command: BotCommand, invocation: &Invocation, args: &str) -> Reply {
        match command {
            BotCommand::Repo => self.handle_repo(),
            BotCommand::Ban => self.handle_ban(invocation, args).await,
            BotCommand::Unban => self.handle_unban(invocation, args).await,
            BotCommand::Mute => self.handle_mute(invocation, args).await,
            BotCommand::Unmute => self.handle_unmute(invocation, args).await,
            BotCommand::Tmute => self.handle_tmute(invocation, args).await,
            BotCommand::Kick => self.handle_kick(invocation, args).await,
        }
    }

    /// Permission gate: the invoker must be an owner or admin who can restrict members.
    ///
    /// On denial the returned reply is the only output of the command.
    async fn ensure_can_restrict(&self, invocation: &Invocation) -> Result<(), Reply> {
        match self
            .api
            .get_member(invocation.chat_id, invocation.sender.id)
            .await
        {
            Ok(member) if member.status.is_privileged() && member.can_restrict_members => Ok(()),
            Ok(member) => {
                debug!(
                    "User {} denied in chat {} (status: {:?}, can_restrict: {})",
                    invocation.sender.id,
                    invocation.chat_id,
                    member.status,
                    member.can_restrict_members
                );
                Err(Reply::text(PERMISSION_DENIED))
            }
            Err(e) => {
                warn!(
                    "Permission lookup for user {} in chat {} failed: {}",
                    invocation.sender.id, invocation.chat_id, e
                );
                Err(Reply::text(PERMISSION_DENIED))
            }
        }
    }

    fn handle_repo(&self) -> Reply {
        self.repo_card.to_reply(self.bot_username.as_deref())
    }

    async fn handle_ban(&self, invocation: &Invocation, args: &str) -> Reply {
        if let Err(denied) = self.ensure_can_restrict(invocation).await {
            return denied;
        }
        let target = match resolve_target(&*self.api, invocation, args).await {
            Ok(target) => target,
            Err(e) => return Reply::text(e.to_string()),
        };

        let result = self
            .api
            .ban_chat_member(invocation.chat_id, target.user_id)
            .await;
        report(ModerationAction::Ban, invocation, &target, None, result)
    }

    async fn handle_unban(&self, invocation: &Invocation, args: &str) -> Reply {
        if let Err(denied) = self.ensure_can_restrict(invocation).await {
            return denied;
        }
        let target = match resolve_target(&*self.api, invocation, args).await {
            Ok(target) => target,
            Err(e) => return Reply::text(e.to_string()),
        };

        let result = self
            .api
            .unban_chat_member(invocation.chat_id, target.user_id)
            .await;
        report(ModerationAction::Unban, invocation, &target, None, result)
    }

    async fn handle_mute(&self, invocation: &Invocation, args: &str) -> Reply {
        if let Err(denied) = self.ensure_can_restrict(invocation).await {
            return denied;
        }
        let target = match resolve_target(&*self.api, invocation, args).await {
            Ok(target) => target,
            Err(e) => return Reply::text(e.to_string()),
        };

        let result = self
            .api
            .restrict_chat_member(invocation.chat_id, target.user_id, ChatPermissions::none(), None)
            .await;
        report(ModerationAction::Mute, invocation, &target, None, result)
    }

    async fn handle_unmute(&self, invocation: &Invocation, args: &str) -> Reply {
        if let Err(denied) = self.ensure_can_restrict(invocation).await {
            return denied;
        }
        let target = match resolve_target(&*self.api, invocation, args).await {
            Ok(target) => target,
            Err(e) => return Reply::text(e.to_string()),
        };

        let result = self
            .api
            .restrict_chat_member(invocation.chat_id, target.user_id, ChatPermissions::full(), None)
            .await;
        report(ModerationAction::Unmute, invocation, &target, None, result)
    }

    async fn handle_tmute(&self, invocation: &Invocation, args: &str) -> Reply {
        if let Err(denied) = self.ensure_can_restrict(invocation).await {
            return denied;
        }
        let timed = match resolve_timed_target(&*self.api, invocation, args).await {
            Ok(timed) => timed,
            Err(e) => return Reply::text(e.to_string()),
        };

        let result = self
            .api
            .restrict_chat_member(
                invocation.chat_id,
                timed.target.user_id,
                ChatPermissions::none(),
                Some(timed.until),
            )
            .await;
        report(
            ModerationAction::TempMute,
            invocation,
            &timed.target,
            Some(timed.duration_label.as_str()),
            result,
        )
    }

    /// Kick is a ban followed by an unban after a short fixed pause.
    ///
    /// The pause is best effort; there is no confirmation that the ban
    /// landed before the unban is sent.
    async fn handle_kick(&self, invocation: &Invocation, args: &str) -> Reply {
        if let Err(denied) = self.ensure_can_restrict(invocation).await {
            return denied;
        }
        let target = match resolve_target(&*self.api, invocation, args).await {
            Ok(target) => target,
            Err(e) => return Reply::text(e.to_string()),
        };

        let result = self.kick(invocation.chat_id, &target).await;
        report(ModerationAction::Kick, invocation, &target, None, result)
    }

    async fn kick(&self, chat_id: i64, target: &ResolvedTarget) -> Result<(), ApiError> {
        let member = self.api.get_member(chat_id, target.user_id).await?;
        if member.status.is_privileged() {
            return Err(ApiError::TargetIsAdmin);
        }

        self.api.ban_chat_member(chat_id, target.user_id).await?;
        tokio::time::sleep(self.kick_pause).await;
        self.api.unban_chat_member(chat_id, target.user_id).await
    }
}

/// Builds the reply for the outcome of a moderation primitive.
fn report(
    action: ModerationAction,
    invocation: &Invocation,
    target: &ResolvedTarget,
    duration: Option<&str>,
    result: Result<(), ApiError>,
) -> Reply {
    match result {
        Ok(()) => {
            info!(
                "User {} {} in chat {} by {}",
                target.user_id,
                action.past_tense(),
                invocation.chat_id,
                invocation.sender.id
            );
            Reply::text(confirmation(target, &invocation.sender, action, duration))
        }
        Err(e) => {
            warn!(
                "Failed to apply {:?} to user {} in chat {}: {}",
                action, target.user_id, invocation.chat_id, e
            );
            Reply::text(action.failure_message(&e))
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeDelta, Utc};

    use super::*;
    use crate::telegram::fake::{Call, FakeChatApi};
    use crate::telegram::{MemberStatus, UserRef};

    const CHAT: i64 = -100_123;
    const ADMIN: i64 = 1;

    fn setup(api: FakeChatApi) -> (CommandHandler<FakeChatApi>, Arc<FakeChatApi>) {
        let api = Arc::new(api);
        let settings = BotSettings {
            kick_pause_ms: 0,
            ..BotSettings::default()
        };
        let handler = CommandHandler::new(Arc::clone(&api), &settings, RepoCard::example(), Some("ModBot".to_owned()));
        (handler, api)
    }

    fn invocation(text: &str, reply_to: Option<UserRef>) -> Invocation {
        Invocation {
            chat_id: CHAT,
            message_id: 10,
            text: text.to_owned(),
            sender: UserRef::new(ADMIN, "Admin"),
            reply_to,
        }
    }

    fn alice() -> UserRef {
        UserRef::new(42, "Alice")
    }

    fn bob() -> UserRef {
        UserRef::new(43, "Bob")
    }

    #[tokio::test]
    async fn test_ban_reply_without_reason() {
        let (handler, api) = setup(FakeChatApi::new().with_admin(ADMIN));

        let reply = handler.try_handle(&invocation("/ban", Some(alice()))).await.unwrap();

        assert_eq!(api.calls(), vec![Call::Ban { chat_id: CHAT, user_id: 42 }]);
        assert!(reply.text.starts_with("[Alice](tg://user?id=42)"));
        assert!(!reply.text.contains("Reason:"));
    }

    #[tokio::test]
    async fn test_tmute_reply_with_duration_and_reason() {
        let (handler, api) = setup(FakeChatApi::new().with_admin(ADMIN));

        let before = Utc::now();
        let reply = handler
            .try_handle(&invocation("/tmute 10m spamming", Some(bob())))
            .await
            .unwrap();
        let after = Utc::now();

        let calls = api.calls();
        assert_eq!(calls.len(), 1);
        let Call::Restrict { user_id, permissions, until: Some(until), .. } = &calls[0] else {
            panic!("expected a timed restrict, got {calls:?}");
        };
        assert_eq!(*user_id, 43);
        assert_eq!(*permissions, ChatPermissions::none());
        assert!(*until >= before + TimeDelta::seconds(600));
        assert!(*until <= after + TimeDelta::seconds(600));

        assert!(reply.text.contains("for 10m"));
        assert!(reply.text.ends_with("\nReason: spamming"));
    }

    #[tokio::test]
    async fn test_mute_unknown_user() {
        let (handler, api) = setup(FakeChatApi::new().with_admin(ADMIN));

        let reply = handler.try_handle(&invocation("/mute @unknownuser", None)).await.unwrap();

        assert_eq!(reply.text, "I can't find that user.");
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_no_target_makes_no_calls() {
        let (handler, api) = setup(FakeChatApi::new().with_admin(ADMIN));

        let reply = handler.try_handle(&invocation("/ban", None)).await.unwrap();

        assert_eq!(reply.text, "Please specify a user or reply to a user's message.");
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_permission_gate_blocks_every_action() {
        let api = FakeChatApi::new()
            .with_member(ADMIN, MemberStatus::Member, false)
            .with_user("alice", alice());
        let (handler, api) = setup(api);

        for text in ["/ban @alice", "/unban @alice", "/mute @alice", "/unmute @alice", "/tmute @alice 5m", "/kick @alice"] {
            let reply = handler.try_handle(&invocation(text, None)).await.unwrap();
            assert_eq!(reply.text, PERMISSION_DENIED, "command {text}");
        }
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_permission_gate_requires_restrict_right() {
        let api = FakeChatApi::new().with_member(ADMIN, MemberStatus::Administrator, false);
        let (handler, api) = setup(api);

        let reply = handler.try_handle(&invocation("/ban", Some(alice()))).await.unwrap();

        assert_eq!(reply.text, PERMISSION_DENIED);
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_failed_member_lookup_is_denied() {
        let api = FakeChatApi::new()
            .failing_member_lookup_with(ApiError::Other("this command only works in groups".to_owned()));
        let (handler, api) = setup(api);

        let reply = handler.try_handle(&invocation("/ban", Some(alice()))).await.unwrap();

        assert_eq!(reply.text, PERMISSION_DENIED);
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_owner_passes_gate() {
        let api = FakeChatApi::new().with_member(ADMIN, MemberStatus::Owner, true);
        let (handler, api) = setup(api);

        handler.try_handle(&invocation("/unban", Some(alice()))).await.unwrap();

        assert_eq!(api.calls(), vec![Call::Unban { chat_id: CHAT, user_id: 42 }]);
    }

    #[tokio::test]
    async fn test_mute_and_unmute_permissions() {
        let (handler, api) = setup(FakeChatApi::new().with_admin(ADMIN));

        let muted = handler.try_handle(&invocation("/mute flood", Some(alice()))).await.unwrap();
        let unmuted = handler.try_handle(&invocation("/unmute", Some(alice()))).await.unwrap();

        assert_eq!(
            api.calls(),
            vec![
                Call::Restrict {
                    chat_id: CHAT,
                    user_id: 42,
                    permissions: ChatPermissions::none(),
                    until: None,
                },
                Call::Restrict {
                    chat_id: CHAT,
                    user_id: 42,
                    permissions: ChatPermissions::full(),
                    until: None,
                },
            ]
        );
        assert!(muted.text.contains(" was muted by "));
        assert!(muted.text.ends_with("\nReason: flood"));
        assert!(unmuted.text.contains(" was unmuted by "));
    }

    #[tokio::test]
    async fn test_kick_bans_then_unbans() {
        let api = FakeChatApi::new().with_admin(ADMIN).with_user("alice", alice());
        let (handler, api) = setup(api);

        let reply = handler.try_handle(&invocation("/kick @alice rude", None)).await.unwrap();

        assert_eq!(
            api.calls(),
            vec![
                Call::Ban { chat_id: CHAT, user_id: 42 },
                Call::Unban { chat_id: CHAT, user_id: 42 },
            ]
        );
        assert_eq!(
            reply.text,
            "[Alice](tg://user?id=42) was kicked by [Admin](tg://user?id=1)\nReason: rude"
        );
    }

    #[tokio::test]
    async fn test_kick_never_bans_admins() {
        for status in [MemberStatus::Administrator, MemberStatus::Owner] {
            let api = FakeChatApi::new()
                .with_admin(ADMIN)
                .with_member(42, status, false);
            let (handler, api) = setup(api);

            let reply = handler.try_handle(&invocation("/kick", Some(alice()))).await.unwrap();

            assert_eq!(reply.text, "I cannot kick an admin.");
            assert!(api.calls().is_empty());
        }
    }

    #[tokio::test]
    async fn test_external_failures() {
        let api = FakeChatApi::new().with_admin(ADMIN).failing_with(ApiError::AdminRequired);
        let (handler, _) = setup(api);
        let reply = handler.try_handle(&invocation("/mute", Some(alice()))).await.unwrap();
        assert_eq!(reply.text, "I need to be an admin with mute permissions.");

        let api = FakeChatApi::new().with_admin(ADMIN).failing_with(ApiError::TargetIsAdmin);
        let (handler, _) = setup(api);
        let reply = handler.try_handle(&invocation("/ban", Some(alice()))).await.unwrap();
        assert_eq!(reply.text, "I cannot ban an admin.");

        let api = FakeChatApi::new()
            .with_admin(ADMIN)
            .failing_with(ApiError::Other("USER_NOT_PARTICIPANT".to_owned()));
        let (handler, _) = setup(api);
        let reply = handler.try_handle(&invocation("/unmute", Some(alice()))).await.unwrap();
        assert_eq!(reply.text, "An error occurred: USER_NOT_PARTICIPANT");
    }

    #[tokio::test]
    async fn test_tmute_invalid_duration_makes_no_calls() {
        let (handler, api) = setup(FakeChatApi::new().with_admin(ADMIN));

        let reply = handler.try_handle(&invocation("/tmute 10w", Some(bob()))).await.unwrap();

        assert!(reply.text.starts_with("Invalid time format."));
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_repo_skips_gate() {
        let (handler, api) = setup(FakeChatApi::new());

        let reply = handler.try_handle(&invocation("/repo", None)).await.unwrap();

        assert!(reply.video_url.is_some());
        assert_eq!(reply.buttons[0][0].url, "https://t.me/ModBot?startgroup=true");
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_non_command_is_ignored() {
        let (handler, _) = setup(FakeChatApi::new().with_admin(ADMIN));
        assert!(!handler.recognizes("hello there"));
        assert!(handler.recognizes("/tmute@ModBot 5m"));
        assert!(handler.try_handle(&invocation("hello there", None)).await.is_none());
        assert!(handler.try_handle(&invocation("/ban@OtherBot", Some(alice()))).await.is_none());
    }
}
