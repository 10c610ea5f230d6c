//! コマンド・コンポーネントハンドラーの定義
//!
//! すべてのコマンドは `Command` を、ボタン・セレクトメニューのハンドラーは
//! `ComponentHandler` を実装する。`D` はプラットフォーム固有のイベントデータ
//! （本番では `handler::SerenityEvent`）で、ハンドラーにそのまま渡される。

use async_trait::async_trait;
use serde::Serialize;
use serenity::builder::CreateCommandOption;
use serenity::model::id::{ChannelId, GuildId, InteractionId, UserId};
use serenity::model::permissions::Permissions;
use std::time::Duration;

/// コマンドの種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandKind {
    /// スラッシュコマンド
    Slash,
    /// ユーザーのコンテキストメニュー
    ContextMenuUser,
    /// メッセージのコンテキストメニュー
    ContextMenuMessage,
    /// プレフィックス付きテキストコマンド（Discordには登録しない）
    Text,
}

impl CommandKind {
    /// アプリケーションコマンド（リモート登録対象）かどうか
    pub fn is_application(self) -> bool {
        !matches!(self, CommandKind::Text)
    }
}

/// 実行可能な場所
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandScope {
    /// どこでも
    #[default]
    Any,
    /// サーバー内のみ
    GuildOnly,
    /// DMのみ
    DmOnly,
}

impl CommandScope {
    /// 実行場所がスコープに合うか
    pub fn allows(self, in_guild: bool) -> bool {
        match self {
            CommandScope::Any => true,
            CommandScope::GuildOnly => in_guild,
            CommandScope::DmOnly => !in_guild,
        }
    }
}

/// コマンドのメタデータ
#[derive(Debug, Clone)]
pub struct CommandData {
    pub name: String,
    /// テキストコマンドの別名
    pub aliases: Vec<String>,
    pub description: String,
    pub kind: CommandKind,
    /// スラッシュコマンドのオプション
    pub options: Vec<CreateCommandOption>,
    /// 宣言上のデフォルト許可（ユーザー権限がある場合は登録時にfalseになる）
    pub default_permission: bool,
    pub category: Option<String>,
    /// 実行ユーザーに必要な権限（宣言順に確認）
    pub user_permissions: Vec<Permissions>,
    /// ボットに必要な権限（宣言順に確認）
    pub bot_permissions: Vec<Permissions>,
    pub cooldown: Duration,
    pub scope: CommandScope,
    /// ボット管理者のみ実行可能
    pub admins_only: bool,
}

impl CommandData {
    fn new(name: impl Into<String>, kind: CommandKind) -> Self {
        Self {
            name: name.into(),
            aliases: Vec::new(),
            description: String::new(),
            kind,
            options: Vec::new(),
            default_permission: true,
            category: None,
            user_permissions: Vec::new(),
            bot_permissions: Vec::new(),
            cooldown: Duration::ZERO,
            scope: CommandScope::Any,
            admins_only: false,
        }
    }

    /// スラッシュコマンド
    pub fn slash(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(name, CommandKind::Slash).description(description)
    }

    /// ユーザーのコンテキストメニュー
    pub fn user_context(name: impl Into<String>) -> Self {
        Self::new(name, CommandKind::ContextMenuUser)
    }

    /// メッセージのコンテキストメニュー
    pub fn message_context(name: impl Into<String>) -> Self {
        Self::new(name, CommandKind::ContextMenuMessage)
    }

    /// テキストコマンド
    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, CommandKind::Text)
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    pub fn option(mut self, option: CreateCommandOption) -> Self {
        self.options.push(option);
        self
    }

    pub fn default_permission(mut self, default_permission: bool) -> Self {
        self.default_permission = default_permission;
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn user_permission(mut self, permission: Permissions) -> Self {
        self.user_permissions.push(permission);
        self
    }

    pub fn bot_permission(mut self, permission: Permissions) -> Self {
        self.bot_permissions.push(permission);
        self
    }

    pub fn cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    pub fn scope(mut self, scope: CommandScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn admins_only(mut self) -> Self {
        self.admins_only = true;
        self
    }
}

/// イベントの発生元
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventSource {
    /// スラッシュコマンド・コンテキストメニュー
    ApplicationCommand,
    /// プレフィックス付きテキストメッセージ
    MessageCommand,
    Button,
    SelectMenu,
}

impl std::fmt::Display for EventSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EventSource::ApplicationCommand => "application_command",
            EventSource::MessageCommand => "message_command",
            EventSource::Button => "button",
            EventSource::SelectMenu => "select_menu",
        };
        write!(f, "{}", s)
    }
}

/// インタラクションへ後から応答するための識別子
#[derive(Clone, PartialEq, Eq)]
pub struct InteractionHandle {
    pub id: InteractionId,
    pub token: String,
}

impl std::fmt::Debug for InteractionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InteractionHandle")
            .field("id", &self.id)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

/// 実行コンテキスト（1回の呼び出しに紐づく情報）
#[derive(Debug, Clone)]
pub struct InvocationContext {
    pub source: EventSource,
    /// コマンド名またはカスタムID
    pub target: String,
    pub user_id: UserId,
    /// DMの場合はNone
    pub guild_id: Option<GuildId>,
    pub channel_id: ChannelId,
    /// インタラクションに含まれていた実行メンバーの権限
    pub member_permissions: Option<Permissions>,
    /// インタラクションに含まれていたボットの権限
    pub bot_permissions: Option<Permissions>,
    /// テキストコマンドではNone
    pub interaction: Option<InteractionHandle>,
}

impl InvocationContext {
    pub fn new(
        source: EventSource,
        target: impl Into<String>,
        user_id: UserId,
        guild_id: Option<GuildId>,
        channel_id: ChannelId,
    ) -> Self {
        Self {
            source,
            target: target.into(),
            user_id,
            guild_id,
            channel_id,
            member_permissions: None,
            bot_permissions: None,
            interaction: None,
        }
    }

    pub fn with_member_permissions(mut self, permissions: Option<Permissions>) -> Self {
        self.member_permissions = permissions;
        self
    }

    pub fn with_bot_permissions(mut self, permissions: Option<Permissions>) -> Self {
        self.bot_permissions = permissions;
        self
    }

    pub fn with_interaction(mut self, id: InteractionId, token: impl Into<String>) -> Self {
        self.interaction = Some(InteractionHandle {
            id,
            token: token.into(),
        });
        self
    }

    pub fn in_guild(&self) -> bool {
        self.guild_id.is_some()
    }
}

/// ハンドラーに渡される呼び出し
pub struct Invocation<D> {
    pub context: InvocationContext,
    /// テキストコマンドの引数（プレフィックスとコマンド名を除いた残り）
    pub args: Vec<String>,
    /// プラットフォーム固有のイベントデータ
    pub data: D,
}

impl<D> Invocation<D> {
    pub fn new(context: InvocationContext, data: D) -> Self {
        Self {
            context,
            args: Vec::new(),
            data,
        }
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }
}

/// Command trait - すべてのコマンドが実装する
#[async_trait]
pub trait Command<D: Send + Sync + 'static>: Send + Sync {
    /// メタデータ
    fn data(&self) -> &CommandData;

    /// 実行前フック（インヒビターより前に呼ばれる）
    async fn before(&self, _invocation: &Invocation<D>) -> anyhow::Result<()> {
        Ok(())
    }

    /// コマンド実行
    async fn execute(&self, invocation: &Invocation<D>) -> anyhow::Result<()>;
}

/// ボタン・セレクトメニューのハンドラー
#[async_trait]
pub trait ComponentHandler<D: Send + Sync + 'static>: Send + Sync {
    /// 処理するカスタムID
    fn custom_ids(&self) -> &[&str];

    /// 実行前フック
    async fn before(&self, _invocation: &Invocation<D>) -> anyhow::Result<()> {
        Ok(())
    }

    async fn execute(&self, invocation: &Invocation<D>) -> anyhow::Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slash_defaults() {
        let data = CommandData::slash("ping", "Pong!");
        assert_eq!(data.kind, CommandKind::Slash);
        assert_eq!(data.description, "Pong!");
        assert!(data.default_permission);
        assert_eq!(data.cooldown, Duration::ZERO);
        assert_eq!(data.scope, CommandScope::Any);
        assert!(!data.admins_only);
    }

    #[test]
    fn test_interaction_token_is_redacted() {
        let context = InvocationContext::new(
            EventSource::Button,
            "confirm",
            UserId::new(1),
            None,
            ChannelId::new(2),
        )
        .with_interaction(InteractionId::new(3), "secret-token");

        assert_eq!(
            context.interaction.as_ref().map(|h| h.token.as_str()),
            Some("secret-token")
        );
        assert!(!format!("{:?}", context).contains("secret-token"));
    }

    #[test]
    fn test_scope_allows() {
        assert!(CommandScope::Any.allows(true));
        assert!(CommandScope::Any.allows(false));
        assert!(CommandScope::GuildOnly.allows(true));
        assert!(!CommandScope::GuildOnly.allows(false));
        assert!(CommandScope::DmOnly.allows(false));
        assert!(!CommandScope::DmOnly.allows(true));
    }

    #[test]
    fn test_kind_is_application() {
        assert!(CommandKind::Slash.is_application());
        assert!(CommandKind::ContextMenuUser.is_application());
        assert!(CommandKind::ContextMenuMessage.is_application());
        assert!(!CommandKind::Text.is_application());
    }
}
