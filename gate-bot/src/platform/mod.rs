//! プラットフォーム抽象化レイヤー
//!
//! Discord APIのうち、ディスパッチャーとコマンド登録が必要とする操作
//! （メンバー・ロール・権限の取得、コマンドのCRUD、ロール権限の設定）を
//! traitとしてまとめる。

mod discord;
#[cfg(test)]
mod mock;

use async_trait::async_trait;
use serde::Serialize;
use serenity::builder::CreateCommandOption;
use serenity::model::id::{CommandId, GuildId, RoleId, UserId};
use serenity::model::permissions::Permissions;
use thiserror::Error;

// パブリックエクスポート
pub use discord::{compute_member_permissions, SerenityPlatform};
#[cfg(test)]
pub use mock::{MockCall, MockPlatform};

/// プラットフォームエラー
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("Discord API error: {0}")]
    Http(#[from] serenity::Error),

    #[error("Member {user} not found in guild {guild}")]
    MemberNotFound { guild: GuildId, user: UserId },
}

/// リモート側のコマンド種別
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RemoteCommandKind {
    ChatInput,
    User,
    Message,
}

/// リモートAPIに送るコマンド定義
#[derive(Debug, Clone, Serialize)]
pub struct CommandDescriptor {
    pub name: String,
    pub kind: RemoteCommandKind,
    pub description: String,
    pub options: Vec<CreateCommandOption>,
    pub default_permission: bool,
    /// 既定で使用できるメンバーの権限（Noneなら全員）
    pub default_member_permissions: Option<Permissions>,
    pub dm_permission: bool,
}

/// 登録済みコマンド（リモートID付き）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegisteredCommand {
    pub id: CommandId,
    pub name: String,
}

/// サーバーのロール情報
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleInfo {
    pub id: RoleId,
    pub name: String,
    pub permissions: Permissions,
    /// 連携（ボット・ブースト等）で管理されるロール
    pub managed: bool,
}

/// コマンドごとの許可ロール
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandPermissionOverlay {
    pub command_id: CommandId,
    pub role_ids: Vec<RoleId>,
}

/// プラットフォームtrait
///
/// `guild_id` がNoneの操作はグローバルコマンドを対象にする。
#[async_trait]
pub trait Platform: Send + Sync {
    /// クライアントの起動完了を待つ
    async fn wait_ready(&self);

    /// メンバーの権限を取得（メンバーがキャッシュになければ取得する）
    async fn member_permissions(
        &self,
        guild_id: GuildId,
        user_id: UserId,
    ) -> Result<Permissions, PlatformError>;

    /// ボット自身の権限を取得
    async fn bot_permissions(&self, guild_id: GuildId) -> Result<Permissions, PlatformError>;

    /// サーバーのロール一覧
    async fn guild_roles(&self, guild_id: GuildId) -> Result<Vec<RoleInfo>, PlatformError>;

    /// コマンドを一括で上書き登録
    async fn set_commands(
        &self,
        guild_id: Option<GuildId>,
        commands: Vec<CommandDescriptor>,
    ) -> Result<Vec<RegisteredCommand>, PlatformError>;

    async fn create_command(
        &self,
        guild_id: Option<GuildId>,
        command: CommandDescriptor,
    ) -> Result<RegisteredCommand, PlatformError>;

    async fn edit_command(
        &self,
        guild_id: Option<GuildId>,
        command_id: CommandId,
        command: CommandDescriptor,
    ) -> Result<RegisteredCommand, PlatformError>;

    async fn delete_command(
        &self,
        guild_id: Option<GuildId>,
        command_id: CommandId,
    ) -> Result<(), PlatformError>;

    /// コマンドごとの許可ロールをまとめて設定
    async fn set_command_permissions(
        &self,
        guild_id: GuildId,
        overlays: Vec<CommandPermissionOverlay>,
    ) -> Result<(), PlatformError>;
}
