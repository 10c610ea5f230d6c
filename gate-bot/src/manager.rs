//! コマンド登録マネージャー
//!
//! ローカルのコマンド定義をリモートの記述子に変換してDiscordに登録し、
//! サーバー指定時はユーザー権限を要求するコマンドに許可ロールを設定する。

use crate::command::{CommandData, CommandKind, CommandScope};
use crate::permission::{has_permission, union};
use crate::platform::{
    CommandDescriptor, CommandPermissionOverlay, Platform, PlatformError, RegisteredCommand,
    RemoteCommandKind, RoleInfo,
};
use crate::registry::CommandRegistry;
use serenity::model::id::{CommandId, GuildId};
use serenity::model::permissions::Permissions;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// マネージャーのエラー
#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("Command not found: {0}")]
    CommandNotFound(String),

    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),
}

/// コマンド定義をリモート記述子に変換する
///
/// テキストコマンドはNone。ユーザー権限を1つでも要求するコマンドは
/// 宣言に関わらず `default_permission = false` になり、要求権限の和を
/// `default_member_permissions` として送る。
pub fn project(data: &CommandData) -> Option<CommandDescriptor> {
    let kind = match data.kind {
        CommandKind::Slash => RemoteCommandKind::ChatInput,
        CommandKind::ContextMenuUser => RemoteCommandKind::User,
        CommandKind::ContextMenuMessage => RemoteCommandKind::Message,
        CommandKind::Text => return None,
    };

    // コンテキストメニューは説明とオプションを持たない
    let (description, options) = if kind == RemoteCommandKind::ChatInput {
        (data.description.clone(), data.options.clone())
    } else {
        (String::new(), Vec::new())
    };

    let default_member_permissions = if !data.user_permissions.is_empty() {
        Some(union(&data.user_permissions))
    } else if !data.default_permission {
        Some(Permissions::empty())
    } else {
        None
    };

    Some(CommandDescriptor {
        name: data.name.clone(),
        kind,
        description,
        options,
        default_permission: default_member_permissions.is_none(),
        default_member_permissions,
        dm_permission: data.scope != CommandScope::GuildOnly,
    })
}

/// 要求権限をすべて持つ、連携管理でないロール
pub fn allowed_roles(roles: &[RoleInfo], required: Permissions) -> Vec<RoleInfo> {
    roles
        .iter()
        .filter(|r| !r.managed && has_permission(r.permissions, required))
        .cloned()
        .collect()
}

/// コマンド登録マネージャー
pub struct CommandManager<D: Send + Sync + 'static> {
    registry: Arc<CommandRegistry<D>>,
    platform: Arc<dyn Platform>,
}

impl<D: Send + Sync + 'static> CommandManager<D> {
    pub fn new(registry: Arc<CommandRegistry<D>>, platform: Arc<dyn Platform>) -> Self {
        Self { registry, platform }
    }

    /// 登録対象の記述子一覧（登録順）
    pub fn descriptors(&self) -> Vec<CommandDescriptor> {
        self.registry
            .commands()
            .filter_map(|c| project(c.data()))
            .collect()
    }

    /// 登録済みコマンドに対する許可ロールを計算する
    ///
    /// ユーザー権限を要求しないコマンドには何も設定しない。
    pub fn role_overlays(
        &self,
        registered: &[RegisteredCommand],
        roles: &[RoleInfo],
    ) -> Vec<CommandPermissionOverlay> {
        registered
            .iter()
            .filter_map(|remote| {
                let command = self.registry.application_command(&remote.name)?;
                let required = &command.data().user_permissions;
                if required.is_empty() {
                    return None;
                }
                let role_ids = allowed_roles(roles, union(required))
                    .into_iter()
                    .map(|r| r.id)
                    .collect();
                Some(CommandPermissionOverlay {
                    command_id: remote.id,
                    role_ids,
                })
            })
            .collect()
    }

    /// すべてのアプリケーションコマンドを一括登録する
    ///
    /// # Arguments
    /// * `guild_id` - 指定時はサーバーに登録し、許可ロールも設定する。Noneならグローバル
    ///
    /// # Returns
    /// 登録されたコマンド（登録対象がなければ空）。
    /// 許可ロールの設定に失敗しても登録自体は成功として扱う
    pub async fn register_all(
        &self,
        guild_id: Option<GuildId>,
    ) -> Result<Vec<RegisteredCommand>, ManagerError> {
        let descriptors = self.descriptors();
        self.platform.wait_ready().await;

        if descriptors.is_empty() {
            debug!("No application commands to register");
            return Ok(Vec::new());
        }

        let registered = self
            .platform
            .set_commands(guild_id, descriptors)
            .await?;
        info!(
            "Registered {} application commands ({})",
            registered.len(),
            scope_label(guild_id)
        );

        if let Some(guild_id) = guild_id {
            if let Err(e) = self.apply_role_overlays(guild_id, &registered).await {
                warn!(
                    "Failed to set role permissions in guild {} (default member permissions still apply): {}",
                    guild_id, e
                );
            }
        }

        Ok(registered)
    }

    async fn apply_role_overlays(
        &self,
        guild_id: GuildId,
        registered: &[RegisteredCommand],
    ) -> Result<(), PlatformError> {
        let roles = self.platform.guild_roles(guild_id).await?;
        let overlays = self.role_overlays(registered, &roles);
        if overlays.is_empty() {
            return Ok(());
        }
        info!(
            "Setting role permissions for {} commands in guild {}",
            overlays.len(),
            guild_id
        );
        self.platform.set_command_permissions(guild_id, overlays).await
    }

    /// コマンドを1つ登録する（テキストコマンドならNone）
    pub async fn create_command(
        &self,
        name: &str,
        guild_id: Option<GuildId>,
    ) -> Result<Option<RegisteredCommand>, ManagerError> {
        let Some(descriptor) = self.descriptor_for(name)? else {
            return Ok(None);
        };
        self.platform.wait_ready().await;
        let created = self.platform.create_command(guild_id, descriptor).await?;
        info!("Created command {} ({})", created.name, scope_label(guild_id));
        Ok(Some(created))
    }

    /// 登録済みコマンドをローカル定義で上書きする（テキストコマンドならNone）
    pub async fn edit_command(
        &self,
        command_id: CommandId,
        name: &str,
        guild_id: Option<GuildId>,
    ) -> Result<Option<RegisteredCommand>, ManagerError> {
        let Some(descriptor) = self.descriptor_for(name)? else {
            return Ok(None);
        };
        self.platform.wait_ready().await;
        let edited = self
            .platform
            .edit_command(guild_id, command_id, descriptor)
            .await?;
        info!("Edited command {} ({})", edited.name, scope_label(guild_id));
        Ok(Some(edited))
    }

    pub async fn delete_command(
        &self,
        command_id: CommandId,
        guild_id: Option<GuildId>,
    ) -> Result<(), ManagerError> {
        self.platform.wait_ready().await;
        self.platform.delete_command(guild_id, command_id).await?;
        info!("Deleted command {} ({})", command_id, scope_label(guild_id));
        Ok(())
    }

    /// 登録済みのコマンドをすべて削除する
    pub async fn delete_all(&self, guild_id: Option<GuildId>) -> Result<(), ManagerError> {
        self.platform.wait_ready().await;
        self.platform.set_commands(guild_id, Vec::new()).await?;
        info!("Deleted all application commands ({})", scope_label(guild_id));
        Ok(())
    }

    fn descriptor_for(&self, name: &str) -> Result<Option<CommandDescriptor>, ManagerError> {
        let command = self
            .registry
            .get(name)
            .ok_or_else(|| ManagerError::CommandNotFound(name.to_string()))?;
        Ok(project(command.data()))
    }
}

fn scope_label(guild_id: Option<GuildId>) -> String {
    match guild_id {
        Some(guild_id) => format!("guild {}", guild_id),
        None => "global".to_string(),
    }
}
