//! Serenityを使ったPlatform実装

use crate::permission_cache::PermissionCache;
use async_trait::async_trait;
use serenity::builder::{CreateCommand, CreateCommandPermission, EditCommandPermissions};
use serenity::http::Http;
use serenity::model::application::{Command, CommandType};
use serenity::model::guild::Role;
use serenity::model::id::{ApplicationId, CommandId, GuildId, RoleId, UserId};
use serenity::model::permissions::Permissions;
use std::sync::{Arc, OnceLock};
use tokio::sync::watch;
use tracing::{debug, info};

use super::{
    CommandDescriptor, CommandPermissionOverlay, Platform, PlatformError, RegisteredCommand,
    RemoteCommandKind, RoleInfo,
};

/// Serenity HTTPクライアントを使ったPlatform
pub struct SerenityPlatform {
    http: Arc<Http>,
    /// readyイベント受信済みか
    ready: watch::Sender<bool>,
    bot_user_id: OnceLock<UserId>,
    permission_cache: PermissionCache,
}

impl SerenityPlatform {
    pub fn new(http: Arc<Http>) -> Self {
        Self::with_cache(http, PermissionCache::new())
    }

    pub fn with_cache(http: Arc<Http>, permission_cache: PermissionCache) -> Self {
        let (ready, _) = watch::channel(false);
        Self {
            http,
            ready,
            bot_user_id: OnceLock::new(),
            permission_cache,
        }
    }

    pub fn permission_cache(&self) -> &PermissionCache {
        &self.permission_cache
    }

    /// readyイベントで呼ぶ。待機中の登録処理を再開させる
    pub fn mark_ready(&self, application_id: ApplicationId, bot_user_id: UserId) {
        self.http.set_application_id(application_id);
        let _ = self.bot_user_id.set(bot_user_id);
        self.ready.send_replace(true);
        info!("Platform ready (application {})", application_id);
    }

    /// 一度でもreadyイベントを受け取ったか
    pub fn is_ready(&self) -> bool {
        *self.ready.borrow()
    }

    async fn bot_user_id(&self) -> Result<UserId, PlatformError> {
        if let Some(id) = self.bot_user_id.get() {
            return Ok(*id);
        }
        let user = self.http.get_current_user().await?;
        Ok(user.id)
    }
}

/// メンバーの実効権限を計算する
///
/// サーバー所有者とADMINISTRATORを持つメンバーはすべての権限を持つ。
/// @everyoneロール（IDがサーバーIDと同じ）は常に含める。
pub fn compute_member_permissions(
    guild_id: GuildId,
    owner_id: UserId,
    user_id: UserId,
    member_roles: &[RoleId],
    roles: &[RoleInfo],
) -> Permissions {
    if user_id == owner_id {
        return Permissions::all();
    }

    let everyone = RoleId::new(guild_id.get());
    let permissions = roles
        .iter()
        .filter(|r| r.id == everyone || member_roles.contains(&r.id))
        .fold(Permissions::empty(), |acc, r| acc | r.permissions);

    if permissions.contains(Permissions::ADMINISTRATOR) {
        Permissions::all()
    } else {
        permissions
    }
}

fn role_info(role: &Role) -> RoleInfo {
    RoleInfo {
        id: role.id,
        name: role.name.clone(),
        permissions: role.permissions,
        managed: role.managed,
    }
}

/// 登録用ビルダーに変換
fn to_create_command(descriptor: &CommandDescriptor) -> CreateCommand {
    let kind = match descriptor.kind {
        RemoteCommandKind::ChatInput => CommandType::ChatInput,
        RemoteCommandKind::User => CommandType::User,
        RemoteCommandKind::Message => CommandType::Message,
    };

    let mut builder = CreateCommand::new(&descriptor.name).kind(kind);
    if descriptor.kind == RemoteCommandKind::ChatInput {
        builder = builder
            .description(&descriptor.description)
            .set_options(descriptor.options.clone());
    }
    if let Some(permissions) = descriptor.default_member_permissions {
        builder = builder.default_member_permissions(permissions);
    }
    if !descriptor.dm_permission {
        builder = builder.dm_permission(false);
    }
    builder
}

fn registered(command: Command) -> RegisteredCommand {
    RegisteredCommand {
        id: command.id,
        name: command.name,
    }
}

#[async_trait]
impl Platform for SerenityPlatform {
    async fn wait_ready(&self) {
        let mut rx = self.ready.subscribe();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            debug!("Waiting for the client to become ready");
            if rx.changed().await.is_err() {
                return;
            }
        }
    }

    async fn member_permissions(
        &self,
        guild_id: GuildId,
        user_id: UserId,
    ) -> Result<Permissions, PlatformError> {
        if let Some(cached) = self.permission_cache.get_cached(guild_id, user_id).await {
            return Ok(cached);
        }

        // メンバーがキャッシュになければHTTPで取得される
        let member = guild_id.member(&*self.http, user_id).await?;
        let guild = guild_id.to_partial_guild(&*self.http).await?;
        let roles: Vec<RoleInfo> = guild.roles.values().map(role_info).collect();

        let permissions =
            compute_member_permissions(guild_id, guild.owner_id, user_id, &member.roles, &roles);
        debug!(
            "Resolved permissions for user {} in guild {}: {:#x}",
            user_id,
            guild_id,
            permissions.bits()
        );

        self.permission_cache
            .set_cache(guild_id, user_id, permissions)
            .await;
        Ok(permissions)
    }

    async fn bot_permissions(&self, guild_id: GuildId) -> Result<Permissions, PlatformError> {
        let bot_id = self.bot_user_id().await?;
        self.member_permissions(guild_id, bot_id).await
    }

    async fn guild_roles(&self, guild_id: GuildId) -> Result<Vec<RoleInfo>, PlatformError> {
        let roles = guild_id.roles(&*self.http).await?;
        Ok(roles.values().map(role_info).collect())
    }

    async fn set_commands(
        &self,
        guild_id: Option<GuildId>,
        commands: Vec<CommandDescriptor>,
    ) -> Result<Vec<RegisteredCommand>, PlatformError> {
        let builders: Vec<CreateCommand> = commands.iter().map(to_create_command).collect();
        let commands = match guild_id {
            Some(guild_id) => guild_id.set_commands(&*self.http, builders).await?,
            None => Command::set_global_commands(&*self.http, builders).await?,
        };
        Ok(commands.into_iter().map(registered).collect())
    }

    async fn create_command(
        &self,
        guild_id: Option<GuildId>,
        command: CommandDescriptor,
    ) -> Result<RegisteredCommand, PlatformError> {
        let builder = to_create_command(&command);
        let created = match guild_id {
            Some(guild_id) => guild_id.create_command(&*self.http, builder).await?,
            None => Command::create_global_command(&*self.http, builder).await?,
        };
        Ok(registered(created))
    }

    async fn edit_command(
        &self,
        guild_id: Option<GuildId>,
        command_id: CommandId,
        command: CommandDescriptor,
    ) -> Result<RegisteredCommand, PlatformError> {
        let builder = to_create_command(&command);
        let edited = match guild_id {
            Some(guild_id) => guild_id.edit_command(&*self.http, command_id, builder).await?,
            None => Command::edit_global_command(&*self.http, command_id, builder).await?,
        };
        Ok(registered(edited))
    }

    async fn delete_command(
        &self,
        guild_id: Option<GuildId>,
        command_id: CommandId,
    ) -> Result<(), PlatformError> {
        match guild_id {
            Some(guild_id) => guild_id.delete_command(&*self.http, command_id).await?,
            None => Command::delete_global_command(&*self.http, command_id).await?,
        }
        Ok(())
    }

    async fn set_command_permissions(
        &self,
        guild_id: GuildId,
        overlays: Vec<CommandPermissionOverlay>,
    ) -> Result<(), PlatformError> {
        // APIにはコマンド単位のエンドポイントしかないため順に送る
        for overlay in overlays {
            let permissions: Vec<CreateCommandPermission> = overlay
                .role_ids
                .iter()
                .map(|role_id| CreateCommandPermission::role(*role_id, true))
                .collect();
            guild_id
                .edit_command_permissions(
                    &*self.http,
                    overlay.command_id,
                    EditCommandPermissions::new(permissions),
                )
                .await?;
            debug!(
                "Set {} role permissions for command {} in guild {}",
                overlay.role_ids.len(),
                overlay.command_id,
                guild_id
            );
        }
        Ok(())
    }
}
