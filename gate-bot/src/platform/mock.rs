//! モックPlatform（テスト用）

use async_trait::async_trait;
use serenity::model::id::{CommandId, GuildId, UserId};
use serenity::model::permissions::Permissions;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

use super::{
    CommandDescriptor, CommandPermissionOverlay, Platform, PlatformError, RegisteredCommand,
    RoleInfo,
};

/// 記録されたPlatform呼び出し
#[derive(Debug, Clone)]
pub enum MockCall {
    SetCommands {
        guild_id: Option<GuildId>,
        commands: Vec<CommandDescriptor>,
    },
    CreateCommand {
        guild_id: Option<GuildId>,
        name: String,
    },
    EditCommand {
        guild_id: Option<GuildId>,
        command_id: CommandId,
        name: String,
    },
    DeleteCommand {
        guild_id: Option<GuildId>,
        command_id: CommandId,
    },
    SetCommandPermissions {
        guild_id: GuildId,
        overlays: Vec<CommandPermissionOverlay>,
    },
}

/// テスト用モックPlatform
///
/// 権限とロールは事前に設定し、コマンド操作は呼び出しとして記録する。
/// 登録されたコマンドには1から順にIDを振る。
pub struct MockPlatform {
    member_permissions: Mutex<HashMap<UserId, Permissions>>,
    bot_permissions: Mutex<Permissions>,
    roles: Mutex<Vec<RoleInfo>>,
    calls: Mutex<Vec<MockCall>>,
    member_lookups: AtomicUsize,
    next_id: AtomicU64,
    failing_overlays: AtomicBool,
}

impl MockPlatform {
    pub fn new() -> Self {
        Self {
            member_permissions: Mutex::new(HashMap::new()),
            bot_permissions: Mutex::new(Permissions::all()),
            roles: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
            member_lookups: AtomicUsize::new(0),
            next_id: AtomicU64::new(1),
            failing_overlays: AtomicBool::new(false),
        }
    }

    /// メンバーの権限を設定
    pub fn with_member(self, user_id: UserId, permissions: Permissions) -> Self {
        self.member_permissions
            .lock()
            .unwrap()
            .insert(user_id, permissions);
        self
    }

    pub fn with_bot_permissions(self, permissions: Permissions) -> Self {
        *self.bot_permissions.lock().unwrap() = permissions;
        self
    }

    pub fn with_roles(self, roles: Vec<RoleInfo>) -> Self {
        *self.roles.lock().unwrap() = roles;
        self
    }

    /// ロール権限の設定をAPIエラーにする（呼び出しは記録する）
    pub fn with_failing_overlays(self) -> Self {
        self.failing_overlays.store(true, Ordering::SeqCst);
        self
    }

    /// 記録された呼び出し
    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().unwrap().clone()
    }

    /// `member_permissions` が呼ばれた回数
    pub fn member_lookups(&self) -> usize {
        self.member_lookups.load(Ordering::SeqCst)
    }

    fn record(&self, call: MockCall) {
        self.calls.lock().unwrap().push(call);
    }

    fn assign(&self, name: &str) -> RegisteredCommand {
        RegisteredCommand {
            id: CommandId::new(self.next_id.fetch_add(1, Ordering::SeqCst)),
            name: name.to_string(),
        }
    }
}

impl Default for MockPlatform {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Platform for MockPlatform {
    async fn wait_ready(&self) {}

    async fn member_permissions(
        &self,
        guild_id: GuildId,
        user_id: UserId,
    ) -> Result<Permissions, PlatformError> {
        self.member_lookups.fetch_add(1, Ordering::SeqCst);
        self.member_permissions
            .lock()
            .unwrap()
            .get(&user_id)
            .copied()
            .ok_or(PlatformError::MemberNotFound {
                guild: guild_id,
                user: user_id,
            })
    }

    async fn bot_permissions(&self, _guild_id: GuildId) -> Result<Permissions, PlatformError> {
        Ok(*self.bot_permissions.lock().unwrap())
    }

    async fn guild_roles(&self, _guild_id: GuildId) -> Result<Vec<RoleInfo>, PlatformError> {
        Ok(self.roles.lock().unwrap().clone())
    }

    async fn set_commands(
        &self,
        guild_id: Option<GuildId>,
        commands: Vec<CommandDescriptor>,
    ) -> Result<Vec<RegisteredCommand>, PlatformError> {
        let registered = commands.iter().map(|c| self.assign(&c.name)).collect();
        self.record(MockCall::SetCommands { guild_id, commands });
        Ok(registered)
    }

    async fn create_command(
        &self,
        guild_id: Option<GuildId>,
        command: CommandDescriptor,
    ) -> Result<RegisteredCommand, PlatformError> {
        self.record(MockCall::CreateCommand {
            guild_id,
            name: command.name.clone(),
        });
        Ok(self.assign(&command.name))
    }

    async fn edit_command(
        &self,
        guild_id: Option<GuildId>,
        command_id: CommandId,
        command: CommandDescriptor,
    ) -> Result<RegisteredCommand, PlatformError> {
        self.record(MockCall::EditCommand {
            guild_id,
            command_id,
            name: command.name.clone(),
        });
        Ok(RegisteredCommand {
            id: command_id,
            name: command.name,
        })
    }

    async fn delete_command(
        &self,
        guild_id: Option<GuildId>,
        command_id: CommandId,
    ) -> Result<(), PlatformError> {
        self.record(MockCall::DeleteCommand {
            guild_id,
            command_id,
        });
        Ok(())
    }

    async fn set_command_permissions(
        &self,
        guild_id: GuildId,
        overlays: Vec<CommandPermissionOverlay>,
    ) -> Result<(), PlatformError> {
        self.record(MockCall::SetCommandPermissions { guild_id, overlays });
        if self.failing_overlays.load(Ordering::SeqCst) {
            return Err(PlatformError::Http(serenity::Error::Other(
                "command permissions require a bearer token",
            )));
        }
        Ok(())
    }
}
