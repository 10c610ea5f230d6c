//! フレームワーク本体
//!
//! レジストリ・インヒビター・ディスパッチャー・登録マネージャーを
//! まとめて構築し、イベントハンドラーとAPIから共有される。

use crate::command::{Command, ComponentHandler};
use crate::cooldown::CooldownStore;
use crate::dispatcher::{Dispatcher, DEFAULT_PREFIX};
use crate::inhibitor::{Inhibitor, InhibitorChain};
use crate::manager::{CommandManager, ManagerError};
use crate::permission::AdminList;
use crate::platform::{Platform, RegisteredCommand};
use crate::registry::{CommandRegistry, RegistryBuilder, RegistryError};
use crate::signal::SignalBus;
use serenity::model::id::GuildId;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// 構築時のエラー
#[derive(Debug, Error)]
pub enum FrameworkError {
    #[error("A platform must be provided")]
    MissingPlatform,

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),
}

/// 構築済みのフレームワーク
pub struct Framework<D: Send + Sync + 'static> {
    dispatcher: Dispatcher<D>,
    manager: CommandManager<D>,
    /// コマンドを登録するサーバー（Noneならグローバル）
    guild_id: Option<GuildId>,
}

impl<D: Send + Sync + 'static> Framework<D> {
    pub fn builder() -> FrameworkBuilder<D> {
        FrameworkBuilder::new()
    }

    pub fn dispatcher(&self) -> &Dispatcher<D> {
        &self.dispatcher
    }

    pub fn manager(&self) -> &CommandManager<D> {
        &self.manager
    }

    pub fn registry(&self) -> &Arc<CommandRegistry<D>> {
        self.dispatcher.registry()
    }

    pub fn signals(&self) -> &SignalBus {
        self.dispatcher.signals()
    }

    pub fn cooldowns(&self) -> &CooldownStore {
        self.dispatcher.cooldowns()
    }

    pub fn guild_id(&self) -> Option<GuildId> {
        self.guild_id
    }

    /// 設定されたスコープにすべてのコマンドを登録する
    pub async fn register_commands(&self) -> Result<Vec<RegisteredCommand>, ManagerError> {
        self.manager.register_all(self.guild_id).await
    }
}

/// Frameworkのビルダー
pub struct FrameworkBuilder<D: Send + Sync + 'static> {
    registry: RegistryBuilder<D>,
    inhibitors: InhibitorChain<D>,
    platform: Option<Arc<dyn Platform>>,
    admins: AdminList,
    prefix: String,
    guild_id: Option<GuildId>,
    cooldowns: Option<CooldownStore>,
    signals: Option<SignalBus>,
}

impl<D: Send + Sync + 'static> FrameworkBuilder<D> {
    pub fn new() -> Self {
        Self {
            registry: RegistryBuilder::new(),
            inhibitors: InhibitorChain::new(),
            platform: None,
            admins: AdminList::new(),
            prefix: DEFAULT_PREFIX.to_string(),
            guild_id: None,
            cooldowns: None,
            signals: None,
        }
    }

    pub fn platform(mut self, platform: Arc<dyn Platform>) -> Self {
        self.platform = Some(platform);
        self
    }

    pub fn command<C: Command<D> + 'static>(mut self, command: C) -> Self {
        self.registry = self.registry.command(command);
        self
    }

    pub fn button<H: ComponentHandler<D> + 'static>(mut self, handler: H) -> Self {
        self.registry = self.registry.button(handler);
        self
    }

    pub fn select_menu<H: ComponentHandler<D> + 'static>(mut self, handler: H) -> Self {
        self.registry = self.registry.select_menu(handler);
        self
    }

    pub fn inhibitor<I: Inhibitor<D> + 'static>(mut self, inhibitor: I) -> Self {
        self.inhibitors.register(inhibitor);
        self
    }

    pub fn admins(mut self, admins: AdminList) -> Self {
        self.admins = admins;
        self
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn guild(mut self, guild_id: Option<GuildId>) -> Self {
        self.guild_id = guild_id;
        self
    }

    pub fn cooldowns(mut self, cooldowns: CooldownStore) -> Self {
        self.cooldowns = Some(cooldowns);
        self
    }

    pub fn signals(mut self, signals: SignalBus) -> Self {
        self.signals = Some(signals);
        self
    }

    /// フレームワークを構築
    ///
    /// Platform未指定、またはコマンド名・カスタムIDの重複はエラー。
    pub fn build(self) -> Result<Framework<D>, FrameworkError> {
        let platform = self.platform.ok_or(FrameworkError::MissingPlatform)?;
        let registry = Arc::new(self.registry.build()?);

        info!(
            "Framework ready: {} commands, {} inhibitors, {} admins, prefix '{}'",
            registry.len(),
            self.inhibitors.len(),
            self.admins.len(),
            self.prefix
        );

        let dispatcher = Dispatcher::new(registry.clone(), platform.clone())
            .with_inhibitors(Arc::new(self.inhibitors))
            .with_cooldowns(self.cooldowns.unwrap_or_default())
            .with_admins(Arc::new(self.admins))
            .with_signals(self.signals.unwrap_or_default())
            .with_prefix(self.prefix);
        let manager = CommandManager::new(registry, platform);

        Ok(Framework {
            dispatcher,
            manager,
            guild_id: self.guild_id,
        })
    }
}

impl<D: Send + Sync + 'static> Default for FrameworkBuilder<D> {
    fn default() -> Self {
        Self::new()
    }
}
