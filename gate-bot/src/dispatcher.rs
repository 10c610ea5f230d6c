//! イベントディスパッチャー
//!
//! アプリケーションコマンド・テキストコマンド・ボタン・セレクトメニューの
//! 4つの入口を持ち、コマンドに対しては次の順でチェックしてから実行する。
//!
//! before → インヒビター → 管理者限定 → スコープ → 権限 → クールダウン → 実行
//!
//! コンポーネントはbefore → インヒビター → 実行のみ。
//! どの段階のエラーも1か所で捕捉し、`ExecutionFailed` シグナルとして通知する。

use crate::command::{Command, ComponentHandler, EventSource, Invocation, InvocationContext};
use crate::cooldown::{CooldownStatus, CooldownStore};
use crate::inhibitor::{InhibitorChain, InhibitorVerdict};
use crate::permission::{first_missing, AdminList, MissingPermission};
use crate::platform::{Platform, PlatformError};
use crate::registry::CommandRegistry;
use crate::signal::{DispatchSignal, PipelineStage, SignalBus};
use serenity::model::id::GuildId;
use serenity::model::permissions::Permissions;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

/// デフォルトのテキストコマンドプレフィックス
pub const DEFAULT_PREFIX: &str = "!";

/// ディスパッチの結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// 対象のコマンド・ハンドラーがない（何もしない）
    Unmatched,
    /// インヒビターに拒否された
    Inhibited { inhibitor: String },
    MissingUserPermission(MissingPermission),
    MissingBotPermission(MissingPermission),
    /// 実行場所がスコープに合わない（シグナルなし）
    ScopeMismatch,
    CooldownLimited { remaining: Duration },
    Executed,
    /// いずれかの段階でエラーが発生した
    Failed { stage: PipelineStage },
}

/// 段階付きのエラー
struct StageFailure {
    stage: PipelineStage,
    error: anyhow::Error,
}

trait AtStage<T> {
    fn at(self, stage: PipelineStage) -> Result<T, StageFailure>;
}

impl<T, E: Into<anyhow::Error>> AtStage<T> for Result<T, E> {
    fn at(self, stage: PipelineStage) -> Result<T, StageFailure> {
        self.map_err(|e| StageFailure {
            stage,
            error: e.into(),
        })
    }
}

/// テキストメッセージをコマンド名と引数に分解する
///
/// プレフィックスで始まらない・空のメッセージはNone。
/// コマンド名は小文字化する。
pub fn parse_text_command(prefix: &str, content: &str) -> Option<(String, Vec<String>)> {
    let rest = content.trim().strip_prefix(prefix)?;
    let mut tokens = rest.split_whitespace();
    let name = tokens.next()?.to_lowercase();
    Some((name, tokens.map(str::to_string).collect()))
}

/// ディスパッチャー
pub struct Dispatcher<D: Send + Sync + 'static> {
    registry: Arc<CommandRegistry<D>>,
    inhibitors: Arc<InhibitorChain<D>>,
    cooldowns: CooldownStore,
    admins: Arc<AdminList>,
    platform: Arc<dyn Platform>,
    signals: SignalBus,
    prefix: String,
}

impl<D: Send + Sync + 'static> Dispatcher<D> {
    pub fn new(registry: Arc<CommandRegistry<D>>, platform: Arc<dyn Platform>) -> Self {
        Self {
            registry,
            inhibitors: Arc::new(InhibitorChain::new()),
            cooldowns: CooldownStore::new(),
            admins: Arc::new(AdminList::new()),
            platform,
            signals: SignalBus::default(),
            prefix: DEFAULT_PREFIX.to_string(),
        }
    }

    pub fn with_inhibitors(mut self, inhibitors: Arc<InhibitorChain<D>>) -> Self {
        self.inhibitors = inhibitors;
        self
    }

    pub fn with_cooldowns(mut self, cooldowns: CooldownStore) -> Self {
        self.cooldowns = cooldowns;
        self
    }

    pub fn with_admins(mut self, admins: Arc<AdminList>) -> Self {
        self.admins = admins;
        self
    }

    pub fn with_signals(mut self, signals: SignalBus) -> Self {
        self.signals = signals;
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn registry(&self) -> &Arc<CommandRegistry<D>> {
        &self.registry
    }

    pub fn cooldowns(&self) -> &CooldownStore {
        &self.cooldowns
    }

    pub fn signals(&self) -> &SignalBus {
        &self.signals
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// スラッシュコマンド・コンテキストメニュー
    ///
    /// `invocation.context.target` のコマンド名で完全一致検索する。
    pub async fn dispatch_command(&self, invocation: Invocation<D>) -> DispatchOutcome {
        let Some(command) = self.registry.application_command(&invocation.context.target) else {
            debug!("No application command named {}", invocation.context.target);
            return DispatchOutcome::Unmatched;
        };
        let result = self.run_command(&*command, &invocation).await;
        self.finish(&invocation.context, result)
    }

    /// プレフィックス付きテキストメッセージ
    ///
    /// `context.target` はパースしたコマンド名で上書きされる。
    pub async fn dispatch_message(
        &self,
        mut context: InvocationContext,
        content: &str,
        data: D,
    ) -> DispatchOutcome {
        let Some((name, args)) = parse_text_command(&self.prefix, content) else {
            return DispatchOutcome::Unmatched;
        };
        let Some(command) = self.registry.text_command(&name) else {
            debug!("No text command named {}", name);
            return DispatchOutcome::Unmatched;
        };

        context.source = EventSource::MessageCommand;
        context.target = name;
        let invocation = Invocation::new(context, data).with_args(args);
        let result = self.run_command(&*command, &invocation).await;
        self.finish(&invocation.context, result)
    }

    pub async fn dispatch_button(&self, invocation: Invocation<D>) -> DispatchOutcome {
        let Some(handler) = self.registry.button(&invocation.context.target) else {
            debug!("No button handler for {}", invocation.context.target);
            return DispatchOutcome::Unmatched;
        };
        let result = self.run_component(&*handler, &invocation).await;
        self.finish(&invocation.context, result)
    }

    pub async fn dispatch_select_menu(&self, invocation: Invocation<D>) -> DispatchOutcome {
        let Some(handler) = self.registry.select_menu(&invocation.context.target) else {
            debug!("No select menu handler for {}", invocation.context.target);
            return DispatchOutcome::Unmatched;
        };
        let result = self.run_component(&*handler, &invocation).await;
        self.finish(&invocation.context, result)
    }

    async fn run_command(
        &self,
        command: &dyn Command<D>,
        invocation: &Invocation<D>,
    ) -> Result<DispatchOutcome, StageFailure> {
        let data = command.data();
        let context = &invocation.context;

        command.before(invocation).await.at(PipelineStage::Before)?;

        if let Some(outcome) = self.run_inhibitors(invocation).await? {
            return Ok(outcome);
        }

        let is_admin = self.admins.is_admin(context.user_id);
        if data.admins_only && !is_admin {
            return Ok(self.reject_user(context, MissingPermission::BotAdmin));
        }

        if !data.scope.allows(context.in_guild()) {
            debug!(
                "{} is restricted to {:?}, ignoring invocation by {}",
                data.name, data.scope, context.user_id
            );
            return Ok(DispatchOutcome::ScopeMismatch);
        }

        // DMでは権限を確認しない
        if let Some(guild_id) = context.guild_id {
            if !data.user_permissions.is_empty() {
                let held = self
                    .member_permissions(context, guild_id)
                    .await
                    .at(PipelineStage::Permission)?;
                if let Some(missing) = first_missing(held, &data.user_permissions) {
                    return Ok(self.reject_user(context, MissingPermission::Permission(missing)));
                }
            }

            if !data.bot_permissions.is_empty() {
                let held = self
                    .bot_permissions(context, guild_id)
                    .await
                    .at(PipelineStage::Permission)?;
                if let Some(missing) = first_missing(held, &data.bot_permissions) {
                    let permission = MissingPermission::Permission(missing);
                    self.signals.publish(DispatchSignal::BotMissingPermission {
                        context: context.clone(),
                        permission,
                    });
                    return Ok(DispatchOutcome::MissingBotPermission(permission));
                }
            }
        }

        if !is_admin {
            let status = self
                .cooldowns
                .check_and_record(&data.name, context.user_id, data.cooldown)
                .await;
            if let CooldownStatus::Limited { remaining } = status {
                self.signals.publish(DispatchSignal::CooldownLimit {
                    context: context.clone(),
                    remaining,
                });
                return Ok(DispatchOutcome::CooldownLimited { remaining });
            }
        }

        command.execute(invocation).await.at(PipelineStage::Execute)?;
        Ok(DispatchOutcome::Executed)
    }

    async fn run_component(
        &self,
        handler: &dyn ComponentHandler<D>,
        invocation: &Invocation<D>,
    ) -> Result<DispatchOutcome, StageFailure> {
        handler.before(invocation).await.at(PipelineStage::Before)?;

        if let Some(outcome) = self.run_inhibitors(invocation).await? {
            return Ok(outcome);
        }

        handler.execute(invocation).await.at(PipelineStage::Execute)?;
        Ok(DispatchOutcome::Executed)
    }

    async fn run_inhibitors(
        &self,
        invocation: &Invocation<D>,
    ) -> Result<Option<DispatchOutcome>, StageFailure> {
        match self
            .inhibitors
            .evaluate(invocation)
            .await
            .at(PipelineStage::Inhibitor)?
        {
            InhibitorVerdict::Passed => Ok(None),
            InhibitorVerdict::Rejected(inhibitor) => {
                Ok(Some(DispatchOutcome::Inhibited { inhibitor }))
            }
        }
    }

    /// イベントに含まれていればそれを使い、なければPlatformから取得する
    async fn member_permissions(
        &self,
        context: &InvocationContext,
        guild_id: GuildId,
    ) -> Result<Permissions, PlatformError> {
        match context.member_permissions {
            Some(permissions) => Ok(permissions),
            None => {
                self.platform
                    .member_permissions(guild_id, context.user_id)
                    .await
            }
        }
    }

    async fn bot_permissions(
        &self,
        context: &InvocationContext,
        guild_id: GuildId,
    ) -> Result<Permissions, PlatformError> {
        match context.bot_permissions {
            Some(permissions) => Ok(permissions),
            None => self.platform.bot_permissions(guild_id).await,
        }
    }

    fn reject_user(
        &self,
        context: &InvocationContext,
        permission: MissingPermission,
    ) -> DispatchOutcome {
        debug!(
            "User {} lacks {} for {}",
            context.user_id, permission, context.target
        );
        self.signals.publish(DispatchSignal::UserMissingPermission {
            context: context.clone(),
            permission,
        });
        DispatchOutcome::MissingUserPermission(permission)
    }

    /// 失敗境界: すべての段階のエラーをここで記録・通知する
    fn finish(
        &self,
        context: &InvocationContext,
        result: Result<DispatchOutcome, StageFailure>,
    ) -> DispatchOutcome {
        match result {
            Ok(DispatchOutcome::Executed) => {
                info!(
                    "{} {} executed by {}",
                    context.source, context.target, context.user_id
                );
                DispatchOutcome::Executed
            }
            Ok(outcome) => outcome,
            Err(StageFailure { stage, error }) => {
                error!(
                    "{} {} failed at {} stage: {:#}",
                    context.source, context.target, stage, error
                );
                self.signals.publish(DispatchSignal::ExecutionFailed {
                    context: context.clone(),
                    stage,
                    message: format!("{:#}", error),
                });
                DispatchOutcome::Failed { stage }
            }
        }
    }
}
