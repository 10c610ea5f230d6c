//! Serenityイベントハンドラー
//!
//! ゲートウェイイベントを `Invocation` に変換してディスパッチャーに渡す。
//! ready時にはPlatformを準備完了にし、コマンドを登録する。

use crate::command::{EventSource, Invocation, InvocationContext};
use crate::framework::Framework;
use crate::platform::SerenityPlatform;
use serenity::builder::{CreateInteractionResponse, CreateInteractionResponseMessage};
use serenity::model::application::{
    CommandInteraction, ComponentInteraction, ComponentInteractionDataKind, Interaction,
};
use serenity::model::channel::Message;
use serenity::model::gateway::Ready;
use serenity::prelude::*;
use std::sync::Arc;
use tracing::{debug, error, info};

/// ハンドラーに渡されるSerenityのイベント
pub enum SerenityEvent {
    Command {
        ctx: Context,
        interaction: CommandInteraction,
    },
    Component {
        ctx: Context,
        interaction: ComponentInteraction,
    },
    Message {
        ctx: Context,
        message: Message,
    },
}

impl SerenityEvent {
    pub fn ctx(&self) -> &Context {
        match self {
            SerenityEvent::Command { ctx, .. }
            | SerenityEvent::Component { ctx, .. }
            | SerenityEvent::Message { ctx, .. } => ctx,
        }
    }

    pub fn command_interaction(&self) -> Option<&CommandInteraction> {
        match self {
            SerenityEvent::Command { interaction, .. } => Some(interaction),
            _ => None,
        }
    }

    pub fn component_interaction(&self) -> Option<&ComponentInteraction> {
        match self {
            SerenityEvent::Component { interaction, .. } => Some(interaction),
            _ => None,
        }
    }

    pub fn message(&self) -> Option<&Message> {
        match self {
            SerenityEvent::Message { message, .. } => Some(message),
            _ => None,
        }
    }

    /// イベントに返信する
    ///
    /// インタラクションには応答メッセージ、テキストメッセージにはリプライで返す。
    pub async fn reply(&self, content: impl Into<String>) -> serenity::Result<()> {
        let content = content.into();
        match self {
            SerenityEvent::Message { ctx, message } => {
                message.reply(&ctx.http, content).await.map(|_| ())
            }
            _ => {
                self.respond(CreateInteractionResponseMessage::new().content(content))
                    .await
            }
        }
    }

    /// インタラクションに応答する
    ///
    /// テキストメッセージには応答できないため何もしない。
    pub async fn respond(&self, response: CreateInteractionResponseMessage) -> serenity::Result<()> {
        let response = CreateInteractionResponse::Message(response);
        match self {
            SerenityEvent::Command { ctx, interaction } => {
                interaction.create_response(&ctx.http, response).await
            }
            SerenityEvent::Component { ctx, interaction } => {
                interaction.create_response(&ctx.http, response).await
            }
            SerenityEvent::Message { .. } => {
                debug!("Interaction response requested for a text message, skipping");
                Ok(())
            }
        }
    }
}

/// コンポーネントの種類から発生元を判定する
pub fn component_source(kind: &ComponentInteractionDataKind) -> Option<EventSource> {
    match kind {
        ComponentInteractionDataKind::Button => Some(EventSource::Button),
        ComponentInteractionDataKind::StringSelect { .. }
        | ComponentInteractionDataKind::UserSelect { .. }
        | ComponentInteractionDataKind::RoleSelect { .. }
        | ComponentInteractionDataKind::MentionableSelect { .. }
        | ComponentInteractionDataKind::ChannelSelect { .. } => Some(EventSource::SelectMenu),
        _ => None,
    }
}

fn command_context(interaction: &CommandInteraction) -> InvocationContext {
    InvocationContext::new(
        EventSource::ApplicationCommand,
        interaction.data.name.clone(),
        interaction.user.id,
        interaction.guild_id,
        interaction.channel_id,
    )
    .with_member_permissions(interaction.member.as_ref().and_then(|m| m.permissions))
    .with_bot_permissions(interaction.app_permissions)
    .with_interaction(interaction.id, interaction.token.clone())
}

fn component_context(source: EventSource, interaction: &ComponentInteraction) -> InvocationContext {
    InvocationContext::new(
        source,
        interaction.data.custom_id.clone(),
        interaction.user.id,
        interaction.guild_id,
        interaction.channel_id,
    )
    .with_member_permissions(interaction.member.as_ref().and_then(|m| m.permissions))
    .with_bot_permissions(interaction.app_permissions)
    .with_interaction(interaction.id, interaction.token.clone())
}

/// Serenityのイベントハンドラー
pub struct Handler {
    framework: Arc<Framework<SerenityEvent>>,
    platform: Arc<SerenityPlatform>,
}

impl Handler {
    pub fn new(framework: Arc<Framework<SerenityEvent>>, platform: Arc<SerenityPlatform>) -> Self {
        Self {
            framework,
            platform,
        }
    }

    async fn handle_command(&self, ctx: Context, interaction: CommandInteraction) {
        let context = command_context(&interaction);
        let event = SerenityEvent::Command { ctx, interaction };
        let outcome = self
            .framework
            .dispatcher()
            .dispatch_command(Invocation::new(context, event))
            .await;
        debug!("Application command outcome: {:?}", outcome);
    }

    async fn handle_component(&self, ctx: Context, interaction: ComponentInteraction) {
        let Some(source) = component_source(&interaction.data.kind) else {
            debug!("Ignoring unknown component kind: {}", interaction.data.custom_id);
            return;
        };

        let context = component_context(source, &interaction);
        let invocation = Invocation::new(context, SerenityEvent::Component { ctx, interaction });
        let dispatcher = self.framework.dispatcher();
        let outcome = match source {
            EventSource::Button => dispatcher.dispatch_button(invocation).await,
            _ => dispatcher.dispatch_select_menu(invocation).await,
        };
        debug!("{} outcome: {:?}", source, outcome);
    }
}

#[serenity::async_trait]
impl EventHandler for Handler {
    async fn message(&self, ctx: Context, msg: Message) {
        // ボットメッセージは無視
        if msg.author.bot || msg.content.trim().is_empty() {
            return;
        }

        let context = InvocationContext::new(
            EventSource::MessageCommand,
            String::new(),
            msg.author.id,
            msg.guild_id,
            msg.channel_id,
        );
        let content = msg.content.clone();
        let outcome = self
            .framework
            .dispatcher()
            .dispatch_message(context, &content, SerenityEvent::Message { ctx, message: msg })
            .await;
        debug!("Message command outcome: {:?}", outcome);
    }

    async fn ready(&self, _ctx: Context, ready: Ready) {
        info!("{} is connected!", ready.user.name);

        // 再接続時のreadyでは登録し直さない（レジストリは起動後に変わらない）
        let reconnected = self.platform.is_ready();
        self.platform.mark_ready(ready.application.id, ready.user.id);
        if reconnected {
            info!("Reconnected, application commands already registered");
            return;
        }

        match self.framework.register_commands().await {
            Ok(registered) => info!("{} application commands registered", registered.len()),
            Err(e) => error!("Failed to register application commands: {}", e),
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        match interaction {
            Interaction::Command(command) => self.handle_command(ctx, command).await,
            Interaction::Component(component) => self.handle_component(ctx, component).await,
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_component_source() {
        assert_eq!(
            component_source(&ComponentInteractionDataKind::Button),
            Some(EventSource::Button)
        );
        assert_eq!(
            component_source(&ComponentInteractionDataKind::StringSelect { values: vec![] }),
            Some(EventSource::SelectMenu)
        );
        assert_eq!(
            component_source(&ComponentInteractionDataKind::Unknown(99)),
            None
        );
    }
}
