//! !say - 引数をそのまま発言するテキストコマンド

use crate::command::{Command, CommandData, CommandScope, Invocation};
use crate::handler::SerenityEvent;
use async_trait::async_trait;
use serenity::model::permissions::Permissions;
use std::time::Duration;
use tracing::debug;

pub struct Say {
    data: CommandData,
}

impl Say {
    pub fn new() -> Self {
        Self {
            data: CommandData::text("say")
                .alias("echo")
                .description("ボットに発言させます")
                .category("moderation")
                .scope(CommandScope::GuildOnly)
                .user_permission(Permissions::MANAGE_MESSAGES)
                .bot_permission(Permissions::SEND_MESSAGES)
                .cooldown(Duration::from_secs(3)),
        }
    }
}

impl Default for Say {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Command<SerenityEvent> for Say {
    fn data(&self) -> &CommandData {
        &self.data
    }

    async fn execute(&self, invocation: &Invocation<SerenityEvent>) -> anyhow::Result<()> {
        if invocation.args.is_empty() {
            invocation.data.reply("使い方: !say <メッセージ>").await?;
            return Ok(());
        }

        let text = invocation.args.join(" ");
        debug!("Saying {} chars in {}", text.len(), invocation.context.channel_id);
        invocation
            .context
            .channel_id
            .say(&invocation.data.ctx().http, text)
            .await?;
        Ok(())
    }
}
