//! アバター表示（ユーザーのコンテキストメニュー）

use crate::command::{Command, CommandData, Invocation};
use crate::handler::SerenityEvent;
use anyhow::Context as _;
use async_trait::async_trait;
use serenity::model::application::ResolvedTarget;

pub struct Avatar {
    data: CommandData,
}

impl Avatar {
    pub fn new() -> Self {
        Self {
            data: CommandData::user_context("Avatar").category("general"),
        }
    }
}

impl Default for Avatar {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Command<SerenityEvent> for Avatar {
    fn data(&self) -> &CommandData {
        &self.data
    }

    async fn execute(&self, invocation: &Invocation<SerenityEvent>) -> anyhow::Result<()> {
        let interaction = invocation
            .data
            .command_interaction()
            .context("Avatar is only available as a context menu")?;

        let content = match interaction.data.target() {
            Some(ResolvedTarget::User(user, _)) => {
                format!("{} のアバター\n{}", user.name, user.face())
            }
            _ => "ユーザーが見つかりませんでした。".to_string(),
        };
        invocation.data.reply(content).await?;
        Ok(())
    }
}
