//! /ping - 応答確認

use crate::command::{Command, CommandData, Invocation};
use crate::handler::SerenityEvent;
use async_trait::async_trait;
use chrono::Utc;
use std::time::Duration;

/// /ping コマンド
pub struct Ping {
    data: CommandData,
}

impl Ping {
    pub fn new() -> Self {
        Self {
            data: CommandData::slash("ping", "ボットの応答を確認します")
                .category("general")
                .cooldown(Duration::from_secs(5)),
        }
    }
}

impl Default for Ping {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Command<SerenityEvent> for Ping {
    fn data(&self) -> &CommandData {
        &self.data
    }

    async fn execute(&self, invocation: &Invocation<SerenityEvent>) -> anyhow::Result<()> {
        let latency = invocation
            .data
            .command_interaction()
            .map(|i| (Utc::now() - *i.id.created_at()).num_milliseconds());

        let content = match latency {
            Some(ms) => format!("Pong! ({}ms)", ms.max(0)),
            None => "Pong!".to_string(),
        };
        invocation.data.reply(content).await?;
        Ok(())
    }
}
