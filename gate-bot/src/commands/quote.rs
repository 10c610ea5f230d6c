//! メッセージ引用（メッセージのコンテキストメニュー）

use crate::command::{Command, CommandData, Invocation};
use crate::handler::SerenityEvent;
use anyhow::Context as _;
use async_trait::async_trait;
use serenity::model::application::ResolvedTarget;
use std::time::Duration;

/// 引用する本文の最大文字数
const MAX_QUOTE_CHARS: usize = 1500;

/// Discordのメッセージ本文の上限
const MESSAGE_LIMIT: usize = 2000;

pub struct Quote {
    data: CommandData,
}

impl Quote {
    pub fn new() -> Self {
        Self {
            data: CommandData::message_context("Quote")
                .category("general")
                .cooldown(Duration::from_secs(10)),
        }
    }
}

impl Default for Quote {
    fn default() -> Self {
        Self::new()
    }
}

/// 引用文を作成（`> ` と署名を含めて上限に収まるよう切り詰める）
pub fn format_quote(author: &str, content: &str) -> String {
    let trailer = format!("\n(by {})", author);
    // 省略記号の1文字分を残す
    let budget = MESSAGE_LIMIT.saturating_sub(trailer.chars().count() + 1);

    let mut truncated = content.chars().count() > MAX_QUOTE_CHARS;
    let body: String = content.chars().take(MAX_QUOTE_CHARS).collect();

    let mut quoted = String::new();
    let mut used = 0;
    for (index, line) in body.lines().enumerate() {
        let prefix = if index == 0 { "> " } else { "\n> " };
        let prefix_len = prefix.chars().count();
        let line_len = line.chars().count();

        if used + prefix_len + line_len > budget {
            let room = budget.saturating_sub(used + prefix_len);
            if room > 0 {
                quoted.push_str(prefix);
                quoted.extend(line.chars().take(room));
            }
            truncated = true;
            break;
        }

        quoted.push_str(prefix);
        quoted.push_str(line);
        used += prefix_len + line_len;
    }

    if truncated {
        quoted.push('…');
    }
    quoted.push_str(&trailer);
    quoted
}

#[async_trait]
impl Command<SerenityEvent> for Quote {
    fn data(&self) -> &CommandData {
        &self.data
    }

    async fn execute(&self, invocation: &Invocation<SerenityEvent>) -> anyhow::Result<()> {
        let interaction = invocation
            .data
            .command_interaction()
            .context("Quote is only available as a context menu")?;

        let content = match interaction.data.target() {
            Some(ResolvedTarget::Message(message)) if !message.content.is_empty() => {
                format_quote(&message.author.name, &message.content)
            }
            Some(ResolvedTarget::Message(_)) => "本文のないメッセージは引用できません。".to_string(),
            _ => "メッセージが見つかりませんでした。".to_string(),
        };
        invocation.data.reply(content).await?;
        Ok(())
    }
}
