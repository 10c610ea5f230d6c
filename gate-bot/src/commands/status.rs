//! /status - ボット管理者向けの稼働状況

use crate::command::{Command, CommandData, Invocation};
use crate::handler::SerenityEvent;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub struct Status {
    data: CommandData,
    started_at: DateTime<Utc>,
}

impl Status {
    pub fn new() -> Self {
        Self {
            data: CommandData::slash("status", "ボットの稼働状況を表示します（管理者のみ）")
                .category("admin")
                .admins_only(),
            started_at: Utc::now(),
        }
    }
}

impl Default for Status {
    fn default() -> Self {
        Self::new()
    }
}

/// 稼働時間を「1日2時間3分」の形式にする
pub fn format_uptime(seconds: i64) -> String {
    let seconds = seconds.max(0);
    let days = seconds / 86_400;
    let hours = (seconds % 86_400) / 3_600;
    let minutes = (seconds % 3_600) / 60;

    if days > 0 {
        format!("{}日{}時間{}分", days, hours, minutes)
    } else if hours > 0 {
        format!("{}時間{}分", hours, minutes)
    } else {
        format!("{}分", minutes)
    }
}

#[async_trait]
impl Command<SerenityEvent> for Status {
    fn data(&self) -> &CommandData {
        &self.data
    }

    async fn execute(&self, invocation: &Invocation<SerenityEvent>) -> anyhow::Result<()> {
        let uptime = format_uptime((Utc::now() - self.started_at).num_seconds());
        let content = format!(
            "**稼働状況**\nバージョン: {}\n起動時刻: {}\n稼働時間: {}",
            env!("CARGO_PKG_VERSION"),
            self.started_at.format("%Y-%m-%d %H:%M:%S UTC"),
            uptime
        );
        invocation.data.reply(content).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_uptime() {
        assert_eq!(format_uptime(0), "0分");
        assert_eq!(format_uptime(3_660), "1時間1分");
        assert_eq!(format_uptime(90_061), "1日1時間1分");
        assert_eq!(format_uptime(-5), "0分");
    }
}
