//! 確認・キャンセルボタン

use crate::command::{ComponentHandler, Invocation};
use crate::handler::SerenityEvent;
use async_trait::async_trait;

pub const CONFIRM_ID: &str = "panel_confirm";
pub const CANCEL_ID: &str = "panel_cancel";

pub struct Confirm;

/// ボタンに対する応答文
pub fn confirm_message(custom_id: &str) -> &'static str {
    if custom_id == CONFIRM_ID {
        "確認しました。"
    } else {
        "キャンセルしました。"
    }
}

#[async_trait]
impl ComponentHandler<SerenityEvent> for Confirm {
    fn custom_ids(&self) -> &[&str] {
        &[CONFIRM_ID, CANCEL_ID]
    }

    async fn execute(&self, invocation: &Invocation<SerenityEvent>) -> anyhow::Result<()> {
        invocation
            .data
            .reply(confirm_message(&invocation.context.target))
            .await?;
        Ok(())
    }
}
