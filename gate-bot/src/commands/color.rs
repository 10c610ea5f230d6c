//! 色のセレクトメニュー

use crate::command::{ComponentHandler, Invocation};
use crate::handler::SerenityEvent;
use async_trait::async_trait;
use serenity::model::application::ComponentInteractionDataKind;

pub const COLOR_MENU_ID: &str = "panel_color";

/// (値, 表示名)
pub const COLORS: &[(&str, &str)] = &[("red", "赤"), ("green", "緑"), ("blue", "青")];

pub struct ColorSelect;

/// 選択値の表示名
pub fn color_label(value: &str) -> Option<&'static str> {
    COLORS
        .iter()
        .find(|(v, _)| *v == value)
        .map(|(_, label)| *label)
}

#[async_trait]
impl ComponentHandler<SerenityEvent> for ColorSelect {
    fn custom_ids(&self) -> &[&str] {
        &[COLOR_MENU_ID]
    }

    async fn execute(&self, invocation: &Invocation<SerenityEvent>) -> anyhow::Result<()> {
        let selected = invocation
            .data
            .component_interaction()
            .and_then(|i| match &i.data.kind {
                ComponentInteractionDataKind::StringSelect { values } => values.first().cloned(),
                _ => None,
            });

        let content = match selected.as_deref().and_then(color_label) {
            Some(label) => format!("{}を選択しました。", label),
            None => "不明な選択肢です。".to_string(),
        };
        invocation.data.reply(content).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_label() {
        assert_eq!(color_label("red"), Some("赤"));
        assert_eq!(color_label("purple"), None);
    }
}
