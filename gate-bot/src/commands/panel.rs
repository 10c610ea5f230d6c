//! /panel - ボタンとセレクトメニューを表示する

use crate::command::{Command, CommandData, CommandScope, Invocation};
use crate::handler::SerenityEvent;
use async_trait::async_trait;
use serenity::builder::{
    CreateActionRow, CreateButton, CreateInteractionResponseMessage, CreateSelectMenu,
    CreateSelectMenuKind, CreateSelectMenuOption,
};
use serenity::model::application::ButtonStyle;
use serenity::model::permissions::Permissions;

use super::color::{COLORS, COLOR_MENU_ID};
use super::confirm::{CANCEL_ID, CONFIRM_ID};

pub struct Panel {
    data: CommandData,
}

impl Panel {
    pub fn new() -> Self {
        Self {
            data: CommandData::slash("panel", "操作パネルを表示します")
                .category("moderation")
                .scope(CommandScope::GuildOnly)
                .user_permission(Permissions::MANAGE_GUILD),
        }
    }
}

impl Default for Panel {
    fn default() -> Self {
        Self::new()
    }
}

fn components() -> Vec<CreateActionRow> {
    let buttons = CreateActionRow::Buttons(vec![
        CreateButton::new(CONFIRM_ID)
            .label("確認")
            .style(ButtonStyle::Success),
        CreateButton::new(CANCEL_ID)
            .label("キャンセル")
            .style(ButtonStyle::Secondary),
    ]);

    let options = COLORS
        .iter()
        .map(|(value, label)| CreateSelectMenuOption::new(*label, *value))
        .collect();
    let menu = CreateActionRow::SelectMenu(
        CreateSelectMenu::new(COLOR_MENU_ID, CreateSelectMenuKind::String { options })
            .placeholder("色を選択"),
    );

    vec![buttons, menu]
}

#[async_trait]
impl Command<SerenityEvent> for Panel {
    fn data(&self) -> &CommandData {
        &self.data
    }

    async fn execute(&self, invocation: &Invocation<SerenityEvent>) -> anyhow::Result<()> {
        invocation
            .data
            .respond(
                CreateInteractionResponseMessage::new()
                    .content("操作を選択してください。")
                    .components(components()),
            )
            .await?;
        Ok(())
    }
}
