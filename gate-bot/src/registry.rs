//! コマンドレジストリ
//!
//! 起動時に登録リストからコマンドとコンポーネントハンドラーを読み込み、
//! 名前・別名・カスタムIDで引けるようにする。重複は起動エラーになる。

use crate::command::{Command, CommandKind, ComponentHandler};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// レジストリ構築時のエラー
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Duplicate command name: {0}")]
    DuplicateCommand(String),

    #[error("Alias '{alias}' of command '{command}' is already in use")]
    DuplicateAlias { command: String, alias: String },

    #[error("Duplicate custom id: {0}")]
    DuplicateCustomId(String),
}

/// カスタムID -> ハンドラーの対応表
struct ComponentTable<D: Send + Sync + 'static> {
    handlers: Vec<Arc<dyn ComponentHandler<D>>>,
    by_custom_id: HashMap<String, usize>,
}

impl<D: Send + Sync + 'static> ComponentTable<D> {
    fn build(handlers: Vec<Arc<dyn ComponentHandler<D>>>) -> Result<Self, RegistryError> {
        let mut by_custom_id = HashMap::new();
        for (index, handler) in handlers.iter().enumerate() {
            for custom_id in handler.custom_ids() {
                if by_custom_id.insert(custom_id.to_string(), index).is_some() {
                    return Err(RegistryError::DuplicateCustomId(custom_id.to_string()));
                }
            }
        }
        Ok(Self {
            handlers,
            by_custom_id,
        })
    }

    fn get(&self, custom_id: &str) -> Option<Arc<dyn ComponentHandler<D>>> {
        self.by_custom_id
            .get(custom_id)
            .map(|&i| self.handlers[i].clone())
    }
}

/// 登録済みコマンドとコンポーネントハンドラー
///
/// 起動時に一度だけ構築し、以降は読み取り専用で共有する。
pub struct CommandRegistry<D: Send + Sync + 'static> {
    /// 登録順
    commands: Vec<Arc<dyn Command<D>>>,
    /// アプリケーションコマンド名 -> index
    application: HashMap<String, usize>,
    /// 小文字化したテキストコマンド名・別名 -> index
    text: HashMap<String, usize>,
    buttons: ComponentTable<D>,
    select_menus: ComponentTable<D>,
}

impl<D: Send + Sync + 'static> CommandRegistry<D> {
    pub fn builder() -> RegistryBuilder<D> {
        RegistryBuilder::new()
    }

    /// アプリケーションコマンドを名前で取得（完全一致）
    pub fn application_command(&self, name: &str) -> Option<Arc<dyn Command<D>>> {
        self.application
            .get(name)
            .map(|&i| self.commands[i].clone())
    }

    /// テキストコマンドを名前または別名で取得（大文字小文字を区別しない）
    pub fn text_command(&self, name: &str) -> Option<Arc<dyn Command<D>>> {
        self.text
            .get(&name.to_lowercase())
            .map(|&i| self.commands[i].clone())
    }

    /// 名前で取得（種類を問わない）
    pub fn get(&self, name: &str) -> Option<Arc<dyn Command<D>>> {
        self.application_command(name)
            .or_else(|| self.text_command(name))
    }

    pub fn button(&self, custom_id: &str) -> Option<Arc<dyn ComponentHandler<D>>> {
        self.buttons.get(custom_id)
    }

    pub fn select_menu(&self, custom_id: &str) -> Option<Arc<dyn ComponentHandler<D>>> {
        self.select_menus.get(custom_id)
    }

    /// 登録順のコマンド一覧
    pub fn commands(&self) -> impl Iterator<Item = &Arc<dyn Command<D>>> {
        self.commands.iter()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn button_count(&self) -> usize {
        self.buttons.handlers.len()
    }

    pub fn select_menu_count(&self) -> usize {
        self.select_menus.handlers.len()
    }
}

/// CommandRegistryのビルダー
pub struct RegistryBuilder<D: Send + Sync + 'static> {
    commands: Vec<Arc<dyn Command<D>>>,
    buttons: Vec<Arc<dyn ComponentHandler<D>>>,
    select_menus: Vec<Arc<dyn ComponentHandler<D>>>,
}

impl<D: Send + Sync + 'static> RegistryBuilder<D> {
    pub fn new() -> Self {
        Self {
            commands: Vec::new(),
            buttons: Vec::new(),
            select_menus: Vec::new(),
        }
    }

    pub fn command<C: Command<D> + 'static>(self, command: C) -> Self {
        self.command_arc(Arc::new(command))
    }

    pub fn command_arc(mut self, command: Arc<dyn Command<D>>) -> Self {
        self.commands.push(command);
        self
    }

    pub fn button<H: ComponentHandler<D> + 'static>(mut self, handler: H) -> Self {
        self.buttons.push(Arc::new(handler));
        self
    }

    pub fn select_menu<H: ComponentHandler<D> + 'static>(mut self, handler: H) -> Self {
        self.select_menus.push(Arc::new(handler));
        self
    }

    /// レジストリを構築
    ///
    /// 名前が空のコマンドは警告してスキップする。
    pub fn build(self) -> Result<CommandRegistry<D>, RegistryError> {
        let mut commands: Vec<Arc<dyn Command<D>>> = Vec::new();
        let mut application = HashMap::new();
        let mut text = HashMap::new();

        for command in self.commands {
            let data = command.data();
            if data.name.trim().is_empty() {
                warn!("Skipping command without a name ({:?})", data.kind);
                continue;
            }

            let index = commands.len();
            if data.kind == CommandKind::Text {
                let key = data.name.to_lowercase();
                if text.insert(key, index).is_some() {
                    return Err(RegistryError::DuplicateCommand(data.name.clone()));
                }
                for alias in &data.aliases {
                    // 自身の名前や重複した別名は同じコマンドを指すので許可
                    let existing = text.insert(alias.to_lowercase(), index);
                    if existing.is_some_and(|existing| existing != index) {
                        return Err(RegistryError::DuplicateAlias {
                            command: data.name.clone(),
                            alias: alias.clone(),
                        });
                    }
                }
            } else if application.insert(data.name.clone(), index).is_some() {
                return Err(RegistryError::DuplicateCommand(data.name.clone()));
            }

            commands.push(command);
        }

        let buttons = ComponentTable::build(self.buttons)?;
        let select_menus = ComponentTable::build(self.select_menus)?;

        info!(
            "Loaded {} commands, {} button handlers, {} select menu handlers",
            commands.len(),
            buttons.handlers.len(),
            select_menus.handlers.len()
        );

        Ok(CommandRegistry {
            commands,
            application,
            text,
            buttons,
            select_menus,
        })
    }
}

impl<D: Send + Sync + 'static> Default for RegistryBuilder<D> {
    fn default() -> Self {
        Self::new()
    }
}
