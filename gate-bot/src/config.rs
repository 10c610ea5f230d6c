//! 環境変数からの設定読み込み

use crate::dispatcher::DEFAULT_PREFIX;
use crate::permission::parse_user_ids;
use serenity::model::id::{GuildId, UserId};
use thiserror::Error;
use tracing::{debug, info};

/// APIサーバーのデフォルトポート
pub const DEFAULT_API_PORT: u16 = 3000;

/// 設定エラー
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} not set")]
    MissingVar(&'static str),

    #[error("Invalid value for {var}: {value}")]
    InvalidValue { var: &'static str, value: String },
}

/// ボットの設定
#[derive(Clone)]
pub struct BotConfig {
    pub discord_token: String,
    /// ボット管理者（ADMIN_USER_IDS）
    pub admin_ids: Vec<UserId>,
    /// テキストコマンドのプレフィックス（COMMAND_PREFIX）
    pub prefix: String,
    /// コマンドを登録するサーバー（GUILD_ID、未設定ならグローバル）
    pub guild_id: Option<GuildId>,
    /// すべての呼び出しを拒否するユーザー（BLOCKED_USER_IDS）
    pub blocked_user_ids: Vec<UserId>,
    pub api_port: u16,
    /// 管理APIのトークン（未設定ならAPIを起動しない）
    pub api_token: Option<String>,
}

impl std::fmt::Debug for BotConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BotConfig")
            .field("discord_token", &"<redacted>")
            .field("admin_ids", &self.admin_ids)
            .field("prefix", &self.prefix)
            .field("guild_id", &self.guild_id)
            .field("blocked_user_ids", &self.blocked_user_ids)
            .field("api_port", &self.api_port)
            .field("api_token", &self.api_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl BotConfig {
    /// 環境変数から読み込む
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 任意のキー検索関数から読み込む
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // 空文字は未設定として扱う
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let discord_token = get("DISCORD_BOT_TOKEN").ok_or(ConfigError::MissingVar("DISCORD_BOT_TOKEN"))?;
        info!("Discord token loaded");

        let admin_ids = get("ADMIN_USER_IDS")
            .map(|raw| parse_user_ids(&raw))
            .unwrap_or_default();
        let blocked_user_ids = get("BLOCKED_USER_IDS")
            .map(|raw| parse_user_ids(&raw))
            .unwrap_or_default();

        let prefix = get("COMMAND_PREFIX")
            .map(|p| p.trim().to_string())
            .unwrap_or_else(|| DEFAULT_PREFIX.to_string());

        let guild_id = match get("GUILD_ID") {
            Some(raw) => Some(parse_guild_id(&raw)?),
            None => None,
        };

        let api_port = match get("API_PORT") {
            Some(raw) => raw.trim().parse::<u16>().map_err(|_| ConfigError::InvalidValue {
                var: "API_PORT",
                value: raw.clone(),
            })?,
            None => DEFAULT_API_PORT,
        };

        let api_token = get("API_TOKEN");

        let config = Self {
            discord_token,
            admin_ids,
            prefix,
            guild_id,
            blocked_user_ids,
            api_port,
            api_token,
        };
        debug!("Loaded config: {:?}", config);
        Ok(config)
    }
}

fn parse_guild_id(raw: &str) -> Result<GuildId, ConfigError> {
    match raw.trim().parse::<u64>() {
        Ok(id) if id != 0 => Ok(GuildId::new(id)),
        _ => Err(ConfigError::InvalidValue {
            var: "GUILD_ID",
            value: raw.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<BotConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        BotConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[("DISCORD_BOT_TOKEN", "token")]).unwrap();
        assert_eq!(config.discord_token, "token");
        assert!(config.admin_ids.is_empty());
        assert_eq!(config.prefix, "!");
        assert!(config.guild_id.is_none());
        assert_eq!(config.api_port, DEFAULT_API_PORT);
        assert!(config.api_token.is_none());
    }

    #[test]
    fn test_missing_token() {
        assert_eq!(
            load(&[]).unwrap_err(),
            ConfigError::MissingVar("DISCORD_BOT_TOKEN")
        );
        assert_eq!(
            load(&[("DISCORD_BOT_TOKEN", "  ")]).unwrap_err(),
            ConfigError::MissingVar("DISCORD_BOT_TOKEN")
        );
    }

    #[test]
    fn test_full_config() {
        let config = load(&[
            ("DISCORD_BOT_TOKEN", "token"),
            ("ADMIN_USER_IDS", "111, 222, invalid"),
            ("BLOCKED_USER_IDS", "333"),
            ("COMMAND_PREFIX", "?"),
            ("GUILD_ID", "444"),
            ("API_PORT", "8080"),
            ("API_TOKEN", "secret"),
        ])
        .unwrap();

        assert_eq!(config.admin_ids, vec![UserId::new(111), UserId::new(222)]);
        assert_eq!(config.blocked_user_ids, vec![UserId::new(333)]);
        assert_eq!(config.prefix, "?");
        assert_eq!(config.guild_id, Some(GuildId::new(444)));
        assert_eq!(config.api_port, 8080);
        assert_eq!(config.api_token.as_deref(), Some("secret"));
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            load(&[("DISCORD_BOT_TOKEN", "t"), ("GUILD_ID", "abc")]),
            Err(ConfigError::InvalidValue { var: "GUILD_ID", .. })
        ));
        assert!(matches!(
            load(&[("DISCORD_BOT_TOKEN", "t"), ("GUILD_ID", "0")]),
            Err(ConfigError::InvalidValue { var: "GUILD_ID", .. })
        ));
        assert!(matches!(
            load(&[("DISCORD_BOT_TOKEN", "t"), ("API_PORT", "70000")]),
            Err(ConfigError::InvalidValue { var: "API_PORT", .. })
        ));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = load(&[("DISCORD_BOT_TOKEN", "supersecret"), ("API_TOKEN", "apisecret")]).unwrap();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("supersecret"));
        assert!(!debug.contains("apisecret"));
    }
}
