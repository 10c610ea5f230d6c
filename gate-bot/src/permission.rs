use serde::Serialize;
use serenity::model::id::UserId;
use serenity::model::permissions::Permissions;
use std::collections::HashSet;
use tracing::warn;

/// 不足している権限
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MissingPermission {
    /// ボット管理者（ADMIN_USER_IDS）であること
    BotAdmin,
    /// Discordの権限フラグ
    Permission(Permissions),
}

impl MissingPermission {
    /// 権限名を取得
    pub fn name(&self) -> String {
        match self {
            MissingPermission::BotAdmin => "BOT_ADMIN".to_string(),
            MissingPermission::Permission(p) => permission_names(*p).join(", "),
        }
    }
}

impl std::fmt::Display for MissingPermission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl Serialize for MissingPermission {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.name())
    }
}

/// 権限フラグの表示名一覧
pub fn permission_names(permissions: Permissions) -> Vec<String> {
    permissions
        .get_permission_names()
        .into_iter()
        .map(|name| name.to_string())
        .collect()
}

/// `held` が `required` をすべて含むか
///
/// ADMINISTRATORを持つ場合はすべての権限を持つものとして扱う。
pub fn has_permission(held: Permissions, required: Permissions) -> bool {
    held.contains(Permissions::ADMINISTRATOR) || held.contains(required)
}

/// 宣言順に確認し、最初に不足している権限を返す
pub fn first_missing(held: Permissions, required: &[Permissions]) -> Option<Permissions> {
    required
        .iter()
        .copied()
        .find(|p| !has_permission(held, *p))
}

/// 要求権限の和集合
pub fn union(required: &[Permissions]) -> Permissions {
    required
        .iter()
        .fold(Permissions::empty(), |acc, p| acc | *p)
}

/// ボット管理者リスト
///
/// 管理者は `admins_only` コマンドを実行でき、クールダウンの対象外になる。
#[derive(Debug, Clone, Default)]
pub struct AdminList {
    admins: HashSet<UserId>,
}

impl AdminList {
    /// 空のリストを作成
    pub fn new() -> Self {
        Self::default()
    }

    /// ユーザーIDのリストから作成
    pub fn from_ids(ids: impl IntoIterator<Item = UserId>) -> Self {
        Self {
            admins: ids.into_iter().collect(),
        }
    }

    /// ユーザーが管理者かどうか
    pub fn is_admin(&self, user_id: UserId) -> bool {
        self.admins.contains(&user_id)
    }

    pub fn len(&self) -> usize {
        self.admins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.admins.is_empty()
    }
}

/// カンマ区切りのユーザーIDをパースする
pub fn parse_user_ids(raw: &str) -> Vec<UserId> {
    let mut ids = Vec::new();
    for id_str in raw.split(',') {
        let id_str = id_str.trim();
        if id_str.is_empty() {
            continue;
        }
        match id_str.parse::<u64>() {
            Ok(id) if id != 0 => ids.push(UserId::new(id)),
            _ => warn!("Invalid user ID: {}", id_str),
        }
    }
    ids
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_permission_exact() {
        let held = Permissions::KICK_MEMBERS | Permissions::BAN_MEMBERS;
        assert!(has_permission(held, Permissions::KICK_MEMBERS));
        assert!(has_permission(
            held,
            Permissions::KICK_MEMBERS | Permissions::BAN_MEMBERS
        ));
        assert!(!has_permission(held, Permissions::MANAGE_GUILD));
    }

    #[test]
    fn test_administrator_holds_everything() {
        assert!(has_permission(
            Permissions::ADMINISTRATOR,
            Permissions::MANAGE_GUILD | Permissions::BAN_MEMBERS
        ));
    }

    #[test]
    fn test_first_missing_follows_declaration_order() {
        let held = Permissions::SEND_MESSAGES;
        let required = [
            Permissions::SEND_MESSAGES,
            Permissions::MANAGE_MESSAGES,
            Permissions::KICK_MEMBERS,
        ];
        assert_eq!(
            first_missing(held, &required),
            Some(Permissions::MANAGE_MESSAGES)
        );
        assert_eq!(first_missing(held, &required[..1]), None);
        assert_eq!(first_missing(Permissions::empty(), &[]), None);
    }

    #[test]
    fn test_union() {
        let required = [Permissions::KICK_MEMBERS, Permissions::BAN_MEMBERS];
        assert_eq!(
            union(&required),
            Permissions::KICK_MEMBERS | Permissions::BAN_MEMBERS
        );
        assert_eq!(union(&[]), Permissions::empty());
    }

    #[test]
    fn test_admin_list_from_parsed_ids() {
        let admins = AdminList::from_ids(parse_user_ids("111, 222,,abc,0, 333 "));
        assert_eq!(admins.len(), 3);
        assert!(admins.is_admin(UserId::new(111)));
        assert!(admins.is_admin(UserId::new(333)));
        assert!(!admins.is_admin(UserId::new(444)));
    }

    #[test]
    fn test_admin_list_empty() {
        let admins = AdminList::from_ids(parse_user_ids(""));
        assert!(admins.is_empty());
    }

    #[test]
    fn test_missing_permission_display() {
        assert_eq!(MissingPermission::BotAdmin.to_string(), "BOT_ADMIN");
        let missing = MissingPermission::Permission(Permissions::KICK_MEMBERS);
        assert!(!missing.to_string().is_empty());
        assert_ne!(missing.to_string(), "BOT_ADMIN");
    }
}
