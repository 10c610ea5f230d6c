//! メンバー権限キャッシュ
//!
//! Discord APIから解決したメンバーの権限セットを一定時間キャッシュする。
//! テキストコマンドのように権限情報を伴わないイベントで、毎回メンバーと
//! ロールを取得しないために使う。

use serenity::model::id::{GuildId, UserId};
use serenity::model::permissions::Permissions;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;

/// キャッシュエントリ
#[derive(Debug, Clone, Copy)]
struct PermissionCacheEntry {
    permissions: Permissions,
    cached_at: Instant,
}

/// メンバー権限のキャッシュ
#[derive(Debug, Clone)]
pub struct PermissionCache {
    /// (GuildId, UserId) -> エントリ
    cache: Arc<RwLock<HashMap<(GuildId, UserId), PermissionCacheEntry>>>,
    /// キャッシュの有効期限
    ttl: Duration,
}

impl Default for PermissionCache {
    fn default() -> Self {
        Self::new()
    }
}

impl PermissionCache {
    /// 新しいPermissionCacheを作成（デフォルトTTL: 60秒）
    pub fn new() -> Self {
        Self::with_ttl(Duration::from_secs(60))
    }

    /// カスタムTTLで作成
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            cache: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    /// キャッシュから権限を取得
    pub async fn get_cached(&self, guild_id: GuildId, user_id: UserId) -> Option<Permissions> {
        let cache = self.cache.read().await;
        let entry = cache.get(&(guild_id, user_id))?;
        if entry.cached_at.elapsed() < self.ttl {
            debug!("Permission cache hit for user {} in guild {}", user_id, guild_id);
            Some(entry.permissions)
        } else {
            None
        }
    }

    /// キャッシュに権限を保存
    pub async fn set_cache(&self, guild_id: GuildId, user_id: UserId, permissions: Permissions) {
        let mut cache = self.cache.write().await;
        cache.insert(
            (guild_id, user_id),
            PermissionCacheEntry {
                permissions,
                cached_at: Instant::now(),
            },
        );
    }

    /// 期限切れエントリをクリーンアップ
    pub async fn cleanup_expired(&self) {
        let mut cache = self.cache.write().await;
        let before = cache.len();
        cache.retain(|_, entry| entry.cached_at.elapsed() < self.ttl);
        let removed = before - cache.len();
        if removed > 0 {
            debug!("Cleaned up {} expired permission cache entries", removed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids() -> (GuildId, UserId) {
        (GuildId::new(123), UserId::new(456))
    }

    #[tokio::test]
    async fn test_cache_new() {
        let cache = PermissionCache::new();
        let (guild, user) = ids();
        assert!(cache.get_cached(guild, user).await.is_none());
    }

    #[tokio::test]
    async fn test_cache_set_and_get() {
        let cache = PermissionCache::new();
        let (guild, user) = ids();
        let perms = Permissions::KICK_MEMBERS | Permissions::SEND_MESSAGES;

        cache.set_cache(guild, user, perms).await;
        assert_eq!(cache.get_cached(guild, user).await, Some(perms));
    }

    #[tokio::test]
    async fn test_cache_expiry() {
        let cache = PermissionCache::with_ttl(Duration::from_millis(50));
        let (guild, user) = ids();

        cache.set_cache(guild, user, Permissions::SEND_MESSAGES).await;
        assert!(cache.get_cached(guild, user).await.is_some());

        // TTL経過待機
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(cache.get_cached(guild, user).await.is_none());

        cache.cleanup_expired().await;
        assert!(cache.cache.read().await.is_empty());
    }

    #[test]
    fn test_cache_clone() {
        let cache1 = PermissionCache::new();
        let cache2 = cache1.clone();

        // クローンは同じ内部Arcを共有
        assert!(Arc::ptr_eq(&cache1.cache, &cache2.cache));
    }
}
