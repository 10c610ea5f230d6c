use crate::clock::{Clock, SystemClock};
use chrono::{DateTime, Utc};
use serenity::model::id::UserId;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

/// 最終実行時刻と、その時点のクールダウン時間
#[derive(Debug, Clone, Copy)]
struct CooldownEntry {
    invoked_at: DateTime<Utc>,
    window: Duration,
}

impl CooldownEntry {
    /// 残り時間（期限切れならNone）
    fn remaining(&self, now: DateTime<Utc>) -> Option<Duration> {
        // 時計が巻き戻った場合は経過0として扱う
        let elapsed = (now - self.invoked_at).to_std().unwrap_or(Duration::ZERO);
        if elapsed < self.window {
            Some(self.window - elapsed)
        } else {
            None
        }
    }
}

/// クールダウン判定の結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CooldownStatus {
    /// 実行可能（実行時刻を記録済み）
    Ready,
    /// クールダウン中
    Limited { remaining: Duration },
}

/// コマンドごと・ユーザーごとのクールダウンを管理するストア
///
/// エントリはタイマーで消さず、参照時に期限を判定する。
/// 古いエントリは `cleanup_expired` でまとめて削除する。
#[derive(Clone)]
pub struct CooldownStore {
    /// コマンド名 -> (ユーザーID -> エントリ)
    entries: Arc<RwLock<HashMap<String, HashMap<UserId, CooldownEntry>>>>,
    clock: Arc<dyn Clock>,
}

impl CooldownStore {
    /// システム時刻で作成
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// 任意の時計で作成
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            clock,
        }
    }

    /// クールダウンを確認し、実行可能なら現在時刻を記録する
    ///
    /// 確認と記録は同じ書き込みロック内で行うため、同一ユーザーの
    /// 同時実行が両方とも通過することはない。
    ///
    /// # Arguments
    /// * `command` - コマンド名
    /// * `user_id` - 実行ユーザー
    /// * `window` - クールダウン時間（0なら記録しない）
    pub async fn check_and_record(
        &self,
        command: &str,
        user_id: UserId,
        window: Duration,
    ) -> CooldownStatus {
        if window.is_zero() {
            return CooldownStatus::Ready;
        }

        let now = self.clock.now();
        let mut entries = self.entries.write().await;
        let users = entries.entry(command.to_string()).or_default();

        if let Some(remaining) = users.get(&user_id).and_then(|e| e.remaining(now)) {
            debug!(
                "User {} is on cooldown for {} ({}ms left)",
                user_id,
                command,
                remaining.as_millis()
            );
            return CooldownStatus::Limited { remaining };
        }

        users.insert(
            user_id,
            CooldownEntry {
                invoked_at: now,
                window,
            },
        );
        CooldownStatus::Ready
    }

    /// クールダウンの残り時間を返す
    ///
    /// # Returns
    /// * `Some(残り時間)` - クールダウン中の場合
    /// * `None` - 実行可能な場合
    pub async fn remaining(&self, command: &str, user_id: UserId) -> Option<Duration> {
        let now = self.clock.now();
        let entries = self.entries.read().await;
        entries
            .get(command)
            .and_then(|users| users.get(&user_id))
            .and_then(|e| e.remaining(now))
    }

    /// ユーザーのクールダウンを解除
    pub async fn reset(&self, command: &str, user_id: UserId) -> bool {
        let mut entries = self.entries.write().await;
        entries
            .get_mut(command)
            .map(|users| users.remove(&user_id).is_some())
            .unwrap_or(false)
    }

    /// 有効なクールダウンの件数
    pub async fn active_count(&self) -> usize {
        let now = self.clock.now();
        let entries = self.entries.read().await;
        entries
            .values()
            .flat_map(|users| users.values())
            .filter(|e| e.remaining(now).is_some())
            .count()
    }

    /// 期限切れエントリをクリーンアップ
    pub async fn cleanup_expired(&self) {
        let now = self.clock.now();
        let mut entries = self.entries.write().await;
        let mut removed = 0;

        entries.retain(|_, users| {
            let before = users.len();
            users.retain(|_, e| e.remaining(now).is_some());
            removed += before - users.len();
            !users.is_empty()
        });

        if removed > 0 {
            debug!("Cleaned up {} expired cooldown entries", removed);
        }
    }
}

impl Default for CooldownStore {
    fn default() -> Self {
        Self::new()
    }
}
