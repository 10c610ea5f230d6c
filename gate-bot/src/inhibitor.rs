use crate::command::{EventSource, Invocation};
use async_trait::async_trait;
use serenity::model::id::UserId;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

/// インヒビターが対象とするイベント
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InhibitorKind {
    Button,
    SelectMenu,
    ApplicationCommand,
    MessageCommand,
    /// すべてのイベント
    All,
}

impl InhibitorKind {
    /// イベントの発生元に適用されるか
    pub fn applies_to(self, source: EventSource) -> bool {
        matches!(
            (self, source),
            (InhibitorKind::All, _)
                | (InhibitorKind::Button, EventSource::Button)
                | (InhibitorKind::SelectMenu, EventSource::SelectMenu)
                | (InhibitorKind::ApplicationCommand, EventSource::ApplicationCommand)
                | (InhibitorKind::MessageCommand, EventSource::MessageCommand)
        )
    }
}

/// Inhibitor trait - 実行前に呼び出しを拒否できるゲート
#[async_trait]
pub trait Inhibitor<D: Send + Sync + 'static>: Send + Sync {
    /// インヒビター名
    fn name(&self) -> &str;

    /// 対象イベント
    fn kinds(&self) -> &[InhibitorKind];

    /// 優先度（大きいものから評価）
    fn priority(&self) -> i32 {
        0
    }

    /// 通過させる場合はtrue
    async fn check(&self, invocation: &Invocation<D>) -> anyhow::Result<bool>;

    /// `check` がfalseを返したときのみ呼ばれる
    async fn on_failure(&self, invocation: &Invocation<D>) -> anyhow::Result<()>;
}

/// インヒビター評価の結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InhibitorVerdict {
    Passed,
    /// 拒否したインヒビター名
    Rejected(String),
}

/// 登録済みインヒビターの集合
pub struct InhibitorChain<D: Send + Sync + 'static> {
    inhibitors: Vec<Arc<dyn Inhibitor<D>>>,
}

impl<D: Send + Sync + 'static> InhibitorChain<D> {
    pub fn new() -> Self {
        Self {
            inhibitors: Vec::new(),
        }
    }

    /// インヒビターを登録
    pub fn register<I: Inhibitor<D> + 'static>(&mut self, inhibitor: I) {
        self.register_arc(Arc::new(inhibitor));
    }

    pub fn register_arc(&mut self, inhibitor: Arc<dyn Inhibitor<D>>) {
        info!(
            "Registering inhibitor: {} (priority {})",
            inhibitor.name(),
            inhibitor.priority()
        );
        self.inhibitors.push(inhibitor);
    }

    pub fn len(&self) -> usize {
        self.inhibitors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inhibitors.is_empty()
    }

    /// 発生元に適用されるインヒビターを優先度の降順で返す
    ///
    /// 同じ優先度は登録順を保つ（安定ソート）。
    pub fn for_source(&self, source: EventSource) -> Vec<Arc<dyn Inhibitor<D>>> {
        let mut selected: Vec<Arc<dyn Inhibitor<D>>> = self
            .inhibitors
            .iter()
            .filter(|i| i.kinds().iter().any(|k| k.applies_to(source)))
            .cloned()
            .collect();
        selected.sort_by(|a, b| b.priority().cmp(&a.priority()));
        selected
    }

    /// インヒビターを順に評価する
    ///
    /// 最初にfalseを返したインヒビターの `on_failure` だけを呼び、以降は評価しない。
    pub async fn evaluate(&self, invocation: &Invocation<D>) -> anyhow::Result<InhibitorVerdict> {
        for inhibitor in self.for_source(invocation.context.source) {
            if !inhibitor.check(invocation).await? {
                debug!(
                    "Inhibitor {} rejected {} from user {}",
                    inhibitor.name(),
                    invocation.context.target,
                    invocation.context.user_id
                );
                inhibitor.on_failure(invocation).await?;
                return Ok(InhibitorVerdict::Rejected(inhibitor.name().to_string()));
            }
        }
        Ok(InhibitorVerdict::Passed)
    }
}

impl<D: Send + Sync + 'static> Default for InhibitorChain<D> {
    fn default() -> Self {
        Self::new()
    }
}

/// 指定ユーザーからの呼び出しをすべて拒否するインヒビター
pub struct BlocklistInhibitor {
    blocked: HashSet<UserId>,
}

impl BlocklistInhibitor {
    pub fn new(blocked: impl IntoIterator<Item = UserId>) -> Self {
        Self {
            blocked: blocked.into_iter().collect(),
        }
    }
}

#[async_trait]
impl<D: Send + Sync + 'static> Inhibitor<D> for BlocklistInhibitor {
    fn name(&self) -> &str {
        "blocklist"
    }

    fn kinds(&self) -> &[InhibitorKind] {
        &[InhibitorKind::All]
    }

    fn priority(&self) -> i32 {
        100
    }

    async fn check(&self, invocation: &Invocation<D>) -> anyhow::Result<bool> {
        Ok(!self.blocked.contains(&invocation.context.user_id))
    }

    async fn on_failure(&self, invocation: &Invocation<D>) -> anyhow::Result<()> {
        info!(
            "Ignored {} from blocked user {}",
            invocation.context.target, invocation.context.user_id
        );
        Ok(())
    }
}
