//! ディスパッチシグナル
//!
//! 権限不足・クールダウン・ハンドラーの失敗など、ポリシーによる拒否を
//! 購読者に通知するブロードキャストチャネル。

use crate::command::InvocationContext;
use crate::permission::MissingPermission;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::debug;

/// パイプラインの段階
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineStage {
    Before,
    Inhibitor,
    Permission,
    Execute,
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PipelineStage::Before => "before",
            PipelineStage::Inhibitor => "inhibitor",
            PipelineStage::Permission => "permission",
            PipelineStage::Execute => "execute",
        };
        write!(f, "{}", s)
    }
}

/// ディスパッチ中に発生したシグナル
#[derive(Debug, Clone)]
pub enum DispatchSignal {
    /// 実行ユーザーの権限不足（ボット管理者限定を含む）
    UserMissingPermission {
        context: InvocationContext,
        permission: MissingPermission,
    },
    /// ボットの権限不足
    BotMissingPermission {
        context: InvocationContext,
        permission: MissingPermission,
    },
    /// クールダウン中
    CooldownLimit {
        context: InvocationContext,
        remaining: Duration,
    },
    /// ハンドラー・インヒビター・権限取得のエラー
    ExecutionFailed {
        context: InvocationContext,
        stage: PipelineStage,
        message: String,
    },
}

impl DispatchSignal {
    pub fn context(&self) -> &InvocationContext {
        match self {
            DispatchSignal::UserMissingPermission { context, .. }
            | DispatchSignal::BotMissingPermission { context, .. }
            | DispatchSignal::CooldownLimit { context, .. }
            | DispatchSignal::ExecutionFailed { context, .. } => context,
        }
    }

    /// ログ用の種別名
    pub fn kind(&self) -> &'static str {
        match self {
            DispatchSignal::UserMissingPermission { .. } => "user_missing_permission",
            DispatchSignal::BotMissingPermission { .. } => "bot_missing_permission",
            DispatchSignal::CooldownLimit { .. } => "cooldown_limit",
            DispatchSignal::ExecutionFailed { .. } => "execution_failed",
        }
    }
}

/// シグナルのブロードキャストバス
#[derive(Debug, Clone)]
pub struct SignalBus {
    sender: broadcast::Sender<DispatchSignal>,
}

impl SignalBus {
    /// 指定容量で作成
    ///
    /// 遅れた購読者は古いシグナルから失う。
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DispatchSignal> {
        self.sender.subscribe()
    }

    /// シグナルを送信（購読者がいなければ捨てる）
    pub fn publish(&self, signal: DispatchSignal) {
        let kind = signal.kind();
        if self.sender.send(signal).is_err() {
            debug!("No subscribers for {} signal", kind);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for SignalBus {
    fn default() -> Self {
        Self::new(64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::EventSource;
    use serenity::model::id::{ChannelId, UserId};

    fn context() -> InvocationContext {
        InvocationContext::new(
            EventSource::ApplicationCommand,
            "ping",
            UserId::new(1),
            None,
            ChannelId::new(2),
        )
    }

    #[tokio::test]
    async fn test_publish_and_receive() {
        let bus = SignalBus::new(8);
        let mut rx = bus.subscribe();

        bus.publish(DispatchSignal::CooldownLimit {
            context: context(),
            remaining: Duration::from_secs(3),
        });

        let signal = rx.recv().await.unwrap();
        assert_eq!(signal.kind(), "cooldown_limit");
        assert_eq!(signal.context().target, "ping");
    }

    #[test]
    fn test_publish_without_subscribers_is_dropped() {
        let bus = SignalBus::default();
        assert_eq!(bus.subscriber_count(), 0);
        bus.publish(DispatchSignal::UserMissingPermission {
            context: context(),
            permission: MissingPermission::BotAdmin,
        });
    }

    #[tokio::test]
    async fn test_lagging_subscriber_loses_oldest() {
        let bus = SignalBus::new(1);
        let mut rx = bus.subscribe();

        for stage in [PipelineStage::Before, PipelineStage::Execute] {
            bus.publish(DispatchSignal::ExecutionFailed {
                context: context(),
                stage,
                message: "boom".to_string(),
            });
        }

        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Lagged(1))
        ));
        match rx.recv().await.unwrap() {
            DispatchSignal::ExecutionFailed { stage, .. } => {
                assert_eq!(stage, PipelineStage::Execute)
            }
            other => panic!("unexpected signal: {:?}", other),
        }
    }
}
