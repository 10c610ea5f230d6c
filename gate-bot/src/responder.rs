//! シグナルの応答
//!
//! ディスパッチシグナルを購読し、ユーザー向けのメッセージを返す。
//! インタラクション由来なら本人だけに見える応答、テキストコマンドなら
//! 発生したチャンネルへのメッセージになる。すべてのシグナルはログにも残す。

use crate::command::InteractionHandle;
use crate::signal::DispatchSignal;
use serenity::builder::{
    CreateInteractionResponse, CreateInteractionResponseFollowup, CreateInteractionResponseMessage,
};
use serenity::http::Http;
use serenity::model::id::ChannelId;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// シグナルの送り先
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// インタラクションへのエフェメラル応答
    Ephemeral(InteractionHandle),
    /// チャンネルへのメッセージ
    Channel(ChannelId),
}

/// シグナルの送り先を決める
pub fn delivery(signal: &DispatchSignal) -> Delivery {
    let context = signal.context();
    match &context.interaction {
        Some(handle) => Delivery::Ephemeral(handle.clone()),
        None => Delivery::Channel(context.channel_id),
    }
}

/// シグナルに対応するユーザー向けメッセージ
pub fn signal_message(signal: &DispatchSignal) -> String {
    match signal {
        DispatchSignal::UserMissingPermission { permission, .. } => {
            format!("このコマンドを実行する権限がありません。（必要な権限: {}）", permission)
        }
        DispatchSignal::BotMissingPermission { permission, .. } => {
            format!("ボットに必要な権限がありません。（必要な権限: {}）", permission)
        }
        DispatchSignal::CooldownLimit { remaining, .. } => format!(
            "クールダウン中です。あと{:.1}秒待ってから再度お試しください。",
            remaining.as_secs_f64()
        ),
        DispatchSignal::ExecutionFailed { .. } => {
            "コマンドの実行中にエラーが発生しました。".to_string()
        }
    }
}

async fn send(http: &Arc<Http>, delivery: Delivery, message: String) -> serenity::Result<()> {
    match delivery {
        Delivery::Ephemeral(handle) => {
            let response = CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .content(message.clone())
                    .ephemeral(true),
            );
            let result = http
                .create_interaction_response(handle.id, &handle.token, &response, Vec::new())
                .await;
            if let Err(e) = result {
                // 実行段階の失敗ではハンドラーが応答済みのことがある
                debug!("Initial response for {} failed ({}), sending a followup", handle.id, e);
                let followup = CreateInteractionResponseFollowup::new()
                    .content(message)
                    .ephemeral(true);
                http.create_followup_message(&handle.token, &followup, Vec::new())
                    .await?;
            }
            Ok(())
        }
        Delivery::Channel(channel_id) => channel_id.say(http, message).await.map(|_| ()),
    }
}

/// シグナルを受信してユーザーに通知するループ
///
/// チャネルが閉じるまで動き続ける。
pub async fn run(http: Arc<Http>, mut receiver: broadcast::Receiver<DispatchSignal>) {
    info!("Signal responder started");
    loop {
        match receiver.recv().await {
            Ok(signal) => {
                let context = signal.context();
                info!(
                    "{} signal for {} {} from user {}",
                    signal.kind(),
                    context.source,
                    context.target,
                    context.user_id
                );

                let message = signal_message(&signal);
                if let Err(e) = send(&http, delivery(&signal), message).await {
                    error!("Failed to send signal response: {}", e);
                }
            }
            Err(broadcast::error::RecvError::Closed) => {
                info!("Signal channel closed");
                break;
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!("Signal responder lagged by {} signals", n);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{EventSource, InvocationContext};
    use crate::permission::MissingPermission;
    use crate::signal::PipelineStage;
    use serenity::model::id::{InteractionId, UserId};
    use serenity::model::permissions::Permissions;
    use std::time::Duration;

    fn context() -> InvocationContext {
        InvocationContext::new(
            EventSource::ApplicationCommand,
            "kick",
            UserId::new(1),
            None,
            ChannelId::new(2),
        )
    }

    #[test]
    fn test_interaction_signals_are_answered_ephemerally() {
        let signal = DispatchSignal::CooldownLimit {
            context: context().with_interaction(InteractionId::new(42), "token"),
            remaining: Duration::from_secs(3),
        };
        assert_eq!(
            delivery(&signal),
            Delivery::Ephemeral(InteractionHandle {
                id: InteractionId::new(42),
                token: "token".to_string(),
            })
        );
    }

    #[test]
    fn test_text_command_signals_go_to_the_channel() {
        let mut context = context();
        context.source = EventSource::MessageCommand;
        let signal = DispatchSignal::UserMissingPermission {
            context,
            permission: MissingPermission::BotAdmin,
        };
        assert_eq!(delivery(&signal), Delivery::Channel(ChannelId::new(2)));
    }

    #[test]
    fn test_permission_messages_name_the_permission() {
        let message = signal_message(&DispatchSignal::UserMissingPermission {
            context: context(),
            permission: MissingPermission::BotAdmin,
        });
        assert!(message.contains("BOT_ADMIN"));

        let permission = MissingPermission::Permission(Permissions::KICK_MEMBERS);
        let message = signal_message(&DispatchSignal::BotMissingPermission {
            context: context(),
            permission,
        });
        assert!(message.contains("ボット"));
        assert!(message.contains(&permission.name()));
    }

    #[test]
    fn test_cooldown_message_shows_remaining_seconds() {
        let message = signal_message(&DispatchSignal::CooldownLimit {
            context: context(),
            remaining: Duration::from_millis(2500),
        });
        assert!(message.contains("2.5秒"));
    }

    #[test]
    fn test_execution_failure_hides_details() {
        let message = signal_message(&DispatchSignal::ExecutionFailed {
            context: context(),
            stage: PipelineStage::Execute,
            message: "database password leaked".to_string(),
        });
        assert!(!message.contains("password"));
    }
}
