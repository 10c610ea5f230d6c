use gate_bot::api::{self, ApiState};
use gate_bot::commands;
use gate_bot::config::BotConfig;
use gate_bot::framework::Framework;
use gate_bot::handler::{Handler, SerenityEvent};
use gate_bot::inhibitor::BlocklistInhibitor;
use gate_bot::permission::AdminList;
use gate_bot::platform::SerenityPlatform;
use gate_bot::responder;
use serenity::http::Http;
use serenity::prelude::*;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    // トレーシング初期化
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    // 環境変数を取得
    let config = match BotConfig::from_env() {
        Ok(config) => {
            info!("Configuration loaded: {:?}", config);
            config
        }
        Err(e) => {
            error!("Invalid configuration: {}", e);
            return;
        }
    };

    // HTTPクライアント
    let http = Arc::new(Http::new(&config.discord_token));
    let platform = Arc::new(SerenityPlatform::new(http.clone()));

    // フレームワークを構築
    let builder = Framework::<SerenityEvent>::builder()
        .platform(platform.clone())
        .inhibitor(BlocklistInhibitor::new(config.blocked_user_ids.iter().copied()))
        .admins(AdminList::from_ids(config.admin_ids.iter().copied()))
        .prefix(config.prefix.clone())
        .guild(config.guild_id);
    let framework = match commands::register(builder).build() {
        Ok(framework) => Arc::new(framework),
        Err(e) => {
            error!("Failed to build framework: {}", e);
            return;
        }
    };

    // 定期的に期限切れのクールダウンと権限キャッシュをクリーンアップ
    let cleanup_cooldowns = framework.cooldowns().clone();
    let cleanup_cache = platform.permission_cache().clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(300)); // 5分ごと
        loop {
            interval.tick().await;
            cleanup_cooldowns.cleanup_expired().await;
            cleanup_cache.cleanup_expired().await;
        }
    });

    // シグナル応答を開始（クライアント起動の前にsubscribe）
    let signal_receiver = framework.signals().subscribe();
    tokio::spawn(responder::run(http.clone(), signal_receiver));

    // 管理APIはトークンがある場合のみ起動
    match config.api_token.clone() {
        Some(token) => {
            let api_state = ApiState {
                framework: framework.clone(),
                token,
            };
            let api_port = config.api_port;
            tokio::spawn(async move {
                api::start_server(api_state, api_port).await;
            });
        }
        None => info!("API_TOKEN not set, management API disabled"),
    }

    // インテントを設定
    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::DIRECT_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT;

    info!("Creating client...");

    // クライアントを作成
    let mut client = match Client::builder(&config.discord_token, intents)
        .event_handler(Handler::new(framework, platform))
        .await
    {
        Ok(client) => {
            info!("Client created");
            client
        }
        Err(why) => {
            error!("Error creating client: {:?}", why);
            return;
        }
    };

    info!("Starting bot...");

    // 起動
    if let Err(why) = client.start().await {
        error!("Client error: {:?}", why);
    }
}
