//! HTTP API - Discord外からコマンド登録を操作する

use axum::{
    extract::{Path, Query, Request, State},
    http::{header, Method, StatusCode},
    middleware::{self, Next},
    response::{Json, Response},
    routing::{delete, get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serenity::model::id::{GuildId, UserId};
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

use crate::command::{CommandKind, CommandScope};
use crate::framework::Framework;
use crate::manager::ManagerError;
use crate::permission::permission_names;
use crate::platform::RegisteredCommand;

/// APIサーバーの共有状態
pub struct ApiState<D: Send + Sync + 'static> {
    pub framework: Arc<Framework<D>>,
    /// Bearerトークン
    pub token: String,
}

/// ヘルスチェックレスポンス
#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    commands: usize,
    buttons: usize,
    select_menus: usize,
}

/// コマンド情報
#[derive(Debug, Serialize)]
pub struct CommandSummary {
    pub name: String,
    pub kind: CommandKind,
    pub description: String,
    pub aliases: Vec<String>,
    pub category: Option<String>,
    pub scope: CommandScope,
    pub admins_only: bool,
    pub cooldown_secs: f64,
    pub user_permissions: Vec<String>,
    pub bot_permissions: Vec<String>,
    /// Discordに登録される（テキストコマンド以外）
    pub remote: bool,
}

/// 登録リクエスト
#[derive(Debug, Default, Deserialize)]
pub struct RegisterRequest {
    /// 未指定なら設定されたスコープ（GUILD_ID）に登録する
    #[serde(default)]
    pub guild_id: Option<u64>,
}

/// スコープ指定クエリ
#[derive(Debug, Default, Deserialize)]
pub struct ScopeQuery {
    #[serde(default)]
    pub guild_id: Option<u64>,
}

/// 登録レスポンス
#[derive(Serialize)]
pub struct RegisterResponse {
    pub scope: String,
    pub registered: Vec<RegisteredCommand>,
}

/// 削除レスポンス
#[derive(Serialize)]
pub struct PurgeResponse {
    pub scope: String,
}

/// クールダウン統計
#[derive(Serialize)]
pub struct CooldownResponse {
    pub active: usize,
}

/// クールダウン解除レスポンス
#[derive(Serialize)]
pub struct CooldownResetResponse {
    /// 正規のコマンド名（別名で指定しても名前になる）
    pub command: String,
    pub user_id: String,
    /// 有効なクールダウンが解除されたか
    pub reset: bool,
}

/// エラーレスポンス
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

/// APIルーターを作成
///
/// `/api/health` 以外はBearerトークンが必要。
pub fn create_router<D: Send + Sync + 'static>(state: ApiState<D>) -> Router {
    let state = Arc::new(state);

    // CORS設定
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    let protected = Router::new()
        // コマンド
        .route(
            "/api/commands",
            get(list_commands::<D>).delete(purge_commands::<D>),
        )
        .route("/api/commands/register", post(register_commands::<D>))
        // クールダウン
        .route("/api/cooldowns", get(cooldown_stats::<D>))
        .route(
            "/api/cooldowns/{command}/{user_id}",
            delete(reset_cooldown::<D>),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_token::<D>,
        ));

    Router::new()
        // ヘルスチェック
        .route("/api/health", get(health::<D>))
        .merge(protected)
        .layer(cors)
        .with_state(state)
}

// ===== 認証 =====

async fn require_token<D: Send + Sync + 'static>(
    State(state): State<Arc<ApiState<D>>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let provided = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .unwrap_or("");

    // タイミング攻撃対策のため定数時間で比較
    let valid: bool = provided
        .as_bytes()
        .ct_eq(state.token.as_bytes())
        .into();
    if !valid {
        warn!("Rejected API request to {} (invalid token)", request.uri().path());
        return Err(api_error(StatusCode::UNAUTHORIZED, "Invalid or missing token"));
    }

    Ok(next.run(request).await)
}

// ===== ヘルスチェック =====

async fn health<D: Send + Sync + 'static>(
    State(state): State<Arc<ApiState<D>>>,
) -> Json<HealthResponse> {
    let registry = state.framework.registry();
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        commands: registry.len(),
        buttons: registry.button_count(),
        select_menus: registry.select_menu_count(),
    })
}

// ===== コマンド =====

async fn list_commands<D: Send + Sync + 'static>(
    State(state): State<Arc<ApiState<D>>>,
) -> Json<Vec<CommandSummary>> {
    let commands = state
        .framework
        .registry()
        .commands()
        .map(|command| {
            let data = command.data();
            CommandSummary {
                name: data.name.clone(),
                kind: data.kind,
                description: data.description.clone(),
                aliases: data.aliases.clone(),
                category: data.category.clone(),
                scope: data.scope,
                admins_only: data.admins_only,
                cooldown_secs: data.cooldown.as_secs_f64(),
                user_permissions: data
                    .user_permissions
                    .iter()
                    .flat_map(|p| permission_names(*p))
                    .collect(),
                bot_permissions: data
                    .bot_permissions
                    .iter()
                    .flat_map(|p| permission_names(*p))
                    .collect(),
                remote: data.kind.is_application(),
            }
        })
        .collect();
    Json(commands)
}

async fn register_commands<D: Send + Sync + 'static>(
    State(state): State<Arc<ApiState<D>>>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<RegisterResponse>, ApiError> {
    let guild_id = resolve_guild(&state, req.guild_id)?;
    info!("API register request ({})", scope_label(guild_id));

    match state.framework.manager().register_all(guild_id).await {
        Ok(registered) => Ok(Json(RegisterResponse {
            scope: scope_label(guild_id),
            registered,
        })),
        Err(e) => Err(manager_error(e)),
    }
}

async fn purge_commands<D: Send + Sync + 'static>(
    State(state): State<Arc<ApiState<D>>>,
    Query(query): Query<ScopeQuery>,
) -> Result<Json<PurgeResponse>, ApiError> {
    let guild_id = resolve_guild(&state, query.guild_id)?;
    info!("API purge request ({})", scope_label(guild_id));

    match state.framework.manager().delete_all(guild_id).await {
        Ok(()) => Ok(Json(PurgeResponse {
            scope: scope_label(guild_id),
        })),
        Err(e) => Err(manager_error(e)),
    }
}

// ===== クールダウン =====

async fn cooldown_stats<D: Send + Sync + 'static>(
    State(state): State<Arc<ApiState<D>>>,
) -> Json<CooldownResponse> {
    Json(CooldownResponse {
        active: state.framework.cooldowns().active_count().await,
    })
}

async fn reset_cooldown<D: Send + Sync + 'static>(
    State(state): State<Arc<ApiState<D>>>,
    Path((command, user_id)): Path<(String, u64)>,
) -> Result<Json<CooldownResetResponse>, ApiError> {
    if user_id == 0 {
        return Err(api_error(StatusCode::BAD_REQUEST, "Invalid user_id: 0"));
    }
    let Some(found) = state.framework.registry().get(&command) else {
        return Err(api_error(
            StatusCode::NOT_FOUND,
            format!("Command not found: {}", command),
        ));
    };

    // クールダウンは別名ではなく正規の名前で記録されている
    let name = found.data().name.clone();
    let user_id = UserId::new(user_id);
    let reset = state.framework.cooldowns().reset(&name, user_id).await;
    info!("API cooldown reset for {} / user {} (cleared: {})", name, user_id, reset);

    Ok(Json(CooldownResetResponse {
        command: name,
        user_id: user_id.to_string(),
        reset,
    }))
}

/// 指定がなければ設定されたサーバーを使う
fn resolve_guild<D: Send + Sync + 'static>(
    state: &ApiState<D>,
    guild_id: Option<u64>,
) -> Result<Option<GuildId>, ApiError> {
    match guild_id {
        Some(0) => Err(api_error(StatusCode::BAD_REQUEST, "Invalid guild_id: 0")),
        Some(id) => Ok(Some(GuildId::new(id))),
        None => Ok(state.framework.guild_id()),
    }
}

fn manager_error(e: ManagerError) -> ApiError {
    error!("Command registration error: {}", e);
    let status = match e {
        ManagerError::CommandNotFound(_) => StatusCode::NOT_FOUND,
        ManagerError::Platform(_) => StatusCode::BAD_GATEWAY,
    };
    api_error(status, e.to_string())
}

fn scope_label(guild_id: Option<GuildId>) -> String {
    match guild_id {
        Some(id) => format!("guild:{}", id),
        None => "global".to_string(),
    }
}

/// APIサーバーを起動
pub async fn start_server<D: Send + Sync + 'static>(state: ApiState<D>, port: u16) {
    let app = create_router(state);
    let addr = format!("0.0.0.0:{}", port);

    info!("API server starting on {}", addr);

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            return;
        }
    };

    if let Err(e) = axum::serve(listener, app).await {
        error!("API server error: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{Command, CommandData, Invocation};
    use crate::platform::{MockCall, MockPlatform};
    use async_trait::async_trait;
    use axum::body::Body;
    use serenity::model::permissions::Permissions;
    use tower::ServiceExt;

    const TOKEN: &str = "test-token";

    struct Noop(CommandData);

    #[async_trait]
    impl Command<()> for Noop {
        fn data(&self) -> &CommandData {
            &self.0
        }

        async fn execute(&self, _invocation: &Invocation<()>) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn router(platform: Arc<MockPlatform>) -> Router {
        let framework = Framework::<()>::builder()
            .platform(platform)
            .command(Noop(
                CommandData::slash("kick", "Kick")
                    .user_permission(Permissions::KICK_MEMBERS)
                    .category("moderation"),
            ))
            .command(Noop(CommandData::text("say").alias("echo")))
            .build()
            .unwrap();
        create_router(ApiState {
            framework: Arc::new(framework),
            token: TOKEN.to_string(),
        })
    }

    fn authorized(method: &str, uri: &str, body: Body) -> axum::http::Request<Body> {
        axum::http::Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", TOKEN))
            .header(header::CONTENT_TYPE, "application/json")
            .body(body)
            .unwrap()
    }

    async fn json_body(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_needs_no_token() {
        let app = router(Arc::new(MockPlatform::new()));
        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .uri("/api/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["commands"], 2);
        assert_eq!(body["buttons"], 0);
        assert_eq!(body["select_menus"], 0);
    }

    #[tokio::test]
    async fn test_missing_or_wrong_token_is_rejected() {
        let app = router(Arc::new(MockPlatform::new()));

        let response = app
            .clone()
            .oneshot(
                axum::http::Request::builder()
                    .uri("/api/commands")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .uri("/api/commands")
                    .header(header::AUTHORIZATION, "Bearer wrong-token")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_list_commands() {
        let app = router(Arc::new(MockPlatform::new()));
        let response = app
            .oneshot(authorized("GET", "/api/commands", Body::empty()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        let commands = body.as_array().unwrap();
        assert_eq!(commands.len(), 2);
        assert_eq!(commands[0]["name"], "kick");
        assert_eq!(commands[0]["kind"], "SLASH");
        assert_eq!(commands[0]["category"], "moderation");
        assert_eq!(commands[0]["remote"], true);
        assert_eq!(commands[1]["aliases"][0], "echo");
        assert_eq!(commands[1]["remote"], false);
    }

    #[tokio::test]
    async fn test_register_commands_in_guild() {
        let platform = Arc::new(MockPlatform::new());
        let app = router(platform.clone());

        let response = app
            .oneshot(authorized(
                "POST",
                "/api/commands/register",
                Body::from(r#"{"guild_id": 123}"#),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["scope"], "guild:123");
        assert_eq!(body["registered"][0]["name"], "kick");

        assert!(matches!(
            &platform.calls()[0],
            MockCall::SetCommands { guild_id: Some(id), .. } if id.get() == 123
        ));
    }

    #[tokio::test]
    async fn test_purge_commands_globally() {
        let platform = Arc::new(MockPlatform::new());
        let app = router(platform.clone());

        let response = app
            .oneshot(authorized("DELETE", "/api/commands", Body::empty()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["scope"], "global");
        assert!(matches!(
            &platform.calls()[0],
            MockCall::SetCommands { guild_id: None, commands } if commands.is_empty()
        ));
    }

    #[tokio::test]
    async fn test_zero_guild_id_is_bad_request() {
        let platform = Arc::new(MockPlatform::new());
        let app = router(platform.clone());

        let response = app
            .oneshot(authorized("DELETE", "/api/commands?guild_id=0", Body::empty()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(platform.calls().is_empty());
    }

    #[tokio::test]
    async fn test_cooldown_stats() {
        let app = router(Arc::new(MockPlatform::new()));
        let response = app
            .oneshot(authorized("GET", "/api/cooldowns", Body::empty()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["active"], 0);
    }

    #[tokio::test]
    async fn test_reset_cooldown_by_alias() {
        let framework = Arc::new(
            Framework::<()>::builder()
                .platform(Arc::new(MockPlatform::new()))
                .command(Noop(
                    CommandData::text("say")
                        .alias("echo")
                        .cooldown(std::time::Duration::from_secs(30)),
                ))
                .build()
                .unwrap(),
        );
        let user = UserId::new(42);
        framework
            .cooldowns()
            .check_and_record("say", user, std::time::Duration::from_secs(30))
            .await;
        let app = create_router(ApiState {
            framework: framework.clone(),
            token: TOKEN.to_string(),
        });

        let response = app
            .clone()
            .oneshot(authorized("DELETE", "/api/cooldowns/echo/42", Body::empty()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["command"], "say");
        assert_eq!(body["user_id"], "42");
        assert_eq!(body["reset"], true);
        assert!(framework.cooldowns().remaining("say", user).await.is_none());

        // 解除済みなら何もしない
        let response = app
            .oneshot(authorized("DELETE", "/api/cooldowns/say/42", Body::empty()))
            .await
            .unwrap();
        assert_eq!(json_body(response).await["reset"], false);
    }

    #[tokio::test]
    async fn test_reset_cooldown_rejects_unknown_targets() {
        let app = router(Arc::new(MockPlatform::new()));

        let response = app
            .clone()
            .oneshot(authorized("DELETE", "/api/cooldowns/missing/42", Body::empty()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app
            .oneshot(authorized("DELETE", "/api/cooldowns/say/0", Body::empty()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
