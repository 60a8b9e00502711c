use super::models::{
    parse_user_id, CostsRequest, CostsResponse, CreatedResponse, SubscriptionPayload,
    SubscriptionResponse,
};
use super::service;
use crate::server::response;
use crate::shared::errors::{AppError, AppResult};
use crate::shared::utils::current_month_start;
use crate::AppState;
use hyper::{Response, StatusCode};
use rusqlite::Connection;
use serde::Serialize;
use std::sync::Arc;
use tokio::time::Instant;

/// ヘルスチェックのレスポンス
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// データベース接続を取得して同期処理を実行する
///
/// # 引数
/// * `state` - アプリケーション状態
/// * `deadline` - 接続の取得を待てる期限
/// * `operation` - 接続を使う同期処理
///
/// 期限までに接続を取得できなければ処理を始めずに `AppError::Timeout` を返す。
/// 接続を取得した後は期限を過ぎても処理を最後まで行い、その結果を返す。
/// SQLiteへのアクセスはブロッキングのため、専用スレッドで実行する。
async fn with_connection<T, F>(
    state: &Arc<AppState>,
    deadline: Instant,
    operation: F,
) -> AppResult<T>
where
    T: Send + 'static,
    F: FnOnce(&Connection) -> AppResult<T> + Send + 'static,
{
    let conn = tokio::time::timeout_at(deadline, Arc::clone(&state.db).lock_owned())
        .await
        .map_err(|_| AppError::timeout("データベース接続の待機が期限を超えました"))?;

    tokio::task::spawn_blocking(move || operation(&conn))
        .await
        .map_err(|e| AppError::concurrency(format!("データベース処理が中断されました: {e}")))?
}

/// POST /subscriptions
pub async fn create_subscription(
    state: &Arc<AppState>,
    deadline: Instant,
    body: &[u8],
) -> AppResult<Response<String>> {
    let payload: SubscriptionPayload = serde_json::from_slice(body)?;
    let input = payload.into_create_input()?;

    let (sub_id, user_id) =
        with_connection(state, deadline, move |conn| service::create_subscription(conn, input))
            .await?;

    Ok(response::json(
        StatusCode::CREATED,
        &CreatedResponse {
            sub_id,
            user_id: user_id.to_string(),
            message: "サブスクリプションを作成しました".to_string(),
        },
    ))
}

/// GET /subscriptions?user_id=...
pub async fn list_subscriptions(
    state: &Arc<AppState>,
    deadline: Instant,
    query: Option<&str>,
) -> AppResult<Response<String>> {
    let user_id = query
        .and_then(|q| {
            url::form_urlencoded::parse(q.as_bytes())
                .find(|(key, _)| key == "user_id")
                .map(|(_, value)| value.into_owned())
        })
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| AppError::validation("user_id を指定してください"))?;
    let user_id = parse_user_id(&user_id)?;

    let subs =
        with_connection(state, deadline, move |conn| service::list_user_subscriptions(conn, user_id))
            .await?;

    let body: Vec<SubscriptionResponse> = subs.iter().map(SubscriptionResponse::from).collect();
    Ok(response::json(StatusCode::OK, &body))
}

/// GET /subscriptions/{id}
pub async fn get_subscription(
    state: &Arc<AppState>,
    deadline: Instant,
    id: i64,
) -> AppResult<Response<String>> {
    let sub =
        with_connection(state, deadline, move |conn| service::get_subscription(conn, id)).await?;
    Ok(response::json(StatusCode::OK, &SubscriptionResponse::from(&sub)))
}

/// PUT /subscriptions/{id}
pub async fn update_subscription(
    state: &Arc<AppState>,
    deadline: Instant,
    id: i64,
    body: &[u8],
) -> AppResult<Response<String>> {
    let payload: SubscriptionPayload = serde_json::from_slice(body)?;
    let patch = payload.into_patch()?;

    let updated = with_connection(state, deadline, move |conn| {
        service::update_subscription(conn, id, &patch)
    })
    .await?;

    Ok(response::json(
        StatusCode::OK,
        &SubscriptionResponse::from(&updated),
    ))
}

/// DELETE /subscriptions/{id}
pub async fn delete_subscription(
    state: &Arc<AppState>,
    deadline: Instant,
    id: i64,
) -> AppResult<Response<String>> {
    with_connection(state, deadline, move |conn| service::delete_subscription(conn, id)).await?;
    Ok(response::empty(StatusCode::NO_CONTENT))
}

/// POST /total_costs
///
/// 終了月が未指定の場合は設定されたタイムゾーンでの今月までを集計する。
pub async fn total_costs(
    state: &Arc<AppState>,
    deadline: Instant,
    body: &[u8],
) -> AppResult<Response<String>> {
    let request: CostsRequest = serde_json::from_slice(body)?;
    let filter = request.into_filter()?;
    let today = current_month_start(state.config.timezone);

    let summary = with_connection(state, deadline, move |conn| {
        service::calculate_total_costs(conn, &filter, today)
    })
    .await?;

    Ok(response::json(StatusCode::OK, &CostsResponse::from(summary)))
}

/// GET /health
pub async fn health(state: &Arc<AppState>, deadline: Instant) -> AppResult<Response<String>> {
    with_connection(state, deadline, |conn| {
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
        Ok(())
    })
    .await?;

    Ok(response::json(
        StatusCode::OK,
        &HealthResponse {
            status: "ok",
            version: env!("CARGO_PKG_VERSION"),
        },
    ))
}
