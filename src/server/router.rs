use super::response;
use crate::features::subscriptions::handlers;
use crate::shared::errors::{AppError, AppResult};
use crate::AppState;
use http_body_util::BodyExt;
use hyper::body::Body;
use hyper::header::{HeaderValue, ALLOW};
use hyper::{Method, Request, Response, StatusCode};
use std::fmt::Display;
use std::sync::Arc;
use tokio::time::Instant;

/// APIのルート
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route {
    /// /subscriptions
    Subscriptions,
    /// /subscriptions/{id}
    Subscription(i64),
    /// /total_costs
    TotalCosts,
    /// /health
    Health,
}

impl Route {
    /// ルートが受け付けるメソッド（Allowヘッダー用）
    fn allowed_methods(self) -> &'static str {
        match self {
            Route::Subscriptions => "GET, POST, OPTIONS",
            Route::Subscription(_) => "GET, PUT, DELETE, OPTIONS",
            Route::TotalCosts => "POST, OPTIONS",
            Route::Health => "GET, OPTIONS",
        }
    }
}

/// パスをルートに解決する
///
/// # 戻り値
/// 一致したルート。未知のパスは `None`、IDが数値でない場合はバリデーションエラー
fn match_route(path: &str) -> AppResult<Option<Route>> {
    let segments: Vec<&str> = path.trim_matches('/').split('/').collect();

    match segments.as_slice() {
        ["subscriptions"] => Ok(Some(Route::Subscriptions)),
        ["subscriptions", id] => id
            .parse::<i64>()
            .map(|id| Some(Route::Subscription(id)))
            .map_err(|_| AppError::validation(format!("サブスクリプションIDの形式が不正です: {id}"))),
        ["total_costs"] => Ok(Some(Route::TotalCosts)),
        ["health"] => Ok(Some(Route::Health)),
        _ => Ok(None),
    }
}

/// リクエストを対応するハンドラーに振り分ける
///
/// # 引数
/// * `req` - HTTPリクエスト
/// * `state` - アプリケーション状態
/// * `deadline` - ボディの受信とデータベース接続の取得を待てる期限
///
/// # 戻り値
/// HTTPレスポンス（エラーもレスポンスに変換済み）
///
/// 期限切れで503を返すのはデータベース処理を始める前に限る。
pub async fn dispatch<B>(
    req: Request<B>,
    state: &Arc<AppState>,
    deadline: Instant,
) -> Response<String>
where
    B: Body,
    B::Error: Display,
{
    let route = match match_route(req.uri().path()) {
        Ok(Some(route)) => route,
        Ok(None) => {
            log::debug!("未対応のパス: {} {}", req.method(), req.uri().path());
            return response::message(StatusCode::NOT_FOUND, "指定されたパスは存在しません");
        }
        Err(e) => return response::from_error(&e),
    };

    let method = req.method().clone();
    let query = req.uri().query().map(str::to_string);

    let body = match tokio::time::timeout_at(deadline, req.into_body().collect()).await {
        Ok(Ok(collected)) => collected.to_bytes(),
        Err(_) => {
            let error = AppError::timeout("リクエストボディの受信が期限を超えました");
            return response::from_error(&error);
        }
        Ok(Err(e)) => {
            log::warn!("リクエストボディの読み込みに失敗しました: {e}");
            return response::message(
                StatusCode::BAD_REQUEST,
                "リクエストボディの読み込みに失敗しました",
            );
        }
    };

    let result = match (route, &method) {
        (Route::Subscriptions, &Method::POST) => {
            handlers::create_subscription(state, deadline, &body).await
        }
        (Route::Subscriptions, &Method::GET) => {
            handlers::list_subscriptions(state, deadline, query.as_deref()).await
        }
        (Route::Subscription(id), &Method::GET) => {
            handlers::get_subscription(state, deadline, id).await
        }
        (Route::Subscription(id), &Method::PUT) => {
            handlers::update_subscription(state, deadline, id, &body).await
        }
        (Route::Subscription(id), &Method::DELETE) => {
            handlers::delete_subscription(state, deadline, id).await
        }
        (Route::TotalCosts, &Method::POST) => handlers::total_costs(state, deadline, &body).await,
        (Route::Health, &Method::GET) => handlers::health(state, deadline).await,
        (route, method) => return method_not_allowed(route, method),
    };

    result.unwrap_or_else(|e| response::from_error(&e))
}

fn method_not_allowed(route: Route, method: &Method) -> Response<String> {
    log::debug!("許可されていないメソッド: {method} {route:?}");

    let mut response = response::message(
        StatusCode::METHOD_NOT_ALLOWED,
        "このメソッドは許可されていません",
    );
    response
        .headers_mut()
        .insert(ALLOW, HeaderValue::from_static(route.allowed_methods()));
    response
}
