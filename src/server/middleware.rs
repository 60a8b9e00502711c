use super::{response, router};
use crate::AppState;
use hyper::body::Body;
use hyper::header::{
    HeaderMap, HeaderValue, ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_HEADERS,
    ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_EXPOSE_HEADERS,
    USER_AGENT,
};
use hyper::{Method, Request, Response, StatusCode};
use std::fmt::Display;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// リクエストIDを運ぶヘッダー名
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// 呼び出し元から受け付けるリクエストIDの最大長
const MAX_REQUEST_ID_LENGTH: usize = 128;

/// すべてのリクエストに共通の処理を適用する
///
/// # 引数
/// * `req` - HTTPリクエスト
/// * `state` - アプリケーション状態
/// * `remote_addr` - 接続元アドレス
///
/// # 戻り値
/// CORSヘッダーとリクエストIDを付与したレスポンス
///
/// # 処理内容
/// 1. リクエストIDの採番（ヘッダーがあれば引き継ぐ）
/// 2. OPTIONSはプリフライトとして即座に応答
/// 3. 処理期限を設定してルーティング（期限切れはデータベース処理の開始前のみ503）
/// 4. CORSヘッダーの付与とアクセスログ出力
pub async fn handle<B>(
    req: Request<B>,
    state: Arc<AppState>,
    remote_addr: SocketAddr,
) -> Response<String>
where
    B: Body,
    B::Error: Display,
{
    let started = Instant::now();
    let request_id = request_id_of(req.headers());
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let user_agent = req
        .headers()
        .get(USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("-")
        .to_string();

    let mut response = if method == Method::OPTIONS {
        response::empty(StatusCode::NO_CONTENT)
    } else {
        let timeout = state.config.request_timeout;
        let deadline = tokio::time::Instant::now() + timeout;
        let response = router::dispatch(req, &state, deadline).await;
        if response.status() == StatusCode::SERVICE_UNAVAILABLE {
            log::warn!(
                "リクエストがタイムアウトしました: {method} {path}, timeout={timeout:?}, request_id={request_id}"
            );
        }
        response
    };

    apply_cors_headers(response.headers_mut(), &state.config.allowed_origin);
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    let status = response.status();
    let elapsed_ms = started.elapsed().as_millis();
    if status.is_server_error() {
        log::warn!(
            "{method} {path} {} {elapsed_ms}ms remote={remote_addr} user_agent=\"{user_agent}\" request_id={request_id}",
            status.as_u16()
        );
    } else {
        log::info!(
            "{method} {path} {} {elapsed_ms}ms remote={remote_addr} user_agent=\"{user_agent}\" request_id={request_id}",
            status.as_u16()
        );
    }

    response
}

/// リクエストIDを取得する
///
/// 呼び出し元のIDが使える場合はそれを引き継ぎ、なければUUID v4を採番する。
fn request_id_of(headers: &HeaderMap) -> String {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|id| !id.is_empty() && id.len() <= MAX_REQUEST_ID_LENGTH)
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

/// CORSヘッダーを付与する
fn apply_cors_headers(headers: &mut HeaderMap, allowed_origin: &str) {
    match HeaderValue::from_str(allowed_origin) {
        Ok(origin) => {
            headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, origin);
        }
        Err(e) => {
            log::warn!("CORS許可オリジンがヘッダー値として不正です: {allowed_origin} ({e})");
            return;
        }
    }

    headers.insert(
        ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, PUT, DELETE, OPTIONS"),
    );
    headers.insert(
        ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type, X-Request-Id"),
    );
    headers.insert(
        ACCESS_CONTROL_EXPOSE_HEADERS,
        HeaderValue::from_static("X-Request-Id"),
    );
    headers.insert(
        ACCESS_CONTROL_ALLOW_CREDENTIALS,
        HeaderValue::from_static("true"),
    );
}
