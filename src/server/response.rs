use crate::shared::errors::{AppError, ErrorSeverity};
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{Response, StatusCode};
use serde::Serialize;

/// JSONレスポンスを作成する
///
/// シリアライズに失敗した場合は500を返す。
pub fn json<T: Serialize>(status: StatusCode, body: &T) -> Response<String> {
    match serde_json::to_string(body) {
        Ok(body) => with_json_body(status, body),
        Err(e) => {
            log::error!("レスポンスのシリアライズに失敗しました: {e}");
            message(
                StatusCode::INTERNAL_SERVER_ERROR,
                "レスポンスの作成に失敗しました",
            )
        }
    }
}

/// `{"message": ...}` 形式のレスポンスを作成する
pub fn message(status: StatusCode, text: &str) -> Response<String> {
    with_json_body(status, serde_json::json!({ "message": text }).to_string())
}

/// 本文なしのレスポンスを作成する
pub fn empty(status: StatusCode) -> Response<String> {
    let mut response = Response::new(String::new());
    *response.status_mut() = status;
    response
}

/// アプリケーションエラーをレスポンスに変換する
///
/// # 引数
/// * `error` - 発生したエラー
///
/// # 戻り値
/// ステータスコードとユーザー向けメッセージを含むレスポンス
pub fn from_error(error: &AppError) -> Response<String> {
    match error.severity() {
        ErrorSeverity::High | ErrorSeverity::Critical => {
            log::error!("リクエスト処理でエラーが発生しました: {}", error.details())
        }
        ErrorSeverity::Medium => {
            log::warn!("リクエスト処理でエラーが発生しました: {}", error.details())
        }
        ErrorSeverity::Low => {
            log::debug!("リクエストを拒否しました: {}", error.details())
        }
    }

    message(error.status_code(), &error.user_message())
}

fn with_json_body(status: StatusCode, body: String) -> Response<String> {
    let mut response = Response::new(body);
    *response.status_mut() = status;
    response.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("application/json; charset=utf-8"),
    );
    response
}
