use crate::features::subscriptions::aggregator::CostError;
use hyper::StatusCode;
use thiserror::Error;

/// アプリケーション全体で使用される統一エラー型
#[derive(Debug, Error)]
pub enum AppError {
    /// データベース関連のエラー
    #[error("データベースエラー: {0}")]
    Database(String),

    /// バリデーション関連のエラー
    #[error("バリデーションエラー: {0}")]
    Validation(String),

    /// リソースが見つからない場合のエラー
    #[error("リソースが見つかりません: {0}")]
    NotFound(String),

    /// 合計金額計算のエラー
    #[error("合計金額計算エラー: {0}")]
    Cost(#[from] CostError),

    /// 設定関連のエラー
    #[error("設定エラー: {0}")]
    Configuration(String),

    /// I/O関連のエラー
    #[error("I/Oエラー: {0}")]
    Io(#[from] std::io::Error),

    /// JSON解析エラー
    #[error("JSON解析エラー: {0}")]
    Json(#[from] serde_json::Error),

    /// 並行処理関連のエラー
    #[error("並行処理エラー: {0}")]
    Concurrency(String),

    /// 処理期限切れのエラー
    #[error("タイムアウト: {0}")]
    Timeout(String),
}

/// エラーの重要度を表す列挙型
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ErrorSeverity {
    /// 低重要度（ユーザー入力エラーなど）
    Low,
    /// 中重要度（不正なリクエスト形式など）
    Medium,
    /// 高重要度（データベースエラーなど）
    High,
    /// 最重要（保存データの不整合など）
    Critical,
}

impl AppError {
    /// ユーザーに表示するためのメッセージを取得
    ///
    /// 内部エラーの詳細はレスポンスに含めず、ログにのみ出力する。
    pub fn user_message(&self) -> String {
        match self {
            AppError::Database(_) => "データベース操作でエラーが発生しました".to_string(),
            AppError::Validation(msg) => msg.clone(),
            AppError::NotFound(msg) => msg.clone(),
            AppError::Cost(CostError::InvalidFilter(msg)) => msg.clone(),
            AppError::Cost(CostError::UpstreamFetchFailure(inner)) => inner.user_message(),
            AppError::Cost(CostError::InconsistentInterval { .. }) => {
                "保存されているサブスクリプションの期間が不正です".to_string()
            }
            AppError::Cost(CostError::Overflow) => "合計金額が上限を超えました".to_string(),
            AppError::Configuration(_) => "設定エラーが発生しました".to_string(),
            AppError::Io(_) => "ファイル操作でエラーが発生しました".to_string(),
            AppError::Json(e) => format!("JSONの形式が不正です: {e}"),
            AppError::Concurrency(_) => "並行処理でエラーが発生しました".to_string(),
            AppError::Timeout(_) => "リクエストがタイムアウトしました".to_string(),
        }
    }

    /// エラーの詳細情報を取得（ログ出力用）
    pub fn details(&self) -> String {
        format!("{self}")
    }

    /// エラーの重要度を取得
    ///
    /// # 戻り値
    /// エラーの重要度レベル
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            AppError::Database(_) => ErrorSeverity::High,
            AppError::Validation(_) => ErrorSeverity::Low,
            AppError::NotFound(_) => ErrorSeverity::Low,
            AppError::Cost(CostError::InvalidFilter(_)) => ErrorSeverity::Low,
            AppError::Cost(CostError::UpstreamFetchFailure(inner)) => inner.severity(),
            AppError::Cost(CostError::InconsistentInterval { .. }) => ErrorSeverity::Critical,
            AppError::Cost(CostError::Overflow) => ErrorSeverity::Medium,
            AppError::Configuration(_) => ErrorSeverity::High,
            AppError::Io(_) => ErrorSeverity::Medium,
            AppError::Json(_) => ErrorSeverity::Low,
            AppError::Concurrency(_) => ErrorSeverity::High,
            AppError::Timeout(_) => ErrorSeverity::Medium,
        }
    }

    /// HTTPレスポンスのステータスコードを取得
    ///
    /// # 戻り値
    /// エラー種別に対応するステータスコード
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::Json(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Cost(CostError::InvalidFilter(_)) => StatusCode::BAD_REQUEST,
            AppError::Cost(CostError::Overflow) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Cost(CostError::UpstreamFetchFailure(inner)) => inner.status_code(),
            AppError::Cost(CostError::InconsistentInterval { .. })
            | AppError::Database(_)
            | AppError::Configuration(_)
            | AppError::Io(_)
            | AppError::Concurrency(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Timeout(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// バリデーションエラーを作成するヘルパー関数
    pub fn validation<S: Into<String>>(message: S) -> Self {
        AppError::Validation(message.into())
    }

    /// リソース未発見エラーを作成するヘルパー関数
    ///
    /// # 引数
    /// * `resource` - 見つからなかったリソース名
    ///
    /// # 戻り値
    /// リソース未発見エラー
    pub fn not_found<S: Into<String>>(resource: S) -> Self {
        AppError::NotFound(format!("{}が見つかりません", resource.into()))
    }

    /// 設定エラーを作成するヘルパー関数
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        AppError::Configuration(message.into())
    }

    /// 並行処理エラーを作成するヘルパー関数
    pub fn concurrency<S: Into<String>>(message: S) -> Self {
        AppError::Concurrency(message.into())
    }

    /// タイムアウトエラーを作成するヘルパー関数
    pub fn timeout<S: Into<String>>(message: S) -> Self {
        AppError::Timeout(message.into())
    }
}

/// rusqlite::ErrorからAppErrorへの変換
impl From<rusqlite::Error> for AppError {
    fn from(error: rusqlite::Error) -> Self {
        AppError::Database(error.to_string())
    }
}

/// Result型のエイリアス（アプリケーション全体で使用）
pub type AppResult<T> = Result<T, AppError>;
