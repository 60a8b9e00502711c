pub mod features;
pub mod server;
pub mod shared;

use log::{error, info};
use rusqlite::Connection;
use server::ApiServer;
use shared::{initialize_database, AppResult, ServerConfig};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// アプリケーション状態（データベース接続とサーバー設定を保持）
///
/// 接続の取得待ちを期限付きで打ち切れるよう、非同期のMutexで保護する。
pub struct AppState {
    pub db: Arc<Mutex<Connection>>,
    pub config: ServerConfig,
}

impl AppState {
    pub fn new(conn: Connection, config: ServerConfig) -> Self {
        Self {
            db: Arc::new(Mutex::new(conn)),
            config,
        }
    }
}

/// サーバーを起動し、Ctrl-Cを受けるまで処理を続ける
///
/// # 引数
/// * `config` - サーバー設定
///
/// # 戻り値
/// 正常終了時は `Ok(())`、初期化に失敗した場合はエラー
pub async fn run(config: ServerConfig) -> AppResult<()> {
    info!("データベースを初期化しています...");
    let conn = initialize_database(&config.database_path).map_err(|e| {
        error!("データベースの初期化に失敗しました: {e}");
        e
    })?;
    info!("データベースの初期化が完了しました");

    let state = Arc::new(AppState::new(conn, config));
    let server = ApiServer::bind(state).await?;

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("終了シグナルを受信しました");
                signal_token.cancel();
            }
            Err(e) => error!("終了シグナルの待機に失敗しました: {e}"),
        }
    });

    server.serve(shutdown).await?;
    info!("サーバーを停止しました");

    Ok(())
}
