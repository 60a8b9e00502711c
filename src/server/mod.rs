/// 共通処理（リクエストID・アクセスログ・CORS・タイムアウト）
pub mod middleware;

/// JSONレスポンスの作成
pub mod response;

/// パスとメソッドによる振り分け
pub mod router;

use crate::shared::errors::AppResult;
use crate::AppState;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::Request;
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// REST APIサーバー
pub struct ApiServer {
    listener: TcpListener,
    state: Arc<AppState>,
}

impl ApiServer {
    /// 設定されたアドレスでリスナーを作成する
    ///
    /// # 引数
    /// * `state` - アプリケーション状態
    ///
    /// # 戻り値
    /// 待ち受け準備の整ったサーバー
    pub async fn bind(state: Arc<AppState>) -> AppResult<Self> {
        let addr = state.config.socket_addr()?;
        let listener = TcpListener::bind(addr).await?;

        log::info!("APIサーバーの待ち受けを開始しました: http://{}", listener.local_addr()?);

        Ok(Self { listener, state })
    }

    /// 実際に待ち受けているアドレスを取得する
    ///
    /// ポート0で起動した場合に割り当てられたポートを確認するために使う。
    pub fn local_addr(&self) -> AppResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// 停止要求を受けるまで接続を受け付ける
    ///
    /// # 引数
    /// * `shutdown` - 停止要求のトークン
    ///
    /// 停止要求後は新規接続を受け付けず、処理中の接続の完了を待ってから戻る。
    pub async fn serve(self, shutdown: CancellationToken) -> AppResult<()> {
        let tracker = TaskTracker::new();

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    log::info!("停止要求を受信しました。新規接続の受け付けを終了します");
                    break;
                }
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, remote_addr)) => {
                        let state = Arc::clone(&self.state);
                        let shutdown = shutdown.clone();
                        tracker.spawn(handle_connection(stream, remote_addr, state, shutdown));
                    }
                    Err(e) => {
                        log::error!("接続受け入れエラー: {e}");
                    }
                },
            }
        }

        tracker.close();
        tracker.wait().await;
        log::info!("すべての接続の処理が完了しました");

        Ok(())
    }
}

/// TCP接続を処理する
async fn handle_connection(
    stream: TcpStream,
    remote_addr: SocketAddr,
    state: Arc<AppState>,
    shutdown: CancellationToken,
) {
    let io = TokioIo::new(stream);

    let service = service_fn(move |req: Request<Incoming>| {
        let state = Arc::clone(&state);
        async move { Ok::<_, Infallible>(middleware::handle(req, state, remote_addr).await) }
    });

    let connection = http1::Builder::new().serve_connection(io, service);
    tokio::pin!(connection);

    tokio::select! {
        result = connection.as_mut() => {
            if let Err(err) = result {
                log::debug!("HTTP接続処理エラー: remote={remote_addr}, error={err}");
            }
        }
        _ = shutdown.cancelled() => {
            connection.as_mut().graceful_shutdown();
            if let Err(err) = connection.as_mut().await {
                log::debug!("HTTP接続の終了処理でエラー: remote={remote_addr}, error={err}");
            }
        }
    }
}
