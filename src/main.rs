use log::{error, info, warn};
use subscription_tracker_lib::shared::{
    initialize_logging_system, load_environment_variables, ServerConfig,
};

#[tokio::main]
async fn main() {
    // ログ初期化より先に読み込み、LOG_LEVEL を反映させる
    let env_result = load_environment_variables();
    initialize_logging_system();

    match env_result {
        Ok(message) => info!("{message}"),
        Err(message) => warn!("{message}"),
    }

    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("サーバー設定の読み込みに失敗しました: {e}");
            std::process::exit(1);
        }
    };

    info!(
        "アプリケーションを起動します: addr={}:{}, database={:?}, timezone={}",
        config.host, config.port, config.database_path, config.timezone
    );

    if let Err(e) = subscription_tracker_lib::run(config).await {
        error!("サーバーが異常終了しました: {}", e.details());
        std::process::exit(1);
    }
}
