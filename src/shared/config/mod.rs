/// 実行環境とログ設定
pub mod environment;

/// HTTPサーバー設定
pub mod server;

// 便利な再エクスポート
pub use environment::{
    get_environment, initialize_logging_system, load_environment_variables, Environment,
    EnvironmentConfig,
};
pub use server::ServerConfig;
