use log::LevelFilter;

/// 実行環境
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    /// 環境名から実行環境を判定する
    ///
    /// "production" / "prod" 以外はすべて開発環境として扱う
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "production" | "prod" => Environment::Production,
            _ => Environment::Development,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Production => "production",
        }
    }

    /// DATABASE_PATH 未設定時に使うデータベースファイル名
    pub fn database_filename(self) -> &'static str {
        match self {
            Environment::Development => "dev_subscriptions.db",
            Environment::Production => "subscriptions.db",
        }
    }

    /// 読み込む環境変数ファイル名
    pub fn env_file(self) -> &'static str {
        match self {
            Environment::Development => ".env",
            Environment::Production => ".env.production",
        }
    }

    /// LOG_LEVEL 未設定時のログレベル
    pub fn default_log_level(self) -> LevelFilter {
        match self {
            Environment::Development => LevelFilter::Debug,
            Environment::Production => LevelFilter::Info,
        }
    }
}

/// ログ出力に関わる環境設定
#[derive(Debug, Clone)]
pub struct EnvironmentConfig {
    pub environment: Environment,
    pub log_level: LevelFilter,
}

impl EnvironmentConfig {
    /// 環境変数から設定を読み込む
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 任意の取得関数から設定を組み立てる
    ///
    /// # 引数
    /// * `lookup` - 変数名から値を取得する関数
    ///
    /// # 戻り値
    /// 環境設定。LOG_LEVEL が解釈できない場合は環境ごとの既定値を使う
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = lookup("ENVIRONMENT")
            .map(|name| Environment::from_name(&name))
            .unwrap_or_else(build_default_environment);

        let log_level = lookup("LOG_LEVEL")
            .and_then(|value| value.trim().parse::<LevelFilter>().ok())
            .unwrap_or_else(|| environment.default_log_level());

        Self {
            environment,
            log_level,
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }
}

/// 現在の実行環境を判定する
///
/// # 判定ロジック
/// 1. 環境変数 ENVIRONMENT があればその値
/// 2. なければビルド設定（デバッグビルドは Development、リリースビルドは Production）
pub fn get_environment() -> Environment {
    match std::env::var("ENVIRONMENT") {
        Ok(name) => {
            let env = Environment::from_name(&name);
            log::debug!("環境判定: ENVIRONMENT={name} -> {}", env.as_str());
            env
        }
        Err(_) => build_default_environment(),
    }
}

fn build_default_environment() -> Environment {
    if cfg!(debug_assertions) {
        Environment::Development
    } else {
        Environment::Production
    }
}

/// 実行環境に応じた.envファイルを読み込む
///
/// 環境固有のファイルがなければ .env にフォールバックする。
/// ログシステム初期化前に呼ばれるため、結果はメッセージとして返す。
pub fn load_environment_variables() -> Result<String, String> {
    let env_file = get_environment().env_file();

    if dotenv::from_filename(env_file).is_ok() {
        return Ok(format!("{env_file}を読み込みました"));
    }
    if env_file != ".env" && dotenv::dotenv().is_ok() {
        return Ok(format!("{env_file}が見つからないため.envを読み込みました"));
    }

    Err(format!(
        "{env_file}が見つかりません。プロセスの環境変数のみを使用します"
    ))
}

/// ログシステムを初期化する
///
/// レベルは LOG_LEVEL（未設定なら環境ごとの既定値）。RUST_LOG によるモジュール単位の
/// 指定も env_logger の既定動作として併用できる。
pub fn initialize_logging_system() {
    let env_config = EnvironmentConfig::from_env();

    env_logger::Builder::new()
        .filter_level(env_config.log_level)
        .parse_default_env()
        .format_timestamp_secs()
        .format_module_path(false)
        .format_target(false)
        .init();

    log::info!(
        "ログシステムを初期化しました: level={}, environment={}",
        env_config.log_level,
        env_config.environment.as_str()
    );
}
