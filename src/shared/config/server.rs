use super::environment::get_environment;
use crate::shared::errors::{AppError, AppResult};
use chrono_tz::Tz;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// HTTPサーバーの設定
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// 待ち受けホスト
    pub host: String,
    /// 待ち受けポート（0 の場合は空きポートを自動選択）
    pub port: u16,
    /// SQLiteデータベースファイルのパス
    pub database_path: PathBuf,
    /// CORSで許可するオリジン
    pub allowed_origin: String,
    /// 1リクエストあたりの処理タイムアウト
    pub request_timeout: Duration,
    /// 「今月」を判定するタイムゾーン
    pub timezone: Tz,
}

impl ServerConfig {
    /// 環境変数から設定を読み込む
    ///
    /// # 戻り値
    /// サーバー設定、または値が不正な場合は設定エラー
    ///
    /// # 対応する環境変数
    /// - `SERVER_HOST` (既定値: 0.0.0.0)
    /// - `SERVER_PORT` (既定値: 8080)
    /// - `DATABASE_PATH` (既定値: 環境に応じたファイル名)
    /// - `CORS_ALLOWED_ORIGIN` (既定値: http://localhost:8000)
    /// - `REQUEST_TIMEOUT_SECS` (既定値: 10)
    /// - `APP_TIMEZONE` (既定値: UTC)
    pub fn from_env() -> AppResult<Self> {
        let default_db = get_environment().database_filename();
        Self::from_lookup(|key| std::env::var(key).ok(), default_db)
    }

    /// 任意の取得関数から設定を組み立てる
    ///
    /// # 引数
    /// * `lookup` - 変数名から値を取得する関数
    /// * `default_database` - DATABASE_PATH 未設定時のファイル名
    pub fn from_lookup<F>(lookup: F, default_database: &str) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string());

        let port = match lookup("SERVER_PORT") {
            Some(value) => value.parse::<u16>().map_err(|e| {
                AppError::configuration(format!("SERVER_PORT が不正です: {value} ({e})"))
            })?,
            None => 8080,
        };

        let database_path = lookup("DATABASE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(default_database));

        let allowed_origin =
            lookup("CORS_ALLOWED_ORIGIN").unwrap_or_else(|| "http://localhost:8000".to_string());

        let timeout_secs = match lookup("REQUEST_TIMEOUT_SECS") {
            Some(value) => value.parse::<u64>().map_err(|e| {
                AppError::configuration(format!("REQUEST_TIMEOUT_SECS が不正です: {value} ({e})"))
            })?,
            None => 10,
        };
        if timeout_secs == 0 {
            return Err(AppError::configuration(
                "REQUEST_TIMEOUT_SECS は1以上である必要があります",
            ));
        }

        let timezone = match lookup("APP_TIMEZONE") {
            Some(name) => name
                .parse::<Tz>()
                .map_err(|e| AppError::configuration(format!("APP_TIMEZONE が不正です: {e}")))?,
            None => Tz::UTC,
        };

        Ok(Self {
            host,
            port,
            database_path,
            allowed_origin,
            request_timeout: Duration::from_secs(timeout_secs),
            timezone,
        })
    }

    /// 待ち受けアドレスを取得する
    pub fn socket_addr(&self) -> AppResult<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| {
                AppError::configuration(format!(
                    "待ち受けアドレスが不正です: {}:{} ({e})",
                    self.host, self.port
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::from_lookup(lookup_from(&[]), "dev_subscriptions.db").unwrap();

        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8080);
        assert_eq!(config.database_path, PathBuf::from("dev_subscriptions.db"));
        assert_eq!(config.allowed_origin, "http://localhost:8000");
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert_eq!(config.timezone, Tz::UTC);
    }

    #[test]
    fn test_overrides() {
        let config = ServerConfig::from_lookup(
            lookup_from(&[
                ("SERVER_HOST", "127.0.0.1"),
                ("SERVER_PORT", "9090"),
                ("DATABASE_PATH", "/var/lib/subs.db"),
                ("CORS_ALLOWED_ORIGIN", "https://example.com"),
                ("REQUEST_TIMEOUT_SECS", "3"),
                ("APP_TIMEZONE", "Asia/Tokyo"),
            ]),
            "dev_subscriptions.db",
        )
        .unwrap();

        assert_eq!(config.socket_addr().unwrap().to_string(), "127.0.0.1:9090");
        assert_eq!(config.database_path, PathBuf::from("/var/lib/subs.db"));
        assert_eq!(config.allowed_origin, "https://example.com");
        assert_eq!(config.request_timeout, Duration::from_secs(3));
        assert_eq!(config.timezone, chrono_tz::Asia::Tokyo);
    }

    #[test]
    fn test_invalid_values() {
        let result = ServerConfig::from_lookup(lookup_from(&[("SERVER_PORT", "http")]), "x.db");
        assert!(matches!(result, Err(AppError::Configuration(_))));

        let result =
            ServerConfig::from_lookup(lookup_from(&[("REQUEST_TIMEOUT_SECS", "0")]), "x.db");
        assert!(matches!(result, Err(AppError::Configuration(_))));

        let result =
            ServerConfig::from_lookup(lookup_from(&[("APP_TIMEZONE", "Mars/Olympus")]), "x.db");
        assert!(matches!(result, Err(AppError::Configuration(_))));
    }

    #[test]
    fn test_invalid_host() {
        let config =
            ServerConfig::from_lookup(lookup_from(&[("SERVER_HOST", "not a host")]), "x.db")
                .unwrap();
        assert!(config.socket_addr().is_err());
    }
}
