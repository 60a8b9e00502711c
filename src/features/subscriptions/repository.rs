use super::aggregator::SubscriptionSource;
use super::models::{NewSubscription, Subscription, SubscriptionPatch};
use crate::shared::errors::{AppError, AppResult};
use chrono::Utc;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

const SELECT_SUBSCRIPTION: &str = "SELECT s.sub_id, s.user_id, sv.service_name, s.price, s.start_date, s.end_date
     FROM subscriptions s
     JOIN services sv ON s.service_id = sv.service_id";

/// サブスクリプションを作成する
///
/// # 引数
/// * `conn` - データベース接続
/// * `sub` - 検証済みの新規サブスクリプション
///
/// # 戻り値
/// 採番されたサブスクリプションID、または失敗時はエラー
///
/// # 処理内容
/// サービス名の登録とサブスクリプションの挿入を1つのトランザクションで行う
pub fn create(conn: &Connection, sub: &NewSubscription) -> AppResult<i64> {
    let now = Utc::now().to_rfc3339();
    let tx = conn.unchecked_transaction()?;

    let service_id = upsert_service(&tx, &sub.service_name)?;

    tx.execute(
        "INSERT INTO subscriptions (user_id, service_id, price, start_date, end_date, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            sub.user_id.to_string(),
            service_id,
            sub.price,
            sub.start_date,
            sub.end_date,
            now,
            now
        ],
    )?;
    let id = tx.last_insert_rowid();

    tx.commit()?;
    Ok(id)
}

/// IDでサブスクリプションを取得する
///
/// # 引数
/// * `conn` - データベース接続
/// * `id` - サブスクリプションID
///
/// # 戻り値
/// サブスクリプション、または見つからない場合は NotFound
pub fn find_by_id(conn: &Connection, id: i64) -> AppResult<Subscription> {
    conn.query_row(
        &format!("{SELECT_SUBSCRIPTION} WHERE s.sub_id = ?1"),
        params![id],
        map_subscription,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => {
            AppError::not_found(format!("ID {id} のサブスクリプション"))
        }
        _ => AppError::Database(e.to_string()),
    })
}

/// ユーザーのサブスクリプション一覧をID順に取得する
///
/// # 引数
/// * `conn` - データベース接続
/// * `user_id` - ユーザーID
///
/// # 戻り値
/// サブスクリプションのリスト（該当なしの場合は空）
pub fn find_by_user(conn: &Connection, user_id: Uuid) -> AppResult<Vec<Subscription>> {
    let mut stmt = conn.prepare(&format!(
        "{SELECT_SUBSCRIPTION} WHERE s.user_id = ?1 ORDER BY s.sub_id"
    ))?;
    let subscriptions = stmt.query_map(params![user_id.to_string()], map_subscription)?;

    subscriptions
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| AppError::Database(e.to_string()))
}

/// サブスクリプションを部分更新する
///
/// # 引数
/// * `conn` - データベース接続
/// * `id` - サブスクリプションID
/// * `patch` - 更新内容
///
/// # 戻り値
/// 更新後のサブスクリプション、または失敗時はエラー
///
/// # 処理内容
/// 既存レコードの取得、更新内容の適用と再検証、書き込みを
/// 1つのトランザクションで行う
pub fn update(conn: &Connection, id: i64, patch: &SubscriptionPatch) -> AppResult<Subscription> {
    if patch.is_empty() {
        return Err(AppError::validation("更新する項目がありません"));
    }

    let now = Utc::now().to_rfc3339();
    let tx = conn.unchecked_transaction()?;

    let existing = find_by_id(&tx, id)?;
    let merged = patch.apply_to(&existing)?;

    let service_id = upsert_service(&tx, &merged.service_name)?;

    tx.execute(
        "UPDATE subscriptions
         SET service_id = ?1, price = ?2, start_date = ?3, end_date = ?4, updated_at = ?5
         WHERE sub_id = ?6",
        params![
            service_id,
            merged.price,
            merged.start_date,
            merged.end_date,
            now,
            id
        ],
    )?;

    tx.commit()?;
    Ok(merged)
}

/// サブスクリプションを削除する
///
/// # 戻り値
/// 成功時はOk(())、対象が存在しない場合は NotFound
pub fn delete(conn: &Connection, id: i64) -> AppResult<()> {
    let rows_affected = conn.execute("DELETE FROM subscriptions WHERE sub_id = ?1", params![id])?;

    if rows_affected == 0 {
        return Err(AppError::not_found(format!("ID {id} のサブスクリプション")));
    }

    Ok(())
}

/// サービス名を登録し、そのIDを返す（登録済みの場合は既存のID）
fn upsert_service(conn: &Connection, service_name: &str) -> AppResult<i64> {
    conn.execute(
        "INSERT OR IGNORE INTO services (service_name) VALUES (?1)",
        params![service_name],
    )?;

    let service_id = conn
        .query_row(
            "SELECT service_id FROM services WHERE service_name = ?1",
            params![service_name],
            |row| row.get(0),
        )
        .optional()?;

    service_id.ok_or_else(|| {
        AppError::Database(format!("サービス {service_name} の登録に失敗しました"))
    })
}

fn map_subscription(row: &Row<'_>) -> rusqlite::Result<Subscription> {
    let user_id: String = row.get(1)?;
    let user_id = Uuid::parse_str(&user_id)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(1, Type::Text, Box::new(e)))?;

    Ok(Subscription {
        id: row.get(0)?,
        user_id,
        service_name: row.get(2)?,
        price: row.get(3)?,
        start_date: row.get(4)?,
        end_date: row.get(5)?,
    })
}

/// SQLiteを取得元とする集計用アダプタ
pub struct SqliteSubscriptionSource<'c> {
    conn: &'c Connection,
}

impl<'c> SqliteSubscriptionSource<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }
}

impl SubscriptionSource for SqliteSubscriptionSource<'_> {
    /// サブスクリプションを1件も持たないユーザーは未知のユーザーとして扱う
    fn fetch_subscriptions_for_user(&self, user_id: Uuid) -> AppResult<Vec<Subscription>> {
        let subscriptions = find_by_user(self.conn, user_id)?;

        if subscriptions.is_empty() {
            return Err(AppError::not_found(format!(
                "ユーザー {user_id} のサブスクリプション"
            )));
        }

        Ok(subscriptions)
    }
}
