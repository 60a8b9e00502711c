use super::aggregator::{self, CostError};
use super::models::{
    CostFilter, CostSummary, CreateSubscriptionInput, NewSubscription, Subscription,
    SubscriptionPatch,
};
use super::repository::{self, SqliteSubscriptionSource};
use crate::shared::errors::AppResult;
use chrono::NaiveDate;
use rusqlite::Connection;
use uuid::Uuid;

/// サブスクリプションを作成する
///
/// # 引数
/// * `conn` - データベース接続
/// * `input` - 作成内容
///
/// # 戻り値
/// (採番されたサブスクリプションID, 所有ユーザーID)
///
/// ユーザーIDが未指定の場合は新しいUUIDを割り当てる。
pub fn create_subscription(
    conn: &Connection,
    input: CreateSubscriptionInput,
) -> AppResult<(i64, Uuid)> {
    let user_id = input.user_id.unwrap_or_else(|| {
        let generated = Uuid::new_v4();
        log::info!("ユーザーIDが指定されていないため採番しました: user_id={generated}");
        generated
    });

    let new_sub = NewSubscription::new(
        user_id,
        &input.service_name,
        input.price,
        input.start_date,
        input.end_date,
    )
    .map_err(|e| {
        log::warn!("サブスクリプションの入力が不正です: {e}");
        e
    })?;

    let id = repository::create(conn, &new_sub).map_err(|e| {
        log::error!("サブスクリプションの作成に失敗しました: user_id={user_id}, error={e}");
        e
    })?;

    log::info!(
        "サブスクリプションを作成しました: sub_id={id}, user_id={user_id}, service={}",
        new_sub.service_name
    );
    Ok((id, user_id))
}

/// IDでサブスクリプションを取得する
pub fn get_subscription(conn: &Connection, id: i64) -> AppResult<Subscription> {
    log::debug!("サブスクリプションを取得します: sub_id={id}");

    let sub = repository::find_by_id(conn, id).map_err(|e| {
        log::error!("サブスクリプションの取得に失敗しました: sub_id={id}, error={e}");
        e
    })?;

    log::info!("サブスクリプションを取得しました: sub_id={id}");
    Ok(sub)
}

/// ユーザーのサブスクリプション一覧を取得する
pub fn list_user_subscriptions(conn: &Connection, user_id: Uuid) -> AppResult<Vec<Subscription>> {
    log::debug!("ユーザーのサブスクリプション一覧を取得します: user_id={user_id}");

    let subs = repository::find_by_user(conn, user_id).map_err(|e| {
        log::error!("サブスクリプション一覧の取得に失敗しました: user_id={user_id}, error={e}");
        e
    })?;

    log::info!(
        "サブスクリプション一覧を取得しました: user_id={user_id}, count={}",
        subs.len()
    );
    Ok(subs)
}

/// サブスクリプションを部分更新する
///
/// # 引数
/// * `conn` - データベース接続
/// * `id` - サブスクリプションID
/// * `patch` - 更新内容（指定されたフィールドのみ変更）
///
/// # 戻り値
/// 更新後のサブスクリプション
pub fn update_subscription(
    conn: &Connection,
    id: i64,
    patch: &SubscriptionPatch,
) -> AppResult<Subscription> {
    log::debug!("サブスクリプションを更新します: sub_id={id}, patch={patch:?}");

    let updated = repository::update(conn, id, patch).map_err(|e| {
        log::error!("サブスクリプションの更新に失敗しました: sub_id={id}, error={e}");
        e
    })?;

    log::info!("サブスクリプションを更新しました: sub_id={id}");
    Ok(updated)
}

/// サブスクリプションを削除する
pub fn delete_subscription(conn: &Connection, id: i64) -> AppResult<()> {
    repository::delete(conn, id).map_err(|e| {
        log::error!("サブスクリプションの削除に失敗しました: sub_id={id}, error={e}");
        e
    })?;

    log::info!("サブスクリプションを削除しました: sub_id={id}");
    Ok(())
}

/// 期間内の合計金額を計算する
///
/// # 引数
/// * `conn` - データベース接続
/// * `filter` - 集計条件
/// * `today` - 終了月が未指定の場合の基準日
///
/// # 戻り値
/// 合計金額と集計対象のサブスクリプションID一覧
pub fn calculate_total_costs(
    conn: &Connection,
    filter: &CostFilter,
    today: NaiveDate,
) -> AppResult<CostSummary> {
    log::debug!("合計金額を計算します: filter={filter:?}");

    let source = SqliteSubscriptionSource::new(conn);
    let summary = aggregator::total_costs(&source, filter, today).map_err(|e| {
        match &e {
            CostError::InvalidFilter(_) => log::warn!("合計金額の集計条件が不正です: {e}"),
            _ => log::error!("合計金額の計算に失敗しました: filter={filter:?}, error={e}"),
        }
        e
    })?;

    log::info!(
        "合計金額を計算しました: total={}, count={}",
        summary.total_cost,
        summary.subscription_ids.len()
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::database::prepare_connection;
    use crate::shared::errors::AppError;

    fn create_test_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        prepare_connection(&conn).unwrap();
        conn
    }

    fn ym(year: i32, month: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, 1).unwrap()
    }

    fn input(user_id: Option<Uuid>, name: &str, price: i64) -> CreateSubscriptionInput {
        CreateSubscriptionInput {
            user_id,
            service_name: name.to_string(),
            price,
            start_date: ym(2024, 1),
            end_date: None,
        }
    }

    #[test]
    fn test_create_assigns_user_id_when_missing() {
        let conn = create_test_db();

        let (id, user_id) = create_subscription(&conn, input(None, "Netflix", 500)).unwrap();

        assert!(!user_id.is_nil());
        assert_eq!(get_subscription(&conn, id).unwrap().user_id, user_id);
    }

    #[test]
    fn test_create_keeps_given_user_id() {
        let conn = create_test_db();
        let user_id = Uuid::new_v4();

        let (_, assigned) = create_subscription(&conn, input(Some(user_id), "Netflix", 500)).unwrap();
        assert_eq!(assigned, user_id);
    }

    #[test]
    fn test_create_rejects_invalid_input() {
        let conn = create_test_db();

        let result = create_subscription(&conn, input(None, "", 500));
        assert!(matches!(result, Err(AppError::Validation(_))));

        let result = create_subscription(&conn, input(None, "Netflix", -5));
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[test]
    fn test_update_and_delete() {
        let conn = create_test_db();
        let (id, _) = create_subscription(&conn, input(None, "Netflix", 500)).unwrap();

        let patch = SubscriptionPatch {
            end_date: Some(ym(2024, 6)),
            ..Default::default()
        };
        let updated = update_subscription(&conn, id, &patch).unwrap();
        assert_eq!(updated.end_date, Some(ym(2024, 6)));

        delete_subscription(&conn, id).unwrap();
        assert!(matches!(
            delete_subscription(&conn, id),
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn test_calculate_total_costs() {
        let conn = create_test_db();
        let user_id = Uuid::new_v4();

        let (first, _) = create_subscription(
            &conn,
            CreateSubscriptionInput {
                end_date: Some(ym(2024, 7)),
                ..input(Some(user_id), "Netflix", 500)
            },
        )
        .unwrap();
        let (second, _) = create_subscription(&conn, input(Some(user_id), "Spotify", 300)).unwrap();
        let (third, _) = create_subscription(
            &conn,
            CreateSubscriptionInput {
                start_date: ym(2025, 1),
                ..input(Some(user_id), "Disney+", 1000)
            },
        )
        .unwrap();

        let filter = CostFilter {
            user_id: Some(user_id),
            service_name: None,
            start_date: Some(ym(2024, 3)),
            end_date: Some(ym(2024, 6)),
        };
        let summary = calculate_total_costs(&conn, &filter, ym(2024, 10)).unwrap();

        // Netflix: 3ヶ月 × 500、Spotify: 3ヶ月 × 300、Disney+: 期間外
        assert_eq!(summary.total_cost, 1500 + 900);
        assert_eq!(summary.subscription_ids, vec![first, second, third]);
    }

    #[test]
    fn test_calculate_total_costs_unknown_user() {
        let conn = create_test_db();
        let filter = CostFilter {
            user_id: Some(Uuid::new_v4()),
            service_name: None,
            start_date: Some(ym(2024, 1)),
            end_date: None,
        };

        let result = calculate_total_costs(&conn, &filter, ym(2024, 10));
        let error = result.unwrap_err();
        assert_eq!(error.status_code(), hyper::StatusCode::NOT_FOUND);
    }
}
