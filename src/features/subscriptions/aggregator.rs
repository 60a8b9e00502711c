// 期間内のサブスクリプション合計金額の集計
//
// 各サブスクリプションの期間を集計期間 [start, end) に切り詰め、
// 重なった月数 × 月額料金を合計する。期間が重ならないサブスクリプションも
// ID一覧には含める（金額は0）。

use super::models::{CostFilter, CostSummary, Subscription};
use crate::shared::errors::AppError;
use crate::shared::utils::{first_day_of_month, months_between};
use chrono::NaiveDate;
use thiserror::Error;
use uuid::Uuid;

/// 合計金額計算のエラー
#[derive(Debug, Error)]
pub enum CostError {
    /// 集計条件が不正（ユーザーID・開始月の欠落、終了月が開始月より前）
    #[error("集計条件が不正です: {0}")]
    InvalidFilter(String),

    /// 保存されているサブスクリプションの終了月が開始月より前（保存データの不整合）
    #[error("サブスクリプション {subscription_id} の期間が不整合です")]
    InconsistentInterval { subscription_id: i64 },

    /// サブスクリプションの取得に失敗した
    #[error("サブスクリプションの取得に失敗しました: {0}")]
    UpstreamFetchFailure(#[source] Box<AppError>),

    /// 合計金額が表現可能な範囲を超えた
    #[error("合計金額が上限を超えました")]
    Overflow,
}

/// ユーザーのサブスクリプション一覧を取得する機能
///
/// 集計処理はこの機能だけに依存し、保存先の詳細は知らない。
pub trait SubscriptionSource {
    /// ユーザーに属するすべてのサブスクリプションを取得する
    ///
    /// ユーザーが存在しない場合や保存先に到達できない場合はエラーを返す。
    fn fetch_subscriptions_for_user(&self, user_id: Uuid) -> Result<Vec<Subscription>, AppError>;
}

/// 解決済みの集計期間
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CostWindow {
    pub user_id: Uuid,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl CostFilter {
    /// 集計条件を検証し、集計期間を確定する
    ///
    /// # 引数
    /// * `today` - 終了月が未指定の場合に使う基準日
    ///
    /// # 戻り値
    /// 確定した集計期間、または条件が不正な場合は `CostError::InvalidFilter`
    pub fn resolve(&self, today: NaiveDate) -> Result<CostWindow, CostError> {
        let user_id = self
            .user_id
            .ok_or_else(|| CostError::InvalidFilter("ユーザーIDは必須です".to_string()))?;
        let start = self
            .start_date
            .map(first_day_of_month)
            .ok_or_else(|| CostError::InvalidFilter("開始月は必須です".to_string()))?;
        let end = first_day_of_month(self.end_date.unwrap_or(today));

        if end < start {
            return Err(CostError::InvalidFilter(
                "終了月は開始月以降である必要があります".to_string(),
            ));
        }

        Ok(CostWindow {
            user_id,
            start,
            end,
        })
    }
}

/// 1件のサブスクリプションが集計期間と重なる月数を計算する
///
/// # 戻り値
/// 重なる月数（重ならない場合は0）、またはサブスクリプション自体の期間が
/// 逆転している場合は `CostError::InconsistentInterval`
pub fn overlapping_months(sub: &Subscription, window: &CostWindow) -> Result<i64, CostError> {
    // 期間の切り詰め前にサブスクリプション自体の整合性を確認する
    if let Some(end) = sub.end_date {
        if months_between(sub.start_date, end) < 0 {
            return Err(CostError::InconsistentInterval {
                subscription_id: sub.id,
            });
        }
    }

    let effective_start = sub.start_date.max(window.start);
    let effective_end = match sub.end_date {
        Some(end) => end.min(window.end),
        None => window.end,
    };

    // 集計期間の外側にあるサブスクリプションは0ヶ月
    Ok(months_between(effective_start, effective_end).max(0))
}

/// サブスクリプション一覧から合計金額を集計する
///
/// # 引数
/// * `subscriptions` - 1ユーザー分のサブスクリプション
/// * `window` - 確定済みの集計期間
///
/// # 戻り値
/// 合計金額と集計対象のID一覧。1件でも不整合があれば全体をエラーにする。
pub fn aggregate(
    subscriptions: &[Subscription],
    window: &CostWindow,
) -> Result<CostSummary, CostError> {
    let mut total_cost: i64 = 0;
    let mut subscription_ids = Vec::with_capacity(subscriptions.len());

    for sub in subscriptions {
        subscription_ids.push(sub.id);

        let months = overlapping_months(sub, window)?;
        let contribution = sub.price.checked_mul(months).ok_or(CostError::Overflow)?;
        total_cost = total_cost
            .checked_add(contribution)
            .ok_or(CostError::Overflow)?;
    }

    Ok(CostSummary {
        total_cost,
        subscription_ids,
    })
}

/// 取得元からユーザーのサブスクリプションを取得して合計金額を集計する
///
/// 集計条件の検証は取得より前に行う。サービス名の指定は集計対象を変えず、
/// ユーザーのすべてのサブスクリプションを集計する。
pub fn total_costs<S>(
    source: &S,
    filter: &CostFilter,
    today: NaiveDate,
) -> Result<CostSummary, CostError>
where
    S: SubscriptionSource + ?Sized,
{
    let window = filter.resolve(today)?;

    let subscriptions = source
        .fetch_subscriptions_for_user(window.user_id)
        .map_err(|e| CostError::UpstreamFetchFailure(Box::new(e)))?;

    aggregate(&subscriptions, &window)
}
