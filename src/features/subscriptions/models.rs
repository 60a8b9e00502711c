use crate::shared::errors::{AppError, AppResult};
use crate::shared::utils::{format_month_year, parse_month_year};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// サービス名の最大文字数
pub const MAX_SERVICE_NAME_LENGTH: usize = 100;

/// サブスクリプションデータモデル
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub id: i64,
    pub user_id: Uuid,
    pub service_name: String,
    /// 月額料金
    pub price: i64,
    /// 開始月（1日固定）
    pub start_date: NaiveDate,
    /// 終了月（1日固定）。未設定の場合は継続中
    pub end_date: Option<NaiveDate>,
}

/// 検証済みの新規サブスクリプション
///
/// `NewSubscription::new` を通してのみ作成され、以下を満たす:
/// - サービス名が空でない
/// - 価格が0以上
/// - 終了月が開始月より前でない
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSubscription {
    pub user_id: Uuid,
    pub service_name: String,
    pub price: i64,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
}

impl NewSubscription {
    /// 新規サブスクリプションを検証して作成する
    ///
    /// # 引数
    /// * `user_id` - 所有ユーザーID
    /// * `service_name` - サービス名
    /// * `price` - 月額料金
    /// * `start_date` - 開始月
    /// * `end_date` - 終了月（任意）
    ///
    /// # 戻り値
    /// 検証済みのサブスクリプション、または失敗時はバリデーションエラー
    pub fn new(
        user_id: Uuid,
        service_name: &str,
        price: i64,
        start_date: NaiveDate,
        end_date: Option<NaiveDate>,
    ) -> AppResult<Self> {
        let service_name = validate_service_name(service_name)?;
        validate_price(price)?;
        validate_period(start_date, end_date)?;

        Ok(Self {
            user_id,
            service_name,
            price,
            start_date,
            end_date,
        })
    }
}

/// サブスクリプションの部分更新内容
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionPatch {
    /// 所有者の確認用。更新対象のフィールドではない
    pub user_id: Option<Uuid>,
    pub service_name: Option<String>,
    pub price: Option<i64>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl SubscriptionPatch {
    /// 更新対象のフィールドが一つもないかどうか（ユーザーIDは数えない）
    pub fn is_empty(&self) -> bool {
        self.service_name.is_none()
            && self.price.is_none()
            && self.start_date.is_none()
            && self.end_date.is_none()
    }

    /// 既存のサブスクリプションに更新内容を適用する
    ///
    /// # 戻り値
    /// 更新後のサブスクリプション、または結果が不正な場合はバリデーションエラー
    pub fn apply_to(&self, existing: &Subscription) -> AppResult<Subscription> {
        if self.user_id.is_some_and(|user_id| user_id != existing.user_id) {
            return Err(AppError::validation("ユーザーIDは変更できません"));
        }

        let service_name = match &self.service_name {
            Some(name) => validate_service_name(name)?,
            None => existing.service_name.clone(),
        };
        let price = match self.price {
            Some(price) => {
                validate_price(price)?;
                price
            }
            None => existing.price,
        };
        let start_date = self.start_date.unwrap_or(existing.start_date);
        let end_date = self.end_date.or(existing.end_date);
        validate_period(start_date, end_date)?;

        Ok(Subscription {
            id: existing.id,
            user_id: existing.user_id,
            service_name,
            price,
            start_date,
            end_date,
        })
    }
}

/// 合計金額の集計条件
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CostFilter {
    pub user_id: Option<Uuid>,
    /// ログ出力用。集計対象の絞り込みには使わない
    pub service_name: Option<String>,
    pub start_date: Option<NaiveDate>,
    /// 未指定の場合は今月1日まで
    pub end_date: Option<NaiveDate>,
}

/// 合計金額の集計結果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CostSummary {
    pub total_cost: i64,
    /// 集計対象となったすべてのサブスクリプションID（期間が重ならないものも含む）
    pub subscription_ids: Vec<i64>,
}

fn validate_service_name(name: &str) -> AppResult<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(AppError::validation("サービス名を入力してください"));
    }
    if trimmed.chars().count() > MAX_SERVICE_NAME_LENGTH {
        return Err(AppError::validation(format!(
            "サービス名は{MAX_SERVICE_NAME_LENGTH}文字以内で入力してください"
        )));
    }
    Ok(trimmed.to_string())
}

fn validate_price(price: i64) -> AppResult<()> {
    if price < 0 {
        return Err(AppError::validation("価格は0以上である必要があります"));
    }
    Ok(())
}

fn validate_period(start_date: NaiveDate, end_date: Option<NaiveDate>) -> AppResult<()> {
    if let Some(end) = end_date {
        if end < start_date {
            return Err(AppError::validation(
                "終了月は開始月以降である必要があります",
            ));
        }
    }
    Ok(())
}

// ---- HTTPリクエスト/レスポンス用DTO ----

/// サブスクリプション作成・更新リクエスト
///
/// 日付は "MM-YYYY" 形式の文字列で受け取る。
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubscriptionPayload {
    pub service_name: Option<String>,
    pub price: Option<i64>,
    pub user_id: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

impl SubscriptionPayload {
    /// 作成用の入力に変換する
    ///
    /// ユーザーIDが未指定の場合は `None` を返し、採番は呼び出し側に任せる。
    pub fn into_create_input(self) -> AppResult<CreateSubscriptionInput> {
        let user_id = parse_optional_user_id(self.user_id.as_deref())?;
        let service_name = self
            .service_name
            .ok_or_else(|| AppError::validation("サービス名を入力してください"))?;
        let price = self
            .price
            .ok_or_else(|| AppError::validation("価格を入力してください"))?;
        let start_date = match non_empty(self.start_date.as_deref()) {
            Some(value) => parse_month_year(value)?,
            None => return Err(AppError::validation("開始月を入力してください")),
        };
        let end_date = non_empty(self.end_date.as_deref())
            .map(parse_month_year)
            .transpose()?;

        Ok(CreateSubscriptionInput {
            user_id,
            service_name,
            price,
            start_date,
            end_date,
        })
    }

    /// 部分更新の内容に変換する
    ///
    /// 空文字列のフィールドは「変更なし」として扱う。ユーザーIDは受け付けるが、
    /// 既存の所有者と異なる場合は適用時にエラーになる。
    pub fn into_patch(self) -> AppResult<SubscriptionPatch> {
        Ok(SubscriptionPatch {
            user_id: parse_optional_user_id(self.user_id.as_deref())?,
            service_name: non_empty(self.service_name.as_deref()).map(str::to_string),
            price: self.price,
            start_date: non_empty(self.start_date.as_deref())
                .map(parse_month_year)
                .transpose()?,
            end_date: non_empty(self.end_date.as_deref())
                .map(parse_month_year)
                .transpose()?,
        })
    }
}

/// 作成ユースケースへの入力
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateSubscriptionInput {
    pub user_id: Option<Uuid>,
    pub service_name: String,
    pub price: i64,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
}

/// サブスクリプションのレスポンス表現
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionResponse {
    pub sub_id: i64,
    pub service_name: String,
    pub price: i64,
    pub user_id: String,
    pub start_date: String,
    pub end_date: Option<String>,
}

impl From<&Subscription> for SubscriptionResponse {
    fn from(sub: &Subscription) -> Self {
        Self {
            sub_id: sub.id,
            service_name: sub.service_name.clone(),
            price: sub.price,
            user_id: sub.user_id.to_string(),
            start_date: format_month_year(sub.start_date),
            end_date: sub.end_date.map(format_month_year),
        }
    }
}

/// 作成成功時のレスポンス
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedResponse {
    pub sub_id: i64,
    pub user_id: String,
    pub message: String,
}

/// 合計金額リクエストの絞り込み条件
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CostsRequestFilter {
    pub user_id: Option<String>,
    pub service_name: Option<String>,
}

/// 合計金額リクエスト
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CostsRequest {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    #[serde(default)]
    pub filter: CostsRequestFilter,
}

impl CostsRequest {
    /// 集計条件に変換する
    ///
    /// 必須項目の有無はここでは確認せず、集計処理側で判定する。
    pub fn into_filter(self) -> AppResult<CostFilter> {
        Ok(CostFilter {
            user_id: parse_optional_user_id(self.filter.user_id.as_deref())?,
            service_name: non_empty(self.filter.service_name.as_deref())
                .map(|name| name.trim().to_string()),
            start_date: non_empty(self.start_date.as_deref())
                .map(parse_month_year)
                .transpose()?,
            end_date: non_empty(self.end_date.as_deref())
                .map(parse_month_year)
                .transpose()?,
        })
    }
}

/// 合計金額レスポンス
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostsResponse {
    pub total_sum: i64,
    pub sub_ids: Vec<i64>,
}

impl From<CostSummary> for CostsResponse {
    fn from(summary: CostSummary) -> Self {
        Self {
            total_sum: summary.total_cost,
            sub_ids: summary.subscription_ids,
        }
    }
}

/// ユーザーID文字列を解析する
pub fn parse_user_id(value: &str) -> AppResult<Uuid> {
    Uuid::parse_str(value.trim())
        .map_err(|e| AppError::validation(format!("ユーザーIDの形式が不正です: {e}")))
}

fn parse_optional_user_id(value: Option<&str>) -> AppResult<Option<Uuid>> {
    non_empty(value).map(parse_user_id).transpose()
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ym(year: i32, month: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, 1).unwrap()
    }

    fn sample_subscription() -> Subscription {
        Subscription {
            id: 7,
            user_id: Uuid::new_v4(),
            service_name: "Netflix".to_string(),
            price: 500,
            start_date: ym(2024, 1),
            end_date: Some(ym(2024, 7)),
        }
    }

    #[test]
    fn test_new_subscription_validation() {
        let user_id = Uuid::new_v4();

        let sub = NewSubscription::new(user_id, "  Spotify ", 300, ym(2024, 1), None).unwrap();
        assert_eq!(sub.service_name, "Spotify");

        assert!(NewSubscription::new(user_id, "   ", 300, ym(2024, 1), None).is_err());
        assert!(NewSubscription::new(user_id, "Spotify", -1, ym(2024, 1), None).is_err());
        assert!(
            NewSubscription::new(user_id, "Spotify", 300, ym(2024, 5), Some(ym(2024, 4)))
                .is_err()
        );
        // 同じ月の開始・終了は許容する
        assert!(
            NewSubscription::new(user_id, "Spotify", 0, ym(2024, 5), Some(ym(2024, 5))).is_ok()
        );

        let long_name = "a".repeat(MAX_SERVICE_NAME_LENGTH + 1);
        assert!(NewSubscription::new(user_id, &long_name, 300, ym(2024, 1), None).is_err());
    }

    #[test]
    fn test_patch_apply() {
        let existing = sample_subscription();

        let patch = SubscriptionPatch {
            price: Some(650),
            end_date: Some(ym(2024, 12)),
            ..Default::default()
        };
        let updated = patch.apply_to(&existing).unwrap();

        assert_eq!(updated.id, existing.id);
        assert_eq!(updated.user_id, existing.user_id);
        assert_eq!(updated.service_name, "Netflix");
        assert_eq!(updated.price, 650);
        assert_eq!(updated.start_date, ym(2024, 1));
        assert_eq!(updated.end_date, Some(ym(2024, 12)));
    }

    #[test]
    fn test_patch_rejects_inverted_period() {
        let existing = sample_subscription();

        // 既存の終了月より後ろに開始月をずらすと不正
        let patch = SubscriptionPatch {
            start_date: Some(ym(2024, 9)),
            ..Default::default()
        };
        assert!(matches!(
            patch.apply_to(&existing),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_payload_into_create_input() {
        let payload = SubscriptionPayload {
            service_name: Some("Yandex Plus".to_string()),
            price: Some(400),
            user_id: Some("60601fee-2bf1-4721-ae6f-7636e79a0cba".to_string()),
            start_date: Some("07-2025".to_string()),
            end_date: Some(String::new()),
        };

        let input = payload.into_create_input().unwrap();
        assert_eq!(input.service_name, "Yandex Plus");
        assert_eq!(input.price, 400);
        assert_eq!(
            input.user_id.unwrap().to_string(),
            "60601fee-2bf1-4721-ae6f-7636e79a0cba"
        );
        assert_eq!(input.start_date, ym(2025, 7));
        assert_eq!(input.end_date, None);
    }

    #[test]
    fn test_payload_missing_fields() {
        let payload = SubscriptionPayload {
            service_name: Some("Netflix".to_string()),
            price: Some(100),
            ..Default::default()
        };
        assert!(matches!(
            payload.into_create_input(),
            Err(AppError::Validation(_))
        ));

        let payload = SubscriptionPayload {
            service_name: Some("Netflix".to_string()),
            start_date: Some("01-2024".to_string()),
            ..Default::default()
        };
        assert!(payload.into_create_input().is_err());

        let payload = SubscriptionPayload {
            service_name: Some("Netflix".to_string()),
            price: Some(100),
            start_date: Some("01-2024".to_string()),
            user_id: Some("not-a-uuid".to_string()),
            ..Default::default()
        };
        assert!(payload.into_create_input().is_err());
    }

    #[test]
    fn test_payload_into_patch() {
        let payload = SubscriptionPayload {
            service_name: Some(String::new()),
            price: Some(10),
            end_date: Some("03-2026".to_string()),
            ..Default::default()
        };

        let patch = payload.into_patch().unwrap();
        assert_eq!(patch.service_name, None);
        assert_eq!(patch.price, Some(10));
        assert_eq!(patch.start_date, None);
        assert_eq!(patch.end_date, Some(ym(2026, 3)));

        assert!(SubscriptionPayload::default().into_patch().unwrap().is_empty());

        // ユーザーIDだけでは更新項目にならない
        let user_id = Uuid::new_v4();
        let patch = SubscriptionPayload {
            user_id: Some(user_id.to_string()),
            ..Default::default()
        }
        .into_patch()
        .unwrap();
        assert_eq!(patch.user_id, Some(user_id));
        assert!(patch.is_empty());

        let payload = SubscriptionPayload {
            user_id: Some("not-a-uuid".to_string()),
            price: Some(10),
            ..Default::default()
        };
        assert!(payload.into_patch().is_err());
    }

    #[test]
    fn test_patch_user_id_must_match_owner() {
        let existing = sample_subscription();

        // 既存の所有者と同じユーザーIDは無視される
        let patch = SubscriptionPatch {
            user_id: Some(existing.user_id),
            price: Some(700),
            ..Default::default()
        };
        let updated = patch.apply_to(&existing).unwrap();
        assert_eq!(updated.user_id, existing.user_id);
        assert_eq!(updated.price, 700);

        let patch = SubscriptionPatch {
            user_id: Some(Uuid::new_v4()),
            price: Some(700),
            ..Default::default()
        };
        assert!(matches!(
            patch.apply_to(&existing),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_costs_request_into_filter() {
        let request: CostsRequest = serde_json::from_str(
            r#"{
                "start_date": "01-2024",
                "filter": {
                    "user_id": "60601fee-2bf1-4721-ae6f-7636e79a0cba",
                    "service_name": "Netflix"
                }
            }"#,
        )
        .unwrap();

        let filter = request.into_filter().unwrap();
        assert!(filter.user_id.is_some());
        assert_eq!(filter.service_name.as_deref(), Some("Netflix"));
        assert_eq!(filter.start_date, Some(ym(2024, 1)));
        assert_eq!(filter.end_date, None);
    }

    #[test]
    fn test_costs_request_without_filter_block() {
        let request: CostsRequest = serde_json::from_str(r#"{"start_date": "01-2024"}"#).unwrap();
        let filter = request.into_filter().unwrap();

        assert_eq!(filter.user_id, None);
        assert_eq!(filter.service_name, None);
    }

    #[test]
    fn test_subscription_response() {
        let sub = sample_subscription();
        let response = SubscriptionResponse::from(&sub);

        assert_eq!(response.sub_id, 7);
        assert_eq!(response.start_date, "01-2024");
        assert_eq!(response.end_date.as_deref(), Some("07-2024"));
        assert_eq!(response.user_id, sub.user_id.to_string());
    }
}
