/// サブスクリプション機能モジュール
///
/// このモジュールは、サブスクリプション管理に関連するすべての機能を提供します：
/// - サブスクリプションの作成、読み取り、更新、削除
/// - 期間内の合計金額の計算
/// - HTTPハンドラー
pub mod aggregator;
pub mod handlers;
pub mod models;
pub mod repository;
pub mod service;

// 公開インターフェース
pub use aggregator::{total_costs, CostError, CostWindow, SubscriptionSource};

pub use models::{
    CostFilter, CostSummary, CreateSubscriptionInput, NewSubscription, Subscription,
    SubscriptionPatch,
};

pub use repository::SqliteSubscriptionSource;

pub use service::{
    calculate_total_costs, create_subscription, delete_subscription, get_subscription,
    list_user_subscriptions, update_subscription,
};
