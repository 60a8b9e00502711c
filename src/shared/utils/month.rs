use crate::shared::errors::{AppError, AppResult};
use chrono::{Datelike, NaiveDate, Utc};
use chrono_tz::Tz;
use once_cell::sync::Lazy;
use regex::Regex;

/// "MM-YYYY" 形式の月表記
static MONTH_YEAR_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{2})-(\d{4})$").expect("月表記の正規表現が不正です"));

/// "MM-YYYY" 形式の文字列を月初日に変換する
///
/// # 引数
/// * `value` - 月表記（例: "07-2024"）
///
/// # 戻り値
/// その月の1日、または形式が不正な場合はバリデーションエラー
pub fn parse_month_year(value: &str) -> AppResult<NaiveDate> {
    let captures = MONTH_YEAR_PATTERN.captures(value.trim()).ok_or_else(|| {
        AppError::validation(format!(
            "日付はMM-YYYY形式で入力してください: {value}"
        ))
    })?;

    // 正規表現で数字2桁/4桁であることは保証されている
    let month: u32 = captures[1]
        .parse()
        .map_err(|_| AppError::validation("月は数値で入力してください"))?;
    let year: i32 = captures[2]
        .parse()
        .map_err(|_| AppError::validation("年は数値で入力してください"))?;

    if !(1..=12).contains(&month) {
        return Err(AppError::validation(format!(
            "月は1から12の間で入力してください: {value}"
        )));
    }

    NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| AppError::validation(format!("存在しない日付です: {value}")))
}

/// 月初日を "MM-YYYY" 形式の文字列に変換する
pub fn format_month_year(date: NaiveDate) -> String {
    format!("{:02}-{:04}", date.month(), date.year())
}

/// 指定日が属する月の1日を取得する
pub fn first_day_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// 指定タイムゾーンでの今月1日を取得する
pub fn current_month_start(timezone: Tz) -> NaiveDate {
    first_day_of_month(Utc::now().with_timezone(&timezone).date_naive())
}

/// 2つの月の間の月数を計算する
///
/// 日は無視し、年と月のみで計算する。`end` が `start` より前なら負の値になる。
pub fn months_between(start: NaiveDate, end: NaiveDate) -> i64 {
    let years = i64::from(end.year()) - i64::from(start.year());
    let months = i64::from(end.month()) - i64::from(start.month());
    years * 12 + months
}
